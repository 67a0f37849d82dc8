//! Integration tests for org_tree_runtime.
//!
//! File-backed tests use temporary directories for isolation.

use std::io;
use std::sync::Arc;
use std::thread;

use org_tree_engine::domain::{Avatar, NewNode, NodePatch};
use org_tree_engine::ids::SequentialIds;
use org_tree_engine::mutation::TreeMutation;
use org_tree_engine::seed::{seed_tree, SEED_DIRECTOR_ID};
use org_tree_engine::ROOT_ID;

use org_tree_runtime::config::RuntimeConfig;
use org_tree_runtime::error::RuntimeError;
use org_tree_runtime::notify::ChangeKind;
use org_tree_runtime::session::{Session, SharedSession};
use org_tree_runtime::store::{FileStore, KeyValueStore, MemoryStore};

fn config_for(dir: &std::path::Path) -> RuntimeConfig {
    RuntimeConfig {
        storage_dir: dir.to_path_buf(),
        ..RuntimeConfig::default()
    }
}

fn add(parent: &str, name: &str, role: &str) -> TreeMutation {
    TreeMutation::AddChild {
        parent_id: parent.to_string(),
        child: NewNode {
            name: name.to_string(),
            role: role.to_string(),
            ..NewNode::default()
        },
    }
}

/// Memory store that refuses every write to the tree key.
struct TreeWritesFail(MemoryStore);

impl KeyValueStore for TreeWritesFail {
    fn get(&self, key: &str) -> Result<Option<String>, RuntimeError> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RuntimeError> {
        if key == "orgTree" {
            return Err(RuntimeError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
        }
        self.0.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), RuntimeError> {
        self.0.delete(key)
    }
}

fn memory_session(store: Arc<MemoryStore>) -> Session {
    Session::open(store, RuntimeConfig::default())
        .expect("open session")
        .with_id_generator(SequentialIds::new())
}

// ─────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────

#[test]
fn empty_store_starts_from_seed() {
    let session = memory_session(Arc::new(MemoryStore::new()));
    assert_eq!(session.tree(), &seed_tree());
    assert_eq!(session.visible_nodes().len(), 1);
    assert_eq!(session.employees().len(), 1);
}

#[test]
fn malformed_stored_tree_falls_back_to_seed() {
    let store = Arc::new(MemoryStore::new());
    store.set("orgTree", "{not json").expect("set");
    let session = memory_session(store);
    assert_eq!(session.tree(), &seed_tree());
}

#[test]
fn stored_tree_with_duplicate_ids_falls_back_to_seed() {
    let store = Arc::new(MemoryStore::new());
    let bad = r#"{"id":"arpolar","name":"A","role":"Empresa","children":[
        {"id":"x","name":"B","role":"Diretor"},
        {"id":"x","name":"C","role":"Diretor"}]}"#;
    store.set("orgTree", bad).expect("set");
    let session = memory_session(store);
    assert_eq!(session.tree(), &seed_tree());
}

// ─────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────

#[test]
fn applied_mutations_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");

    let hash = {
        let mut session = Session::open_dir(config_for(dir.path()))
            .expect("open")
            .with_id_generator(SequentialIds::new());
        session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add sup");
        let report = session.apply(&add("node-1-seq", "Davi", "Técnico")).expect("add tec");
        assert!(report.outcome.changed);
        assert_eq!(report.diff.added, vec!["node-2-seq"]);
        report.hash
    };

    let reopened = Session::open_dir(config_for(dir.path())).expect("reopen");
    assert_eq!(reopened.current_hash().expect("hash"), hash);
    assert_eq!(reopened.employees().len(), 3);
}

#[test]
fn no_op_mutation_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut session = memory_session(store.clone());
    let rx = session.subscribe();

    let report = session.apply(&add("ghost", "Ana", "Supervisor")).expect("apply");
    assert!(!report.outcome.changed);
    assert!(report.diff.is_empty());
    assert!(store.get("orgTree").expect("get").is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn invalid_mutation_keeps_previous_tree() {
    let mut session = memory_session(Arc::new(MemoryStore::new()));
    let before = session.current_hash().expect("hash");
    let result = session.apply(&add(SEED_DIRECTOR_ID, "   ", "Supervisor"));
    assert!(result.is_err());
    assert_eq!(session.current_hash().expect("hash"), before);
}

#[test]
fn reload_picks_up_external_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut reader = Session::open_dir(config_for(dir.path())).expect("open reader");
    let mut writer = Session::open_dir(config_for(dir.path()))
        .expect("open writer")
        .with_id_generator(SequentialIds::new());

    writer.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add");
    assert_eq!(reader.employees().len(), 1);
    reader.reload().expect("reload");
    assert_eq!(reader.employees().len(), 2);
}

#[test]
fn exported_backup_restores_into_a_fresh_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backup = dir.path().join("backup").join("tree.json");

    let mut source = memory_session(Arc::new(MemoryStore::new()));
    source.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add");
    let file_hash = source.export_tree(&backup).expect("export");
    assert_eq!(file_hash.len(), 64);

    let store = Arc::new(MemoryStore::new());
    let mut target = memory_session(store.clone());
    let rx = target.subscribe();
    let hash = target.import_tree(&backup).expect("import");

    assert_eq!(target.tree(), source.tree());
    assert_eq!(hash, source.current_hash().expect("hash"));
    assert!(store.get("orgTree").expect("get").is_some());
    assert_eq!(rx.try_recv().expect("change").kind, ChangeKind::Tree);
}

#[test]
fn corrupt_backup_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backup = dir.path().join("tree.json");
    std::fs::write(&backup, "{ nope").expect("write");

    let mut session = memory_session(Arc::new(MemoryStore::new()));
    let err = session.import_tree(&backup).expect_err("corrupt backup");
    assert!(matches!(err, RuntimeError::Snapshot(_)));
    assert_eq!(session.tree(), &seed_tree());
}

#[test]
fn reload_with_nothing_stored_falls_back_to_seed() {
    let store = Arc::new(MemoryStore::new());
    let mut session = memory_session(store.clone());
    session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add");

    store.delete("orgTree").expect("delete");
    session.reload().expect("reload");
    assert_eq!(session.tree(), &seed_tree());
}

#[test]
fn legacy_tree_with_string_avatars_is_kept_and_migrated() {
    let store = Arc::new(MemoryStore::new());
    let legacy = r#"{"id":"arpolar","name":"ARPOLAR Refrigeração","role":"Empresa",
        "avatar":"https://cdn.example/logo.png","children":[
            {"id":"dir1","name":"Diretoria","role":"Diretor","avatar":"/placeholder.svg","children":[
                {"id":"sup1","name":"Ana","role":"Supervisor","avatar":"data:image/png;base64,AAAA"}]}]}"#;
    store.set("orgTree", legacy).expect("set");

    let mut session = memory_session(store.clone());
    assert_eq!(session.employees().len(), 2);
    assert_eq!(session.tree().children[0].children[0].avatar, Avatar::Stored);
    assert_eq!(
        session.avatar("sup1").expect("avatar").as_deref(),
        Some("data:image/png;base64,AAAA")
    );
    let rewritten = store.get("orgTree").expect("get").expect("tree");
    assert!(rewritten.contains("format_version"));
    assert!(!rewritten.contains("base64"));

    // later mutations build on the legacy tree, not the seed
    session.apply(&add("sup1", "Davi", "Técnico")).expect("add");
    let reopened = memory_session(store);
    assert_eq!(reopened.employees().len(), 3);
}

#[test]
fn failed_tree_save_still_stores_avatar_and_contract() {
    let store = Arc::new(TreeWritesFail(MemoryStore::new()));
    let mut session = Session::open(store.clone(), RuntimeConfig::default())
        .expect("open")
        .with_id_generator(SequentialIds::new());
    let rx = session.subscribe();

    let first = session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add sup");
    assert!(first.tree_error.is_some());

    let mut mutation = add("node-1-seq", "Davi", "Técnico");
    if let TreeMutation::AddChild { child, .. } = &mut mutation {
        child.avatar = Some("data:image/png;base64,AAAA".to_string());
        child.contract = Some("Shopping Norte".to_string());
    }
    let report = session.apply(&mutation).expect("add tec");

    assert!(report.tree_error.is_some());
    assert!(report.avatar_error.is_none());
    assert_eq!(report.contract_created.expect("contract").name, "Shopping Norte");
    assert_eq!(
        session.avatar("node-2-seq").expect("avatar").as_deref(),
        Some("data:image/png;base64,AAAA")
    );
    assert_eq!(session.contracts().expect("contracts").len(), 1);
    assert_eq!(session.employees().len(), 3);
    assert!(store.get("orgTree").expect("get").is_none());

    let kinds: Vec<ChangeKind> = rx.try_iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Avatar, ChangeKind::Contracts]);
}

// ─────────────────────────────────────────────────────────────
// Avatars
// ─────────────────────────────────────────────────────────────

#[test]
fn embedded_avatar_is_stored_outside_the_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FileStore::open(dir.path()).expect("store"));
    let mut session = Session::open(store.clone(), config_for(dir.path()))
        .expect("open")
        .with_id_generator(SequentialIds::new());

    let payload = "data:image/png;base64,iVBORw0KGgo=";
    let mut mutation = add(SEED_DIRECTOR_ID, "Ana", "Supervisor");
    if let TreeMutation::AddChild { child, .. } = &mut mutation {
        child.avatar = Some(payload.to_string());
    }
    let report = session.apply(&mutation).expect("apply");
    assert!(report.avatar_error.is_none());

    let stored_tree = store.get("orgTree").expect("get").expect("tree saved");
    assert!(!stored_tree.contains("base64"));
    assert_eq!(session.avatar("node-1-seq").expect("avatar").as_deref(), Some(payload));
}

#[test]
fn oversized_avatar_is_reported_but_mutation_stands() {
    let mut config = RuntimeConfig::default();
    config.limits.avatar_max_bytes = 16;
    let mut session = Session::open(Arc::new(MemoryStore::new()), config)
        .expect("open")
        .with_id_generator(SequentialIds::new());

    let patch = NodePatch {
        avatar: Some(format!("data:image/png;base64,{}", "A".repeat(64))),
        ..NodePatch::default()
    };
    let report = session
        .apply(&TreeMutation::UpdateNode {
            id: SEED_DIRECTOR_ID.to_string(),
            patch,
        })
        .expect("apply");

    assert!(report.outcome.changed);
    assert!(report.avatar_error.is_some());
    let director = &session.tree().children[0];
    assert_eq!(director.avatar, Avatar::Stored);
    assert!(session.avatar(SEED_DIRECTOR_ID).expect("avatar").is_none());
}

#[test]
fn removing_the_root_resets_and_clears_avatars() {
    let store = Arc::new(MemoryStore::new());
    let mut session = memory_session(store.clone());

    let mut mutation = add(SEED_DIRECTOR_ID, "Ana", "Supervisor");
    if let TreeMutation::AddChild { child, .. } = &mut mutation {
        child.avatar = Some("data:image/png;base64,AAAA".to_string());
    }
    session.apply(&mutation).expect("add");
    assert!(session.avatar("node-1-seq").expect("avatar").is_some());

    let report = session
        .apply(&TreeMutation::Remove {
            id: ROOT_ID.to_string(),
        })
        .expect("remove root");

    assert!(report.outcome.reset);
    assert_eq!(report.outcome.removed_ids, vec!["node-1-seq"]);
    assert_eq!(session.tree(), &seed_tree());
    assert!(session.avatar("node-1-seq").expect("avatar").is_none());
}

// ─────────────────────────────────────────────────────────────
// Contracts and notifications
// ─────────────────────────────────────────────────────────────

#[test]
fn contract_under_supervisor_is_registered_once() {
    let mut session = memory_session(Arc::new(MemoryStore::new()));
    session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add sup");

    let with_contract = |name: &str| TreeMutation::AddChild {
        parent_id: "node-1-seq".to_string(),
        child: NewNode {
            name: name.to_string(),
            role: "Técnico".to_string(),
            contract: Some("Shopping Norte".to_string()),
            ..NewNode::default()
        },
    };

    let first = session.apply(&with_contract("Davi")).expect("first");
    let created = first.contract_created.expect("contract created");
    assert_eq!(created.name, "Shopping Norte");
    assert_eq!(created.supervisor_id, "node-1-seq");
    assert_eq!(created.supervisor_name, "Ana");

    let second = session.apply(&with_contract("Bia")).expect("second");
    assert!(second.contract_created.is_none());
    assert_eq!(session.contracts().expect("contracts").len(), 1);
}

#[test]
fn contract_set_by_field_update_is_registered() {
    let store = Arc::new(MemoryStore::new());
    let mut session = memory_session(store.clone());
    session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add sup");
    session.apply(&add("node-1-seq", "Davi", "Técnico")).expect("add tec");

    let set_contract = TreeMutation::UpdateNode {
        id: "node-2-seq".to_string(),
        patch: NodePatch {
            contract: Some("Hospital Central".to_string()),
            ..NodePatch::default()
        },
    };
    let report = session.apply(&set_contract).expect("update");
    let link = report.outcome.contract_link.expect("link");
    assert_eq!(link.supervisor_id, "node-1-seq");
    let created = report.contract_created.expect("created");
    assert_eq!(created.name, "Hospital Central");
    assert_eq!(created.supervisor_name, "Ana");

    // same value again with the list gone: tree unchanged, record restored
    store.delete("contracts").expect("delete");
    let again = session.apply(&set_contract).expect("update again");
    assert!(!again.outcome.changed);
    assert!(again.contract_created.is_some());
    assert_eq!(session.contracts().expect("contracts").len(), 1);
}

#[test]
fn unreadable_contract_list_is_left_alone() {
    let store = Arc::new(MemoryStore::new());
    store.set("contracts", "{broken").expect("set");
    let mut session = memory_session(store.clone());
    session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add sup");

    let mut mutation = add("node-1-seq", "Davi", "Técnico");
    if let TreeMutation::AddChild { child, .. } = &mut mutation {
        child.contract = Some("Shopping Norte".to_string());
    }
    let report = session.apply(&mutation).expect("apply");

    assert!(report.outcome.changed);
    assert!(report.contract_created.is_none());
    assert!(report.contract_error.is_some());
    assert_eq!(store.get("contracts").expect("get").as_deref(), Some("{broken"));
    assert!(session.contracts().expect("contracts").is_empty());
}

#[test]
fn contract_outside_supervisor_is_not_registered() {
    let mut session = memory_session(Arc::new(MemoryStore::new()));
    let mut mutation = add(SEED_DIRECTOR_ID, "Ana", "Gerente");
    if let TreeMutation::AddChild { child, .. } = &mut mutation {
        child.contract = Some("Shopping Norte".to_string());
    }
    let report = session.apply(&mutation).expect("apply");
    assert!(report.contract_created.is_none());
    assert!(session.contracts().expect("contracts").is_empty());
}

#[test]
fn subscribers_see_every_written_key() {
    let mut session = memory_session(Arc::new(MemoryStore::new()));
    let rx = session.subscribe();

    session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("add sup");
    let mut mutation = add("node-1-seq", "Davi", "Técnico");
    if let TreeMutation::AddChild { child, .. } = &mut mutation {
        child.contract = Some("Shopping Norte".to_string());
    }
    let report = session.apply(&mutation).expect("add tec");

    let kinds: Vec<ChangeKind> = rx.try_iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Tree, ChangeKind::Tree, ChangeKind::Contracts]
    );
    assert_eq!(session.current_hash().expect("hash"), report.hash);
}

// ─────────────────────────────────────────────────────────────
// Shared session
// ─────────────────────────────────────────────────────────────

#[test]
fn shared_session_serializes_concurrent_adds() {
    let session = memory_session(Arc::new(MemoryStore::new()));
    let shared = Arc::new(SharedSession::new(session));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared
                    .apply(&add(SEED_DIRECTOR_ID, &format!("Pessoa {}", i), "Técnico"))
                    .expect("apply")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let tree = shared.tree().expect("tree");
    assert_eq!(tree.children[0].children.len(), 4);
}

#[test]
fn quota_exhaustion_is_reported_and_tree_stays_in_memory() {
    let mut config = RuntimeConfig::default();
    config.limits.store_quota_bytes = Some(64);
    let mut session = Session::in_memory(config)
        .expect("open")
        .with_id_generator(SequentialIds::new());

    let report = session
        .apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor"))
        .expect("mutation still applies");
    let tree_error = report.tree_error.expect("tree does not fit");
    assert!(tree_error.contains("quota"), "got: {}", tree_error);
    assert_eq!(session.employees().len(), 2);
}

#[test]
fn file_store_ignores_memory_quota() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config_for(dir.path());
    config.limits.store_quota_bytes = Some(1);
    let mut session = Session::open_dir(config.clone())
        .expect("open")
        .with_id_generator(SequentialIds::new());

    let report = session.apply(&add(SEED_DIRECTOR_ID, "Ana", "Supervisor")).expect("apply");
    assert!(report.tree_error.is_none());
    assert_eq!(Session::open_dir(config).expect("reopen").employees().len(), 2);
}
