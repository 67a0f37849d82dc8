/// Org Tree Engine — Contract Sync Rule
///
/// A contract set on a node whose immediate parent is a contract-sync
/// boundary (a Supervisor) must exist in the contract list. Records are only
/// ever appended, never edited or removed; matching is on contract name.

use tracing::debug;

use crate::domain::{Contract, OrgNode};
use crate::ids::IdGenerator;
use crate::tree::find_parent;

pub const PLACEHOLDER_ADDRESS: &str = "Endereço não informado";
pub const PLACEHOLDER_REGION: &str = "Região não informada";
pub const PLACEHOLDER_BACKGROUND_IMAGE: &str = "";

/// A contract name paired with the supervisor that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractLink {
    pub contract: String,
    pub supervisor_id: String,
    pub supervisor_name: String,
}

/// Resolve the link for `contract` set on `node_id`.
///
/// `None` when the contract is blank, the node has no parent (the root or an
/// absent id), or the parent is not a contract-sync boundary.
pub fn contract_link_for(tree: &OrgNode, node_id: &str, contract: &str) -> Option<ContractLink> {
    let contract = contract.trim();
    if contract.is_empty() {
        return None;
    }
    let parent = find_parent(tree, node_id)?;
    if !parent.role.is_contract_sync_boundary() {
        return None;
    }
    Some(ContractLink {
        contract: contract.to_string(),
        supervisor_id: parent.id.clone(),
        supervisor_name: parent.name.clone(),
    })
}

/// The record to append for `link`, or `None` if a contract with the same
/// name already exists.
pub fn sync_contract(
    contracts: &[Contract],
    link: &ContractLink,
    ids: &mut dyn IdGenerator,
) -> Option<Contract> {
    if contracts.iter().any(|c| c.name == link.contract) {
        debug!("Contract {:?} already registered, skipping", link.contract);
        return None;
    }
    Some(Contract {
        id: ids.contract_id(),
        name: link.contract.clone(),
        supervisor_id: link.supervisor_id.clone(),
        supervisor_name: link.supervisor_name.clone(),
        address: PLACEHOLDER_ADDRESS.to_string(),
        region: PLACEHOLDER_REGION.to_string(),
        background_image: PLACEHOLDER_BACKGROUND_IMAGE.to_string(),
    })
}

/// Append the record for `link` if missing. Returns the appended record.
pub fn apply_contract_sync(
    contracts: &mut Vec<Contract>,
    link: &ContractLink,
    ids: &mut dyn IdGenerator,
) -> Option<Contract> {
    let created = sync_contract(contracts, link, ids)?;
    contracts.push(created.clone());
    Some(created)
}
