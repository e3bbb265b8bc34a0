use crate::id::CurioAddress;
use crate::locks::AccessIntent;
use crate::plugins::{Plugin, PluginKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Operation token: identifies one dispatched operation for lock ownership
/// and receipt lookup (32-byte hash)
pub type OpToken = [u8; 32];

/// The operation class the authorization engine rules on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Transfer,
    Burn,
    UpdateMetadata,
    PluginMutate,
}

/// A requested state transition against the store.
///
/// Each variant knows which records it touches and with what intent; the
/// dispatcher acquires locks in exactly that order. Cross-record
/// operations list the collection before the asset so concurrent
/// operations never acquire in opposite orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    CreateCollection {
        address: CurioAddress,
        name: String,
        uri: String,
        update_authority: CurioAddress,
        plugins: Vec<Plugin>,
        max_supply: Option<u32>,
    },
    CreateAsset {
        address: CurioAddress,
        name: String,
        uri: String,
        owner: CurioAddress,
        update_authority: Option<CurioAddress>,
        collection: Option<CurioAddress>,
        plugins: Vec<Plugin>,
    },
    CreateEdition {
        address: CurioAddress,
        master: CurioAddress,
        name: String,
        uri: String,
        owner: CurioAddress,
    },
    Transfer {
        asset: CurioAddress,
        new_owner: CurioAddress,
        caller: CurioAddress,
    },
    Burn {
        asset: CurioAddress,
        caller: CurioAddress,
    },
    UpdateMetadata {
        asset: CurioAddress,
        name: String,
        uri: String,
        caller: CurioAddress,
    },
    AddPlugin {
        target: CurioAddress,
        plugin: Plugin,
        caller: CurioAddress,
    },
    UpdatePlugin {
        target: CurioAddress,
        plugin: Plugin,
        caller: CurioAddress,
    },
    RemovePlugin {
        target: CurioAddress,
        kind: PluginKind,
        caller: CurioAddress,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateCollection { .. }
            | Operation::CreateAsset { .. }
            | Operation::CreateEdition { .. } => OperationKind::Create,
            Operation::Transfer { .. } => OperationKind::Transfer,
            Operation::Burn { .. } => OperationKind::Burn,
            Operation::UpdateMetadata { .. } => OperationKind::UpdateMetadata,
            Operation::AddPlugin { .. }
            | Operation::UpdatePlugin { .. }
            | Operation::RemovePlugin { .. } => OperationKind::PluginMutate,
        }
    }

    /// The records this operation touches and how, in canonical lock
    /// acquisition order (collection before asset).
    ///
    /// Snapshot reads of a parent collection during transfer/burn
    /// authorization take no lock; only written records appear here with
    /// Write intent.
    pub fn record_intents(&self) -> Vec<(CurioAddress, AccessIntent)> {
        match self {
            Operation::CreateCollection { address, .. } => {
                vec![(*address, AccessIntent::Write)]
            }
            Operation::CreateAsset {
                address, collection, ..
            } => {
                let mut intents = Vec::new();
                if let Some(collection) = collection {
                    intents.push((*collection, AccessIntent::Read));
                }
                intents.push((*address, AccessIntent::Write));
                intents
            }
            Operation::CreateEdition {
                address, master, ..
            } => {
                // The master's print counter advances, so it is written
                vec![(*master, AccessIntent::Write), (*address, AccessIntent::Write)]
            }
            Operation::Transfer { asset, .. } => vec![(*asset, AccessIntent::Write)],
            Operation::Burn { asset, .. } => vec![(*asset, AccessIntent::Write)],
            Operation::UpdateMetadata { asset, .. } => vec![(*asset, AccessIntent::Write)],
            Operation::AddPlugin { target, .. }
            | Operation::UpdatePlugin { target, .. }
            | Operation::RemovePlugin { target, .. } => vec![(*target, AccessIntent::Write)],
        }
    }

    /// Derive the operation token: SHA-256 over the bincode encoding plus a
    /// per-dispatch nonce, so two identical requests still hold distinct
    /// locks.
    pub fn token(&self, nonce: u64) -> OpToken {
        let mut hasher = Sha256::new();
        hasher.update(b"CURIO_Op");
        // Operations are plain owned data; encoding cannot fail
        let bytes = bincode::serialize(self).expect("operation encoding");
        hasher.update(&bytes);
        hasher.update(nonce.to_le_bytes());
        hasher.finalize().into()
    }
}
