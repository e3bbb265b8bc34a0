use crate::authorize::{authorize_asset_op, authorize_collection_op};
use crate::oracle::{OracleEvaluator, TableOracle};
use chrono::Utc;
use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use curio_core::locks::RecordLockManager;
use curio_core::operation::{OpToken, Operation, OperationKind};
use curio_core::plugins::{Plugin, PluginKind};
use curio_core::records::{
    AssetRecord, CollectionRecord, CurioRecord, EditionTag, MasterEditionInfo,
};
use curio_store::{CurioStore, EditionRegistry, InMemoryLockManager, InMemoryStore};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// The before and after state of one record touched by an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEffect {
    pub record: CurioAddress,
    /// None when the operation created the record
    pub before: Option<CurioRecord>,
    /// None when the operation burned the record
    pub after: Option<CurioRecord>,
}

/// A receipt of one dispatched operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub token: OpToken,
    pub kind: OperationKind,
    pub success: bool,
    pub error_message: Option<String>,
    /// Unix timestamp (seconds) of when the operation was dispatched
    pub timestamp: i64,
    pub effects: Vec<RecordEffect>,
}

impl OperationReceipt {
    pub fn new(token: OpToken, kind: OperationKind, timestamp: i64) -> Self {
        Self {
            token,
            kind,
            success: true,
            error_message: None,
            timestamp,
            effects: Vec::new(),
        }
    }

    pub fn add_effect(&mut self, effect: RecordEffect) {
        self.effects.push(effect);
    }

    pub fn set_error(&mut self, error: String) {
        self.success = false;
        self.error_message = Some(error);
        // A failed operation committed nothing
        self.effects.clear();
    }
}

/// Storage interface for operation receipts
pub trait ReceiptLog {
    fn store_receipt(&self, receipt: OperationReceipt) -> Result<(), CurioError>;

    fn get_receipt(&self, token: &OpToken) -> Result<Option<OperationReceipt>, CurioError>;

    /// All receipts whose effects touched the given record
    fn receipts_for_record(
        &self,
        record: &CurioAddress,
    ) -> Result<Vec<OperationReceipt>, CurioError>;
}

/// In-memory receipt log
#[derive(Debug, Default)]
pub struct InMemoryReceiptLog {
    receipts: Mutex<HashMap<OpToken, OperationReceipt>>,
}

impl ReceiptLog for InMemoryReceiptLog {
    fn store_receipt(&self, receipt: OperationReceipt) -> Result<(), CurioError> {
        self.receipts
            .lock()
            .expect("receipt log poisoned")
            .insert(receipt.token, receipt);
        Ok(())
    }

    fn get_receipt(&self, token: &OpToken) -> Result<Option<OperationReceipt>, CurioError> {
        Ok(self
            .receipts
            .lock()
            .expect("receipt log poisoned")
            .get(token)
            .cloned())
    }

    fn receipts_for_record(
        &self,
        record: &CurioAddress,
    ) -> Result<Vec<OperationReceipt>, CurioError> {
        let receipts = self.receipts.lock().expect("receipt log poisoned");
        let mut matching: Vec<OperationReceipt> = receipts
            .values()
            .filter(|r| r.effects.iter().any(|e| &e.record == record))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        Ok(matching)
    }
}

/// The operation dispatcher: the single entry surface for callers.
///
/// Every mutating operation derives an [`OpToken`], acquires record locks
/// in the operation's canonical order (collection before asset), runs the
/// authorization engine, validates, mutates the store, and records a
/// receipt. Failure on any step leaves the target records byte-identical
/// to their pre-call state.
#[derive(Debug)]
pub struct CurioRuntime<S: CurioStore, L: RecordLockManager> {
    store: S,
    locks: L,
    editions: EditionRegistry,
    oracle: Arc<dyn OracleEvaluator + Send + Sync>,
    receipts: InMemoryReceiptLog,
    nonce: AtomicU64,
    /// Expiry stamped on every acquired lock, so a crashed caller cannot
    /// wedge a record forever
    lock_expiry_ms: Option<u64>,
}

/// Runtime over the in-memory store and lock manager
pub type InMemoryRuntime = CurioRuntime<InMemoryStore, InMemoryLockManager>;

impl InMemoryRuntime {
    /// Fully in-memory runtime with a table oracle that approves
    /// everything until told otherwise
    pub fn in_memory() -> Self {
        Self::new(
            InMemoryStore::new(),
            InMemoryLockManager::default(),
            Arc::new(TableOracle::new()),
        )
    }

    /// In-memory runtime sharing the given oracle table with the caller
    pub fn with_oracle(oracle: Arc<dyn OracleEvaluator + Send + Sync>) -> Self {
        Self::new(InMemoryStore::new(), InMemoryLockManager::default(), oracle)
    }
}

impl<S: CurioStore, L: RecordLockManager> CurioRuntime<S, L> {
    pub fn new(store: S, locks: L, oracle: Arc<dyn OracleEvaluator + Send + Sync>) -> Self {
        Self {
            store,
            locks,
            editions: EditionRegistry::new(),
            oracle,
            receipts: InMemoryReceiptLog::default(),
            nonce: AtomicU64::new(0),
            lock_expiry_ms: Some(30_000),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn editions(&self) -> &EditionRegistry {
        &self.editions
    }

    pub fn receipt(&self, token: &OpToken) -> Option<OperationReceipt> {
        self.receipts.get_receipt(token).ok().flatten()
    }

    pub fn receipts_for_record(&self, record: &CurioAddress) -> Vec<OperationReceipt> {
        self.receipts
            .receipts_for_record(record)
            .unwrap_or_default()
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::Relaxed)
    }

    fn derive_address(&self, tag: &[u8], name: &str) -> CurioAddress {
        let nonce = self.next_nonce().to_le_bytes();
        let (address, _) = CurioAddress::derive(&[tag, name.as_bytes(), &nonce]);
        address
    }

    /// Acquire locks, execute, record the receipt, release. The closure
    /// only commits through the store, which is atomic per record, so an
    /// error at any point leaves no partial mutation behind.
    fn dispatch<T>(
        &self,
        op: Operation,
        exec: impl FnOnce(&OpToken, &mut OperationReceipt) -> Result<T, CurioError>,
    ) -> Result<T, CurioError> {
        let token = op.token(self.next_nonce());
        let mut receipt = OperationReceipt::new(token, op.kind(), Utc::now().timestamp());

        let mut guards = Vec::new();
        for (record, intent) in op.record_intents() {
            match intent.acquire_lock(&record, &token, &self.locks, self.lock_expiry_ms) {
                Ok(guard) => guards.push(guard),
                Err(err) => {
                    debug!("lock acquisition failed for {}: {}", record, err);
                    receipt.set_error(err.to_string());
                    self.receipts.store_receipt(receipt)?;
                    return Err(err);
                }
            }
        }

        let result = exec(&token, &mut receipt);
        if let Err(err) = &result {
            receipt.set_error(err.to_string());
        }
        self.receipts.store_receipt(receipt)?;
        result
    }

    /// Parent collection of an asset, fetched as a snapshot read
    fn parent_collection(
        &self,
        asset: &AssetRecord,
    ) -> Result<Option<CollectionRecord>, CurioError> {
        match asset.collection {
            Some(address) => {
                let record = self.store.expect(&address)?;
                let collection = record.as_collection().cloned().ok_or_else(|| {
                    CurioError::InvalidState(format!("{} is not a collection", address))
                })?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    /// Fetch a live asset, reporting a burn distinctly from a miss
    fn live_asset(&self, address: &CurioAddress) -> Result<AssetRecord, CurioError> {
        if self.store.is_burned(address)? {
            return Err(CurioError::InvalidState(format!(
                "asset {} is already burned",
                address
            )));
        }
        let record = self.store.expect(address)?;
        record
            .as_asset()
            .cloned()
            .ok_or_else(|| CurioError::InvalidState(format!("{} is not an asset", address)))
    }

    // ---- creation ----

    pub fn create_collection(
        &self,
        name: &str,
        uri: &str,
        update_authority: CurioAddress,
    ) -> Result<CurioAddress, CurioError> {
        self.create_collection_inner(name, uri, update_authority, Vec::new(), None)
    }

    /// Create a collection with a plugin attached atomically at creation.
    /// This is the only path that accepts permanent plugin kinds.
    pub fn create_collection_with_plugin(
        &self,
        name: &str,
        uri: &str,
        update_authority: CurioAddress,
        plugin: Plugin,
    ) -> Result<CurioAddress, CurioError> {
        self.create_collection_inner(name, uri, update_authority, vec![plugin], None)
    }

    /// Create a supply-limited master edition collection
    pub fn create_master_edition(
        &self,
        name: &str,
        uri: &str,
        update_authority: CurioAddress,
        max_supply: u32,
    ) -> Result<CurioAddress, CurioError> {
        self.create_collection_inner(name, uri, update_authority, Vec::new(), Some(max_supply))
    }

    fn create_collection_inner(
        &self,
        name: &str,
        uri: &str,
        update_authority: CurioAddress,
        plugins: Vec<Plugin>,
        max_supply: Option<u32>,
    ) -> Result<CurioAddress, CurioError> {
        let address = self.derive_address(b"collection", name);
        let op = Operation::CreateCollection {
            address,
            name: name.to_string(),
            uri: uri.to_string(),
            update_authority,
            plugins: plugins.clone(),
            max_supply,
        };
        self.dispatch(op, |_, receipt| {
            let mut collection = CollectionRecord::new(
                address,
                name.to_string(),
                uri.to_string(),
                update_authority,
                plugins,
            )?;
            if let Some(max_supply) = max_supply {
                collection.master_edition = Some(MasterEditionInfo { max_supply });
            }

            let record = CurioRecord::Collection(collection);
            self.store.insert(record.clone())?;
            if let Some(max_supply) = max_supply {
                self.editions.register_master(&address, max_supply)?;
            }
            receipt.add_effect(RecordEffect {
                record: address,
                before: None,
                after: Some(record),
            });
            Ok(address)
        })
    }

    /// Create an asset, optionally under a collection.
    ///
    /// A collection-governed asset must not carry its own update authority
    /// (it inherits the collection's); permanent plugins are accepted here
    /// and nowhere later.
    pub fn create_asset(
        &self,
        name: &str,
        uri: &str,
        owner: CurioAddress,
        update_authority: Option<CurioAddress>,
        collection: Option<CurioAddress>,
        plugins: Vec<Plugin>,
    ) -> Result<CurioAddress, CurioError> {
        let address = self.derive_address(b"asset", name);
        let op = Operation::CreateAsset {
            address,
            name: name.to_string(),
            uri: uri.to_string(),
            owner,
            update_authority,
            collection,
            plugins: plugins.clone(),
        };
        self.dispatch(op, |_, receipt| {
            if let Some(collection_address) = collection {
                let parent = self.store.expect(&collection_address)?;
                if !parent.is_collection() {
                    return Err(CurioError::InvalidState(format!(
                        "{} is not a collection",
                        collection_address
                    )));
                }
            }

            let asset = AssetRecord::new(
                address,
                name.to_string(),
                uri.to_string(),
                owner,
                update_authority,
                collection,
                plugins,
            )?;
            let record = CurioRecord::Asset(asset);
            self.store.insert(record.clone())?;
            receipt.add_effect(RecordEffect {
                record: address,
                before: None,
                after: Some(record),
            });
            Ok(address)
        })
    }

    /// Mint the next numbered print of a master edition collection.
    ///
    /// Number reservation is the final fallible step, so a mint that fails
    /// validation never consumes a number; the master's write lock
    /// serializes concurrent mints.
    pub fn create_edition(
        &self,
        master: CurioAddress,
        name: &str,
        uri: &str,
        owner: CurioAddress,
    ) -> Result<(CurioAddress, u32), CurioError> {
        let address = self.derive_address(b"edition", name);
        let op = Operation::CreateEdition {
            address,
            master,
            name: name.to_string(),
            uri: uri.to_string(),
            owner,
        };
        self.dispatch(op, |_, receipt| {
            let record = self.store.expect(&master)?;
            let collection = record.as_collection().ok_or_else(|| {
                CurioError::InvalidState(format!("{} is not a collection", master))
            })?;
            if collection.master_edition.is_none() {
                return Err(CurioError::InvalidState(format!(
                    "{} is not a master edition collection",
                    master
                )));
            }

            if self.store.get(&address)?.is_some() || self.store.is_burned(&address)? {
                return Err(CurioError::DuplicateIdentity(address));
            }

            let mut asset = AssetRecord::new(
                address,
                name.to_string(),
                uri.to_string(),
                owner,
                None,
                Some(master),
                Vec::new(),
            )?;

            let number = self.editions.reserve(&master)?;
            asset.edition = Some(EditionTag { master, number });

            let record = CurioRecord::Asset(asset);
            self.store.insert(record.clone())?;
            receipt.add_effect(RecordEffect {
                record: address,
                before: None,
                after: Some(record),
            });
            Ok((address, number))
        })
    }

    // ---- lifecycle ----

    pub fn transfer_asset(
        &self,
        asset: CurioAddress,
        new_owner: CurioAddress,
        caller: CurioAddress,
    ) -> Result<(), CurioError> {
        let op = Operation::Transfer {
            asset,
            new_owner,
            caller,
        };
        self.dispatch(op, |_, receipt| {
            let current = self.live_asset(&asset)?;
            let collection = self.parent_collection(&current)?;
            authorize_asset_op(
                OperationKind::Transfer,
                &current,
                collection.as_ref(),
                &caller,
                self.oracle.as_ref(),
            )?;

            let before = CurioRecord::Asset(current);
            let after = self.store.update(&asset, &mut |record| {
                let a = record.as_asset_mut().ok_or_else(|| {
                    CurioError::InvalidState(format!("{} is not an asset", asset))
                })?;
                a.owner = new_owner;
                // Owner-managed transfer delegation never outlives an owner
                if a.plugins.contains(PluginKind::TransferDelegate) {
                    a.plugins.detach(PluginKind::TransferDelegate)?;
                }
                Ok(())
            })?;

            debug!("transferred {} to {}", asset, new_owner);
            receipt.add_effect(RecordEffect {
                record: asset,
                before: Some(before),
                after: Some(after),
            });
            Ok(())
        })
    }

    pub fn burn_asset(&self, asset: CurioAddress, caller: CurioAddress) -> Result<(), CurioError> {
        let op = Operation::Burn { asset, caller };
        self.dispatch(op, |_, receipt| {
            let current = self.live_asset(&asset)?;
            let collection = self.parent_collection(&current)?;
            authorize_asset_op(
                OperationKind::Burn,
                &current,
                collection.as_ref(),
                &caller,
                self.oracle.as_ref(),
            )?;

            let removed = self.store.mark_burned(&asset)?;
            debug!("burned {}", asset);
            receipt.add_effect(RecordEffect {
                record: asset,
                before: Some(removed),
                after: None,
            });
            Ok(())
        })
    }

    pub fn update_metadata(
        &self,
        asset: CurioAddress,
        name: &str,
        uri: &str,
        caller: CurioAddress,
    ) -> Result<(), CurioError> {
        let op = Operation::UpdateMetadata {
            asset,
            name: name.to_string(),
            uri: uri.to_string(),
            caller,
        };
        self.dispatch(op, |_, receipt| {
            let current = self.live_asset(&asset)?;
            let collection = self.parent_collection(&current)?;
            authorize_asset_op(
                OperationKind::UpdateMetadata,
                &current,
                collection.as_ref(),
                &caller,
                self.oracle.as_ref(),
            )?;

            let before = CurioRecord::Asset(current);
            let after = self.store.update(&asset, &mut |record| {
                let a = record.as_asset_mut().ok_or_else(|| {
                    CurioError::InvalidState(format!("{} is not an asset", asset))
                })?;
                a.name = name.to_string();
                a.uri = uri.to_string();
                Ok(())
            })?;

            receipt.add_effect(RecordEffect {
                record: asset,
                before: Some(before),
                after: Some(after),
            });
            Ok(())
        })
    }

    // ---- plugins ----

    /// Attach a plugin to an asset or collection after creation.
    ///
    /// Permanent kinds are rejected here: they exist from creation or not
    /// at all.
    pub fn add_plugin(
        &self,
        target: CurioAddress,
        plugin: Plugin,
        caller: CurioAddress,
    ) -> Result<(), CurioError> {
        let op = Operation::AddPlugin {
            target,
            plugin: plugin.clone(),
            caller,
        };
        self.dispatch(op, |_, receipt| {
            if plugin.is_permanent() {
                return Err(CurioError::PluginAlreadyPermanent(plugin.kind()));
            }
            plugin.validate()?;
            self.authorize_plugin_mutation(&target, &caller)?;

            let before = self.store.expect(&target)?;
            let after = self.store.update(&target, &mut |record| {
                record.plugins_mut().attach(plugin.clone())
            })?;

            receipt.add_effect(RecordEffect {
                record: target,
                before: Some(before),
                after: Some(after),
            });
            Ok(())
        })
    }

    /// Replace an attached plugin's payload.
    ///
    /// Of the permanent kinds only the freeze delegate accepts updates
    /// (toggling its frozen flag); the permanent delegates are immutable.
    pub fn update_plugin(
        &self,
        target: CurioAddress,
        plugin: Plugin,
        caller: CurioAddress,
    ) -> Result<(), CurioError> {
        let op = Operation::UpdatePlugin {
            target,
            plugin: plugin.clone(),
            caller,
        };
        self.dispatch(op, |_, receipt| {
            let kind = plugin.kind();
            if kind.is_permanent() && kind != PluginKind::PermanentFreezeDelegate {
                return Err(CurioError::ImmutablePlugin(kind));
            }
            plugin.validate()?;

            let before = self.store.expect(&target)?;
            if !before.plugins().contains(kind) {
                return Err(CurioError::PluginNotFound(kind));
            }
            self.authorize_plugin_mutation(&target, &caller)?;

            let after = self.store.update(&target, &mut |record| {
                record.plugins_mut().replace(plugin.clone())
            })?;

            receipt.add_effect(RecordEffect {
                record: target,
                before: Some(before),
                after: Some(after),
            });
            Ok(())
        })
    }

    /// Detach a non-permanent plugin
    pub fn remove_plugin(
        &self,
        target: CurioAddress,
        kind: PluginKind,
        caller: CurioAddress,
    ) -> Result<(), CurioError> {
        let op = Operation::RemovePlugin {
            target,
            kind,
            caller,
        };
        self.dispatch(op, |_, receipt| {
            if kind.is_permanent() {
                return Err(CurioError::ImmutablePlugin(kind));
            }

            let before = self.store.expect(&target)?;
            if !before.plugins().contains(kind) {
                return Err(CurioError::PluginNotFound(kind));
            }
            self.authorize_plugin_mutation(&target, &caller)?;

            let after = self
                .store
                .update(&target, &mut |record| {
                    record.plugins_mut().detach(kind).map(|_| ())
                })?;

            receipt.add_effect(RecordEffect {
                record: target,
                before: Some(before),
                after: Some(after),
            });
            Ok(())
        })
    }

    fn authorize_plugin_mutation(
        &self,
        target: &CurioAddress,
        caller: &CurioAddress,
    ) -> Result<(), CurioError> {
        if self.store.is_burned(target)? {
            return Err(CurioError::InvalidState(format!(
                "record {} is already burned",
                target
            )));
        }
        match self.store.expect(target)? {
            CurioRecord::Asset(asset) => {
                let collection = self.parent_collection(&asset)?;
                authorize_asset_op(
                    OperationKind::PluginMutate,
                    &asset,
                    collection.as_ref(),
                    caller,
                    self.oracle.as_ref(),
                )
            }
            CurioRecord::Collection(collection) => authorize_collection_op(&collection, caller),
        }
    }

    // ---- reads ----

    /// Snapshot read of a live asset
    pub fn get_asset(&self, address: &CurioAddress) -> Result<AssetRecord, CurioError> {
        let record = self.store.expect(address)?;
        record
            .as_asset()
            .cloned()
            .ok_or_else(|| CurioError::InvalidState(format!("{} is not an asset", address)))
    }

    /// Snapshot read of a collection
    pub fn get_collection(&self, address: &CurioAddress) -> Result<CollectionRecord, CurioError> {
        let record = self.store.expect(address)?;
        record
            .as_collection()
            .cloned()
            .ok_or_else(|| CurioError::InvalidState(format!("{} is not a collection", address)))
    }

    /// The lock manager serializing this runtime's operations
    pub fn locks(&self) -> &L {
        &self.locks
    }
}
