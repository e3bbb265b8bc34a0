use crate::store_traits::{CurioStore, CurioStoreIterator};
use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use curio_core::records::CurioRecord;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory record store: a guarded map of live records plus a tombstone
/// set for burned addresses.
///
/// Reads clone under the read guard, so every read observes a consistent
/// committed state. Updates are applied to a copy and swapped in whole.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<CurioAddress, CurioRecord>,
    burned: HashSet<CurioAddress>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.inner.read().expect("store lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot iterator over cloned records
pub struct InMemoryStoreIterator {
    records: std::vec::IntoIter<CurioRecord>,
}

impl Iterator for InMemoryStoreIterator {
    type Item = Result<CurioRecord, CurioError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(Ok)
    }
}

impl CurioStoreIterator for InMemoryStoreIterator {}

impl CurioStore for InMemoryStore {
    fn insert(&self, record: CurioRecord) -> Result<(), CurioError> {
        record.validate()?;
        let address = *record.address();
        let mut inner = self.inner.write().expect("store lock poisoned");
        if inner.records.contains_key(&address) || inner.burned.contains(&address) {
            return Err(CurioError::DuplicateIdentity(address));
        }
        debug!("insert {}", address);
        inner.records.insert(address, record);
        Ok(())
    }

    fn get(&self, address: &CurioAddress) -> Result<Option<CurioRecord>, CurioError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.records.get(address).cloned())
    }

    fn update(
        &self,
        address: &CurioAddress,
        patch: &mut dyn FnMut(&mut CurioRecord) -> Result<(), CurioError>,
    ) -> Result<CurioRecord, CurioError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let current = inner
            .records
            .get(address)
            .ok_or_else(|| CurioError::NotFound(address.to_string()))?;

        // Patch a copy; the stored record only changes if the patch and the
        // invariant re-check both succeed.
        let mut updated = current.clone();
        patch(&mut updated)?;
        updated.validate()?;

        if updated.address() != address {
            return Err(CurioError::InvalidState(
                "a patch cannot change a record's address".to_string(),
            ));
        }

        debug!("update {}", address);
        inner.records.insert(*address, updated.clone());
        Ok(updated)
    }

    fn mark_burned(&self, address: &CurioAddress) -> Result<CurioRecord, CurioError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if inner.burned.contains(address) {
            return Err(CurioError::InvalidState(format!(
                "record {} is already burned",
                address
            )));
        }
        let record = inner
            .records
            .remove(address)
            .ok_or_else(|| CurioError::NotFound(address.to_string()))?;
        inner.burned.insert(*address);
        debug!("burn {}", address);
        Ok(record)
    }

    fn is_burned(&self, address: &CurioAddress) -> Result<bool, CurioError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.burned.contains(address))
    }

    fn scan(&self) -> Box<dyn CurioStoreIterator + '_> {
        let inner = self.inner.read().expect("store lock poisoned");
        let records: Vec<CurioRecord> = inner.records.values().cloned().collect();
        Box::new(InMemoryStoreIterator {
            records: records.into_iter(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curio_core::records::{AssetRecord, CollectionRecord};

    fn asset(address: CurioAddress, owner: CurioAddress) -> CurioRecord {
        AssetRecord::new(
            address,
            "Asset".to_string(),
            "https://example.com/asset.json".to_string(),
            owner,
            Some(owner),
            None,
            vec![],
        )
        .unwrap()
        .into()
    }

    fn addr(byte: u8) -> CurioAddress {
        CurioAddress::new([byte; 32])
    }

    #[test]
    fn test_insert_then_get() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();

        let record = store.expect(&addr(1)).unwrap();
        assert_eq!(record.name(), "Asset");
        assert!(store.get(&addr(9)).unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_duplicate_address() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();
        let err = store.insert(asset(addr(1), addr(3))).unwrap_err();
        assert!(matches!(err, CurioError::DuplicateIdentity(_)));
    }

    #[test]
    fn test_burned_address_is_never_reused() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();
        store.mark_burned(&addr(1)).unwrap();

        assert!(store.is_burned(&addr(1)).unwrap());
        assert!(store.get(&addr(1)).unwrap().is_none());

        let err = store.insert(asset(addr(1), addr(2))).unwrap_err();
        assert!(matches!(err, CurioError::DuplicateIdentity(_)));
    }

    #[test]
    fn test_double_burn_is_invalid_state() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();
        store.mark_burned(&addr(1)).unwrap();
        let err = store.mark_burned(&addr(1)).unwrap_err();
        assert!(matches!(err, CurioError::InvalidState(_)));
    }

    #[test]
    fn test_failed_patch_leaves_record_untouched() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();

        let err = store
            .update(&addr(1), &mut |record| {
                if let Some(a) = record.as_asset_mut() {
                    a.name = "Mutated".to_string();
                }
                Err(CurioError::Other("patch failed".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, CurioError::Other(_)));

        let record = store.expect(&addr(1)).unwrap();
        assert_eq!(record.name(), "Asset");
    }

    #[test]
    fn test_patch_violating_invariants_is_rolled_back() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();

        // Giving a collection-governed asset its own authority violates the
        // record invariant and must not commit.
        let err = store
            .update(&addr(1), &mut |record| {
                let a = record.as_asset_mut().unwrap();
                a.collection = Some(addr(5));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, CurioError::InvalidState(_)));

        let record = store.expect(&addr(1)).unwrap();
        assert!(record.as_asset().unwrap().collection.is_none());
    }

    #[test]
    fn test_scan_yields_live_records_only() {
        let store = InMemoryStore::new();
        store.insert(asset(addr(1), addr(2))).unwrap();
        store.insert(asset(addr(3), addr(2))).unwrap();
        store
            .insert(
                CurioRecord::Collection(
                    CollectionRecord::new(
                        addr(4),
                        "Collection".to_string(),
                        "uri".to_string(),
                        addr(2),
                        vec![],
                    )
                    .unwrap(),
                ),
            )
            .unwrap();
        store.mark_burned(&addr(3)).unwrap();

        let scanned: Vec<_> = store.scan().collect::<Result<_, _>>().unwrap();
        assert_eq!(scanned.len(), 2);
        assert!(scanned.iter().all(|r| r.address() != &addr(3)));
    }
}
