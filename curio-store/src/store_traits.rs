use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use curio_core::records::CurioRecord;
use std::iter::Iterator;

/// Iterator for traversing records in a store snapshot
pub trait CurioStoreIterator: Iterator<Item = Result<CurioRecord, CurioError>> {}

/// Keyed record store for assets and collections.
///
/// The store is the single explicit home of record state: every operation
/// receives a store handle, nothing is global. Mutations are atomic with
/// respect to readers — a reader never observes a partially applied patch.
pub trait CurioStore {
    /// Insert a new record.
    ///
    /// Fails with [`CurioError::DuplicateIdentity`] when the address is
    /// already live or was burned before: addresses are never reused.
    fn insert(&self, record: CurioRecord) -> Result<(), CurioError>;

    /// Fetch a record by address
    fn get(&self, address: &CurioAddress) -> Result<Option<CurioRecord>, CurioError>;

    /// Fetch a record by address, failing with [`CurioError::NotFound`]
    /// when absent
    fn expect(&self, address: &CurioAddress) -> Result<CurioRecord, CurioError> {
        self.get(address)?
            .ok_or_else(|| CurioError::NotFound(address.to_string()))
    }

    /// Read-modify-write a record.
    ///
    /// The patch runs against a copy; record invariants are re-validated
    /// after it returns and the copy only replaces the stored record when
    /// both the patch and the validation succeed. On any error the stored
    /// record is untouched.
    fn update(
        &self,
        address: &CurioAddress,
        patch: &mut dyn FnMut(&mut CurioRecord) -> Result<(), CurioError>,
    ) -> Result<CurioRecord, CurioError>;

    /// Remove a burned record, leaving a tombstone so the address can never
    /// be reused and a second burn is distinguishable from NotFound
    fn mark_burned(&self, address: &CurioAddress) -> Result<CurioRecord, CurioError>;

    /// Whether the address belongs to a burned record
    fn is_burned(&self, address: &CurioAddress) -> Result<bool, CurioError>;

    /// Iterate a consistent snapshot of all live records
    fn scan(&self) -> Box<dyn CurioStoreIterator + '_>;
}
