use crate::error::CurioError;
use crate::id::CurioAddress;
use crate::operation::OpToken;
use serde::{Deserialize, Serialize};

/// Type of lock held on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockType {
    /// Shared read lock
    Read,
    /// Exclusive write lock
    Write,
}

/// The access intent of an operation on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessIntent {
    Read,
    Write,
}

impl AccessIntent {
    pub fn lock_type(&self) -> LockType {
        match self {
            AccessIntent::Read => LockType::Read,
            AccessIntent::Write => LockType::Write,
        }
    }
}

/// Information about a lock held on a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub record: CurioAddress,
    pub lock_type: LockType,
    /// The operation token holding this lock
    pub holder: OpToken,
    /// When the lock was acquired (Unix timestamp, seconds)
    pub acquired_at: u64,
    /// Optional expiry for the lock (in milliseconds)
    pub timeout_ms: Option<u64>,
}

/// Lock manager serializing concurrent operations against shared records.
///
/// Implementations must grant shared read locks, exclusive write locks,
/// re-entrant acquisition for the same holder, and a read-to-write upgrade
/// when the holder is the sole reader. An acquisition that cannot be
/// granted within the caller's bounded window surfaces
/// [`CurioError::Contention`] rather than blocking indefinitely.
pub trait RecordLockManager: std::fmt::Debug {
    /// Acquire a lock on a record for an operation.
    ///
    /// Returns `Ok(true)` when the lock was granted and
    /// `Err(CurioError::Contention)` when a conflicting holder kept it for
    /// the whole window.
    fn acquire_lock(
        &self,
        record: &CurioAddress,
        lock_type: LockType,
        holder: &OpToken,
        timeout_ms: Option<u64>,
    ) -> Result<bool, CurioError>;

    /// Release a lock on a record for an operation.
    ///
    /// `Ok(false)` means the lock was not found or belongs to a different
    /// holder.
    fn release_lock(&self, record: &CurioAddress, holder: &OpToken) -> Result<bool, CurioError>;

    /// Get the current lock on a record, if any
    fn get_lock_info(&self, record: &CurioAddress) -> Result<Option<LockInfo>, CurioError>;

    /// Check whether the holder could acquire a lock right now, without
    /// taking it
    fn can_acquire_lock(
        &self,
        record: &CurioAddress,
        intent: AccessIntent,
        holder: &OpToken,
    ) -> Result<bool, CurioError>;

    /// Release all locks held by an operation; returns the number released
    fn release_op_locks(&self, holder: &OpToken) -> Result<usize, CurioError>;

    /// Drop locks whose timeout has elapsed; returns the number released
    fn cleanup_expired_locks(&self) -> Result<usize, CurioError>;
}

/// Guard that holds a lock on a record and releases it when dropped
#[derive(Debug)]
pub struct RecordLockGuard<'a, M: RecordLockManager> {
    record: CurioAddress,
    lock_type: LockType,
    holder: OpToken,
    manager: &'a M,
    released: bool,
}

impl<'a, M: RecordLockManager> RecordLockGuard<'a, M> {
    pub fn new(
        record: CurioAddress,
        lock_type: LockType,
        holder: OpToken,
        manager: &'a M,
        timeout_ms: Option<u64>,
    ) -> Result<Self, CurioError> {
        let acquired = manager.acquire_lock(&record, lock_type, &holder, timeout_ms)?;
        if !acquired {
            // Implementations signal contention through the error path
            return Err(CurioError::Contention(record));
        }
        Ok(Self {
            record,
            lock_type,
            holder,
            manager,
            released: false,
        })
    }

    /// Explicitly release the lock before the guard is dropped
    pub fn release(&mut self) -> Result<bool, CurioError> {
        if self.released {
            return Ok(false);
        }
        let released = self.manager.release_lock(&self.record, &self.holder)?;
        self.released = true;
        Ok(released)
    }

    pub fn record(&self) -> &CurioAddress {
        &self.record
    }

    pub fn lock_type(&self) -> LockType {
        self.lock_type
    }

    pub fn holder(&self) -> &OpToken {
        &self.holder
    }
}

impl<'a, M: RecordLockManager> Drop for RecordLockGuard<'a, M> {
    fn drop(&mut self) {
        if !self.released {
            // Ignore release errors during drop
            let _ = self.manager.release_lock(&self.record, &self.holder);
        }
    }
}

impl AccessIntent {
    /// Acquire the respective lock on the record: a shared read lock for
    /// Read intent, an exclusive write lock for Write intent.
    pub fn acquire_lock<'a, M: RecordLockManager>(
        &self,
        record: &CurioAddress,
        holder: &OpToken,
        manager: &'a M,
        timeout_ms: Option<u64>,
    ) -> Result<RecordLockGuard<'a, M>, CurioError> {
        RecordLockGuard::new(*record, self.lock_type(), *holder, manager, timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_maps_to_lock_type() {
        assert_eq!(AccessIntent::Read.lock_type(), LockType::Read);
        assert_eq!(AccessIntent::Write.lock_type(), LockType::Write);
    }
}
