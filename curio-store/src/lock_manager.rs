use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use curio_core::locks::{AccessIntent, LockInfo, LockType, RecordLockManager};
use curio_core::operation::OpToken;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Helper function to get the current timestamp in seconds
pub fn current_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// How often a blocked acquisition re-checks the lock table
const ACQUIRE_POLL: Duration = Duration::from_millis(5);

/// In-memory lock manager: shared readers, exclusive writers, re-entrant
/// acquisition for the same operation, and a read-to-write upgrade when the
/// operation is the sole reader.
///
/// An acquisition that stays blocked for the whole acquisition window fails
/// with [`CurioError::Contention`] instead of waiting forever.
#[derive(Debug)]
pub struct InMemoryLockManager {
    locks: Mutex<HashMap<CurioAddress, Vec<LockInfo>>>,
    /// Bounded window a blocked acquisition may wait before giving up
    acquire_window: Duration,
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl InMemoryLockManager {
    pub fn new(acquire_window: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            acquire_window,
        }
    }

    fn is_expired(info: &LockInfo, now_secs: u64) -> bool {
        match info.timeout_ms {
            Some(timeout_ms) => now_secs >= info.acquired_at + timeout_ms / 1000,
            None => false,
        }
    }

    fn purge_expired(entries: &mut Vec<LockInfo>, now_secs: u64) {
        entries.retain(|info| {
            let expired = Self::is_expired(info, now_secs);
            if expired {
                warn!("dropping expired lock on {}", info.record);
            }
            !expired
        });
    }

    /// One non-blocking attempt. `Ok(true)` = granted, `Ok(false)` = a
    /// conflicting holder is in the way.
    fn try_acquire(
        &self,
        record: &CurioAddress,
        lock_type: LockType,
        holder: &OpToken,
        timeout_ms: Option<u64>,
    ) -> Result<bool, CurioError> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        let now = current_time_secs();
        let entries = table.entry(*record).or_default();
        Self::purge_expired(entries, now);

        if let Some(pos) = entries.iter().position(|info| &info.holder == holder) {
            match (entries[pos].lock_type, lock_type) {
                // Re-entrant: already holding the same or a stronger lock
                (LockType::Write, _) | (LockType::Read, LockType::Read) => return Ok(true),
                // Upgrade is only safe while we are the sole reader
                (LockType::Read, LockType::Write) => {
                    if entries.len() == 1 {
                        entries[pos].lock_type = LockType::Write;
                        entries[pos].acquired_at = now;
                        entries[pos].timeout_ms = timeout_ms;
                        return Ok(true);
                    }
                    return Ok(false);
                }
            }
        }

        let compatible = match lock_type {
            LockType::Read => entries.iter().all(|info| info.lock_type == LockType::Read),
            LockType::Write => entries.is_empty(),
        };
        if !compatible {
            return Ok(false);
        }

        entries.push(LockInfo {
            record: *record,
            lock_type,
            holder: *holder,
            acquired_at: now,
            timeout_ms,
        });
        Ok(true)
    }
}

impl RecordLockManager for InMemoryLockManager {
    fn acquire_lock(
        &self,
        record: &CurioAddress,
        lock_type: LockType,
        holder: &OpToken,
        timeout_ms: Option<u64>,
    ) -> Result<bool, CurioError> {
        let deadline = Instant::now() + self.acquire_window;
        loop {
            if self.try_acquire(record, lock_type, holder, timeout_ms)? {
                debug!("acquired {:?} lock on {}", lock_type, record);
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("contention on {} after bounded wait", record);
                return Err(CurioError::Contention(*record));
            }
            std::thread::sleep(ACQUIRE_POLL);
        }
    }

    fn release_lock(&self, record: &CurioAddress, holder: &OpToken) -> Result<bool, CurioError> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        let Some(entries) = table.get_mut(record) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|info| &info.holder != holder);
        let released = entries.len() < before;
        if entries.is_empty() {
            table.remove(record);
        }
        Ok(released)
    }

    fn get_lock_info(&self, record: &CurioAddress) -> Result<Option<LockInfo>, CurioError> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        let now = current_time_secs();
        let Some(entries) = table.get_mut(record) else {
            return Ok(None);
        };
        Self::purge_expired(entries, now);
        Ok(entries.first().cloned())
    }

    fn can_acquire_lock(
        &self,
        record: &CurioAddress,
        intent: AccessIntent,
        holder: &OpToken,
    ) -> Result<bool, CurioError> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        let now = current_time_secs();
        let Some(entries) = table.get_mut(record) else {
            return Ok(true);
        };
        Self::purge_expired(entries, now);

        if let Some(own) = entries.iter().find(|info| &info.holder == holder) {
            return Ok(match (own.lock_type, intent.lock_type()) {
                (LockType::Write, _) | (LockType::Read, LockType::Read) => true,
                (LockType::Read, LockType::Write) => entries.len() == 1,
            });
        }
        Ok(match intent.lock_type() {
            LockType::Read => entries.iter().all(|info| info.lock_type == LockType::Read),
            LockType::Write => entries.is_empty(),
        })
    }

    fn release_op_locks(&self, holder: &OpToken) -> Result<usize, CurioError> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        let mut released = 0;
        table.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|info| &info.holder != holder);
            released += before - entries.len();
            !entries.is_empty()
        });
        Ok(released)
    }

    fn cleanup_expired_locks(&self) -> Result<usize, CurioError> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        let now = current_time_secs();
        let mut dropped = 0;
        table.retain(|_, entries| {
            let before = entries.len();
            Self::purge_expired(entries, now);
            dropped += before - entries.len();
            !entries.is_empty()
        });
        Ok(dropped)
    }
}
