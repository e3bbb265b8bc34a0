use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

/// Live print-run state for one master-edition collection
#[derive(Debug, Clone, Copy)]
struct PrintRun {
    max_supply: u32,
    /// Next number to hand out, 1-based. Never decreases: burns leave
    /// permanent gaps and numbers are never reused.
    next_number: u32,
}

/// Tracks each master-edition collection's print count and max supply.
///
/// Reservation is the single atomic step of a mint: the dispatcher runs all
/// other validation first (under the master's write lock) and only then
/// calls [`reserve`](EditionRegistry::reserve), so a failed mint never
/// consumes a number.
#[derive(Debug, Default)]
pub struct EditionRegistry {
    runs: Mutex<HashMap<CurioAddress, PrintRun>>,
}

impl EditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a master-edition collection
    pub fn register_master(
        &self,
        master: &CurioAddress,
        max_supply: u32,
    ) -> Result<(), CurioError> {
        let mut runs = self.runs.lock().expect("edition registry poisoned");
        if runs.contains_key(master) {
            return Err(CurioError::DuplicateIdentity(*master));
        }
        runs.insert(
            *master,
            PrintRun {
                max_supply,
                next_number: 1,
            },
        );
        Ok(())
    }

    /// Whether the collection is tracked as a master edition
    pub fn is_master(&self, master: &CurioAddress) -> bool {
        self.runs
            .lock()
            .expect("edition registry poisoned")
            .contains_key(master)
    }

    /// Atomically reserve the next edition number for a mint.
    ///
    /// Fails with [`CurioError::SupplyExhausted`] once the declared max
    /// supply is reached.
    pub fn reserve(&self, master: &CurioAddress) -> Result<u32, CurioError> {
        let mut runs = self.runs.lock().expect("edition registry poisoned");
        let run = runs
            .get_mut(master)
            .ok_or_else(|| CurioError::NotFound(format!("master edition {}", master)))?;

        if run.next_number > run.max_supply {
            return Err(CurioError::SupplyExhausted {
                max_supply: run.max_supply,
            });
        }

        let number = run.next_number;
        run.next_number += 1;
        debug!("reserved edition {}/{} of {}", number, run.max_supply, master);
        Ok(number)
    }

    /// Total numbers handed out so far (burns never decrement this)
    pub fn minted(&self, master: &CurioAddress) -> Result<u32, CurioError> {
        let runs = self.runs.lock().expect("edition registry poisoned");
        let run = runs
            .get(master)
            .ok_or_else(|| CurioError::NotFound(format!("master edition {}", master)))?;
        Ok(run.next_number - 1)
    }

    /// The declared max supply of a master edition
    pub fn max_supply(&self, master: &CurioAddress) -> Result<u32, CurioError> {
        let runs = self.runs.lock().expect("edition registry poisoned");
        let run = runs
            .get(master)
            .ok_or_else(|| CurioError::NotFound(format!("master edition {}", master)))?;
        Ok(run.max_supply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> CurioAddress {
        CurioAddress::new([byte; 32])
    }

    #[test]
    fn test_numbers_run_from_one_to_max() {
        let registry = EditionRegistry::new();
        let master = addr(1);
        registry.register_master(&master, 3).unwrap();

        assert_eq!(registry.reserve(&master).unwrap(), 1);
        assert_eq!(registry.reserve(&master).unwrap(), 2);
        assert_eq!(registry.reserve(&master).unwrap(), 3);

        let err = registry.reserve(&master).unwrap_err();
        assert!(matches!(err, CurioError::SupplyExhausted { max_supply: 3 }));
        assert_eq!(registry.minted(&master).unwrap(), 3);
    }

    #[test]
    fn test_unregistered_master_is_not_found() {
        let registry = EditionRegistry::new();
        assert!(matches!(
            registry.reserve(&addr(1)),
            Err(CurioError::NotFound(_))
        ));
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = EditionRegistry::new();
        registry.register_master(&addr(1), 10).unwrap();
        assert!(matches!(
            registry.register_master(&addr(1), 10),
            Err(CurioError::DuplicateIdentity(_))
        ));
    }

    #[test]
    fn test_concurrent_reservations_never_collide() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let registry = Arc::new(EditionRegistry::new());
        let master = addr(1);
        registry.register_master(&master, 64).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                let mut numbers = Vec::new();
                for _ in 0..8 {
                    numbers.push(registry.reserve(&master).unwrap());
                }
                numbers
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(seen.insert(number), "edition number handed out twice");
            }
        }
        assert_eq!(seen.len(), 64);
        assert!(matches!(
            registry.reserve(&master),
            Err(CurioError::SupplyExhausted { .. })
        ));
    }
}
