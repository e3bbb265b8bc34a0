use curio_core::error::CurioError;
use curio_core::id::CurioAddress;
use curio_core::plugins::LifecycleEvent;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

/// The answer an external rule evaluator gives for one lifecycle check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVerdict {
    Approve,
    Reject,
}

/// Boundary to the external rule evaluation an oracle plugin defers to.
///
/// The engine treats the evaluator as opaque: it asks one question per
/// registered check and honors the verdict. A rejection overrides owner
/// consent.
pub trait OracleEvaluator: std::fmt::Debug {
    fn evaluate(
        &self,
        base_address: &CurioAddress,
        event: LifecycleEvent,
        asset: &CurioAddress,
    ) -> Result<OracleVerdict, CurioError>;
}

/// In-memory rule table: maps an oracle account and lifecycle event to a
/// fixed verdict. Unknown entries approve, so an oracle plugin with no
/// configured rule never bricks its asset by accident.
#[derive(Debug, Default)]
pub struct TableOracle {
    verdicts: Mutex<HashMap<(CurioAddress, LifecycleEvent), OracleVerdict>>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verdict the given oracle account returns for an event
    pub fn set(&self, base_address: CurioAddress, event: LifecycleEvent, verdict: OracleVerdict) {
        self.verdicts
            .lock()
            .expect("oracle table poisoned")
            .insert((base_address, event), verdict);
    }
}

impl OracleEvaluator for TableOracle {
    fn evaluate(
        &self,
        base_address: &CurioAddress,
        event: LifecycleEvent,
        asset: &CurioAddress,
    ) -> Result<OracleVerdict, CurioError> {
        let verdict = self
            .verdicts
            .lock()
            .expect("oracle table poisoned")
            .get(&(*base_address, event))
            .copied()
            .unwrap_or(OracleVerdict::Approve);
        debug!("oracle {} ruled {:?} for {:?} on {}", base_address, verdict, event, asset);
        Ok(verdict)
    }
}
