use crate::error::CurioError;
use crate::id::CurioAddress;
use crate::operation::OperationKind;
use serde::{Deserialize, Serialize};

/// Lifecycle events an oracle plugin can be registered to gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Transfer,
    Burn,
    Update,
}

/// A creator entry in a royalties plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub address: CurioAddress,
    /// Share of the royalty payout, in whole percent
    pub percentage: u8,
}

/// Royalty configuration attached to an asset or collection.
/// Pure metadata: it never participates in authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Royalties {
    /// Royalty fee in basis points (1% = 100 bps)
    pub basis_points: u16,
    /// Creators receiving the payout; percentages must sum to 100
    pub creators: Vec<Creator>,
}

/// A single signed message recorded by the autograph plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutographSignature {
    pub address: CurioAddress,
    pub message: String,
}

/// Ordered list of signed messages. Updates replace the whole list; callers
/// wanting append semantics fetch, extend and write back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autograph {
    pub signatures: Vec<AutographSignature>,
}

/// Oracle plugin configuration: the external rule account and the lifecycle
/// events it gates. Evaluation itself happens outside the core, behind the
/// runtime's oracle boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Address of the external rule account consulted for each check
    pub base_address: CurioAddress,
    /// Which lifecycle events this oracle gates
    pub checks: Vec<LifecycleEvent>,
}

/// An attachable behavior/metadata module altering a record's authorization
/// or descriptive data.
///
/// Closed set: the authorization engine matches exhaustively, so a new kind
/// forces an update of every decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plugin {
    /// Permanent: the delegate may transfer the asset regardless of the
    /// current owner. Attach at creation only.
    PermanentTransferDelegate { delegate: CurioAddress },

    /// Permanent: while frozen, every transfer and burn is denied for any
    /// caller, the owner included. Attach at creation only; the flag itself
    /// can be toggled by the update authority.
    PermanentFreezeDelegate { frozen: bool },

    /// Permanent: the delegate may burn the asset regardless of the owner.
    /// Attach at creation only.
    PermanentBurnDelegate { delegate: CurioAddress },

    /// Owner-managed transfer delegate; cleared when the asset changes
    /// hands so delegation never outlives an owner.
    TransferDelegate { delegate: CurioAddress },

    /// Owner-managed freeze; same veto as the permanent variant while
    /// frozen, but removable.
    FreezeDelegate { frozen: bool },

    /// Owner-managed burn delegate.
    BurnDelegate { delegate: CurioAddress },

    /// Defers the listed lifecycle events to an external rule evaluator.
    /// A rejection overrides owner consent.
    Oracle(OracleConfig),

    Royalties(Royalties),

    Autograph(Autograph),
}

/// Fieldless discriminant for [`Plugin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    PermanentTransferDelegate,
    PermanentFreezeDelegate,
    PermanentBurnDelegate,
    TransferDelegate,
    FreezeDelegate,
    BurnDelegate,
    Oracle,
    Royalties,
    Autograph,
}

impl PluginKind {
    /// Permanent plugins may only be attached at creation time and can
    /// never be removed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PluginKind::PermanentTransferDelegate
                | PluginKind::PermanentFreezeDelegate
                | PluginKind::PermanentBurnDelegate
        )
    }
}

/// What a single plugin has to say about a requested operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRuling {
    /// The plugin has no opinion on this operation
    Abstain,
    /// The plugin permits the operation outright
    Permit,
    /// The plugin vetoes the operation for every caller
    Deny(&'static str),
    /// The plugin grants the operation to this identity, regardless of the
    /// owner/authority fallback
    DelegateTo(CurioAddress),
}

impl Plugin {
    pub fn kind(&self) -> PluginKind {
        match self {
            Plugin::PermanentTransferDelegate { .. } => PluginKind::PermanentTransferDelegate,
            Plugin::PermanentFreezeDelegate { .. } => PluginKind::PermanentFreezeDelegate,
            Plugin::PermanentBurnDelegate { .. } => PluginKind::PermanentBurnDelegate,
            Plugin::TransferDelegate { .. } => PluginKind::TransferDelegate,
            Plugin::FreezeDelegate { .. } => PluginKind::FreezeDelegate,
            Plugin::BurnDelegate { .. } => PluginKind::BurnDelegate,
            Plugin::Oracle(_) => PluginKind::Oracle,
            Plugin::Royalties(_) => PluginKind::Royalties,
            Plugin::Autograph(_) => PluginKind::Autograph,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind().is_permanent()
    }

    /// Validate the plugin payload. Runs at attach and at update, before
    /// any state change.
    pub fn validate(&self) -> Result<(), CurioError> {
        match self {
            Plugin::Royalties(royalties) => {
                if royalties.basis_points > 10_000 {
                    return Err(CurioError::InvalidPlugin(format!(
                        "royalty basis points {} exceed 10000",
                        royalties.basis_points
                    )));
                }
                let total: u32 = royalties.creators.iter().map(|c| c.percentage as u32).sum();
                if total != 100 {
                    return Err(CurioError::InvalidPlugin(format!(
                        "creator percentages sum to {}, expected 100",
                        total
                    )));
                }
                Ok(())
            }
            Plugin::Oracle(config) => {
                if config.checks.is_empty() {
                    return Err(CurioError::InvalidPlugin(
                        "oracle plugin gates no lifecycle events".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The plugin registry contract: what this plugin rules for the given
    /// operation and caller.
    ///
    /// Oracle plugins abstain here; their external evaluation is owned by
    /// the authorization engine, which consults the evaluator between the
    /// freeze-veto and delegate stages.
    pub fn ruling(&self, op: OperationKind, caller: &CurioAddress) -> PluginRuling {
        match (self, op) {
            (Plugin::PermanentFreezeDelegate { frozen: true }, OperationKind::Transfer) => {
                PluginRuling::Deny("PermanentFreezeDelegate denies transfer while frozen")
            }
            (Plugin::PermanentFreezeDelegate { frozen: true }, OperationKind::Burn) => {
                PluginRuling::Deny("PermanentFreezeDelegate denies burn while frozen")
            }
            (Plugin::FreezeDelegate { frozen: true }, OperationKind::Transfer) => {
                PluginRuling::Deny("FreezeDelegate denies transfer while frozen")
            }
            (Plugin::FreezeDelegate { frozen: true }, OperationKind::Burn) => {
                PluginRuling::Deny("FreezeDelegate denies burn while frozen")
            }
            (Plugin::PermanentTransferDelegate { delegate }, OperationKind::Transfer)
            | (Plugin::TransferDelegate { delegate }, OperationKind::Transfer) => {
                if delegate == caller {
                    PluginRuling::Permit
                } else {
                    PluginRuling::DelegateTo(*delegate)
                }
            }
            (Plugin::PermanentBurnDelegate { delegate }, OperationKind::Burn)
            | (Plugin::BurnDelegate { delegate }, OperationKind::Burn) => {
                if delegate == caller {
                    PluginRuling::Permit
                } else {
                    PluginRuling::DelegateTo(*delegate)
                }
            }
            _ => PluginRuling::Abstain,
        }
    }
}

/// The plugins attached to one record: at most one plugin per kind, kept in
/// attach order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSet {
    plugins: Vec<Plugin>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn contains(&self, kind: PluginKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn get(&self, kind: PluginKind) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.kind() == kind)
    }

    /// Attach a plugin; fails if a plugin of the same kind is already
    /// present or the payload is invalid.
    pub fn attach(&mut self, plugin: Plugin) -> Result<(), CurioError> {
        plugin.validate()?;
        if self.contains(plugin.kind()) {
            return Err(CurioError::PluginAlreadyExists(plugin.kind()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Replace the plugin of the given kind with a new payload
    pub fn replace(&mut self, plugin: Plugin) -> Result<(), CurioError> {
        plugin.validate()?;
        let kind = plugin.kind();
        let slot = self
            .plugins
            .iter_mut()
            .find(|p| p.kind() == kind)
            .ok_or(CurioError::PluginNotFound(kind))?;
        *slot = plugin;
        Ok(())
    }

    /// Detach the plugin of the given kind; fails for permanent kinds
    pub fn detach(&mut self, kind: PluginKind) -> Result<Plugin, CurioError> {
        if kind.is_permanent() {
            return Err(CurioError::ImmutablePlugin(kind));
        }
        let idx = self
            .plugins
            .iter()
            .position(|p| p.kind() == kind)
            .ok_or(CurioError::PluginNotFound(kind))?;
        Ok(self.plugins.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    /// All oracle configurations gating the given lifecycle event
    pub fn oracles_for(&self, event: LifecycleEvent) -> impl Iterator<Item = &OracleConfig> {
        self.plugins.iter().filter_map(move |p| match p {
            Plugin::Oracle(config) if config.checks.contains(&event) => Some(config),
            _ => None,
        })
    }
}

impl PluginSet {
    /// Build a set from creation-time plugins, validating each payload and
    /// rejecting duplicate kinds.
    pub fn try_from_plugins(plugins: Vec<Plugin>) -> Result<Self, CurioError> {
        let mut set = PluginSet::new();
        for plugin in plugins {
            set.attach(plugin)?;
        }
        Ok(set)
    }
}
