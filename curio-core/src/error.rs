use crate::id::CurioAddress;
use crate::plugins::PluginKind;
use thiserror::Error;

/// Represents all possible errors that can occur when operating on Curio
/// records
#[derive(Error, Debug)]
pub enum CurioError {
    /// The addressed record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A create operation reused an existing (or burned) address
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(CurioAddress),

    /// The authorization engine denied the operation; the reason names the
    /// vetoing plugin or the missing authority
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The operation is illegal in the record's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An edition mint would exceed the master edition's max supply
    #[error("Supply exhausted: max supply of {max_supply} editions reached")]
    SupplyExhausted { max_supply: u32 },

    /// Attempted to attach a permanent-kind plugin after creation
    #[error("Plugin {0:?} is permanent and can only be attached at creation")]
    PluginAlreadyPermanent(PluginKind),

    /// Attempted to remove a permanent-kind plugin
    #[error("Plugin {0:?} is permanent and cannot be removed")]
    ImmutablePlugin(PluginKind),

    /// The record already carries a plugin of this kind
    #[error("Plugin {0:?} is already attached")]
    PluginAlreadyExists(PluginKind),

    /// The addressed plugin is not attached to the record
    #[error("Plugin {0:?} is not attached")]
    PluginNotFound(PluginKind),

    /// The plugin payload failed validation
    #[error("Invalid plugin: {0}")]
    InvalidPlugin(String),

    /// A record lock could not be acquired within the bounded window;
    /// the caller may retry
    #[error("Contention on record {0}, retry the operation")]
    Contention(CurioAddress),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors that don't fit in other categories
    #[error("Other error: {0}")]
    Other(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl CurioError {
    /// Whether the failed operation is safe and sensible to retry as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, CurioError::Contention(_))
    }
}

// Additional From conversions for common error types

impl From<bincode::Error> for CurioError {
    fn from(err: bincode::Error) -> Self {
        CurioError::Serialization(err.to_string())
    }
}

impl From<String> for CurioError {
    fn from(err: String) -> Self {
        CurioError::Other(err)
    }
}

impl From<&str> for CurioError {
    fn from(err: &str) -> Self {
        CurioError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_contention_is_retryable() {
        let addr = CurioAddress::default();
        assert!(CurioError::Contention(addr).is_retryable());
        assert!(!CurioError::NotFound("asset".to_string()).is_retryable());
        assert!(!CurioError::Unauthorized("owner mismatch".to_string()).is_retryable());
    }

    #[test]
    fn test_display_names_the_plugin() {
        let err = CurioError::ImmutablePlugin(PluginKind::PermanentFreezeDelegate);
        assert!(err.to_string().contains("PermanentFreezeDelegate"));
    }
}
