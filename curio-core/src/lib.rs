pub mod error;
pub mod id;
pub mod locks;
pub mod operation;
pub mod plugins;
pub mod records;

// Re-export the main types for convenience
pub use error::CurioError;
pub use id::CurioAddress;
pub use operation::{OpToken, Operation, OperationKind};
pub use plugins::{Plugin, PluginKind, PluginRuling, PluginSet};
pub use records::{AssetRecord, CollectionRecord, CurioRecord};
