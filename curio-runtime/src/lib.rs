pub mod authorize;
pub mod oracle;
pub mod runtime;

// Re-export the main types for convenience
pub use authorize::{authorize_asset_op, authorize_collection_op};
pub use oracle::{OracleEvaluator, OracleVerdict, TableOracle};
pub use runtime::{
    CurioRuntime, InMemoryReceiptLog, InMemoryRuntime, OperationReceipt, ReceiptLog, RecordEffect,
};
