//! Storage abstraction for screencircle.
//!
//! Backend crates (e.g., circle-store-sqlite) implement [`LedgerStore`] so
//! `circle-core` doesn't depend on any specific database engine or schema details.

use thiserror::Error;

mod store;
pub mod types;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(StoreError::NotFound.to_string(), "not found");
        let err = StoreError::Backend("disk full".to_string());
        assert!(err.to_string().contains("backend error"));
        assert!(err.to_string().contains("disk full"));
        let err = StoreError::Corrupt("bad date".to_string());
        assert!(err.to_string().contains("bad date"));
    }
}
