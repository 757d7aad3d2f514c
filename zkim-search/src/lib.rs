//! # zkim-search
//!
//! Searchable symmetric encryption over ZKIM file metadata: OPRF trapdoors,
//! epoch-based rotation, rate limiting, and privacy-enhanced result sets.
//!
//! Built on top of `zkim-crypto` for OPRF primitives and persistence through
//! the three-layer envelope.
//!
//! ## Quick Start
//!
//! ```ignore
//! use zkim_search::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let service = Arc::new(SearchService::new(SearchIndexConfig::default(), "user-1"));
//! service.initialize().await.unwrap();
//!
//! let metadata = zkim_crypto::types::FileMetadata {
//!     file_name: "hello.txt".into(),
//!     user_id: "user-1".into(),
//!     mime_type: Some("text/plain".into()),
//!     created_at: 0,
//!     tags: vec!["important".into()],
//!     custom_fields: Default::default(),
//!     access_control: None,
//! };
//! service.index_file("file-1", "user-1", &metadata).unwrap();
//!
//! let query = SearchQuery { query: "important".into(), user_id: "user-1".into(), priority: QueryPriority::Normal };
//! let results = service.search(&query, None).unwrap();
//! assert!(results.total_results >= 1);
//! # });
//! ```

pub mod error;
pub mod index;
pub mod oprf;
pub mod service;
pub mod types;

pub use error::{IndexError, QueryError, SearchError, ServiceError};
pub use index::SearchIndex;
pub use service::SearchService;
pub use types::{
    AccessLevel, FileIndexEntry, PrivacyLevel, QueryHistoryEntry, QueryPriority, SearchIndexConfig,
    SearchQuery, SearchResponse, SearchResponseMetadata, SearchResultEntry, SearchStats,
    ServiceStatus, Trapdoor,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use zkim_crypto::types::FileMetadata;

    fn metadata(name: &str, tags: &[&str]) -> FileMetadata {
        FileMetadata {
            file_name: name.to_string(),
            user_id: "user-1".to_string(),
            mime_type: Some("text/plain".to_string()),
            created_at: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            custom_fields: HashMap::new(),
            access_control: None,
        }
    }

    #[tokio::test]
    async fn end_to_end_index_and_search() {
        let service = Arc::new(SearchService::new(SearchIndexConfig::default(), "user-1"));
        service.initialize().await.unwrap();

        service
            .index_file("file-1", "user-1", &metadata("hello.txt", &["important", "test"]))
            .unwrap();

        let query = SearchQuery {
            query: "important".to_string(),
            user_id: "user-1".to_string(),
            priority: QueryPriority::Normal,
        };
        let results = service.search(&query, None).unwrap();
        assert!(results.total_results >= 1);
        assert!(results.results.iter().any(|r| r.file_id == "file-1"));

        service.cleanup().await;
    }
}
