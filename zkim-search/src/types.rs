//! Core types: search queries, index entries, trapdoors, query history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zkim_crypto::types::FileMetadata;

// ---------------------------------------------------------------------------
// Access levels
// ---------------------------------------------------------------------------

/// What a querying user is allowed to see of a matched entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// No access — such entries are dropped before results are built.
    None,
    /// Only file-existence and access level are visible.
    Metadata,
    /// Full metadata is visible.
    Full,
}

/// Coarse indicator of how strongly a search response hides true match counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Low,
    Medium,
    High,
}

// ---------------------------------------------------------------------------
// Trapdoors
// ---------------------------------------------------------------------------

/// A single OPRF-derived trapdoor bound to one search token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trapdoor {
    pub trapdoor_id: String,
    pub token_bytes: Vec<u8>,
    pub usage_count: u64,
    pub max_usage: u64,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Trapdoor {
    pub fn new(token_bytes: Vec<u8>, created_at: DateTime<Utc>, ttl: chrono::Duration, max_usage: u64) -> Self {
        Self {
            trapdoor_id: uuid::Uuid::new_v4().to_string(),
            token_bytes,
            usage_count: 0,
            max_usage,
            is_revoked: false,
            created_at,
            expires_at: created_at + ttl,
        }
    }
}

// ---------------------------------------------------------------------------
// File index entries
// ---------------------------------------------------------------------------

/// One file's searchable footprint: trapdoors for every token plus enough
/// metadata to compute access level and relevance without decrypting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileIndexEntry {
    pub file_id: String,
    pub owner_user_id: String,
    pub metadata: FileMetadata,
    pub trapdoors: Vec<Trapdoor>,
    pub indexed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries and results
// ---------------------------------------------------------------------------

/// Query priority; `"high"` forces `PrivacyLevel::High` regardless of config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPriority {
    Normal,
    High,
}

impl Default for QueryPriority {
    fn default() -> Self {
        QueryPriority::Normal
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub user_id: String,
    #[serde(default)]
    pub priority: QueryPriority,
}

/// A single search hit. Padding/decoy hits are structurally identical, save
/// for the internal `is_padding` flag, which is never serialized to callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResultEntry {
    pub file_id: String,
    pub access_level: AccessLevel,
    pub relevance: f64,
    #[serde(skip)]
    pub is_padding: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponseMetadata {
    pub privacy_enhancement: bool,
    pub result_padding: bool,
    pub truncated: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query_id: String,
    pub results: Vec<SearchResultEntry>,
    pub total_results: usize,
    pub privacy_level: PrivacyLevel,
    pub metadata: SearchResponseMetadata,
}

/// One row of the query history used for rate limiting and statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub query_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: usize,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    pub enable_oprf: bool,
    pub enable_rate_limiting: bool,
    pub enable_trapdoor_rotation: bool,
    pub enable_privacy_enhancement: bool,
    pub enable_result_padding: bool,
    pub enable_query_logging: bool,
    pub epoch_duration_ms: i64,
    pub max_queries_per_epoch: usize,
    pub rotation_threshold: u64,
    pub bucket_sizes: Vec<usize>,
    pub auto_save_interval_ms: u64,
    pub default_search_limit: usize,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            enable_oprf: true,
            enable_rate_limiting: true,
            enable_trapdoor_rotation: true,
            enable_privacy_enhancement: true,
            enable_result_padding: true,
            enable_query_logging: true,
            epoch_duration_ms: 86_400_000,
            max_queries_per_epoch: 1000,
            rotation_threshold: 100,
            bucket_sizes: vec![32, 64, 128, 256],
            auto_save_interval_ms: 60_000,
            default_search_limit: 50,
        }
    }
}

/// Statistics exposed by `getSearchStats`.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SearchStats {
    pub total_indexed_files: usize,
    pub total_trapdoors: usize,
    pub queries_this_epoch: usize,
    pub average_query_time_ms: f64,
}

/// Status returned by the service shell (C4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub initialized: bool,
    pub initializing: bool,
    pub service_name: String,
}
