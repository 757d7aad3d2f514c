//! Search Index Core (C3): trapdoor-indexed search over encrypted file metadata.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use zkim_crypto::types::FileMetadata;

use crate::error::SearchError;
use crate::oprf;
use crate::types::{
    AccessLevel, FileIndexEntry, PrivacyLevel, QueryHistoryEntry, QueryPriority, SearchIndexConfig,
    SearchQuery, SearchResponse, SearchResponseMetadata, SearchResultEntry, SearchStats, Trapdoor,
};

/// In-memory state behind the Search Index Core. Every public operation
/// serializes through the single mutex, matching the single-threaded
/// cooperative model the core assumes at its component boundary.
struct IndexState {
    file_index: HashMap<String, FileIndexEntry>,
    query_history: Vec<QueryHistoryEntry>,
    oprf_secret_key: Option<[u8; zkim_crypto::oprf::SCALAR_BYTES]>,
}

pub struct SearchIndex {
    config: SearchIndexConfig,
    state: Mutex<IndexState>,
}

impl SearchIndex {
    pub fn new(config: SearchIndexConfig) -> Self {
        Self {
            config,
            state: Mutex::new(IndexState {
                file_index: HashMap::new(),
                query_history: Vec::new(),
                oprf_secret_key: None,
            }),
        }
    }

    pub fn config(&self) -> &SearchIndexConfig {
        &self.config
    }

    /// Generates and installs the OPRF secret key. Idempotent: a second call
    /// replaces the key, which is intentional for key-rotation tests but
    /// means existing trapdoors become unmatchable until re-indexed.
    pub fn initialize_oprf_key(&self) {
        let mut state = self.state.lock().unwrap();
        state.oprf_secret_key = Some(zkim_crypto::oprf::generate_secret_key());
    }

    fn trapdoor_for(&self, token: &str, secret_key: Option<&[u8; 32]>) -> Result<Vec<u8>, SearchError> {
        oprf::generate_oprf_trapdoor(token, secret_key, self.config.enable_oprf)
    }

    // -----------------------------------------------------------------------
    // §4.3.3 indexFile / updateFileIndex / removeFileFromIndex
    // -----------------------------------------------------------------------

    /// `indexFile` / `updateFileIndex`: the two operations share semantics —
    /// a present `fileId` is replaced, an absent one is created fresh.
    pub fn index_file(&self, file_id: &str, owner_user_id: &str, metadata: &FileMetadata) -> Result<(), SearchError> {
        let mut state = self.state.lock().unwrap();
        let secret_key = state.oprf_secret_key;
        let secret_key = secret_key.as_ref();

        let tokens = oprf::generate_search_tokens(metadata);
        let now = now();
        let mut trapdoors = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token_bytes = self.trapdoor_for(&token, secret_key)?;
            trapdoors.push(Trapdoor::new(
                token_bytes,
                now,
                ChronoDuration::milliseconds(self.config.epoch_duration_ms),
                self.config.rotation_threshold,
            ));
        }

        let entry = FileIndexEntry {
            file_id: file_id.to_string(),
            owner_user_id: owner_user_id.to_string(),
            metadata: metadata.clone(),
            trapdoors,
            indexed_at: now,
        };

        state.file_index.insert(file_id.to_string(), entry);
        Ok(())
    }

    /// `updateFileIndex`: identical data-level semantics to `index_file` —
    /// a missing id creates a new entry rather than failing.
    pub fn update_file_index(&self, file_id: &str, owner_user_id: &str, metadata: &FileMetadata) -> Result<(), SearchError> {
        self.index_file(file_id, owner_user_id, metadata)
    }

    /// `removeFileFromIndex`: absent ids are a no-op.
    pub fn remove_file_from_index(&self, file_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.file_index.remove(file_id);
    }

    pub fn total_indexed_files(&self) -> usize {
        self.state.lock().unwrap().file_index.len()
    }

    // -----------------------------------------------------------------------
    // §4.3.4 search
    // -----------------------------------------------------------------------

    pub fn search(&self, query: &SearchQuery, limit: Option<usize>) -> Result<SearchResponse, SearchError> {
        let start = std::time::Instant::now();
        let mut state = self.state.lock().unwrap();
        let now_ts = now();

        // 1. Rate limit.
        if self.config.enable_rate_limiting {
            let window_start = now_ts - ChronoDuration::milliseconds(self.config.epoch_duration_ms);
            let count = state.query_history.iter().filter(|h| h.timestamp > window_start).count();
            if count >= self.config.max_queries_per_epoch {
                return Err(SearchError::RateLimitExceeded);
            }
        }

        // 2. Query trapdoor.
        let query_lower = query.query.trim().to_lowercase();
        let secret_key = state.oprf_secret_key;
        let query_trapdoor = self.trapdoor_for(&query_lower, secret_key.as_ref())?;

        // 3. Match.
        let mut candidates: Vec<String> = Vec::new();
        for entry in state.file_index.values_mut() {
            let mut matched = false;
            for trapdoor in &mut entry.trapdoors {
                if trapdoor.token_bytes.len() != query_trapdoor.len() {
                    continue;
                }
                if bool::from(trapdoor.token_bytes.ct_eq(&query_trapdoor)) {
                    matched = true;
                    trapdoor.usage_count += 1;
                    if trapdoor.usage_count >= trapdoor.max_usage && self.config.enable_trapdoor_rotation {
                        // Rotation is performed explicitly via rotate_trapdoors;
                        // here we only mark the trapdoor as due by leaving its
                        // usage_count at/above max_usage for that pass to see.
                    }
                }
            }
            if matched {
                candidates.push(entry.file_id.clone());
            }
        }

        // 4. Access filter + 5. Relevance.
        let mut scored: Vec<SearchResultEntry> = Vec::new();
        let mut indexed_at_by_id: HashMap<String, DateTime<Utc>> = HashMap::new();
        for file_id in &candidates {
            let entry = state.file_index.get(file_id).expect("candidate exists");
            let access_level = determine_access_level(entry, &query.user_id);
            if matches!(access_level, AccessLevel::None) {
                continue;
            }
            let relevance = calculate_relevance(entry, &query_lower);
            indexed_at_by_id.insert(entry.file_id.clone(), entry.indexed_at);
            scored.push(SearchResultEntry {
                file_id: entry.file_id.clone(),
                access_level,
                relevance,
                is_padding: false,
            });
        }

        let total_results = scored.len();

        scored.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ia = indexed_at_by_id.get(&a.file_id).copied().unwrap_or(now_ts);
                    let ib = indexed_at_by_id.get(&b.file_id).copied().unwrap_or(now_ts);
                    ia.cmp(&ib)
                })
        });

        // 6. Limit.
        let limit = limit.unwrap_or(self.config.default_search_limit);
        let truncated = scored.len() > limit;
        scored.truncate(limit);

        // 7. Privacy enhancement.
        if self.config.enable_privacy_enhancement {
            for result in &mut scored {
                let noise = uniform_noise(-0.1, 0.1);
                result.relevance = (result.relevance + noise).clamp(0.0, 1.0);
            }
            fisher_yates_shuffle(&mut scored);
        }

        // 8. Result padding.
        if self.config.enable_result_padding {
            let bucket = bucket_size(&self.config.bucket_sizes, scored.len());
            let missing = bucket.saturating_sub(scored.len());
            for _ in 0..missing {
                scored.push(SearchResultEntry {
                    file_id: format!("decoy-{}", Uuid::new_v4()),
                    access_level: AccessLevel::Metadata,
                    relevance: 0.0,
                    is_padding: true,
                });
            }
            if self.config.enable_privacy_enhancement {
                fisher_yates_shuffle(&mut scored);
            }
        }

        // 9. Log.
        let duration_ms = start.elapsed().as_millis() as u64;
        let query_id = Uuid::new_v4().to_string();
        if self.config.enable_query_logging {
            state.query_history.push(QueryHistoryEntry {
                query_id: query_id.clone(),
                user_id: query.user_id.clone(),
                timestamp: now_ts,
                result_count: scored.len(),
                duration_ms,
            });
        }

        // 10. Return.
        Ok(SearchResponse {
            query_id,
            results: scored,
            total_results,
            privacy_level: determine_privacy_level(query, &self.config),
            metadata: SearchResponseMetadata {
                privacy_enhancement: self.config.enable_privacy_enhancement,
                result_padding: self.config.enable_result_padding,
                truncated,
            },
        })
    }

    // -----------------------------------------------------------------------
    // §4.3.8 trapdoor lifecycle
    // -----------------------------------------------------------------------

    /// `rotateTrapdoors`: a no-op unless rotation is enabled. Expired
    /// trapdoors are revoked; over-used ones get a fresh replacement with
    /// the same deterministic OPRF output.
    pub fn rotate_trapdoors(&self) {
        if !self.config.enable_trapdoor_rotation {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let now_ts = now();
        let epoch = ChronoDuration::milliseconds(self.config.epoch_duration_ms);

        for entry in state.file_index.values_mut() {
            let mut replacements = Vec::new();
            for trapdoor in entry.trapdoors.iter_mut() {
                if trapdoor.is_revoked {
                    continue;
                }
                if now_ts >= trapdoor.expires_at {
                    trapdoor.is_revoked = true;
                } else if trapdoor.usage_count >= trapdoor.max_usage {
                    let mut replacement = Trapdoor::new(trapdoor.token_bytes.clone(), now_ts, epoch, trapdoor.max_usage);
                    replacement.trapdoor_id = Uuid::new_v4().to_string();
                    replacements.push(replacement);
                    trapdoor.is_revoked = true;
                }
            }
            entry.trapdoors.extend(replacements);
        }
    }

    /// `cleanupExpiredTrapdoors`: prunes revoked trapdoors older than two epochs.
    pub fn cleanup_expired_trapdoors(&self) {
        let mut state = self.state.lock().unwrap();
        let now_ts = now();
        let cutoff = ChronoDuration::milliseconds(self.config.epoch_duration_ms * 2);

        for entry in state.file_index.values_mut() {
            entry
                .trapdoors
                .retain(|t| !(t.is_revoked && now_ts - t.created_at > cutoff));
        }
    }

    // -----------------------------------------------------------------------
    // Statistics and persistence helpers
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> SearchStats {
        let state = self.state.lock().unwrap();
        let now_ts = now();
        let window_start = now_ts - ChronoDuration::milliseconds(self.config.epoch_duration_ms);
        let queries_this_epoch = state.query_history.iter().filter(|h| h.timestamp > window_start).count();
        let average_query_time_ms = if state.query_history.is_empty() {
            0.0
        } else {
            let total: u64 = state.query_history.iter().map(|h| h.duration_ms).sum();
            total as f64 / state.query_history.len() as f64
        };
        SearchStats {
            total_indexed_files: state.file_index.len(),
            total_trapdoors: state.file_index.values().map(|e| e.trapdoors.len()).sum(),
            queries_this_epoch,
            average_query_time_ms,
        }
    }

    /// Serializes the file index with stable (`fileId`-sorted) ordering, for
    /// persistence as plaintext content of a ZKIM file.
    pub fn serialize_index(&self) -> Result<Vec<u8>, SearchError> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<&FileIndexEntry> = state.file_index.values().collect();
        entries.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(serde_json::to_vec(&entries)?)
    }

    /// Replaces the in-memory index with a deserialized snapshot. On parse
    /// failure the caller is expected to fall back to an empty index.
    pub fn load_index(&self, bytes: &[u8]) -> Result<(), SearchError> {
        let entries: Vec<FileIndexEntry> = serde_json::from_slice(bytes)?;
        let mut state = self.state.lock().unwrap();
        state.file_index = entries.into_iter().map(|e| (e.file_id.clone(), e)).collect();
        Ok(())
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.file_index.clear();
        state.query_history.clear();
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// §4.3.5. A user in no list gets `None`; one in `write_access` only gets
/// `Metadata`; owners and `read_access` members get `Full`.
fn determine_access_level(entry: &FileIndexEntry, user_id: &str) -> AccessLevel {
    match &entry.metadata.access_control {
        None => AccessLevel::Full,
        Some(ac) => {
            if ac.read_access.iter().any(|u| u == user_id) {
                AccessLevel::Full
            } else if entry.metadata.user_id == user_id {
                AccessLevel::Full
            } else if ac.write_access.iter().any(|u| u == user_id) {
                AccessLevel::Metadata
            } else {
                AccessLevel::None
            }
        }
    }
}

/// §4.3.6.
fn calculate_relevance(entry: &FileIndexEntry, query_lower: &str) -> f64 {
    let mut score = 0.0;

    if entry.metadata.file_name.to_lowercase().contains(query_lower) {
        score += 0.5;
    }
    if entry.metadata.tags.iter().any(|t| t.eq_ignore_ascii_case(query_lower)) {
        score += 0.3;
    }
    if entry.metadata.custom_fields.values().any(|v| match v {
        zkim_crypto::types::FieldValue::Str(s) => s.to_lowercase().contains(query_lower),
        _ => false,
    }) {
        score += 0.2;
    }

    let score = score.clamp(0.0, 1.0);
    if score == 0.0 {
        0.05
    } else {
        score
    }
}

/// §4.3.7.
fn determine_privacy_level(query: &SearchQuery, config: &SearchIndexConfig) -> PrivacyLevel {
    if matches!(query.priority, QueryPriority::High) || (config.enable_privacy_enhancement && config.enable_result_padding) {
        PrivacyLevel::High
    } else if config.enable_rate_limiting {
        PrivacyLevel::Medium
    } else {
        PrivacyLevel::Low
    }
}

/// Smallest bucket strictly greater than `count`, or the largest bucket if
/// none fits. A real result count landing exactly on a bucket boundary still
/// gets padded into the next one, so the boundary count itself stays hidden.
fn bucket_size(bucket_sizes: &[usize], count: usize) -> usize {
    bucket_sizes
        .iter()
        .copied()
        .find(|&b| b > count)
        .unwrap_or_else(|| bucket_sizes.last().copied().unwrap_or(count))
}

fn uniform_noise(low: f64, high: f64) -> f64 {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let unit = (u64::from_le_bytes(bytes) as f64) / (u64::MAX as f64);
    low + unit * (high - low)
}

/// Cryptographically-seeded Fisher-Yates shuffle.
fn fisher_yates_shuffle<T>(items: &mut [T]) {
    if items.len() < 2 {
        return;
    }
    for i in (1..items.len()).rev() {
        let mut buf = [0u8; 8];
        OsRng.fill_bytes(&mut buf);
        let j = (u64::from_le_bytes(buf) % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use zkim_crypto::types::{AccessControl, FieldValue};

    fn metadata(name: &str, tags: &[&str]) -> FileMetadata {
        FileMetadata {
            file_name: name.to_string(),
            user_id: "owner".to_string(),
            mime_type: Some("text/plain".to_string()),
            created_at: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            custom_fields: HashMap::new(),
            access_control: None,
        }
    }

    fn index() -> SearchIndex {
        let idx = SearchIndex::new(SearchIndexConfig::default());
        idx.initialize_oprf_key();
        idx
    }

    fn query(q: &str, user_id: &str) -> SearchQuery {
        SearchQuery {
            query: q.to_string(),
            user_id: user_id.to_string(),
            priority: QueryPriority::Normal,
        }
    }

    #[test]
    fn s2_index_then_search_matches_by_tag() {
        let idx = index();
        idx.index_file("file-1", "owner", &metadata("hello.txt", &["important", "test"]))
            .unwrap();

        let hits = idx.search(&query("important", "owner"), None).unwrap();
        assert!(hits.total_results >= 1);

        let miss = idx.search(&query("nonexistent", "owner"), None).unwrap();
        assert_eq!(miss.total_results, 0);
    }

    #[test]
    fn s3_rate_limit_trips_after_threshold() {
        let mut config = SearchIndexConfig::default();
        config.max_queries_per_epoch = 1;
        config.epoch_duration_ms = 1000;
        config.enable_result_padding = false;
        config.enable_privacy_enhancement = false;
        let idx = SearchIndex::new(config);
        idx.initialize_oprf_key();
        idx.index_file("file-1", "owner", &metadata("hello.txt", &[])).unwrap();

        idx.search(&query("hello", "owner"), None).unwrap();
        let second = idx.search(&query("hello", "owner"), None);
        assert!(matches!(second, Err(SearchError::RateLimitExceeded)));
    }

    #[test]
    fn s4_padding_rounds_up_to_bucket() {
        let mut config = SearchIndexConfig::default();
        config.enable_result_padding = true;
        config.enable_privacy_enhancement = false;
        config.bucket_sizes = vec![1, 2, 4];
        let idx = SearchIndex::new(config);
        idx.initialize_oprf_key();
        idx.index_file("file-1", "owner", &metadata("needle.txt", &[])).unwrap();

        let hits = idx.search(&query("needle", "owner"), None).unwrap();
        assert_eq!(hits.results.len(), 2);
    }

    #[test]
    fn s5_rotation_revokes_expired_trapdoors() {
        let mut config = SearchIndexConfig::default();
        config.epoch_duration_ms = 0;
        let idx = SearchIndex::new(config);
        idx.initialize_oprf_key();
        idx.index_file("file-1", "owner", &metadata("needle.txt", &[])).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        idx.rotate_trapdoors();

        let state = idx.state.lock().unwrap();
        let entry = state.file_index.get("file-1").unwrap();
        assert!(entry.trapdoors.iter().all(|t| t.is_revoked));
    }

    #[test]
    fn removal_is_idempotent() {
        let idx = index();
        idx.index_file("file-1", "owner", &metadata("a.txt", &[])).unwrap();
        assert_eq!(idx.total_indexed_files(), 1);
        idx.remove_file_from_index("file-1");
        assert_eq!(idx.total_indexed_files(), 0);
        idx.remove_file_from_index("file-1");
        assert_eq!(idx.total_indexed_files(), 0);
    }

    #[test]
    fn access_control_hides_entries_for_non_members() {
        let idx = index();
        let mut meta = metadata("secret.txt", &[]);
        meta.access_control = Some(AccessControl {
            read_access: vec!["alice".to_string()],
            write_access: vec!["alice".to_string()],
        });
        idx.index_file("file-1", "owner", &meta).unwrap();

        let as_alice = idx.search(&query("secret", "alice"), None).unwrap();
        assert_eq!(as_alice.total_results, 1);

        let as_mallory = idx.search(&query("secret", "mallory"), None).unwrap();
        assert_eq!(as_mallory.total_results, 0);
    }

    #[test]
    fn write_access_member_gets_metadata_level_not_full() {
        let idx = index();
        let mut meta = metadata("secret.txt", &[]);
        meta.access_control = Some(AccessControl {
            read_access: vec![],
            write_access: vec!["bob".to_string()],
        });
        idx.index_file("file-1", "owner", &meta).unwrap();

        let as_bob = idx.search(&query("secret", "bob"), None).unwrap();
        assert_eq!(as_bob.total_results, 1);
        assert!(matches!(as_bob.results[0].access_level, AccessLevel::Metadata));
    }

    #[test]
    fn owner_bypass_grants_full_access() {
        let idx = index();
        let mut meta = metadata("secret.txt", &[]);
        meta.access_control = Some(AccessControl {
            read_access: vec![],
            write_access: vec![],
        });
        idx.index_file("file-1", "owner", &meta).unwrap();

        let as_owner = idx.search(&query("secret", "owner"), None).unwrap();
        assert_eq!(as_owner.total_results, 1);
    }

    #[test]
    fn stats_are_zero_with_no_queries() {
        let idx = index();
        let stats = idx.stats();
        assert_eq!(stats.queries_this_epoch, 0);
        assert_eq!(stats.average_query_time_ms, 0.0);
    }

    #[test]
    fn serialize_and_load_round_trip() {
        let idx = index();
        idx.index_file("file-1", "owner", &metadata("hello.txt", &["important"])).unwrap();
        let bytes = idx.serialize_index().unwrap();

        let restored = SearchIndex::new(SearchIndexConfig::default());
        restored.load_index(&bytes).unwrap();
        assert_eq!(restored.total_indexed_files(), 1);
    }

    #[test]
    fn custom_field_match_contributes_relevance() {
        let idx = index();
        let mut meta = metadata("plain.txt", &[]);
        meta.custom_fields.insert("department".to_string(), FieldValue::Str("Finance".to_string()));
        idx.index_file("file-1", "owner", &meta).unwrap();

        let hits = idx.search(&query("finance", "owner"), None).unwrap();
        assert_eq!(hits.total_results, 1);
    }

    #[test]
    fn missing_oprf_key_fails_indexing() {
        let idx = SearchIndex::new(SearchIndexConfig::default());
        let result = idx.index_file("file-1", "owner", &metadata("a.txt", &[]));
        assert!(matches!(result, Err(SearchError::OprfKeyMissing)));
    }
}
