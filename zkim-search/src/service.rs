//! Service Shell (C4): `initialize`/`cleanup` lifecycle around the Search Index Core.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use zkim_crypto::envelope::EnvelopeEngine;

use crate::error::ServiceError;
use crate::index::SearchIndex;
use crate::types::{SearchIndexConfig, ServiceStatus};

const SERVICE_NAME: &str = "zkim-search-index";
const ZKIM_OBJECT_ID_SUFFIX: &str = "search-index";

enum InitState {
    NotStarted,
    Initializing(Arc<Notify>),
    Initialized,
}

/// Owns one [`SearchIndex`] plus its background timers and persistence
/// wiring. This is the only public construction path — callers never build
/// a bare `SearchIndex` in production code.
pub struct SearchService {
    pub index: Arc<SearchIndex>,
    envelope: Option<Arc<EnvelopeEngine>>,
    user_key: Option<[u8; 32]>,
    platform_key: Option<[u8; 32]>,
    object_id: String,
    init_state: Mutex<InitState>,
    auto_save_handle: Mutex<Option<JoinHandle<()>>>,
    epoch_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SearchService {
    pub fn new(config: SearchIndexConfig, user_id: &str) -> Self {
        Self {
            index: Arc::new(SearchIndex::new(config)),
            envelope: None,
            user_key: None,
            platform_key: None,
            object_id: format!("{}-{}", user_id, ZKIM_OBJECT_ID_SUFFIX),
            init_state: Mutex::new(InitState::NotStarted),
            auto_save_handle: Mutex::new(None),
            epoch_handle: Mutex::new(None),
        }
    }

    /// Wires in persistence through the crypto envelope engine (§4.3.9).
    /// Without this, `initialize`/`cleanup` still work, but auto-save is
    /// skipped (logged at debug level) and load always starts empty.
    pub fn with_persistence(
        mut self,
        envelope: Arc<EnvelopeEngine>,
        platform_key: [u8; 32],
        user_key: [u8; 32],
    ) -> Self {
        self.envelope = Some(envelope);
        self.platform_key = Some(platform_key);
        self.user_key = Some(user_key);
        self
    }

    /// Idempotent, concurrent-safe initialization. A second caller arriving
    /// while another initialization is in flight waits on it instead of
    /// starting a redundant one.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), ServiceError> {
        loop {
            let notify = {
                let mut state = self.init_state.lock().await;
                match &*state {
                    InitState::Initialized => return Ok(()),
                    InitState::Initializing(notify) => notify.clone(),
                    InitState::NotStarted => {
                        let notify = Arc::new(Notify::new());
                        *state = InitState::Initializing(notify.clone());
                        drop(state);
                        self.do_initialize().await?;
                        let mut state = self.init_state.lock().await;
                        *state = InitState::Initialized;
                        notify.notify_waiters();
                        return Ok(());
                    }
                }
            };
            notify.notified().await;
        }
    }

    async fn do_initialize(self: &Arc<Self>) -> Result<(), ServiceError> {
        self.index.initialize_oprf_key();
        self.load_index().await;

        self.arm_auto_save_timer();
        self.arm_epoch_timer();
        Ok(())
    }

    /// Clears all timers, persists once, and clears in-memory state.
    pub async fn cleanup(&self) {
        if let Some(handle) = self.auto_save_handle.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.epoch_handle.lock().await.take() {
            handle.abort();
        }
        self.save_index().await;
        self.index.clear();

        let mut state = self.init_state.lock().await;
        *state = InitState::NotStarted;
    }

    pub async fn status(&self) -> ServiceStatus {
        let state = self.init_state.lock().await;
        let (initialized, initializing) = match &*state {
            InitState::Initialized => (true, false),
            InitState::Initializing(_) => (false, true),
            InitState::NotStarted => (false, false),
        };
        ServiceStatus {
            initialized,
            initializing,
            service_name: SERVICE_NAME.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // §4.3.9 persistence
    // -----------------------------------------------------------------------

    async fn save_index(&self) {
        let Some(envelope) = &self.envelope else {
            tracing::debug!("no envelope engine wired in, skipping auto-save");
            return;
        };
        let (Some(platform_key), Some(user_key)) = (self.platform_key, self.user_key) else {
            tracing::debug!("no keys wired in, skipping auto-save");
            return;
        };

        let bytes = match self.index.serialize_index() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize search index");
                return;
            }
        };

        let metadata = zkim_crypto::types::FileMetadata {
            file_name: self.object_id.clone(),
            user_id: self.object_id.clone(),
            mime_type: Some("application/json".to_string()),
            created_at: 0,
            tags: vec![],
            custom_fields: Default::default(),
            access_control: None,
        };

        if let Err(e) = envelope.create_zkim_file_at(
            &self.object_id,
            &bytes,
            "search-index",
            &platform_key,
            &user_key,
            metadata,
            0,
        ) {
            tracing::warn!(error = %e, "search index auto-save failed");
        }
    }

    async fn load_index(&self) {
        let Some(envelope) = &self.envelope else {
            return;
        };
        let Some(user_key) = self.user_key else {
            return;
        };

        match envelope.get_zkim_file(&self.object_id) {
            Ok(file) => match envelope.decrypt_zkim_file(&file, &user_key) {
                Ok(bytes) => {
                    if let Err(e) = self.index.load_index(&bytes) {
                        tracing::warn!(error = %e, "search index parse failure, starting empty");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "search index decrypt failure, starting empty");
                }
            },
            Err(_) => {
                tracing::debug!("no persisted search index found, starting empty");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn arm_auto_save_timer(self: &Arc<Self>) {
        let interval_ms = self.index.config().auto_save_interval_ms.max(1);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                this.save_index().await;
            }
        });
        if let Ok(mut slot) = self.auto_save_handle.try_lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
    }

    fn arm_epoch_timer(self: &Arc<Self>) {
        let interval_ms = self.index.config().epoch_duration_ms.max(1) as u64;
        let index = Arc::clone(&self.index);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                index.rotate_trapdoors();
                index.cleanup_expired_trapdoors();
            }
        });
        if let Ok(mut slot) = self.epoch_handle.try_lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Public search/index surface (service-wrapper envelope per §7)
    // -----------------------------------------------------------------------

    pub fn index_file(
        &self,
        file_id: &str,
        owner_user_id: &str,
        metadata: &zkim_crypto::types::FileMetadata,
    ) -> Result<(), ServiceError> {
        self.index
            .index_file(file_id, owner_user_id, metadata)
            .map_err(ServiceError::from)
    }

    pub fn search(
        &self,
        query: &crate::types::SearchQuery,
        limit: Option<usize>,
    ) -> Result<crate::types::SearchResponse, ServiceError> {
        self.index.search(query, limit).map_err(ServiceError::from)
    }
}
