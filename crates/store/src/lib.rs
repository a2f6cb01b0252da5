//! Persistence backends for customers, saved segments, and the activity feed.
//!
//! `MemoryStore` keeps everything in DashMap (development and tests);
//! `PgStore` talks to the PostgreSQL schema through sqlx.

pub mod activity;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use crm_core::config::DatabaseConfig;
use crm_core::types::{Activity, NewActivity, NewSegment, Segment};
use crm_core::CrmResult;
use crm_segmentation::RecordStore;
use std::sync::Arc;
use tracing::info;

pub use activity::{ActivityOutcome, ActivityRecorder};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Saved segment definitions.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// All segments, newest first.
    async fn list_segments(&self) -> CrmResult<Vec<Segment>>;

    async fn get_segment(&self, id: i64) -> CrmResult<Option<Segment>>;

    async fn create_segment(&self, segment: NewSegment) -> CrmResult<Segment>;

    /// Returns whether a segment was removed.
    async fn delete_segment(&self, id: i64) -> CrmResult<bool>;
}

/// Append-only activity feed.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, activity: NewActivity) -> CrmResult<Activity>;

    /// Most recent entries first.
    async fn recent(&self, limit: usize) -> CrmResult<Vec<Activity>>;
}

/// The three store handles the API needs, backed by one concrete store.
#[derive(Clone)]
pub struct StoreHandles {
    pub records: Arc<dyn RecordStore>,
    pub segments: Arc<dyn SegmentStore>,
    pub activities: Arc<dyn ActivityLog>,
}

impl StoreHandles {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            records: store.clone(),
            segments: store.clone(),
            activities: store,
        }
    }

    pub fn postgres(store: Arc<PgStore>) -> Self {
        Self {
            records: store.clone(),
            segments: store.clone(),
            activities: store,
        }
    }

    /// Open the backend selected by configuration: PostgreSQL when a URL is
    /// set, otherwise the in-memory store.
    pub async fn open(config: &DatabaseConfig) -> CrmResult<Self> {
        if config.is_configured() {
            let store = PgStore::connect(config).await?;
            Ok(Self::postgres(Arc::new(store)))
        } else {
            let store = if config.seed_demo_data {
                MemoryStore::with_demo_data()
            } else {
                MemoryStore::new()
            };
            info!("No database URL configured, using in-memory store");
            Ok(Self::memory(Arc::new(store)))
        }
    }
}
