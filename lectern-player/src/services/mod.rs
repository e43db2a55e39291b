//! External collaborators
//!
//! The content service owns items, read-along data and progress records.
//! The player reaches it through these traits so tests and alternative
//! transports can stand in for [`ContentClient`].

mod cache;
mod http;

pub use cache::ReadAlongCache;
pub use http::ContentClient;

use crate::error::Result;
use async_trait::async_trait;
use lectern_common::{Item, ProgressRecord, ReadAlongData};
use std::sync::Arc;

/// Destination of progress writes
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Persist one record (last write wins)
    async fn save_progress(&self, record: &ProgressRecord) -> Result<()>;

    /// Saved position for `item_id`, if any
    async fn fetch_progress(&self, _item_id: &str) -> Result<Option<ProgressRecord>> {
        Ok(None)
    }
}

/// Source of read-along data
#[async_trait]
pub trait ReadAlongSource: Send + Sync {
    /// `Ok(None)` when the item has no read-along data
    async fn fetch_read_along(&self, item_id: &str) -> Result<Option<ReadAlongData>>;
}

/// Source of ordered item lists
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_items(&self, collection_id: &str) -> Result<Vec<Item>>;
}

/// The three service handles a player context needs
#[derive(Clone)]
pub struct Services {
    pub progress: Arc<dyn ProgressSink>,
    pub read_along: Arc<dyn ReadAlongSource>,
    pub items: Arc<dyn ItemSource>,
}

impl Services {
    /// All three roles served by one content client
    pub fn from_client(client: Arc<ContentClient>) -> Self {
        Self {
            progress: client.clone(),
            read_along: client.clone(),
            items: client,
        }
    }
}
