//! Document store seam.
//!
//! The diagnostic code never talks to a driver directly; it is handed a
//! `&dyn DocumentStore` and a collection name for every operation.
//! `MongoStore` backs production. `MemoryStore`, built for tests or with the
//! `test-util` feature, keeps everything in process.

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{CollStats, IndexInfo, IndexKeys};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Stream of every document in a collection, in natural order.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Driver operations the diagnostics need from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether a collection with exactly this name exists.
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Run `find(filter)` projecting only `_id`, drain the cursor, and
    /// return the number of documents returned.
    async fn find_ids(&self, collection: &str, filter: &Document) -> Result<usize>;

    /// Planner report for `find(filter)` at `executionStats` verbosity.
    async fn explain_find(&self, collection: &str, filter: &Document)
        -> Result<serde_json::Value>;

    /// Server-side copy of the whole of `source` into `target`
    /// (`$match {}` + `$out`, disk use allowed).
    async fn copy_with_out(&self, source: &str, target: &str) -> Result<()>;

    /// Stream every document of a collection.
    async fn scan(&self, collection: &str) -> Result<DocumentStream>;

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<()>;

    /// Drop a collection and its indexes. Dropping a missing collection
    /// is not an error.
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>>;

    /// Create an index and return its name.
    async fn create_index(&self, collection: &str, keys: &IndexKeys) -> Result<String>;

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()>;

    async fn coll_stats(&self, collection: &str) -> Result<CollStats>;
}
