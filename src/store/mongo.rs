use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{Client, Database, IndexModel};
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;
use crate::error::{MarqueeError, Result};
use crate::types::{CollStats, IndexInfo, IndexKeys};

use super::{DocumentStore, DocumentStream};

/// `DocumentStore` over a live MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect and ping. The database named in the URI wins over
    /// `database.name`.
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri).await?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(&config.name));

        db.run_command(doc! { "ping": 1 }).await?;
        info!(database = db.name(), "connected to mongodb");

        Ok(Self { db })
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

/// Numeric stats fields arrive as Int32, Int64 or Double depending on size.
fn bson_u64(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(v) => u64::try_from(*v).ok(),
        Bson::Int64(v) => u64::try_from(*v).ok(),
        Bson::Double(v) if *v >= 0.0 => Some(*v as u64),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let names = self
            .db
            .list_collection_names()
            .filter(doc! { "name": collection })
            .await?;
        Ok(names.iter().any(|n| n == collection))
    }

    async fn find_ids(&self, collection: &str, filter: &Document) -> Result<usize> {
        let cursor = self
            .collection(collection)
            .find(filter.clone())
            .projection(doc! { "_id": 1 })
            .await?;
        let ids: Vec<Document> = cursor.try_collect().await?;
        Ok(ids.len())
    }

    async fn explain_find(
        &self,
        collection: &str,
        filter: &Document,
    ) -> Result<serde_json::Value> {
        let reply = self
            .db
            .run_command(doc! {
                "explain": { "find": collection, "filter": filter.clone() },
                "verbosity": "executionStats",
            })
            .await?;
        Ok(Bson::Document(reply).into_relaxed_extjson())
    }

    #[instrument(skip(self))]
    async fn copy_with_out(&self, source: &str, target: &str) -> Result<()> {
        let pipeline = vec![doc! { "$match": {} }, doc! { "$out": target }];
        let cursor = self
            .collection(source)
            .aggregate(pipeline)
            .allow_disk_use(true)
            .await?;
        // $out yields no documents, but the cursor must be driven to completion.
        let _: Vec<Document> = cursor.try_collect().await?;
        Ok(())
    }

    async fn scan(&self, collection: &str) -> Result<DocumentStream> {
        let cursor = self.collection(collection).find(doc! {}).await?;
        Ok(cursor.map_err(MarqueeError::from).boxed())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<()> {
        let count = docs.len();
        self.collection(collection).insert_many(docs).await?;
        debug!(collection, count, "inserted batch");
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collection(collection).drop().await?;
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>> {
        let cursor = self.collection(collection).list_indexes().await?;
        let models: Vec<IndexModel> = cursor.try_collect().await?;

        Ok(models
            .into_iter()
            .map(|model| {
                let keys = IndexKeys::from_document(&model.keys);
                let name = model
                    .options
                    .as_ref()
                    .and_then(|o| o.name.clone())
                    .or_else(|| keys.as_ref().map(IndexKeys::default_name))
                    .unwrap_or_default();
                IndexInfo { name, keys }
            })
            .collect())
    }

    async fn create_index(&self, collection: &str, keys: &IndexKeys) -> Result<String> {
        let model = IndexModel::builder().keys(keys.to_document()).build();
        let created = self.collection(collection).create_index(model).await?;
        Ok(created.index_name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        self.collection(collection).drop_index(name).await?;
        Ok(())
    }

    async fn coll_stats(&self, collection: &str) -> Result<CollStats> {
        let stats = self
            .db
            .run_command(doc! { "collStats": collection })
            .await?;

        let index_sizes = stats
            .get_document("indexSizes")
            .map(|sizes| {
                sizes
                    .iter()
                    .filter_map(|(name, size)| bson_u64(size).map(|s| (name.clone(), s)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(CollStats {
            count: stats.get("count").and_then(bson_u64).unwrap_or(0),
            total_index_size: stats.get("totalIndexSize").and_then(bson_u64).unwrap_or(0),
            index_sizes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bson_u64_accepts_all_numeric_widths() {
        assert_eq!(bson_u64(&Bson::Int32(7)), Some(7));
        assert_eq!(bson_u64(&Bson::Int64(1 << 40)), Some(1 << 40));
        assert_eq!(bson_u64(&Bson::Double(4096.0)), Some(4096));
        assert_eq!(bson_u64(&Bson::Int32(-1)), None);
        assert_eq!(bson_u64(&Bson::String("1".into())), None);
    }
}
