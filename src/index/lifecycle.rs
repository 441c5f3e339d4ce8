use tracing::{info, instrument, warn};

use crate::error::{MarqueeError, Result};
use crate::store::DocumentStore;
use crate::types::IndexKeys;

/// Index operations bound to one store handle and one collection.
pub struct IndexLifecycle<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
}

impl<'a> IndexLifecycle<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str) -> Self {
        Self { store, collection }
    }

    /// Name of the index whose keys equal `keys` field-for-field, in order.
    #[instrument(skip_all, fields(collection = self.collection, keys = %keys))]
    pub async fn find_existing(&self, keys: &IndexKeys) -> Result<Option<String>> {
        let indexes = self.store.list_indexes(self.collection).await?;
        Ok(indexes
            .into_iter()
            .find(|index| index.keys.as_ref() == Some(keys))
            .map(|index| index.name))
    }

    /// Drop the index matching `keys` if there is one. Lookup and drop
    /// errors are logged, never returned.
    pub async fn drop_if_exists(&self, keys: &IndexKeys) -> bool {
        let name = match self.find_existing(keys).await {
            Ok(Some(name)) => name,
            Ok(None) => return false,
            Err(e) => {
                warn!(collection = self.collection, error = %e, "error checking for existing index");
                return false;
            }
        };

        match self.store.drop_index(self.collection, &name).await {
            Ok(()) => {
                info!(collection = self.collection, index = %name, "dropped existing index");
                true
            }
            Err(e) => {
                warn!(collection = self.collection, index = %name, error = %e, "error dropping existing index");
                false
            }
        }
    }

    /// Create the index and return its name.
    #[instrument(skip_all, fields(collection = self.collection, keys = %keys))]
    pub async fn create(&self, keys: &IndexKeys) -> Result<String> {
        let name = self
            .store
            .create_index(self.collection, keys)
            .await
            .map_err(|e| MarqueeError::IndexCreation {
                collection: self.collection.to_string(),
                keys: keys.to_string(),
                source: Box::new(e),
            })?;
        info!(index = %name, "index created");
        Ok(name)
    }

    /// Drop an index by name. Errors are logged, never returned.
    pub async fn drop(&self, name: &str) -> bool {
        match self.store.drop_index(self.collection, name).await {
            Ok(()) => {
                info!(collection = self.collection, index = name, "index dropped");
                true
            }
            Err(e) => {
                warn!(collection = self.collection, index = name, error = %e, "failed to drop index");
                false
            }
        }
    }
}
