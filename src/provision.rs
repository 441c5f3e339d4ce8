//! Disposable copy of the source collection for index experiments.

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{MarqueeError, Result};
use crate::store::DocumentStore;

/// How the demo collection was populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CopyMethod {
    #[serde(rename = "$out")]
    Out,
    #[serde(rename = "cursor-copy")]
    CursorCopy,
}

impl CopyMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CopyMethod::Out => "$out",
            CopyMethod::CursorCopy => "cursor-copy",
        }
    }
}

impl std::fmt::Display for CopyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOutcome {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<CopyMethod>,
    /// Documents copied by the cursor fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copied: Option<u64>,
}

impl ProvisionOutcome {
    /// The demo collection was already there; nothing was copied.
    pub fn existing() -> Self {
        Self {
            created: false,
            method: None,
            copied: None,
        }
    }
}

/// Make sure `demo` exists, copying all of `source` into it if not.
///
/// Tries a server-side `$out` copy first and falls back to streaming the
/// source in batches of `batch_size`. Fails only when both paths fail.
#[instrument(skip(store))]
pub async fn ensure_demo_collection(
    store: &dyn DocumentStore,
    source: &str,
    demo: &str,
    batch_size: usize,
) -> Result<ProvisionOutcome> {
    if batch_size == 0 {
        return Err(MarqueeError::Validation("copy batch size must be >= 1".into()));
    }

    if store.collection_exists(demo).await? {
        info!("demo collection already exists");
        return Ok(ProvisionOutcome::existing());
    }

    info!("creating demo collection from source, this may take a while");
    let outcome = match store.copy_with_out(source, demo).await {
        Ok(()) => ProvisionOutcome {
            created: true,
            method: Some(CopyMethod::Out),
            copied: None,
        },
        Err(bulk) => {
            warn!(error = %bulk, "$out copy failed or is unsupported, falling back to cursor copy");
            match copy_in_batches(store, source, demo, batch_size).await {
                Ok(copied) => ProvisionOutcome {
                    created: true,
                    method: Some(CopyMethod::CursorCopy),
                    copied: Some(copied),
                },
                Err(fallback) => {
                    discard_partial_copy(store, demo).await;
                    crate::metrics::PROVISIONS_TOTAL
                        .with_label_values(&["failed"])
                        .inc();
                    return Err(MarqueeError::Provisioning {
                        demo: demo.to_string(),
                        bulk: bulk.to_string(),
                        fallback: fallback.to_string(),
                    });
                }
            }
        }
    };

    if let Some(method) = outcome.method {
        crate::metrics::PROVISIONS_TOTAL
            .with_label_values(&[method.as_str()])
            .inc();
        info!(%method, "demo collection created");
    }
    Ok(outcome)
}

/// Remove a half-filled demo collection so a later run cannot mistake it
/// for a complete copy. Failures are logged, never returned.
async fn discard_partial_copy(store: &dyn DocumentStore, demo: &str) {
    match store.drop_collection(demo).await {
        Ok(()) => info!(demo, "dropped partially copied demo collection"),
        Err(e) => warn!(demo, error = %e, "failed to drop partially copied demo collection"),
    }
}

/// Stream `source` into `target` with `insert_many` batches of at most
/// `batch_size` documents. Returns the number of documents copied.
pub async fn copy_in_batches(
    store: &dyn DocumentStore,
    source: &str,
    target: &str,
    batch_size: usize,
) -> Result<u64> {
    if batch_size == 0 {
        return Err(MarqueeError::Validation("copy batch size must be >= 1".into()));
    }

    let mut docs = store.scan(source).await?;
    let mut batch = Vec::with_capacity(batch_size);
    let mut copied = 0u64;

    while let Some(doc) = docs.next().await {
        batch.push(doc?);
        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            copied += full.len() as u64;
            store.insert_many(target, full).await?;
            debug!(copied, "copied batch");
        }
    }

    if !batch.is_empty() {
        copied += batch.len() as u64;
        store.insert_many(target, batch).await?;
    }

    Ok(copied)
}
