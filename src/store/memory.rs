//! In-process `DocumentStore`.
//!
//! Keeps collections in memory, evaluates equality and comparison filters
//! (arrays match if any element matches, dotted paths are followed), and
//! answers `explain` from a small planner: the first non-`_id` index whose
//! leading field is constrained by the filter wins, otherwise the plan is a
//! collection scan. Individual operations can be made to fail, and every
//! write is counted, so the diagnostic paths can be exercised without a
//! server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use dashmap::DashMap;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::{MarqueeError, Result};
use crate::types::{CollStats, IndexDirection, IndexInfo, IndexKeys};

use super::{DocumentStore, DocumentStream};

const ID_INDEX: &str = "_id_";

/// Bytes charged per index entry per key field when estimating index size.
const INDEX_ENTRY_BYTES: u64 = 16;

struct MemCollection {
    docs: Vec<Document>,
    indexes: Vec<(String, IndexKeys)>,
}

impl MemCollection {
    fn new() -> Self {
        Self {
            docs: Vec::new(),
            indexes: vec![(
                ID_INDEX.to_string(),
                IndexKeys::new(vec![("_id".to_string(), IndexDirection::Ascending)]),
            )],
        }
    }

    fn push(&mut self, mut doc: Document) {
        if !doc.contains_key("_id") {
            doc.insert("_id", ObjectId::new());
        }
        self.docs.push(doc);
    }

    /// Index chosen for `filter`, with the key fields it can bound.
    fn plan(&self, filter: &Document) -> Option<(&str, &IndexKeys, Vec<String>)> {
        self.indexes
            .iter()
            .filter(|(name, _)| name != ID_INDEX || filter.contains_key("_id"))
            .find_map(|(name, keys)| {
                let bounded: Vec<String> = keys
                    .fields()
                    .iter()
                    .map(|(field, _)| field.clone())
                    .take_while(|field| filter.contains_key(field))
                    .collect();
                (!bounded.is_empty()).then_some((name.as_str(), keys, bounded))
            })
    }
}

#[derive(Default)]
struct Faults {
    out_copy: AtomicBool,
    insert: AtomicBool,
    explain: AtomicBool,
    list_indexes: AtomicBool,
    create_index: AtomicBool,
    drop_index: AtomicBool,
    coll_stats: AtomicBool,
    drop_collection: AtomicBool,
    /// Number of `find_ids` calls that succeed before every later one fails.
    find_budget: Option<AtomicUsize>,
    /// Same for `insert_many`.
    insert_budget: Option<AtomicUsize>,
}

pub struct MemoryStore {
    collections: DashMap<String, MemCollection>,
    faults: Faults,
    writes: AtomicUsize,
    find_calls: AtomicUsize,
    insert_batches: Mutex<Vec<usize>>,
    insert_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            faults: Faults::default(),
            writes: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            insert_batches: Mutex::new(Vec::new()),
            insert_calls: AtomicUsize::new(0),
        }
    }

    /// Seed a collection without counting the documents as writes.
    pub fn with_collection(self, name: &str, docs: impl IntoIterator<Item = Document>) -> Self {
        {
            let mut coll = self
                .collections
                .entry(name.to_string())
                .or_insert_with(MemCollection::new);
            for doc in docs {
                coll.push(doc);
            }
        }
        self
    }

    /// Make every `find_ids` call after the first `calls` fail.
    pub fn with_find_budget(mut self, calls: usize) -> Self {
        self.faults.find_budget = Some(AtomicUsize::new(calls));
        self
    }

    /// Make every `insert_many` call after the first `calls` fail.
    pub fn with_insert_budget(mut self, calls: usize) -> Self {
        self.faults.insert_budget = Some(AtomicUsize::new(calls));
        self
    }

    pub fn fail_drop_collection(&self, fail: bool) {
        self.faults.drop_collection.store(fail, Ordering::SeqCst);
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn fail_out_copy(&self, fail: bool) {
        self.faults.out_copy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.faults.insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_explain(&self, fail: bool) {
        self.faults.explain.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list_indexes(&self, fail: bool) {
        self.faults.list_indexes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create_index(&self, fail: bool) {
        self.faults.create_index.store(fail, Ordering::SeqCst);
    }

    pub fn fail_drop_index(&self, fail: bool) {
        self.faults.drop_index.store(fail, Ordering::SeqCst);
    }

    pub fn fail_coll_stats(&self, fail: bool) {
        self.faults.coll_stats.store(fail, Ordering::SeqCst);
    }

    /// Writes issued through the `DocumentStore` trait (inserts, copies,
    /// index creation and drops).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn find_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Sizes of every `insert_many` batch, in order.
    pub async fn insert_batches(&self) -> Vec<usize> {
        self.insert_batches.lock().await.clone()
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }

    pub fn index_names(&self, collection: &str) -> Vec<String> {
        self.collections
            .get(collection)
            .map(|c| c.indexes.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(MarqueeError::Store(format!("injected {op} failure")));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn apply_operator(op: &str, value: &Bson, operand: &Bson) -> bool {
    if op == "$eq" {
        return values_equal(value, operand);
    }
    let (Some(v), Some(o)) = (as_f64(value), as_f64(operand)) else {
        return false;
    };
    match op {
        "$gt" => v > o,
        "$gte" => v >= o,
        "$lt" => v < o,
        "$lte" => v <= o,
        _ => false,
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(path, condition)| {
        let candidates: Vec<&Bson> = match lookup(doc, path) {
            Some(Bson::Array(items)) => items.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        };
        match condition {
            Bson::Document(ops) if ops.keys().all(|k| k.starts_with('$')) => ops
                .iter()
                .all(|(op, operand)| candidates.iter().any(|v| apply_operator(op, v, operand))),
            expected => candidates.iter().any(|v| values_equal(v, expected)),
        }
    })
}

fn restrict(filter: &Document, fields: &[String]) -> Document {
    filter
        .iter()
        .filter(|(k, _)| fields.iter().any(|f| f == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.contains_key(collection))
    }

    async fn find_ids(&self, collection: &str, filter: &Document) -> Result<usize> {
        let calls = self.find_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(budget) = &self.faults.find_budget {
            if calls > budget.load(Ordering::SeqCst) {
                return Err(MarqueeError::Store("connection dropped during find".into()));
            }
        }

        Ok(self
            .collections
            .get(collection)
            .map(|c| c.docs.iter().filter(|d| matches(d, filter)).count())
            .unwrap_or(0))
    }

    async fn explain_find(
        &self,
        collection: &str,
        filter: &Document,
    ) -> Result<serde_json::Value> {
        Self::check(&self.faults.explain, "explain")?;
        let start = Instant::now();

        let empty = MemCollection::new();
        let guard = self.collections.get(collection);
        let coll = guard.as_deref().unwrap_or(&empty);

        let returned = coll.docs.iter().filter(|d| matches(d, filter)).count();
        let (stages, keys_examined, docs_examined) = match coll.plan(filter) {
            Some((name, keys, bounded)) => {
                let bounds = restrict(filter, &bounded);
                let keys_examined = coll.docs.iter().filter(|d| matches(d, &bounds)).count();
                let stages = json!({
                    "stage": "FETCH",
                    "nReturned": returned,
                    "docsExamined": keys_examined,
                    "inputStage": {
                        "stage": "IXSCAN",
                        "indexName": name,
                        "keyPattern": Bson::Document(keys.to_document()).into_relaxed_extjson(),
                        "nReturned": keys_examined,
                        "keysExamined": keys_examined,
                    },
                });
                (stages, keys_examined, keys_examined)
            }
            None => {
                let stages = json!({
                    "stage": "COLLSCAN",
                    "nReturned": returned,
                    "docsExamined": coll.docs.len(),
                });
                (stages, 0, coll.docs.len())
            }
        };

        Ok(json!({
            "queryPlanner": {
                "namespace": format!("memory.{collection}"),
                "parsedQuery": Bson::Document(filter.clone()).into_relaxed_extjson(),
                "winningPlan": stages.clone(),
            },
            "executionStats": {
                "executionSuccess": true,
                "nReturned": returned,
                "executionTimeMillis": start.elapsed().as_millis() as u64,
                "totalKeysExamined": keys_examined,
                "totalDocsExamined": docs_examined,
                "executionStages": stages,
            },
        }))
    }

    async fn copy_with_out(&self, source: &str, target: &str) -> Result<()> {
        Self::check(&self.faults.out_copy, "$out")?;

        let docs = self
            .collections
            .get(source)
            .map(|c| c.docs.clone())
            .unwrap_or_default();
        let mut copy = MemCollection::new();
        copy.docs = docs;
        self.collections.insert(target.to_string(), copy);
        self.record_write();
        Ok(())
    }

    async fn scan(&self, collection: &str) -> Result<DocumentStream> {
        let docs = self
            .collections
            .get(collection)
            .map(|c| c.docs.clone())
            .unwrap_or_default();
        Ok(futures::stream::iter(docs.into_iter().map(Ok)).boxed())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<()> {
        Self::check(&self.faults.insert, "insert")?;
        let calls = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(budget) = &self.faults.insert_budget {
            if calls > budget.load(Ordering::SeqCst) {
                return Err(MarqueeError::Store("connection dropped during insert".into()));
            }
        }
        if docs.is_empty() {
            return Err(MarqueeError::Store(
                "insert_many requires at least one document".into(),
            ));
        }

        let count = docs.len();
        {
            let mut coll = self
                .collections
                .entry(collection.to_string())
                .or_insert_with(MemCollection::new);
            for doc in docs {
                coll.push(doc);
            }
        }
        self.insert_batches.lock().await.push(count);
        self.record_write();
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        Self::check(&self.faults.drop_collection, "drop")?;
        if self.collections.remove(collection).is_some() {
            self.record_write();
        }
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexInfo>> {
        Self::check(&self.faults.list_indexes, "listIndexes")?;
        Ok(self
            .collections
            .get(collection)
            .map(|c| {
                c.indexes
                    .iter()
                    .map(|(name, keys)| IndexInfo {
                        name: name.clone(),
                        keys: Some(keys.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, keys: &IndexKeys) -> Result<String> {
        Self::check(&self.faults.create_index, "createIndex")?;

        let name = keys.default_name();
        {
            let mut coll = self
                .collections
                .entry(collection.to_string())
                .or_insert_with(MemCollection::new);
            match coll.indexes.iter().find(|(n, _)| *n == name) {
                Some((_, existing)) if existing == keys => return Ok(name),
                Some(_) => {
                    return Err(MarqueeError::Store(format!(
                        "index '{name}' already exists with different keys"
                    )))
                }
                None => coll.indexes.push((name.clone(), keys.clone())),
            }
        }
        self.record_write();
        Ok(name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        Self::check(&self.faults.drop_index, "dropIndex")?;
        if name == ID_INDEX {
            return Err(MarqueeError::Store("cannot drop _id index".into()));
        }

        {
            let mut coll = self.collections.get_mut(collection).ok_or_else(|| {
                MarqueeError::Store(format!("ns not found: {collection}"))
            })?;
            let before = coll.indexes.len();
            coll.indexes.retain(|(n, _)| n != name);
            if coll.indexes.len() == before {
                return Err(MarqueeError::Store(format!(
                    "index not found with name [{name}]"
                )));
            }
        }
        self.record_write();
        Ok(())
    }

    async fn coll_stats(&self, collection: &str) -> Result<CollStats> {
        Self::check(&self.faults.coll_stats, "collStats")?;
        let coll = self
            .collections
            .get(collection)
            .ok_or_else(|| MarqueeError::Store(format!("ns not found: {collection}")))?;

        let count = coll.docs.len() as u64;
        let index_sizes: std::collections::BTreeMap<String, u64> = coll
            .indexes
            .iter()
            .map(|(name, keys)| {
                (
                    name.clone(),
                    count * INDEX_ENTRY_BYTES * keys.fields().len() as u64,
                )
            })
            .collect();

        Ok(CollStats {
            count,
            total_index_size: index_sizes.values().sum(),
            index_sizes,
        })
    }
}
