use std::collections::BTreeMap;

use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

/// The query measured by a comparison: equality on a categorical field
/// plus a lower bound on a numeric field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default = "default_category_field")]
    pub category_field: String,
    pub category: String,
    #[serde(default = "default_numeric_field")]
    pub numeric_field: String,
    pub min: i64,
}

fn default_category_field() -> String {
    "genres".to_string()
}

fn default_numeric_field() -> String {
    "year".to_string()
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self::movies("Action", 2010)
    }
}

impl QuerySpec {
    /// `{ genres: <genre>, year: { $gte: <min_year> } }` over the movies collection.
    pub fn movies(genre: &str, min_year: i64) -> Self {
        Self {
            category_field: default_category_field(),
            category: genre.to_string(),
            numeric_field: default_numeric_field(),
            min: min_year,
        }
    }

    pub fn to_filter(&self) -> Document {
        let mut filter = Document::new();
        filter.insert(self.category_field.clone(), self.category.clone());
        filter.insert(self.numeric_field.clone(), doc! { "$gte": self.min });
        filter
    }

    /// The filter as relaxed extended JSON, as it appears in reports.
    pub fn to_json(&self) -> serde_json::Value {
        Bson::Document(self.to_filter()).into_relaxed_extjson()
    }

    /// Compound index matching the query shape: equality field ascending,
    /// range field descending.
    pub fn index_keys(&self) -> IndexKeys {
        IndexKeys::new(vec![
            (self.category_field.clone(), IndexDirection::Ascending),
            (self.numeric_field.clone(), IndexDirection::Descending),
        ])
    }
}

/// Sort direction of one field in an index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDirection {
    Ascending,
    Descending,
}

impl IndexDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            IndexDirection::Ascending => 1,
            IndexDirection::Descending => -1,
        }
    }

    /// Directions come back from servers as Int32, Int64 or Double.
    fn from_bson(value: &Bson) -> Option<Self> {
        let n = match value {
            Bson::Int32(v) => *v as f64,
            Bson::Int64(v) => *v as f64,
            Bson::Double(v) => *v,
            _ => return None,
        };
        if n == 1.0 {
            Some(IndexDirection::Ascending)
        } else if n == -1.0 {
            Some(IndexDirection::Descending)
        } else {
            None
        }
    }
}

/// Ordered index key specification. Equality is pairwise and
/// order-sensitive, so `{a:1}` never equals `{a:1, b:-1}` and
/// `{a:1, b:-1}` never equals `{b:-1, a:1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeys(Vec<(String, IndexDirection)>);

impl IndexKeys {
    pub fn new(fields: Vec<(String, IndexDirection)>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[(String, IndexDirection)] {
        &self.0
    }

    /// Parse a key document. Returns `None` for keys that are not plain
    /// directional (text, hashed, 2dsphere, ...).
    pub fn from_document(keys: &Document) -> Option<Self> {
        keys.iter()
            .map(|(field, value)| IndexDirection::from_bson(value).map(|d| (field.clone(), d)))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    pub fn to_document(&self) -> Document {
        let mut keys = Document::new();
        for (field, direction) in &self.0 {
            keys.insert(field.clone(), direction.as_i32());
        }
        keys
    }

    /// Server-default index name, e.g. `genres_1_year_-1`.
    pub fn default_name(&self) -> String {
        self.0
            .iter()
            .map(|(field, direction)| format!("{field}_{}", direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl std::fmt::Display for IndexKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, direction)| format!("{field}: {}", direction.as_i32()))
            .collect();
        write!(f, "{{ {} }}", parts.join(", "))
    }
}

/// One index as listed by the store.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    /// `None` when the index is not a plain directional index.
    pub keys: Option<IndexKeys>,
}

/// Collection-level statistics reported after the "after" phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollStats {
    pub count: u64,
    pub total_index_size: u64,
    pub index_sizes: BTreeMap<String, u64>,
}
