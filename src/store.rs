use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ImportError;
use crate::model::Recipe;

/// Collection holding recipe documents
pub const RECIPES_COLLECTION: &str = "recipes";

/// A stored document: a JSON object keyed by field name
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Equality filters, an optional sort field and a limit over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Query {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, document: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }
}

/// Document database used by the rest of the application.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, ImportError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, ImportError>;

    /// Create or replace a document
    async fn set(&self, collection: &str, id: &str, document: Document)
        -> Result<(), ImportError>;

    /// Merge `fields` into an existing document
    async fn update(&self, collection: &str, id: &str, fields: Document)
        -> Result<(), ImportError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ImportError>;
}

/// In-process [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, ImportError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, ImportError> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut found: Vec<Document> = documents
            .values()
            .filter(|document| query.matches(document))
            .cloned()
            .collect();

        if let Some((field, direction)) = &query.order_by {
            found.sort_by(|a, b| {
                let ordering = compare_fields(a.get(field), b.get(field));
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }

        Ok(found)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<(), ImportError> {
        debug!("set {collection}/{id}");
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), ImportError> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| ImportError::StoreError(format!("{collection}/{id} does not exist")))?;
        document.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ImportError> {
        if let Some(documents) = self.collections.write().await.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }
}

/// Missing fields sort first; RFC 3339 timestamps compare chronologically.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIngredient {
    pub name: String,
    pub count: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub text: String,
    pub expanded: bool,
}

/// Recipe document as the application stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecipe {
    pub user_id: Option<String>,
    pub uid: String,
    pub url: Option<String>,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<StoredIngredient>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub tastes: Vec<String>,
    #[serde(default)]
    pub has_cooked: bool,
    #[serde(default)]
    pub likes: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastUpdatedAt", default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl StoredRecipe {
    /// New document for a freshly imported recipe owned by `user_id`
    pub fn from_import(recipe: &Recipe, url: &str, user_id: &str) -> Self {
        StoredRecipe {
            user_id: Some(user_id.to_string()),
            uid: Uuid::new_v4().to_string(),
            url: Some(url.to_string()),
            name: (!recipe.name.is_empty()).then(|| recipe.name.clone()),
            photo_url: None,
            ingredients: recipe
                .ingredients
                .iter()
                .map(|ingredient| StoredIngredient {
                    name: ingredient.name.clone(),
                    count: ingredient.amount.clone(),
                })
                .collect(),
            steps: recipe
                .instructions
                .iter()
                .map(|text| Step {
                    text: text.clone(),
                    expanded: false,
                })
                .collect(),
            tastes: Vec::new(),
            has_cooked: false,
            likes: 0,
            created_at: Utc::now(),
            last_updated_at: None,
        }
    }

    pub fn to_document(&self) -> Result<Document, ImportError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(ImportError::StoreError(
                "recipe did not serialize to an object".to_string(),
            )),
            Err(e) => Err(ImportError::StoreError(e.to_string())),
        }
    }

    pub fn from_document(document: Document) -> Result<Self, ImportError> {
        serde_json::from_value(Value::Object(document))
            .map_err(|e| ImportError::StoreError(format!("malformed recipe document: {e}")))
    }
}

/// Write an imported recipe to the `recipes` collection for `user_id`.
pub async fn save_imported_recipe(
    store: &dyn DocumentStore,
    recipe: &Recipe,
    url: &str,
    user_id: &str,
) -> Result<StoredRecipe, ImportError> {
    let stored = StoredRecipe::from_import(recipe, url, user_id);
    store
        .set(RECIPES_COLLECTION, &stored.uid, stored.to_document()?)
        .await?;
    Ok(stored)
}

/// Recipes newest first, optionally narrowed to one owner and cooked state.
pub async fn get_recipes(
    store: &dyn DocumentStore,
    user_id: Option<&str>,
    has_cooked: Option<bool>,
) -> Result<Vec<StoredRecipe>, ImportError> {
    let mut query =
        Query::new(RECIPES_COLLECTION).order_by("createdAt", SortDirection::Descending);
    if let Some(user_id) = user_id {
        query = query.where_eq("user_id", user_id);
    }
    if let Some(has_cooked) = has_cooked {
        query = query.where_eq("has_cooked", has_cooked);
    }

    store
        .query(&query)
        .await?
        .into_iter()
        .map(StoredRecipe::from_document)
        .collect()
}

pub async fn get_recipe(
    store: &dyn DocumentStore,
    uid: &str,
) -> Result<Option<StoredRecipe>, ImportError> {
    store
        .get(RECIPES_COLLECTION, uid)
        .await?
        .map(StoredRecipe::from_document)
        .transpose()
}
