//! Directus item list queries.

use serde_json::{json, Map, Value};

use crate::records::Collection;

/// Query parameters for listing items of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    /// Directus filter object
    pub filter: Option<Map<String, Value>>,

    /// Sort fields, `-` prefix for descending
    pub sort: Vec<String>,

    /// Fields to return (all when empty)
    pub fields: Vec<String>,

    /// Maximum number of items (`-1` for all)
    pub limit: Option<i64>,

    /// Metadata to include (e.g. `total_count`)
    pub meta: Option<String>,
}

impl ItemQuery {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default query for a collection: its sort and field list.
    pub fn for_collection<C: Collection>() -> Self {
        Self::new()
            .sort(C::SORT.iter().copied())
            .fields(C::FIELDS.iter().copied())
    }

    /// Set the sort fields.
    pub fn sort<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the returned fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Limit the number of items.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Request metadata alongside the items.
    pub fn meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    /// Add a filter condition on one field, merged into the existing filter.
    pub fn filter_field(mut self, field: &str, condition: Value) -> Self {
        self.filter
            .get_or_insert_with(Map::new)
            .insert(field.to_string(), condition);
        self
    }

    /// Restrict to items whose `status` is `published`.
    ///
    /// Any existing condition on `status` is replaced; other conditions are kept.
    pub fn published(self) -> Self {
        self.filter_field("status", json!({ "_eq": "published" }))
    }

    /// Serialize to Directus query parameters.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(filter) = &self.filter {
            params.push(("filter", Value::Object(filter.clone()).to_string()));
        }
        if !self.sort.is_empty() {
            params.push(("sort", self.sort.join(",")));
        }
        if !self.fields.is_empty() {
            params.push(("fields", self.fields.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(meta) = &self.meta {
            params.push(("meta", meta.clone()));
        }

        params
    }
}
