//! Request URI composition.

use crate::error::{GraphError, GraphResult};

/// A parent segment of a nested entity's URI.
///
/// For assignments of a compliance policy the base is
/// `deviceManagement/deviceCompliancePolicies` and the parent suffix is
/// `assignments`, giving
/// `deviceManagement/deviceCompliancePolicies/{policyId}/assignments/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentEntity {
    /// Local attribute holding the parent id in plan and state.
    pub id_attribute: String,
    /// Segment following the parent id.
    pub uri_suffix: String,
}

/// URI template of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUri {
    base: String,
    parents: Vec<ParentEntity>,
}

impl EntityUri {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            parents: Vec::new(),
        }
    }

    /// Nests the entity one level deeper.
    #[must_use]
    pub fn with_parent(mut self, id_attribute: impl Into<String>, uri_suffix: impl Into<String>) -> Self {
        self.parents.push(ParentEntity {
            id_attribute: id_attribute.into(),
            uri_suffix: uri_suffix.into(),
        });
        self
    }

    pub fn parents(&self) -> &[ParentEntity] {
        &self.parents
    }

    /// The collection URI, given one id per parent in declaration order.
    pub fn collection(&self, parent_ids: &[String]) -> GraphResult<String> {
        if parent_ids.len() != self.parents.len() {
            return Err(GraphError::InvalidUri(format!(
                "{} expects {} parent ids, got {}",
                self.base,
                self.parents.len(),
                parent_ids.len()
            )));
        }
        let mut uri = self.base.trim_matches('/').to_string();
        for (parent, id) in self.parents.iter().zip(parent_ids) {
            if id.is_empty() {
                return Err(GraphError::InvalidUri(format!(
                    "{}: parent id {} is empty",
                    self.base, parent.id_attribute
                )));
            }
            uri.push('/');
            uri.push_str(&urlencoding::encode(id));
            uri.push('/');
            uri.push_str(parent.uri_suffix.trim_matches('/'));
        }
        Ok(uri)
    }

    /// The URI of one entity.
    pub fn entity(&self, parent_ids: &[String], id: &str) -> GraphResult<String> {
        if id.is_empty() {
            return Err(GraphError::InvalidUri(format!("{}: entity id is empty", self.base)));
        }
        Ok(format!("{}/{}", self.collection(parent_ids)?, urlencoding::encode(id)))
    }
}

/// An additional GET issued after reading an entity, merged into the entity
/// under `attribute` before translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraRequest {
    /// Graph property name the result is stored under.
    pub attribute: String,
    /// Path appended to the entity URI.
    pub uri_suffix: String,
}

/// OData query parameters for reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub expand: Option<String>,
    pub select: Vec<String>,
    pub filter: Option<String>,
}

impl QueryOptions {
    pub fn filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Appends the query string to `uri`.
    pub fn apply(&self, uri: &str) -> String {
        let mut params = Vec::new();
        if let Some(expand) = &self.expand {
            params.push(format!("$expand={}", urlencoding::encode(expand)));
        }
        if !self.select.is_empty() {
            params.push(format!("$select={}", urlencoding::encode(&self.select.join(","))));
        }
        if let Some(filter) = &self.filter {
            params.push(format!("$filter={}", urlencoding::encode(filter)));
        }
        if params.is_empty() {
            return uri.to_string();
        }
        let separator = if uri.contains('?') { '&' } else { '?' };
        format!("{uri}{separator}{}", params.join("&"))
    }
}

/// Quotes a value as an OData string literal, doubling embedded quotes.
pub fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
