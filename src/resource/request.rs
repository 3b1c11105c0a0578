use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::{JsonPointer, QueryFilter, SortKey};
use crate::resource::path::ResourcePath;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub resource_path: ResourcePath,
    /// Client-assigned identifier; the backend generates one when absent.
    pub new_resource_id: Option<String>,
    pub content: Value,
}

impl CreateRequest {
    pub fn new(resource_path: impl Into<ResourcePath>, content: Value) -> Self {
        Self {
            resource_path: resource_path.into(),
            new_resource_id: None,
            content,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.new_resource_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub resource_path: ResourcePath,
    pub fields: Vec<JsonPointer>,
}

impl ReadRequest {
    pub fn new(resource_path: impl Into<ResourcePath>) -> Self {
        Self {
            resource_path: resource_path.into(),
            fields: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub resource_path: ResourcePath,
    /// Expected revision (MVCC); `None` updates unconditionally.
    pub revision: Option<String>,
    pub content: Value,
}

impl UpdateRequest {
    pub fn new(resource_path: impl Into<ResourcePath>, content: Value) -> Self {
        Self {
            resource_path: resource_path.into(),
            revision: None,
            content,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
    Increment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub operation: PatchOp,
    pub field: JsonPointer,
    #[serde(default)]
    pub value: Value,
}

impl PatchOperation {
    pub fn new(operation: PatchOp, field: impl Into<JsonPointer>, value: Value) -> Self {
        Self {
            operation,
            field: field.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
    pub resource_path: ResourcePath,
    pub revision: Option<String>,
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    pub fn new(resource_path: impl Into<ResourcePath>, operations: Vec<PatchOperation>) -> Self {
        Self {
            resource_path: resource_path.into(),
            revision: None,
            operations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub resource_path: ResourcePath,
    pub revision: Option<String>,
}

impl DeleteRequest {
    pub fn new(resource_path: impl Into<ResourcePath>) -> Self {
        Self {
            resource_path: resource_path.into(),
            revision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub resource_path: ResourcePath,
    pub action: String,
    pub content: Value,
    pub parameters: BTreeMap<String, String>,
}

impl ActionRequest {
    pub fn new(resource_path: impl Into<ResourcePath>, action: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            action: action.into(),
            content: Value::Null,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Query addressed either by a filter, a named query id, or a native expression.
/// Exactly one of the three must be present once the request is normalized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    pub resource_path: ResourcePath,
    pub query_id: Option<String>,
    pub query_filter: Option<QueryFilter>,
    pub query_expression: Option<String>,
    pub fields: Vec<JsonPointer>,
    pub sort_keys: Vec<SortKey>,
    pub page_size: Option<i32>,
    pub paged_results_offset: Option<i32>,
    pub additional_parameters: BTreeMap<String, String>,
}

impl QueryRequest {
    pub fn new(resource_path: impl Into<ResourcePath>) -> Self {
        Self {
            resource_path: resource_path.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.query_filter = Some(filter);
        self
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_fields<I, P>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<JsonPointer>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}
