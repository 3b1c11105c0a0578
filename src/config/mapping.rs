use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::filter::{FilterError, FilterOrder, FilterWhere, JsonPointer, SortKey};
use crate::resource::ResourcePath;

/// Errors from loading or validating the repository mapping document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {0}")]
    Parse(String),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required configuration section: {0}")]
    MissingSection(&'static str),

    #[error("Type path {0} is mapped more than once")]
    DuplicateMapping(String),

    #[error("Invalid query {id}: {reason}")]
    InvalidQuery { id: String, reason: String },
}

/// The repository mapping document (`repo.<type>.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub queries: Option<QueriesConfig>,

    #[serde(default)]
    pub commands: BTreeMap<String, QueryDefinition>,

    #[serde(rename = "resourceMapping", default)]
    pub resource_mapping: Option<ResourceMappingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueriesConfig {
    #[serde(default)]
    pub generic: Option<BTreeMap<String, QueryDefinition>>,

    #[serde(default)]
    pub explicit: Option<BTreeMap<String, QueryDefinition>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMappingConfig {
    #[serde(rename = "defaultMapping", default)]
    pub default_mapping: Option<MappingConfig>,

    #[serde(rename = "genericMapping", default)]
    pub generic_mapping: BTreeMap<String, MappingConfig>,

    #[serde(rename = "explicitMapping", default)]
    pub explicit_mapping: BTreeMap<String, MappingConfig>,
}

/// Per-type handler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Backend collection path; required for generic mappings.
    #[serde(default)]
    pub resource: Option<String>,

    /// Top-level fields kept outside `fullobject` in addition to `_id` and `_rev`.
    #[serde(rename = "explicitProperties", default)]
    pub explicit_properties: Vec<String>,
}

/// Named query or command: a where-JSON filter with optional `${param}` tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    #[serde(rename = "_queryFilter")]
    pub query_filter: Value,

    #[serde(rename = "_fields", default)]
    pub fields: Option<FieldList>,

    /// Default ordering, in any form `FilterOrder::validate_and_parse` accepts.
    #[serde(rename = "_sortKeys", default)]
    pub sort_keys: Option<Value>,
}

impl QueryDefinition {
    pub fn sort_keys(&self) -> Result<Vec<SortKey>, FilterError> {
        self.sort_keys
            .as_ref()
            .map_or(Ok(vec![]), FilterOrder::validate_and_parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    Csv(String),
    List(Vec<String>),
}

impl FieldList {
    pub fn pointers(&self) -> Vec<JsonPointer> {
        match self {
            FieldList::Csv(csv) => csv
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(JsonPointer::parse)
                .collect(),
            FieldList::List(list) => list.iter().map(|f| JsonPointer::parse(f)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Generic,
    Explicit,
}

/// One configured type after wildcard stripping.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    pub type_path: ResourcePath,
    pub kind: MappingKind,
    pub repo_resource: ResourcePath,
    pub config: MappingConfig,
}

pub const DEFAULT_REPO_RESOURCE: &str = "default";

impl RepoConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: RepoConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(format!("JSON configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RepoConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(format!("YAML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load by file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generic_queries()?;
        let resource_mapping = self.resource_mapping()?;
        if !resource_mapping.explicit_mapping.is_empty() {
            self.explicit_queries()?;
        }

        let all_queries = self
            .queries
            .iter()
            .flat_map(|q| q.generic.iter().chain(q.explicit.iter()))
            .flatten()
            .chain(self.commands.iter());
        for (id, definition) in all_queries {
            FilterWhere::parse(&definition.query_filter)
                .and_then(|_| definition.sort_keys())
                .map_err(|e| ConfigError::InvalidQuery {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
        }

        self.type_mappings().map(|_| ())
    }

    fn resource_mapping(&self) -> Result<&ResourceMappingConfig, ConfigError> {
        self.resource_mapping
            .as_ref()
            .ok_or(ConfigError::MissingSection("resourceMapping"))
    }

    pub fn generic_queries(&self) -> Result<&BTreeMap<String, QueryDefinition>, ConfigError> {
        self.queries
            .as_ref()
            .ok_or(ConfigError::MissingSection("queries"))?
            .generic
            .as_ref()
            .ok_or(ConfigError::MissingSection("queries/generic"))
    }

    pub fn explicit_queries(&self) -> Result<&BTreeMap<String, QueryDefinition>, ConfigError> {
        self.queries
            .as_ref()
            .ok_or(ConfigError::MissingSection("queries"))?
            .explicit
            .as_ref()
            .ok_or(ConfigError::MissingSection("queries/explicit"))
    }

    /// Settings and backend path of the handler used for unmapped types.
    pub fn default_mapping(&self) -> Result<(ResourcePath, MappingConfig), ConfigError> {
        let config = self.resource_mapping()?.default_mapping.clone().unwrap_or_default();
        let resource = ResourcePath::parse(config.resource.as_deref().unwrap_or(DEFAULT_REPO_RESOURCE));
        Ok((resource, config))
    }

    /// Configured type mappings with `/*` wildcards stripped. Generic mappings
    /// target their `resource`; explicit mappings target their own type path.
    pub fn type_mappings(&self) -> Result<Vec<TypeMapping>, ConfigError> {
        let resource_mapping = self.resource_mapping()?;
        let mut seen = HashSet::new();
        let mut mappings = Vec::new();

        for (key, config) in &resource_mapping.generic_mapping {
            let type_path = strip_wildcard(key);
            let resource = config
                .resource
                .as_deref()
                .ok_or(ConfigError::MissingSection("resourceMapping/genericMapping/*/resource"))?;
            if !seen.insert(type_path.clone()) {
                return Err(ConfigError::DuplicateMapping(type_path.to_string()));
            }
            mappings.push(TypeMapping {
                repo_resource: ResourcePath::parse(resource),
                type_path,
                kind: MappingKind::Generic,
                config: config.clone(),
            });
        }

        for (key, config) in &resource_mapping.explicit_mapping {
            let type_path = strip_wildcard(key);
            if !seen.insert(type_path.clone()) {
                return Err(ConfigError::DuplicateMapping(type_path.to_string()));
            }
            mappings.push(TypeMapping {
                repo_resource: type_path.clone(),
                type_path,
                kind: MappingKind::Explicit,
                config: config.clone(),
            });
        }

        Ok(mappings)
    }
}

fn strip_wildcard(key: &str) -> ResourcePath {
    ResourcePath::parse(key.strip_suffix("/*").unwrap_or(key))
}
