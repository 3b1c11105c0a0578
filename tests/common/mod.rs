#![allow(dead_code)]

use std::sync::{Arc, Once};

use serde_json::json;

use directory_repo::backend::{ConnectionStats, LocalConnectionFactory, MemoryBackend};
use directory_repo::config::RepoConfig;
use directory_repo::error::ResourceError;
use directory_repo::repo::{RepositoryService, TypeHandlerRegistry};
use directory_repo::resource::{Context, QueryRequest, QueryResponse, ResourceResponse};

static TRACING: Once = Once::new();

/// Route library logs through the test writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn sample_config() -> RepoConfig {
    let doc = json!({
        "queries": {
            "generic": {
                "query-all-ids": {"_queryFilter": true, "_fields": "_id"},
                "find-by-name": {"_queryFilter": {"name": "${name}"}},
                "find-by-status": {"_queryFilter": {"status": "${status}"}, "_fields": ["name"]},
                "oldest-first": {"_queryFilter": true, "_sortKeys": ["age desc"]}
            },
            "explicit": {
                "find-by-username": {"_queryFilter": {"userName": "${userName}"}}
            }
        },
        "commands": {
            "purge-inactive": {"_queryFilter": {"status": "inactive"}},
            "purge-named": {"_queryFilter": {"name": "${name}"}}
        },
        "resourceMapping": {
            "defaultMapping": {"resource": "genericobjects"},
            "genericMapping": {
                "managed/*": {"resource": "managedobjects", "explicitProperties": ["userName"]},
                "config": {"resource": "configobjects"}
            },
            "explicitMapping": {
                "internal/user": {}
            }
        }
    });
    RepoConfig::from_json_str(&doc.to_string()).expect("sample config parses")
}

/// Repository service over a fresh in-memory backend.
pub struct Harness {
    pub service: RepositoryService,
    pub backend: Arc<MemoryBackend>,
    pub connections: Arc<LocalConnectionFactory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&sample_config())
    }

    pub fn with_config(config: &RepoConfig) -> Self {
        init_tracing();
        let backend = Arc::new(MemoryBackend::new());
        let registry = TypeHandlerRegistry::from_config(config, backend.clone()).expect("registry builds");
        let connections = Arc::new(LocalConnectionFactory::new());
        let service = RepositoryService::new(Arc::new(registry), connections.clone());
        Self {
            service,
            backend,
            connections,
        }
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.connections.stats()
    }

    pub fn context(&self) -> Context {
        Context::for_caller("test")
    }

    /// Run a query and collect every streamed result.
    pub async fn query(&self, request: QueryRequest) -> Result<(Vec<ResourceResponse>, QueryResponse), ResourceError> {
        let mut results = Vec::new();
        let response = self
            .service
            .handle_query(&self.context(), request, &mut |r: ResourceResponse| {
                results.push(r);
                true
            })
            .await?;
        Ok((results, response))
    }

    pub fn assert_connections_balanced(&self) {
        let stats = self.stats();
        assert_eq!(stats.acquired(), stats.released(), "every acquired connection is released");
        assert_eq!(stats.double_releases(), 0, "no connection is released twice");
    }
}

pub fn ids(results: &[ResourceResponse]) -> Vec<String> {
    results.iter().filter_map(|r| r.id.clone()).collect()
}
