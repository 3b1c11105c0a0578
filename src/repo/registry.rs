use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use super::explicit::ExplicitHandler;
use super::generic::GenericHandler;
use super::handler::TypeHandler;
use crate::backend::RequestHandler;
use crate::config::mapping::MappingKind;
use crate::config::{ConfigError, RepoConfig, CONFIG};
use crate::resource::ResourcePath;

/// Maps request type paths to their type handler.
///
/// Configured types match exactly or as a segment-wise prefix; the longest
/// matching prefix wins and anything unmatched goes to the default handler.
/// Resolutions are cached per type path, and the cache is cleared once it
/// grows past its limit.
pub struct TypeHandlerRegistry {
    handlers: HashMap<ResourcePath, Arc<TypeHandler>>,
    default_handler: Arc<TypeHandler>,
    cache: RwLock<HashMap<ResourcePath, Arc<TypeHandler>>>,
    cache_limit: usize,
}

impl TypeHandlerRegistry {
    pub fn new(handlers: HashMap<ResourcePath, Arc<TypeHandler>>, default_handler: Arc<TypeHandler>) -> Self {
        Self {
            handlers,
            default_handler,
            cache: RwLock::new(HashMap::new()),
            cache_limit: CONFIG.repository.resolution_cache_limit,
        }
    }

    pub fn with_cache_limit(mut self, cache_limit: usize) -> Self {
        self.cache_limit = cache_limit.max(1);
        self
    }

    /// Build every configured handler on top of one backend request handler.
    pub fn from_config(config: &RepoConfig, backend: Arc<dyn RequestHandler>) -> Result<Self, ConfigError> {
        config.validate()?;
        let generic_queries = config.generic_queries()?.clone();

        let (default_resource, default_config) = config.default_mapping()?;
        let default_handler = Arc::new(TypeHandler::Generic(GenericHandler::new(
            ExplicitHandler::new(
                default_resource,
                backend.clone(),
                generic_queries.clone(),
                config.commands.clone(),
            ),
            default_config.explicit_properties,
        )));

        let mut handlers = HashMap::new();
        for mapping in config.type_mappings()? {
            let handler = match mapping.kind {
                MappingKind::Generic => TypeHandler::Generic(GenericHandler::new(
                    ExplicitHandler::new(
                        mapping.repo_resource,
                        backend.clone(),
                        generic_queries.clone(),
                        config.commands.clone(),
                    ),
                    mapping.config.explicit_properties,
                )),
                MappingKind::Explicit => TypeHandler::Explicit(ExplicitHandler::new(
                    mapping.repo_resource,
                    backend.clone(),
                    config.explicit_queries()?.clone(),
                    config.commands.clone(),
                )),
            };
            info!("Mapped {} to {} handler on {}", mapping.type_path, handler.kind(), handler.repo_resource());
            handlers.insert(mapping.type_path, Arc::new(handler));
        }

        Ok(Self::new(handlers, default_handler))
    }

    pub fn default_handler(&self) -> &Arc<TypeHandler> {
        &self.default_handler
    }

    /// Handler configured for exactly `type_path`, without prefix matching.
    pub fn configured(&self, type_path: &ResourcePath) -> Option<&Arc<TypeHandler>> {
        self.handlers.get(type_path)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn resolve(&self, type_path: &ResourcePath) -> Arc<TypeHandler> {
        if let Some(handler) = self.handlers.get(type_path) {
            return handler.clone();
        }

        // Fast path: try read lock
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(handler) = cache.get(type_path) {
                return handler.clone();
            }
        }

        let handler = self
            .handlers
            .iter()
            .filter(|(configured, _)| type_path.starts_with(configured))
            .max_by_key(|(configured, _)| configured.len())
            .map(|(configured, handler)| {
                debug!("Resolved {} by prefix {}", type_path, configured);
                handler.clone()
            })
            .unwrap_or_else(|| {
                debug!("Resolved {} to default handler", type_path);
                self.default_handler.clone()
            });

        // Store in cache
        {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            if cache.len() >= self.cache_limit && !cache.contains_key(type_path) {
                warn!(
                    "Type handler cache reached {} entries, clearing",
                    cache.len()
                );
                cache.clear();
            }
            // A concurrent resolver may have stored the same path; keep the first
            cache.entry(type_path.clone()).or_insert_with(|| handler.clone()).clone()
        }
    }
}
