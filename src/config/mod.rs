pub mod bootstrap;
pub mod mapping;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

pub use bootstrap::BootstrapLoader;
pub use mapping::{ConfigError, FieldList, MappingConfig, QueryDefinition, RepoConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub repository: RepositoryConfig,
    pub filter: FilterConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Directory searched for `repo.<type>.json|yaml`
    pub config_dir: String,
    pub repo_type: String,
    /// Resolved paths kept before the type handler cache is reset
    pub resolution_cache_limit: usize,
    pub max_page_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_nested_depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Repository overrides
        if let Ok(v) = env::var("REPO_CONFIG_DIR") {
            self.repository.config_dir = v;
        }
        if let Ok(v) = env::var("REPO_TYPE") {
            self.repository.repo_type = v;
        }
        if let Ok(v) = env::var("REPO_RESOLUTION_CACHE_LIMIT") {
            self.repository.resolution_cache_limit = v.parse().unwrap_or(self.repository.resolution_cache_limit);
        }
        if let Ok(v) = env::var("REPO_MAX_PAGE_SIZE") {
            self.repository.max_page_size = v.parse().unwrap_or(self.repository.max_page_size);
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_NESTED_DEPTH") {
            self.filter.max_nested_depth = v.parse().unwrap_or(self.filter.max_nested_depth);
        }

        // Server overrides
        if let Ok(v) = env::var("REPO_PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            repository: RepositoryConfig {
                config_dir: "conf".to_string(),
                repo_type: "memory".to_string(),
                resolution_cache_limit: 10_000,
                max_page_size: 1000,
            },
            filter: FilterConfig { max_nested_depth: 10 },
            server: ServerConfig {
                port: 8080,
                enable_cors: true,
                enable_request_logging: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            repository: RepositoryConfig {
                config_dir: "conf".to_string(),
                repo_type: "memory".to_string(),
                resolution_cache_limit: 50_000,
                max_page_size: 500,
            },
            filter: FilterConfig { max_nested_depth: 8 },
            server: ServerConfig {
                port: 8080,
                enable_cors: true,
                enable_request_logging: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            repository: RepositoryConfig {
                config_dir: "/etc/directory-repo".to_string(),
                repo_type: "memory".to_string(),
                resolution_cache_limit: 100_000,
                max_page_size: 100,
            },
            filter: FilterConfig { max_nested_depth: 6 },
            server: ServerConfig {
                port: 8080,
                enable_cors: false,
                enable_request_logging: false,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
