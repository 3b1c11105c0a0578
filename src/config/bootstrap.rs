use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use super::mapping::{ConfigError, RepoConfig};

const REPO_FILE_PREFIX: &str = "repo.";
const QUALIFIED_PREFIX: &str = "service.";
const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Locates and loads the repository mapping document for a repo type.
///
/// The unqualified `repo.<type>.<ext>` file wins over `service.repo.<type>.<ext>`.
/// When neither exists and the directory holds no `repo.*` file at all, an
/// error is logged once per loader until [`BootstrapLoader::reset_warning`].
#[derive(Debug)]
pub struct BootstrapLoader {
    config_dir: PathBuf,
    warn_missing_config: AtomicBool,
}

impl BootstrapLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            warn_missing_config: AtomicBool::new(true),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Re-arm the missing configuration error.
    pub fn reset_warning(&self) {
        self.warn_missing_config.store(true, Ordering::SeqCst);
    }

    /// Whether the next miss with an empty directory will log.
    pub fn warning_armed(&self) -> bool {
        self.warn_missing_config.load(Ordering::SeqCst)
    }

    pub fn locate(&self, repo_type: &str) -> Option<PathBuf> {
        let base = format!("{}{}", REPO_FILE_PREFIX, repo_type.to_lowercase());
        let found = [base.clone(), format!("{}{}", QUALIFIED_PREFIX, base)]
            .iter()
            .flat_map(|stem| EXTENSIONS.iter().map(move |ext| format!("{}.{}", stem, ext)))
            .map(|name| self.config_dir.join(name))
            .find(|candidate| candidate.is_file());

        if found.is_none() {
            debug!("No configuration to bootstrap {}", repo_type);
            if !self.has_repo_config_files() && self.warn_missing_config.swap(false, Ordering::SeqCst) {
                error!(
                    "No configuration to bootstrap {} found in {}",
                    repo_type,
                    self.config_dir.display()
                );
            }
        }
        found
    }

    /// Load the mapping document, `Ok(None)` when no file exists.
    pub fn load(&self, repo_type: &str) -> Result<Option<RepoConfig>, ConfigError> {
        let Some(path) = self.locate(repo_type) else {
            return Ok(None);
        };
        match RepoConfig::from_path(&path) {
            Ok(config) => {
                info!("Bootstrapping {} with settings from {}", repo_type, path.display());
                Ok(Some(config))
            }
            Err(e) => {
                warn!("Failed to load configuration file to bootstrap {}: {}", repo_type, e);
                Err(e)
            }
        }
    }

    fn has_repo_config_files(&self) -> bool {
        std::fs::read_dir(&self.config_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|entry| entry.file_name().to_string_lossy().starts_with(REPO_FILE_PREFIX))
            })
            .unwrap_or(false)
    }
}
