use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use directory_repo::backend::{LocalConnectionFactory, MemoryBackend};
use directory_repo::config::{self, BootstrapLoader};
use directory_repo::repo::{RepositoryService, TypeHandlerRegistry};

#[derive(Parser)]
#[command(name = "directory-repo")]
#[command(about = "Repository service mapping resource paths onto typed storage handlers")]
#[command(version)]
struct Args {
    #[arg(long, env = "REPO_CONFIG_DIR", help = "Directory holding repo.<type>.json|yaml")]
    config_dir: Option<String>,

    #[arg(long, env = "REPO_TYPE", help = "Repository type whose mapping document is loaded")]
    repo_type: Option<String>,

    #[arg(long, env = "REPO_PORT", help = "Port to listen on")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so REPO_* settings apply under cargo run
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = config::config();
    tracing::info!("Starting directory-repo in {:?} mode", settings.environment);

    let config_dir = args.config_dir.unwrap_or_else(|| settings.repository.config_dir.clone());
    let repo_type = args.repo_type.unwrap_or_else(|| settings.repository.repo_type.clone());
    let port = args.port.unwrap_or(settings.server.port);

    let loader = BootstrapLoader::new(&config_dir);
    let repo_config = loader
        .load(&repo_type)?
        .ok_or_else(|| anyhow!("no repository configuration for '{}' in {}", repo_type, config_dir))?;

    let backend = Arc::new(MemoryBackend::new());
    let registry = TypeHandlerRegistry::from_config(&repo_config, backend)?;
    let service = RepositoryService::new(Arc::new(registry), Arc::new(LocalConnectionFactory::new()));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("directory-repo listening on http://{}", bind_addr);

    axum::serve(listener, directory_repo::api::app(service))
        .await
        .context("server terminated")?;
    Ok(())
}
