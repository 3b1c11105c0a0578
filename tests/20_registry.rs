mod common;

use std::path::Path;
use std::sync::Arc;

use directory_repo::backend::MemoryBackend;
use directory_repo::config::BootstrapLoader;
use directory_repo::repo::TypeHandlerRegistry;
use directory_repo::resource::ResourcePath;

use common::sample_config;

fn registry() -> TypeHandlerRegistry {
    TypeHandlerRegistry::from_config(&sample_config(), Arc::new(MemoryBackend::new())).unwrap()
}

#[test]
fn shipped_configuration_bootstraps_a_registry() -> anyhow::Result<()> {
    common::init_tracing();
    let loader = BootstrapLoader::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("conf"));
    let config = loader
        .load("memory")?
        .ok_or_else(|| anyhow::anyhow!("conf/repo.memory.json is missing"))?;

    let registry = TypeHandlerRegistry::from_config(&config, Arc::new(MemoryBackend::new()))?;
    assert_eq!(registry.default_handler().repo_resource().to_string(), "genericobjects");
    let internal = registry.configured(&ResourcePath::parse("internal/user")).unwrap();
    assert_eq!(internal.kind(), "explicit");
    assert!(registry.configured(&ResourcePath::parse("managed")).unwrap().is_generic());
    Ok(())
}

#[test]
fn handlers_follow_their_mapping_kind() {
    let registry = registry();

    let explicit = registry.resolve(&ResourcePath::parse("internal/user"));
    assert_eq!(explicit.kind(), "explicit");
    assert_eq!(explicit.repo_resource().to_string(), "internal/user");

    let managed = registry.resolve(&ResourcePath::parse("managed/user"));
    assert!(managed.is_generic());
    assert_eq!(managed.repo_resource().to_string(), "managedobjects");

    let config = registry.resolve(&ResourcePath::parse("config"));
    assert_eq!(config.repo_resource().to_string(), "configobjects");
}

#[test]
fn unmapped_types_use_the_default_handler() {
    let registry = registry();
    for path in ["scheduler/job", "cluster", "configx", "internal"] {
        let handler = registry.resolve(&ResourcePath::parse(path));
        assert!(Arc::ptr_eq(&handler, registry.default_handler()), "{} resolves to default", path);
    }
}

#[test]
fn resolution_is_stable_across_threads() {
    let registry = Arc::new(registry());
    let expected = registry.resolve(&ResourcePath::parse("managed/role"));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.resolve(&ResourcePath::parse("managed/role")))
        })
        .collect();

    for worker in workers {
        let resolved = worker.join().unwrap();
        assert!(Arc::ptr_eq(&resolved, &expected));
    }
    assert_eq!(registry.cached_len(), 1);
}
