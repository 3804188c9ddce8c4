use resolvit::{
    ClassBuilder, ClassMetadata, Container, ContainerBuilder, ContainerConfig, Param, Resolver, TypeIntrospector,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts how often prototype analysis reaches the introspector.
struct CountingIntrospector {
    inner: Arc<dyn TypeIntrospector>,
    calls: Arc<AtomicUsize>,
}

impl TypeIntrospector for CountingIntrospector {
    fn describe(&self, class: &str) -> Option<ClassMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.describe(class)
    }
}

#[derive(Default)]
struct Transport;

struct Mailer {
    _transport: Arc<Transport>,
    from: String,
}

fn container(config: ContainerConfig, calls: Arc<AtomicUsize>) -> Container {
    let mut builder = ContainerBuilder::new().with_config(config);
    builder.class(ClassBuilder::<Transport>::with_default("Transport"));
    builder.class(
        ClassBuilder::<Mailer>::new("Mailer")
            .param(Param::service("transport", "Transport"))
            .param(Param::new("from").default("noreply@example.com"))
            .constructor(|args| {
                Ok(Mailer {
                    _transport: args.service("transport")?,
                    from: args.value("from")?,
                })
            }),
    );
    builder
        .layer_introspector(move |inner| Arc::new(CountingIntrospector { inner, calls }))
        .build()
}

fn json_files(dir: &Path) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn introspection_runs_once_per_class() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = container(ContainerConfig::default(), calls.clone());

    for _ in 0..5 {
        container.get("Mailer").unwrap();
    }
    // Mailer and Transport, once each.
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = container.prototype_stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 8);
    assert_eq!(stats.disk_hits, 0);
}

#[test]
fn prototypes_are_shared_by_forks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = container(ContainerConfig::default(), calls.clone());
    container.get("Transport").unwrap();
    container.fork().get("Transport").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn prototype_describes_the_declared_shape() {
    let container = container(ContainerConfig::default(), Arc::new(AtomicUsize::new(0)));
    let prototype = container.prototype("Mailer").unwrap();

    assert!(prototype.is_instantiable);
    assert_eq!(prototype.arity(), 2);
    let ctor = prototype.constructor.as_ref().unwrap();
    assert_eq!(ctor.parameters[0].type_name.as_deref(), Some("Transport"));
    assert!(ctor.parameters[1].has_default);
    assert_eq!(ctor.parameters[1].position, 1);
    assert_eq!(prototype.dependencies(), vec!["Transport"]);

    let again = container.prototype("Mailer").unwrap();
    assert!(Arc::ptr_eq(&prototype, &again));
}

#[test]
fn persisted_prototypes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::default().with_prototype_cache_dir(dir.path());

    let first_calls = Arc::new(AtomicUsize::new(0));
    let first = container(config.clone(), first_calls.clone());
    first.get("Mailer").unwrap();
    assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    assert_eq!(json_files(dir.path()).len(), 2);

    let second_calls = Arc::new(AtomicUsize::new(0));
    let second = container(config, second_calls.clone());
    let mailer = second.get_as::<Mailer>("Mailer").unwrap();
    assert_eq!(mailer.from, "noreply@example.com");
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    let stats = second.prototype_stats();
    assert_eq!(stats.disk_hits, 2);
    assert_eq!(stats.misses, 0);
}

#[test]
fn corrupt_persisted_files_fall_back_to_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::default().with_prototype_cache_dir(dir.path());

    container(config.clone(), Arc::new(AtomicUsize::new(0)))
        .get("Transport")
        .unwrap();
    let files = json_files(dir.path());
    assert_eq!(files.len(), 1);
    fs::write(&files[0], b"{ not json").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let recovered = container(config.clone(), calls.clone());
    assert!(recovered.get("Transport").is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = recovered.prototype_stats();
    assert_eq!(stats.disk_errors, 1);
    assert_eq!(stats.misses, 1);

    // The bad file was rewritten.
    let calls = Arc::new(AtomicUsize::new(0));
    let third = container(config, calls.clone());
    third.get("Transport").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(third.prototype_stats().disk_hits, 1);
}

#[test]
fn changed_class_declaration_invalidates_the_persisted_plan() {
    struct Digest {
        retries: u32,
    }

    fn build(config: &ContainerConfig, with_retries: bool) -> Container {
        let mut class = ClassBuilder::<Digest>::new("Digest");
        if with_retries {
            class = class.param(Param::new("retries").default(3));
        }
        let mut builder = ContainerBuilder::new().with_config(config.clone());
        builder.class(class.constructor(move |args| {
            let retries = if with_retries { args.value("retries")? } else { 1 };
            Ok(Digest { retries })
        }));
        builder.build()
    }

    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::default().with_prototype_cache_dir(dir.path());

    assert_eq!(build(&config, false).get_as::<Digest>("Digest").unwrap().retries, 1);

    let upgraded = build(&config, true);
    assert_eq!(upgraded.get_as::<Digest>("Digest").unwrap().retries, 3);
    let stats = upgraded.prototype_stats();
    assert_eq!(stats.disk_hits, 0);
    assert_eq!(stats.misses, 1);

    // The refreshed plan is what the next run loads.
    let restarted = build(&config, true);
    assert_eq!(restarted.get_as::<Digest>("Digest").unwrap().retries, 3);
    assert_eq!(restarted.prototype_stats().disk_hits, 1);
}

#[test]
fn unwritable_cache_directory_never_fails_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"file in the way").unwrap();
    let config = ContainerConfig::default().with_prototype_cache_dir(blocker.join("protos"));

    let container = container(config, Arc::new(AtomicUsize::new(0)));
    assert!(container.get("Mailer").is_ok());
    assert!(container.prototype_stats().disk_errors >= 1);
}

#[test]
fn clear_forgets_memory_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::default().with_prototype_cache_dir(dir.path());
    let calls = Arc::new(AtomicUsize::new(0));
    let container = container(config, calls.clone());

    container.get("Transport").unwrap();
    assert_eq!(json_files(dir.path()).len(), 1);

    container.clear_prototypes();
    assert!(json_files(dir.path()).is_empty());
    assert!(!container.inspect("Transport").prototype_cached);

    container.get("Transport").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
