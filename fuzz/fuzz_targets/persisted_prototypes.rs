#![no_main]

use libfuzzer_sys::fuzz_target;
use resolvit::{ClassBuilder, Container, ContainerBuilder, ContainerConfig, Param, Resolver};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct Transport;

struct Mailer {
    _transport: Arc<Transport>,
    retries: u32,
}

fn container(dir: &Path) -> Container {
    let mut builder =
        ContainerBuilder::new().with_config(ContainerConfig::default().with_prototype_cache_dir(dir));
    builder.class(ClassBuilder::<Transport>::with_default("Transport"));
    builder.class(
        ClassBuilder::<Mailer>::new("Mailer")
            .param(Param::service("transport", "Transport"))
            .param(Param::new("retries").default(3))
            .constructor(|args| {
                Ok(Mailer {
                    _transport: args.service("transport")?,
                    retries: args.value("retries")?,
                })
            }),
    );
    builder.build()
}

fn cache_dir() -> PathBuf {
    std::env::temp_dir().join(format!("resolvit-fuzz-{}", std::process::id()))
}

// Whatever is on disk, resolution must succeed and produce the declared shape.
fuzz_target!(|data: &[u8]| {
    let dir = cache_dir();
    container(&dir).get("Mailer").unwrap();

    if let Ok(entries) = fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let _ = fs::write(entry.path(), data);
        }
    }

    let mailer = container(&dir).get_as::<Mailer>("Mailer").unwrap();
    assert_eq!(mailer.retries, 3);
});
