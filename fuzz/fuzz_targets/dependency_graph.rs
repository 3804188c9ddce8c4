#![no_main]

use libfuzzer_sys::fuzz_target;
use resolvit::{ContainerBuilder, ContainerConfig, DiError, Lifetime, ResolverCore};
use std::sync::Arc;

const NODES: usize = 8;

fuzz_target!(|data: &[u8]| {
    if data.len() < NODES * 2 + 1 {
        return;
    }

    // Each node: one byte for its lifetime, one byte as a dependency bitmask.
    let mut builder = ContainerBuilder::new().with_config(ContainerConfig::default().with_max_depth(6));
    for node in 0..NODES {
        let lifetime = match data[node * 2] % 3 {
            0 => Lifetime::Singleton,
            1 => Lifetime::Scoped,
            _ => Lifetime::Transient,
        };
        let mask = data[node * 2 + 1];
        let deps: Vec<String> = (0..NODES)
            .filter(|bit| mask & (1 << bit) != 0)
            .map(|bit| format!("S{}", bit))
            .collect();
        builder.factory(format!("S{}", node), lifetime, move |ctx| {
            for dep in &deps {
                ctx.resolve_any(dep)?;
            }
            Ok(Arc::new(node))
        });
    }
    let container = builder.build();

    let open_scope = data[NODES * 2] % 2 == 0;
    let _scope = open_scope.then(|| container.scope());

    for node in 0..NODES {
        let id = format!("S{}", node);
        match container.get(&id) {
            Ok(first) => {
                assert_eq!(*first.clone().downcast::<usize>().unwrap(), node);
                let lifetime = container.definitions().get(&id).unwrap().lifetime;
                if lifetime != Lifetime::Transient {
                    let second = container.get(&id).unwrap();
                    assert!(Arc::ptr_eq(&first, &second));
                }
            }
            Err(DiError::Circular { path }) => {
                assert!(path.len() >= 2);
                assert_eq!(path.first(), path.last());
            }
            Err(DiError::NoActiveScope { .. }) => assert!(!open_scope),
            Err(DiError::DepthExceeded(6)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
});
