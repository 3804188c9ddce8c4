use resolvit::{ClassBuilder, Container, ContainerBuilder, DiError, Resolver};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct ConsoleLogger;

#[derive(Default)]
struct RequestContext;

#[derive(Default)]
struct UnitOfWork;

fn container() -> Container {
    let mut builder = ContainerBuilder::new();
    builder.class(ClassBuilder::<ConsoleLogger>::with_default("ConsoleLogger"));
    builder.class(ClassBuilder::<RequestContext>::with_default("RequestContext"));
    builder.class(ClassBuilder::<UnitOfWork>::with_default("UnitOfWork"));
    builder.singleton("Logger", "ConsoleLogger");
    builder.scoped("RequestContext", "RequestContext");
    builder.scoped("UnitOfWork", "UnitOfWork");
    builder.build()
}

#[test]
fn scoped_instance_is_shared_within_a_scope_only() {
    let container = container();

    container.begin_scope();
    let a = container.get("RequestContext").unwrap();
    let b = container.get("RequestContext").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    container.end_scope().unwrap();

    container.begin_scope();
    let c = container.get("RequestContext").unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    container.end_scope().unwrap();
}

#[test]
fn end_scope_reports_released_instances() {
    let container = container();
    assert_eq!(container.begin_scope(), 1);
    container.get("RequestContext").unwrap();
    container.get("UnitOfWork").unwrap();
    container.get("Logger").unwrap();

    let ended = container.end_scope().unwrap();
    assert_eq!(ended.released, 2);
    assert_eq!(ended.remaining_depth, 0);
    // Singletons outlive the scope.
    assert!(container.inspect("Logger").cached.is_some());
}

#[test]
fn nested_scopes_see_outer_instances() {
    let container = container();

    container.begin_scope();
    let outer_ctx = container.get("RequestContext").unwrap();

    assert_eq!(container.begin_scope(), 2);
    let inner_ctx = container.get("RequestContext").unwrap();
    assert!(Arc::ptr_eq(&outer_ctx, &inner_ctx));
    let inner_work = container.get("UnitOfWork").unwrap();
    container.end_scope().unwrap();

    let outer_work = container.get("UnitOfWork").unwrap();
    assert!(!Arc::ptr_eq(&inner_work, &outer_work));
    container.end_scope().unwrap();
    assert_eq!(container.scope_depth(), 0);
}

#[test]
fn singletons_are_shared_across_scopes() {
    let container = container();
    let first = {
        let scope = container.scope();
        scope.get("Logger").unwrap()
    };
    let second = {
        let scope = container.scope();
        scope.get("Logger").unwrap()
    };
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn scoped_service_without_scope_fails() {
    let container = container();
    match container.get("RequestContext") {
        Err(DiError::NoActiveScope { id }) => assert_eq!(id, "RequestContext"),
        other => panic!("expected NoActiveScope, got {:?}", other.err()),
    }
    assert_eq!(container.scope_depth(), 0);
}

#[test]
fn unmatched_end_scope_is_an_error() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("resolvit=debug"))
        .with_test_writer()
        .finish();
    let _log = tracing::subscriber::set_default(subscriber);

    let container = container();
    assert!(matches!(container.end_scope(), Err(DiError::ScopeUnderflow)));

    container.begin_scope();
    container.end_scope().unwrap();
    assert!(matches!(container.end_scope(), Err(DiError::ScopeUnderflow)));
}

#[test]
fn guard_closes_its_scope_on_panic() {
    let container = container();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let scope = container.scope();
        scope.get("RequestContext").unwrap();
        panic!("request handler failed");
    }));
    assert!(result.is_err());
    assert_eq!(container.scope_depth(), 0);
}

#[test]
fn guard_tolerates_a_manual_end_scope() {
    let container = container();
    {
        let scope = container.scope();
        assert_eq!(scope.depth(), 1);
        container.end_scope().unwrap();
    }
    assert_eq!(container.scope_depth(), 0);
}

#[test]
fn guard_closes_scopes_left_open_inside_it() {
    let container = container();
    let outer = container.scope();
    {
        let request = container.scope();
        assert_eq!(request.depth(), 2);
        container.begin_scope();
        assert_eq!(container.scope_depth(), 3);
    }
    assert_eq!(container.scope_depth(), 1);
    assert_eq!(outer.depth(), 1);
    drop(outer);
    assert_eq!(container.scope_depth(), 0);
}

#[test]
fn guard_never_closes_a_scope_it_did_not_open() {
    let container = container();
    let kept = {
        let _scope = container.scope();
        container.end_scope().unwrap();
        container.begin_scope();
        container.get("RequestContext").unwrap()
    };
    assert_eq!(container.scope_depth(), 1);
    assert!(Arc::ptr_eq(&kept, &container.get("RequestContext").unwrap()));
    container.end_scope().unwrap();
}

#[test]
fn forked_handles_have_independent_scopes() {
    let container = container();
    let logger = container.get("Logger").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let handle = container.fork();
            thread::spawn(move || {
                let scope = handle.scope();
                let first = scope.get("RequestContext").unwrap();
                let again = scope.get("RequestContext").unwrap();
                assert!(Arc::ptr_eq(&first, &again));
                let logger = scope.get("Logger").unwrap();
                (first, logger)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, (ctx, shared_logger)) in results.iter().enumerate() {
        assert!(Arc::ptr_eq(shared_logger, &logger));
        for (other_ctx, _) in &results[i + 1..] {
            assert!(!Arc::ptr_eq(ctx, other_ctx));
        }
    }
    assert_eq!(container.scope_depth(), 0);
}

#[test]
fn forks_do_not_see_each_others_scopes() {
    let container = container();
    let _scope = container.scope();
    let ctx = container.get("RequestContext").unwrap();

    let fork = container.fork();
    assert_eq!(fork.scope_depth(), 0);
    assert!(matches!(fork.get("RequestContext"), Err(DiError::NoActiveScope { .. })));

    let fork_scope = fork.scope();
    let fork_ctx = fork_scope.get("RequestContext").unwrap();
    assert!(!Arc::ptr_eq(&ctx, &fork_ctx));
}

#[test]
fn typed_access_through_a_guard() {
    let container = container();
    let scope = container.scope();
    let ctx = scope.get_as::<RequestContext>("RequestContext");
    assert!(ctx.is_ok());
    assert!(matches!(
        scope.get_as::<ConsoleLogger>("RequestContext"),
        Err(DiError::TypeMismatch { .. })
    ));
}
