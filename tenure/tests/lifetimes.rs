use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tenure::prelude::*;

#[derive(Debug)]
struct Config;

impl Injectable for Config {
    fn construct(_: &mut Arguments) -> Result<Self> {
        Ok(Config)
    }
}

#[derive(Debug)]
struct Cache {
    config: Arc<Config>,
}

impl Injectable for Cache {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Config>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Cache { config: args.next()? })
    }
}

#[derive(Debug)]
struct Request;

impl Injectable for Request {
    fn construct(_: &mut Arguments) -> Result<Self> {
        Ok(Request)
    }
}

#[derive(Debug)]
struct Handler {
    request: Arc<Request>,
}

impl Injectable for Handler {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Request>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Handler { request: args.next()? })
    }
}

#[test]
fn singleton_is_shared_directly_and_transitively() {
    let services = ServiceCollection::new();
    services.add_singleton(service::<Config>(), Implementation::itself()).unwrap();
    services.add_transient(service::<Cache>(), Implementation::itself()).unwrap();

    let a = services.get_required_service(service::<Config>(), None).unwrap();
    let b = services.get_required_service(service::<Config>(), None).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let cache = services.get_required_service(service::<Cache>(), None).unwrap();
    assert!(Arc::ptr_eq(&a, &cache.config));

    let context = services.create();
    let in_scope = services.get_required_service(service::<Config>(), Some(&context)).unwrap();
    assert!(Arc::ptr_eq(&a, &in_scope));
}

#[test]
fn singleton_factory_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let services = ServiceCollection::new();
    services
        .add_singleton(
            service::<Config>(),
            Implementation::factory(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Config)
            }),
        )
        .unwrap();

    for _ in 0..5 {
        services.get_required_service(service::<Config>(), None).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn transient_is_fresh_every_time() {
    let services = ServiceCollection::new();
    services.add_transient(service::<Config>(), Implementation::itself()).unwrap();

    let instances: Vec<Arc<Config>> = (0..4)
        .map(|_| services.get_required_service(service::<Config>(), None).unwrap())
        .collect();

    for (i, a) in instances.iter().enumerate() {
        for b in &instances[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
}

#[test]
fn scoped_is_isolated_per_context() {
    let services = ServiceCollection::new();
    services.add_scoped(service::<Request>(), Implementation::itself()).unwrap();
    let provider = services.build_service_provider();

    let c1 = provider.create();
    let c2 = provider.create();

    let a1 = provider.get_required_service(service::<Request>(), Some(&c1)).unwrap();
    let a2 = provider.get_required_service(service::<Request>(), Some(&c1)).unwrap();
    let b1 = provider.get_required_service(service::<Request>(), Some(&c2)).unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b1));
}

#[test]
fn nested_scoped_dependencies_share_the_context() {
    let services = ServiceCollection::new();
    services.add_scoped(service::<Request>(), Implementation::itself()).unwrap();
    services.add_scoped(service::<Handler>(), Implementation::itself()).unwrap();

    services
        .create_scope(|context| {
            let handler = services.get_required_service(service::<Handler>(), Some(context))?;
            let request = services.get_required_service(service::<Request>(), Some(context))?;
            assert!(Arc::ptr_eq(&handler.request, &request));
            Ok(())
        })
        .unwrap();
}

#[test]
fn transient_without_context_cannot_use_scoped() {
    let services = ServiceCollection::new();
    services.add_scoped(service::<Request>(), Implementation::itself()).unwrap();
    services.add_transient(service::<Handler>(), Implementation::itself()).unwrap();

    match services.get_required_service(service::<Handler>(), None).unwrap_err() {
        TenureError::LifestyleMismatch(err) => {
            assert!(err.needs_context);
            assert_eq!(err.consumer_lifetime, Lifetime::Transient);
            assert_eq!(err.dependency_lifetime, Lifetime::Scoped);
        }
        other => panic!("Expected LifestyleMismatch, got: {other:?}"),
    }

    let context = services.create();
    let handler = services.get_required_service(service::<Handler>(), Some(&context)).unwrap();
    let request = services.get_required_service(service::<Request>(), Some(&context)).unwrap();
    assert!(Arc::ptr_eq(&handler.request, &request));
}

#[test]
fn transient_check_can_be_disabled() {
    let services = ServiceCollection::with_options(
        ContainerOptions::default().validate_transient_lifetime(false),
    );
    services.add_scoped(service::<Request>(), Implementation::itself()).unwrap();
    services.add_transient(service::<Handler>(), Implementation::itself()).unwrap();

    // The scoped dependency itself still needs a context.
    let err = services.get_required_service(service::<Handler>(), None).unwrap_err();
    assert!(matches!(err, TenureError::Argument { parameter: "context", .. }));
}

#[test]
fn singleton_on_registered_short_lived_fails_immediately() {
    for lifetime in [Lifetime::Transient, Lifetime::Scoped] {
        let services = ServiceCollection::new();
        services.add_service(service::<Config>(), Implementation::itself(), lifetime).unwrap();

        let err = services
            .add_singleton(service::<Cache>(), Implementation::itself())
            .unwrap_err();
        assert!(matches!(err, TenureError::LifestyleMismatch(_)), "{lifetime}");
        assert!(!services.has_service(service::<Cache>()));
    }
}

#[test]
fn singleton_mismatch_surfaces_when_dependency_arrives() {
    let services = ServiceCollection::new();
    services.add_singleton(service::<Cache>(), Implementation::itself()).unwrap();

    match services
        .add_transient(service::<Config>(), Implementation::itself())
        .unwrap_err()
    {
        TenureError::LifestyleMismatch(err) => {
            assert_eq!(err.consumer, ServiceKey::of::<Cache>());
            assert_eq!(err.dependency, ServiceKey::of::<Config>());
        }
        other => panic!("Expected LifestyleMismatch, got: {other:?}"),
    }
}

#[test]
fn missing_dependency_fails_activation() {
    let services = ServiceCollection::new();
    services.add_transient(service::<Cache>(), Implementation::itself()).unwrap();

    match services.get_required_service(service::<Cache>(), None).unwrap_err() {
        TenureError::ActivationFailed(err) => {
            assert_eq!(err.dependent, ServiceKey::of::<Cache>());
            assert_eq!(err.dependency, ServiceKey::of::<Config>());
        }
        other => panic!("Expected ActivationFailed, got: {other:?}"),
    }
}

#[test]
fn unregistered_service_not_found() {
    let services = ServiceCollection::new();
    let err = services.get_required_service(service::<Config>(), None).unwrap_err();
    assert!(matches!(err, TenureError::ServiceNotFound(_)));
    assert!(err.is_invalid_operation());
    assert!(services.get_service(service::<Config>(), None).unwrap().is_none());
}
