//! Singleton Registry Tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use keystone_domain::error::{Error, FactoryErrorKind, Result};
use keystone_domain::key::TypeKey;
use keystone_domain::ports::factory::{ResourceFactory, Resolve};
use keystone_infrastructure::config::RegistryConfig;
use keystone_infrastructure::di::SingletonRegistry;

#[derive(Debug, PartialEq)]
struct Settings {
    name: String,
}

struct Pool {
    settings: Arc<Settings>,
}

struct Service {
    pool: Arc<Pool>,
}

struct A;
struct B;

struct PoolFactory;

impl ResourceFactory for PoolFactory {
    type Resource = Pool;

    fn dependencies(&self) -> Vec<TypeKey> {
        vec![TypeKey::of::<Settings>()]
    }

    fn produce(&self, resolver: &dyn Resolve) -> Result<Pool> {
        Ok(Pool {
            settings: resolver.get::<Settings>()?,
        })
    }
}

fn settings(name: &str) -> Settings {
    Settings {
        name: name.to_string(),
    }
}

fn counting_settings(registry: &SingletonRegistry) -> Arc<AtomicUsize> {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    registry.register_fn("settings", vec![], move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(settings(&format!("build-{n}")))
    });
    builds
}

#[test]
fn test_get_without_factory_is_construction_error() {
    let registry = SingletonRegistry::default();

    let result = registry.get::<Settings>();

    assert!(matches!(result, Err(Error::Construction { .. })));
    assert!(!registry.exists::<Settings>());
}

#[test]
fn test_create_keeps_first_instance() {
    let registry = SingletonRegistry::default();

    let first = registry.create(settings("first")).unwrap();
    let second = registry.create(settings("second")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.name, "first");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_create_erased_rejects_foreign_type() {
    let registry = SingletonRegistry::default();

    let result = registry.create_erased(TypeKey::of::<Settings>(), Arc::new(5_u32));

    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    assert!(!registry.exists::<Settings>());
}

#[test]
fn test_get_returns_same_instance() {
    let registry = SingletonRegistry::default();
    let builds = counting_settings(&registry);

    let first = registry.get::<Settings>().unwrap();
    let second = registry.get::<Settings>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_get_after_create_skips_factory() {
    let registry = SingletonRegistry::default();
    let builds = counting_settings(&registry);
    registry.create(settings("seeded")).unwrap();

    let instance = registry.get::<Settings>().unwrap();

    assert_eq!(instance.name, "seeded");
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[test]
fn test_remove_then_get_rebuilds() {
    let registry = SingletonRegistry::default();
    let builds = counting_settings(&registry);

    let first = registry.get::<Settings>().unwrap();
    let removed = registry.remove::<Settings>().unwrap();
    assert!(Arc::ptr_eq(&first, &removed));
    assert!(!registry.exists::<Settings>());

    let second = registry.get::<Settings>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.name, "build-2");
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_remove_missing_is_not_found() {
    let registry = SingletonRegistry::default();
    let _builds = counting_settings(&registry);

    let result = registry.remove::<Settings>();

    assert!(matches!(result, Err(Error::NotFound { .. })));
    assert!(registry.is_empty());
}

#[test]
fn test_exists_has_no_side_effects() {
    let registry = SingletonRegistry::default();
    let builds = counting_settings(&registry);

    assert!(!registry.exists::<Settings>());
    assert!(!registry.exists_key(TypeKey::of::<Settings>()));
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    registry.get::<Settings>().unwrap();
    assert!(registry.exists::<Settings>());
    assert_eq!(registry.keys(), vec![TypeKey::of::<Settings>()]);
}

#[test]
fn test_concurrent_get_constructs_once() {
    let registry = Arc::new(SingletonRegistry::default());
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    registry.register_fn("slow-settings", vec![], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(settings("slow"))
    });

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get::<Settings>().unwrap()
            })
        })
        .collect();
    let instances: Vec<Arc<Settings>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
}

#[test]
fn test_dependencies_resolved_first() {
    let registry = SingletonRegistry::default();
    registry.create(settings("shared")).unwrap();
    registry.register(PoolFactory);
    registry.register_fn("service", vec![TypeKey::of::<Pool>()], |resolver| {
        Ok(Service {
            pool: resolver.get::<Pool>()?,
        })
    });

    let service = registry.get::<Service>().unwrap();

    assert!(registry.exists::<Pool>());
    let pool = registry.get::<Pool>().unwrap();
    assert!(Arc::ptr_eq(&service.pool, &pool));
    let shared = registry.get::<Settings>().unwrap();
    assert!(Arc::ptr_eq(&pool.settings, &shared));
}

#[test]
fn test_missing_dependency_factory_fails_before_construction() {
    let registry = SingletonRegistry::default();
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&invoked);
    registry.register_fn("service", vec![TypeKey::of::<Pool>()], move |resolver| {
        flag.store(true, Ordering::SeqCst);
        Ok(Service {
            pool: resolver.get::<Pool>()?,
        })
    });

    let result = registry.get::<Service>();

    assert!(matches!(result, Err(Error::Construction { .. })));
    assert!(!invoked.load(Ordering::SeqCst));
}

#[test]
fn test_cycle_detected_before_construction() {
    let registry = SingletonRegistry::default();
    let invocations = Arc::new(AtomicUsize::new(0));
    let count_a = Arc::clone(&invocations);
    let count_b = Arc::clone(&invocations);
    registry.register_fn("a", vec![TypeKey::of::<B>()], move |resolver| {
        count_a.fetch_add(1, Ordering::SeqCst);
        resolver.get::<B>()?;
        Ok(A)
    });
    registry.register_fn("b", vec![TypeKey::of::<A>()], move |resolver| {
        count_b.fetch_add(1, Ordering::SeqCst);
        resolver.get::<A>()?;
        Ok(B)
    });

    match registry.get::<A>() {
        Err(Error::Cycle { path }) => assert_eq!(path, vec!["A", "B", "A"]),
        other => panic!("expected cycle error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_undeclared_dependency_rejected() {
    let registry = SingletonRegistry::default();
    registry.create(settings("shared")).unwrap();
    registry.register_fn("pool", vec![], |resolver| {
        Ok(Pool {
            settings: resolver.get::<Settings>()?,
        })
    });

    let result = registry.get::<Pool>();

    assert!(matches!(result, Err(Error::Construction { .. })));
    assert!(!registry.exists::<Pool>());
}

#[test]
fn test_factory_error_keeps_its_kind() {
    let registry = SingletonRegistry::default();
    registry.register_fn::<Settings, _>("unreachable", vec![], |_| {
        Err(Error::connect("connection refused"))
    });

    let error = registry.get::<Settings>().err().unwrap();

    assert!(matches!(error, Error::Construction { .. }));
    assert_eq!(error.factory_kind(), Some(FactoryErrorKind::ConnectFailed));
}

#[test]
fn test_failed_construction_is_not_cached() {
    let registry = SingletonRegistry::default();
    let fail = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&fail);
    registry.register_fn("flaky", vec![], move |_| {
        if flag.load(Ordering::SeqCst) {
            Err(Error::connect("not yet"))
        } else {
            Ok(settings("ready"))
        }
    });

    assert!(registry.get::<Settings>().is_err());
    assert!(!registry.exists::<Settings>());

    fail.store(false, Ordering::SeqCst);
    assert_eq!(registry.get::<Settings>().unwrap().name, "ready");
}

#[test]
fn test_remove_if_current_ignores_replaced_instance() {
    let registry = SingletonRegistry::default();
    let _builds = counting_settings(&registry);

    let stale = registry.get::<Settings>().unwrap();
    registry.remove::<Settings>().unwrap();
    let fresh = registry.get::<Settings>().unwrap();

    assert!(!registry.remove_if_current(&stale));
    assert!(registry.exists::<Settings>());
    assert!(registry.remove_if_current(&fresh));
    assert!(!registry.exists::<Settings>());
}

#[test]
fn test_resolver_deadline_follows_construction_timeout() {
    let config = RegistryConfig::default().with_construction_timeout(Duration::from_secs(5));
    let registry = SingletonRegistry::new(config);
    let remaining = Arc::new(std::sync::Mutex::new(Duration::ZERO));
    let seen = Arc::clone(&remaining);
    registry.register_fn("settings", vec![], move |resolver| {
        *seen.lock().unwrap() = resolver.remaining();
        Ok(settings("timed"))
    });

    registry.get::<Settings>().unwrap();

    let remaining = *remaining.lock().unwrap();
    assert!(remaining > Duration::ZERO);
    assert!(remaining <= Duration::from_secs(5));
}

#[test]
fn test_shutdown_runs_actions_and_clears_instances() {
    let registry = SingletonRegistry::default();
    let _builds = counting_settings(&registry);
    registry.get::<Settings>().unwrap();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    registry
        .shutdown_coordinator()
        .register_action("flag", Box::new(move || flag.store(true, Ordering::SeqCst)));

    registry.shutdown();

    assert!(ran.load(Ordering::SeqCst));
    assert!(registry.is_shut_down());
    assert!(!registry.exists::<Settings>());
    assert!(matches!(
        registry.get::<Settings>(),
        Err(Error::Construction { .. })
    ));
}

#[test]
fn test_create_after_shutdown_is_rejected() {
    let registry = SingletonRegistry::default();
    registry.shutdown();

    let error = registry.create(settings("late")).unwrap_err();

    assert!(matches!(error, Error::Construction { .. }));
    assert!(error.to_string().contains("shut down"));
    assert!(!registry.exists::<Settings>());
}
