//! Composition from reusable modules, plus observers over the result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crucible_di::{
    ContainerBuilder, ContainerModule, Context, DiError, Key, ResolutionObserver,
};

struct Repository {
    url: String,
}
struct ApiClient {
    base: String,
}

fn storage_module() -> ContainerModule {
    ContainerModule::new("storage", |builder| {
        builder.bind_instance(Some("db-url"), "postgres://prod".to_string())?;
        builder.bind_singleton::<Repository, _>(None, |rt| {
            let url = rt.instance::<String>(Some("db-url"))?;
            Ok(Repository {
                url: url.as_ref().clone(),
            })
        })?;
        Ok(())
    })
}

#[test]
fn modules_compose_into_one_container() {
    let api = ContainerModule::new("api", |builder| {
        builder.bind_provider::<ApiClient, _>(None, |_| {
            Ok(ApiClient {
                base: "https://api".into(),
            })
        })
    });

    let mut builder = ContainerBuilder::new();
    builder.extend(storage_module(), false).unwrap();
    builder.extend(api, false).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(
        container.instance::<Repository>(None).unwrap().url,
        "postgres://prod"
    );
    assert_eq!(container.instance::<ApiClient>(None).unwrap().base, "https://api");
}

#[test]
fn module_import_with_override_patches_existing_bindings() {
    let test_overrides = ContainerModule::new("test-overrides", |builder| {
        builder.bind_instance(Some("db-url"), "postgres://test".to_string())
    });

    let mut builder = ContainerBuilder::new();
    builder.extend(storage_module(), false).unwrap();
    builder.extend(test_overrides, true).unwrap();
    let container = builder.build().unwrap();

    assert_eq!(
        container.instance::<Repository>(None).unwrap().url,
        "postgres://test"
    );
}

#[test]
fn conflicting_module_import_fails_and_restores_policy() {
    let duplicate = ContainerModule::new("duplicate", |builder| {
        builder.bind_instance(Some("db-url"), "oops".to_string())
    });

    let mut builder = ContainerBuilder::new();
    builder.extend(storage_module(), false).unwrap();
    let err = builder.extend(duplicate, false).unwrap_err();
    assert!(matches!(err, DiError::BindingConflict(_)));

    // The failed import must not have left silent override enabled.
    let err = builder
        .bind_instance(Some("db-url"), "still guarded".to_string())
        .unwrap_err();
    assert!(matches!(err, DiError::BindingConflict(_)));
}

#[test]
fn on_ready_callback_runs_against_the_built_container() {
    struct Person {
        name: String,
    }

    let passed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let seen = passed.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .bind_instance(Some("name"), "Salomon".to_string())
        .unwrap();
    builder
        .bind_singleton::<Person, _>(None, |rt| {
            let name = rt.instance::<String>(Some("name"))?;
            Ok(Person {
                name: name.as_ref().clone(),
            })
        })
        .unwrap();
    builder.on_ready(move |container| {
        assert_eq!(container.instance::<Person>(None)?.name, "Salomon");
        seen.store(true, Ordering::SeqCst);
        Ok(())
    });

    builder.build().unwrap();
    assert!(passed.load(Ordering::SeqCst));
}

#[test]
fn on_ready_failure_aborts_the_build() {
    let mut builder = ContainerBuilder::new();
    builder.on_ready(|container| {
        // Resolving a never-bound key must surface from build itself.
        container.instance::<u64>(None).map(|_| ())
    });

    let err = builder.build().unwrap_err();
    assert!(matches!(err, DiError::NotFound(_)));
}

#[derive(Default)]
struct CountingObserver {
    resolved: AtomicUsize,
    failed: AtomicUsize,
}

impl ResolutionObserver for CountingObserver {
    fn resolved(&self, _key: &Key, _elapsed: Duration) {
        self.resolved.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self, _key: &Key, _error: &DiError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn observers_see_successes_and_failures() {
    let observer = Arc::new(CountingObserver::default());

    let mut builder = ContainerBuilder::new();
    builder
        .bind_provider::<u32, _>(None, |_| Ok(1))
        .unwrap();
    builder
        .bind_provider::<String, _>(None, |_| Err(DiError::Factory("nope".into())))
        .unwrap();
    builder.add_observer(observer.clone());
    let container = builder.build().unwrap();

    container.instance::<u32>(None).unwrap();
    container.instance::<u32>(None).unwrap();
    let _ = container.instance::<String>(None);

    assert_eq!(observer.resolved.load(Ordering::SeqCst), 2);
    assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
}

#[test]
fn observers_see_nested_resolutions() {
    struct Outer;
    struct Inner;

    let observer = Arc::new(CountingObserver::default());

    let mut builder = ContainerBuilder::new();
    builder.bind_provider::<Inner, _>(None, |_| Ok(Inner)).unwrap();
    builder
        .bind_provider::<Outer, _>(None, |rt| {
            let _ = rt.instance::<Inner>(None)?;
            Ok(Outer)
        })
        .unwrap();
    builder.add_observer(observer.clone());
    let container = builder.build().unwrap();

    container.instance_at::<Outer>(&Context::any(), None).unwrap();
    assert_eq!(observer.resolved.load(Ordering::SeqCst), 2);
}
