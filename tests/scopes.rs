//! Reference policies: thread singletons, weak singletons, multitons, and
//! per-context caches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crucible_di::{ContainerBuilder, Context};

#[derive(Debug)]
struct Connection {
    target: String,
}

#[test]
fn thread_singleton_caches_per_thread() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_thread_singleton::<Connection, _>(None, |_| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Connection {
                target: "local".into(),
            })
        })
        .unwrap();
    let container = builder.build().unwrap();

    let a = container.instance::<Connection>(None).unwrap();
    let b = container.instance::<Connection>(None).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);

    let other = {
        let container = container.clone();
        std::thread::spawn(move || container.instance::<Connection>(None).unwrap())
            .join()
            .unwrap()
    };
    assert!(!Arc::ptr_eq(&a, &other));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 2);
}

#[test]
fn weak_singleton_lives_only_while_referenced() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_weak_singleton::<Connection, _>(None, |_| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Connection {
                target: "ephemeral".into(),
            })
        })
        .unwrap();
    let container = builder.build().unwrap();

    let first = container.instance::<Connection>(None).unwrap();
    let second = container.instance::<Connection>(None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);

    drop(first);
    drop(second);
    let _revived = container.instance::<Connection>(None).unwrap();
    assert_eq!(BUILDS.load(Ordering::SeqCst), 2);
}

#[test]
fn multiton_caches_one_value_per_argument() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_multiton::<String, Connection, _>(None, |_, target| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Connection { target })
        })
        .unwrap();
    let container = builder.build().unwrap();

    let factory = container.factory::<String, Connection>(None).unwrap();
    let a1 = factory.call("alpha".to_string()).unwrap();
    let a2 = factory.call("alpha".to_string()).unwrap();
    let b = factory.call("beta".to_string()).unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b));
    assert_eq!(a1.target, "alpha");
    assert_eq!(b.target, "beta");
    assert_eq!(BUILDS.load(Ordering::SeqCst), 2);
}

#[test]
fn wildcard_singleton_is_shared_across_caller_contexts() {
    struct Session;

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_singleton::<Connection, _>(None, |_| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Connection {
                target: "shared".into(),
            })
        })
        .unwrap();
    let container = builder.build().unwrap();

    // The binding declares no context; whoever asks, the cache is one.
    let plain = container.instance::<Connection>(None).unwrap();
    let via_first = container
        .instance_at::<Connection>(&Context::new(Session), None)
        .unwrap();
    let via_second = container
        .instance_at::<Connection>(&Context::new(Session), None)
        .unwrap();

    assert!(Arc::ptr_eq(&plain, &via_first));
    assert!(Arc::ptr_eq(&plain, &via_second));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
}

#[test]
fn singleton_nested_inside_contextual_binding_is_shared() {
    struct Session {
        user: &'static str,
    }
    struct Greeting {
        line: String,
    }

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_singleton::<Connection, _>(None, |_| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Connection {
                target: "pool".into(),
            })
        })
        .unwrap();
    builder
        .bind_contextual_provider::<Session, Greeting, _>(None, |rt, session| {
            // Nested resolution carries the session context; the singleton
            // must still be the one shared instance.
            let conn = rt.instance::<Connection>(None)?;
            Ok(Greeting {
                line: format!("{} via {}", session.user, conn.target),
            })
        })
        .unwrap();
    let container = builder.build().unwrap();

    let ada = Context::new(Session { user: "ada" });
    let grace = Context::new(Session { user: "grace" });
    assert_eq!(
        container.instance_at::<Greeting>(&ada, None).unwrap().line,
        "ada via pool"
    );
    assert_eq!(
        container.instance_at::<Greeting>(&grace, None).unwrap().line,
        "grace via pool"
    );
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
}

#[test]
fn contextual_singleton_caches_per_context_value() {
    struct Session {
        user: &'static str,
    }
    struct Cart {
        owner: String,
    }

    let mut builder = ContainerBuilder::new();
    builder
        .bind_contextual_singleton::<Session, Cart, _>(None, |_, session| {
            Ok(Cart {
                owner: session.user.to_string(),
            })
        })
        .unwrap();
    let container = builder.build().unwrap();

    let ada = Context::of(Arc::new(Session { user: "ada" }));
    let grace = Context::of(Arc::new(Session { user: "grace" }));

    let cart_a1 = container.instance_at::<Cart>(&ada, None).unwrap();
    let cart_a2 = container.instance_at::<Cart>(&ada, None).unwrap();
    let cart_g = container.instance_at::<Cart>(&grace, None).unwrap();

    // Same context Arc, same cache; different context, independent cache.
    assert!(Arc::ptr_eq(&cart_a1, &cart_a2));
    assert!(!Arc::ptr_eq(&cart_a1, &cart_g));
    assert_eq!(cart_a1.owner, "ada");
    assert_eq!(cart_g.owner, "grace");
}

#[test]
fn distinct_arcs_of_the_same_context_type_do_not_share_caches() {
    struct Session;
    struct Token(#[allow(dead_code)] u32);

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_contextual_singleton::<Session, Token, _>(None, |_, _| {
            Ok(Token(BUILDS.fetch_add(1, Ordering::SeqCst) as u32))
        })
        .unwrap();
    let container = builder.build().unwrap();

    let first = Context::new(Session);
    let second = Context::new(Session);
    let a = container.instance_at::<Token>(&first, None).unwrap();
    let b = container.instance_at::<Token>(&second, None).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_singleton_construction_is_sticky() {
    use crucible_di::DiError;

    static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    let mut builder = ContainerBuilder::new();
    builder
        .bind_singleton::<Connection, _>(None, |_| {
            ATTEMPTS.fetch_add(1, Ordering::SeqCst);
            Err(DiError::Factory("refused".into()))
        })
        .unwrap();
    let container = builder.build().unwrap();

    let first = container.instance::<Connection>(None).unwrap_err();
    let second = container.instance::<Connection>(None).unwrap_err();
    assert_eq!(first, second);
    assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 1);
}
