//! Cache coherency under mutation, sequential and threaded

use std::sync::Arc;
use std::thread;

use rowacl::{AclEngine, AuthContext, PermissionMask, SecurityIdentifier};

fn alice() -> AuthContext {
    AuthContext::new("alice", &["ROLE_USER"])
}

#[test]
fn test_grant_visible_after_cache_warm() {
    let engine = AclEngine::in_memory();
    engine
        .create_object_identity("Comment", "1", "alice", None)
        .unwrap();

    // Warm the cache with the pre-grant state
    assert!(!engine
        .authorize("Comment", "1", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());

    engine
        .grant(
            "Comment",
            "1",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::READ,
        )
        .unwrap();

    // The very next check must see the grant
    assert!(engine
        .authorize("Comment", "1", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_revoke_visible_after_cache_warm() {
    let engine = AclEngine::in_memory();
    engine
        .create_object_identity("Comment", "1", "alice", None)
        .unwrap();
    engine
        .grant(
            "Comment",
            "1",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::READ,
        )
        .unwrap();

    assert!(engine
        .authorize("Comment", "1", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());

    engine
        .revoke("Comment", "1", &SecurityIdentifier::principal("alice"))
        .unwrap();

    assert!(!engine
        .authorize("Comment", "1", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_parent_mutation_invalidates_descendants() {
    let engine = AclEngine::in_memory();
    engine
        .create_object_identity("News", "7", "editor", None)
        .unwrap();
    engine
        .create_object_identity("Comment", "42", "alice", Some(("News", "7")))
        .unwrap();

    // Warm the descendant's chain, which embeds the parent's entries
    assert!(!engine
        .authorize("Comment", "42", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());

    engine
        .grant(
            "News",
            "7",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::READ,
        )
        .unwrap();

    assert!(engine
        .authorize("Comment", "42", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());

    engine
        .revoke("News", "7", &SecurityIdentifier::principal("alice"))
        .unwrap();

    assert!(!engine
        .authorize("Comment", "42", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_concurrent_reads_during_mutations() {
    let engine = Arc::new(AclEngine::in_memory());

    for i in 0..20 {
        engine
            .create_object_identity("Comment", &i.to_string(), "alice", None)
            .unwrap();
        engine
            .grant(
                "Comment",
                &i.to_string(),
                &SecurityIdentifier::principal("alice"),
                PermissionMask::READ,
            )
            .unwrap();
    }

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    let idx = rand::random::<usize>() % 20;
                    // READ is never revoked, so this must always allow
                    let outcome = engine
                        .authorize(
                            "Comment",
                            &idx.to_string(),
                            &AuthContext::new("alice", &["ROLE_USER"]),
                            PermissionMask::READ,
                        )
                        .unwrap();
                    assert!(outcome.is_allowed());
                }
            })
        })
        .collect();

    // A writer churns unrelated WRITE grants while the readers run
    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let alice = SecurityIdentifier::principal("alice");
            for round in 0..50 {
                let key = (round % 20).to_string();
                engine
                    .grant("Comment", &key, &alice, PermissionMask::WRITE)
                    .unwrap();
            }
        })
    };

    for handle in readers {
        handle.join().unwrap();
    }
    writer.join().unwrap();
}

#[test]
fn test_revoke_never_leaves_stale_allow() {
    let engine = Arc::new(AclEngine::in_memory());
    engine
        .create_object_identity("Comment", "1", "alice", None)
        .unwrap();

    let alice_sid = SecurityIdentifier::principal("alice");
    let ctx = AuthContext::new("alice", &[]);

    for _ in 0..100 {
        engine
            .grant("Comment", "1", &alice_sid, PermissionMask::WRITE)
            .unwrap();

        // Readers race the upcoming revoke; whatever they observe, once
        // revoke returns the next check must deny.
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let ctx = ctx.clone();
                thread::spawn(move || {
                    let _ = engine.authorize("Comment", "1", &ctx, PermissionMask::WRITE);
                })
            })
            .collect();

        engine.revoke("Comment", "1", &alice_sid).unwrap();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!engine
            .authorize("Comment", "1", &ctx, PermissionMask::WRITE)
            .unwrap()
            .is_allowed());
    }
}
