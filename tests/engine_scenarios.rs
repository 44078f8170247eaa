//! End-to-end engine scenarios: direct grants, revocation, inheritance,
//! deny precedence and reparenting

use rowacl::{AclEngine, AuthContext, PermissionMask, SecurityIdentifier};

fn alice() -> AuthContext {
    AuthContext::new("alice", &["ROLE_USER"])
}

fn bob() -> AuthContext {
    AuthContext::new("bob", &["ROLE_USER"])
}

fn admin() -> AuthContext {
    AuthContext::new("carol", &["ROLE_ADMIN"])
}

#[test]
fn test_direct_grant_and_revoke() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("Comment", "42", "alice", None)
        .unwrap();
    engine
        .grant(
            "Comment",
            "42",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::WRITE | PermissionMask::DELETE,
        )
        .unwrap();

    assert!(engine
        .authorize("Comment", "42", &alice(), PermissionMask::WRITE)
        .unwrap()
        .is_allowed());
    assert!(!engine
        .authorize("Comment", "42", &bob(), PermissionMask::WRITE)
        .unwrap()
        .is_allowed());

    engine
        .revoke("Comment", "42", &SecurityIdentifier::principal("alice"))
        .unwrap();

    assert!(!engine
        .authorize("Comment", "42", &alice(), PermissionMask::WRITE)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_inherited_authority_grant() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("News", "7", "editor", None)
        .unwrap();
    engine
        .create_object_identity("Comment", "42", "alice", Some(("News", "7")))
        .unwrap();
    engine
        .grant(
            "News",
            "7",
            &SecurityIdentifier::authority("ROLE_ADMIN"),
            PermissionMask::DELETE,
        )
        .unwrap();

    // Admin authority inherits DELETE down to the comment
    assert!(engine
        .authorize("Comment", "42", &admin(), PermissionMask::DELETE)
        .unwrap()
        .is_allowed());
    assert!(!engine
        .authorize("Comment", "42", &alice(), PermissionMask::DELETE)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_inheritance_flag_gates_parent_entries() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("News", "7", "editor", None)
        .unwrap();
    engine
        .create_object_identity("Comment", "42", "alice", Some(("News", "7")))
        .unwrap();
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

    engine.set_inherits_parent("Comment", "42", false).unwrap();
    assert!(!engine
        .authorize("Comment", "42", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());

    engine.set_inherits_parent("Comment", "42", true).unwrap();
    assert!(engine
        .authorize("Comment", "42", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_deny_on_child_overrides_parent_grant() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("News", "7", "editor", None)
        .unwrap();
    engine
        .create_object_identity("Comment", "42", "alice", Some(("News", "7")))
        .unwrap();

    engine
        .grant(
            "News",
            "7",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::WRITE,
        )
        .unwrap();
    engine
        .deny(
            "Comment",
            "42",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::WRITE,
        )
        .unwrap();

    // The child's deny is reached first and vetoes the inherited grant
    assert!(!engine
        .authorize("Comment", "42", &alice(), PermissionMask::WRITE)
        .unwrap()
        .is_allowed());
    // The parent itself is unaffected
    assert!(engine
        .authorize("News", "7", &alice(), PermissionMask::WRITE)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_combined_mask_needs_every_bit() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("Comment", "1", "alice", None)
        .unwrap();
    engine
        .grant(
            "Comment",
            "1",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::WRITE,
        )
        .unwrap();

    assert!(engine
        .authorize("Comment", "1", &alice(), PermissionMask::WRITE)
        .unwrap()
        .is_allowed());
    assert!(!engine
        .authorize(
            "Comment",
            "1",
            &alice(),
            PermissionMask::WRITE | PermissionMask::DELETE
        )
        .unwrap()
        .is_allowed());

    // Second grant completes the union
    engine
        .grant(
            "Comment",
            "1",
            &SecurityIdentifier::authority("ROLE_USER"),
            PermissionMask::DELETE,
        )
        .unwrap();
    assert!(engine
        .authorize(
            "Comment",
            "1",
            &alice(),
            PermissionMask::WRITE | PermissionMask::DELETE
        )
        .unwrap()
        .is_allowed());
}

#[test]
fn test_create_object_identity_idempotent() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("Comment", "1", "alice", None)
        .unwrap();
    engine
        .create_object_identity("Comment", "1", "bob", None)
        .unwrap();

    // Owner fixed at first registration
    let record = engine.lookup("Comment", "1").unwrap();
    assert_eq!(record.owner, SecurityIdentifier::principal("alice"));

    engine.grant_owner_defaults("Comment", "1").unwrap();
    assert!(engine
        .authorize("Comment", "1", &alice(), PermissionMask::DELETE)
        .unwrap()
        .is_allowed());
    assert!(!engine
        .authorize("Comment", "1", &bob(), PermissionMask::DELETE)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_reparent_cycle_rejected_and_state_kept() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("News", "1", "editor", None)
        .unwrap();
    engine
        .create_object_identity("Comment", "2", "alice", Some(("News", "1")))
        .unwrap();

    let err = engine
        .set_parent("News", "1", Some(("Comment", "2")))
        .unwrap_err();
    assert!(matches!(err, rowacl::AclError::Cycle { .. }));

    // Original shape intact: grants still flow parent -> child
    engine
        .grant(
            "News",
            "1",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::READ,
        )
        .unwrap();
    assert!(engine
        .authorize("Comment", "2", &alice(), PermissionMask::READ)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_deep_chain_accumulation() {
    let engine = AclEngine::in_memory();

    engine
        .create_object_identity("Site", "1", "root", None)
        .unwrap();
    engine
        .create_object_identity("News", "7", "editor", Some(("Site", "1")))
        .unwrap();
    engine
        .create_object_identity("Comment", "42", "alice", Some(("News", "7")))
        .unwrap();

    engine
        .grant(
            "Site",
            "1",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::READ,
        )
        .unwrap();
    engine
        .grant(
            "News",
            "7",
            &SecurityIdentifier::principal("alice"),
            PermissionMask::WRITE,
        )
        .unwrap();

    // Bits satisfied at different depths of the chain
    assert!(engine
        .authorize(
            "Comment",
            "42",
            &alice(),
            PermissionMask::READ | PermissionMask::WRITE
        )
        .unwrap()
        .is_allowed());
    assert!(!engine
        .authorize(
            "Comment",
            "42",
            &alice(),
            PermissionMask::READ | PermissionMask::DELETE
        )
        .unwrap()
        .is_allowed());
}
