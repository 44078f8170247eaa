//! ACL data model
//!
//! - `ObjectIdentity`: the (class, key) handle for one protected object
//! - `ObjectIdentityRecord`: the stored identity row, with owner,
//!   optional parent and the inheritance flag
//! - `AclEntry`: one (SID, mask, grant/deny) binding on an object
//! - `Decision`: the outcome of an authorization check

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::permission::PermissionMask;
use crate::sid::SecurityIdentifier;

/// Identifies one protected domain object
///
/// `class` is a logical discriminator ("Comment"), `key` is the object's
/// primary key rendered as a string. The engine does not validate that
/// the key corresponds to a live business record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// Logical object class, e.g. "Comment"
    pub class: String,
    /// Object primary key as a string
    pub key: String,
}

impl ObjectIdentity {
    /// Create an object identity from class and key
    pub fn new(class: &str, key: &str) -> Self {
        ObjectIdentity {
            class: class.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.key)
    }
}

/// Stored identity row for one protected object
///
/// Created lazily on first grant or lookup, never auto-deleted. The
/// parent link is by id; chains must stay acyclic (enforced at
/// `set_parent` time, re-checked defensively during evaluation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIdentityRecord {
    /// Surrogate id, unique within the store
    pub id: i64,
    /// The (class, key) pair this row represents
    pub identity: ObjectIdentity,
    /// SID that owns the object; set at creation, never overwritten
    pub owner: SecurityIdentifier,
    /// Parent identity id, if the object sits in a tree
    pub parent_id: Option<i64>,
    /// Whether evaluation also consults the parent's resolved chain
    pub inherits_parent: bool,
}

/// One permission binding on an object
///
/// Entries are ordered per object (ascending `order`). Multiple entries
/// for the same SID are allowed; conflicts are resolved at evaluation
/// time, never by overwriting storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Identity id of the object this entry is attached to
    pub object_id: i64,
    /// Subject of the binding
    pub sid: SecurityIdentifier,
    /// Permission bits the binding covers
    pub mask: PermissionMask,
    /// True grants the bits, false denies them (deny vetoes)
    pub granting: bool,
    /// Position within the object's entry list
    pub order: i32,
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Every requested bit was satisfied and no deny matched
    Allow,
    /// A deny matched, or some requested bit was never granted
    Deny,
}

impl Decision {
    /// True for [`Decision::Allow`]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "ALLOW"),
            Decision::Deny => write!(f, "DENY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_identity_display() {
        let oid = ObjectIdentity::new("Comment", "42");
        assert_eq!(oid.to_string(), "Comment:42");
    }

    #[test]
    fn test_object_identity_equality() {
        assert_eq!(
            ObjectIdentity::new("Comment", "42"),
            ObjectIdentity::new("Comment", "42")
        );
        assert_ne!(
            ObjectIdentity::new("Comment", "42"),
            ObjectIdentity::new("News", "42")
        );
    }

    #[test]
    fn test_decision() {
        assert!(Decision::Allow.is_allowed());
        assert!(!Decision::Deny.is_allowed());
        assert_eq!(Decision::Deny.to_string(), "DENY");
    }
}
