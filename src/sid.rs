//! Security identifiers and caller identity resolution
//!
//! A SID is the subject of every permission grant. Two closed variants:
//! - `Principal`: an authenticated end user (by username)
//! - `Authority`: a role or group, e.g. "ROLE_ADMIN"
//!
//! Role strings are resolved into SIDs once at the boundary, never
//! re-parsed per check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A security principal: the subject side of an ACL entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityIdentifier {
    /// An authenticated end user, identified by username
    Principal(String),
    /// A role or group identity, e.g. "ROLE_ADMIN"
    Authority(String),
}

impl SecurityIdentifier {
    /// Create a principal SID from a username
    pub fn principal(username: &str) -> Self {
        SecurityIdentifier::Principal(username.trim().to_string())
    }

    /// Create an authority SID from a role name
    pub fn authority(name: &str) -> Self {
        SecurityIdentifier::Authority(name.trim().to_string())
    }

    /// Name component of the SID (username or role name)
    pub fn name(&self) -> &str {
        match self {
            SecurityIdentifier::Principal(name) => name,
            SecurityIdentifier::Authority(name) => name,
        }
    }

    /// Compact stable string form, used as the persisted representation
    ///
    /// `p:` prefixes principals, `a:` prefixes authorities.
    pub fn as_tag(&self) -> String {
        match self {
            SecurityIdentifier::Principal(name) => format!("p:{}", name),
            SecurityIdentifier::Authority(name) => format!("a:{}", name),
        }
    }

    /// Parse the compact string form produced by [`as_tag`](Self::as_tag)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.split_once(':') {
            Some(("p", name)) => Some(SecurityIdentifier::Principal(name.to_string())),
            Some(("a", name)) => Some(SecurityIdentifier::Authority(name.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityIdentifier::Principal(name) => write!(f, "user {}", name),
            SecurityIdentifier::Authority(name) => write!(f, "authority {}", name),
        }
    }
}

/// Already-authenticated caller context
///
/// Supplied by the external authentication layer. The engine assumes the
/// username and roles have been validated upstream; an unauthenticated
/// caller is a precondition violation, not a condition handled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Validated username of the caller
    pub username: String,
    /// Role names carried by the caller, e.g. ["ROLE_USER"]
    pub roles: Vec<String>,
}

impl AuthContext {
    /// Create a caller context from a username and role list
    pub fn new(username: &str, roles: &[&str]) -> Self {
        AuthContext {
            username: username.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Resolve the caller into candidate SIDs: principal first, then
    /// authorities in role order, duplicates removed
    pub fn sids(&self) -> Vec<SecurityIdentifier> {
        let mut sids = vec![SecurityIdentifier::principal(&self.username)];
        for role in &self.roles {
            let sid = SecurityIdentifier::authority(role);
            if !sids.contains(&sid) {
                sids.push(sid);
            }
        }
        sids
    }
}
