//! Permission evaluation with deny precedence
//!
//! Walks a resolved chain most-specific-first:
//! - deny entries veto immediately, regardless of later or ancestor grants
//! - grants accumulate until every requested bit is satisfied
//! - nothing matching is a normal DENY, not an error

use std::sync::Arc;

use crate::cache::CachedAcl;
use crate::error::{AclError, Result};
use crate::model::Decision;
use crate::permission::PermissionMask;
use crate::sid::SecurityIdentifier;
use crate::store::AclStore;

/// Resolve the full chain for `id` from the store
///
/// Follows parent links while `inherits_parent` holds, up to the root.
/// A revisited id means the store is corrupted and fails with
/// `InvariantViolation` rather than guessing an outcome.
pub fn build_chain(store: &dyn AclStore, id: i64) -> Result<Arc<CachedAcl>> {
    let mut seen: Vec<i64> = Vec::new();
    let mut records = Vec::new();
    let mut cursor = Some(id);

    while let Some(current) = cursor {
        if seen.contains(&current) {
            return Err(AclError::InvariantViolation(format!(
                "cyclic parent chain through object identity id {}",
                current
            )));
        }
        seen.push(current);

        let record = store.record(current)?.ok_or_else(|| {
            AclError::InvariantViolation(format!(
                "dangling parent link to object identity id {}",
                current
            ))
        })?;

        cursor = if record.inherits_parent {
            record.parent_id
        } else {
            None
        };
        records.push(record);
    }

    // Assemble outermost ancestor first so each node can hold its parent
    let mut parent: Option<Arc<CachedAcl>> = None;
    for record in records.into_iter().rev() {
        let entries = store.entries(record.id)?;
        parent = Some(Arc::new(CachedAcl {
            id: record.id,
            inherits_parent: record.inherits_parent,
            entries,
            parent,
        }));
    }

    // records held at least the head, so the chain is never empty
    parent.ok_or_else(|| AclError::InvariantViolation("empty ACL chain".to_string()))
}

/// Evaluate a requested mask against a resolved chain
///
/// An empty request is denied outright; there is nothing it could
/// legitimately gate.
pub fn evaluate(
    chain: &CachedAcl,
    sids: &[SecurityIdentifier],
    requested: PermissionMask,
) -> Decision {
    if requested.is_empty() {
        return Decision::Deny;
    }

    let mut remaining = requested;
    let mut node = Some(chain);

    while let Some(acl) = node {
        for entry in &acl.entries {
            if !sids.contains(&entry.sid) {
                continue;
            }
            if !entry.mask.intersects(remaining) {
                continue;
            }
            if !entry.granting {
                // First deny wins, whole request collapses
                return Decision::Deny;
            }
            remaining = remaining.remove(entry.mask);
            if remaining.is_empty() {
                return Decision::Allow;
            }
        }
        node = acl.parent.as_deref();
    }

    Decision::Deny
}
