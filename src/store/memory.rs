//! In-memory ACL store
//!
//! Keeps everything in ahash maps behind a single RwLock. Suitable for
//! tests and for deployments that rebuild grants at startup.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{AclError, Result};
use crate::model::{AclEntry, ObjectIdentity, ObjectIdentityRecord};
use crate::permission::PermissionMask;
use crate::sid::SecurityIdentifier;
use crate::store::AclStore;

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: AHashMap<i64, ObjectIdentityRecord>,
    by_identity: AHashMap<ObjectIdentity, i64>,
    entries: AHashMap<i64, Vec<AclEntry>>,
    children: AHashMap<i64, Vec<i64>>,
}

impl Inner {
    /// Walk parents from `start`; true if `needle` appears on the chain
    fn chain_contains(&self, start: i64, needle: i64) -> bool {
        let mut cursor = Some(start);
        let mut hops = 0usize;
        while let Some(id) = cursor {
            if id == needle {
                return true;
            }
            // Chains are acyclic by construction; the hop limit only
            // guards against a bug in this module itself.
            hops += 1;
            if hops > self.records.len() {
                return true;
            }
            cursor = self.records.get(&id).and_then(|r| r.parent_id);
        }
        false
    }

    fn detach_child(&mut self, parent_id: i64, child_id: i64) {
        if let Some(siblings) = self.children.get_mut(&parent_id) {
            siblings.retain(|&id| id != child_id);
        }
    }
}

/// Process-local [`AclStore`] backend
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AclStore for MemoryStore {
    fn get_or_create(
        &self,
        identity: &ObjectIdentity,
        owner: &SecurityIdentifier,
    ) -> Result<ObjectIdentityRecord> {
        let mut inner = self.inner.write();

        if let Some(&id) = inner.by_identity.get(identity) {
            return Ok(inner.records[&id].clone());
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let record = ObjectIdentityRecord {
            id,
            identity: identity.clone(),
            owner: owner.clone(),
            parent_id: None,
            inherits_parent: true,
        };

        inner.by_identity.insert(identity.clone(), id);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn lookup(&self, identity: &ObjectIdentity) -> Result<Option<ObjectIdentityRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .by_identity
            .get(identity)
            .map(|id| inner.records[id].clone()))
    }

    fn record(&self, id: i64) -> Result<Option<ObjectIdentityRecord>> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    fn set_parent(&self, child_id: i64, parent_id: Option<i64>) -> Result<()> {
        let mut inner = self.inner.write();

        let child = inner
            .records
            .get(&child_id)
            .cloned()
            .ok_or_else(|| unknown_id(child_id))?;

        if let Some(pid) = parent_id {
            let parent = inner
                .records
                .get(&pid)
                .cloned()
                .ok_or_else(|| unknown_id(pid))?;

            if inner.chain_contains(pid, child_id) {
                return Err(AclError::Cycle {
                    child: child.identity,
                    parent: parent.identity,
                });
            }
        }

        if let Some(old) = child.parent_id {
            inner.detach_child(old, child_id);
        }
        if let Some(pid) = parent_id {
            inner.children.entry(pid).or_default().push(child_id);
        }
        if let Some(record) = inner.records.get_mut(&child_id) {
            record.parent_id = parent_id;
        }
        Ok(())
    }

    fn set_inherits_parent(&self, id: i64, inherits: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let record = inner.records.get_mut(&id).ok_or_else(|| unknown_id(id))?;
        record.inherits_parent = inherits;
        Ok(())
    }

    fn insert_entry(
        &self,
        object_id: i64,
        sid: &SecurityIdentifier,
        mask: PermissionMask,
        granting: bool,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.records.contains_key(&object_id) {
            return Err(unknown_id(object_id));
        }

        let entries = inner.entries.entry(object_id).or_default();
        let order = entries.last().map(|e| e.order + 1).unwrap_or(0);
        entries.push(AclEntry {
            object_id,
            sid: sid.clone(),
            mask,
            granting,
            order,
        });
        Ok(())
    }

    fn delete_entries(&self, object_id: i64, sid: &SecurityIdentifier) -> Result<usize> {
        let mut inner = self.inner.write();
        let Some(entries) = inner.entries.get_mut(&object_id) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| &e.sid != sid);
        Ok(before - entries.len())
    }

    fn entries(&self, object_id: i64) -> Result<Vec<AclEntry>> {
        Ok(self
            .inner
            .read()
            .entries
            .get(&object_id)
            .cloned()
            .unwrap_or_default())
    }

    fn children(&self, object_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .inner
            .read()
            .children
            .get(&object_id)
            .cloned()
            .unwrap_or_default())
    }
}

fn unknown_id(id: i64) -> AclError {
    AclError::InvariantViolation(format!("unknown object identity id {}", id))
}
