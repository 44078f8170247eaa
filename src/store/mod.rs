//! ACL metadata stores
//!
//! The engine persists only its own metadata: object identity rows and
//! ordered permission entries. Any backend works as long as it honors
//! the ordering and atomicity contracts here; two are provided:
//! - [`MemoryStore`]: process-local, for tests and embedded use
//! - [`SqliteStore`]: durable, three-table relational layout

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::model::{AclEntry, ObjectIdentity, ObjectIdentityRecord};
use crate::permission::PermissionMask;
use crate::sid::SecurityIdentifier;

/// Backing store for ACL metadata
///
/// All methods are safe to call concurrently. Mutations must be atomic:
/// either fully applied or not at all, with no partially-visible state.
pub trait AclStore: Send + Sync {
    /// Return the identity row for `(class, key)`, creating it without a
    /// parent if absent. Idempotent; the owner is set only at creation
    /// and never overwritten by later calls.
    fn get_or_create(
        &self,
        identity: &ObjectIdentity,
        owner: &SecurityIdentifier,
    ) -> Result<ObjectIdentityRecord>;

    /// Find the identity row for `(class, key)`, if one exists
    fn lookup(&self, identity: &ObjectIdentity) -> Result<Option<ObjectIdentityRecord>>;

    /// Find an identity row by surrogate id
    fn record(&self, id: i64) -> Result<Option<ObjectIdentityRecord>>;

    /// Re-parent `child_id` (or detach it with `None`)
    ///
    /// Fails with `Cycle` if the new parent is the child itself or one of
    /// its descendants; the child's parent is left unchanged on error.
    fn set_parent(&self, child_id: i64, parent_id: Option<i64>) -> Result<()>;

    /// Flip whether evaluation consults the parent's chain
    fn set_inherits_parent(&self, id: i64, inherits: bool) -> Result<()>;

    /// Append a new entry with the next order value; never merges with
    /// existing entries for the same SID
    fn insert_entry(
        &self,
        object_id: i64,
        sid: &SecurityIdentifier,
        mask: PermissionMask,
        granting: bool,
    ) -> Result<()>;

    /// Remove every entry for `sid` on `object_id` (ancestors untouched);
    /// returns the number removed, zero being a normal no-op
    fn delete_entries(&self, object_id: i64, sid: &SecurityIdentifier) -> Result<usize>;

    /// All entries on `object_id`, ascending order
    fn entries(&self, object_id: i64) -> Result<Vec<AclEntry>>;

    /// Ids of identities whose parent is `object_id`
    ///
    /// The reverse child index exists to make cache invalidation of
    /// descendants correct and bounded.
    fn children(&self, object_id: i64) -> Result<Vec<i64>>;
}
