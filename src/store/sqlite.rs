//! SQLite-backed ACL store
//!
//! Durable backend using the relational layout of the classic ACL
//! schema: one table of object identities (with parent links) and one
//! table of ordered entries. SIDs are stored inline in their compact
//! tagged form rather than through a surrogate SID table.
//!
//! The connection carries a caller-supplied busy timeout; a lock that
//! cannot be acquired within it surfaces as `StoreUnavailable`, never as
//! a silent ALLOW or DENY.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use crate::error::{AclError, Result};
use crate::model::{AclEntry, ObjectIdentity, ObjectIdentityRecord};
use crate::permission::PermissionMask;
use crate::sid::SecurityIdentifier;
use crate::store::AclStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS acl_object_identity (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    object_class    TEXT NOT NULL,
    object_key      TEXT NOT NULL,
    owner_sid       TEXT NOT NULL,
    parent_id       INTEGER REFERENCES acl_object_identity(id),
    inherits_parent INTEGER NOT NULL DEFAULT 1,
    UNIQUE (object_class, object_key)
);

CREATE TABLE IF NOT EXISTS acl_entry (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id INTEGER NOT NULL REFERENCES acl_object_identity(id),
    sid       TEXT NOT NULL,
    mask      INTEGER NOT NULL,
    granting  INTEGER NOT NULL,
    ord       INTEGER NOT NULL,
    UNIQUE (object_id, ord)
);

CREATE INDEX IF NOT EXISTS idx_acl_entry_object ON acl_entry(object_id, ord);
CREATE INDEX IF NOT EXISTS idx_acl_identity_parent ON acl_object_identity(parent_id);
";

/// Durable [`AclStore`] backend on a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    ///
    /// `busy_timeout` bounds every blocking persistence call; exceeding
    /// it yields `StoreUnavailable` and the caller picks the fallback
    /// policy.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, busy_timeout)
    }

    /// Open a private in-memory database (testing, ephemeral use)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, Duration::from_secs(5))
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawIdentityRow> {
        Ok(RawIdentityRow {
            id: row.get(0)?,
            class: row.get(1)?,
            key: row.get(2)?,
            owner_tag: row.get(3)?,
            parent_id: row.get(4)?,
            inherits_parent: row.get(5)?,
        })
    }

    fn select_record(conn: &Connection, id: i64) -> Result<Option<ObjectIdentityRecord>> {
        let raw = conn
            .query_row(
                "SELECT id, object_class, object_key, owner_sid, parent_id, inherits_parent
                 FROM acl_object_identity WHERE id = ?1",
                params![id],
                Self::row_to_raw,
            )
            .optional()?;
        raw.map(RawIdentityRow::decode).transpose()
    }
}

/// Identity row as stored, before the owner tag is decoded
struct RawIdentityRow {
    id: i64,
    class: String,
    key: String,
    owner_tag: String,
    parent_id: Option<i64>,
    inherits_parent: bool,
}

impl RawIdentityRow {
    fn decode(self) -> Result<ObjectIdentityRecord> {
        Ok(ObjectIdentityRecord {
            id: self.id,
            identity: ObjectIdentity {
                class: self.class,
                key: self.key,
            },
            owner: decode_sid(&self.owner_tag)?,
            parent_id: self.parent_id,
            inherits_parent: self.inherits_parent,
        })
    }
}

fn decode_sid(tag: &str) -> Result<SecurityIdentifier> {
    SecurityIdentifier::from_tag(tag)
        .ok_or_else(|| AclError::InvariantViolation(format!("malformed stored SID: {:?}", tag)))
}

impl AclStore for SqliteStore {
    fn get_or_create(
        &self,
        identity: &ObjectIdentity,
        owner: &SecurityIdentifier,
    ) -> Result<ObjectIdentityRecord> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT OR IGNORE INTO acl_object_identity
             (object_class, object_key, owner_sid, parent_id, inherits_parent)
             VALUES (?1, ?2, ?3, NULL, 1)",
            params![identity.class, identity.key, owner.as_tag()],
        )?;

        let raw = conn.query_row(
            "SELECT id, object_class, object_key, owner_sid, parent_id, inherits_parent
             FROM acl_object_identity WHERE object_class = ?1 AND object_key = ?2",
            params![identity.class, identity.key],
            Self::row_to_raw,
        )?;
        raw.decode()
    }

    fn lookup(&self, identity: &ObjectIdentity) -> Result<Option<ObjectIdentityRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, object_class, object_key, owner_sid, parent_id, inherits_parent
                 FROM acl_object_identity WHERE object_class = ?1 AND object_key = ?2",
                params![identity.class, identity.key],
                Self::row_to_raw,
            )
            .optional()?;
        raw.map(RawIdentityRow::decode).transpose()
    }

    fn record(&self, id: i64) -> Result<Option<ObjectIdentityRecord>> {
        let conn = self.conn.lock();
        Self::select_record(&conn, id)
    }

    fn set_parent(&self, child_id: i64, parent_id: Option<i64>) -> Result<()> {
        let conn = self.conn.lock();

        let child = Self::select_record(&conn, child_id)?
            .ok_or_else(|| unknown_id(child_id))?;

        if let Some(pid) = parent_id {
            let parent = Self::select_record(&conn, pid)?.ok_or_else(|| unknown_id(pid))?;

            // Walk upward from the prospective parent; hitting the child
            // means the assignment would close a cycle. The hop limit
            // catches a chain already corrupted into a cycle elsewhere.
            let total_rows: i64 = conn.query_row(
                "SELECT COUNT(*) FROM acl_object_identity",
                [],
                |row| row.get(0),
            )?;

            let mut cursor = Some(pid);
            let mut hops: i64 = 0;
            while let Some(id) = cursor {
                if id == child_id {
                    return Err(AclError::Cycle {
                        child: child.identity,
                        parent: parent.identity,
                    });
                }
                hops += 1;
                if hops > total_rows {
                    return Err(AclError::InvariantViolation(format!(
                        "cyclic parent chain above object identity id {}",
                        pid
                    )));
                }
                cursor = Self::select_record(&conn, id)?.and_then(|r| r.parent_id);
            }
        }

        conn.execute(
            "UPDATE acl_object_identity SET parent_id = ?1 WHERE id = ?2",
            params![parent_id, child_id],
        )?;
        Ok(())
    }

    fn set_inherits_parent(&self, id: i64, inherits: bool) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE acl_object_identity SET inherits_parent = ?1 WHERE id = ?2",
            params![inherits, id],
        )?;
        if updated == 0 {
            return Err(unknown_id(id));
        }
        Ok(())
    }

    fn insert_entry(
        &self,
        object_id: i64,
        sid: &SecurityIdentifier,
        mask: PermissionMask,
        granting: bool,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let order: i32 = tx.query_row(
            "SELECT COALESCE(MAX(ord) + 1, 0) FROM acl_entry WHERE object_id = ?1",
            params![object_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO acl_entry (object_id, sid, mask, granting, ord)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![object_id, sid.as_tag(), mask.bits() as i64, granting, order],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn delete_entries(&self, object_id: i64, sid: &SecurityIdentifier) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM acl_entry WHERE object_id = ?1 AND sid = ?2",
            params![object_id, sid.as_tag()],
        )?;
        Ok(deleted)
    }

    fn entries(&self, object_id: i64) -> Result<Vec<AclEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT object_id, sid, mask, granting, ord
             FROM acl_entry WHERE object_id = ?1 ORDER BY ord ASC",
        )?;

        let rows = stmt.query_map(params![object_id], |row| {
            let sid_tag: String = row.get(1)?;
            let mask_bits: i64 = row.get(2)?;
            Ok((
                row.get::<_, i64>(0)?,
                sid_tag,
                mask_bits,
                row.get::<_, bool>(3)?,
                row.get::<_, i32>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (object_id, sid_tag, mask_bits, granting, order) = row?;
            entries.push(AclEntry {
                object_id,
                sid: decode_sid(&sid_tag)?,
                mask: PermissionMask::from_bits(mask_bits as u32),
                granting,
                order,
            });
        }
        Ok(entries)
    }

    fn children(&self, object_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id FROM acl_object_identity WHERE parent_id = ?1")?;
        let rows = stmt.query_map(params![object_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }
}

fn unknown_id(id: i64) -> AclError {
    AclError::InvariantViolation(format!("unknown object identity id {}", id))
}
