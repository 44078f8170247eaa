//! Engine facade
//!
//! Ties the store, cache, evaluator and audit trail together behind the
//! API the owning application calls. Mutations commit to the store
//! first and invalidate the cache afterwards, for the object and every
//! transitive descendant, so no caller can observe a cache hit for a
//! now-stale chain.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::audit::{AuditEvent, AuditLogger, MutationKind};
use crate::cache::{AclCache, CachedAcl};
use crate::error::{AclError, Result};
use crate::evaluator;
use crate::model::{Decision, ObjectIdentity, ObjectIdentityRecord};
use crate::permission::PermissionMask;
use crate::sid::{AuthContext, SecurityIdentifier};
use crate::store::{AclStore, MemoryStore, SqliteStore};

const DEFAULT_ADMIN_AUTHORITY: &str = "ROLE_ADMIN";
const DEFAULT_AUDIT_CAPACITY: usize = 4096;
const DEFAULT_AUDIT_FLUSH: Duration = Duration::from_millis(100);
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Row-level ACL engine
///
/// Safe to share across threads behind an `Arc`; authorization checks
/// run concurrently, mutations serialize only inside the store.
pub struct AclEngine {
    store: Arc<dyn AclStore>,
    cache: AclCache,
    audit: Option<Arc<AuditLogger>>,
    admin_authority: SecurityIdentifier,
}

impl AclEngine {
    /// In-memory engine with defaults, no audit logging
    pub fn in_memory() -> Self {
        AclEngine {
            store: Arc::new(MemoryStore::new()),
            cache: AclCache::new(),
            audit: None,
            admin_authority: SecurityIdentifier::authority(DEFAULT_ADMIN_AUTHORITY),
        }
    }

    /// Builder for custom configuration
    pub fn builder() -> AclEngineBuilder {
        AclEngineBuilder::new()
    }

    /// Can the caller perform `requested` on `(class, key)`?
    ///
    /// An unknown object is a normal `Deny`, never an error: unknown
    /// protected objects default to no access.
    pub fn authorize(
        &self,
        class: &str,
        key: &str,
        ctx: &AuthContext,
        requested: PermissionMask,
    ) -> Result<Decision> {
        let identity = ObjectIdentity::new(class, key);
        let sids = ctx.sids();

        let outcome = match self.store.lookup(&identity)? {
            None => {
                debug!("No identity record for {}, default deny", identity);
                Decision::Deny
            }
            Some(record) => {
                let chain = self.resolved_chain(record.id)?;
                evaluator::evaluate(&chain, &sids, requested)
            }
        };

        debug!("{} for {} on {} ({})", outcome, ctx.username, identity, requested);
        self.record(AuditEvent::decision(&identity, &sids, requested, outcome));
        Ok(outcome)
    }

    /// Like [`authorize`](Self::authorize), but callers holding the
    /// configured admin authority are allowed without consulting entries
    ///
    /// Mirrors the `hasAuthority(admin) or hasPermission(...)` guard the
    /// surrounding application puts on mutating routes.
    pub fn authorize_or_admin(
        &self,
        class: &str,
        key: &str,
        ctx: &AuthContext,
        requested: PermissionMask,
    ) -> Result<Decision> {
        if ctx.sids().contains(&self.admin_authority) {
            let identity = ObjectIdentity::new(class, key);
            debug!("Admin override for {} on {}", ctx.username, identity);
            self.record(AuditEvent::decision(
                &identity,
                &ctx.sids(),
                requested,
                Decision::Allow,
            ));
            return Ok(Decision::Allow);
        }
        self.authorize(class, key, ctx, requested)
    }

    /// Register a protected object so permissions can be granted on it
    ///
    /// Idempotent for the identity itself; the owner is only set on
    /// first registration. The parent, when given, must already exist.
    pub fn create_object_identity(
        &self,
        class: &str,
        key: &str,
        owner_username: &str,
        parent: Option<(&str, &str)>,
    ) -> Result<()> {
        let identity = ObjectIdentity::new(class, key);
        let owner = SecurityIdentifier::principal(owner_username);

        let parent_record = match parent {
            Some((pclass, pkey)) => {
                let parent_identity = ObjectIdentity::new(pclass, pkey);
                Some(
                    self.store
                        .lookup(&parent_identity)?
                        .ok_or(AclError::NotFound(parent_identity))?,
                )
            }
            None => None,
        };

        let record = self.store.get_or_create(&identity, &owner)?;
        if let Some(parent_record) = parent_record {
            self.store.set_parent(record.id, Some(parent_record.id))?;
            self.invalidate_subtree(record.id)?;
        }

        info!("Registered object identity {} (owner {})", identity, owner);
        self.record(AuditEvent::mutation(
            MutationKind::CreateIdentity,
            &identity,
            Some(&owner),
            match parent {
                Some((pclass, pkey)) => format!("parent {}:{}", pclass, pkey),
                None => "no parent".to_string(),
            },
        ));
        Ok(())
    }

    /// Append a granting entry for `sid` on the object
    pub fn grant(
        &self,
        class: &str,
        key: &str,
        sid: &SecurityIdentifier,
        mask: PermissionMask,
    ) -> Result<()> {
        self.add_entry(class, key, sid, mask, true)
    }

    /// Append a denying entry for `sid` on the object
    ///
    /// A deny vetoes any grant for the same bits anywhere on the chain.
    pub fn deny(
        &self,
        class: &str,
        key: &str,
        sid: &SecurityIdentifier,
        mask: PermissionMask,
    ) -> Result<()> {
        self.add_entry(class, key, sid, mask, false)
    }

    /// Grant the object's owner the default WRITE and DELETE entries
    ///
    /// The convenience the owning service uses right after creating a
    /// protected object, so the creator can edit and remove it.
    pub fn grant_owner_defaults(&self, class: &str, key: &str) -> Result<()> {
        let identity = ObjectIdentity::new(class, key);
        let record = self.require(&identity)?;
        let owner = record.owner.clone();

        self.store
            .insert_entry(record.id, &owner, PermissionMask::DELETE, true)?;
        self.store
            .insert_entry(record.id, &owner, PermissionMask::WRITE, true)?;
        self.invalidate_subtree(record.id)?;

        info!("Granted owner defaults to {} on {}", owner, identity);
        self.record(AuditEvent::mutation(
            MutationKind::Grant,
            &identity,
            Some(&owner),
            format!("{}", PermissionMask::WRITE | PermissionMask::DELETE),
        ));
        Ok(())
    }

    /// Remove every entry for `sid` on the object (ancestors untouched);
    /// removing nothing is a no-op, not an error
    pub fn revoke(&self, class: &str, key: &str, sid: &SecurityIdentifier) -> Result<()> {
        let identity = ObjectIdentity::new(class, key);
        let record = self.require(&identity)?;

        let removed = self.store.delete_entries(record.id, sid)?;
        self.invalidate_subtree(record.id)?;

        info!("Revoked {} entries for {} on {}", removed, sid, identity);
        self.record(AuditEvent::mutation(
            MutationKind::Revoke,
            &identity,
            Some(sid),
            format!("{} entries removed", removed),
        ));
        Ok(())
    }

    /// Re-parent an object (or detach it with `parent = None`)
    ///
    /// Fails with `Cycle` when the new parent is the object itself or
    /// one of its descendants; nothing changes on failure.
    pub fn set_parent(
        &self,
        class: &str,
        key: &str,
        parent: Option<(&str, &str)>,
    ) -> Result<()> {
        let identity = ObjectIdentity::new(class, key);
        let record = self.require(&identity)?;

        let parent_id = match parent {
            Some((pclass, pkey)) => {
                let parent_identity = ObjectIdentity::new(pclass, pkey);
                Some(self.require(&parent_identity)?.id)
            }
            None => None,
        };

        self.store.set_parent(record.id, parent_id)?;
        self.invalidate_subtree(record.id)?;

        info!("Parent of {} set to {:?}", identity, parent);
        self.record(AuditEvent::mutation(
            MutationKind::SetParent,
            &identity,
            None,
            match parent {
                Some((pclass, pkey)) => format!("parent {}:{}", pclass, pkey),
                None => "detached".to_string(),
            },
        ));
        Ok(())
    }

    /// Flip whether the object inherits its parent's entries
    pub fn set_inherits_parent(&self, class: &str, key: &str, inherits: bool) -> Result<()> {
        let identity = ObjectIdentity::new(class, key);
        let record = self.require(&identity)?;

        self.store.set_inherits_parent(record.id, inherits)?;
        self.invalidate_subtree(record.id)?;

        self.record(AuditEvent::mutation(
            MutationKind::SetInherit,
            &identity,
            None,
            format!("inherits_parent = {}", inherits),
        ));
        Ok(())
    }

    /// Identity record for `(class, key)`, as an administrative lookup
    /// (`NotFound` is an error here, unlike in [`authorize`](Self::authorize))
    pub fn lookup(&self, class: &str, key: &str) -> Result<ObjectIdentityRecord> {
        self.require(&ObjectIdentity::new(class, key))
    }

    /// Number of resolved chains currently cached
    pub fn cached_chains(&self) -> usize {
        self.cache.len()
    }

    fn require(&self, identity: &ObjectIdentity) -> Result<ObjectIdentityRecord> {
        self.store
            .lookup(identity)?
            .ok_or_else(|| AclError::NotFound(identity.clone()))
    }

    fn resolved_chain(&self, id: i64) -> Result<Arc<CachedAcl>> {
        if let Some(chain) = self.cache.get(id) {
            return Ok(chain);
        }

        // Sample the generation before touching the store; a mutation
        // committing in between retires this build via insert_if_current.
        let generation = self.cache.generation();
        let chain = evaluator::build_chain(self.store.as_ref(), id)?;
        self.cache.insert_if_current(id, Arc::clone(&chain), generation);
        Ok(chain)
    }

    /// Invalidate the object and every transitive descendant: a
    /// descendant's cached chain embeds this object's entries by value.
    fn invalidate_subtree(&self, id: i64) -> Result<()> {
        let mut ids = vec![id];
        let mut cursor = 0;
        while cursor < ids.len() {
            let current = ids[cursor];
            cursor += 1;
            for child in self.store.children(current)? {
                if !ids.contains(&child) {
                    ids.push(child);
                }
            }
        }
        self.cache.invalidate(&ids);
        Ok(())
    }

    fn add_entry(
        &self,
        class: &str,
        key: &str,
        sid: &SecurityIdentifier,
        mask: PermissionMask,
        granting: bool,
    ) -> Result<()> {
        let identity = ObjectIdentity::new(class, key);
        let record = self.require(&identity)?;

        self.store.insert_entry(record.id, sid, mask, granting)?;
        self.invalidate_subtree(record.id)?;

        let kind = if granting {
            MutationKind::Grant
        } else {
            MutationKind::Deny
        };
        info!(
            "{} {} for {} on {}",
            if granting { "Granted" } else { "Denied" },
            mask,
            sid,
            identity
        );
        self.record(AuditEvent::mutation(kind, &identity, Some(sid), format!("{}", mask)));
        Ok(())
    }

    fn record(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.log(event);
        }
    }
}

/// Backend selection for [`AclEngineBuilder`]
enum StoreChoice {
    Memory,
    Sqlite(std::path::PathBuf),
    Custom(Arc<dyn AclStore>),
}

/// Builder for [`AclEngine`]
pub struct AclEngineBuilder {
    store: StoreChoice,
    store_timeout: Duration,
    audit: bool,
    audit_capacity: usize,
    audit_flush: Duration,
    admin_authority: String,
}

impl AclEngineBuilder {
    /// Start from defaults: in-memory store, no audit logging,
    /// admin authority "ROLE_ADMIN"
    pub fn new() -> Self {
        AclEngineBuilder {
            store: StoreChoice::Memory,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            audit: false,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            audit_flush: DEFAULT_AUDIT_FLUSH,
            admin_authority: DEFAULT_ADMIN_AUTHORITY.to_string(),
        }
    }

    /// Use the in-memory store (the default)
    pub fn in_memory(mut self) -> Self {
        self.store = StoreChoice::Memory;
        self
    }

    /// Use the SQLite store at `path`
    pub fn sqlite<P: Into<std::path::PathBuf>>(mut self, path: P) -> Self {
        self.store = StoreChoice::Sqlite(path.into());
        self
    }

    /// Use a caller-supplied store backend
    pub fn store(mut self, store: Arc<dyn AclStore>) -> Self {
        self.store = StoreChoice::Custom(store);
        self
    }

    /// Bound blocking persistence calls; exceeding it surfaces as
    /// `StoreUnavailable` and the caller decides the fallback policy
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Enable the ring-buffered audit trail with the default JSON sink
    pub fn with_audit_logging(mut self) -> Self {
        self.audit = true;
        self
    }

    /// Ring capacity and flush interval for the audit trail
    pub fn audit_tuning(mut self, capacity: usize, flush: Duration) -> Self {
        self.audit_capacity = capacity;
        self.audit_flush = flush;
        self
    }

    /// Authority that bypasses entry evaluation in
    /// [`AclEngine::authorize_or_admin`]
    pub fn admin_authority(mut self, name: &str) -> Self {
        self.admin_authority = name.to_string();
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<AclEngine> {
        let store: Arc<dyn AclStore> = match self.store {
            StoreChoice::Memory => Arc::new(MemoryStore::new()),
            StoreChoice::Sqlite(path) => Arc::new(SqliteStore::open(path, self.store_timeout)?),
            StoreChoice::Custom(store) => store,
        };

        let audit = if self.audit {
            let mut logger = AuditLogger::new(self.audit_capacity, self.audit_flush);
            logger.start_default();
            Some(Arc::new(logger))
        } else {
            None
        };

        Ok(AclEngine {
            store,
            cache: AclCache::new(),
            audit,
            admin_authority: SecurityIdentifier::authority(&self.admin_authority),
        })
    }
}

impl Default for AclEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
