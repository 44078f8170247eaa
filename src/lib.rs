//! # rowacl - Row-Level ACL Engine
//!
//! `rowacl` decides ALLOW or DENY for a caller's action on one specific
//! domain object. Permissions can be granted directly on an object,
//! inherited from a parent object in a tree, and looked up through
//! group-like authorities as well as individual users:
//!
//! - **Deny precedence**: the first matching deny vetoes the whole check
//! - **Inheritance**: grants accumulate across the ancestor chain
//! - **Caching**: resolved chains are memoized and invalidated on mutation
//! - **Audit trail**: every decision and mutation, best-effort, non-blocking
//! - **Pluggable stores**: in-memory or durable SQLite metadata
//!
//! ## Quick Start
//!
//! ```rust
//! use rowacl::{AclEngine, AuthContext, PermissionMask};
//!
//! # fn main() -> rowacl::Result<()> {
//! let engine = AclEngine::in_memory();
//!
//! // Register a protected object and let its creator edit and delete it
//! engine.create_object_identity("Comment", "42", "alice", None)?;
//! engine.grant_owner_defaults("Comment", "42")?;
//!
//! // Gate an operation
//! let alice = AuthContext::new("alice", &["ROLE_USER"]);
//! let decision = engine.authorize("Comment", "42", &alice, PermissionMask::WRITE)?;
//! assert!(decision.is_allowed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Durable Store and Audit Trail
//!
//! ```rust,no_run
//! use rowacl::AclEngine;
//! use std::time::Duration;
//!
//! # fn main() -> rowacl::Result<()> {
//! let engine = AclEngine::builder()
//!     .sqlite("/var/lib/app/acl.db")
//!     .store_timeout(Duration::from_secs(2))
//!     .with_audit_logging()
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod cache;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod permission;
pub mod sid;
pub mod store;

pub use audit::{AuditEvent, AuditLogger, MutationKind};
pub use cache::{AclCache, CachedAcl};
pub use engine::{AclEngine, AclEngineBuilder};
pub use error::{AclError, Result};
pub use model::{AclEntry, Decision, ObjectIdentity, ObjectIdentityRecord};
pub use permission::PermissionMask;
pub use sid::{AuthContext, SecurityIdentifier};
pub use store::{AclStore, MemoryStore, SqliteStore};
