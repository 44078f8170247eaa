//! Permission bit vocabulary
//!
//! Each named permission occupies one bit of a mask. Bit assignments are
//! part of the persisted format and must not change once data exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// A set of permission bits
///
/// A requested mask is satisfied only when every bit in it is
/// independently satisfied within the same evaluation pass.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PermissionMask(u32);

impl PermissionMask {
    /// Read the object
    pub const READ: PermissionMask = PermissionMask(1);
    /// Modify the object
    pub const WRITE: PermissionMask = PermissionMask(2);
    /// Create children of the object
    pub const CREATE: PermissionMask = PermissionMask(4);
    /// Delete the object
    pub const DELETE: PermissionMask = PermissionMask(8);
    /// Administer the object's ACL
    pub const ADMINISTER: PermissionMask = PermissionMask(16);

    /// Empty mask (no permissions)
    pub const fn empty() -> Self {
        PermissionMask(0)
    }

    /// Construct from raw bits (persisted form)
    pub const fn from_bits(bits: u32) -> Self {
        PermissionMask(bits)
    }

    /// Raw bit value (persisted form)
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if no bits are set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Union of two masks
    pub const fn union(&self, other: PermissionMask) -> Self {
        PermissionMask(self.0 | other.0)
    }

    /// Bits present in both masks
    pub const fn intersection(&self, other: PermissionMask) -> Self {
        PermissionMask(self.0 & other.0)
    }

    /// True if any bit is shared with `other`
    pub const fn intersects(&self, other: PermissionMask) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(&self, other: PermissionMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Remove the bits of `other` from `self`
    pub const fn remove(&self, other: PermissionMask) -> Self {
        PermissionMask(self.0 & !other.0)
    }
}

impl BitOr for PermissionMask {
    type Output = PermissionMask;

    fn bitor(self, rhs: PermissionMask) -> PermissionMask {
        self.union(rhs)
    }
}

impl fmt::Display for PermissionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PermissionMask, &str); 5] = [
            (PermissionMask::READ, "READ"),
            (PermissionMask::WRITE, "WRITE"),
            (PermissionMask::CREATE, "CREATE"),
            (PermissionMask::DELETE, "DELETE"),
            (PermissionMask::ADMINISTER, "ADMINISTER"),
        ];

        if self.is_empty() {
            return write!(f, "NONE");
        }

        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }

        // Unnamed bits render numerically so nothing is hidden
        let unnamed = self.0 & !0x1f;
        if unnamed != 0 {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{:#x}", unnamed)?;
        }

        Ok(())
    }
}
