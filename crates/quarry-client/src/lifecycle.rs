//! Asset lifecycle state machine.
//!
//! ```text
//! NONEXISTENT --create--> ACTIVE --delete--> DELETED --purge--> PURGED
//!                           ^                   |
//!                           +------restore------+
//! ACTIVE --purge--> PURGED
//! ```
//!
//! `PURGED` is terminal: the guid never resolves again, although the qualified
//! name may be reused by a later create. Every backend applies transitions
//! through [`LifecycleState`] so they agree on what is legal.

use std::fmt;

use quarry_core::{AssetStatus, Error, Result};

/// Where an asset sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Never created, or the qualified name was freed by a purge.
    Nonexistent,
    /// Live.
    Active,
    /// Soft-deleted and restorable.
    Deleted,
    /// Permanently removed.
    Purged,
}

/// Result of applying a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The asset moved from active to deleted.
    Deleted,
    /// The asset was already deleted; nothing changed.
    AlreadyDeleted,
}

impl LifecycleState {
    /// State of a stored asset with the given status.
    #[must_use]
    pub const fn from_status(status: AssetStatus) -> Self {
        match status {
            AssetStatus::Active => Self::Active,
            AssetStatus::Deleted => Self::Deleted,
        }
    }

    /// Status to store for this state, if it is a stored state.
    #[must_use]
    pub const fn status(self) -> Option<AssetStatus> {
        match self {
            Self::Active => Some(AssetStatus::Active),
            Self::Deleted => Some(AssetStatus::Deleted),
            Self::Nonexistent | Self::Purged => None,
        }
    }

    /// Checks that a create may proceed.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if an active or soft-deleted asset already holds the
    /// name.
    pub fn create(self, what: &dyn fmt::Display) -> Result<Self> {
        match self {
            Self::Nonexistent | Self::Purged => Ok(Self::Active),
            Self::Active => Err(Error::conflict(format!("{what} already exists"))),
            Self::Deleted => Err(Error::conflict(format!(
                "{what} already exists in DELETED state; restore or purge it first"
            ))),
        }
    }

    /// Checks that an update may proceed. The state is unchanged by updates.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for nonexistent or purged assets.
    pub fn update(self, type_name: &str, what: &dyn fmt::Display) -> Result<Self> {
        match self {
            Self::Active | Self::Deleted => Ok(self),
            Self::Nonexistent | Self::Purged => Err(Error::not_found(type_name, what)),
        }
    }

    /// Applies a soft delete.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for nonexistent or purged assets.
    pub fn delete(self, type_name: &str, what: &dyn fmt::Display) -> Result<(Self, DeleteOutcome)> {
        match self {
            Self::Active => Ok((Self::Deleted, DeleteOutcome::Deleted)),
            Self::Deleted => Ok((Self::Deleted, DeleteOutcome::AlreadyDeleted)),
            Self::Nonexistent | Self::Purged => Err(Error::not_found(type_name, what)),
        }
    }

    /// Applies a restore. Returns the new state and whether anything changed.
    #[must_use]
    pub const fn restore(self) -> (Self, bool) {
        match self {
            Self::Deleted => (Self::Active, true),
            other => (other, false),
        }
    }

    /// Applies a purge.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for nonexistent or already purged assets.
    pub fn purge(self, type_name: &str, what: &dyn fmt::Display) -> Result<Self> {
        match self {
            Self::Active | Self::Deleted => Ok(Self::Purged),
            Self::Nonexistent | Self::Purged => Err(Error::not_found(type_name, what)),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nonexistent => "NONEXISTENT",
            Self::Active => "ACTIVE",
            Self::Deleted => "DELETED",
            Self::Purged => "PURGED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHAT: &str = "Table default/pg/p/d/s/t";

    #[test]
    fn create_only_from_free_names() {
        assert_eq!(
            LifecycleState::Nonexistent.create(&WHAT).unwrap(),
            LifecycleState::Active
        );
        assert_eq!(
            LifecycleState::Purged.create(&WHAT).unwrap(),
            LifecycleState::Active
        );
        assert!(matches!(
            LifecycleState::Active.create(&WHAT),
            Err(Error::Conflict { .. })
        ));
        assert!(matches!(
            LifecycleState::Deleted.create(&WHAT),
            Err(Error::Conflict { .. })
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let (state, outcome) = LifecycleState::Active.delete("Table", &WHAT).unwrap();
        assert_eq!(state, LifecycleState::Deleted);
        assert_eq!(outcome, DeleteOutcome::Deleted);

        let (state, outcome) = state.delete("Table", &WHAT).unwrap();
        assert_eq!(state, LifecycleState::Deleted);
        assert_eq!(outcome, DeleteOutcome::AlreadyDeleted);
    }

    #[test]
    fn restore_only_from_deleted() {
        assert_eq!(
            LifecycleState::Deleted.restore(),
            (LifecycleState::Active, true)
        );
        for state in [
            LifecycleState::Active,
            LifecycleState::Nonexistent,
            LifecycleState::Purged,
        ] {
            assert_eq!(state.restore(), (state, false));
        }
    }

    #[test]
    fn purged_is_terminal() {
        let purged = LifecycleState::Deleted.purge("Table", &WHAT).unwrap();
        assert!(purged.purge("Table", &WHAT).unwrap_err().is_not_found());
        assert!(purged.update("Table", &WHAT).unwrap_err().is_not_found());
        assert!(purged.delete("Table", &WHAT).unwrap_err().is_not_found());
        assert_eq!(purged.status(), None);
    }
}
