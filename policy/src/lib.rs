//! # Access Policy
//!
//! Ownership-based access control for IPC channels.
//!
//! ## Philosophy
//!
//! - **Policy observes; it does not own**: the registry owns channels and
//!   asks the policy a yes/no question before dispatching.
//! - **Explicit and testable**: `check` is a pure function of the
//!   descriptor, the operation, the requestor and the enforcement flag.
//! - **Permissive by default**: enforcement starts disabled; a resource
//!   with no descriptor is public even when enforcement is on.

use core_types::PrincipalId;
use ipc::OpCode;
use serde::{Deserialize, Serialize};

/// Access-control descriptor attached to a channel
///
/// Absence of a descriptor means the channel is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDescriptor {
    /// The principal that owns the resource
    pub owner: PrincipalId,
}

impl AccessDescriptor {
    /// Creates a descriptor owned by the given principal
    pub fn owned_by(owner: impl Into<PrincipalId>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

impl From<&str> for AccessDescriptor {
    fn from(owner: &str) -> Self {
        Self::owned_by(PrincipalId::new(owner))
    }
}

/// Evaluates whether a principal may operate on a resource
///
/// The rules apply in order: enforcement disabled permits everything; a
/// missing descriptor permits (public resource); the superuser permits;
/// the owner permits; everyone else is denied.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    enforced: bool,
    superuser: PrincipalId,
}

impl AccessPolicy {
    /// Creates a policy with enforcement disabled and `admin` as superuser
    pub fn new() -> Self {
        Self {
            enforced: false,
            superuser: PrincipalId::new("admin"),
        }
    }

    /// Creates a policy with a specific superuser principal
    pub fn with_superuser(superuser: impl Into<PrincipalId>) -> Self {
        Self {
            enforced: false,
            superuser: superuser.into(),
        }
    }

    /// Returns whether enforcement is currently enabled
    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Enables or disables enforcement
    pub fn set_enforced(&mut self, enforced: bool) {
        self.enforced = enforced;
    }

    /// Flips the enforcement flag and returns the new state
    pub fn toggle(&mut self) -> bool {
        self.enforced = !self.enforced;
        self.enforced
    }

    /// Decides whether `requestor` may perform `_op` on the resource
    ///
    /// Pure and side-effect free. All current operations are read/write
    /// class and restricted alike, so the operation does not change the
    /// outcome today; it is part of the contract for finer-grained rules.
    pub fn check(
        &self,
        descriptor: Option<&AccessDescriptor>,
        _op: OpCode,
        requestor: &PrincipalId,
    ) -> bool {
        if !self.enforced {
            return true;
        }
        let Some(descriptor) = descriptor else {
            return true;
        };
        if *requestor == self.superuser {
            return true;
        }
        descriptor.owner == *requestor
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new()
    }
}
