//! Two-phase administrative roles.
//!
//! A holder `commit`s a successor, and the successor must `apply` before the
//! role moves. A mistyped address therefore never takes over a role.

use crate::address::Address;
use crate::error::{Classify, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Structural changes: types, gauges, checkpoint toggles.
    Ownership,
    /// Tunable values such as type and gauge weights.
    Parameter,
    /// Kill switches and emergency unlocks.
    Emergency,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ownership => "ownership admin",
            Self::Parameter => "parameter admin",
            Self::Emergency => "emergency admin",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("{caller} is not the {role}")]
    NotHolder { role: Role, caller: Address },

    #[error("{caller} is not the pending {role}")]
    NotPending { role: Role, caller: Address },

    #[error("no pending {0} to apply")]
    NothingPending(Role),
}

impl Classify for RoleError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotHolder { .. } | Self::NotPending { .. } => ErrorKind::Authorization,
            Self::NothingPending(_) => ErrorKind::State,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct RoleSlot {
    holder: Address,
    pending: Option<Address>,
}

impl RoleSlot {
    fn new(holder: &Address) -> Self {
        Self {
            holder: holder.clone(),
            pending: None,
        }
    }
}

/// The ownership, parameter and emergency roles of one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRoles {
    ownership: RoleSlot,
    parameter: RoleSlot,
    emergency: RoleSlot,
}

impl AdminRoles {
    /// All three roles start with the deployer.
    pub fn new(deployer: &Address) -> Self {
        Self {
            ownership: RoleSlot::new(deployer),
            parameter: RoleSlot::new(deployer),
            emergency: RoleSlot::new(deployer),
        }
    }

    fn slot(&self, role: Role) -> &RoleSlot {
        match role {
            Role::Ownership => &self.ownership,
            Role::Parameter => &self.parameter,
            Role::Emergency => &self.emergency,
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut RoleSlot {
        match role {
            Role::Ownership => &mut self.ownership,
            Role::Parameter => &mut self.parameter,
            Role::Emergency => &mut self.emergency,
        }
    }

    pub fn holder(&self, role: Role) -> &Address {
        &self.slot(role).holder
    }

    pub fn pending(&self, role: Role) -> Option<&Address> {
        self.slot(role).pending.as_ref()
    }

    pub fn is(&self, role: Role, who: &Address) -> bool {
        self.slot(role).holder == *who
    }

    pub fn ensure(&self, role: Role, caller: &Address) -> Result<(), RoleError> {
        if self.is(role, caller) {
            Ok(())
        } else {
            Err(RoleError::NotHolder {
                role,
                caller: caller.clone(),
            })
        }
    }

    /// Passes if `caller` holds any of `roles`; the error names the first one.
    pub fn ensure_any(&self, roles: &[Role], caller: &Address) -> Result<(), RoleError> {
        if roles.iter().any(|r| self.is(*r, caller)) {
            return Ok(());
        }
        Err(RoleError::NotHolder {
            role: roles.first().copied().unwrap_or(Role::Ownership),
            caller: caller.clone(),
        })
    }

    /// Phase one: the current holder names a successor. A later commit
    /// replaces an earlier one.
    pub fn commit(&mut self, role: Role, caller: &Address, new_holder: &Address) -> Result<(), RoleError> {
        self.ensure(role, caller)?;
        self.slot_mut(role).pending = Some(new_holder.clone());
        Ok(())
    }

    /// Phase two: the committed successor takes the role.
    pub fn apply(&mut self, role: Role, caller: &Address) -> Result<(), RoleError> {
        let slot = self.slot_mut(role);
        match &slot.pending {
            None => Err(RoleError::NothingPending(role)),
            Some(p) if p != caller => Err(RoleError::NotPending {
                role,
                caller: caller.clone(),
            }),
            Some(_) => {
                slot.holder = caller.clone();
                slot.pending = None;
                Ok(())
            }
        }
    }
}
