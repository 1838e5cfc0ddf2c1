// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Users, permission bitmasks, containers and the container service boundary
//!
//! Containers are the surrounding platform's hierarchical security units.
//! This subsystem only consumes them: it never creates or persists one, and
//! reaches the real store through the [`ContainerService`] trait.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::path::DavPath;

/// Opaque user identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// An acting identity. Guests carry id 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub site_admin: bool,
}

impl User {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id: UserId(id), name: name.into(), site_admin: false }
    }

    pub fn admin(id: u64, name: impl Into<String>) -> Self {
        Self { id: UserId(id), name: name.into(), site_admin: true }
    }

    pub fn guest() -> Self {
        Self { id: UserId(0), name: "guest".to_string(), site_admin: false }
    }

    pub fn is_guest(&self) -> bool {
        self.id.0 == 0
    }
}

/// Permission bitmask resolved from a container's security policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions(pub u32);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const READ: Permissions = Permissions(0x0001);
    pub const INSERT: Permissions = Permissions(0x0002);
    pub const UPDATE: Permissions = Permissions(0x0004);
    pub const DELETE: Permissions = Permissions(0x0008);
    pub const ALL: Permissions = Permissions(0x000f);

    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersect(self, other: Permissions) -> Permissions {
        Permissions(self.0 & other.0)
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Per-container assignment of permissions to users.
#[derive(Clone, Debug, Default)]
pub struct SecurityPolicy {
    assignments: HashMap<UserId, Permissions>,
    guest: Permissions,
}

impl SecurityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy granting read to everyone, including guests.
    pub fn public_read() -> Self {
        Self { assignments: HashMap::new(), guest: Permissions::READ }
    }

    pub fn assign(mut self, user: UserId, perms: Permissions) -> Self {
        self.assignments.insert(user, perms);
        self
    }

    pub fn with_guest(mut self, perms: Permissions) -> Self {
        self.guest = perms;
        self
    }

    /// Resolve the effective bitmask for a user. Site admins hold every
    /// permission; everyone falls back to the guest grant.
    pub fn permissions(&self, user: &User) -> Permissions {
        if user.site_admin {
            return Permissions::ALL;
        }
        match self.assignments.get(&user.id) {
            Some(p) => *p | self.guest,
            None => self.guest,
        }
    }
}

/// Opaque container identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

/// A node in the platform's container (folder) tree.
#[derive(Clone, Debug)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub path: DavPath,
    pub parent: Option<ContainerId>,
    pub policy: Arc<SecurityPolicy>,
    /// Filesystem directory mapped to this container, when one is configured.
    pub file_root: Option<PathBuf>,
}

impl Container {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Read-only view of the container tree owned by the surrounding platform.
#[cfg_attr(test, mockall::automock)]
pub trait ContainerService: Send + Sync {
    fn root(&self) -> Container;

    fn for_path(&self, path: &DavPath) -> Option<Container>;

    fn children(&self, container: &Container) -> Vec<Container>;
}
