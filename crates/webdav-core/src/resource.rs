// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The resource capability contract
//!
//! Every node in the virtual tree implements [`WebdavResource`]. The set of
//! implementations is closed: web folders, file-system resources, static
//! overlay nodes, symbolic links, the unbound sentinel, and the read-only
//! wrapper. Resources are cheap, re-creatable values produced on demand by
//! resolvers; they never own their children.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{DavError, DavResult};
use crate::path::DavPath;
use crate::resolver::WebdavResolver;
use crate::security::{Permissions, SecurityPolicy, User};

pub type ResourceRef = Arc<dyn WebdavResource>;

/// Where a symbolic link sends the resolution walk: a target path, an
/// optional target resolver (same resolver when `None`), and whether the
/// mounted subtree is writable.
#[derive(Clone)]
pub struct Redirect {
    pub target: DavPath,
    pub resolver: Option<Arc<dyn WebdavResolver>>,
    pub read_only: bool,
}

pub trait WebdavResource: Send + Sync {
    fn path(&self) -> &DavPath;

    fn name(&self) -> &str {
        self.path().name()
    }

    fn exists(&self) -> bool;

    fn is_collection(&self) -> bool;

    fn is_file(&self) -> bool {
        self.exists() && !self.is_collection()
    }

    /// Look up an immediate child. `None` means this resource cannot bind
    /// the name at all; file-backed collections instead return a
    /// not-yet-existing child so that writes can create it.
    fn find(&self, _name: &str) -> Option<ResourceRef> {
        None
    }

    /// Immediate child names of a collection; empty for everything else.
    fn list_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn list(&self) -> Vec<ResourceRef> {
        self.list_names()
            .iter()
            .filter_map(|name| self.find(name))
            .filter(|r| !r.is_unbound())
            .collect()
    }

    /// Creation time in epoch millis; `None` when the backing store does not
    /// know.
    fn created(&self) -> Option<i64> {
        self.last_modified()
    }

    fn last_modified(&self) -> Option<i64>;

    fn content_length(&self) -> u64 {
        0
    }

    /// Weak validator over length and modification time, recomputed at most
    /// once per refresh interval unless forced.
    fn etag(&self, force: bool) -> String;

    /// Effective permission bitmask for `user`, normally delegated to the
    /// owning container's security policy.
    fn permissions(&self, user: &User) -> Permissions;

    fn can_read(&self, user: &User, _for_read: bool) -> bool {
        self.path().is_root() || self.permissions(user).contains(Permissions::READ)
    }

    fn can_write(&self, user: &User, _for_write: bool) -> bool {
        self.permissions(user).contains(Permissions::UPDATE)
    }

    fn can_create(&self, user: &User, _for_create: bool) -> bool {
        self.permissions(user).contains(Permissions::INSERT)
    }

    fn can_delete(&self, user: &User, _for_delete: bool) -> bool {
        self.permissions(user).contains(Permissions::DELETE)
    }

    fn can_rename(&self, user: &User, for_rename: bool) -> bool {
        self.can_create(user, for_rename) && self.can_delete(user, for_rename)
    }

    fn open_read(&self, _user: &User) -> DavResult<Box<dyn Read + Send>> {
        Err(DavError::Unsupported)
    }

    /// Replace this resource's content from a stream, returning bytes
    /// written. Implementations that create the target must remove it again
    /// if the transfer fails; a preexisting target is never deleted.
    fn copy_from(&self, _user: &User, _src: &mut dyn Read) -> DavResult<u64> {
        Err(DavError::Unsupported)
    }

    fn delete(&self, _user: &User) -> DavResult<()> {
        Err(DavError::Unsupported)
    }

    fn set_last_modified(&self, _epoch_millis: i64) -> DavResult<()> {
        Err(DavError::Unsupported)
    }

    /// Whether the whole-resource cache may retain this resource across
    /// requests for all users.
    fn publicly_cacheable(&self) -> bool {
        false
    }

    /// The not-found sentinel answers true; see `resolver::UnboundResource`.
    fn is_unbound(&self) -> bool {
        false
    }

    /// Set for symbolic links; the resolution walk hands off through it.
    fn redirect(&self) -> Option<Redirect> {
        None
    }

    /// Root-relative href, collection paths with a trailing slash.
    fn local_href(&self, context_path: &str) -> String {
        let mut href = format!("{}{}", context_path, self.path().encoded());
        if self.is_collection() && !href.ends_with('/') {
            href.push('/');
        }
        href
    }
}

/// Cached weak-validator state. Recomputing an ETag costs an attribute
/// probe, so repeated freshness checks within the refresh window return the
/// cached string; `force` and a zero interval (dev mode) always recompute.
pub struct EtagCache {
    state: Mutex<Option<(String, Instant)>>,
    refresh: Duration,
}

impl EtagCache {
    pub fn new(refresh: Duration) -> Self {
        Self { state: Mutex::new(None), refresh }
    }

    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    pub fn get(&self, force: bool, len: u64, last_modified: Option<i64>) -> String {
        let mut state = self.state.lock().unwrap();
        if !force {
            if let Some((etag, at)) = state.as_ref() {
                if at.elapsed() < self.refresh {
                    return etag.clone();
                }
            }
        }
        let etag = format!("W/\"{}-{}\"", len, last_modified.unwrap_or(0));
        *state = Some((etag.clone(), Instant::now()));
        etag
    }
}

/// State shared by every resource variant: the absolute path, the owning
/// policy (when one applies), and the ETag cache.
pub struct ResourceBase {
    path: DavPath,
    policy: Option<Arc<SecurityPolicy>>,
    etag: EtagCache,
}

impl ResourceBase {
    pub fn new(path: DavPath, policy: Option<Arc<SecurityPolicy>>, etag_refresh: Duration) -> Self {
        Self { path, policy, etag: EtagCache::new(etag_refresh) }
    }

    pub fn path(&self) -> &DavPath {
        &self.path
    }

    pub fn policy(&self) -> Option<&Arc<SecurityPolicy>> {
        self.policy.as_ref()
    }

    pub fn permissions(&self, user: &User) -> Permissions {
        match &self.policy {
            Some(policy) => policy.permissions(user),
            None => Permissions::NONE,
        }
    }

    pub fn etag(&self, force: bool, len: u64, last_modified: Option<i64>) -> String {
        self.etag.get(force, len, last_modified)
    }

    pub fn etag_refresh(&self) -> Duration {
        self.etag.refresh()
    }
}
