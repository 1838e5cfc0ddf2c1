// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Symbolic links and the read-only wrapper
//!
//! A symbolic link mounts a target path, possibly in a different resolver,
//! under a synthetic name. The resolution walk never descends through a
//! link locally; it hands the remaining segments to the target resolver, so
//! most of a link's own resource methods delegate to the resolved target.

use std::io::Read;
use std::sync::{Arc, Weak};

use crate::error::{DavError, DavResult};
use crate::path::DavPath;
use crate::resolver::WebdavResolver;
use crate::resource::{Redirect, ResourceRef, WebdavResource};
use crate::security::{Permissions, User};

pub struct SymbolicLink {
    path: DavPath,
    target: DavPath,
    /// Resolver governing the target; non-owning, since resolver lifetime
    /// strictly dominates any resource it produces.
    resolver: Weak<dyn WebdavResolver>,
    read_only: bool,
    /// Welcome-page name served when the mounted collection is requested
    /// directly.
    index: Option<String>,
}

impl SymbolicLink {
    pub fn new(
        path: DavPath,
        target: DavPath,
        resolver: &Arc<dyn WebdavResolver>,
        read_only: bool,
        index: Option<String>,
    ) -> Self {
        Self { path, target, resolver: Arc::downgrade(resolver), read_only, index }
    }

    pub fn target(&self) -> &DavPath {
        &self.target
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    fn resolve_target(&self) -> Option<ResourceRef> {
        self.resolver.upgrade()?.lookup(&self.target)
    }
}

impl WebdavResource for SymbolicLink {
    fn path(&self) -> &DavPath {
        &self.path
    }

    fn exists(&self) -> bool {
        self.resolve_target().map(|r| r.exists()).unwrap_or(false)
    }

    fn is_collection(&self) -> bool {
        self.resolve_target().map(|r| r.is_collection()).unwrap_or(false)
    }

    fn find(&self, name: &str) -> Option<ResourceRef> {
        self.resolve_target()?.find(name)
    }

    fn list_names(&self) -> Vec<String> {
        self.resolve_target().map(|r| r.list_names()).unwrap_or_default()
    }

    fn last_modified(&self) -> Option<i64> {
        self.resolve_target().and_then(|r| r.last_modified())
    }

    fn content_length(&self) -> u64 {
        self.resolve_target().map(|r| r.content_length()).unwrap_or(0)
    }

    fn etag(&self, force: bool) -> String {
        self.resolve_target()
            .map(|r| r.etag(force))
            .unwrap_or_else(|| "W/\"0-0\"".to_string())
    }

    fn permissions(&self, user: &User) -> Permissions {
        let perms =
            self.resolve_target().map(|r| r.permissions(user)).unwrap_or(Permissions::NONE);
        if self.read_only {
            perms.intersect(Permissions::READ)
        } else {
            perms
        }
    }

    fn open_read(&self, user: &User) -> DavResult<Box<dyn Read + Send>> {
        match self.resolve_target() {
            Some(r) => r.open_read(user),
            None => Err(DavError::Unsupported),
        }
    }

    fn redirect(&self) -> Option<Redirect> {
        Some(Redirect {
            target: self.target.clone(),
            resolver: self.resolver.upgrade(),
            read_only: self.read_only,
        })
    }
}

/// Wraps any resource and strips every mutating capability. Produced when a
/// read-only link's subtree is resolved; children are wrapped as well so the
/// whole mounted subtree stays read-only.
pub struct ReadOnlyResource {
    inner: ResourceRef,
}

impl ReadOnlyResource {
    pub fn new(inner: ResourceRef) -> Self {
        Self { inner }
    }
}

impl WebdavResource for ReadOnlyResource {
    fn path(&self) -> &DavPath {
        self.inner.path()
    }

    fn exists(&self) -> bool {
        self.inner.exists()
    }

    fn is_collection(&self) -> bool {
        self.inner.is_collection()
    }

    fn is_file(&self) -> bool {
        self.inner.is_file()
    }

    fn find(&self, name: &str) -> Option<ResourceRef> {
        self.inner.find(name).map(|r| Arc::new(ReadOnlyResource::new(r)) as ResourceRef)
    }

    fn list_names(&self) -> Vec<String> {
        self.inner.list_names()
    }

    fn created(&self) -> Option<i64> {
        self.inner.created()
    }

    fn last_modified(&self) -> Option<i64> {
        self.inner.last_modified()
    }

    fn content_length(&self) -> u64 {
        self.inner.content_length()
    }

    fn etag(&self, force: bool) -> String {
        self.inner.etag(force)
    }

    fn permissions(&self, user: &User) -> Permissions {
        self.inner.permissions(user).intersect(Permissions::READ)
    }

    fn can_write(&self, _user: &User, _for_write: bool) -> bool {
        false
    }

    fn can_create(&self, _user: &User, _for_create: bool) -> bool {
        false
    }

    fn can_delete(&self, _user: &User, _for_delete: bool) -> bool {
        false
    }

    fn can_rename(&self, _user: &User, _for_rename: bool) -> bool {
        false
    }

    fn open_read(&self, user: &User) -> DavResult<Box<dyn Read + Send>> {
        self.inner.open_read(user)
    }

    fn copy_from(&self, _user: &User, _src: &mut dyn Read) -> DavResult<u64> {
        Err(DavError::PermissionDenied)
    }

    fn delete(&self, _user: &User) -> DavResult<()> {
        Err(DavError::PermissionDenied)
    }

    fn set_last_modified(&self, _epoch_millis: i64) -> DavResult<()> {
        Err(DavError::PermissionDenied)
    }

    fn is_unbound(&self) -> bool {
        self.inner.is_unbound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::UnboundResource;

    #[test]
    fn test_read_only_wrapper_strips_mutation() {
        let inner: ResourceRef = Arc::new(UnboundResource::new(DavPath::parse("/x").unwrap()));
        let ro = ReadOnlyResource::new(inner);
        let user = User::admin(1, "admin");
        assert!(!ro.can_write(&user, true));
        assert!(!ro.can_create(&user, true));
        assert!(!ro.can_delete(&user, true));
        assert!(matches!(ro.delete(&user), Err(DavError::PermissionDenied)));
        let mut src: &[u8] = b"data";
        assert!(matches!(ro.copy_from(&user, &mut src), Err(DavError::PermissionDenied)));
    }
}
