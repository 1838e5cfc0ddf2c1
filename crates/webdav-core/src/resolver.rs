// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path resolution: the resolver contract, the shared segment walk, and the
//! unbound sentinel
//!
//! A resolver maps paths under its configured root to resources of one
//! backing store. Resolution can cross resolver boundaries through symbolic
//! links, so results carry the resolver whose semantics govern the final
//! resource.

use std::sync::Arc;

use crate::links::ReadOnlyResource;
use crate::path::DavPath;
use crate::resource::{ResourceRef, WebdavResource};
use crate::security::{Permissions, User};

/// A resolved resource paired with the resolver that produced it. The
/// resolver may differ from the one `lookup_ex` was invoked on when the walk
/// handed off through a symbolic link.
pub struct LookupResult {
    pub resource: ResourceRef,
    pub resolver: Arc<dyn WebdavResolver>,
}

pub trait WebdavResolver: Send + Sync {
    /// The absolute path this resolver is mounted at.
    fn root_path(&self) -> &DavPath;

    fn root(&self) -> ResourceRef;

    fn requires_login(&self) -> bool {
        false
    }

    fn allow_html_listing(&self) -> bool {
        true
    }

    /// Resolve `path` to a resource. `None` only when `path` is not under
    /// this resolver's root; paths that are simply absent resolve to an
    /// unbound resource, so callers cannot distinguish "outside the tree"
    /// from "not found".
    fn lookup(&self, path: &DavPath) -> Option<ResourceRef> {
        self.lookup_ex(path).map(|r| r.resource)
    }

    fn lookup_ex(&self, path: &DavPath) -> Option<LookupResult>;
}

/// The shared resolution walk.
///
/// Relativizes against the resolver's root, then descends one segment at a
/// time. A failed `find` stops the descent immediately and yields an
/// unbound resource addressed at the full requested path, so the caller can
/// report exactly what was asked for. A symbolic link hands the remaining
/// segments to its target resolver and returns that result outright.
pub(crate) fn walk(resolver: Arc<dyn WebdavResolver>, full: &DavPath) -> Option<LookupResult> {
    let rel = full.strip_prefix(resolver.root_path())?;
    let mut current = resolver.root();
    let segments = rel.segments();
    for (i, segment) in segments.iter().enumerate() {
        let next = match current.find(segment) {
            Some(r) => r,
            None => return Some(unbound(resolver, full)),
        };
        if next.is_unbound() {
            return Some(unbound(resolver, full));
        }
        if let Some(redirect) = next.redirect() {
            let target_resolver = redirect.resolver.clone().unwrap_or_else(|| resolver.clone());
            let mut target = redirect.target.clone();
            for rest in &segments[i + 1..] {
                target = target.append(rest);
            }
            let mut result = match target_resolver.lookup_ex(&target) {
                Some(r) => r,
                None => return Some(unbound(resolver, full)),
            };
            if redirect.read_only {
                result.resource = Arc::new(ReadOnlyResource::new(result.resource));
            }
            return Some(result);
        }
        current = next;
    }
    Some(LookupResult { resource: current, resolver })
}

fn unbound(resolver: Arc<dyn WebdavResolver>, full: &DavPath) -> LookupResult {
    LookupResult { resource: Arc::new(UnboundResource::new(full.clone())), resolver }
}

/// The not-found sentinel. It never exists, holds no permissions, and its
/// children are further unbound resources, so a walk that has gone unbound
/// stays unbound without special-casing at every step.
pub struct UnboundResource {
    path: DavPath,
}

impl UnboundResource {
    pub fn new(path: DavPath) -> Self {
        Self { path }
    }
}

impl WebdavResource for UnboundResource {
    fn path(&self) -> &DavPath {
        &self.path
    }

    fn exists(&self) -> bool {
        false
    }

    fn is_collection(&self) -> bool {
        false
    }

    fn is_file(&self) -> bool {
        false
    }

    fn find(&self, name: &str) -> Option<ResourceRef> {
        if !crate::path::is_valid_segment(name) {
            return None;
        }
        Some(Arc::new(UnboundResource::new(self.path.append(name))))
    }

    fn last_modified(&self) -> Option<i64> {
        None
    }

    fn etag(&self, _force: bool) -> String {
        "W/\"0-0\"".to_string()
    }

    fn permissions(&self, _user: &User) -> Permissions {
        Permissions::NONE
    }

    fn can_read(&self, _user: &User, _for_read: bool) -> bool {
        false
    }

    fn is_unbound(&self) -> bool {
        true
    }
}
