// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The web-files resolver
//!
//! Mirrors the container hierarchy like the folder resolver, but each
//! collection exposes its container's mapped filesystem directory directly:
//! child containers and the directory's files share one namespace. The whole
//! resolver is gated by a site setting and fails closed when disabled.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::WebdavConfig;
use crate::events::{ContainerEvent, ContainerListener};
use crate::files::FileSystemResource;
use crate::path::{is_valid_segment, CiString, DavPath};
use crate::resolver::{walk, LookupResult, UnboundResource, WebdavResolver};
use crate::resource::{ResourceBase, ResourceRef, WebdavResource};
use crate::security::{Container, ContainerService, Permissions, User};

pub struct WebFilesResolver {
    self_ref: Weak<WebFilesResolver>,
    root_path: DavPath,
    containers: Arc<dyn ContainerService>,
    config: Arc<WebdavConfig>,
    folder_cache: TtlCache<ResourceRef>,
    root: Mutex<Option<ResourceRef>>,
}

impl WebFilesResolver {
    pub fn new(
        root_path: DavPath,
        containers: Arc<dyn ContainerService>,
        config: Arc<WebdavConfig>,
    ) -> Arc<Self> {
        let folder_cache = TtlCache::new(
            Duration::from_millis(config.cache.folder_ttl_ms),
            Some(config.cache.folder_max_entries),
        );
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            root_path,
            containers,
            config,
            folder_cache,
            root: Mutex::new(None),
        })
    }

    fn as_resolver(&self) -> Arc<dyn WebdavResolver> {
        self.self_ref.upgrade().expect("resolver outlives its resources")
    }

    fn folder_for(&self, container: Container) -> ResourceRef {
        let path = self.root_path.join(&container.path);
        if let Some(cached) = self.folder_cache.get(&path) {
            return cached;
        }
        let resource: ResourceRef =
            Arc::new(WebFilesFolder::new(container, &self.self_ref, &self.config, path.clone()));
        self.folder_cache.put(path, resource.clone());
        resource
    }

    fn invalidate(&self, tree_path: &DavPath, recursive: bool) {
        let key = self.root_path.join(tree_path);
        self.folder_cache.remove(&key);
        if recursive {
            self.folder_cache.remove_prefix(&key);
        }
        if tree_path.is_root() {
            *self.root.lock().unwrap() = None;
        }
    }
}

impl WebdavResolver for WebFilesResolver {
    fn root_path(&self) -> &DavPath {
        &self.root_path
    }

    fn root(&self) -> ResourceRef {
        let mut root = self.root.lock().unwrap();
        if root.is_none() {
            *root = Some(Arc::new(WebFilesFolder::new(
                self.containers.root(),
                &self.self_ref,
                &self.config,
                self.root_path.clone(),
            )) as ResourceRef);
        }
        root.as_ref().expect("just built").clone()
    }

    fn lookup_ex(&self, path: &DavPath) -> Option<LookupResult> {
        if !self.config.web_files_enabled {
            return None;
        }
        walk(self.as_resolver(), path)
    }
}

impl ContainerListener for WebFilesResolver {
    fn container_changed(&self, evt: &ContainerEvent) {
        for (path, recursive) in crate::events::invalidations(evt) {
            self.invalidate(&path, recursive);
        }
    }
}

/// A container's collection in the web-files tree: child containers and the
/// mapped directory's entries in one listing, files resolved straight off
/// the directory.
pub struct WebFilesFolder {
    base: ResourceBase,
    container: Container,
    resolver: Weak<WebFilesResolver>,
    fs: Option<FileSystemResource>,
}

impl WebFilesFolder {
    fn new(
        container: Container,
        resolver: &Weak<WebFilesResolver>,
        config: &WebdavConfig,
        path: DavPath,
    ) -> Self {
        let fs = container.file_root.as_ref().map(|root| {
            FileSystemResource::new(
                path.clone(),
                vec![root.clone()],
                Some(container.policy.clone()),
                config.etag_refresh(),
            )
        });
        Self {
            base: ResourceBase::new(path, Some(container.policy.clone()), config.etag_refresh()),
            container,
            resolver: resolver.clone(),
            fs,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl WebdavResource for WebFilesFolder {
    fn path(&self) -> &DavPath {
        self.base.path()
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn find(&self, child: &str) -> Option<ResourceRef> {
        if !is_valid_segment(child) {
            return None;
        }
        let Some(resolver) = self.resolver.upgrade() else {
            return None;
        };
        let folded = child.to_lowercase();
        if let Some(container) = resolver
            .containers
            .children(&self.container)
            .into_iter()
            .find(|c| c.name.to_lowercase() == folded)
        {
            return Some(resolver.folder_for(container));
        }
        if let Some(fs) = &self.fs {
            return fs.find(child);
        }
        Some(Arc::new(UnboundResource::new(self.base.path().append(child))))
    }

    fn list_names(&self) -> Vec<String> {
        let Some(resolver) = self.resolver.upgrade() else {
            return Vec::new();
        };
        let mut names = std::collections::BTreeSet::new();
        for child in resolver.containers.children(&self.container) {
            names.insert(CiString::new(child.name));
        }
        if let Some(fs) = &self.fs {
            for name in fs.list_names() {
                names.insert(CiString::new(name));
            }
        }
        names.into_iter().map(|n| n.as_str().to_string()).collect()
    }

    fn last_modified(&self) -> Option<i64> {
        self.fs.as_ref().and_then(|fs| fs.last_modified())
    }

    fn etag(&self, force: bool) -> String {
        self.base.etag(force, 0, self.last_modified())
    }

    fn permissions(&self, user: &User) -> Permissions {
        self.base.permissions(user)
    }

    fn can_create(&self, user: &User, for_create: bool) -> bool {
        match &self.fs {
            Some(fs) => fs.can_create(user, for_create),
            None => false,
        }
    }

    fn can_write(&self, _user: &User, _for_write: bool) -> bool {
        false
    }

    fn can_delete(&self, _user: &User, _for_delete: bool) -> bool {
        false
    }
}
