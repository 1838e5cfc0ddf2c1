// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The container-tree resolver
//!
//! Maps the platform's container hierarchy into the virtual tree: one
//! collection per container, permission checks delegated to the container's
//! security policy, and an optional fall-through into the container's mapped
//! filesystem directory. Resolved folders live in a short-TTL cache that a
//! container listener invalidates synchronously with structural changes.

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

/// Extension point for names materialized into a folder besides its child
/// containers (generated documents, mounted tool surfaces).
pub trait ChildProvider: Send + Sync {
    fn child_names(&self, container: &Container) -> Vec<String>;

    /// Resolve a contributed name to a resource addressed at `path`.
    fn resolve(&self, container: &Container, path: &DavPath, name: &str) -> Option<ResourceRef>;
}

pub struct WebFolderResolver {
    self_ref: Weak<WebFolderResolver>,
    root_path: DavPath,
    containers: Arc<dyn ContainerService>,
    providers: Vec<Arc<dyn ChildProvider>>,
    config: Arc<WebdavConfig>,
    folder_cache: TtlCache<ResourceRef>,
    root: Mutex<Option<ResourceRef>>,
}

impl WebFolderResolver {
    pub fn new(
        root_path: DavPath,
        containers: Arc<dyn ContainerService>,
        providers: Vec<Arc<dyn ChildProvider>>,
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
            providers,
            config,
            folder_cache,
            root: Mutex::new(None),
        })
    }

    fn as_resolver(&self) -> Arc<dyn WebdavResolver> {
        self.self_ref.upgrade().expect("resolver outlives its resources")
    }

    /// Build (or fetch from cache) the folder resource for a container.
    fn folder_for(&self, container: Container) -> ResourceRef {
        let path = self.root_path.join(&container.path);
        if let Some(cached) = self.folder_cache.get(&path) {
            return cached;
        }
        let resource: ResourceRef =
            Arc::new(WebFolderResource::new(container, &self.self_ref, &self.config, path.clone()));
        self.folder_cache.put(path, resource.clone());
        resource
    }

    /// Drop cache entries under a container-tree path. Root-level structural
    /// changes also force the root resource to be rebuilt.
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

impl WebdavResolver for WebFolderResolver {
    fn root_path(&self) -> &DavPath {
        &self.root_path
    }

    fn root(&self) -> ResourceRef {
        let mut root = self.root.lock().unwrap();
        if root.is_none() {
            *root = Some(Arc::new(WebFolderResource::new(
                self.containers.root(),
                &self.self_ref,
                &self.config,
                self.root_path.clone(),
            )) as ResourceRef);
        }
        root.as_ref().expect("just built").clone()
    }

    fn lookup_ex(&self, path: &DavPath) -> Option<LookupResult> {
        walk(self.as_resolver(), path)
    }
}

impl ContainerListener for WebFolderResolver {
    fn container_changed(&self, evt: &ContainerEvent) {
        for (path, recursive) in crate::events::invalidations(evt) {
            self.invalidate(&path, recursive);
        }
    }
}

pub struct WebFolderResource {
    base: ResourceBase,
    container: Container,
    resolver: Weak<WebFolderResolver>,
    /// Lazily computed folder child names (child containers + provider
    /// contributions). Bounded staleness: instances are short-lived cache
    /// entries.
    names: Mutex<Option<Vec<String>>>,
    /// Content of the container's mapped filesystem directory, when set.
    fs: Option<FileSystemResource>,
}

impl WebFolderResource {
    fn new(
        container: Container,
        resolver: &Weak<WebFolderResolver>,
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
            names: Mutex::new(None),
            fs,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    fn folder_names(&self, resolver: &Arc<WebFolderResolver>) -> Vec<String> {
        let mut slot = self.names.lock().unwrap();
        if slot.is_none() {
            let mut names: Vec<String> = resolver
                .containers
                .children(&self.container)
                .into_iter()
                .map(|c| c.name)
                .collect();
            for provider in &resolver.providers {
                names.extend(provider.child_names(&self.container));
            }
            *slot = Some(names);
        }
        slot.as_ref().expect("just computed").clone()
    }

    /// Child names a user is allowed to see.
    pub fn visible_folder_names(&self, user: &User) -> Vec<String> {
        let Some(resolver) = self.resolver.upgrade() else {
            return Vec::new();
        };
        self.folder_names(&resolver)
            .into_iter()
            .filter(|name| match self.find(name) {
                Some(r) => r.can_read(user, false),
                None => false,
            })
            .collect()
    }
}

impl WebdavResource for WebFolderResource {
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
        let matched = self
            .folder_names(&resolver)
            .into_iter()
            .find(|name| name.to_lowercase() == folded);
        let child_container = resolver
            .containers
            .children(&self.container)
            .into_iter()
            .find(|c| c.name.to_lowercase() == folded);

        if let Some(name) =
            matched.or_else(|| child_container.as_ref().map(|c| c.name.clone()))
        {
            let path = self.base.path().append(&name);
            if let Some(cached) = resolver.folder_cache.get(&path) {
                return Some(cached);
            }
            if let Some(container) = child_container {
                return Some(resolver.folder_for(container));
            }
            for provider in &resolver.providers {
                if let Some(resource) = provider.resolve(&self.container, &path, &name) {
                    resolver.folder_cache.put(path, resource.clone());
                    return Some(resource);
                }
            }
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
        for name in self.folder_names(&resolver) {
            names.insert(CiString::new(name));
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

    fn can_write(&self, _user: &User, _for_write: bool) -> bool {
        false
    }

    fn can_create(&self, user: &User, for_create: bool) -> bool {
        match &self.fs {
            Some(fs) => fs.can_create(user, for_create),
            None => false,
        }
    }

    fn can_delete(&self, _user: &User, _for_delete: bool) -> bool {
        false
    }

    fn can_rename(&self, _user: &User, _for_rename: bool) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecurityPolicy;
    use crate::testing::fixtures::TestContainerTree;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn public_read() -> Arc<SecurityPolicy> {
        Arc::new(SecurityPolicy::public_read())
    }

    fn p(s: &str) -> DavPath {
        DavPath::parse(s).unwrap()
    }

    fn setup() -> (Arc<TestContainerTree>, Arc<WebFolderResolver>) {
        let tree = Arc::new(TestContainerTree::new());
        tree.create(&DavPath::root(), "proj", public_read());
        tree.create(&p("/proj"), "sub", public_read());
        tree.create(&DavPath::root(), "other", public_read());
        let resolver = WebFolderResolver::new(
            DavPath::root(),
            tree.clone(),
            Vec::new(),
            Arc::new(WebdavConfig::default()),
        );
        (tree, resolver)
    }

    #[test]
    fn test_lookup_folders() {
        let (_tree, resolver) = setup();
        let root = resolver.lookup(&DavPath::root()).unwrap();
        assert!(root.is_collection());
        assert_eq!(root.list_names(), vec!["other", "proj"]);

        let sub = resolver.lookup(&p("/proj/sub")).unwrap();
        assert!(sub.exists());
        assert!(sub.is_collection());
        assert_eq!(sub.name(), "sub");
    }

    #[test]
    fn test_unbound_preserves_requested_path() {
        let (_tree, resolver) = setup();
        let r = resolver.lookup(&p("/nope/deep/er")).unwrap();
        assert!(!r.exists());
        assert!(r.is_unbound());
        assert_eq!(r.path().to_string(), "/nope/deep/er");
    }

    #[test]
    fn test_short_circuit_invariant() {
        let (_tree, resolver) = setup();
        let parent = resolver.lookup(&p("/proj/gone")).unwrap();
        assert!(!parent.exists());
        // once unbound, every descendant is unbound
        let child = resolver.lookup(&p("/proj/gone/anything")).unwrap();
        assert!(!child.exists());
        assert!(child.is_unbound());
    }

    #[test]
    fn test_case_insensitive_find() {
        let (_tree, resolver) = setup();
        let r = resolver.lookup(&p("/PROJ/Sub")).unwrap();
        assert!(r.exists());
        // the canonical spelling wins in the resolved path
        assert_eq!(r.path().to_string(), "/proj/sub");
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let (_tree, resolver) = setup();
        let a = resolver.lookup(&p("/proj/sub")).unwrap();
        let b = resolver.lookup(&p("/proj/sub")).unwrap();
        assert_eq!(a.exists(), b.exists());
        assert_eq!(a.is_collection(), b.is_collection());
        assert_eq!(a.content_length(), b.content_length());
    }

    #[test]
    fn test_rename_invalidates_old_and_new_paths() {
        let (tree, resolver) = setup();
        assert!(resolver.lookup(&p("/proj/sub")).unwrap().exists());

        let evt = tree.rename(&p("/proj/sub"), "renamed");
        resolver.container_changed(&evt);

        assert!(!resolver.lookup(&p("/proj/sub")).unwrap().exists());
        assert!(resolver.lookup(&p("/proj/renamed")).unwrap().exists());
        // a sibling untouched by the change still resolves
        assert!(resolver.lookup(&p("/other")).unwrap().exists());
    }

    #[test]
    fn test_delete_invalidates_subtree() {
        let (tree, resolver) = setup();
        tree.create(&p("/proj/sub"), "deep", public_read());
        assert!(resolver.lookup(&p("/proj/sub/deep")).unwrap().exists());

        let evt = tree.delete(&p("/proj/sub"));
        resolver.container_changed(&evt);

        assert!(!resolver.lookup(&p("/proj/sub")).unwrap().exists());
        assert!(!resolver.lookup(&p("/proj/sub/deep")).unwrap().exists());
        assert!(resolver.lookup(&p("/proj")).unwrap().exists());
    }

    #[test]
    fn test_created_container_shows_up() {
        let (tree, resolver) = setup();
        assert!(!resolver.lookup(&p("/fresh")).unwrap().exists());

        let evt = tree.create(&DavPath::root(), "fresh", public_read());
        resolver.container_changed(&evt);

        assert!(resolver.lookup(&p("/fresh")).unwrap().exists());
        assert!(resolver.lookup(&DavPath::root()).unwrap().list_names().contains(&"fresh".to_string()));
    }

    #[test]
    fn test_policy_change_takes_effect() {
        let (tree, resolver) = setup();
        let locked = Arc::new(SecurityPolicy::new());
        tree.create(&DavPath::root(), "sec", locked);

        let r = resolver.lookup(&p("/sec")).unwrap();
        assert!(!r.can_read(&User::guest(), true));

        let evt = tree.set_policy(&p("/sec"), public_read());
        resolver.container_changed(&evt);

        let r = resolver.lookup(&p("/sec")).unwrap();
        assert!(r.can_read(&User::guest(), true));
    }

    #[test]
    fn test_file_root_fallthrough() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.txt"), b"payload").unwrap();

        let tree = Arc::new(TestContainerTree::new());
        tree.create_with_file_root(
            &DavPath::root(),
            "proj",
            public_read(),
            Some(dir.path().to_path_buf()),
        );
        let resolver = WebFolderResolver::new(
            DavPath::root(),
            tree,
            Vec::new(),
            Arc::new(WebdavConfig::default()),
        );

        let file = resolver.lookup(&p("/proj/data.txt")).unwrap();
        assert!(file.is_file());
        let mut content = String::new();
        file.open_read(&User::guest()).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "payload");

        let folder = resolver.lookup(&p("/proj")).unwrap();
        assert_eq!(folder.list_names(), vec!["data.txt"]);
    }

    #[test]
    fn test_provider_contributed_children() {
        struct DocsProvider {
            dir: std::path::PathBuf,
        }

        impl ChildProvider for DocsProvider {
            fn child_names(&self, container: &Container) -> Vec<String> {
                if container.path.is_root() {
                    vec!["@docs".to_string()]
                } else {
                    Vec::new()
                }
            }

            fn resolve(
                &self,
                container: &Container,
                path: &DavPath,
                name: &str,
            ) -> Option<ResourceRef> {
                if name != "@docs" || !container.path.is_root() {
                    return None;
                }
                Some(Arc::new(FileSystemResource::new(
                    path.clone(),
                    vec![self.dir.clone()],
                    Some(container.policy.clone()),
                    Duration::ZERO,
                )))
            }
        }

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("readme.md"), b"# docs").unwrap();

        let tree = Arc::new(TestContainerTree::new());
        let resolver = WebFolderResolver::new(
            DavPath::root(),
            tree,
            vec![Arc::new(DocsProvider { dir: dir.path().to_path_buf() })],
            Arc::new(WebdavConfig::default()),
        );

        let docs = resolver.lookup(&p("/@docs")).unwrap();
        assert!(docs.is_collection());
        assert_eq!(docs.list_names(), vec!["readme.md"]);
        assert!(resolver.lookup(&p("/@docs/readme.md")).unwrap().is_file());
    }

    #[test]
    fn test_web_folders_are_not_mutable() {
        let (_tree, resolver) = setup();
        let r = resolver.lookup(&p("/proj")).unwrap();
        let admin = User::admin(1, "admin");
        assert!(!r.can_write(&admin, true));
        assert!(!r.can_delete(&admin, true));
        assert!(!r.can_rename(&admin, true));
    }
}
