// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Static web asset resolver
//!
//! Overlays every module's static-content directories into one virtual
//! tree. Priority, highest first: the site's extra webapp directory, module
//! roots with dependents ahead of the modules they depend on, and the core
//! webapp directory as the final fallback. Same-named files shadow along
//! that order; same-named directories merge into one multi-root node.
//!
//! The root tree is built lazily exactly once behind a double-checked lock.
//! Children maps and resolved static files are cached aggressively; a module
//! change clears everything, and in dev mode a cache miss falls through to a
//! direct filesystem probe so edited files appear without an invalidation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use tracing::debug;

use crate::cache::TtlCache;
use crate::config::WebdavConfig;
use crate::error::{DavError, DavResult};
use crate::events::ModuleListener;
use crate::files::{FileInfo, FileKind};
use crate::links::SymbolicLink;
use crate::path::{is_valid_segment, CiString, DavPath};
use crate::resolver::{walk, LookupResult, WebdavResolver};
use crate::resource::{ResourceBase, ResourceRef, WebdavResource};
use crate::security::{Permissions, User};

/// Names never served from static roots.
const RESERVED: [&str; 2] = ["WEB-INF", "META-INF"];

#[derive(Clone, Debug)]
pub struct ModuleInfo {
    pub name: String,
    pub static_roots: Vec<PathBuf>,
}

/// View of the module system consumed by the static resolver.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleService: Send + Sync {
    /// Active modules in dependency order: dependencies before dependents.
    fn modules(&self) -> Vec<ModuleInfo>;

    /// The core webapp directory, overlaid below every module root.
    fn core_webapp_dir(&self) -> Option<PathBuf>;
}

#[derive(Clone)]
struct LinkSpec {
    target: DavPath,
    /// `None` targets this resolver; non-owning otherwise.
    resolver: Option<Weak<dyn WebdavResolver>>,
    read_only: bool,
    index: Option<String>,
}

type ChildMap = Arc<BTreeMap<CiString, ResourceRef>>;

pub struct StaticResolver {
    self_ref: Weak<StaticResolver>,
    root_path: DavPath,
    modules: Arc<dyn ModuleService>,
    config: Arc<WebdavConfig>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    root: RwLock<Option<ResourceRef>>,
    /// Mounted links keyed by the parent collection's path. Guarded by its
    /// own monitor; link state is independent of the directory-scan results.
    links: Mutex<HashMap<DavPath, BTreeMap<CiString, LinkSpec>>>,
    children_cache: TtlCache<ChildMap>,
    file_cache: TtlCache<ResourceRef>,
}

impl StaticResolver {
    pub fn new(
        root_path: DavPath,
        modules: Arc<dyn ModuleService>,
        config: Arc<WebdavConfig>,
    ) -> Arc<Self> {
        let children_cache = TtlCache::new(
            Duration::from_millis(config.cache.children_ttl_ms),
            Some(config.cache.children_max_entries),
        );
        let file_cache = TtlCache::new(Duration::from_millis(config.cache.static_ttl_ms), None);
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            root_path,
            modules,
            config,
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            root: RwLock::new(None),
            links: Mutex::new(HashMap::new()),
            children_cache,
            file_cache,
        })
    }

    fn as_resolver(&self) -> Arc<dyn WebdavResolver> {
        self.self_ref.upgrade().expect("resolver outlives its resources")
    }

    /// All static roots, highest priority first.
    fn collect_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(extra) = &self.config.extra_webapp_dir {
            if extra.is_dir() {
                roots.push(extra.clone());
            }
        }
        let mut modules = self.modules.modules();
        // dependents shadow the modules they depend on
        modules.reverse();
        for module in modules {
            for root in module.static_roots {
                if root.is_dir() {
                    roots.push(root);
                }
            }
        }
        if let Some(core) = self.modules.core_webapp_dir() {
            if core.is_dir() {
                roots.push(core);
            }
        }
        roots
    }

    fn get_root(&self) -> ResourceRef {
        if self.initialized.load(Ordering::Acquire) {
            if let Some(root) = self.root.read().unwrap().clone() {
                return root;
            }
        }
        let _guard = self.init_lock.lock().unwrap();
        if let Some(root) = self.root.read().unwrap().clone() {
            return root;
        }
        let roots = self.collect_roots();
        debug!(count = roots.len(), "building static resource tree");
        let root: ResourceRef = Arc::new(StaticResource::new(
            self.root_path.clone(),
            roots,
            &self.self_ref,
            self.config.etag_refresh(),
        ));
        *self.root.write().unwrap() = Some(root.clone());
        self.initialized.store(true, Ordering::Release);
        root
    }

    /// Mount `target` under the synthetic name `from`. The source must not
    /// exist, its parent must be an existing collection, and a link must not
    /// be an ancestor of its own target in this resolver (mount loop).
    pub fn add_link(
        &self,
        from: DavPath,
        target: DavPath,
        target_resolver: Option<&Arc<dyn WebdavResolver>>,
        read_only: bool,
        index: Option<String>,
    ) -> DavResult<()> {
        if from == self.root_path || from.strip_prefix(&self.root_path).is_none() {
            return Err(DavError::Conflict("link source must be below the resolver root"));
        }
        if target_resolver.is_none() && target.starts_with(&from) {
            return Err(DavError::Conflict("link would be an ancestor of its own target"));
        }
        if self.lookup(&from).map(|r| r.exists()).unwrap_or(false) {
            return Err(DavError::AlreadyExists);
        }
        let parent = from.parent().expect("non-root path has a parent");
        match self.lookup(&parent) {
            Some(r) if r.exists() && r.is_collection() => {}
            _ => return Err(DavError::NotACollection),
        }

        let name = from.name().to_string();
        {
            let mut links = self.links.lock().unwrap();
            let entry = links.entry(parent.clone()).or_default();
            if entry.contains_key(&CiString::new(name.as_str())) {
                return Err(DavError::AlreadyExists);
            }
            entry.insert(
                CiString::new(name),
                LinkSpec {
                    target,
                    resolver: target_resolver.map(Arc::downgrade),
                    read_only,
                    index,
                },
            );
        }
        // evict rather than repopulate; the next reader rebuilds with the
        // link visible
        self.children_cache.remove(&parent);
        self.file_cache.remove_prefix(&from);
        Ok(())
    }

    pub fn remove_link(&self, from: &DavPath) -> DavResult<()> {
        let parent = match from.parent() {
            Some(p) => p,
            None => return Err(DavError::Conflict("no link at the resolver root")),
        };
        let removed = {
            let mut links = self.links.lock().unwrap();
            match links.get_mut(&parent) {
                Some(entry) => {
                    let removed = entry.remove(&CiString::new(from.name()));
                    if entry.is_empty() {
                        links.remove(&parent);
                    }
                    removed.is_some()
                }
                None => false,
            }
        };
        if !removed {
            return Err(DavError::Conflict("no such link"));
        }
        self.children_cache.remove(&parent);
        self.file_cache.remove_prefix(from);
        Ok(())
    }

    fn links_under(&self, parent: &DavPath) -> Vec<(CiString, LinkSpec)> {
        self.links
            .lock()
            .unwrap()
            .get(parent)
            .map(|entry| entry.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn materialize_link(&self, path: DavPath, spec: &LinkSpec) -> Option<ResourceRef> {
        let resolver: Arc<dyn WebdavResolver> = match &spec.resolver {
            Some(weak) => weak.upgrade()?,
            None => self.as_resolver(),
        };
        Some(Arc::new(SymbolicLink::new(
            path,
            spec.target.clone(),
            &resolver,
            spec.read_only,
            spec.index.clone(),
        )))
    }
}

impl WebdavResolver for StaticResolver {
    fn root_path(&self) -> &DavPath {
        &self.root_path
    }

    fn root(&self) -> ResourceRef {
        self.get_root()
    }

    fn allow_html_listing(&self) -> bool {
        false
    }

    fn lookup_ex(&self, path: &DavPath) -> Option<LookupResult> {
        if let Some(cached) = self.file_cache.get(path) {
            return Some(LookupResult { resource: cached, resolver: self.as_resolver() });
        }
        let result = walk(self.as_resolver(), path)?;
        if result.resource.publicly_cacheable() {
            self.file_cache.put(path.clone(), result.resource.clone());
        }
        Some(result)
    }
}

impl ModuleListener for StaticResolver {
    fn module_changed(&self) {
        let _guard = self.init_lock.lock().unwrap();
        *self.root.write().unwrap() = None;
        self.initialized.store(false, Ordering::Release);
        self.children_cache.clear();
        self.file_cache.clear();
        debug!("static resolver caches cleared after module change");
    }
}

/// One node of the static overlay: a file backed by the highest-priority
/// root that carries it, or a directory merged from every root that does.
pub struct StaticResource {
    base: ResourceBase,
    roots: Vec<PathBuf>,
    resolver: Weak<StaticResolver>,
    info: Mutex<Option<FileInfo>>,
    /// Serializes the children scan for this node; the cache stays the
    /// source of truth and is re-checked under the lock.
    build_lock: Mutex<()>,
}

enum Pending {
    File(PathBuf),
    Dir(Vec<PathBuf>),
}

impl StaticResource {
    fn new(
        path: DavPath,
        roots: Vec<PathBuf>,
        resolver: &Weak<StaticResolver>,
        etag_refresh: Duration,
    ) -> Self {
        Self {
            base: ResourceBase::new(path, None, etag_refresh),
            roots,
            resolver: resolver.clone(),
            info: Mutex::new(None),
            build_lock: Mutex::new(()),
        }
    }

    fn info(&self) -> FileInfo {
        let mut slot = self.info.lock().unwrap();
        match *slot {
            Some(info) => info,
            None => {
                let info = FileInfo::probe(&self.roots);
                *slot = Some(info);
                info
            }
        }
    }

    fn allowed_name(name: &str) -> bool {
        !name.starts_with('.') && !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
    }

    fn children(&self) -> ChildMap {
        let Some(resolver) = self.resolver.upgrade() else {
            return Arc::new(BTreeMap::new());
        };
        let path = self.base.path();
        if let Some(map) = resolver.children_cache.get(path) {
            return map;
        }
        let _guard = self.build_lock.lock().unwrap();
        if let Some(map) = resolver.children_cache.get(path) {
            return map;
        }
        let map: ChildMap = Arc::new(self.scan(&resolver));
        resolver.children_cache.put(path.clone(), map.clone());
        map
    }

    fn scan(&self, resolver: &Arc<StaticResolver>) -> BTreeMap<CiString, ResourceRef> {
        let mut pending: BTreeMap<CiString, Pending> = BTreeMap::new();
        for root in &self.roots {
            let Ok(entries) = fs::read_dir(root) else { continue };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !Self::allowed_name(&name) {
                    continue;
                }
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                match pending.entry(CiString::new(name)) {
                    std::collections::btree_map::Entry::Vacant(slot) => {
                        slot.insert(if is_dir {
                            Pending::Dir(vec![entry.path()])
                        } else {
                            Pending::File(entry.path())
                        });
                    }
                    // directories overlay across roots; files shadow, the
                    // first (highest-priority) root wins
                    std::collections::btree_map::Entry::Occupied(mut slot) => {
                        if let Pending::Dir(dirs) = slot.get_mut() {
                            if is_dir {
                                dirs.push(entry.path());
                            }
                        }
                    }
                }
            }
        }

        let mut map = BTreeMap::new();
        for (key, pend) in pending {
            let child_path = self.base.path().append(key.as_str());
            let roots = match pend {
                Pending::File(file) => vec![file],
                Pending::Dir(dirs) => dirs,
            };
            let child: ResourceRef = Arc::new(StaticResource::new(
                child_path,
                roots,
                &self.resolver,
                self.base.etag_refresh(),
            ));
            map.insert(key, child);
        }
        // mounted links cannot collide with real entries: creation requires
        // the source not to exist
        for (key, spec) in resolver.links_under(self.base.path()) {
            let link_path = self.base.path().append(key.as_str());
            if let Some(link) = resolver.materialize_link(link_path, &spec) {
                map.insert(key, link);
            }
        }
        map
    }

    /// Dev-mode fallback: look straight at the filesystem so a freshly added
    /// file is served without waiting for cache invalidation.
    fn probe_uncached(&self, name: &str) -> Option<ResourceRef> {
        let candidates: Vec<PathBuf> =
            self.roots.iter().map(|r| r.join(name)).filter(|p| p.exists()).collect();
        if candidates.is_empty() {
            return None;
        }
        Some(Arc::new(StaticResource::new(
            self.base.path().append(name),
            candidates,
            &self.resolver,
            self.base.etag_refresh(),
        )))
    }
}

impl WebdavResource for StaticResource {
    fn path(&self) -> &DavPath {
        self.base.path()
    }

    fn exists(&self) -> bool {
        self.info().kind != FileKind::NotPresent
    }

    fn is_collection(&self) -> bool {
        self.info().kind == FileKind::Directory
    }

    fn is_file(&self) -> bool {
        self.info().kind == FileKind::File
    }

    fn find(&self, name: &str) -> Option<ResourceRef> {
        if !is_valid_segment(name) || !Self::allowed_name(name) {
            return None;
        }
        if let Some(child) = self.children().get(&CiString::new(name)) {
            return Some(child.clone());
        }
        let dev_mode = self.resolver.upgrade().map(|r| r.config.dev_mode).unwrap_or(false);
        if dev_mode {
            return self.probe_uncached(name);
        }
        None
    }

    fn list_names(&self) -> Vec<String> {
        if !self.is_collection() {
            return Vec::new();
        }
        self.children().keys().map(|k| k.as_str().to_string()).collect()
    }

    fn created(&self) -> Option<i64> {
        self.info().created
    }

    fn last_modified(&self) -> Option<i64> {
        self.info().modified
    }

    fn content_length(&self) -> u64 {
        self.info().len
    }

    fn etag(&self, force: bool) -> String {
        let info = self.info();
        self.base.etag(force, info.len, info.modified)
    }

    /// Static content is world readable and never writable.
    fn permissions(&self, _user: &User) -> Permissions {
        Permissions::READ
    }

    fn open_read(&self, _user: &User) -> DavResult<Box<dyn Read + Send>> {
        let path = self
            .roots
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| DavError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))?;
        Ok(Box::new(fs::File::open(path)?))
    }

    fn publicly_cacheable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn p(s: &str) -> DavPath {
        DavPath::parse(s).unwrap()
    }

    /// Module service over fixed directories, counting how often the module
    /// list is scanned.
    struct FixedModules {
        modules: Vec<ModuleInfo>,
        core: Option<PathBuf>,
        scans: AtomicUsize,
    }

    impl FixedModules {
        fn new(modules: Vec<ModuleInfo>, core: Option<PathBuf>) -> Self {
            Self { modules, core, scans: AtomicUsize::new(0) }
        }
    }

    impl ModuleService for FixedModules {
        fn modules(&self) -> Vec<ModuleInfo> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.modules.clone()
        }

        fn core_webapp_dir(&self) -> Option<PathBuf> {
            self.core.clone()
        }
    }

    fn module(name: &str, root: &std::path::Path) -> ModuleInfo {
        ModuleInfo { name: name.to_string(), static_roots: vec![root.to_path_buf()] }
    }

    fn read_all(r: &ResourceRef) -> String {
        let mut out = String::new();
        r.open_read(&User::guest()).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    /// Two modules where `ext` depends on `base`; dependency order lists
    /// `base` first, so after reversal `ext` shadows `base`.
    fn two_modules() -> (TempDir, TempDir, Arc<StaticResolver>) {
        let base = TempDir::new().unwrap();
        let ext = TempDir::new().unwrap();
        fs::write(base.path().join("index.html"), b"from base").unwrap();
        fs::write(ext.path().join("index.html"), b"from ext").unwrap();
        fs::create_dir(base.path().join("assets")).unwrap();
        fs::create_dir(ext.path().join("assets")).unwrap();
        fs::write(base.path().join("assets").join("base.css"), b"b").unwrap();
        fs::write(ext.path().join("assets").join("ext.css"), b"e").unwrap();

        let modules = Arc::new(FixedModules::new(
            vec![module("base", base.path()), module("ext", ext.path())],
            None,
        ));
        let resolver = StaticResolver::new(
            DavPath::root(),
            modules,
            Arc::new(WebdavConfig::default()),
        );
        (base, ext, resolver)
    }

    #[test]
    fn test_dependent_module_shadows_dependency() {
        let (_base, _ext, resolver) = two_modules();
        let index = resolver.lookup(&p("/index.html")).unwrap();
        assert!(index.is_file());
        assert_eq!(read_all(&index), "from ext");
    }

    #[test]
    fn test_extra_webapp_dir_has_highest_priority() {
        let base = TempDir::new().unwrap();
        let extra = TempDir::new().unwrap();
        fs::write(base.path().join("index.html"), b"from base").unwrap();
        fs::write(extra.path().join("index.html"), b"from extra").unwrap();

        let config = WebdavConfig {
            extra_webapp_dir: Some(extra.path().to_path_buf()),
            ..Default::default()
        };
        let resolver = StaticResolver::new(
            DavPath::root(),
            Arc::new(FixedModules::new(vec![module("base", base.path())], None)),
            Arc::new(config),
        );
        let index = resolver.lookup(&p("/index.html")).unwrap();
        assert_eq!(read_all(&index), "from extra");
    }

    #[test]
    fn test_same_named_directories_merge() {
        let (_base, _ext, resolver) = two_modules();
        let assets = resolver.lookup(&p("/assets")).unwrap();
        assert!(assets.is_collection());
        assert_eq!(assets.list_names(), vec!["base.css", "ext.css"]);
        assert!(resolver.lookup(&p("/assets/base.css")).unwrap().is_file());
        assert!(resolver.lookup(&p("/assets/ext.css")).unwrap().is_file());
    }

    #[test]
    fn test_reserved_and_hidden_names_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("WEB-INF")).unwrap();
        fs::write(dir.path().join("WEB-INF").join("web.xml"), b"x").unwrap();
        fs::write(dir.path().join(".hidden"), b"x").unwrap();
        fs::write(dir.path().join("ok.txt"), b"x").unwrap();

        let resolver = StaticResolver::new(
            DavPath::root(),
            Arc::new(FixedModules::new(vec![module("m", dir.path())], None)),
            Arc::new(WebdavConfig::default()),
        );
        let root = resolver.lookup(&DavPath::root()).unwrap();
        assert_eq!(root.list_names(), vec!["ok.txt"]);
        assert!(!resolver.lookup(&p("/WEB-INF/web.xml")).unwrap().exists());
        assert!(!resolver.lookup(&p("/.hidden")).unwrap().exists());
    }

    #[test]
    fn test_case_insensitive_static_lookup() {
        let (_base, _ext, resolver) = two_modules();
        let index = resolver.lookup(&p("/INDEX.html")).unwrap();
        assert!(index.is_file());
        assert_eq!(read_all(&index), "from ext");
    }

    #[test]
    fn test_dev_mode_probes_past_stale_cache() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("old.txt"), b"old").unwrap();
        let modules = Arc::new(FixedModules::new(vec![module("m", dir.path())], None));

        let cold = StaticResolver::new(
            DavPath::root(),
            modules.clone(),
            Arc::new(WebdavConfig::default()),
        );
        // populate the children cache, then add a file behind its back
        assert!(cold.lookup(&p("/old.txt")).unwrap().exists());
        fs::write(dir.path().join("new.txt"), b"new").unwrap();
        assert!(!cold.lookup(&p("/new.txt")).unwrap().exists());

        let dev = StaticResolver::new(
            DavPath::root(),
            modules,
            Arc::new(WebdavConfig { dev_mode: true, ..Default::default() }),
        );
        assert!(dev.lookup(&p("/old.txt")).unwrap().exists());
        fs::write(dir.path().join("newer.txt"), b"newer").unwrap();
        let newer = dev.lookup(&p("/newer.txt")).unwrap();
        assert!(newer.is_file());
        assert_eq!(read_all(&newer), "newer");
    }

    #[test]
    fn test_module_change_invalidates_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let resolver = StaticResolver::new(
            DavPath::root(),
            Arc::new(FixedModules::new(vec![module("m", dir.path())], None)),
            Arc::new(WebdavConfig::default()),
        );
        assert!(resolver.lookup(&p("/a.txt")).unwrap().exists());
        assert!(!resolver.lookup(&p("/b.txt")).unwrap().exists());

        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        // still the cached negative until the module system notifies
        assert!(!resolver.lookup(&p("/b.txt")).unwrap().exists());
        resolver.module_changed();
        assert!(resolver.lookup(&p("/b.txt")).unwrap().exists());
    }

    #[test]
    fn test_add_link_mounts_target() {
        let (_base, _ext, resolver) = two_modules();
        resolver.add_link(p("/I"), p("/assets"), None, false, None).unwrap();

        let mounted = resolver.lookup(&p("/I")).unwrap();
        assert!(mounted.is_collection());
        assert_eq!(mounted.list_names(), resolver.lookup(&p("/assets")).unwrap().list_names());

        let through = resolver.lookup(&p("/I/base.css")).unwrap();
        assert!(through.is_file());
        assert_eq!(read_all(&through), read_all(&resolver.lookup(&p("/assets/base.css")).unwrap()));

        resolver.remove_link(&p("/I")).unwrap();
        assert!(!resolver.lookup(&p("/I")).unwrap().exists());
        assert!(resolver.remove_link(&p("/I")).is_err());
    }

    #[test]
    fn test_link_constraints() {
        let (_base, _ext, resolver) = two_modules();
        // source already exists
        assert!(matches!(
            resolver.add_link(p("/index.html"), p("/assets"), None, false, None),
            Err(DavError::AlreadyExists)
        ));
        // parent of the source does not exist
        assert!(matches!(
            resolver.add_link(p("/missing/I"), p("/assets"), None, false, None),
            Err(DavError::NotACollection)
        ));
        // the resolver root cannot be mounted over
        assert!(resolver.add_link(DavPath::root(), p("/assets"), None, false, None).is_err());
        // a link must not be an ancestor of its own target
        assert!(matches!(
            resolver.add_link(p("/I"), p("/I/sub"), None, false, None),
            Err(DavError::Conflict(_))
        ));
        // duplicate link names collide
        resolver.add_link(p("/I"), p("/assets"), None, false, None).unwrap();
        assert!(matches!(
            resolver.add_link(p("/I"), p("/assets"), None, false, None),
            Err(DavError::AlreadyExists)
        ));
    }

    #[test]
    fn test_read_only_link_strips_write_access() {
        let (_base, _ext, resolver) = two_modules();
        resolver.add_link(p("/ro"), p("/assets"), None, true, None).unwrap();
        let through = resolver.lookup(&p("/ro/base.css")).unwrap();
        assert!(through.is_file());
        let admin = User::admin(1, "admin");
        assert!(!through.can_write(&admin, true));
        let mut src: &[u8] = b"overwrite";
        assert!(matches!(through.copy_from(&admin, &mut src), Err(DavError::PermissionDenied)));
    }

    #[test]
    fn test_concurrent_init_builds_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let modules = Arc::new(FixedModules::new(vec![module("m", dir.path())], None));
        let resolver = StaticResolver::new(
            DavPath::root(),
            modules.clone(),
            Arc::new(WebdavConfig::default()),
        );

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || {
                    let root = resolver.lookup(&DavPath::root()).unwrap();
                    assert!(root.is_collection());
                    assert_eq!(root.list_names(), vec!["a.txt"]);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(modules.scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_static_file_metadata() {
        let (_base, _ext, resolver) = two_modules();
        let index = resolver.lookup(&p("/index.html")).unwrap();
        assert_eq!(index.content_length(), 8);
        assert!(index.last_modified().is_some());
        let etag = index.etag(true);
        assert!(etag.starts_with("W/\"8-"));
        assert!(index.publicly_cacheable());
        assert!(!index.can_write(&User::admin(1, "admin"), true));
    }
}
