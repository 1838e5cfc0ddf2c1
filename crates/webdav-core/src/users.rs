// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The per-user home directory resolver
//!
//! Exposes one collection per known user under the resolver root, backed by
//! that user's home directory. Only the owner (and site admins) can see into
//! a home; the root listing itself requires a logged-in user.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use crate::config::WebdavConfig;
use crate::files::FileSystemResource;
use crate::path::{is_valid_segment, CiString, DavPath};
use crate::resolver::{walk, LookupResult, UnboundResource, WebdavResolver};
use crate::resource::{ResourceBase, ResourceRef, WebdavResource};
use crate::security::{Permissions, SecurityPolicy, User};

/// Directory of user accounts and their home directories.
#[cfg_attr(test, mockall::automock)]
pub trait UserDirectoryService: Send + Sync {
    fn user_names(&self) -> Vec<String>;

    fn find_user(&self, name: &str) -> Option<User>;

    fn home_dir(&self, name: &str) -> Option<PathBuf>;
}

pub struct UserResolver {
    self_ref: Weak<UserResolver>,
    root_path: DavPath,
    users: Arc<dyn UserDirectoryService>,
    config: Arc<WebdavConfig>,
}

impl UserResolver {
    pub fn new(
        root_path: DavPath,
        users: Arc<dyn UserDirectoryService>,
        config: Arc<WebdavConfig>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            root_path,
            users,
            config,
        })
    }

    fn as_resolver(&self) -> Arc<dyn WebdavResolver> {
        self.self_ref.upgrade().expect("resolver outlives its resources")
    }
}

impl WebdavResolver for UserResolver {
    fn root_path(&self) -> &DavPath {
        &self.root_path
    }

    fn root(&self) -> ResourceRef {
        Arc::new(UserRootResource {
            base: ResourceBase::new(self.root_path.clone(), None, self.config.etag_refresh()),
            resolver: self.self_ref.clone(),
        })
    }

    fn requires_login(&self) -> bool {
        true
    }

    fn allow_html_listing(&self) -> bool {
        false
    }

    fn lookup_ex(&self, path: &DavPath) -> Option<LookupResult> {
        walk(self.as_resolver(), path)
    }
}

/// The collection of user homes.
struct UserRootResource {
    base: ResourceBase,
    resolver: Weak<UserResolver>,
}

impl WebdavResource for UserRootResource {
    fn path(&self) -> &DavPath {
        self.base.path()
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn find(&self, name: &str) -> Option<ResourceRef> {
        if !is_valid_segment(name) {
            return None;
        }
        let Some(resolver) = self.resolver.upgrade() else {
            return None;
        };
        let Some(user) = resolver.users.find_user(name) else {
            return Some(Arc::new(UnboundResource::new(self.base.path().append(name))));
        };
        let Some(home) = resolver.users.home_dir(&user.name) else {
            return Some(Arc::new(UnboundResource::new(self.base.path().append(name))));
        };
        // the owner holds every permission in their own home; everyone else
        // (site admins aside) holds none
        let policy = Arc::new(SecurityPolicy::new().assign(user.id, Permissions::ALL));
        Some(Arc::new(FileSystemResource::new(
            self.base.path().append(&user.name),
            vec![home],
            Some(policy),
            resolver.config.etag_refresh(),
        )))
    }

    fn list_names(&self) -> Vec<String> {
        let Some(resolver) = self.resolver.upgrade() else {
            return Vec::new();
        };
        let mut names: Vec<CiString> =
            resolver.users.user_names().into_iter().map(CiString::new).collect();
        names.sort();
        names.into_iter().map(|n| n.as_str().to_string()).collect()
    }

    fn last_modified(&self) -> Option<i64> {
        None
    }

    fn etag(&self, force: bool) -> String {
        self.base.etag(force, 0, None)
    }

    /// Any logged-in user may see the root listing; guests may not.
    fn permissions(&self, user: &User) -> Permissions {
        if user.is_guest() {
            Permissions::NONE
        } else {
            Permissions::READ
        }
    }

    fn can_read(&self, user: &User, _for_read: bool) -> bool {
        !user.is_guest()
    }
}
