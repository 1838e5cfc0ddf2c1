// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The webdav service object
//!
//! One instance per process, constructed at startup with the full set of
//! resolvers and injected wherever requests are handled. Raw path strings
//! enter the tree here: they are normalized (failing closed on traversal)
//! and dispatched to the resolver with the longest matching root path.
//! Structural-change notifications fan out synchronously from here.

use std::sync::Arc;

use tracing::trace;

use crate::events::{ContainerEvent, ContainerListener, ModuleListener};
use crate::path::DavPath;
use crate::resolver::{LookupResult, WebdavResolver};

#[derive(Default)]
pub struct WebdavService {
    resolvers: Vec<Arc<dyn WebdavResolver>>,
    container_listeners: Vec<Arc<dyn ContainerListener>>,
    module_listeners: Vec<Arc<dyn ModuleListener>>,
}

impl WebdavService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resolver(&mut self, resolver: Arc<dyn WebdavResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn register_container_listener(&mut self, listener: Arc<dyn ContainerListener>) {
        self.container_listeners.push(listener);
    }

    pub fn register_module_listener(&mut self, listener: Arc<dyn ModuleListener>) {
        self.module_listeners.push(listener);
    }

    /// Resolve a raw client-supplied path. Normalization failures (escape
    /// above the root) and paths no resolver claims are both `None`.
    pub fn resolve(&self, raw: &str) -> Option<LookupResult> {
        let path = DavPath::parse(raw)?;
        self.lookup_path(&path)
    }

    pub fn lookup_path(&self, path: &DavPath) -> Option<LookupResult> {
        let resolver = self
            .resolvers
            .iter()
            .filter(|r| path.starts_with(r.root_path()))
            .max_by_key(|r| r.root_path().len())?;
        trace!(path = %path, root = %resolver.root_path(), "dispatching lookup");
        resolver.lookup_ex(path)
    }

    /// Fan a container change out to every registered listener, on the
    /// caller's thread. Callers must invoke this before the structural
    /// change is considered complete.
    pub fn container_changed(&self, evt: &ContainerEvent) {
        for listener in &self.container_listeners {
            listener.container_changed(evt);
        }
    }

    pub fn module_changed(&self) {
        for listener in &self.module_listeners {
            listener.module_changed();
        }
    }
}
