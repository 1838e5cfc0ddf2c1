// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory container tree for resolver tests
//!
//! Mutators return the [`ContainerEvent`] describing the change; tests
//! forward it to whatever listener is under test, mimicking the synchronous
//! notification contract of the real container store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::events::ContainerEvent;
use crate::path::DavPath;
use crate::security::{Container, ContainerId, ContainerService, SecurityPolicy};

pub struct TestContainerTree {
    inner: Mutex<TreeInner>,
}

struct TreeInner {
    containers: HashMap<u64, Container>,
    next_id: u64,
}

impl TestContainerTree {
    pub fn new() -> Self {
        let root = Container {
            id: ContainerId(1),
            name: String::new(),
            path: DavPath::root(),
            parent: None,
            policy: Arc::new(SecurityPolicy::public_read()),
            file_root: None,
        };
        let mut containers = HashMap::new();
        containers.insert(1, root);
        Self { inner: Mutex::new(TreeInner { containers, next_id: 2 }) }
    }

    pub fn create(
        &self,
        parent: &DavPath,
        name: &str,
        policy: Arc<SecurityPolicy>,
    ) -> ContainerEvent {
        self.create_with_file_root(parent, name, policy, None)
    }

    pub fn create_with_file_root(
        &self,
        parent: &DavPath,
        name: &str,
        policy: Arc<SecurityPolicy>,
        file_root: Option<PathBuf>,
    ) -> ContainerEvent {
        let mut inner = self.inner.lock().unwrap();
        let parent_id = inner
            .containers
            .values()
            .find(|c| &c.path == parent)
            .map(|c| c.id)
            .expect("parent container exists");
        let id = ContainerId(inner.next_id);
        inner.next_id += 1;
        let path = parent.append(name);
        inner.containers.insert(
            id.0,
            Container {
                id,
                name: name.to_string(),
                path: path.clone(),
                parent: Some(parent_id),
                policy,
                file_root,
            },
        );
        ContainerEvent::Created { path }
    }

    pub fn delete(&self, path: &DavPath) -> ContainerEvent {
        let mut inner = self.inner.lock().unwrap();
        inner.containers.retain(|_, c| !c.path.starts_with(path));
        ContainerEvent::Deleted { path: path.clone() }
    }

    pub fn rename(&self, path: &DavPath, new_name: &str) -> ContainerEvent {
        let mut inner = self.inner.lock().unwrap();
        let old_name = path.name().to_string();
        let new_path = path.parent().expect("not the root").append(new_name);
        for c in inner.containers.values_mut() {
            if let Some(rel) = c.path.strip_prefix(path) {
                c.path = new_path.join(&rel);
                if rel.is_root() {
                    c.name = new_name.to_string();
                }
            }
        }
        ContainerEvent::Renamed { path: new_path, old_name }
    }

    pub fn set_policy(&self, path: &DavPath, policy: Arc<SecurityPolicy>) -> ContainerEvent {
        let mut inner = self.inner.lock().unwrap();
        for c in inner.containers.values_mut() {
            if &c.path == path {
                c.policy = policy.clone();
            }
        }
        ContainerEvent::PolicyChanged { path: path.clone() }
    }
}

impl Default for TestContainerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerService for TestContainerTree {
    fn root(&self) -> Container {
        self.inner
            .lock()
            .unwrap()
            .containers
            .values()
            .find(|c| c.parent.is_none())
            .cloned()
            .expect("root container exists")
    }

    fn for_path(&self, path: &DavPath) -> Option<Container> {
        self.inner.lock().unwrap().containers.values().find(|c| &c.path == path).cloned()
    }

    fn children(&self, container: &Container) -> Vec<Container> {
        let inner = self.inner.lock().unwrap();
        let mut children: Vec<Container> = inner
            .containers
            .values()
            .filter(|c| c.parent == Some(container.id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }
}
