// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for the webdav resource tree

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DavError, DavResult};

/// Cache and freshness tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// TTL for resolved web-folder resources (short; structural events also
    /// invalidate eagerly).
    pub folder_ttl_ms: u64,
    pub folder_max_entries: usize,
    /// TTL for static children maps.
    pub children_ttl_ms: u64,
    pub children_max_entries: usize,
    /// TTL for the whole-resource static file cache. Unbounded in size.
    pub static_ttl_ms: u64,
    /// Minimum interval between ETag recomputations for one resource.
    pub etag_refresh_ms: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            folder_ttl_ms: 5 * 60 * 1000,
            folder_max_entries: 1000,
            children_ttl_ms: 24 * 60 * 60 * 1000,
            children_max_entries: 10_000,
            static_ttl_ms: 24 * 60 * 60 * 1000,
            etag_refresh_ms: 5000,
        }
    }
}

/// Top-level configuration for a webdav service instance.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebdavConfig {
    /// Development mode: ETags recompute on every request and static lookups
    /// probe the filesystem on cache miss so edited files show up without an
    /// invalidation event.
    pub dev_mode: bool,
    /// Additional site-local static content root, overlaid above every
    /// module's static directories.
    pub extra_webapp_dir: Option<PathBuf>,
    /// Site setting: expose container file roots through the web-files
    /// resolver at all.
    pub web_files_enabled: bool,
    pub cache: CachePolicy,
}

impl WebdavConfig {
    pub fn from_json(json: &str) -> DavResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DavError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Effective ETag refresh interval; collapses to zero in dev mode.
    pub fn etag_refresh(&self) -> Duration {
        if self.dev_mode {
            Duration::ZERO
        } else {
            Duration::from_millis(self.cache.etag_refresh_ms)
        }
    }
}
