// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File-system backed resources
//!
//! A [`FileSystemResource`] is addressed by one or more candidate backing
//! paths in priority order: the first path that exists on disk supplies the
//! resource's type and attributes, and when none exists the resource reports
//! not-present. Attributes are probed lazily, at most once, including the
//! negative case; any mutation through this resource invalidates the cached
//! probe.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::{DavError, DavResult};
use crate::path::{is_valid_segment, CiString, DavPath};
use crate::resource::{ResourceBase, ResourceRef, WebdavResource};
use crate::security::{Permissions, SecurityPolicy, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FileKind {
    File,
    Directory,
    NotPresent,
}

/// One probe's worth of attributes. The not-present sentinel is cached just
/// like a positive result so repeated existence checks after a miss cost no
/// further syscalls.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FileInfo {
    pub kind: FileKind,
    pub len: u64,
    pub modified: Option<i64>,
    pub created: Option<i64>,
}

impl FileInfo {
    pub(crate) const NOT_PRESENT: FileInfo =
        FileInfo { kind: FileKind::NotPresent, len: 0, modified: None, created: None };

    /// Stat the candidate paths in order; the first that exists wins, and
    /// its type wins file-vs-directory ties between roots.
    pub(crate) fn probe(paths: &[PathBuf]) -> FileInfo {
        for path in paths {
            if let Ok(md) = fs::metadata(path) {
                let modified = md.modified().ok().and_then(epoch_millis);
                return FileInfo {
                    kind: if md.is_dir() { FileKind::Directory } else { FileKind::File },
                    len: if md.is_dir() { 0 } else { md.len() },
                    modified,
                    created: md.created().ok().and_then(epoch_millis).or(modified),
                };
            }
        }
        FileInfo::NOT_PRESENT
    }
}

fn epoch_millis(t: SystemTime) -> Option<i64> {
    t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis() as i64)
}

#[cfg(unix)]
fn os_allows(path: &Path, write: bool) -> bool {
    use std::os::unix::ffi::OsStrExt;
    let Ok(cpath) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    let mode = if write { libc::W_OK } else { libc::R_OK };
    unsafe { libc::access(cpath.as_ptr(), mode) == 0 }
}

#[cfg(not(unix))]
fn os_allows(path: &Path, write: bool) -> bool {
    match fs::metadata(path) {
        Ok(md) => !write || !md.permissions().readonly(),
        Err(_) => false,
    }
}

pub struct FileSystemResource {
    base: ResourceBase,
    files: Vec<PathBuf>,
    info: Mutex<Option<FileInfo>>,
}

impl FileSystemResource {
    pub fn new(
        path: DavPath,
        files: Vec<PathBuf>,
        policy: Option<Arc<SecurityPolicy>>,
        etag_refresh: Duration,
    ) -> Self {
        Self { base: ResourceBase::new(path, policy, etag_refresh), files, info: Mutex::new(None) }
    }

    /// A child resource under every candidate root of `self`.
    pub fn child(&self, name: &str) -> FileSystemResource {
        FileSystemResource::new(
            self.base.path().append(name),
            self.files.iter().map(|f| f.join(name)).collect(),
            self.base.policy().cloned(),
            self.base.etag_refresh(),
        )
    }

    fn info(&self) -> FileInfo {
        let mut slot = self.info.lock().unwrap();
        match *slot {
            Some(info) => info,
            None => {
                let info = FileInfo::probe(&self.files);
                *slot = Some(info);
                info
            }
        }
    }

    pub(crate) fn invalidate(&self) {
        *self.info.lock().unwrap() = None;
    }

    /// The backing path used for reads and writes: the first existing
    /// candidate, or the first candidate when none exists yet.
    fn primary(&self) -> Option<&PathBuf> {
        self.files.iter().find(|f| f.exists()).or_else(|| self.files.first())
    }

    fn os_check(&self, user: &User, write: bool) -> bool {
        // only meaningful for a real file we are about to touch
        let Some(path) = self.files.iter().find(|f| f.exists()) else {
            return true;
        };
        if os_allows(path, write) {
            return true;
        }
        // the application policy says yes but the OS says no; treat as a
        // configuration anomaly and deny
        warn!(
            user = %user.name,
            path = %path.display(),
            write,
            "filesystem permissions contradict the security policy; denying"
        );
        false
    }
}

impl WebdavResource for FileSystemResource {
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
        if !is_valid_segment(name) {
            return None;
        }
        Some(Arc::new(self.child(name)))
    }

    fn list_names(&self) -> Vec<String> {
        if !self.is_collection() {
            return Vec::new();
        }
        let mut names = std::collections::BTreeSet::new();
        for root in &self.files {
            let Ok(entries) = fs::read_dir(root) else { continue };
            for entry in entries.flatten() {
                names.insert(CiString::new(entry.file_name().to_string_lossy().into_owned()));
            }
        }
        names.into_iter().map(|n| n.as_str().to_string()).collect()
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

    fn permissions(&self, user: &User) -> Permissions {
        self.base.permissions(user)
    }

    fn can_read(&self, user: &User, for_read: bool) -> bool {
        if !self.permissions(user).contains(Permissions::READ) {
            return false;
        }
        if !for_read || !self.is_file() {
            return true;
        }
        self.os_check(user, false)
    }

    fn can_write(&self, user: &User, for_write: bool) -> bool {
        if !self.permissions(user).contains(Permissions::UPDATE) {
            return false;
        }
        if !for_write || !self.is_file() {
            return true;
        }
        self.os_check(user, true)
    }

    fn can_delete(&self, user: &User, for_delete: bool) -> bool {
        if !self.permissions(user).contains(Permissions::DELETE) {
            return false;
        }
        if !for_delete || !self.exists() {
            return true;
        }
        self.os_check(user, true)
    }

    fn open_read(&self, user: &User) -> DavResult<Box<dyn Read + Send>> {
        if !self.can_read(user, true) {
            return Err(DavError::PermissionDenied);
        }
        let path = self
            .files
            .iter()
            .find(|f| f.is_file())
            .ok_or_else(|| DavError::Io(io::Error::from(io::ErrorKind::NotFound)))?;
        Ok(Box::new(fs::File::open(path)?))
    }

    fn copy_from(&self, user: &User, src: &mut dyn Read) -> DavResult<u64> {
        let allowed = if self.exists() {
            self.can_write(user, true)
        } else {
            self.can_create(user, true)
        };
        if !allowed {
            return Err(DavError::PermissionDenied);
        }
        let target = self.primary().ok_or(DavError::Unsupported)?.clone();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let created = !target.exists();
        let result = (|| -> io::Result<u64> {
            let mut out = fs::File::create(&target)?;
            io::copy(src, &mut out)
        })();
        self.invalidate();
        match result {
            Ok(len) => Ok(len),
            Err(e) => {
                // a failed transfer removes the file only if this call
                // created it; a preexisting file is never deleted
                if created {
                    let _ = fs::remove_file(&target);
                    self.invalidate();
                }
                Err(e.into())
            }
        }
    }

    fn delete(&self, user: &User) -> DavResult<()> {
        if !self.can_delete(user, true) {
            return Err(DavError::PermissionDenied);
        }
        let Some(path) = self.files.iter().find(|f| f.exists()) else {
            return Ok(());
        };
        let result = if path.is_dir() { fs::remove_dir(path) } else { fs::remove_file(path) };
        self.invalidate();
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "could not delete file");
            return Err(e.into());
        }
        Ok(())
    }

    fn set_last_modified(&self, epoch_millis: i64) -> DavResult<()> {
        let Some(path) = self.files.iter().find(|f| f.exists()) else {
            return Err(DavError::Io(io::Error::from(io::ErrorKind::NotFound)));
        };
        let file = fs::File::open(path)?;
        let time = UNIX_EPOCH + std::time::Duration::from_millis(epoch_millis.max(0) as u64);
        file.set_modified(time)?;
        self.invalidate();
        Ok(())
    }
}
