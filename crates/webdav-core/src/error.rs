// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the webdav resource tree

use std::io;

/// Resolution and resource operation error type.
///
/// Note that "not found" is deliberately absent: failed lookups are values
/// (an unbound resource or `None`), never errors.
#[derive(thiserror::Error, Debug)]
pub enum DavError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("already exists")]
    AlreadyExists,
    #[error("not a collection")]
    NotACollection,
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("invalid name")]
    InvalidName,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported")]
    Unsupported,
}

pub type DavResult<T> = Result<T, DavError>;
