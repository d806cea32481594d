// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Virtual↔physical path resolution against the numbered-drive table.
//!
//! Virtual paths follow the FatFs convention: `n:/rest` names drive `n`
//! (drive 0 is the configured base directory), `/rest` is anchored at the
//! base directory, and anything else resolves against a directory category
//! read from the machine model at resolution time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::CodeError;
use crate::model::ModelStore;

/// The directory categories of the machine model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryCategory {
    Filaments,
    GCodes,
    Macros,
    System,
    Www,
}

pub struct PathResolver {
    base_directory: PathBuf,
    store: Arc<ModelStore>,
}

impl PathResolver {
    pub fn new(base_directory: impl Into<PathBuf>, store: Arc<ModelStore>) -> Self {
        Self {
            base_directory: base_directory.into(),
            store,
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Resolves a virtual path to a physical one. Relative paths resolve
    /// against the category's configured directory, which is itself a
    /// virtual path and resolved once, non-recursively. The model lock is
    /// released before this returns, so callers may open the result freely.
    pub fn to_physical(
        &self,
        virtual_path: &str,
        category: DirectoryCategory,
    ) -> Result<PathBuf, CodeError> {
        if let Some(resolved) = self.resolve_rooted(virtual_path)? {
            return Ok(resolved);
        }
        let directory = self.store.read_scope(|model| {
            match category {
                DirectoryCategory::Filaments => &model.directories.filaments,
                DirectoryCategory::GCodes => &model.directories.gcodes,
                DirectoryCategory::Macros => &model.directories.macros,
                DirectoryCategory::System => &model.directories.system,
                DirectoryCategory::Www => &model.directories.www,
            }
            .clone()
        });
        let root = self
            .resolve_rooted(&directory)?
            .unwrap_or_else(|| self.base_directory.join(&directory));
        Ok(root.join(virtual_path))
    }

    /// Maps a physical path back into the virtual namespace: `0:/…` under
    /// the base directory, `n:/…` under a storage root, `0:` + the path
    /// text otherwise.
    pub fn to_virtual(&self, physical: &Path) -> String {
        if let Ok(relative) = physical.strip_prefix(&self.base_directory) {
            return format!("0:/{}", relative.display());
        }
        let mapped = self.store.read_scope(|model| {
            for (drive, storage) in model.storages.iter().enumerate() {
                if let Some(root) = &storage.path {
                    if let Ok(relative) = physical.strip_prefix(root) {
                        return Some(format!("{drive}:/{}", relative.display()));
                    }
                }
            }
            None
        });
        mapped.unwrap_or_else(|| format!("0:{}", physical.display()))
    }

    /// Handles the drive-qualified and absolute forms; `Ok(None)` means the
    /// path is relative to a category.
    fn resolve_rooted(&self, path: &str) -> Result<Option<PathBuf>, CodeError> {
        if let Some((drive, rest)) = split_drive(path) {
            if drive == 0 {
                return Ok(Some(self.base_directory.join(rest)));
            }
            let root = self.store.read_scope(|model| {
                model
                    .storages
                    .get(drive)
                    .filter(|storage| storage.mounted)
                    .and_then(|storage| storage.path.clone())
            });
            return match root {
                Some(root) => Ok(Some(Path::new(&root).join(rest))),
                None => Err(CodeError::InvalidDrive { drive }),
            };
        }
        if let Some(rest) = path.strip_prefix('/') {
            return Ok(Some(self.base_directory.join(rest)));
        }
        Ok(None)
    }
}

/// Splits `n:/rest` (or `n:rest`) into the drive number and remainder.
fn split_drive(path: &str) -> Option<(usize, &str)> {
    let colon = path.find(':')?;
    let digits = &path[..colon];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let drive = digits.parse::<usize>().ok()?;
    let rest = path[colon + 1..].trim_start_matches('/');
    Some((drive, rest))
}
