// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The shared machine model, reduced to what the command layer consults:
//! the numbered-drive table and the directory categories.
//!
//! The store hands out borrow-scoped access only. Callers run a closure
//! under the read or write side of the lock and nothing can escape the
//! scope, so the lock is released on every return path.

use std::sync::{PoisonError, RwLock};

/// Directory categories, as virtual paths. Read at resolution time so
/// runtime reconfiguration is honored.
#[derive(Debug, Clone)]
pub struct Directories {
    pub filaments: String,
    pub gcodes: String,
    pub macros: String,
    pub system: String,
    pub www: String,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            filaments: "0:/filaments".to_string(),
            gcodes: "0:/gcodes".to_string(),
            macros: "0:/macros".to_string(),
            system: "0:/sys".to_string(),
            www: "0:/www".to_string(),
        }
    }
}

/// One entry of the numbered-drive table. Drive 0 is the controller's own
/// base directory and carries no path of its own.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    pub mounted: bool,
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MachineModel {
    pub directories: Directories,
    pub storages: Vec<Storage>,
}

impl Default for MachineModel {
    fn default() -> Self {
        Self {
            directories: Directories::default(),
            storages: vec![Storage {
                mounted: true,
                path: None,
            }],
        }
    }
}

/// Reader-writer store around the machine model. Multiple concurrent
/// readers or one writer; a poisoned lock recovers with the last value.
#[derive(Debug, Default)]
pub struct ModelStore {
    model: RwLock<MachineModel>,
}

impl ModelStore {
    pub fn new(model: MachineModel) -> Self {
        Self {
            model: RwLock::new(model),
        }
    }

    pub fn read_scope<T>(&self, f: impl FnOnce(&MachineModel) -> T) -> T {
        let guard = self
            .model
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write_scope<T>(&self, f: impl FnOnce(&mut MachineModel) -> T) -> T {
        let mut guard = self
            .model
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_to_readers() {
        let store = ModelStore::default();
        store.write_scope(|model| {
            model.storages.push(Storage {
                mounted: true,
                path: Some("/mnt/usb".to_string()),
            });
        });
        let path = store.read_scope(|model| model.storages[1].path.clone());
        assert_eq!(path.as_deref(), Some("/mnt/usb"));
    }

    #[test]
    fn poisoned_lock_recovers() {
        let store = ModelStore::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.write_scope(|model| {
                model.directories.gcodes = "0:/elsewhere".to_string();
                panic!("poison the lock");
            })
        }));
        assert!(result.is_err());
        let dir = store.read_scope(|model| model.directories.gcodes.clone());
        assert_eq!(dir, "0:/elsewhere");
    }

    #[test]
    fn default_model_has_drive_zero() {
        let store = ModelStore::default();
        store.read_scope(|model| {
            assert_eq!(model.storages.len(), 1);
            assert!(model.storages[0].mounted);
            assert!(model.storages[0].path.is_none());
        });
    }
}
