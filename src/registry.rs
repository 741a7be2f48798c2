/*
 *  registry.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Live mapping of cell id to display handle and settings
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

use crate::host::SharedHandle;
use crate::settings::CellSettings;

/// One registered cell, as handed out by [`CellRegistry::snapshot`].
#[derive(Clone)]
pub struct CellEntry {
    pub id: String,
    pub handle: SharedHandle,
    pub settings: CellSettings,
    /// Distinguishes this registration from a later one reusing the same id.
    pub serial: u64,
}

impl fmt::Debug for CellEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellEntry")
            .field("id", &self.id)
            .field("kind", &self.settings.kind)
            .field("serial", &self.serial)
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    cells: HashMap<String, CellEntry>,
    next_serial: u64,
}

/// Single source of truth for what is currently visible.
///
/// The lock is only ever held for the duration of a map operation, never
/// across an await, so callers see a consistent map between suspension points.
#[derive(Default)]
pub struct CellRegistry {
    inner: Mutex<Inner>,
}

impl CellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Re-adding a live id keeps its registration serial.
    /// Returns the serial of the entry.
    pub fn upsert(&self, id: &str, handle: SharedHandle, settings: CellSettings) -> u64 {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.cells.get_mut(id) {
            entry.handle = handle;
            entry.settings = settings;
            return entry.serial;
        }
        inner.next_serial += 1;
        let serial = inner.next_serial;
        inner.cells.insert(id.to_string(), CellEntry {
            id: id.to_string(),
            handle,
            settings,
            serial,
        });
        serial
    }

    /// Replace settings of an existing registration only.
    pub fn update_settings(&self, id: &str, serial: u64, settings: CellSettings) -> bool {
        let mut inner = self.inner.lock();
        match inner.cells.get_mut(id) {
            Some(entry) if entry.serial == serial => {
                entry.settings = settings;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner.lock().cells.remove(id).is_some()
    }

    /// Remove `id` only if it still belongs to registration `serial`.
    pub fn remove_registration(&self, id: &str, serial: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.cells.get(id) {
            Some(entry) if entry.serial == serial => {
                inner.cells.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<CellEntry> {
        self.inner.lock().cells.get(id).cloned()
    }

    /// Point-in-time copy, sorted by id, safe to iterate across awaits.
    pub fn snapshot(&self) -> Vec<CellEntry> {
        let mut cells: Vec<CellEntry> = self.inner.lock().cells.values().cloned().collect();
        cells.sort_by(|a, b| a.id.cmp(&b.id));
        cells
    }

    pub fn size(&self) -> usize {
        self.inner.lock().cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
