/*
 *  lib.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
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

//! Drives a bank of clock "cells" (one glyph per key) off a single shared
//! timer so every digit flips on the same second.

pub mod bridge;
pub mod config;
pub mod error;
pub mod glyph;
pub mod host;
pub mod lifecycle;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod settings;

pub use glyph::{resolve, BlinkPolicy};
pub use host::{CellHandle, SharedHandle};
pub use lifecycle::LifecycleManager;
pub use registry::CellRegistry;
pub use render::{ImageEncoding, Renderer};
pub use scheduler::{Clock, OffsetClock, Scheduler, SchedulerOptions, SchedulerPhase, SystemClock};
pub use settings::{CellKind, CellSettings, RawSettings};
