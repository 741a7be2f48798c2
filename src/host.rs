/*
 *  host.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Capabilities the host lends us for each visible cell
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

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::HostError;
use crate::settings::RawSettings;

/// Opaque per-cell capability owned by the host.
///
/// The scheduler only borrows it while the cell is registered and never
/// assumes anything about it beyond these operations.
#[async_trait]
pub trait CellHandle: Send + Sync {
    /// Push an encoded image (a `data:` URL) to the physical key.
    async fn set_image(&self, image: &str) -> Result<(), HostError>;

    async fn set_title(&self, title: &str) -> Result<(), HostError>;

    async fn save_settings(&self, settings: &RawSettings) -> Result<(), HostError>;

    async fn read_settings(&self) -> Result<RawSettings, HostError>;
}

pub type SharedHandle = Arc<dyn CellHandle>;
