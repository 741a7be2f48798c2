/*
 *  error.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types shared across the scheduler, renderer and bridge
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

use thiserror::Error;

/// Failure reported by a host capability.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The host refused the call, typically because the key moved or vanished
    #[error("host rejected call: {0}")]
    Rejected(String),

    /// The host could not be reached
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// Failure while pushing a rendered glyph to a cell.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to push image: {0}")]
    Image(#[source] HostError),

    #[error("failed to clear title: {0}")]
    Title(#[source] HostError),
}

/// Image construction failure. Never leaves the render module, the
/// dispatcher swaps in the fallback square instead.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("SVG parse error: {0}")]
    SvgParse(#[from] usvg::Error),

    #[error("Pixmap creation error: {0}x{1}")]
    PixmapCreation(u32, u32),

    #[error("PNG encoding error: {0}")]
    PngEncode(String),
}

/// Host bridge protocol failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
