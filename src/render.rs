/*
 *  render.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Glyph image construction and push to the cell's display
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

//! Render dispatcher.
//!
//! Each glyph becomes a 144x144 rounded square SVG. The document is parsed
//! with `usvg` before it is sent, and optionally rasterized to PNG with
//! `resvg`. Anything that goes wrong while building the image degrades to a
//! plain red square; only failures of the host push itself are reported.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::ValueEnum;
use log::{debug, warn};
use resvg::usvg::{fontdb, Options as UsvgOptions, Transform, Tree};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tiny_skia::Pixmap;

use crate::error::{ImageError, RenderError};
use crate::host::CellHandle;
use crate::settings::CellSettings;

/// Key face edge length in pixels.
pub const KEY_SIZE: u32 = 144;
pub const CORNER_RADIUS: u32 = 8;
/// Two character glyphs are scaled down to sit next to single digit cells.
pub const DOUBLE_GLYPH_SCALE: f32 = 0.75;
/// Baseline offset from centre, as a fraction of font size.
const BASELINE_SHIFT: f32 = 0.35;
const FALLBACK_FILL: &str = "red";

/// How the image is delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    #[default]
    Svg,
    Png,
}

pub fn font_size_for(glyph: &str, base: f32) -> f32 {
    if glyph.chars().count() == 2 {
        base * DOUBLE_GLYPH_SCALE
    } else {
        base
    }
}

fn escape_xml(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// SVG source for one glyph.
pub fn glyph_svg(glyph: &str, settings: &CellSettings) -> String {
    let size = KEY_SIZE;
    let font_size = font_size_for(glyph, settings.font_size);
    let center_x = size as f32 / 2.0;
    let center_y = size as f32 / 2.0 + font_size * BASELINE_SHIFT;

    format!(
        concat!(
            r#"<svg width="{size}" height="{size}" xmlns="http://www.w3.org/2000/svg">"#,
            r#"<rect width="{size}" height="{size}" fill="{bg}" rx="{rx}"/>"#,
            r#"<text x="{x}" y="{y}" font-family="{family}" font-size="{font_size}px" font-weight="bold" "#,
            r#"fill="{fg}" text-anchor="middle" dominant-baseline="auto">{text}</text>"#,
            r#"</svg>"#,
        ),
        size = size,
        bg = escape_xml(&settings.background_color),
        rx = CORNER_RADIUS,
        x = center_x,
        y = center_y,
        family = escape_xml(&settings.font_family),
        font_size = font_size,
        fg = escape_xml(&settings.text_color),
        text = escape_xml(glyph),
    )
}

pub fn fallback_svg() -> String {
    format!(
        r#"<svg width="{size}" height="{size}" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="{fill}" rx="{rx}"/></svg>"#,
        size = KEY_SIZE,
        fill = FALLBACK_FILL,
        rx = CORNER_RADIUS,
    )
}

fn svg_data_url(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", BASE64.encode(svg))
}

fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Builds glyph images and pushes them to cell handles.
pub struct Renderer {
    encoding: ImageEncoding,
    fontdb: Arc<fontdb::Database>,
}

impl Renderer {
    pub fn new(encoding: ImageEncoding) -> Self {
        let mut db = fontdb::Database::new();
        // the SVG path leaves text layout to the host, fonts only matter when we raster
        if encoding == ImageEncoding::Png {
            db.load_system_fonts();
            debug!("loaded {} font faces for PNG rendering", db.len());
        }
        Self { encoding, fontdb: Arc::new(db) }
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    /// Compute the image for `glyph` and push it plus an empty title.
    pub async fn render(
        &self,
        handle: &dyn CellHandle,
        glyph: &str,
        settings: &CellSettings,
    ) -> Result<(), RenderError> {
        let image = self.build_image(glyph, settings);
        handle.set_image(&image).await.map_err(RenderError::Image)?;
        // a title would be drawn over the glyph
        handle.set_title("").await.map_err(RenderError::Title)?;
        debug!("rendered {:?} for {}", glyph, settings.kind);
        Ok(())
    }

    pub fn build_image(&self, glyph: &str, settings: &CellSettings) -> String {
        self.encode_document(&glyph_svg(glyph, settings))
    }

    /// Encode an SVG document, degrading to the fallback square on any failure.
    pub fn encode_document(&self, svg: &str) -> String {
        match self.try_encode(svg) {
            Ok(url) => url,
            Err(e) => {
                warn!("image construction failed, using fallback: {}", e);
                svg_data_url(&fallback_svg())
            }
        }
    }

    fn try_encode(&self, svg: &str) -> Result<String, ImageError> {
        let mut options = UsvgOptions::default();
        options.fontdb = self.fontdb.clone();
        let tree = Tree::from_str(svg, &options)?;

        match self.encoding {
            ImageEncoding::Svg => Ok(svg_data_url(svg)),
            ImageEncoding::Png => {
                let mut pixmap = Pixmap::new(KEY_SIZE, KEY_SIZE)
                    .ok_or(ImageError::PixmapCreation(KEY_SIZE, KEY_SIZE))?;
                let svg_size = tree.size();
                let transform = Transform::from_scale(
                    KEY_SIZE as f32 / svg_size.width(),
                    KEY_SIZE as f32 / svg_size.height(),
                );
                resvg::render(&tree, transform, &mut pixmap.as_mut());
                let png = pixmap
                    .encode_png()
                    .map_err(|e| ImageError::PngEncode(e.to_string()))?;
                Ok(png_data_url(&png))
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new(ImageEncoding::Svg)
    }
}
