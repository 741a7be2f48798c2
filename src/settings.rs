/*
 *  settings.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Cell settings: host wire form and the materialized form
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

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
pub const DEFAULT_FONT_SIZE: f32 = 96.0;
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Which part of the clock face a cell shows.
///
/// The wire names are the ones the host stores (`hour1`, `colon2`, `fullMinute`, ...).
/// An unrecognised name is kept verbatim so it survives a save round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CellKind {
    HourDigit1,
    HourDigit2,
    MinuteDigit1,
    MinuteDigit2,
    SecondDigit1,
    SecondDigit2,
    /// Separator; `second` records whether it sits between minutes and seconds.
    Colon { second: bool },
    FullHour,
    FullMinute,
    FullSecond,
    Unknown(String),
}

impl CellKind {
    /// Every kind the resolver understands.
    pub const ALL: [CellKind; 11] = [
        CellKind::HourDigit1,
        CellKind::HourDigit2,
        CellKind::MinuteDigit1,
        CellKind::MinuteDigit2,
        CellKind::SecondDigit1,
        CellKind::SecondDigit2,
        CellKind::Colon { second: false },
        CellKind::FullHour,
        CellKind::FullMinute,
        CellKind::FullSecond,
        CellKind::Colon { second: true },
    ];

    pub fn wire_name(&self) -> &str {
        match self {
            CellKind::HourDigit1 => "hour1",
            CellKind::HourDigit2 => "hour2",
            CellKind::MinuteDigit1 => "minute1",
            CellKind::MinuteDigit2 => "minute2",
            CellKind::SecondDigit1 => "second1",
            CellKind::SecondDigit2 => "second2",
            CellKind::Colon { second: false } => "colon1",
            CellKind::Colon { second: true } => "colon2",
            CellKind::FullHour => "fullHour",
            CellKind::FullMinute => "fullMinute",
            CellKind::FullSecond => "fullSecond",
            CellKind::Unknown(name) => name.as_str(),
        }
    }

    pub fn is_colon(&self) -> bool {
        matches!(self, CellKind::Colon { .. })
    }
}

impl From<String> for CellKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "hour1" => CellKind::HourDigit1,
            "hour2" => CellKind::HourDigit2,
            "minute1" => CellKind::MinuteDigit1,
            "minute2" => CellKind::MinuteDigit2,
            "second1" => CellKind::SecondDigit1,
            "second2" => CellKind::SecondDigit2,
            "colon1" => CellKind::Colon { second: false },
            "colon2" => CellKind::Colon { second: true },
            "fullHour" => CellKind::FullHour,
            "fullMinute" => CellKind::FullMinute,
            "fullSecond" => CellKind::FullSecond,
            _ => CellKind::Unknown(name),
        }
    }
}

impl From<&str> for CellKind {
    fn from(name: &str) -> Self {
        CellKind::from(name.to_string())
    }
}

impl From<CellKind> for String {
    fn from(kind: CellKind) -> Self {
        match kind {
            CellKind::Unknown(name) => name,
            known => known.wire_name().to_string(),
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Settings as the host stores and delivers them. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<CellKind>,
    #[serde(default, rename = "format24Hour", skip_serializing_if = "Option::is_none")]
    pub format_24_hour: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blink_colons: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl RawSettings {
    pub fn is_empty(&self) -> bool {
        *self == RawSettings::default()
    }

    /// Fill every unset field with its default. Only called when a cell first appears.
    pub fn materialize(self) -> CellSettings {
        CellSettings::default().overlay(self)
    }
}

/// Fully populated settings. Everything past registration works on this form only.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSettings {
    pub kind: CellKind,
    pub use_24_hour_format: bool,
    pub blink_colons: bool,
    pub text_color: String,
    pub background_color: String,
    pub font_size: f32,
    pub font_family: String,
}

impl Default for CellSettings {
    fn default() -> Self {
        Self {
            kind: CellKind::HourDigit1,
            use_24_hour_format: false,
            blink_colons: true,
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl CellSettings {
    /// Replace the fields `update` carries, keep the rest.
    pub fn overlay(mut self, update: RawSettings) -> Self {
        if let Some(kind) = update.component {
            self.kind = kind;
        }
        if let Some(h24) = update.format_24_hour {
            self.use_24_hour_format = h24;
        }
        if let Some(blink) = update.blink_colons {
            self.blink_colons = blink;
        }
        if let Some(color) = update.text_color {
            self.text_color = color;
        }
        if let Some(color) = update.background_color {
            self.background_color = color;
        }
        if let Some(size) = update.font_size {
            self.font_size = size;
        }
        if let Some(family) = update.font_family {
            self.font_family = family;
        }
        self
    }

    /// Wire form with every field present, for persisting back to the host.
    pub fn to_raw(&self) -> RawSettings {
        RawSettings {
            component: Some(self.kind.clone()),
            format_24_hour: Some(self.use_24_hour_format),
            blink_colons: Some(self.blink_colons),
            text_color: Some(self.text_color.clone()),
            background_color: Some(self.background_color.clone()),
            font_size: Some(self.font_size),
            font_family: Some(self.font_family.clone()),
        }
    }

    /// Colon cells with blinking on are the only ones redrawn between seconds.
    pub fn blinks(&self) -> bool {
        self.kind.is_colon() && self.blink_colons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_materialize_empty_uses_defaults() {
        let settings = RawSettings::default().materialize();
        assert_eq!(settings, CellSettings::default());
        assert_eq!(settings.kind, CellKind::HourDigit1);
        assert!(settings.blink_colons);
        assert!(!settings.use_24_hour_format);
        assert_eq!(settings.font_size, 96.0);
    }

    #[test]
    fn test_materialize_keeps_supplied_fields() {
        let raw: RawSettings = serde_json::from_str(
            r##"{"component":"colon2","format24Hour":true,"textColor":"#FF0000"}"##,
        ).unwrap();
        let settings = raw.materialize();
        assert_eq!(settings.kind, CellKind::Colon { second: true });
        assert!(settings.use_24_hour_format);
        assert_eq!(settings.text_color, "#FF0000");
        assert_eq!(settings.background_color, DEFAULT_BACKGROUND_COLOR);
        assert_eq!(settings.font_family, DEFAULT_FONT_FAMILY);
    }

    #[test]
    fn test_overlay_never_redefaults() {
        let mut current = CellSettings::default();
        current.font_size = 40.0;
        current.blink_colons = false;

        let update = RawSettings { text_color: Some("#00FF00".into()), ..Default::default() };
        let next = current.overlay(update);

        assert_eq!(next.font_size, 40.0);
        assert!(!next.blink_colons);
        assert_eq!(next.text_color, "#00FF00");
    }

    #[test]
    fn test_kind_wire_names() {
        for kind in CellKind::ALL {
            let name: String = kind.clone().into();
            assert_eq!(CellKind::from(name), kind);
        }
        assert_eq!(CellKind::from("colon1"), CellKind::Colon { second: false });
        assert!(CellKind::from("colon2").is_colon());
    }

    #[test]
    fn test_unknown_kind_survives_round_trip() {
        let raw: RawSettings = serde_json::from_str(r#"{"component":"dayOfWeek"}"#).unwrap();
        assert_eq!(raw.component, Some(CellKind::Unknown("dayOfWeek".into())));
        let json = serde_json::to_string(&raw).unwrap();
        assert_eq!(json, r#"{"component":"dayOfWeek"}"#);
    }

    #[test]
    fn test_to_raw_is_complete() {
        let raw = CellSettings::default().to_raw();
        let json = serde_json::to_value(&raw).unwrap();
        for field in ["component", "format24Hour", "blinkColons", "textColor",
                      "backgroundColor", "fontSize", "fontFamily"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(raw.materialize(), CellSettings::default());
    }

    #[test]
    fn test_blinks_only_for_colons() {
        let mut settings = CellSettings::default();
        assert!(!settings.blinks());
        settings.kind = CellKind::Colon { second: false };
        assert!(settings.blinks());
        settings.blink_colons = false;
        assert!(!settings.blinks());
    }
}
