/*
 *  glyph.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Time to glyph derivation for a single clock cell
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

use chrono::Timelike;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::settings::{CellKind, CellSettings};

pub const COLON: &str = ":";
pub const COLON_OFF: &str = " ";
pub const UNKNOWN_GLYPH: &str = "?";

/// How a blinking colon decides whether it is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BlinkPolicy {
    /// Visible for the first 500 ms of every second.
    #[default]
    SubSecond,
    /// Visible on even seconds, blank on odd ones.
    EvenSecondParity,
}

impl BlinkPolicy {
    /// Tick period able to resolve this policy's transitions.
    pub fn tick_period(self) -> Duration {
        match self {
            BlinkPolicy::SubSecond => Duration::from_millis(100),
            BlinkPolicy::EvenSecondParity => Duration::from_millis(1000),
        }
    }

    /// Whether blinking cells need a redraw on ticks that did not cross a second.
    pub fn redraws_between_seconds(self) -> bool {
        matches!(self, BlinkPolicy::SubSecond)
    }

    fn colon_visible<T: Timelike>(self, now: &T) -> bool {
        match self {
            BlinkPolicy::SubSecond => millisecond(now) < 500,
            BlinkPolicy::EvenSecondParity => now.second() % 2 == 0,
        }
    }
}

// chrono reports a leap second as nanosecond >= 1e9
fn millisecond<T: Timelike>(now: &T) -> u32 {
    (now.nanosecond() / 1_000_000).min(999)
}

/// Glyph for one cell at `now`. Pure; unknown kinds yield `"?"`.
pub fn resolve<T: Timelike>(
    now: &T,
    kind: &CellKind,
    use_24_hour_format: bool,
    blink_colons: bool,
    policy: BlinkPolicy,
) -> String {
    let mut hours = now.hour();
    if !use_24_hour_format {
        if hours > 12 {
            hours -= 12;
        } else if hours == 0 {
            hours = 12;
        }
    }

    let hh = format!("{:02}", hours);
    let mm = format!("{:02}", now.minute());
    let ss = format!("{:02}", now.second());

    match kind {
        CellKind::HourDigit1 => hh[..1].to_string(),
        CellKind::HourDigit2 => hh[1..].to_string(),
        CellKind::MinuteDigit1 => mm[..1].to_string(),
        CellKind::MinuteDigit2 => mm[1..].to_string(),
        CellKind::SecondDigit1 => ss[..1].to_string(),
        CellKind::SecondDigit2 => ss[1..].to_string(),
        CellKind::FullHour => hh,
        CellKind::FullMinute => mm,
        CellKind::FullSecond => ss,
        CellKind::Colon { .. } => {
            if !blink_colons || policy.colon_visible(now) {
                COLON.to_string()
            } else {
                COLON_OFF.to_string()
            }
        }
        CellKind::Unknown(_) => UNKNOWN_GLYPH.to_string(),
    }
}

/// [`resolve`] driven by a cell's materialized settings.
pub fn resolve_for<T: Timelike>(now: &T, settings: &CellSettings, policy: BlinkPolicy) -> String {
    resolve(now, &settings.kind, settings.use_24_hour_format, settings.blink_colons, policy)
}
