//! Loudness curve conversion for note velocities and volume controllers.
//!
//! A value is mapped to decibels through the source curve, the gain is
//! added, and the result is mapped back through the destination curve.

use crate::event::{CONTROLLER, NOTE_OFF, NOTE_ON};
use crate::track::MidiFile;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use tracing::debug;

const CC_VOLUME: u8 = 0x07;
const CC_EXPRESSION: u8 = 0x0B;

/// Mapping between a 7-bit MIDI value and attenuation in dB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeCurve {
    /// General MIDI: `40 * log10(v / 127)`
    #[default]
    #[serde(rename = "GM")]
    Gm,
    /// Linear amplitude: half the value is -6 dB
    #[serde(rename = "Lin")]
    Lin,
    /// FM operator total level, 0.75 dB per step
    #[serde(rename = "FM")]
    Fm,
    /// PSG, 2 dB per 8 steps
    #[serde(rename = "PSG2")]
    Psg2,
    /// PSG, 3 dB per 8 steps
    #[serde(rename = "PSG3")]
    Psg3,
    /// Windows OPL driver curve
    #[serde(rename = "WinFM")]
    WinFm,
}

impl VolumeCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gm => "GM",
            Self::Lin => "Lin",
            Self::Fm => "FM",
            Self::Psg2 => "PSG2",
            Self::Psg3 => "PSG3",
            Self::WinFm => "WinFM",
        }
    }

    /// Attenuation of `value` (1..=127) in dB; 0 dB at full scale.
    pub fn to_db(&self, value: u8) -> f64 {
        let v = value as f64;
        match self {
            Self::Gm => 40.0 * (v / 127.0).log10(),
            Self::Lin => 6.0 * (v / 127.0).log2(),
            Self::Fm => (v - 127.0) / 8.0 * 6.0,
            Self::Psg2 => ((value / 8) as f64 - 15.0) * 2.0,
            Self::Psg3 => ((value / 8) as f64 - 15.0) * 3.0,
            Self::WinFm => {
                let a2 = (v / 127.0 * FRAC_PI_2).sin();
                let a3 = a2.sqrt() * 0.9;
                let total_level = 63.0 * (1.0 - a3);
                // +4.725 dB makes up for the 0.9 scale above
                total_level / 8.0 * -6.0 + 4.725
            }
        }
    }

    /// Fraction of full scale for `db`, clamped to `0.0..=1.0`.
    pub fn from_db(&self, db: f64) -> f64 {
        let value = match self {
            Self::Gm => 10f64.powf(db / 40.0),
            Self::Lin => 2f64.powf(db / 6.0),
            Self::Fm => (db / 6.0 * 8.0 + 127.0) / 127.0,
            Self::Psg2 => (db / 2.0 * 8.0 + 120.0) / 120.0,
            Self::Psg3 => (db / 3.0 * 8.0 + 120.0) / 120.0,
            Self::WinFm => {
                let total_level = (db - 4.725) / -6.0 * 8.0;
                let a3 = (1.0 - total_level / 63.0).max(0.0);
                let a2 = (a3 / 0.9).powi(2).min(1.0);
                a2.asin() / FRAC_PI_2
            }
        };
        value.clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for VolumeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VolumeCurve {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gm" => Ok(Self::Gm),
            "lin" => Ok(Self::Lin),
            "fm" => Ok(Self::Fm),
            "psg2" => Ok(Self::Psg2),
            "psg3" => Ok(Self::Psg3),
            "winfm" => Ok(Self::WinFm),
            _ => Err(crate::Error::UnknownCurve(s.to_string())),
        }
    }
}

/// Which events get converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEvents {
    pub velocity: bool,
    pub volume: bool,
    pub expression: bool,
}

impl Default for VolumeEvents {
    fn default() -> Self {
        Self {
            velocity: true,
            volume: true,
            expression: true,
        }
    }
}

impl std::str::FromStr for VolumeEvents {
    type Err = crate::Error;

    /// Comma separated list of `vel`, `vol` and `exp`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut events = Self {
            velocity: false,
            volume: false,
            expression: false,
        };
        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.to_ascii_lowercase().as_str() {
                "vel" | "velocity" => events.velocity = true,
                "vol" | "volume" => events.volume = true,
                "exp" | "expression" => events.expression = true,
                _ => return Err(crate::Error::UnknownVolumeEvent(item.to_string())),
            }
        }
        Ok(events)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeOptions {
    pub source: VolumeCurve,
    pub dest: VolumeCurve,
    pub gain_db: f64,
    pub events: VolumeEvents,
    /// Bit `n` selects channel `n`.
    pub channels: u16,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            source: VolumeCurve::Gm,
            dest: VolumeCurve::Gm,
            gain_db: 0.0,
            events: VolumeEvents::default(),
            channels: 0xFFFF,
        }
    }
}

impl VolumeOptions {
    /// Convert one nonzero value. Velocities never drop to 0.
    pub fn convert(&self, value: u8, is_velocity: bool) -> u8 {
        let db = self.source.to_db(value) + self.gain_db;
        let converted = (self.dest.from_db(db) * 127.0 + 0.5) as u8;
        if is_velocity {
            converted.max(1)
        } else {
            converted
        }
    }
}

/// Convert velocities and volume/expression controllers of every track in
/// place. Zero values are left alone.
///
/// Returns the number of events that were converted.
pub fn convert_volume(file: &mut MidiFile, options: &VolumeOptions) -> usize {
    let mut converted = 0;

    for track in &mut file.tracks {
        for event in track.events_mut() {
            let Some(channel) = event.channel() else {
                continue;
            };
            if options.channels & (1 << channel) == 0 || event.data_b == 0 {
                continue;
            }

            let is_velocity = match (event.kind(), event.data_a) {
                (NOTE_OFF | NOTE_ON, _) if options.events.velocity => true,
                (CONTROLLER, CC_VOLUME) if options.events.volume => false,
                (CONTROLLER, CC_EXPRESSION) if options.events.expression => false,
                _ => continue,
            };
            event.data_b = options.convert(event.data_b, is_velocity);
            converted += 1;
        }
    }

    debug!(
        converted,
        source = %options.source,
        dest = %options.dest,
        gain_db = options.gain_db,
        "converted volume"
    );
    converted
}
