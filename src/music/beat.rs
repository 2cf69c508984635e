//! Musical time in integer ticks.
//!
//! 960 PPQN, the resolution exported MIDI files declare. Bar-based values
//! from the theory layer are converted here and nowhere else.

use std::cmp::Ordering;
use std::ops::Sub;
use std::time::Duration;

/// Ticks per quarter note (beat).
pub const TICKS_PER_BEAT: u64 = 960;

/// Every piece is in 4/4.
pub const BEATS_PER_BAR: u32 = 4;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Beat {
    ticks: u64,
}

impl Beat {
    pub const ZERO: Beat = Beat { ticks: 0 };

    /// Create a `Beat` from a fractional beat value (1.5 = one and a half beats).
    /// Negative values clamp to zero.
    pub fn from_beats_f64(beats: f64) -> Self {
        Self {
            ticks: (beats * TICKS_PER_BEAT as f64).round().max(0.0) as u64,
        }
    }

    /// Create a `Beat` from a fractional bar value.
    pub fn from_bars_f64(bars: f64) -> Self {
        Self::from_beats_f64(bars * f64::from(BEATS_PER_BAR))
    }

    pub fn ticks(self) -> u64 {
        self.ticks
    }

    pub fn as_beats_f64(self) -> f64 {
        self.ticks as f64 / TICKS_PER_BEAT as f64
    }

    /// Wall-clock length of this span at `bpm`.
    pub fn to_duration(self, bpm: f64) -> Duration {
        Duration::from_secs_f64(self.as_beats_f64() * 60.0 / bpm)
    }

    /// Microseconds per quarter note at `bpm`, as a MIDI tempo event stores it.
    pub fn tempo_micros(bpm: f64) -> u32 {
        (60_000_000.0 / bpm).round().clamp(1.0, f64::from(0x00FF_FFFF)) as u32
    }
}

impl Ord for Beat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticks.cmp(&other.ticks)
    }
}

impl PartialOrd for Beat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Sub for Beat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            ticks: self.ticks.saturating_sub(rhs.ticks),
        }
    }
}
