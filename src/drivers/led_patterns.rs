//! Lamp-bank blink programs.
//!
//! A program is a fixed cycle of frames. Each frame is a bitmask over the
//! bank's outputs (bit 0 = first lamp) held for a number of milliseconds.
//! The pattern task walks the frames in a loop; [`Program::mask_at`] gives
//! the same answer for an arbitrary phase, which is what the tests use.
//! `random` and `party` are drawn afresh for every cycle through
//! [`Program::next_cycle`].
//!
//! ## Programs
//!
//! With the default bank `[red, yellow, green]`:
//!
//! | Program   | Description                              | Cycle   |
//! |-----------|------------------------------------------|---------|
//! | Siren     | red ⇄ green at 300 ms, yellow blips 100 ms | 700 ms  |
//! | Sequence  | one lamp at a time, in bank order        | n×200 ms |
//! | Strobe    | every lamp on/off together               | 200 ms  |
//! | Wave      | one lamp at a time, there and back       | 2n×150 ms |
//! | Random    | 10 random single-lamp toggles            | 1 s     |
//! | Party     | random, sequence, strobe or wave, picked per cycle | varies |

use std::str::FromStr;
use std::time::Duration;

use heapless::Vec;
use rand::Rng;

/// Frames per program. Wave on a full bank is the longest.
pub const MAX_FRAMES: usize = 16;

/// Bank width a mask can address.
pub const MASK_WIDTH: usize = 8;

/// Program identifier, as spelled in `LED_PATTERN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternId {
    #[default]
    Siren,
    Sequence,
    Strobe,
    Wave,
    Random,
    Party,
}

impl PatternId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Siren => "siren",
            Self::Sequence => "sequence",
            Self::Strobe => "strobe",
            Self::Wave => "wave",
            Self::Random => "random",
            Self::Party => "party",
        }
    }

    /// Whether every cycle is drawn anew.
    pub fn is_random(self) -> bool {
        matches!(self, Self::Random | Self::Party)
    }
}

/// Programs a party cycle picks from.
const PARTY_MIX: [PatternId; 4] = [
    PatternId::Random,
    PatternId::Sequence,
    PatternId::Strobe,
    PatternId::Wave,
];

/// Toggles in one random cycle.
const RANDOM_STEPS: usize = 10;

impl FromStr for PatternId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "siren" => Ok(Self::Siren),
            "sequence" => Ok(Self::Sequence),
            "strobe" => Ok(Self::Strobe),
            "wave" => Ok(Self::Wave),
            "random" => Ok(Self::Random),
            "party" => Ok(Self::Party),
            _ => Err(()),
        }
    }
}

/// One step of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub mask: u8,
    pub hold_ms: u32,
}

impl Frame {
    const fn new(mask: u8, hold_ms: u32) -> Self {
        Self { mask, hold_ms }
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(u64::from(self.hold_ms))
    }

    pub fn is_on(&self, output: usize) -> bool {
        output < MASK_WIDTH && self.mask & (1 << output) != 0
    }
}

/// A non-empty cycle of frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    id: PatternId,
    outputs: usize,
    frames: Vec<Frame, MAX_FRAMES>,
}

impl Program {
    /// Build `id` for a bank of `outputs` lamps.
    pub fn new(id: PatternId, outputs: usize) -> Self {
        Self::with_rng(id, outputs, &mut rand::thread_rng())
    }

    /// As [`new`](Self::new), drawing `random`/`party` cycles from `rng`.
    pub fn with_rng(id: PatternId, outputs: usize, rng: &mut impl Rng) -> Self {
        let n = outputs.clamp(1, MASK_WIDTH);
        let solo = |i: usize| 1u8 << i;
        let all = (0..n).fold(0u8, |m, i| m | solo(i));
        let shape = match id {
            PatternId::Party => PARTY_MIX[rng.gen_range(0..PARTY_MIX.len())],
            other => other,
        };

        let mut frames: Vec<Frame, MAX_FRAMES> = Vec::new();
        let mut push = |f: Frame| {
            // Capacity covers the longest program (wave over 8 lamps).
            let _ = frames.push(f);
        };
        match shape {
            // Needs red/yellow/green; a narrower bank degrades to a strobe.
            PatternId::Siren if n >= 3 => {
                let (red, yellow, green) = (solo(0), solo(1), solo(2));
                push(Frame::new(red, 300));
                push(Frame::new(green, 300));
                push(Frame::new(green | yellow, 100));
            }
            PatternId::Siren | PatternId::Strobe => {
                push(Frame::new(all, 100));
                push(Frame::new(0, 100));
            }
            PatternId::Sequence => (0..n).for_each(|i| push(Frame::new(solo(i), 200))),
            PatternId::Wave => (0..n)
                .chain((0..n).rev())
                .for_each(|i| push(Frame::new(solo(i), 150))),
            PatternId::Random | PatternId::Party => {
                let mut mask = 0u8;
                for _ in 0..RANDOM_STEPS {
                    let lamp = solo(rng.gen_range(0..n));
                    if rng.gen_bool(0.5) {
                        mask |= lamp;
                    } else {
                        mask &= !lamp;
                    }
                    push(Frame::new(mask, 100));
                }
            }
        }
        Self { id, outputs: n, frames }
    }

    /// The program for the following cycle: a fresh draw for `random` and
    /// `party`, otherwise the same frames.
    pub fn next_cycle(&self, rng: &mut impl Rng) -> Self {
        if self.id.is_random() {
            Self::with_rng(self.id, self.outputs, rng)
        } else {
            self.clone()
        }
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn cycle_ms(&self) -> u32 {
        self.frames.iter().map(|f| f.hold_ms).sum()
    }

    /// Output mask at `phase_ms` into the (repeating) cycle.
    pub fn mask_at(&self, phase_ms: u32) -> u8 {
        let mut pos = phase_ms % self.cycle_ms().max(1);
        for frame in &self.frames {
            if pos < frame.hold_ms {
                return frame.mask;
            }
            pos -= frame.hold_ms;
        }
        0
    }
}
