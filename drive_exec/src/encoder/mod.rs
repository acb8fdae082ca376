//! # Encoder module
//!
//! Decodes a two channel quadrature encoder into a signed count and
//! periodically turns that count into a rotation rate.
//!
//! The sampling functions are called from the pin change context, each time
//! either channel changes. [`Encoder::proc`] is called cyclically from the
//! control task and computes the count frequency and rpm over the time since
//! its previous update. The count shared between the two contexts is only
//! touched inside a critical section, the derived values are atomics and can
//! be read from anywhere without locking.
//!
//! Channel states are encoded as `0bAB`. Forward rotation follows
//! `00 -> 10 -> 11 -> 01 -> 00`:
//!
//! ```text
//! A: _|--|__|--|__|--|_
//! B: __|--|__|--|__|--|
//! ```

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pins;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use critical_section::Mutex;
use log::{debug, trace};
use serde::Deserialize;
use std::cell::Cell;
use std::sync::{
    atomic::{AtomicI32, AtomicU64, Ordering},
    Arc
};
use thiserror::Error;

// Internal
pub use pins::*;
use crate::Rpm;
use util::time::{Clock, TimeMs};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Next state for forward rotation, indexed by the current state.
const FORWARD_NEXT: [u8; 4] = [0b10, 0b00, 0b11, 0b01];

/// Next state for reverse rotation, indexed by the current state.
const REVERSE_NEXT: [u8; 4] = [0b01, 0b11, 0b00, 0b10];

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which can report the measured speed of a motor.
pub trait RpmSource: Send + Sync {
    fn get_rpm(&self) -> Rpm;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Calibration of an encoder.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Negate the measured direction.
    #[serde(default)]
    pub invert_direction: bool,

    /// Number of counts per revolution of the encoder shaft, the total number
    /// of rising and falling edges on both channels. For example 3 pulses per
    /// channel is 12 counts per revolution.
    ///
    /// Units: counts
    pub counts_per_revolution: i32,

    /// Numerator of the reduction between the encoder shaft and the output.
    #[serde(default = "one")]
    pub reduction_ratio_numerator: u32,

    /// Denominator of the reduction between the encoder shaft and the output.
    #[serde(default = "one")]
    pub reduction_ratio_denominator: u32
}

/// Quadrature decoder state shared with the sampling context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DecoderState {
    channel_state: u8,
    count: i32,
    skipped_count: i32
}

/// A quadrature encoder.
pub struct Encoder {
    ch_a: Box<dyn ChannelPin>,
    ch_b: Box<dyn ChannelPin>,

    clock: Arc<dyn Clock>,

    config: EncoderConfig,

    decoder: Mutex<Cell<DecoderState>>,

    last_count: AtomicI32,
    count_frequency: AtomicI32,
    rpm: AtomicI32,
    last_update_ms: AtomicU64,

    log_key: String
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum EncoderError {
    #[error("Counts per revolution must be positive, found {0}")]
    InvalidCountsPerRevolution(i32),

    #[error("Reduction ratio {0}/{1} is invalid, both parts must be non-zero")]
    InvalidReductionRatio(u32, u32)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            invert_direction: false,
            counts_per_revolution: 1,
            reduction_ratio_numerator: 1,
            reduction_ratio_denominator: 1
        }
    }
}

impl EncoderConfig {
    pub fn are_valid(&self) -> Result<(), EncoderError> {
        if self.counts_per_revolution <= 0 {
            return Err(EncoderError::InvalidCountsPerRevolution(
                self.counts_per_revolution
            ))
        }
        if self.reduction_ratio_numerator == 0 || self.reduction_ratio_denominator == 0 {
            return Err(EncoderError::InvalidReductionRatio(
                self.reduction_ratio_numerator,
                self.reduction_ratio_denominator
            ))
        }

        Ok(())
    }
}

impl DecoderState {
    /// Move to a new channel state, counting the transition.
    fn apply(&mut self, new_channel_state: u8) {
        let current = self.channel_state & 0b11;
        let new_channel_state = new_channel_state & 0b11;

        if current == new_channel_state {
            return;
        }

        if FORWARD_NEXT[current as usize] == new_channel_state {
            self.count = self.count.wrapping_add(1);
        }
        else if REVERSE_NEXT[current as usize] == new_channel_state {
            self.count = self.count.wrapping_sub(1);
        }
        else {
            self.skipped_count = self.skipped_count.wrapping_add(1);
        }

        self.channel_state = new_channel_state;
    }
}

impl Encoder {
    /// Create a new encoder on the given channel pins.
    ///
    /// The initial channel state is read from the pins, a pin which cannot be
    /// read is assumed low.
    pub fn new<A, B>(
        ch_a: A,
        ch_b: B,
        config: EncoderConfig,
        clock: Arc<dyn Clock>,
        log_key: &str
    ) -> Result<Self, EncoderError>
    where
        A: ChannelPin + 'static,
        B: ChannelPin + 'static
    {
        config.are_valid()?;

        let a = ch_a.level().unwrap_or(false);
        let b = ch_b.level().unwrap_or(false);

        let now = clock.now_ms();

        debug!(target: log_key, "Encoder initialised: {:?}", config);

        Ok(Self {
            ch_a: Box::new(ch_a),
            ch_b: Box::new(ch_b),
            clock,
            config,
            decoder: Mutex::new(Cell::new(DecoderState {
                channel_state: state_from_levels(a, b),
                count: 0,
                skipped_count: 0
            })),
            last_count: AtomicI32::new(0),
            count_frequency: AtomicI32::new(0),
            rpm: AtomicI32::new(0),
            last_update_ms: AtomicU64::new(now),
            log_key: log_key.to_string()
        })
    }

    /// Sample channel A after it has changed, keeping the last known level of
    /// channel B.
    pub fn sample_channel_a(&self) {
        if let Some(a) = self.ch_a.level() {
            self.with_decoder(|d| {
                let new_state = (d.channel_state & 0b01) | ((a as u8) << 1);
                d.apply(new_state);
            });
        }
    }

    /// Sample channel B after it has changed, keeping the last known level of
    /// channel A.
    pub fn sample_channel_b(&self) {
        if let Some(b) = self.ch_b.level() {
            self.with_decoder(|d| {
                let new_state = (d.channel_state & 0b10) | (b as u8);
                d.apply(new_state);
            });
        }
    }

    /// Sample both channels.
    pub fn sample_channels(&self) {
        if let (Some(a), Some(b)) = (self.ch_a.level(), self.ch_b.level()) {
            self.with_decoder(|d| d.apply(state_from_levels(a, b)));
        }
    }

    /// Cyclic processing, updating the count frequency and rpm.
    ///
    /// Nothing is done unless at least one millisecond has passed since the
    /// last update.
    pub fn proc(&self) {
        let now = self.clock.now_ms();
        let last = self.last_update_ms.load(Ordering::Acquire);

        if now <= last {
            return;
        }

        // Take the count and reset it in one go
        let snapshot = self.with_decoder(|d| {
            let c = d.count;
            d.count = 0;
            c
        });

        let count = match self.config.invert_direction {
            true => snapshot.wrapping_neg(),
            false => snapshot
        };

        let (count_frequency, rpm) = rate_from_count(count, now - last, &self.config);

        self.last_count.store(count, Ordering::Release);
        self.count_frequency.store(count_frequency, Ordering::Release);
        self.rpm.store(rpm, Ordering::Release);
        self.last_update_ms.store(now, Ordering::Release);

        trace!(
            target: self.log_key.as_str(),
            "count: {}, frequency: {}, rpm: {}",
            count, count_frequency, rpm
        );
    }

    pub fn get_rpm(&self) -> Rpm {
        self.rpm.load(Ordering::Acquire)
    }

    /// Counts per second over the last update period. Negative for reverse
    /// rotation.
    pub fn get_count_frequency(&self) -> i32 {
        self.count_frequency.load(Ordering::Acquire)
    }

    /// Count accumulated over the last update period.
    pub fn get_last_count(&self) -> i32 {
        self.last_count.load(Ordering::Acquire)
    }

    /// Count accumulated since the last update.
    pub fn get_count(&self) -> i32 {
        self.with_decoder(|d| d.count)
    }

    /// Number of invalid transitions seen, where an edge must have been
    /// missed.
    pub fn get_skipped_count(&self) -> i32 {
        self.with_decoder(|d| d.skipped_count)
    }

    /// Current channel state as `0bAB`.
    pub fn get_state(&self) -> u8 {
        self.with_decoder(|d| d.channel_state)
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn log_key(&self) -> &str {
        &self.log_key
    }

    /// Run `f` on the decoder state inside a critical section.
    fn with_decoder<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DecoderState) -> R
    {
        critical_section::with(|cs| {
            let cell = self.decoder.borrow(cs);
            let mut state = cell.get();
            let ret = f(&mut state);
            cell.set(state);
            ret
        })
    }
}

impl RpmSource for Encoder {
    fn get_rpm(&self) -> Rpm {
        Encoder::get_rpm(self)
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("log_key", &self.log_key)
            .field("config", &self.config)
            .field("rpm", &self.get_rpm())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn one() -> u32 {
    1
}

fn state_from_levels(a: bool, b: bool) -> u8 {
    ((a as u8) << 1) | (b as u8)
}

/// Count frequency and rpm of `count` edges over `elapsed_ms`.
fn rate_from_count(count: i32, elapsed_ms: TimeMs, config: &EncoderConfig) -> (i32, Rpm) {
    let count = count as i64;
    let elapsed_ms = elapsed_ms as i64;

    let count_frequency = (count * 1000) / elapsed_ms;
    let rpm = (count * 1000 * 60 * config.reduction_ratio_numerator as i64)
        / (elapsed_ms
            * config.counts_per_revolution as i64
            * config.reduction_ratio_denominator as i64);

    (count_frequency as i32, rpm as Rpm)
}
