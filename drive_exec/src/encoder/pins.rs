//! Encoder channel inputs

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use embedded_hal::digital::v2::InputPin;
use std::convert::Infallible;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A digital input carrying one encoder channel.
///
/// Any `embedded-hal` input pin which can be shared between threads is a
/// channel pin.
pub trait ChannelPin: Send + Sync {
    /// Read the level of the pin, `true` for high. `None` if the read failed.
    fn level(&self) -> Option<bool>;
}

impl<P> ChannelPin for P
where
    P: InputPin + Send + Sync
{
    fn level(&self) -> Option<bool> {
        self.is_high().ok()
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A simulated input pin.
///
/// Clones share the same level, so one clone can be handed to an encoder
/// while another is driven by a simulation or a test.
#[derive(Debug, Default, Clone)]
pub struct SimPin {
    level: Arc<AtomicBool>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimPin {
    pub fn new(level: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(level))
        }
    }

    pub fn set_level(&self, level: bool) {
        self.level.store(level, Ordering::SeqCst);
    }
}

impl InputPin for SimPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.level.load(Ordering::SeqCst))
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.level.load(Ordering::SeqCst))
    }
}
