//! Scripted radio control input for bench runs.
//!
//! Frames are read with the channel script interpreter. A frame applies from
//! its timestamp until the next one, and is delivered every cycle as if the
//! receiver were sending it continuously. Two kinds of frame have a special
//! meaning:
//!
//! - An empty frame (`2.0: ;`) means the receiver has gone silent, no frames
//!   are delivered and every channel is invalid.
//! - A frame in which every channel is `-` is delivered with the receiver
//!   failsafe flag set.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use std::path::Path;

use super::{RcChannel, RcChannelProvider, RcValue, LOG_KEY};
use util::script_interpreter::{PendingFrames, ScriptError, ScriptInterpreter};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Radio control input replayed from a script.
#[derive(Debug)]
pub struct RcScript {
    interpreter: ScriptInterpreter,
    channels: Vec<Option<RcValue>>,
    reception: ScriptedReception
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What the scripted receiver delivered this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedReception {
    /// A frame was received.
    Frame {
        receiver_failsafe: bool
    },

    /// Nothing was received.
    Silent,

    /// The script is over.
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RcScript {
    /// Load a script from the given path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        Ok(Self::from_interpreter(ScriptInterpreter::new(script_path)?))
    }

    /// Build a script from its contents.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        Ok(Self::from_interpreter(ScriptInterpreter::from_str(script)?))
    }

    fn from_interpreter(interpreter: ScriptInterpreter) -> Self {
        info!(
            target: LOG_KEY,
            "Loaded RC script lasting {:.02} s with {} frames",
            interpreter.get_duration(),
            interpreter.get_num_frames()
        );

        Self {
            interpreter,
            channels: Vec::new(),
            reception: ScriptedReception::Silent
        }
    }

    /// Advance the script to the given time and report what the receiver
    /// delivered.
    pub fn proc(&mut self, current_time_s: f64) -> ScriptedReception {
        if self.reception == ScriptedReception::EndOfScript {
            return ScriptedReception::EndOfScript
        }

        match self.interpreter.get_pending_frames(current_time_s) {
            PendingFrames::None => (),
            PendingFrames::Some(frames) => {
                // Only the latest frame matters
                if let Some(frame) = frames.into_iter().last() {
                    debug!(
                        target: LOG_KEY,
                        "Applying scripted frame for {:.03} s: {:?}",
                        frame.exec_time_s, frame.values
                    );

                    self.reception = if frame.values.is_empty() {
                        ScriptedReception::Silent
                    }
                    else {
                        ScriptedReception::Frame {
                            receiver_failsafe: frame.values.iter().all(|v| v.is_none())
                        }
                    };
                    self.channels = frame.values;
                }
            },
            PendingFrames::EndOfScript => {
                info!(target: LOG_KEY, "End of RC script reached");
                self.channels.clear();
                self.reception = ScriptedReception::EndOfScript;
            }
        }

        self.reception
    }

    /// Duration of the script in seconds.
    pub fn get_duration(&self) -> f64 {
        self.interpreter.get_duration()
    }
}

impl RcChannelProvider for RcScript {
    fn get_channel_value(&self, channel: RcChannel) -> Option<RcValue> {
        channel.index().and_then(|i| self.channels.get(i).copied().flatten())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = "
        0.0: 991, 991, 991, 991, 172;
        0.5: 1811, 991, 991, 991, 1811;
        1.0: ;
        1.5: -, -, -, -, -;
        2.0: 991, 991, 991, 991, 172;
    ";

    #[test]
    fn test_replay() {
        let mut s = RcScript::from_str(SCRIPT).unwrap();

        assert_eq!(s.proc(0.1), ScriptedReception::Frame { receiver_failsafe: false });
        assert_eq!(s.get_channel_value(RcChannel(5)), Some(172));

        // Frames repeat until the next one is due
        assert_eq!(s.proc(0.2), ScriptedReception::Frame { receiver_failsafe: false });

        assert_eq!(s.proc(0.7), ScriptedReception::Frame { receiver_failsafe: false });
        assert_eq!(s.get_channel_value(RcChannel(1)), Some(1811));
        assert_eq!(s.get_channel_value(RcChannel(6)), None);
        assert_eq!(s.get_channel_value(RcChannel::INVALID), None);

        assert_eq!(s.proc(1.2), ScriptedReception::Silent);
        assert_eq!(s.get_channel_value(RcChannel(1)), None);

        assert_eq!(s.proc(1.6), ScriptedReception::Frame { receiver_failsafe: true });
        assert_eq!(s.get_channel_value(RcChannel(1)), None);

        assert_eq!(s.proc(2.1), ScriptedReception::Frame { receiver_failsafe: false });
        assert_eq!(s.proc(2.2), ScriptedReception::EndOfScript);
        assert_eq!(s.get_channel_value(RcChannel(1)), None);
        assert_eq!(s.proc(5.0), ScriptedReception::EndOfScript);
    }

    #[test]
    fn test_skipped_frames() {
        let mut s = RcScript::from_str(SCRIPT).unwrap();

        // Jumping straight past several frames applies only the latest
        assert_eq!(s.proc(1.7), ScriptedReception::Frame { receiver_failsafe: true });
    }
}
