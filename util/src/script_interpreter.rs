//! # Channel script interpreter module
//!
//! This module provides an interpreter for timed channel scripts, which allow
//! a recorded or hand written sequence of radio control frames to be replayed
//! on the bench.
//!
//! Each entry in a script has the form
//!
//! ```text
//! <time_s>: <ch1>, <ch2>, ... ;
//! ```
//!
//! where every channel is either an unsigned integer or `-`, which marks the
//! channel as having no valid data in that frame. Anything after a `#` on a
//! line is ignored.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A frame of channel values which is scripted to occur at a specific time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFrame {
    /// The time the frame is supposed to be applied at
    pub exec_time_s: f64,

    /// The channel values, indexed from channel 1. `None` marks a channel
    /// without valid data.
    pub values: Vec<Option<u16>>
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_frames` to acquire the frames which are now due.
#[derive(Debug)]
pub struct ScriptInterpreter {
    _script_path: Option<PathBuf>,
    frames: VecDeque<ScriptFrame>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid channel value at {0} s: {1:?}")]
    InvalidChannelValue(f64, String),

    #[error("Script timestamps must not decrease, found {1} s after {0} s")]
    OutOfOrder(f64, f64)
}

#[derive(Debug, PartialEq)]
pub enum PendingFrames {
    None,
    Some(Vec<ScriptFrame>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());

        // Check that the script file exists.
        if !path.exists() {
            return Err(
                ScriptError::ScriptNotFound(path.to_string_lossy().to_string()));
        }

        // Load the script into a string
        let script = match fs::read_to_string(script_path) {
            Ok(s) => s,
            Err(e) => return Err(ScriptError::ScriptLoadError(e))
        };

        let mut si = Self::from_str(&script)?;
        si._script_path = Some(path);

        Ok(si)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {

        // Empty queue of frames
        let mut frame_queue: VecDeque<ScriptFrame> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = match RegexBuilder::
            new(r"^\s*(\d+(?:\.\d+)?)\s*:\s*([^;#]*);")
            .multi_line(true)
            .build()
        {
            Ok(r) => r,
            Err(e) => crate::raise_error!("Script regex is invalid: {}", e)
        };

        for cap in re.captures_iter(script) {
            let (time_str, payload) = match (cap.get(1), cap.get(2)) {
                (Some(t), Some(p)) => (t.as_str(), p.as_str()),
                _ => continue
            };

            // Parse the exec time
            let exec_time_s: f64 = match time_str.parse() {
                Ok(t) => t,
                Err(e) => return Err(
                    ScriptError::InvalidTimestamp(format!("{}", e)))
            };

            if let Some(prev) = frame_queue.back() {
                if exec_time_s < prev.exec_time_s {
                    return Err(ScriptError::OutOfOrder(prev.exec_time_s, exec_time_s))
                }
            }

            // Parse the channel values
            let mut values = Vec::new();
            for item in payload.split(',') {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                if item == "-" {
                    values.push(None);
                    continue;
                }
                match item.parse::<u16>() {
                    Ok(v) => values.push(Some(v)),
                    Err(_) => return Err(ScriptError::InvalidChannelValue(
                        exec_time_s, item.to_string()
                    ))
                }
            }

            frame_queue.push_back(ScriptFrame {
                exec_time_s,
                values
            });
        }

        if frame_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            _script_path: None,
            frames: frame_queue
        })
    }

    /// Return the frames which are due at `current_time_s`, or
    /// `PendingFrames::None` if no frames are due yet.
    pub fn get_pending_frames(&mut self, current_time_s: f64) -> PendingFrames {

        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.frames.is_empty() {
            return PendingFrames::EndOfScript
        }

        let mut frame_vec: Vec<ScriptFrame> = vec![];

        // Pop frames from the head of the queue until the exec times are
        // larger than the current time.
        while let Some(front) = self.frames.front() {
            if front.exec_time_s > current_time_s {
                break;
            }
            if let Some(f) = self.frames.pop_front() {
                frame_vec.push(f);
            }
        }

        if frame_vec.len() > 0 {
            PendingFrames::Some(frame_vec)
        }
        else {
            PendingFrames::None
        }
    }

    /// Get the number of frames remaining in the script
    pub fn get_num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.frames.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = "
        # time: throttle, ail, steering, rud, arm
        0.0: 991, 991, 991, 991, 172;
        0.5: 991, 991, 991, 991, 1811;   # arm
        1.25: 1500, -, 991, 991, 1811;
    ";

    #[test]
    fn test_parse() {
        let si = ScriptInterpreter::from_str(SCRIPT).unwrap();
        assert_eq!(si.get_num_frames(), 3);
        assert_eq!(si.get_duration(), 1.25);
    }

    #[test]
    fn test_pending() {
        let mut si = ScriptInterpreter::from_str(SCRIPT).unwrap();

        match si.get_pending_frames(0.6) {
            PendingFrames::Some(f) => {
                assert_eq!(f.len(), 2);
                assert_eq!(f[1].values[4], Some(1811));
            },
            p => panic!("Expected two frames, got {:?}", p)
        }

        assert_eq!(si.get_pending_frames(1.0), PendingFrames::None);

        match si.get_pending_frames(2.0) {
            PendingFrames::Some(f) => {
                assert_eq!(f[0].values, vec![Some(1500), None, Some(991), Some(991), Some(1811)]);
            },
            p => panic!("Expected one frame, got {:?}", p)
        }

        assert_eq!(si.get_pending_frames(3.0), PendingFrames::EndOfScript);
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::from_str("# nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_str("0.0: 991, abc;"),
            Err(ScriptError::InvalidChannelValue(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_str("1.0: 991;\n0.5: 991;"),
            Err(ScriptError::OutOfOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::new("/no/such/script.drs"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
