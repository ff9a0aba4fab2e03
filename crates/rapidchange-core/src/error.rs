//! Error handling for RapidChange
//!
//! Provides the error type raised by the machine collaborators
//! (motion planner, probe, spindle, digital I/O) that the tool-change
//! sequence drives.

use crate::data::Axis;
use thiserror::Error;

/// Motion error type
///
/// Raised by a collaborator when a move, probe, or output could not be
/// carried out. The tool-change sequence aborts on the first one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// The planner refused the move (soft limits, invalid target, alarm)
    #[error("Move rejected: {reason}")]
    MoveRejected {
        /// The reason the move was rejected.
        reason: String,
    },

    /// Buffer synchronization was aborted (reset, stop, or alarm)
    #[error("Motion aborted while waiting for the planner to drain")]
    Aborted,

    /// The probe cycle itself failed (probe already triggered, alarm)
    #[error("Probe failed: {reason}")]
    ProbeFailed {
        /// The reason the probe operation failed.
        reason: String,
    },

    /// An axis required by the move is not configured on this machine
    #[error("Axis {axis} is not available")]
    AxisUnavailable {
        /// The missing axis.
        axis: Axis,
    },

    /// A digital port could not be read or written
    #[error("Digital port {port} failed: {reason}")]
    Io {
        /// The port number.
        port: u8,
        /// The reason for the failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_error_display() {
        let err = MotionError::MoveRejected {
            reason: "soft limit".to_string(),
        };
        assert_eq!(err.to_string(), "Move rejected: soft limit");

        let err = MotionError::AxisUnavailable { axis: Axis::B };
        assert_eq!(err.to_string(), "Axis B is not available");
    }
}
