//! Tool change errors and host status codes

use crate::changer::{ChangeOutcome, ChangeState};
use rapidchange_core::{AxisMask, MotionError};
use thiserror::Error;

/// Which of the two tool setter probes missed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    /// Fast probe bounded by the maximum travel
    Seek,
    /// Slow probe after the retreat
    Set,
}

impl std::fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seek => write!(f, "seek"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// Errors that stop a tool change request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    /// A change was requested without a selected tool
    #[error("No tool selected")]
    NoPendingTool,

    /// Required axes have not been homed
    #[error("Homing required on {missing}")]
    NotHomed {
        /// Axes that still need a homing cycle.
        missing: AxisMask,
    },

    /// A move, spindle or I/O primitive failed
    #[error("Motion failed: {0}")]
    Motion(#[from] MotionError),

    /// The tool setter did not make contact within its travel
    #[error("Tool setter {stage} probe made no contact")]
    ProbeMiss {
        /// Probe that missed.
        stage: ProbeStage,
    },

    /// Measuring requires an enabled tool setter and a loaded tool
    #[error("Tool setter unavailable: {reason}")]
    ToolSetterUnavailable {
        /// Why the routine could not start.
        reason: String,
    },

    /// A machine reset interrupted the change
    #[error("Tool change interrupted by reset")]
    Reset,

    /// `resume` or `cancel` without a paused change
    #[error("No tool change is waiting for the operator")]
    NotAwaitingOperator,

    /// A new change was requested while one is paused
    #[error("A tool change is already in progress")]
    ChangeInProgress,

    /// The sequencer attempted a transition its state graph forbids
    #[error("Invalid state transition {from} -> {to}")]
    InvalidTransition {
        /// State the sequencer was in.
        from: ChangeState,
        /// State it tried to enter.
        to: ChangeState,
    },
}

impl ChangeError {
    /// Status reported to the host program executor
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChangeError::NotHomed { .. } => StatusCode::HomingRequired,
            _ => StatusCode::ToolError,
        }
    }
}

/// Result type alias for tool change operations
pub type ChangeResult<T> = Result<T, ChangeError>;

/// Coarse status consumed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Change finished, bypassed, or parked for the operator
    Ok,
    /// The change failed or was refused
    ToolError,
    /// Axes must be homed first
    HomingRequired,
}

impl From<&ChangeResult<ChangeOutcome>> for StatusCode {
    fn from(result: &ChangeResult<ChangeOutcome>) -> Self {
        match result {
            Ok(_) => StatusCode::Ok,
            Err(e) => e.status_code(),
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ToolError => write!(f, "error: tool change failed"),
            Self::HomingRequired => write!(f, "error: homing required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapidchange_core::{Axis, ManualAction, ToolId};

    #[test]
    fn test_status_mapping() {
        assert_eq!(ChangeError::NoPendingTool.status_code(), StatusCode::ToolError);
        assert_eq!(
            ChangeError::NotHomed {
                missing: AxisMask::of(&[Axis::Z])
            }
            .status_code(),
            StatusCode::HomingRequired
        );
        assert_eq!(
            ChangeError::ProbeMiss {
                stage: ProbeStage::Seek
            }
            .status_code(),
            StatusCode::ToolError
        );
        assert_eq!(
            ChangeError::Motion(MotionError::Aborted).status_code(),
            StatusCode::ToolError
        );
    }

    #[test]
    fn test_status_from_result() {
        let paused: ChangeResult<ChangeOutcome> = Ok(ChangeOutcome::AwaitingOperator(
            ManualAction::RemoveTool(ToolId(8)),
        ));
        assert_eq!(StatusCode::from(&paused), StatusCode::Ok);

        let failed: ChangeResult<ChangeOutcome> = Err(ChangeError::Reset);
        assert_eq!(StatusCode::from(&failed), StatusCode::ToolError);
    }

    #[test]
    fn test_error_display() {
        let err = ChangeError::NotHomed {
            missing: AxisMask::of(&[Axis::X, Axis::Z]),
        };
        assert_eq!(err.to_string(), "Homing required on XZ");

        let err = ChangeError::ProbeMiss {
            stage: ProbeStage::Set,
        };
        assert_eq!(err.to_string(), "Tool setter set probe made no contact");
    }
}
