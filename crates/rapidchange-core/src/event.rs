//! Event system for tool-change notifications
//!
//! Provides:
//! - Event types published while a tool change runs
//! - Event dispatcher for publishing events to subscribers
//!
//! Publishing never blocks and succeeds without subscribers, so the
//! sequencer can report from any step.

use crate::data::{Axis, ToolId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Action the operator must take before a paused change can resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManualAction {
    /// Remove the tool from the spindle by hand
    RemoveTool(ToolId),
    /// Install the tool in the spindle by hand
    InstallTool(ToolId),
    /// The loaded tool looks cross-threaded; reseat it by hand
    ReseatTool(ToolId),
}

impl ManualAction {
    /// Tool the action refers to
    pub fn tool(&self) -> ToolId {
        match self {
            Self::RemoveTool(tool) | Self::InstallTool(tool) | Self::ReseatTool(tool) => *tool,
        }
    }
}

impl std::fmt::Display for ManualAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoveTool(tool) => write!(f, "Remove {} from the spindle and resume", tool),
            Self::InstallTool(tool) => write!(f, "Install {} in the spindle and resume", tool),
            Self::ReseatTool(tool) => write!(f, "Reseat {} (possible cross-thread) and resume", tool),
        }
    }
}

/// Tool changer event types
#[derive(Debug, Clone, PartialEq)]
pub enum AtcEvent {
    /// Sequencer moved to a new state
    StateChanged {
        /// Previous state name.
        from: String,
        /// New state name.
        to: String,
    },
    /// The tool believed to be in the spindle changed
    ToolChanged(ToolId),
    /// First probe after a reference clear established the TLO reference
    TloReferenceEstablished {
        /// Axis the reference belongs to.
        axis: Axis,
        /// Raw probe reading stored as reference.
        value: f32,
    },
    /// The TLO reference was forgotten; the next measurement sets a new one
    TloReferenceCleared,
    /// A measured tool length offset was applied
    ToolLengthOffsetApplied(f32),
    /// The sequence parked waiting for the operator
    OperatorActionRequired(ManualAction),
    /// The change request failed
    ChangeFailed(String),
    /// A reset reconciled the tool bookkeeping
    Reset {
        /// Tool kept as current after the reset.
        restored_tool: ToolId,
    },
}

impl std::fmt::Display for AtcEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtcEvent::StateChanged { from, to } => write!(f, "State: {} -> {}", from, to),
            AtcEvent::ToolChanged(tool) => write!(f, "Current tool: {}", tool),
            AtcEvent::TloReferenceEstablished { axis, value } => {
                write!(f, "TLO reference set on {}: {:.3}", axis, value)
            }
            AtcEvent::TloReferenceCleared => write!(f, "TLO reference cleared"),
            AtcEvent::ToolLengthOffsetApplied(offset) => write!(f, "TLO applied: {:.3}", offset),
            AtcEvent::OperatorActionRequired(action) => write!(f, "Operator: {}", action),
            AtcEvent::ChangeFailed(reason) => write!(f, "Tool change failed: {}", reason),
            AtcEvent::Reset { restored_tool } => write!(f, "Reset, tool kept: {}", restored_tool),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for tool changer events.
    tx: broadcast::Sender<AtcEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 64)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<AtcEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: AtcEvent) -> usize {
        tracing::trace!("event: {}", event);
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
