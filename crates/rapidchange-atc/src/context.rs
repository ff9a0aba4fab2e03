//! Shared tool-change context
//!
//! [`AtcContext`] owns the state that outlives a single change and that the
//! host's reset path touches from another thread: which tool is in the
//! spindle, which one was requested, and the TLO reference.
//!
//! Every reset bumps an epoch. The sequencer records the epoch when a change
//! starts and refuses to commit a tool identity once it has moved, so a reset
//! can only ever reconcile the bookkeeping, never race it.

use crate::error::{ChangeError, ChangeResult};
use parking_lot::Mutex;
use rapidchange_core::{AtcEvent, Axis, EventDispatcher, ToolId, AXIS_COUNT};
use std::sync::atomic::{AtomicU64, Ordering};

/// Current and requested tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolState {
    /// Tool believed to be in the spindle
    pub current: ToolId,
    /// Tool requested by the last select, `None` once handled
    pub pending: Option<ToolId>,
}

impl ToolState {
    /// A change is in progress while the requested tool differs from the
    /// current one
    pub fn in_progress(&self) -> bool {
        matches!(self.pending, Some(pending) if pending != self.current)
    }
}

/// Per-axis TLO reference readings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TloReference {
    values: [Option<f32>; AXIS_COUNT],
}

impl TloReference {
    /// Reference reading of an axis, if established
    pub fn get(&self, axis: Axis) -> Option<f32> {
        self.values[axis.index()]
    }

    /// Check whether the axis has a reference
    pub fn is_established(&self, axis: Axis) -> bool {
        self.get(axis).is_some()
    }

    /// Forget every reference
    pub fn clear(&mut self) {
        self.values = [None; AXIS_COUNT];
    }
}

/// What a probe reading did to the TLO bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TloMeasurement {
    /// First reading; stored as the reference
    ReferenceEstablished(f32),
    /// Offset of the reading from the reference
    Offset(f32),
}

/// State shared between the sequencer and the host's reset path
#[derive(Debug)]
pub struct AtcContext {
    tools: Mutex<ToolState>,
    reference: Mutex<TloReference>,
    epoch: AtomicU64,
    events: EventDispatcher,
}

impl AtcContext {
    /// Create a context with an empty spindle and no TLO reference
    pub fn new(events: EventDispatcher) -> Self {
        Self {
            tools: Mutex::new(ToolState::default()),
            reference: Mutex::new(TloReference::default()),
            epoch: AtomicU64::new(0),
            events,
        }
    }

    /// Event dispatcher used for every notification
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Record a tool selection
    ///
    /// A non-lookahead selection (M61) also declares the tool to be in the
    /// spindle already.
    pub fn select(&self, tool: ToolId, is_lookahead: bool) {
        let mut tools = self.tools.lock();
        tools.pending = Some(tool);
        if !is_lookahead {
            tools.current = tool;
            drop(tools);
            tracing::info!("Current tool set to {}", tool);
            self.events.publish(AtcEvent::ToolChanged(tool));
        } else {
            tracing::debug!("Selected {}", tool);
        }
    }

    /// Snapshot of the tool bookkeeping
    pub fn tool_state(&self) -> ToolState {
        *self.tools.lock()
    }

    /// Tool believed to be in the spindle
    pub fn current_tool(&self) -> ToolId {
        self.tools.lock().current
    }

    /// Tool requested by the last select
    pub fn pending_tool(&self) -> Option<ToolId> {
        self.tools.lock().pending
    }

    /// Number of resets seen so far
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Host reset/stop handler
    ///
    /// Safe to call from any thread at any time. If a change was in
    /// progress the requested tool is dropped so that the bookkeeping again
    /// agrees with the tool in the spindle. Returns whether anything was
    /// reconciled.
    pub fn on_reset(&self) -> bool {
        let mut tools = self.tools.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let reconciled = tools.in_progress();
        tools.pending = None;
        let restored_tool = tools.current;
        drop(tools);

        if reconciled {
            tracing::warn!("Reset during tool change, keeping {}", restored_tool);
            self.events.publish(AtcEvent::Reset { restored_tool });
        }
        reconciled
    }

    /// Declare the tool in the spindle, unless a reset happened since `epoch`
    pub fn commit_current(&self, tool: ToolId, epoch: u64) -> ChangeResult<()> {
        let mut tools = self.tools.lock();
        if self.epoch() != epoch {
            return Err(ChangeError::Reset);
        }
        tools.current = tool;
        drop(tools);
        tracing::info!("Current tool is now {}", tool);
        self.events.publish(AtcEvent::ToolChanged(tool));
        Ok(())
    }

    /// Mark the request handled, unless a reset happened since `epoch`
    pub fn complete(&self, epoch: u64) -> ChangeResult<()> {
        let mut tools = self.tools.lock();
        if self.epoch() != epoch {
            return Err(ChangeError::Reset);
        }
        tools.pending = None;
        Ok(())
    }

    /// Snapshot of the TLO reference
    pub fn tlo_reference(&self) -> TloReference {
        *self.reference.lock()
    }

    /// Feed a probe reading into the TLO bookkeeping
    ///
    /// The first reading after the reference was cleared becomes the
    /// reference; every later one yields `measured - reference`.
    pub fn record_probe(&self, axis: Axis, measured: f32) -> TloMeasurement {
        let mut reference = self.reference.lock();
        let existing = reference.values[axis.index()];
        match existing {
            Some(value) => TloMeasurement::Offset(measured - value),
            None => {
                reference.values[axis.index()] = Some(measured);
                drop(reference);
                tracing::info!("TLO reference on {} established at {:.3}", axis, measured);
                self.events.publish(AtcEvent::TloReferenceEstablished {
                    axis,
                    value: measured,
                });
                TloMeasurement::ReferenceEstablished(measured)
            }
        }
    }

    /// Forget the TLO reference; the next probe establishes a new one
    pub fn clear_reference(&self) {
        self.reference.lock().clear();
        tracing::debug!("TLO reference cleared");
        self.events.publish(AtcEvent::TloReferenceCleared);
    }
}

impl Default for AtcContext {
    fn default() -> Self {
        Self::new(EventDispatcher::default())
    }
}
