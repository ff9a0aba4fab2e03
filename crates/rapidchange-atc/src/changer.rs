//! Tool-change state machine
//!
//! [`ToolChanger`] runs a change as a fixed series of states:
//!
//! `Idle → Preparing → CoverOpening → Unloading → Loading → Measuring →
//! CoverClosing → Restoring → Idle`
//!
//! Any failing step moves to `Failed` and the remaining steps are skipped.
//! When a sequence needs the operator the changer parks in
//! `AwaitingOperator` until [`ToolChanger::resume`] or
//! [`ToolChanger::cancel`] is called.

use crate::actions::Actuator;
use crate::context::AtcContext;
use crate::dust_cover;
use crate::error::{ChangeError, ChangeResult};
use crate::pocket::PocketLayout;
use crate::sequence::{self, Sequence};
use crate::tool_setter;
use rapidchange_core::{
    AtcEvent, AxisMask, CoolantState, Machine, ManualAction, Position, SpindleState, ToolId,
    ToolLengthOffset,
};
use rapidchange_settings::AtcConfig;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Axes that must be homed before any change
const REQUIRED_HOMED: AxisMask = AxisMask::XYZ;

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeState {
    /// No change running
    Idle,
    /// Draining the planner and saving program state
    Preparing,
    CoverOpening,
    Unloading,
    Loading,
    /// Running the tool setter
    Measuring,
    CoverClosing,
    /// Returning to the saved program state
    Restoring,
    /// Parked until the operator resumes or cancels
    AwaitingOperator,
    /// The last request failed
    Failed,
}

impl ChangeState {
    /// Check whether a transition follows the change sequence
    ///
    /// Every active state may fail. `AwaitingOperator` resumes into the
    /// state after the paused sequence, or returns to `Idle` when the change
    /// is abandoned. `Failed` only leaves through `Idle`.
    pub fn can_transition_to(&self, target: ChangeState) -> bool {
        use ChangeState::*;
        match (self, target) {
            (Idle, Preparing) => true,
            (Idle | Failed, _) if target == Failed => false,
            (_, Failed) => true,
            (Preparing, CoverOpening) => true,
            (CoverOpening, Unloading) => true,
            (Unloading, Loading | AwaitingOperator) => true,
            (Loading, Measuring | AwaitingOperator) => true,
            (Measuring, CoverClosing) => true,
            (CoverClosing, Restoring) => true,
            (Restoring, Idle) => true,
            (AwaitingOperator, Loading | Measuring | Idle) => true,
            (Failed, Idle) => true,
            _ => false,
        }
    }

    /// Check whether a change is underway (running or parked)
    pub fn is_active(&self) -> bool {
        !matches!(self, ChangeState::Idle | ChangeState::Failed)
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Preparing => write!(f, "Preparing"),
            Self::CoverOpening => write!(f, "CoverOpening"),
            Self::Unloading => write!(f, "Unloading"),
            Self::Loading => write!(f, "Loading"),
            Self::Measuring => write!(f, "Measuring"),
            Self::CoverClosing => write!(f, "CoverClosing"),
            Self::Restoring => write!(f, "Restoring"),
            Self::AwaitingOperator => write!(f, "AwaitingOperator"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// How a change request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// New tool loaded and program state restored
    Completed,
    /// Requested tool already in the spindle, nothing moved
    Bypassed,
    /// Parked until the operator performs the action and resumes
    AwaitingOperator(ManualAction),
}

impl ChangeOutcome {
    /// The host should hold the program (feed hold) while the operator acts
    pub fn is_feed_hold(&self) -> bool {
        matches!(self, ChangeOutcome::AwaitingOperator(_))
    }
}

/// Machine context saved in `Preparing` and restored in `Restoring`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramStateSnapshot {
    pub position: Position,
    pub coolant: CoolantState,
    pub spindle: SpindleState,
    pub spindle_rpm: f32,
}

impl ProgramStateSnapshot {
    fn capture<M: Machine>(machine: &M) -> Self {
        let (spindle, spindle_rpm) = machine.spindle_state();
        Self {
            position: machine.current_position(),
            coolant: machine.coolant_state(),
            spindle,
            spindle_rpm,
        }
    }
}

/// Bookkeeping for the change in flight
#[derive(Debug, Clone)]
struct ActiveChange {
    id: Uuid,
    from: ToolId,
    to: ToolId,
    epoch: u64,
    snapshot: ProgramStateSnapshot,
}

impl ActiveChange {
    fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "tool_change",
            id = %self.id,
            from = %self.from,
            to = %self.to
        )
    }
}

/// Where a paused change picks up again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumePoint {
    /// The operator removed the old tool
    AfterUnload,
    /// The operator installed or reseated the new tool
    AfterLoad,
}

#[derive(Debug, Clone)]
struct PausedChange {
    change: ActiveChange,
    action: ManualAction,
    resume: ResumePoint,
}

/// Automatic tool changer driving a machine
pub struct ToolChanger<M: Machine> {
    machine: M,
    config: AtcConfig,
    layout: PocketLayout,
    context: Arc<AtcContext>,
    state: ChangeState,
    target: Position,
    paused: Option<PausedChange>,
}

impl<M: Machine> ToolChanger<M> {
    /// Take control of the tool change on `machine`
    ///
    /// Cancels any active tool length offset, since nothing is known yet
    /// about the tool in the spindle.
    pub fn new(mut machine: M, config: AtcConfig, context: Arc<AtcContext>) -> Self {
        machine.set_tool_length_offset(ToolLengthOffset::Cancelled);
        let layout = PocketLayout::new(&config);
        let target = machine.current_position();
        tracing::info!(
            "RapidChange ATC ready: {} pockets, tool setter {}, tool recognition {}",
            config.pocket_count,
            if config.tool_setter.is_some() { "on" } else { "off" },
            if config.tool_recognition.is_some() { "on" } else { "off" }
        );
        Self {
            machine,
            config,
            layout,
            context,
            state: ChangeState::Idle,
            target,
            paused: None,
        }
    }

    /// Re-run initialisation after a host reinit
    ///
    /// Always cancels the active offset; forgets the TLO reference when
    /// `clear_reference` is set.
    pub fn reinitialize(&mut self, clear_reference: bool) {
        self.machine.set_tool_length_offset(ToolLengthOffset::Cancelled);
        if clear_reference {
            self.context.clear_reference();
        }
    }

    pub fn state(&self) -> ChangeState {
        self.state
    }

    pub fn context(&self) -> &Arc<AtcContext> {
        &self.context
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn into_machine(self) -> M {
        self.machine
    }

    /// Record a tool selection (`T` word, or M61 when not a lookahead)
    pub fn select(&self, tool: ToolId, is_lookahead: bool) {
        self.context.select(tool, is_lookahead);
    }

    /// Host reset/stop handler
    pub fn on_reset(&self) -> bool {
        self.context.on_reset()
    }

    pub fn current_tool(&self) -> ToolId {
        self.context.current_tool()
    }

    pub fn pending_tool(&self) -> Option<ToolId> {
        self.context.pending_tool()
    }

    /// Action the operator must take, if the change is parked
    pub fn awaiting(&self) -> Option<ManualAction> {
        self.paused.as_ref().map(|paused| paused.action)
    }

    /// Run a tool change to the selected tool (M6)
    pub fn change(&mut self) -> ChangeResult<ChangeOutcome> {
        self.abandon_pause_after_reset();
        if self.state.is_active() {
            return Err(ChangeError::ChangeInProgress);
        }
        if self.state == ChangeState::Failed {
            self.transition(ChangeState::Idle)?;
        }

        let epoch = self.context.epoch();
        let tools = self.context.tool_state();
        let to = tools.pending.ok_or(ChangeError::NoPendingTool)?;
        if to == tools.current {
            self.context.complete(epoch)?;
            tracing::debug!("{} already loaded, bypassing change", to);
            return Ok(ChangeOutcome::Bypassed);
        }

        let missing = self.machine.homed_axes().missing_from(REQUIRED_HOMED);
        if !missing.is_empty() {
            tracing::warn!("Tool change refused, homing required on {}", missing);
            return Err(ChangeError::NotHomed { missing });
        }

        let id = Uuid::new_v4();
        let span = tracing::info_span!("tool_change", id = %id, from = %tools.current, to = %to);
        let _entered = span.enter();
        tracing::info!("Changing {} -> {}", tools.current, to);

        self.transition(ChangeState::Preparing)?;
        let change = match self.prepare(id, tools.current, to, epoch) {
            Ok(change) => change,
            Err(e) => return Err(self.fail(e, epoch)),
        };
        self.drive(change, None)
    }

    /// Continue a parked change after the operator acted
    pub fn resume(&mut self) -> ChangeResult<ChangeOutcome> {
        if self.abandon_pause_after_reset() {
            return Err(ChangeError::Reset);
        }
        let paused = self.paused.take().ok_or(ChangeError::NotAwaitingOperator)?;
        let span = paused.change.span();
        let _entered = span.enter();
        tracing::info!("Operator done: {}", paused.action);

        self.target = self.machine.current_position();
        self.drive(paused.change, Some(paused.resume))
    }

    /// Abandon a parked change
    ///
    /// The tool bookkeeping stays exactly as it was at the pause.
    pub fn cancel(&mut self) -> ChangeResult<()> {
        let paused = self.paused.take().ok_or(ChangeError::NotAwaitingOperator)?;
        let span = paused.change.span();
        let _entered = span.enter();
        tracing::warn!("Tool change cancelled while waiting for: {}", paused.action);
        self.transition(ChangeState::Idle)
    }

    /// Drop a parked change whose epoch a reset has invalidated
    fn abandon_pause_after_reset(&mut self) -> bool {
        let stale = self
            .paused
            .as_ref()
            .is_some_and(|paused| paused.change.epoch != self.context.epoch());
        if stale {
            tracing::warn!("Paused tool change abandoned by reset");
            self.paused = None;
            self.state = ChangeState::Idle;
        }
        stale
    }

    fn transition(&mut self, next: ChangeState) -> ChangeResult<()> {
        let from = self.state;
        if !from.can_transition_to(next) {
            tracing::error!("Invalid tool change transition {} -> {}", from, next);
            return Err(ChangeError::InvalidTransition { from, to: next });
        }
        tracing::info!("{} -> {}", from, next);
        self.state = next;
        self.context.events().publish(AtcEvent::StateChanged {
            from: from.to_string(),
            to: next.to_string(),
        });
        Ok(())
    }

    fn check_epoch(&self, change: &ActiveChange) -> ChangeResult<()> {
        if self.context.epoch() == change.epoch {
            Ok(())
        } else {
            Err(ChangeError::Reset)
        }
    }

    fn prepare(
        &mut self,
        id: Uuid,
        from: ToolId,
        to: ToolId,
        epoch: u64,
    ) -> ChangeResult<ActiveChange> {
        self.machine.synchronize()?;
        let snapshot = ProgramStateSnapshot::capture(&self.machine);
        tracing::debug!(
            "Saved position {:?}, spindle {} S{:.0}",
            snapshot.position,
            snapshot.spindle,
            snapshot.spindle_rpm
        );
        self.target = snapshot.position;
        self.machine.stop_spindle()?;
        self.machine.set_coolant(CoolantState::OFF)?;
        Ok(ActiveChange {
            id,
            from,
            to,
            epoch,
            snapshot,
        })
    }

    fn drive(
        &mut self,
        change: ActiveChange,
        resume: Option<ResumePoint>,
    ) -> ChangeResult<ChangeOutcome> {
        match self.run_states(&change, resume) {
            Ok(None) => Ok(ChangeOutcome::Completed),
            Ok(Some((action, resume))) => {
                if let Err(e) = self.transition(ChangeState::AwaitingOperator) {
                    return Err(self.fail(e, change.epoch));
                }
                tracing::warn!("Waiting for operator: {}", action);
                self.context
                    .events()
                    .publish(AtcEvent::OperatorActionRequired(action));
                self.paused = Some(PausedChange {
                    change,
                    action,
                    resume,
                });
                Ok(ChangeOutcome::AwaitingOperator(action))
            }
            Err(e) => Err(self.fail(e, change.epoch)),
        }
    }

    /// Step through the states; returns the action to wait for if a
    /// sequence parked
    fn run_states(
        &mut self,
        change: &ActiveChange,
        resume: Option<ResumePoint>,
    ) -> ChangeResult<Option<(ManualAction, ResumePoint)>> {
        let mut next = match resume {
            None => ChangeState::CoverOpening,
            Some(ResumePoint::AfterUnload) => {
                self.finish_unload(change)?;
                ChangeState::Loading
            }
            Some(ResumePoint::AfterLoad) => {
                self.finish_load(change)?;
                ChangeState::Measuring
            }
        };

        loop {
            self.check_epoch(change)?;
            self.transition(next)?;
            next = match next {
                ChangeState::CoverOpening => {
                    let mut act = Actuator::new(&mut self.machine, &mut self.target);
                    dust_cover::set_cover(&mut act, &self.config.dust_cover, true)?;
                    ChangeState::Unloading
                }
                ChangeState::Unloading => {
                    let tool = self.context.current_tool();
                    let mut act = Actuator::new(&mut self.machine, &mut self.target);
                    match sequence::unload_tool(&mut act, &self.config, &self.layout, tool)? {
                        Sequence::Done => {
                            self.finish_unload(change)?;
                            ChangeState::Loading
                        }
                        Sequence::Paused(action) => {
                            return Ok(Some((action, ResumePoint::AfterUnload)))
                        }
                    }
                }
                ChangeState::Loading => {
                    let mut act = Actuator::new(&mut self.machine, &mut self.target);
                    match sequence::load_tool(&mut act, &self.config, &self.layout, change.to)? {
                        Sequence::Done => {
                            self.finish_load(change)?;
                            ChangeState::Measuring
                        }
                        Sequence::Paused(action) => {
                            return Ok(Some((action, ResumePoint::AfterLoad)))
                        }
                    }
                }
                ChangeState::Measuring => {
                    if self.config.tool_setter.is_some() && self.context.current_tool().is_some() {
                        let mut act = Actuator::new(&mut self.machine, &mut self.target);
                        tool_setter::measure_tool(&mut act, &self.config, &self.context)?;
                    } else {
                        tracing::debug!("Skipping tool measurement");
                    }
                    ChangeState::CoverClosing
                }
                ChangeState::CoverClosing => {
                    let mut act = Actuator::new(&mut self.machine, &mut self.target);
                    dust_cover::set_cover(&mut act, &self.config.dust_cover, false)?;
                    ChangeState::Restoring
                }
                ChangeState::Restoring => {
                    self.restore(&change.snapshot)?;
                    self.context.complete(change.epoch)?;
                    self.transition(ChangeState::Idle)?;
                    tracing::info!("Tool change complete, {} loaded", self.current_tool());
                    return Ok(None);
                }
                other => {
                    return Err(ChangeError::InvalidTransition {
                        from: other,
                        to: other,
                    })
                }
            };
        }
    }

    fn finish_unload(&mut self, change: &ActiveChange) -> ChangeResult<()> {
        self.context.commit_current(ToolId::NONE, change.epoch)?;
        self.machine.set_tool_length_offset(ToolLengthOffset::Cancelled);
        Ok(())
    }

    fn finish_load(&mut self, change: &ActiveChange) -> ChangeResult<()> {
        if change.to.is_some() {
            self.context.commit_current(change.to, change.epoch)?;
        }
        Ok(())
    }

    fn restore(&mut self, snapshot: &ProgramStateSnapshot) -> ChangeResult<()> {
        let mut act = Actuator::new(&mut self.machine, &mut self.target);
        act.rapid_to_z(self.config.z_safe_clearance)?;
        if self.config.return_to_origin {
            act.rapid_to_xy(snapshot.position.x, snapshot.position.y)?;
            act.rapid_to_z(snapshot.position.z)?;
        }
        self.machine.sync_position();
        self.machine.set_coolant(snapshot.coolant)?;
        self.machine.set_spindle(snapshot.spindle, snapshot.spindle_rpm)?;
        if snapshot.spindle.is_on() {
            self.machine.delay(self.config.spindle_ramp);
        }
        Ok(())
    }

    /// Enter `Failed` and report the error
    ///
    /// The spindle is stopped on a best-effort basis; the machine otherwise
    /// stays where the failing step left it. A reset seen during the change
    /// is reported as such, whatever primitive it surfaced through.
    fn fail(&mut self, error: ChangeError, epoch: u64) -> ChangeError {
        let error = if self.context.epoch() != epoch {
            ChangeError::Reset
        } else {
            error
        };
        if let Err(stop_err) = self.machine.stop_spindle() {
            tracing::warn!("Could not stop spindle after failure: {}", stop_err);
        }
        self.paused = None;
        if self.state.can_transition_to(ChangeState::Failed) {
            let _ = self.transition(ChangeState::Failed);
        } else {
            self.state = ChangeState::Failed;
        }
        tracing::error!("Tool change failed: {}", error);
        self.context
            .events()
            .publish(AtcEvent::ChangeFailed(error.to_string()));
        error
    }
}

impl<M: Machine> fmt::Debug for ToolChanger<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolChanger")
            .field("state", &self.state)
            .field("tools", &self.context.tool_state())
            .field("target", &self.target)
            .finish()
    }
}

/// Plugin identification line for the host's option report
pub fn report_options() -> String {
    format!("[PLUGIN: RapidChange ATC v{}]", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use ChangeState::*;
        assert!(Idle.can_transition_to(Preparing));
        assert!(!Idle.can_transition_to(Loading));
        assert!(!Idle.can_transition_to(Failed));
        assert!(Unloading.can_transition_to(AwaitingOperator));
        assert!(AwaitingOperator.can_transition_to(Loading));
        assert!(AwaitingOperator.can_transition_to(Idle));
        assert!(!AwaitingOperator.can_transition_to(Restoring));
        assert!(Restoring.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Preparing));
        assert!(Failed.can_transition_to(Idle));
        assert!(!Loading.can_transition_to(Unloading));
    }

    #[test]
    fn test_active_states() {
        assert!(!ChangeState::Idle.is_active());
        assert!(!ChangeState::Failed.is_active());
        assert!(ChangeState::AwaitingOperator.is_active());
        assert!(ChangeState::Measuring.is_active());
    }

    #[test]
    fn test_outcome_feed_hold() {
        assert!(!ChangeOutcome::Completed.is_feed_hold());
        assert!(ChangeOutcome::AwaitingOperator(ManualAction::InstallTool(ToolId(3))).is_feed_hold());
    }

    #[test]
    fn test_report_options() {
        assert!(report_options().starts_with("[PLUGIN: RapidChange ATC v"));
        assert!(report_options().ends_with(']'));
    }
}
