// Dispatch lifecycle - linear state machine, no back-edges
//
// Idle → Resolving → Formatting → DriverLoading → (DryRunPreview | Sending) → Done | Failed

use super::errors::FailureCategory;
use serde::Serialize;
use statig::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Start,
    Resolved { email: String },
    Formatted,
    DriverReady { dry_run: bool },
    Previewed,
    Delivered,
    Fail { category: FailureCategory },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPhase {
    Idle,
    Resolving,
    Formatting,
    DriverLoading,
    DryRunPreview,
    Sending,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct DispatchLifecycle {
    phases: Vec<DispatchPhase>,
    recipient: Option<String>,
    failure: Option<FailureCategory>,
}

impl Default for DispatchLifecycle {
    fn default() -> Self {
        Self {
            phases: vec![DispatchPhase::Idle],
            recipient: None,
            failure: None,
        }
    }
}

#[state_machine(initial = "State::idle()")]
impl DispatchLifecycle {
    #[state]
    fn idle(&mut self, event: &DispatchEvent) -> Outcome<State> {
        match event {
            DispatchEvent::Start => self.enter(DispatchPhase::Resolving, State::resolving()),
            _ => Handled,
        }
    }

    #[state]
    fn resolving(&mut self, event: &DispatchEvent) -> Outcome<State> {
        match event {
            DispatchEvent::Resolved { email } => {
                self.recipient = Some(email.clone());
                self.enter(DispatchPhase::Formatting, State::formatting())
            }
            DispatchEvent::Fail { category } => self.fail(*category),
            _ => Handled,
        }
    }

    #[state]
    fn formatting(&mut self, event: &DispatchEvent) -> Outcome<State> {
        match event {
            DispatchEvent::Formatted => {
                self.enter(DispatchPhase::DriverLoading, State::driver_loading())
            }
            DispatchEvent::Fail { category } => self.fail(*category),
            _ => Handled,
        }
    }

    #[state]
    fn driver_loading(&mut self, event: &DispatchEvent) -> Outcome<State> {
        match event {
            DispatchEvent::DriverReady { dry_run: true } => {
                self.enter(DispatchPhase::DryRunPreview, State::dry_run_preview())
            }
            DispatchEvent::DriverReady { dry_run: false } => {
                self.enter(DispatchPhase::Sending, State::sending())
            }
            DispatchEvent::Fail { category } => self.fail(*category),
            _ => Handled,
        }
    }

    #[state]
    fn dry_run_preview(&mut self, event: &DispatchEvent) -> Outcome<State> {
        match event {
            DispatchEvent::Previewed => self.enter(DispatchPhase::Done, State::done()),
            DispatchEvent::Fail { category } => self.fail(*category),
            _ => Handled,
        }
    }

    #[state]
    fn sending(&mut self, event: &DispatchEvent) -> Outcome<State> {
        match event {
            DispatchEvent::Delivered => self.enter(DispatchPhase::Done, State::done()),
            DispatchEvent::Fail { category } => self.fail(*category),
            _ => Handled,
        }
    }

    #[state]
    fn done(&mut self, event: &DispatchEvent) -> Outcome<State> {
        tracing::trace!(?event, "Dispatch already finished; event ignored");
        Handled
    }

    #[state]
    fn failed(&mut self, event: &DispatchEvent) -> Outcome<State> {
        tracing::trace!(?event, failure = ?self.failure, "Dispatch already failed; event ignored");
        Handled
    }
}

impl DispatchLifecycle {
    fn enter(&mut self, phase: DispatchPhase, target: State) -> Outcome<State> {
        tracing::debug!(from = ?self.phase(), to = ?phase, "Dispatch transition");
        self.phases.push(phase);
        Transition(target)
    }

    fn fail(&mut self, category: FailureCategory) -> Outcome<State> {
        tracing::warn!(from = ?self.phase(), category = %category, "Dispatch failed");
        self.failure = Some(category);
        self.phases.push(DispatchPhase::Failed);
        Transition(State::failed())
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phases.last().copied().unwrap_or(DispatchPhase::Idle)
    }

    /// Every phase visited so far, starting with `Idle`.
    pub fn phases(&self) -> &[DispatchPhase] {
        &self.phases
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn failure(&self) -> Option<FailureCategory> {
        self.failure
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase(), DispatchPhase::Done | DispatchPhase::Failed)
    }
}
