//! Helmet State Machine Implementation

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::StateMachineConfig;
use crate::notification::{CommandOutcome, Notification, TransitionCause};
use crate::timer::CrashTimer;
use crate::transition;
use helmet_protocol::{elapsed_ms, Command, DetectedEvent, EventKind, HelmetState, Millis};

/// Side of a held turn signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnSide {
    Left,
    Right,
}

/// An active crash alert
#[derive(Debug, Clone, Copy)]
struct CrashEpisode {
    entered_at: Millis,
    peak_accel: f32,
    /// `None` once escalated
    timer: Option<CrashTimer>,
}

/// Layered helmet state.
///
/// Crash episode, party flag, brake window and held turn side are tracked
/// separately; the reported state is resolved from them with priority
/// CrashAlert > Party > Braking > Turn > Normal.
pub struct HelmetStateMachine {
    config: StateMachineConfig,
    crash: Option<CrashEpisode>,
    party: bool,
    /// Time of the last Brake event while the brake light is on
    brake_refreshed: Option<Millis>,
    turn: Option<TurnSide>,
    /// Last resolved state
    state: HelmetState,
    /// Kind of the previous classified event, for edge triggering
    last_kind: EventKind,
    outbox: VecDeque<Notification>,
}

impl HelmetStateMachine {
    /// Create a state machine in Normal
    pub fn new(config: StateMachineConfig) -> Self {
        info!("Creating helmet state machine with config: {:?}", config);
        Self {
            config,
            crash: None,
            party: false,
            brake_refreshed: None,
            turn: None,
            state: HelmetState::Normal,
            last_kind: EventKind::Normal,
            outbox: VecDeque::new(),
        }
    }

    /// Current reported state
    pub fn state(&self) -> HelmetState {
        self.state
    }

    /// Pending crash confirmation timer, if any
    pub fn crash_timer(&self) -> Option<&CrashTimer> {
        self.crash.as_ref().and_then(|c| c.timer.as_ref())
    }

    /// Whether a crash alert escalated and is waiting for `reset`
    pub fn is_escalated(&self) -> bool {
        matches!(self.crash, Some(CrashEpisode { timer: None, .. }))
    }

    /// Turn signal held by the rider, shown once no brake light overrides it
    pub fn held_turn(&self) -> Option<TurnSide> {
        self.turn
    }

    /// Whether a brake window is active
    pub fn brake_active(&self) -> bool {
        self.brake_refreshed.is_some()
    }

    /// Feed one classified event
    pub fn on_event(&mut self, event: &DetectedEvent, now: Millis) {
        match event.kind {
            EventKind::Crash => self.enter_crash(event, now),
            EventKind::Brake => {
                if self.crash.is_none() && !self.party {
                    self.brake_refreshed = Some(now);
                }
            }
            _ => {}
        }
        self.resolve(now, TransitionCause::Event(event.kind));

        // Forward onsets only, not every tick of a sustained event
        let forwarded = event.kind == EventKind::Crash || self.config.report_transient_events;
        if event.kind != self.last_kind && event.kind.is_reportable() && forwarded {
            self.outbox.push_back(Notification::Event(*event));
        }
        self.last_kind = event.kind;
    }

    fn enter_crash(&mut self, event: &DetectedEvent, now: Millis) {
        if self.crash.is_some() {
            // Never push the running timer back
            debug!("Crash at {} ms ignored, alert already active", now);
            return;
        }
        let timer = CrashTimer::arm(now, self.config.crash_confirmation_ms);
        warn!(
            "Crash detected at {} ms (peak {:.2} g), confirmation deadline {} ms",
            event.timestamp_ms, event.peak_accel, timer.deadline
        );
        self.crash = Some(CrashEpisode {
            entered_at: now,
            peak_accel: event.peak_accel,
            timer: Some(timer),
        });
        self.party = false;
        self.turn = None;
        self.brake_refreshed = None;
        self.outbox.push_back(Notification::CrashAlert {
            timestamp_ms: event.timestamp_ms,
            peak_accel: event.peak_accel,
        });
    }

    /// Apply one app command
    pub fn apply_command(&mut self, command: Command, now: Millis) -> CommandOutcome {
        let outcome = self.command_outcome(command, now);
        match outcome {
            CommandOutcome::Applied => {
                debug!("Command {:?} applied at {} ms", command, now);
                self.resolve(now, TransitionCause::Command(command));
            }
            CommandOutcome::Rejected => {
                warn!("Command {:?} rejected in {:?}", command, self.state)
            }
            CommandOutcome::TimerConflict => {
                warn!("False alarm at {} ms arrived after crash timer expiry", now)
            }
            CommandOutcome::NoOp => debug!("Command {:?} had no effect", command),
        }
        outcome
    }

    fn command_outcome(&mut self, command: Command, now: Millis) -> CommandOutcome {
        if let Some(episode) = self.crash {
            if !transition::admits(HelmetState::CrashAlert, command) {
                return CommandOutcome::Rejected;
            }
            return match episode.timer {
                Some(timer) if !timer.is_expired(now) => {
                    info!(
                        "Crash alert cancelled by rider with {} ms left",
                        timer.remaining_ms(now)
                    );
                    self.crash = None;
                    self.outbox
                        .push_back(Notification::CrashCancelled { at_ms: now });
                    CommandOutcome::Applied
                }
                _ => CommandOutcome::TimerConflict,
            };
        }

        match command {
            Command::CrashFalseAlarm => CommandOutcome::NoOp,
            Command::PartyModeOn => {
                if self.party {
                    return CommandOutcome::NoOp;
                }
                self.party = true;
                self.turn = None;
                self.brake_refreshed = None;
                CommandOutcome::Applied
            }
            Command::NormalMode => {
                if !self.party && self.turn.is_none() {
                    return CommandOutcome::NoOp;
                }
                self.party = false;
                self.turn = None;
                CommandOutcome::Applied
            }
            Command::TurnLeftOn => self.turn_on(TurnSide::Left),
            Command::TurnRightOn => self.turn_on(TurnSide::Right),
            Command::TurnLeftOff => self.turn_off(TurnSide::Left),
            Command::TurnRightOff => self.turn_off(TurnSide::Right),
        }
    }

    fn turn_on(&mut self, side: TurnSide) -> CommandOutcome {
        if self.party || self.turn == Some(side) {
            return CommandOutcome::NoOp;
        }
        self.turn = Some(side);
        CommandOutcome::Applied
    }

    fn turn_off(&mut self, side: TurnSide) -> CommandOutcome {
        if self.party || self.turn != Some(side) {
            return CommandOutcome::NoOp;
        }
        self.turn = None;
        CommandOutcome::Applied
    }

    /// Evaluate brake expiry and crash confirmation at `now`
    pub fn poll_timers(&mut self, now: Millis) {
        if let Some(refreshed) = self.brake_refreshed {
            if elapsed_ms(now, refreshed) >= self.config.brake_flash_ms {
                self.brake_refreshed = None;
                self.resolve(now, TransitionCause::BrakeExpired);
            }
        }

        if let Some(episode) = self.crash.as_mut() {
            if let Some(timer) = episode.timer {
                if timer.is_expired(now) {
                    episode.timer = None;
                    error!(
                        "Crash alert not cancelled within {} ms, escalating",
                        timer.duration_ms()
                    );
                    self.outbox.push_back(Notification::CrashEscalated {
                        entered_at_ms: episode.entered_at,
                        escalated_at_ms: now,
                        peak_accel: episode.peak_accel,
                    });
                }
            }
        }
    }

    /// Explicit external reset back to Normal
    pub fn reset(&mut self, now: Millis) {
        info!("State machine reset at {} ms", now);
        self.crash = None;
        self.party = false;
        self.brake_refreshed = None;
        self.turn = None;
        self.last_kind = EventKind::Normal;
        self.resolve(now, TransitionCause::Reset);
    }

    /// Take every pending notification, oldest first
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.outbox.drain(..).collect()
    }

    fn resolve(&mut self, now: Millis, cause: TransitionCause) {
        let next = if self.crash.is_some() {
            HelmetState::CrashAlert
        } else if self.party {
            HelmetState::Party
        } else if self.brake_refreshed.is_some() {
            HelmetState::Braking
        } else {
            match self.turn {
                Some(TurnSide::Left) => HelmetState::TurnLeft,
                Some(TurnSide::Right) => HelmetState::TurnRight,
                None => HelmetState::Normal,
            }
        };

        if next != self.state {
            info!("State {:?} -> {:?} ({:?})", self.state, next, cause);
            self.outbox.push_back(Notification::StateChanged {
                from: self.state,
                to: next,
                at_ms: now,
                cause,
            });
            self.state = next;
        }
    }
}

impl Default for HelmetStateMachine {
    fn default() -> Self {
        Self::new(StateMachineConfig::default())
    }
}
