//! State machine definition
//!
//! Motion, sampling and counting are all a function of the current state
//! and the inputs of one tick.

use keycycle_protocol::Notice;

use super::actions::{Action, Actions, TickInput};
use crate::config::TesterConfig;

/// Machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleState {
    /// Stop input asserted; every actuator held home
    EmergencyStopped,
    /// Idle, actuators home
    Stopped,
    /// About to begin a cycle on the active station
    Ready,
    /// Driving the active station toward start
    ActuatingToStart,
    /// Driving the active station back home
    ActuatingToHome,
    /// Classifying and counting the finished cycle
    Processing,
    /// Pacing before the next cycle
    Waiting,
}

impl CycleState {
    /// Whether the tester is cycling (anything but the two idle states)
    pub fn is_running(&self) -> bool {
        !matches!(self, CycleState::EmergencyStopped | CycleState::Stopped)
    }

    /// Whether an actuator is mid-motion and current is being sampled
    pub fn is_moving(&self) -> bool {
        matches!(self, CycleState::ActuatingToStart | CycleState::ActuatingToHome)
    }
}

/// Timing and pass limits for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleProfile {
    pub start_ms: u32,
    pub home_ms: u32,
    pub cycles_per_minute: u16,
    pub keyswitch_min_amps: f32,
    pub starter_min_amps: f32,
}

impl CycleProfile {
    pub fn from_config(config: &TesterConfig) -> Self {
        Self {
            start_ms: config.timing.start_duration_ms,
            home_ms: config.timing.home_duration_ms,
            cycles_per_minute: config.timing.cycles_per_minute,
            keyswitch_min_amps: config.keyswitch.min_peak_amps,
            starter_min_amps: config.starter.min_peak_amps,
        }
    }

    /// Cycle-start to cycle-start period for `enabled` stations
    pub fn period_ms(&self, enabled: u8) -> u32 {
        if enabled == 0 || self.cycles_per_minute == 0 {
            return 0;
        }
        60_000 / (self.cycles_per_minute as u32 * enabled as u32)
    }
}

/// The cycle machine: state plus the context it needs between ticks
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleMachine {
    state: CycleState,
    active: u8,
    cycle_start_ms: u32,
    station_count: u8,
    profile: CycleProfile,
}

fn push(actions: &mut Actions, action: Action) {
    // MAX_ACTIONS covers the longest transition
    let _ = actions.push(action);
}

impl CycleMachine {
    /// New machine, stopped, with station 0 active
    pub fn new(station_count: u8, profile: CycleProfile) -> Self {
        Self {
            state: CycleState::Stopped,
            active: 0,
            cycle_start_ms: 0,
            station_count: station_count.max(1),
            profile,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Station that is, or will next be, cycled
    pub fn active_station(&self) -> u8 {
        self.active
    }

    pub fn cycle_start_ms(&self) -> u32 {
        self.cycle_start_ms
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn profile(&self) -> &CycleProfile {
        &self.profile
    }

    fn next_station(&self) -> u8 {
        (self.active + 1) % self.station_count
    }

    /// Advance one tick
    ///
    /// The emergency stop is checked first and suppresses everything else
    /// in the tick.
    pub fn transition(&self, input: &TickInput) -> (Self, Actions) {
        use CycleState::*;

        let mut next = *self;
        let mut actions = Actions::new();

        if input.estop_pressed {
            if self.state != EmergencyStopped {
                push(&mut actions, Action::Notify(Notice::EmergencyStopDetected));
                next.state = EmergencyStopped;
                if self.state.is_running() {
                    push(&mut actions, Action::ReportRunning);
                }
            }
            push(&mut actions, Action::HomeAll);
            return (next, actions);
        }

        let elapsed = input.now_ms.wrapping_sub(self.cycle_start_ms);

        match self.state {
            EmergencyStopped => {
                // Released: idle, never resume
                next.state = Stopped;
                push(&mut actions, Action::Notify(Notice::EmergencyStopCleared));
                push(&mut actions, Action::HomeAll);
            }
            Stopped => push(&mut actions, Action::HomeAll),
            Ready => {
                if input.active_enabled {
                    next.cycle_start_ms = input.now_ms;
                    next.state = ActuatingToStart;
                    push(&mut actions, Action::Calibrate);
                    push(&mut actions, Action::ResetPeaks);
                } else {
                    next.active = self.next_station();
                }
            }
            ActuatingToStart => {
                push(&mut actions, Action::Sample);
                if elapsed >= self.profile.start_ms {
                    next.state = ActuatingToHome;
                    push(&mut actions, Action::Home(self.active));
                } else {
                    push(&mut actions, Action::Engage(self.active));
                }
            }
            ActuatingToHome => {
                push(&mut actions, Action::Sample);
                if elapsed >= self.profile.start_ms.saturating_add(self.profile.home_ms) {
                    next.state = Processing;
                } else {
                    push(&mut actions, Action::Home(self.active));
                }
            }
            Processing => {
                let outcome = input
                    .peaks
                    .classify(self.profile.keyswitch_min_amps, self.profile.starter_min_amps);
                push(
                    &mut actions,
                    Action::RecordCycle {
                        station: self.active,
                        outcome,
                        peaks: input.peaks,
                    },
                );
                next.active = self.next_station();
                next.state = Waiting;
            }
            Waiting => {
                if elapsed >= self.profile.period_ms(input.enabled_count) {
                    next.state = Ready;
                }
            }
        }

        (next, actions)
    }

    /// Handle a start request
    ///
    /// From `Stopped` the machine enters `Ready` with the active station
    /// unchanged. From `EmergencyStopped` with the input released it only
    /// acknowledges into `Stopped`.
    pub fn start(&self, estop_pressed: bool) -> (Self, Notice) {
        let mut next = *self;
        let notice = match self.state {
            s if s.is_running() => Notice::AlreadyRunning,
            _ if estop_pressed => Notice::StartBlockedByEmergencyStop,
            CycleState::EmergencyStopped => {
                next.state = CycleState::Stopped;
                Notice::EmergencyStopCleared
            }
            _ => {
                next.state = CycleState::Ready;
                Notice::SystemStarted
            }
        };
        (next, notice)
    }

    /// Handle a stop request
    ///
    /// An in-flight cycle is abandoned uncounted and the active station is
    /// kept, so the next start retries it.
    pub fn stop(&self) -> (Self, Notice) {
        let mut next = *self;
        if !self.state.is_running() {
            return (next, Notice::AlreadyStopped);
        }
        next.state = CycleState::Stopped;
        (next, Notice::SystemStopped)
    }
}
