//! Tester controller
//!
//! Owns the cycle machine, the station registry (and through it the
//! store) and the current monitor. The firmware calls [`Controller::tick`]
//! from its control loop and [`Controller::handle_command`] for every host
//! command, always from the same task.

use keycycle_hal::NvMemory;
use keycycle_protocol::{Command, CommandError, CycleReport, LineError, Notice, Report};

use crate::config::TesterConfig;
use crate::current::CurrentMonitor;
use crate::state::{Action, CycleMachine, CycleProfile, CycleState, TickInput};
use crate::station::registry::store_failure;
use crate::station::{Station, StationRegistry};
use crate::store::{InitOutcome, RecordVerdict, StateStore, StoreError, STORE_VERSION};
use crate::traits::{ActuatorBus, SignalSource, Telemetry};

/// Top-level tester logic
pub struct Controller<M: NvMemory> {
    config: TesterConfig,
    machine: CycleMachine,
    registry: StationRegistry<M>,
    monitor: CurrentMonitor,
    /// A sample failure was already reported for the current cycle
    sample_fault_reported: bool,
    actuator_faults: u32,
}

impl<M: NvMemory> Controller<M> {
    /// Bring up the store, load station state and report it
    ///
    /// Store problems are reported and never stop the boot: without a
    /// usable store the tester runs on in-memory defaults.
    pub fn boot<T: Telemetry>(config: TesterConfig, memory: M, telemetry: &mut T) -> Self {
        let store = open_store(memory, config.station_count, telemetry);
        let mut registry =
            StationRegistry::new(config.station_count, config.failure_threshold, store);
        load_stations(&mut registry, telemetry);

        let controller = Self {
            machine: CycleMachine::new(registry.station_count(), CycleProfile::from_config(&config)),
            monitor: CurrentMonitor::new(&config),
            config,
            registry,
            sample_fault_reported: false,
            actuator_faults: 0,
        };
        controller.report_state(telemetry);
        controller
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    pub fn state(&self) -> CycleState {
        self.machine.state()
    }

    pub fn machine(&self) -> &CycleMachine {
        &self.machine
    }

    pub fn active_station(&self) -> u8 {
        self.machine.active_station()
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    pub fn registry(&self) -> &StationRegistry<M> {
        &self.registry
    }

    pub fn monitor(&self) -> &CurrentMonitor {
        &self.monitor
    }

    /// Actuator commands that failed to send since boot
    pub fn actuator_faults(&self) -> u32 {
        self.actuator_faults
    }

    /// Configure every station's actuator and send it home
    pub fn init_actuators<A: ActuatorBus>(&mut self, actuators: &mut A) {
        for station in 0..self.registry.station_count() {
            if actuators
                .prepare(station, self.config.servo.torque_percent)
                .is_err()
            {
                self.actuator_faults = self.actuator_faults.saturating_add(1);
            }
            self.drive(actuators, station, self.config.servo.home_degrees);
        }
    }

    /// Measure zero-current offsets (no current may be flowing)
    pub fn calibrate<S: SignalSource, T: Telemetry>(&mut self, signal: &mut S, telemetry: &mut T) {
        if self.monitor.calibrate(signal).is_err() {
            telemetry.send(Notice::CalibrationFailed.into());
        }
    }

    /// Run one control tick
    pub fn tick<S, A, T>(
        &mut self,
        now_ms: u32,
        estop_pressed: bool,
        signal: &mut S,
        actuators: &mut A,
        telemetry: &mut T,
    ) where
        S: SignalSource,
        A: ActuatorBus,
        T: Telemetry,
    {
        let input = TickInput {
            now_ms,
            estop_pressed,
            active_enabled: self.registry.is_enabled(self.machine.active_station()),
            enabled_count: self.registry.enabled_count(),
            peaks: self.monitor.peaks(),
        };
        let (next, actions) = self.machine.transition(&input);
        self.machine = next;

        for action in actions {
            self.apply(action, signal, actuators, telemetry);
        }
    }

    fn apply<S, A, T>(&mut self, action: Action, signal: &mut S, actuators: &mut A, telemetry: &mut T)
    where
        S: SignalSource,
        A: ActuatorBus,
        T: Telemetry,
    {
        let servo = self.config.servo;
        match action {
            Action::HomeAll => {
                for station in 0..self.registry.station_count() {
                    self.drive(actuators, station, servo.home_degrees);
                }
            }
            Action::Engage(station) => self.drive(actuators, station, servo.engage_degrees),
            Action::Home(station) => self.drive(actuators, station, servo.home_degrees),
            Action::Calibrate => self.calibrate(signal, telemetry),
            Action::ResetPeaks => {
                self.monitor.reset();
                self.sample_fault_reported = false;
            }
            Action::Sample => {
                if self.monitor.sample(signal).is_err() && !self.sample_fault_reported {
                    self.sample_fault_reported = true;
                    telemetry.send(Notice::CurrentReadFailed.into());
                }
            }
            Action::RecordCycle {
                station,
                outcome,
                peaks,
            } => {
                if let Ok(updated) =
                    self.registry
                        .record_cycle(station, outcome.is_failure(), telemetry)
                {
                    telemetry.send(Report::Cycle(CycleReport {
                        station,
                        enabled: updated.enabled,
                        cycles: updated.cycles,
                        failures: updated.failures,
                        keyswitch_amps: peaks.keyswitch,
                        starter_amps: peaks.starter,
                    }));
                }
            }
            Action::Notify(notice) => telemetry.send(notice.into()),
            Action::ReportRunning => telemetry.send(Report::System {
                running: self.machine.is_running(),
            }),
        }
    }

    fn drive<A: ActuatorBus>(&mut self, actuators: &mut A, station: u8, degrees: f32) {
        if actuators.set_goal_position(station, degrees).is_err() {
            self.actuator_faults = self.actuator_faults.saturating_add(1);
        }
    }

    /// Parse and apply one host line
    pub fn handle_line<T: Telemetry>(&mut self, line: &str, estop_pressed: bool, telemetry: &mut T) {
        match Command::parse(line) {
            Ok(command) => self.handle_command(command, estop_pressed, telemetry),
            Err(e) => self.reject_command(e, telemetry),
        }
    }

    /// Report a line the host link could not deliver intact
    pub fn reject_line<T: Telemetry>(&self, error: LineError, telemetry: &mut T) {
        let notice = match error {
            LineError::TooLong => Notice::LineTooLong,
            LineError::InvalidUtf8 => Notice::InvalidText,
        };
        telemetry.send(notice.into());
    }

    /// Report a line that did not parse as a command
    pub fn reject_command<T: Telemetry>(&self, error: CommandError, telemetry: &mut T) {
        let notice = match error {
            CommandError::Unrecognized(text) => Notice::UnrecognizedCommand(text),
            CommandError::InvalidArgument(text) => Notice::InvalidArgument(text),
            CommandError::TooManyValues(count) => Notice::IncompleteState {
                expected: self.registry.station_count() * 2,
                received: count.min(u8::MAX as usize) as u8,
            },
        };
        telemetry.send(notice.into());
    }

    /// Apply one host command
    pub fn handle_command<T: Telemetry>(&mut self, command: Command, estop_pressed: bool, telemetry: &mut T) {
        match command {
            Command::Start => {
                let was_running = self.machine.is_running();
                let (next, notice) = self.machine.start(estop_pressed);
                self.machine = next;
                telemetry.send(notice.into());
                if self.machine.is_running() != was_running {
                    telemetry.send(Report::System { running: true });
                }
            }
            Command::Stop => {
                let was_running = self.machine.is_running();
                let (next, notice) = self.machine.stop();
                self.machine = next;
                telemetry.send(notice.into());
                if was_running {
                    telemetry.send(Report::System { running: false });
                }
            }
            Command::Enable(station) => {
                let _ = self.registry.enable(station, telemetry);
            }
            Command::Disable(station) => {
                let _ = self.registry.disable(station, telemetry);
            }
            Command::ResetCycles(station) => {
                let _ = self.registry.reset_cycles(station, telemetry);
            }
            Command::ResetFailures(station) => {
                let _ = self.registry.reset_failures(station, telemetry);
            }
            Command::State(values) => self.load_state(&values, telemetry),
            Command::RequestState => self.report_state(telemetry),
        }
    }

    /// Apply a `STATE:` payload, all or nothing
    fn load_state<T: Telemetry>(&mut self, values: &[u32], telemetry: &mut T) {
        let count = self.registry.station_count();
        let expected = count as usize * 2;
        if values.len() != expected {
            telemetry.send(
                Notice::IncompleteState {
                    expected: expected as u8,
                    received: values.len() as u8,
                }
                .into(),
            );
            return;
        }

        for (station, pair) in (0..count).zip(values.chunks_exact(2)) {
            let failures = u16::try_from(pair[1]).unwrap_or(u16::MAX);
            let _ = self
                .registry
                .set_counters(station, pair[0], failures, telemetry);
        }
        telemetry.send(Notice::StateLoaded.into());
    }

    /// Send the running flag followed by every station
    pub fn report_state<T: Telemetry>(&self, telemetry: &mut T) {
        telemetry.send(Report::System {
            running: self.machine.is_running(),
        });
        for station in 0..self.registry.station_count() {
            if let Some(report) = self.registry.report(station) {
                telemetry.send(Report::Station(report));
            }
        }
    }
}

fn open_store<M: NvMemory, T: Telemetry>(
    memory: M,
    station_count: u8,
    telemetry: &mut T,
) -> Option<StateStore<M>> {
    let Ok(mut store) = StateStore::new(memory, station_count) else {
        telemetry.send(Notice::StoreUnavailable.into());
        return None;
    };

    let notice = match store.initialize() {
        Ok(InitOutcome::Initialized) => Notice::StoreInitialized,
        Ok(InitOutcome::Verified) => Notice::StoreVerified,
        Ok(InitOutcome::VersionMismatch { found }) => Notice::StoreVersionMismatch {
            found,
            expected: STORE_VERSION,
        },
        Err(_) => {
            telemetry.send(Notice::StoreUnavailable.into());
            return None;
        }
    };
    telemetry.send(notice.into());

    // Reported only; a failed self-test does not block operation
    let notice = match store.self_test() {
        Ok(()) => Notice::SelfTestPassed,
        Err(_) => Notice::SelfTestFailed,
    };
    telemetry.send(notice.into());

    Some(store)
}

fn load_stations<M: NvMemory, T: Telemetry>(registry: &mut StationRegistry<M>, telemetry: &mut T) {
    let Some(store) = registry.store_mut() else {
        return;
    };
    let report = match store.load_all() {
        Ok(report) => report,
        Err(StoreError::NotInitialized) => {
            telemetry.send(Notice::StoreNotInitialized.into());
            return;
        }
        Err(_) => {
            telemetry.send(Notice::StoreUnavailable.into());
            return;
        }
    };

    // Invalid records are rewritten with defaults so later field writes
    // land on a record that validates on the next boot
    let mut repair_failed = false;
    for (index, verdict) in report.verdicts.iter().enumerate() {
        if *verdict != RecordVerdict::Invalid {
            continue;
        }
        let index = index as u8;
        if let Err(e) = store.save_one(index, &Station::default()) {
            telemetry.send(store_failure(index, e).into());
            repair_failed = true;
        }
    }
    for (index, (station, verdict)) in report.stations.iter().zip(report.verdicts.iter()).enumerate() {
        let index = index as u8;
        match verdict {
            RecordVerdict::Valid => {}
            RecordVerdict::Suspicious => telemetry.send(Notice::SuspiciousRecord(index).into()),
            RecordVerdict::Invalid => telemetry.send(Notice::InvalidRecord(index).into()),
        }
        let _ = registry.seed(index, *station);
    }

    let notice = if report.any_usable() {
        Notice::StationsLoaded
    } else {
        Notice::NoValidRecords
    };
    telemetry.send(notice.into());
    if !report.any_usable() && !repair_failed {
        telemetry.send(Notice::StoreReset.into());
    }
}

#[cfg(test)]
mod tests;
