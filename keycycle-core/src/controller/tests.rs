use keycycle_protocol::{notice::echo, Command, Notice, Report};

use super::*;
use crate::station::Station;
use crate::store::layout::record_address;
use crate::store::StateStore;
use crate::testing::{ActuatorCall, RamMemory, RecordingActuators, RecordingTelemetry, ScriptedSignal};

/// Raw reading with no current flowing
const REST: u16 = 2048;
/// Raw reading well above both channel minimums
const LOADED: u16 = 4000;
const TICK_MS: u32 = 5;

struct Rig {
    controller: Controller<RamMemory>,
    signal: ScriptedSignal,
    actuators: RecordingActuators,
    telemetry: RecordingTelemetry,
    now: u32,
    estop: bool,
    /// Station whose contacts never carry current
    dead_station: Option<u8>,
}

impl Rig {
    fn boot_with(config: TesterConfig, memory: RamMemory) -> Self {
        let mut telemetry = RecordingTelemetry::new();
        let controller = Controller::boot(config, memory, &mut telemetry);
        Self {
            controller,
            signal: ScriptedSignal::constant(REST, REST),
            actuators: RecordingActuators::new(),
            telemetry,
            now: 0,
            estop: false,
            dead_station: None,
        }
    }

    fn new() -> Self {
        Self::boot_with(TesterConfig::default(), RamMemory::new(4096))
    }

    fn tick(&mut self) {
        // Current flows only while a healthy station is in motion
        let loaded = self.controller.state().is_moving()
            && Some(self.controller.active_station()) != self.dead_station;
        let raw = if loaded { LOADED } else { REST };
        self.signal.set(raw, raw);

        self.controller.tick(
            self.now,
            self.estop,
            &mut self.signal,
            &mut self.actuators,
            &mut self.telemetry,
        );
        self.now = self.now.wrapping_add(TICK_MS);
    }

    fn tick_until(&mut self, limit: usize, mut done: impl FnMut(&Controller<RamMemory>) -> bool) {
        for _ in 0..limit {
            if done(&self.controller) {
                return;
            }
            self.tick();
        }
        panic!("condition not reached after {} ticks", limit);
    }

    fn command(&mut self, command: Command) {
        self.controller
            .handle_command(command, self.estop, &mut self.telemetry);
    }

    fn line(&mut self, line: &str) {
        self.controller
            .handle_line(line, self.estop, &mut self.telemetry);
    }

    fn station(&self, index: u8) -> Station {
        self.controller.registry().station(index).unwrap()
    }

    /// Power-cycle: boot a fresh controller on a copy of the device contents
    fn reboot(mut self) -> Self {
        let config = *self.controller.config();
        let store = self.controller.registry.store_mut().unwrap();
        let image = store.memory_mut().peek(0, 4096);
        let mut memory = RamMemory::new(4096);
        memory.poke(0, &image);
        Self::boot_with(config, memory)
    }
}

fn corrupt_records(stations: &[u8]) -> RamMemory {
    let mut store = StateStore::new(RamMemory::new(4096), 4).unwrap();
    store.initialize().unwrap();
    store.save_one(0, &Station { enabled: true, cycles: 5, failures: 0 }).unwrap();
    for &station in stations {
        // Enable flag outside 0/1
        store.memory_mut().poke(record_address(station) + 6, &[9]);
    }
    store.release()
}

#[test]
fn test_boot_blank_store() {
    let rig = Rig::new();
    assert!(rig.telemetry.has_notice(&Notice::StoreInitialized));
    assert!(rig.telemetry.has_notice(&Notice::SelfTestPassed));
    assert!(rig.telemetry.has_notice(&Notice::StationsLoaded));
    assert_eq!(rig.controller.state(), CycleState::Stopped);
    assert!(rig.controller.registry().has_store());

    let stations = rig.telemetry.station_reports();
    assert_eq!(stations.len(), 4);
    assert!(stations.iter().all(|s| s.enabled && s.cycles == 0 && s.failures == 0));
    assert!(rig
        .telemetry
        .reports
        .contains(&Report::System { running: false }));
}

#[test]
fn test_boot_restores_saved_state() {
    let mut store = StateStore::new(RamMemory::new(4096), 4).unwrap();
    store.initialize().unwrap();
    let saved = Station {
        enabled: false,
        cycles: 1234,
        failures: 10,
    };
    store.save_one(2, &saved).unwrap();
    let memory = store.release();

    let rig = Rig::boot_with(TesterConfig::default(), memory);
    assert!(rig.telemetry.has_notice(&Notice::StoreVerified));
    assert_eq!(rig.station(2), saved);
    assert_eq!(rig.controller.registry().enabled_count(), 3);
}

#[test]
fn test_boot_replaces_corrupt_record() {
    let rig = Rig::boot_with(TesterConfig::default(), corrupt_records(&[1]));
    assert!(rig.telemetry.has_notice(&Notice::InvalidRecord(1)));
    assert_eq!(rig.station(0).cycles, 5);
    assert_eq!(rig.station(1), Station::default());
}

#[test]
fn test_counts_on_replaced_record_survive_reboot() {
    let mut rig = Rig::boot_with(TesterConfig::default(), corrupt_records(&[1]));
    assert!(rig.telemetry.has_notice(&Notice::InvalidRecord(1)));
    assert!(!rig.telemetry.has_notice(&Notice::StoreReset));

    for failure in [false, true, false] {
        rig.controller
            .registry
            .record_cycle(1, failure, &mut rig.telemetry)
            .unwrap();
    }
    assert_eq!(rig.controller.registry().store_faults(), 0);

    let rig = rig.reboot();
    assert!(!rig.telemetry.has_notice(&Notice::InvalidRecord(1)));
    assert!(rig.telemetry.has_notice(&Notice::StationsLoaded));
    assert_eq!(rig.station(0).cycles, 5);
    assert_eq!(
        rig.station(1),
        Station {
            enabled: true,
            cycles: 3,
            failures: 1
        }
    );
}

#[test]
fn test_boot_resets_table_without_usable_records() {
    let rig = Rig::boot_with(TesterConfig::default(), corrupt_records(&[0, 1, 2, 3]));
    assert!(rig.telemetry.has_notice(&Notice::NoValidRecords));
    assert!(rig.telemetry.has_notice(&Notice::StoreReset));
    assert!(rig.controller.registry().stations().iter().all(|s| *s == Station::default()));

    let rig = rig.reboot();
    assert!(rig.telemetry.has_notice(&Notice::StationsLoaded));
    assert!(!rig.telemetry.has_notice(&Notice::NoValidRecords));
    assert!(!rig.telemetry.has_notice(&Notice::StoreReset));
}

#[test]
fn test_failed_record_repair_is_reported() {
    let mut memory = corrupt_records(&[1]);
    memory.drop_writes(true);

    let rig = Rig::boot_with(TesterConfig::default(), memory);
    assert!(rig.telemetry.has_notice(&Notice::StoreVerifyFailed(1)));
    assert!(rig.telemetry.has_notice(&Notice::InvalidRecord(1)));
    assert!(rig.telemetry.has_notice(&Notice::StationsLoaded));
    assert_eq!(rig.station(1), Station::default());
}

#[test]
fn test_boot_without_usable_store() {
    let rig = Rig::boot_with(TesterConfig::default(), RamMemory::new(8));
    assert!(rig.telemetry.has_notice(&Notice::StoreUnavailable));
    assert!(!rig.controller.registry().has_store());
    assert_eq!(rig.controller.registry().enabled_count(), 4);
}

#[test]
fn test_init_actuators() {
    let mut rig = Rig::new();
    rig.controller.init_actuators(&mut rig.actuators);
    assert_eq!(rig.actuators.calls.len(), 8);
    assert_eq!(
        rig.actuators.calls[0],
        ActuatorCall::Current {
            station: 0,
            percent: 10.0
        }
    );
    assert_eq!(
        rig.actuators.calls[1],
        ActuatorCall::Position {
            station: 0,
            degrees: 0.0
        }
    );
}

#[test]
fn test_stopped_homes_every_tick() {
    let mut rig = Rig::new();
    rig.tick();
    rig.tick();
    let positions = rig.actuators.positions();
    assert_eq!(positions.len(), 8);
    assert!(positions.iter().all(|&(_, deg)| deg == 0.0));
}

#[test]
fn test_start_and_stop_reports() {
    let mut rig = Rig::new();
    rig.telemetry.clear();

    rig.command(Command::Start);
    assert!(rig.controller.is_running());
    assert_eq!(
        rig.telemetry.reports,
        std::vec![
            Report::Event(Notice::SystemStarted),
            Report::System { running: true }
        ]
    );

    rig.telemetry.clear();
    rig.command(Command::Start);
    assert_eq!(rig.telemetry.notices(), std::vec![Notice::AlreadyRunning]);

    rig.telemetry.clear();
    rig.command(Command::Stop);
    assert_eq!(
        rig.telemetry.reports,
        std::vec![
            Report::Event(Notice::SystemStopped),
            Report::System { running: false }
        ]
    );

    rig.telemetry.clear();
    rig.command(Command::Stop);
    assert_eq!(rig.telemetry.notices(), std::vec![Notice::AlreadyStopped]);
}

#[test]
fn test_start_refused_while_estop_pressed() {
    let mut rig = Rig::new();
    rig.estop = true;
    rig.command(Command::Start);
    assert!(!rig.controller.is_running());
    assert!(rig
        .telemetry
        .has_notice(&Notice::StartBlockedByEmergencyStop));
}

#[test]
fn test_passing_cycle_is_counted_once() {
    let mut rig = Rig::new();
    rig.command(Command::Start);
    rig.tick_until(1000, |c| c.state() == CycleState::Waiting);

    let s = rig.station(0);
    assert_eq!((s.cycles, s.failures), (1, 0));
    assert_eq!(rig.controller.active_station(), 1);

    let cycles = rig.telemetry.cycle_reports();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].station, 0);
    assert!(cycles[0].keyswitch_amps > 5.0);
    assert!(cycles[0].starter_amps > 20.0);

    // Engaged then homed during the cycle
    let positions = rig.actuators.positions();
    assert!(positions.contains(&(0, 90.0)));
    assert_eq!(positions.last(), Some(&(0, 0.0)));
}

#[test]
fn test_failing_station_auto_disabled() {
    let mut rig = Rig::new();
    rig.dead_station = Some(2);
    rig.command(Command::Start);

    rig.tick_until(200_000, |c| !c.registry().is_enabled(2));

    let s = rig.station(2);
    assert_eq!(s.failures, 10);
    assert_eq!(s.cycles, 10);
    assert_eq!(rig.controller.registry().enabled_count(), 3);
    assert_eq!(rig.station(0).failures, 0);
    assert!(rig.telemetry.has_notice(&Notice::AutoDisabled {
        station: 2,
        failures: 10
    }));
    let last = rig.telemetry.cycle_reports().last().copied().unwrap();
    assert_eq!((last.station, last.enabled), (2, false));

    // The wait after the disabling cycle is paced for 3 stations
    assert_eq!(rig.controller.state(), CycleState::Waiting);
    let cycle_start = rig.controller.machine().cycle_start_ms();
    rig.tick_until(2000, |c| c.state() == CycleState::Ready);
    let waited = rig.now.wrapping_sub(TICK_MS).wrapping_sub(cycle_start);
    assert!((3333..3333 + TICK_MS).contains(&waited), "waited {}", waited);

    // Station 2 is skipped from now on
    for _ in 0..6 {
        rig.tick_until(2000, |c| c.state().is_moving());
        assert_ne!(rig.controller.active_station(), 2);
        rig.tick_until(2000, |c| c.state() == CycleState::Waiting);
    }
}

#[test]
fn test_emergency_stop_mid_motion() {
    let mut rig = Rig::new();
    rig.command(Command::Start);
    rig.tick_until(1000, |c| c.state() == CycleState::Waiting);
    rig.tick_until(1000, |c| c.state() == CycleState::ActuatingToStart);
    rig.tick();
    let active = rig.controller.active_station();
    assert_eq!(active, 1);

    rig.estop = true;
    rig.actuators.clear();
    rig.tick();
    assert_eq!(rig.controller.state(), CycleState::EmergencyStopped);
    let positions = rig.actuators.positions();
    assert_eq!(positions, std::vec![(0, 0.0), (1, 0.0), (2, 0.0), (3, 0.0)]);
    assert!(rig.telemetry.has_notice(&Notice::EmergencyStopDetected));

    // Held and then released: no automatic resume
    for _ in 0..10 {
        rig.tick();
    }
    rig.estop = false;
    for _ in 0..1000 {
        rig.tick();
    }
    assert_eq!(rig.controller.state(), CycleState::Stopped);
    assert!(rig.telemetry.has_notice(&Notice::EmergencyStopCleared));

    // The abandoned cycle was never counted
    assert_eq!(rig.station(1).cycles, 0);

    rig.command(Command::Start);
    assert_eq!(rig.controller.state(), CycleState::Ready);
    assert_eq!(rig.controller.active_station(), active);
}

#[test]
fn test_stop_abandons_cycle() {
    let mut rig = Rig::new();
    rig.command(Command::Start);
    rig.tick_until(1000, |c| c.state() == CycleState::ActuatingToHome);
    rig.command(Command::Stop);
    for _ in 0..1000 {
        rig.tick();
    }
    assert_eq!(rig.station(0).cycles, 0);
    assert_eq!(rig.controller.active_station(), 0);
}

#[test]
fn test_station_commands() {
    let mut rig = Rig::new();
    rig.telemetry.clear();

    rig.line("DISABLE:1");
    assert!(!rig.controller.registry().is_enabled(1));
    assert!(rig.telemetry.has_notice(&Notice::StationDisabled(1)));

    rig.line("ENABLE:1");
    assert!(rig.controller.registry().is_enabled(1));

    rig.telemetry.clear();
    rig.line("ENABLE:7");
    assert_eq!(rig.telemetry.notices(), std::vec![Notice::InvalidStation(7)]);
}

#[test]
fn test_reset_commands() {
    let mut rig = Rig::new();
    rig.line("STATE:10:2:20:3:30:4:40:5");
    rig.line("RESET_CYCLE:1");
    rig.line("RESET_FAIL:2");
    assert_eq!(rig.station(1).cycles, 0);
    assert_eq!(rig.station(1).failures, 3);
    assert_eq!(rig.station(2).cycles, 30);
    assert_eq!(rig.station(2).failures, 0);
}

#[test]
fn test_state_command_applies_all() {
    let mut rig = Rig::new();
    rig.telemetry.clear();
    rig.line("STATE:100:1:200:2:300:30:400:4");

    assert_eq!(rig.station(0).cycles, 100);
    assert_eq!(rig.station(3).failures, 4);
    // Trusted as-is: above threshold but still enabled
    assert_eq!(rig.station(2).failures, 30);
    assert!(rig.station(2).enabled);
    assert!(rig.telemetry.has_notice(&Notice::StateLoaded));
    assert_eq!(rig.telemetry.station_reports().len(), 4);
}

#[test]
fn test_state_command_wrong_count_rejected() {
    for line in ["STATE:1:1:1:1:1:1:1", "STATE:1:1:1:1:1:1:1:1:1"] {
        let mut rig = Rig::new();
        rig.telemetry.clear();
        rig.line(line);

        assert!(rig
            .controller
            .registry()
            .stations()
            .iter()
            .all(|s| *s == Station::default()));
        assert_eq!(rig.telemetry.reports.len(), 1, "{}", line);
        assert_eq!(rig.telemetry.error_count(), 1);
    }
}

#[test]
fn test_state_command_too_many_values() {
    let mut rig = Rig::new();
    rig.telemetry.clear();
    rig.line("STATE:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1");
    assert_eq!(
        rig.telemetry.notices(),
        std::vec![Notice::IncompleteState {
            expected: 8,
            received: 18
        }]
    );
}

#[test]
fn test_request_state() {
    let mut rig = Rig::new();
    rig.telemetry.clear();
    rig.line("REQUEST_STATE");
    assert_eq!(rig.telemetry.reports.len(), 5);
    assert_eq!(rig.telemetry.reports[0], Report::System { running: false });
    assert_eq!(rig.telemetry.station_reports()[3].station, 3);
}

#[test]
fn test_bad_lines_reported() {
    let mut rig = Rig::new();
    rig.telemetry.clear();
    rig.line("HELLO");
    rig.line("ENABLE:abc");
    rig.controller
        .reject_line(keycycle_protocol::LineError::TooLong, &mut rig.telemetry);
    assert_eq!(
        rig.telemetry.notices(),
        std::vec![
            Notice::UnrecognizedCommand(echo("HELLO")),
            Notice::InvalidArgument(echo("ENABLE:abc")),
            Notice::LineTooLong,
        ]
    );
}

#[test]
fn test_sample_failure_reported_once_per_cycle() {
    let mut rig = Rig::new();
    rig.command(Command::Start);
    rig.tick();
    rig.signal.fail(crate::traits::Channel::Starter);
    // The rig rewrites raw values each tick but keeps the failing channel
    rig.tick_until(1000, |c| c.state() == CycleState::Waiting);
    let failures = rig
        .telemetry
        .notices()
        .iter()
        .filter(|n| **n == Notice::CurrentReadFailed)
        .count();
    assert_eq!(failures, 1);
    // Starter never sampled, so the cycle fails
    assert_eq!(rig.station(0).failures, 1);

    rig.signal.heal();
    rig.tick_until(2000, |c| c.state() == CycleState::Ready);
    rig.tick_until(1000, |c| c.state() == CycleState::Waiting);
    assert_eq!(rig.station(1).failures, 0);
    assert_eq!(rig.telemetry.error_count(), 1);
}
