//! Control task
//!
//! Owns the controller and every peripheral it drives. Host lines are
//! applied first on each tick so a STOP or an emergency stop takes effect
//! before the next motion step.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker, Timer};

use keycycle_core::config::TesterConfig;
use keycycle_core::safety::EmergencyStop;
use keycycle_core::state::CycleState;
use keycycle_core::Controller;

use crate::board::{AdcSignal, ChannelTelemetry, EstopPin, FramStore, Servos};
use crate::channels::COMMAND_CHANNEL;

/// Control loop period
const CONTROL_TICK_MS: u64 = 2;

/// Control task - boot, calibrate, then run the cycle machine
#[embassy_executor::task]
pub async fn control_task(
    config: TesterConfig,
    memory: FramStore,
    mut signal: AdcSignal,
    mut servos: Servos,
    estop: EmergencyStop<EstopPin>,
) {
    info!("Control task started");

    let mut telemetry = ChannelTelemetry::new();
    let mut controller = Controller::boot(config, memory, &mut telemetry);
    info!(
        "{} stations, {} enabled (mask {=u8:#010b})",
        controller.registry().station_count(),
        controller.registry().enabled_count(),
        controller.registry().enabled_mask()
    );

    controller.init_actuators(&mut servos);

    // Zero-current offsets need the keys back at rest
    Timer::after_millis(u64::from(config.timing.home_duration_ms)).await;
    controller.calibrate(&mut signal, &mut telemetry);
    info!("Current sensors calibrated");

    let epoch = Instant::now();
    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_TICK_MS));
    let mut last_state = controller.state();
    let mut last_faults = controller.actuator_faults();
    let mut last_dropped = telemetry.dropped();

    loop {
        let estop_pressed = estop.is_pressed();

        while let Ok(received) = COMMAND_CHANNEL.try_receive() {
            match received {
                Ok(line) => controller.handle_line(&line, estop_pressed, &mut telemetry),
                Err(e) => controller.reject_line(e, &mut telemetry),
            }
        }

        // Wraps after ~49 days; the machine measures elapsed time with wrapping math
        let now_ms = epoch.elapsed().as_millis() as u32;
        controller.tick(now_ms, estop_pressed, &mut signal, &mut servos, &mut telemetry);

        let state = controller.state();
        if state != last_state {
            log_transition(last_state, state, controller.active_station());
            last_state = state;
        }

        let faults = controller.actuator_faults();
        if faults != last_faults {
            warn!("Servo bus: {} failed commands since boot", faults);
            last_faults = faults;
        }

        let dropped = telemetry.dropped();
        if dropped != last_dropped {
            warn!("Telemetry: {} reports dropped", dropped);
            last_dropped = dropped;
        }

        ticker.next().await;
    }
}

fn log_transition(from: CycleState, to: CycleState, station: u8) {
    match to {
        CycleState::EmergencyStopped => error!("Emergency stop ({:?} -> {:?})", from, to),
        _ if to.is_moving() => debug!("Station {}: {:?} -> {:?}", station, from, to),
        _ => info!("{:?} -> {:?}", from, to),
    }
}
