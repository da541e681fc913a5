//! Full cycles against the in-process controller image.

use std::time::{Duration, Instant};

use ps_app::{AppError, CycleDriver, MainSettings};
use ps_config::{NumberField, SignalEntry, SignalMapFile};
use ps_core::{Clock, ManualClock};
use ps_process::{Command, ControlMode, TickOutcome};
use ps_protocol::{AdapterCall, AdapterError, MemoryAdapter, ProtocolManager};
use ps_sim::{SimulationManager, TANK_KIND};

const MS: Duration = Duration::from_millis(1);

fn driver(mode: ControlMode) -> (CycleDriver, MemoryAdapter) {
    let settings = MainSettings {
        control_mode: mode,
        ..MainSettings::default()
    };
    let protocols = ProtocolManager::new();
    let image = protocols.memory_image();
    let mut sims = SimulationManager::with_builtin();
    sims.load(TANK_KIND, "tank").unwrap();
    (CycleDriver::new(settings, protocols, sims), image)
}

fn valve_in(driver: &CycleDriver) -> f64 {
    driver.sims().active().unwrap().status().valve_in_fraction
}

#[test]
fn controller_drives_valve_and_sees_level() {
    let (mut driver, image) = driver(ControlMode::Plc);
    let t0 = Instant::now();
    driver.connect(t0).unwrap();
    assert!(driver.is_connected());
    driver.sims_mut().start().unwrap();

    image.set_output_bit(0, 0, true);
    let report = driver.run_cycle(t0);
    assert!(report.synced);
    assert_eq!(report.tick, Some(TickOutcome::Started));
    assert_eq!(valve_in(&driver), 1.0);
    // 100 of 200 liters at the time of the write.
    assert_eq!(image.input_word(2), 13824);

    let report = driver.run_cycle(t0 + 100 * MS);
    assert_eq!(report.tick, Some(TickOutcome::Advanced));
    let volume = driver.sims().active().unwrap().status().volume;
    assert!(volume > 100.0, "volume {volume}");
}

#[test]
fn lost_link_releases_actuators_once() {
    let (mut driver, image) = driver(ControlMode::Plc);
    let t0 = Instant::now();
    driver.connect(t0).unwrap();
    image.set_output_bit(0, 0, true);
    driver.run_cycle(t0);
    assert_eq!(valve_in(&driver), 1.0);

    image.drop_link();
    let report = driver.run_cycle(t0 + 100 * MS);
    assert!(report.link_lost);
    assert!(!report.synced);
    assert!(!driver.is_connected());
    assert_eq!(valve_in(&driver), 0.0);

    let report = driver.run_cycle(t0 + 200 * MS);
    assert!(!report.link_lost);
    assert!(!report.synced);
    assert!(report.tick.is_some());
}

#[test]
fn failed_connect_leaves_driver_disconnected() {
    let (mut driver, image) = driver(ControlMode::Plc);
    image.set_reachable(false);
    let err = driver.connect(Instant::now()).unwrap_err();
    assert!(matches!(err, AppError::Adapter(AdapterError::ConnectFailed(_))));
    assert!(!driver.is_connected());

    image.set_reachable(true);
    image.set_fail_resets(true);
    assert!(driver.connect(Instant::now()).is_err());
    assert!(!driver.is_connected());
}

#[test]
fn unconnected_release_depends_on_mode() {
    let (mut driver, _image) = driver(ControlMode::Plc);
    let t0 = Instant::now();
    driver.sims_mut().active_mut().unwrap().status_mut().valve_in_fraction = 0.7;
    driver.run_cycle(t0);
    assert_eq!(valve_in(&driver), 0.0);

    driver.set_control_mode(ControlMode::Gui);
    driver.sims_mut().active_mut().unwrap().status_mut().valve_in_fraction = 0.7;
    driver.run_cycle(t0 + 100 * MS);
    assert_eq!(valve_in(&driver), 0.7);
}

#[test]
fn clicked_button_reaches_controller_then_clears() {
    let (mut driver, image) = driver(ControlMode::Plc);
    let t0 = Instant::now();
    driver.connect(t0).unwrap();

    driver.click(Command::Start, t0);
    driver.run_cycle(t0);
    assert!(image.input_bit(0, 2));

    // The pulse spans two cycles plus the debounce window.
    driver.run_cycle(t0 + 100 * MS);
    driver.run_cycle(t0 + 200 * MS);
    assert!(image.input_bit(0, 2));

    // Released at 300 ms; the falling edge settles one cycle later.
    driver.run_cycle(t0 + 300 * MS);
    assert!(image.input_bit(0, 2));
    driver.run_cycle(t0 + 400 * MS);
    assert!(!image.input_bit(0, 2));
}

fn start_writes(image: &MemoryAdapter) -> Vec<bool> {
    image
        .writes()
        .into_iter()
        .filter_map(|call| match call {
            AdapterCall::SetDigitalInput {
                byte: 0,
                bit: 2,
                value,
            } => Some(value),
            _ => None,
        })
        .collect()
}

#[test]
fn click_between_cycles_is_debounced_and_delivered() {
    let (mut driver, image) = driver(ControlMode::Plc);
    let t0 = Instant::now();
    driver.connect(t0).unwrap();
    driver.run_cycle(t0);
    image.clear_calls();

    driver.click(Command::Start, t0 + 150 * MS);
    for step in 2..=7 {
        driver.run_cycle(t0 + step * 100 * MS);
    }
    assert_eq!(start_writes(&image), vec![true, false]);
    assert!(!image.input_bit(0, 2));
}

#[test]
fn click_reaches_controller_at_slow_cycle_rate() {
    let settings = MainSettings {
        cycle_interval_ms: 250,
        ..MainSettings::default()
    };
    let protocols = ProtocolManager::new();
    let image = protocols.memory_image();
    let mut sims = SimulationManager::with_builtin();
    sims.load(TANK_KIND, "tank").unwrap();
    let mut driver = CycleDriver::new(settings, protocols, sims);

    let t0 = Instant::now();
    driver.connect(t0).unwrap();
    driver.run_cycle(t0);
    image.clear_calls();

    driver.click(Command::Stop, t0 + 10 * MS);
    let mut raised = false;
    for step in 1..=6 {
        driver.run_cycle(t0 + step * 250 * MS);
        raised |= image.input_bit(0, 3);
    }
    assert!(raised);
    assert!(!image.input_bit(0, 3));
}

#[test]
fn reloaded_map_stops_exchange_of_dropped_signal() {
    let (mut driver, image) = driver(ControlMode::Plc);
    let t0 = Instant::now();
    driver.connect(t0).unwrap();
    driver.run_cycle(t0);

    let file = SignalMapFile {
        signals: vec![SignalEntry {
            name: "Sim_WaterTemperatureMeasurement".into(),
            signal_type: Some("int".into()),
            byte: NumberField::Number(4),
            bit: NumberField::Empty,
            address: None,
        }],
    };
    let report = driver.apply_signal_map(&file, t0 + 100 * MS).unwrap();
    assert_eq!(report.applied, 1);

    image.clear_calls();
    driver.run_cycle(t0 + 100 * MS);
    let touched: Vec<_> = image.writes();
    assert!(!touched.is_empty());
    assert!(touched.iter().all(|call| format!("{call:?}").contains("byte: 4")));
}

#[test]
fn is_due_follows_cycle_interval() {
    let (mut driver, _image) = driver(ControlMode::Gui);
    let t0 = Instant::now();
    assert!(driver.is_due(t0));
    driver.run_cycle(t0);
    assert!(!driver.is_due(t0 + 99 * MS));
    assert!(driver.is_due(t0 + 100 * MS));
}

#[test]
fn state_file_restores_through_driver() {
    let path = std::env::temp_dir().join(format!("ps_app_driver_{}.json", std::process::id()));
    let (mut source, _image) = driver(ControlMode::Gui);
    source.sims_mut().active_mut().unwrap().status_mut().volume = 77.0;
    source.save_state(&path, "driver test").unwrap();

    let (mut target, _image) = driver(ControlMode::Plc);
    let report = target.load_state(&path, Instant::now()).unwrap();
    assert_eq!(target.control_mode(), ControlMode::Gui);
    assert!(!report.released_actuators);
    assert_eq!(target.sims().active().unwrap().status().volume, 77.0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn manual_clock_paces_the_loop() {
    let clock = ManualClock::new();
    let (mut driver, _image) = driver(ControlMode::Gui);
    driver.sims_mut().start().unwrap();

    let mut cycles = 0;
    for _ in 0..50 {
        if driver.is_due(clock.now()) {
            driver.run_cycle(clock.now());
            cycles += 1;
        }
        clock.advance(20 * MS);
    }
    // One second of 20 ms steps at a 100 ms interval.
    assert_eq!(cycles, 10);
}
