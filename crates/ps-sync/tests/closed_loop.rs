//! Engine and tank model driven together, with the memory image playing
//! the controller.

use std::time::{Duration, Instant};

use ps_config::AddressMap;
use ps_core::ANALOG_SPAN;
use ps_process::{ControlMode, ProcessModel, ProcessStatus, TankModel, TankParams};
use ps_protocol::{MemoryAdapter, ProtocolAdapter};
use ps_sync::{ForcedValues, IoSyncEngine, SyncIo};

struct Plant {
    engine: IoSyncEngine,
    model: TankModel,
    image: MemoryAdapter,
    map: AddressMap,
    params: TankParams,
    status: ProcessStatus,
    forced: ForcedValues,
    now: Instant,
}

impl Plant {
    fn new(params: TankParams) -> Self {
        let mut image = MemoryAdapter::new();
        image.connect().unwrap();
        let status = ProcessStatus {
            sim_running: true,
            ..ProcessStatus::default()
        };
        Self {
            engine: IoSyncEngine::default(),
            model: TankModel::new(&params),
            image,
            map: AddressMap::with_defaults(),
            params,
            status,
            forced: ForcedValues::new(),
            now: Instant::now(),
        }
    }

    fn cycle(&mut self) {
        let mut adapter = self.image.clone();
        self.engine
            .sync(SyncIo {
                adapter: &mut adapter,
                map: &self.map,
                params: &self.params,
                status: &mut self.status,
                forced: &self.forced,
                mode: ControlMode::Plc,
                now: self.now,
            })
            .unwrap();
        let dt = self.params.simulation_interval;
        self.model.tick(&self.params, &mut self.status, dt);
        self.now += Duration::from_secs_f64(dt);
    }
}

#[test]
fn controller_fills_tank_and_sees_level() {
    let mut plant = Plant::new(TankParams::default());
    plant.image.set_output_bit(0, 0, true);

    // First cycle only arms the run edge.
    for _ in 0..11 {
        plant.cycle();
    }
    // 10 integrated ticks of 0.1 s at 5 l/s.
    assert!((plant.status.volume - 105.0).abs() < 1e-9);

    plant.cycle();
    let expected = (105.5 / 200.0 * ANALOG_SPAN as f64).round() as u16;
    let sent = plant.image.input_word(2);
    // The sensor word reflects the volume before this cycle's tick.
    assert_eq!(sent, (105.0 / 200.0 * ANALOG_SPAN as f64).round() as u16);
    plant.cycle();
    assert_eq!(plant.image.input_word(2), expected);
}

#[test]
fn high_level_switch_reaches_controller() {
    let mut plant = Plant::new(TankParams::default());
    plant.status.volume = 179.0;
    plant.image.set_output_bit(0, 0, true);

    for _ in 0..5 {
        plant.cycle();
    }
    assert!(plant.status.level_high);
    plant.cycle();
    assert!(plant.image.input_bit(0, 0));
    assert!(plant.image.input_bit(0, 1));
}

#[test]
fn forced_valve_overrides_controller_in_the_loop() {
    let mut plant = Plant::new(TankParams::default());
    plant.image.set_output_bit(0, 0, true);
    plant.forced.set(ps_config::Signal::ValveInOnOff, false);

    for _ in 0..10 {
        plant.cycle();
    }
    assert_eq!(plant.status.volume, 100.0);
}
