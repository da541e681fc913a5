//! Heated tank with inlet and outlet valves.

use ps_core::clamp_lenient;

use crate::delay::{DelayQueue, DelayedAttr};
use crate::model::{ProcessModel, TickOutcome};
use crate::params::TankParams;
use crate::status::ProcessStatus;

/// Smallest liquid mass basis used in the thermal model (liters).
pub const MIN_EFFECTIVE_VOLUME: f64 = 0.001;

/// Below this the tank counts as empty and the liquid snaps to ambient.
pub const EMPTY_VOLUME: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct TankModel {
    delay: DelayQueue,
    was_running: bool,
    /// Simulation time used to stamp delay samples (s).
    clock_s: f64,
}

impl TankModel {
    pub fn new(params: &TankParams) -> Self {
        Self {
            delay: DelayQueue::new(params),
            was_running: false,
            clock_s: 0.0,
        }
    }

    pub fn delay_queue(&self) -> &DelayQueue {
        &self.delay
    }
}

impl ProcessModel for TankModel {
    type Params = TankParams;

    fn tick(&mut self, params: &TankParams, status: &mut ProcessStatus, dt: f64) -> TickOutcome {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        // History first: a value pushed now is only read back on later ticks.
        self.delay.configure(params);
        self.clock_s += dt;
        self.delay.push(status, self.clock_s);

        if !status.sim_running {
            self.was_running = false;
            return TickOutcome::Stopped;
        }
        if !self.was_running {
            self.was_running = true;
            return TickOutcome::Started;
        }

        let valve_in = clamp_lenient(self.delay.delayed(DelayedAttr::ValveIn, status), 0.0, 1.0);
        let valve_out = clamp_lenient(self.delay.delayed(DelayedAttr::ValveOut, status), 0.0, 1.0);
        let heater = clamp_lenient(self.delay.delayed(DelayedAttr::Heater, status), 0.0, 1.0);

        advance_volume(params, status, valve_in, valve_out, dt);
        advance_temperature(params, status, heater, dt);
        TickOutcome::Advanced
    }

    fn reset(&mut self) {
        self.delay.clear();
        self.was_running = false;
        self.clock_s = 0.0;
    }
}

fn advance_volume(
    params: &TankParams,
    status: &mut ProcessStatus,
    valve_in: f64,
    valve_out: f64,
    dt: f64,
) {
    status.flow_in = params.valve_in_max_flow.max(0.0) * valve_in;
    status.flow_out = params.valve_out_max_flow.max(0.0) * valve_out;

    let next = status.volume + (status.flow_in - status.flow_out) * dt;
    status.volume = clamp_lenient(next, 0.0, params.capacity());

    // Two independent float switches; both can be made at once.
    status.level_high = status.volume >= params.level_high_trigger;
    status.level_low = status.volume >= params.level_low_trigger;
}

/// First-order lag toward the heat balance.
///
/// The naive Euler step `dT = net / C * dt` is damped by `dt / (tau + dt)`
/// with `tau = C / heat_loss`, so large steps approach equilibrium instead
/// of overshooting it.
fn advance_temperature(params: &TankParams, status: &mut ProcessStatus, heater: f64, dt: f64) {
    let ambient = params.ambient_temp;
    if status.volume <= EMPTY_VOLUME {
        status.temperature = ambient;
        return;
    }

    let volume = status.volume.max(MIN_EFFECTIVE_VOLUME);
    let heat_capacity = params.specific_heat_capacity * params.specific_weight * volume;
    if !(heat_capacity > 0.0) || !heat_capacity.is_finite() {
        status.temperature = clamp_lenient(status.temperature, ambient, params.max_temp());
        return;
    }

    let heat_in = params.heater_max_power.max(0.0) * heater;
    let heat_out = params.tank_heat_loss.max(0.0) * (status.temperature - ambient);
    let naive = (heat_in - heat_out) / heat_capacity * dt;

    let tau = if params.tank_heat_loss > 0.0 {
        heat_capacity / params.tank_heat_loss
    } else {
        f64::INFINITY
    };
    let damping = if tau.is_finite() && tau + dt > 0.0 {
        dt / (tau + dt)
    } else {
        // No loss path: plain Euler.
        1.0
    };

    status.temperature = clamp_lenient(
        status.temperature + naive * damping,
        ambient,
        params.max_temp(),
    );
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn state_stays_within_physical_bounds(
            tank in 0.0f64..1000.0,
            volume in -10.0f64..1200.0,
            temp in -50.0f64..200.0,
            valve_in in 0.0f64..1.0,
            valve_out in 0.0f64..1.0,
            heater in 0.0f64..1.0,
            heat_loss in 0.0f64..500.0,
            dt in 0.0f64..1000.0,
        ) {
            let params = TankParams {
                tank_volume: tank,
                tank_heat_loss: heat_loss,
                ..Default::default()
            };
            let mut status = ProcessStatus {
                volume,
                temperature: temp,
                valve_in_fraction: valve_in,
                valve_out_fraction: valve_out,
                heater_fraction: heater,
                sim_running: true,
                ..Default::default()
            };
            let mut model = TankModel::new(&params);
            model.tick(&params, &mut status, dt);
            for _ in 0..3 {
                model.tick(&params, &mut status, dt);
                prop_assert!(status.volume >= 0.0 && status.volume <= tank);
                prop_assert!(status.temperature >= params.ambient_temp);
                prop_assert!(status.temperature <= params.boiling_temp);
            }
        }

        #[test]
        fn stopped_model_never_changes_state(
            volume in 0.0f64..200.0,
            temp in 21.0f64..100.0,
            valve_in in 0.0f64..1.0,
            heater in 0.0f64..1.0,
            ticks in 1usize..20,
        ) {
            let params = TankParams::default();
            let mut status = ProcessStatus {
                volume,
                temperature: temp,
                valve_in_fraction: valve_in,
                heater_fraction: heater,
                sim_running: false,
                ..Default::default()
            };
            let mut model = TankModel::new(&params);
            for _ in 0..ticks {
                prop_assert_eq!(model.tick(&params, &mut status, 5.0), TickOutcome::Stopped);
                prop_assert_eq!(status.volume, volume);
                prop_assert_eq!(status.temperature, temp);
            }
        }
    }
}
