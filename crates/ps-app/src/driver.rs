//! The cycle driver: one context object owning the controller link, the sync
//! engine and the simulations, advanced one cycle at a time.

use std::path::Path;
use std::time::{Duration, Instant};

use ps_config::{DEFAULT_BYTE_RANGE, ReloadReport, SignalMapFile, load_signal_map};
use ps_core::timing::{CycleTimings, PhaseTimer};
use ps_process::{Command, ControlMode, TickOutcome};
use ps_protocol::ProtocolManager;
use ps_sim::{LoadReport, SimError, SimulationManager, StateDocument, load_state, save_state};
use ps_sync::{ButtonPulses, ForcedValues, IoSyncEngine, SyncIo, SyncSettings};
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::settings::MainSettings;

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// The controller image was exchanged.
    pub synced: bool,
    /// The link dropped during this cycle.
    pub link_lost: bool,
    /// Outcome of the physics tick, `None` without an active simulation.
    pub tick: Option<TickOutcome>,
}

pub struct CycleDriver {
    settings: MainSettings,
    protocols: ProtocolManager,
    engine: IoSyncEngine,
    sims: SimulationManager,
    pulses: ButtonPulses,
    forced: ForcedValues,
    timings: CycleTimings,
    connected: bool,
    last_cycle: Option<Instant>,
}

impl CycleDriver {
    pub fn new(settings: MainSettings, protocols: ProtocolManager, sims: SimulationManager) -> Self {
        let sync = SyncSettings::default();
        let pulses = ButtonPulses::for_cycle(
            Duration::from_millis(settings.cycle_interval_ms),
            sync.ton_window,
        );
        Self {
            settings,
            protocols,
            engine: IoSyncEngine::new(sync),
            sims,
            pulses,
            forced: ForcedValues::new(),
            timings: CycleTimings::default(),
            connected: false,
            last_cycle: None,
        }
    }

    /// Driver with the built-in simulations, the configured kind loaded and
    /// the configured signal map applied.
    pub fn from_settings(settings: MainSettings) -> AppResult<Self> {
        let mut sims = SimulationManager::with_builtin();
        sims.load(&settings.simulation, "main")?;
        let io_path = settings.io_config_path.clone();
        let mut driver = Self::new(settings, ProtocolManager::new(), sims);
        if let Some(path) = io_path {
            driver.load_signal_map(&path, Instant::now())?;
        }
        Ok(driver)
    }

    pub fn settings(&self) -> &MainSettings {
        &self.settings
    }

    pub fn control_mode(&self) -> ControlMode {
        self.settings.control_mode
    }

    /// Switching away from the controller releases the actuators on the next sync.
    pub fn set_control_mode(&mut self, mode: ControlMode) {
        if self.settings.control_mode != mode {
            info!(from = %self.settings.control_mode, to = %mode, "control mode changed");
            self.settings.control_mode = mode;
        }
    }

    pub fn sims(&self) -> &SimulationManager {
        &self.sims
    }

    pub fn sims_mut(&mut self) -> &mut SimulationManager {
        &mut self.sims
    }

    pub fn protocols(&self) -> &ProtocolManager {
        &self.protocols
    }

    pub fn protocols_mut(&mut self) -> &mut ProtocolManager {
        &mut self.protocols
    }

    pub fn engine(&self) -> &IoSyncEngine {
        &self.engine
    }

    pub fn forced_mut(&mut self) -> &mut ForcedValues {
        &mut self.forced
    }

    pub fn timings(&self) -> &CycleTimings {
        &self.timings
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.settings.cycle_interval_ms)
    }

    /// True once the cycle interval has passed since the last cycle.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_cycle
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval())
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.protocols.is_connected()
    }

    /// Open the configured controller link and clear its I/O ranges.
    pub fn connect(&mut self, now: Instant) -> AppResult<()> {
        self.connected = false;
        let range = self
            .sims
            .active()
            .map(|sim| sim.address_map().byte_range())
            .unwrap_or(DEFAULT_BYTE_RANGE);
        self.protocols.initialize(&self.settings.connection, range)?;
        self.engine.reset_for_connection(now);
        self.connected = true;
        info!(protocol = %self.settings.connection.protocol, ip = %self.settings.connection.ip, "controller connected");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            info!("controller disconnected");
        }
        self.protocols.disconnect();
        self.connected = false;
    }

    pub fn press(&mut self, cmd: Command, now: Instant) {
        if let Some(sim) = self.sims.active_mut() {
            self.pulses.press(cmd, sim.status_mut(), now);
        }
    }

    pub fn release(&mut self, cmd: Command) {
        self.pulses.release(cmd);
    }

    pub fn click(&mut self, cmd: Command, now: Instant) {
        if let Some(sim) = self.sims.active_mut() {
            self.pulses.click(cmd, sim.status_mut(), now);
        }
    }

    /// Replace the active signal map from `file`.
    pub fn apply_signal_map(&mut self, file: &SignalMapFile, now: Instant) -> AppResult<ReloadReport> {
        let sim = self.sims.active_mut().ok_or(SimError::NoActiveSimulation)?;
        let (map, report) = sim.address_map().reloaded(file);
        sim.set_address_map(map);
        self.engine.start_force_write_window(now);
        Ok(report)
    }

    pub fn load_signal_map(&mut self, path: &Path, now: Instant) -> AppResult<ReloadReport> {
        let file = load_signal_map(path)?;
        let report = self.apply_signal_map(&file, now)?;
        info!(path = %path.display(), "signal map applied");
        Ok(report)
    }

    pub fn save_state(&self, path: &Path, description: &str) -> AppResult<StateDocument> {
        let doc = save_state(
            path,
            &self.settings,
            &self.sims,
            description,
            self.settings.io_config_path.as_deref(),
        )?;
        Ok(doc)
    }

    /// Restore a session. Control mode and connection settings come from the file.
    pub fn load_state(&mut self, path: &Path, now: Instant) -> AppResult<LoadReport> {
        let report = load_state(path, &mut self.settings, &mut self.sims)?;
        self.pulses = ButtonPulses::for_cycle(self.interval(), self.engine.settings().ton_window);
        self.engine.start_force_write_window(now);
        Ok(report)
    }

    /// One cycle: controller exchange (or actuator release), then physics.
    pub fn run_cycle(&mut self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();
        let dt = self.cycle_dt();
        self.last_cycle = Some(now);

        let mode = self.settings.control_mode;
        let Some(sim) = self.sims.active_mut() else {
            debug!("no active simulation, cycle skipped");
            return report;
        };
        self.pulses.update(sim.status_mut(), now);

        let adapter = if self.connected {
            self.protocols.adapter_mut()
        } else {
            None
        };
        match adapter {
            Some(adapter) => {
                let parts = sim.parts_mut();
                let timer = PhaseTimer::start(&self.timings.sync);
                let result = self.engine.sync(SyncIo {
                    adapter,
                    map: parts.map,
                    params: parts.params,
                    status: parts.status,
                    forced: &self.forced,
                    mode,
                    now,
                });
                timer.stop();
                match result {
                    Ok(()) => report.synced = true,
                    Err(e) if e.is_connection_loss() => {
                        warn!(error = %e, "controller link lost");
                        self.protocols.disconnect();
                        self.connected = false;
                        self.engine.release_outputs(sim.status_mut(), mode);
                        report.link_lost = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "sync pass aborted");
                    }
                }
            }
            None => {
                self.engine.release_outputs(sim.status_mut(), mode);
            }
        }

        let timer = PhaseTimer::start(&self.timings.tick);
        report.tick = Some(sim.update(dt));
        timer.stop();
        report
    }

    /// The model always steps by its own interval; wall-clock jitter only
    /// changes how often cycles run.
    fn cycle_dt(&self) -> f64 {
        self.sims
            .active()
            .map(|sim| sim.params().simulation_interval)
            .unwrap_or(self.interval().as_secs_f64())
    }
}

impl std::fmt::Debug for CycleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleDriver")
            .field("control_mode", &self.settings.control_mode)
            .field("protocols", &self.protocols)
            .field("sims", &self.sims)
            .field("connected", &self.connected)
            .finish()
    }
}
