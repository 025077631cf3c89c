//! Simulation scheduler
//!
//! [`Engine`] owns the object registry, the material library and the
//! configuration, and drives the frame loop on a dedicated thread:
//!
//! ```text
//! Stopped ──start──▶ Running ──pause──▶ Paused
//!    ▲                  │                 │
//!    └──────stop────────┴──────stop───────┘      Paused ──start──▶ Running
//! ```
//!
//! Starting from Stopped resets every temperature and runs the optimizer
//! pipeline before the first frame. Resuming from Paused keeps temperatures and
//! the frame counter, and only re-optimizes if the topology changed while paused.
//!
//! Each frame fans out over a rayon pool of `max(cores - 2, 1)` workers:
//! 1. conduction → convection → radiation on every partition (joined)
//! 2. apply energy deltas on every partition (joined)
//! 3. widen the registry's temperature range, advance the frame counter
//!
//! A numeric fault aborts the loop, is logged, stored as [`Engine::last_error`]
//! and handed to the error sink. The mode stays Running until `stop()`.

pub mod config;
pub mod partition;
pub mod persistence;

pub use config::SimulationConfig;
pub use partition::{default_worker_count, round_robin, worker_count};
pub use persistence::{ObjectRecord, PersistenceError, Scene, SizeRecord};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core_types::material::{Material, MaterialLibrary};
use crate::error::{EngineError, SimulationError};
use crate::grid::object::{CompositeObject, ObjectChange};
use crate::grid::registry::ObjectRegistry;
use crate::optimizer::{optimize, OptimizerProgress, OptimizerReport};
use crate::physics::transfer_managers;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationMode {
    Stopped,
    Running,
    Paused,
}

/// Callback invoked once when the frame loop aborts
pub type ErrorSink = Arc<dyn Fn(&SimulationError) + Send + Sync>;

/// Mode and clock, always read and written together
#[derive(Debug)]
struct Control {
    mode: SimulationMode,
    frames: u64,
    simulated_time_ms: u64,
}

impl Control {
    fn advance(&mut self, updates_per_second: u32) {
        self.frames += 1;
        self.simulated_time_ms = self.frames * 1000 / u64::from(updates_per_second.max(1));
    }
}

struct Shared {
    control: Mutex<Control>,
    registry: RwLock<ObjectRegistry>,
    materials: RwLock<MaterialLibrary>,
    config: RwLock<SimulationConfig>,
    pool: RwLock<Arc<ThreadPool>>,
    progress: OptimizerProgress,
    last_error: Mutex<Option<SimulationError>>,
    error_sink: RwLock<Option<ErrorSink>>,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> RwLockReadGuard<'_, ObjectRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ObjectRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> SimulationConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pool(&self) -> Arc<ThreadPool> {
        Arc::clone(&self.pool.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn mode(&self) -> SimulationMode {
        self.control().mode
    }

    /// Optimize under the registry write lock so no edit can slip in before the
    /// topology is marked clean
    fn prepare_topology(&self, reset_temperatures: bool) -> OptimizerReport {
        let config = self.config();
        let pool = self.pool();
        let mut registry = self.registry_mut();
        if reset_temperatures {
            registry.reset_objects_temperature();
            registry.reset_temperature_range();
        }
        let partitions = round_robin(registry.len(), pool.current_num_threads());
        let report = pool.install(|| optimize(&registry, &partitions, &config, &self.progress));
        registry.mark_topology_clean();
        report
    }

    fn report_error(&self, error: &SimulationError) {
        tracing::error!(%error, "Frame loop aborted");
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
        let sink = self
            .error_sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink(error);
        }
    }
}

/// Run one frame over `partitions`; call inside the worker pool
pub(crate) fn run_frame(
    registry: &ObjectRegistry,
    partitions: &[Vec<usize>],
    config: &SimulationConfig,
) -> Result<(), SimulationError> {
    let managers = transfer_managers();
    partitions.par_iter().for_each(|partition| {
        for manager in managers {
            manager.transfer_heat(registry, partition, config);
        }
    });

    let params = config.apply_params();
    partitions
        .par_iter()
        .try_for_each(|partition| registry.apply_energy_delta(partition, params))?;

    registry.update_smallest_and_biggest_temperature();
    Ok(())
}

fn simulation_thread(shared: &Shared, fresh: bool) {
    if fresh || shared.registry().is_topology_dirty() {
        shared.prepare_topology(fresh);
    }

    let config = shared.config();
    let pool = shared.pool();
    let frame_budget = Duration::from_secs_f64(config.time_step());

    while shared.mode() == SimulationMode::Running {
        let started = Instant::now();
        let result = {
            let registry = shared.registry();
            let partitions = round_robin(registry.len(), pool.current_num_threads());
            pool.install(|| run_frame(&registry, &partitions, &config))
        };
        if let Err(error) = result {
            shared.report_error(&error);
            return;
        }

        if config.wait_to_be_in_time {
            let elapsed = started.elapsed();
            if elapsed < frame_budget {
                thread::sleep(frame_budget - elapsed);
            }
        }

        let mut control = shared.control();
        // `stop()` zeroed the clock while this frame was in flight
        if control.mode == SimulationMode::Stopped {
            break;
        }
        control.advance(config.updates_per_second);
    }
    tracing::debug!("Frame loop exited");
}

fn build_pool(workers: usize) -> Result<ThreadPool, EngineError> {
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("thedyx-worker-{i}"))
        .build()
        .map_err(|e| EngineError::ThreadPool(e.to_string()))
}

/// Thermal simulation engine
///
/// All methods take `&self`; an `Engine` can be shared behind an `Arc` between a
/// UI thread and other readers. Structural edits are rejected with
/// [`EngineError::Running`] while the frame loop runs.
pub struct Engine {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let control = self.shared.control();
        f.debug_struct("Engine")
            .field("mode", &control.mode)
            .field("frames", &control.frames)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with the built-in material library
    pub fn new(config: SimulationConfig) -> Result<Self, EngineError> {
        Self::with_materials(config, MaterialLibrary::with_builtin())
    }

    pub fn with_materials(
        config: SimulationConfig,
        materials: MaterialLibrary,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let workers = worker_count(&config);
        let pool = build_pool(workers)?;
        tracing::info!(workers, materials = materials.len(), "Engine created");
        Ok(Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    mode: SimulationMode::Stopped,
                    frames: 0,
                    simulated_time_ms: 0,
                }),
                registry: RwLock::new(ObjectRegistry::new()),
                materials: RwLock::new(materials),
                config: RwLock::new(config),
                pool: RwLock::new(Arc::new(pool)),
                progress: OptimizerProgress::new(),
                last_error: Mutex::new(None),
                error_sink: RwLock::new(None),
            }),
            thread: Mutex::new(None),
        })
    }

    // ------------------------------------------------------------------
    // Mode state machine
    // ------------------------------------------------------------------

    pub fn mode(&self) -> SimulationMode {
        self.shared.mode()
    }

    /// Frames simulated since the last stop
    pub fn frames(&self) -> u64 {
        self.shared.control().frames
    }

    /// Simulated time in milliseconds (`frames × 1000 / updates_per_second`)
    pub fn simulated_time_ms(&self) -> u64 {
        self.shared.control().simulated_time_ms
    }

    pub fn simulated_time(&self) -> Duration {
        Duration::from_millis(self.simulated_time_ms())
    }

    /// Start from Stopped (reset + optimize) or resume from Paused
    ///
    /// After a frame-loop abort the next start is a full restart even if the
    /// engine was paused in between: temperatures and clock are reset and the
    /// optimizer runs again.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut handle = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        let mut control = self.shared.control();
        // Lock order is thread handle, then control; `stop`/`pause` never hold both
        let previous = control.mode;
        if previous == SimulationMode::Running {
            return Err(EngineError::AlreadyRunning);
        }
        self.shared.config().validate()?;
        let aborted = self
            .shared
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        let fresh = previous == SimulationMode::Stopped || aborted;
        if aborted {
            control.frames = 0;
            control.simulated_time_ms = 0;
        }
        control.mode = SimulationMode::Running;
        drop(control);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("thedyx-simulation".into())
            .spawn(move || simulation_thread(&shared, fresh));
        match spawned {
            Ok(thread) => {
                *handle = Some(thread);
                tracing::info!(from = ?previous, "Simulation started");
                Ok(())
            }
            Err(e) => {
                self.shared.control().mode = previous;
                Err(EngineError::Spawn(e.to_string()))
            }
        }
    }

    /// Finish the current frame and hold; temperatures and clock are kept
    pub fn pause(&self) {
        {
            let mut control = self.shared.control();
            if control.mode != SimulationMode::Running {
                tracing::debug!(mode = ?control.mode, "Pause ignored");
                return;
            }
            control.mode = SimulationMode::Paused;
        }
        self.join_loop();
        tracing::info!(frames = self.frames(), "Simulation paused");
    }

    /// Finish the current frame and stop; the simulated clock returns to zero
    pub fn stop(&self) {
        {
            let mut control = self.shared.control();
            if control.mode == SimulationMode::Stopped {
                return;
            }
            control.mode = SimulationMode::Stopped;
            control.frames = 0;
            control.simulated_time_ms = 0;
        }
        self.join_loop();
        tracing::info!("Simulation stopped");
    }

    fn join_loop(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            // Called from the error sink on the loop's own thread: it is already exiting
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("Simulation thread panicked");
            }
        }
    }

    fn ensure_not_running(&self) -> Result<MutexGuard<'_, Control>, EngineError> {
        let control = self.shared.control();
        if control.mode == SimulationMode::Running {
            return Err(EngineError::Running);
        }
        Ok(control)
    }

    // ------------------------------------------------------------------
    // Synchronous driving
    // ------------------------------------------------------------------

    /// Reset temperatures and rebuild the topology without starting the loop
    pub fn prepare(&self) -> Result<OptimizerReport, EngineError> {
        let _control = self.ensure_not_running()?;
        Ok(self.shared.prepare_topology(true))
    }

    /// Run one frame on the calling thread (worker pool still used)
    ///
    /// Re-optimizes first if the topology is dirty. Numeric faults are returned
    /// and recorded as [`Engine::last_error`].
    pub fn step(&self) -> Result<(), EngineError> {
        let mut control = self.ensure_not_running()?;
        if self.shared.registry().is_topology_dirty() {
            self.shared.prepare_topology(false);
        }
        let config = self.shared.config();
        let pool = self.shared.pool();
        let result = {
            let registry = self.shared.registry();
            let partitions = round_robin(registry.len(), pool.current_num_threads());
            pool.install(|| run_frame(&registry, &partitions, &config))
        };
        if let Err(error) = result {
            tracing::error!(%error, "Frame failed");
            *self
                .shared
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
            return Err(error.into());
        }
        control.advance(config.updates_per_second);
        Ok(())
    }

    /// Run `frames` synchronous frames
    pub fn run_frames(&self, frames: u64) -> Result<(), EngineError> {
        for _ in 0..frames {
            self.step()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Errors and progress
    // ------------------------------------------------------------------

    /// Install the callback invoked when the frame loop aborts
    pub fn set_error_sink<F>(&self, sink: F)
    where
        F: Fn(&SimulationError) + Send + Sync + 'static,
    {
        *self
            .shared
            .error_sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(sink));
    }

    /// Fault that ended the most recent run or step, cleared on `start()`
    pub fn last_error(&self) -> Option<SimulationError> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Optimizer progress per worker slot (0–100)
    pub fn optimizer_progress(&self) -> Vec<u8> {
        self.shared.progress.snapshot()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn config(&self) -> SimulationConfig {
        self.shared.config()
    }

    /// Replace the configuration; rebuilds the worker pool if its size changed
    pub fn set_config(&self, config: SimulationConfig) -> Result<(), EngineError> {
        let _control = self.ensure_not_running()?;
        config.validate()?;
        let workers = worker_count(&config);
        if workers != self.shared.pool().current_num_threads() {
            *self
                .shared
                .pool
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Arc::new(build_pool(workers)?);
            tracing::info!(workers, "Worker pool resized");
        }
        *self
            .shared
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// Number of worker slots frames are partitioned across
    pub fn worker_slots(&self) -> usize {
        self.shared.pool().current_num_threads()
    }

    // ------------------------------------------------------------------
    // Objects and materials
    // ------------------------------------------------------------------

    /// Read access for queries and rendering; blocks while a frame runs
    pub fn registry(&self) -> RwLockReadGuard<'_, ObjectRegistry> {
        self.shared.registry()
    }

    pub fn materials(&self) -> RwLockReadGuard<'_, MaterialLibrary> {
        self.shared
            .materials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_object(&self, object: CompositeObject) -> Result<usize, EngineError> {
        let _control = self.ensure_not_running()?;
        Ok(self.shared.registry_mut().add_object(object)?)
    }

    pub fn remove_object(&self, name: &str) -> Result<CompositeObject, EngineError> {
        let _control = self.ensure_not_running()?;
        Ok(self.shared.registry_mut().remove_object(name)?)
    }

    pub fn clear_objects(&self) -> Result<(), EngineError> {
        let _control = self.ensure_not_running()?;
        self.shared.registry_mut().clear_objects();
        Ok(())
    }

    /// Apply a mutator such as [`CompositeObject::set_position`] to a named object
    pub fn update_object<F>(&self, name: &str, mutate: F) -> Result<ObjectChange, EngineError>
    where
        F: FnOnce(&mut CompositeObject) -> ObjectChange,
    {
        let _control = self.ensure_not_running()?;
        Ok(self.shared.registry_mut().update_object(name, mutate)?)
    }

    pub fn rename_object(&self, name: &str, new_name: &str) -> Result<ObjectChange, EngineError> {
        let _control = self.ensure_not_running()?;
        Ok(self.shared.registry_mut().rename_object(name, new_name)?)
    }

    /// Switch a named object to a library material
    pub fn set_object_material(&self, name: &str, material: &str) -> Result<ObjectChange, EngineError> {
        let material = self.materials().get(material)?;
        self.update_object(name, move |object| object.set_material(material))
    }

    /// Add or replace a material and rebind every object using that name
    pub fn add_material(&self, material: Material) -> Result<(), EngineError> {
        let _control = self.ensure_not_running()?;
        let mut materials = self
            .shared
            .materials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        materials.insert(material)?;
        self.shared.registry_mut().rebind_materials(&materials)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scenes
    // ------------------------------------------------------------------

    /// Persistable snapshot of every object and the materials they use
    pub fn scene(&self) -> Scene {
        Scene::capture(&self.registry())
    }

    /// Replace every object with the scene's; rejected while Running
    ///
    /// On failure the current objects are left untouched.
    pub fn load_scene(&self, scene: &Scene) -> Result<(), EngineError> {
        let _control = self.ensure_not_running()?;
        let mut materials = self
            .shared
            .materials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut staged = materials.clone();
        let registry = scene.restore(&mut staged)?;
        *materials = staged;
        *self.shared.registry_mut() = registry;
        tracing::info!(objects = scene.objects.len(), "Scene loaded");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
