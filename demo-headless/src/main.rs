use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use thedyx_core::{
    CompositeObject, Engine, EngineError, Kelvin, Point, Scene, SimulationConfig, SimulationMode,
};
use tracing_subscriber::EnvFilter;

/// Thermal simulation demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "thedyx-demo")]
#[command(about = "Headless thermal simulation demo", long_about = None)]
struct Args {
    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u64,

    /// Scene file to load (JSON); a built-in scene is used otherwise
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Engine configuration file (JSON, partial documents allowed)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override updates per second
    #[arg(long)]
    ups: Option<u32>,

    /// Override worker slots
    #[arg(long)]
    workers: Option<usize>,

    /// Disable heat loss to ambient air
    #[arg(long)]
    no_air: bool,

    /// Run on the engine's own thread, paced to wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Report interval in frames
    #[arg(short, long, default_value_t = 60)]
    report_interval: u64,

    /// Save the scene to this path after the run
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Thermal Simulation Demo ===\n");

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(ups) = args.ups {
        config.updates_per_second = ups;
    }
    if args.workers.is_some() {
        config.worker_threads = args.workers;
    }
    if args.no_air {
        config.objects_lose_heat_to_air = false;
    }
    config.wait_to_be_in_time = args.realtime;

    let engine = Engine::new(config.clone())?;
    match &args.scene {
        Some(path) => {
            engine.load_scene(&Scene::load(path)?)?;
            println!("Loaded scene from {}", path.display());
        }
        None => {
            build_default_scene(&engine)?;
            println!("Using built-in scene");
        }
    }
    {
        let registry = engine.registry();
        println!(
            "Objects: {}, cells: {}, workers: {}, Δt = {:.4}s\n",
            registry.len(),
            registry.cell_count(),
            engine.worker_slots(),
            config.time_step()
        );
    }

    let report = engine.prepare()?;
    println!(
        "Optimizer: {} adjacency links, {} radiation links\n",
        report.adjacent_links, report.radiation_links
    );

    print_header(&engine);
    let started = Instant::now();
    if args.realtime {
        run_threaded(&engine, args)?;
    } else {
        for frame in 1..=args.frames {
            engine.step()?;
            if frame % args.report_interval.max(1) == 0 {
                print_row(&engine);
            }
        }
    }
    let elapsed = started.elapsed();

    println!("\n=== Simulation Complete ===");
    println!("Frames: {}", engine.frames());
    println!("Simulated time: {:.2}s", engine.simulated_time().as_secs_f64());
    println!("Wall time: {:.2}s", elapsed.as_secs_f64());
    if let Some(range) = engine.registry().temperature_range() {
        println!("Temperature range: {:.2} K .. {:.2} K", *range.smallest, *range.biggest);
    }
    for object in engine.registry().objects() {
        let stats = object.stats();
        println!(
            "  {:<10} mean {:8.2} K  min {:8.2} K  max {:8.2} K  solid/liquid/gas {}/{}/{}",
            object.name(),
            *stats.mean,
            *stats.min,
            *stats.max,
            stats.solid_cells,
            stats.liquid_cells,
            stats.gas_cells
        );
    }

    if let Some(path) = &args.save {
        engine.scene().save(path)?;
        println!("\nScene saved to {}", path.display());
    }
    Ok(())
}

fn run_threaded(engine: &Engine, args: &Args) -> Result<(), EngineError> {
    engine.set_error_sink(|error| eprintln!("Simulation aborted: {error}"));
    engine.start()?;
    let mut next_report = args.report_interval.max(1);
    while engine.frames() < args.frames {
        if engine.last_error().is_some() {
            break;
        }
        if engine.frames() >= next_report {
            print_row(engine);
            next_report += args.report_interval.max(1);
        }
        thread::sleep(Duration::from_millis(5));
    }
    engine.pause();
    debug_assert_eq!(engine.mode(), SimulationMode::Paused);
    match engine.last_error() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn print_header(engine: &Engine) {
    let names: Vec<String> = engine
        .registry()
        .objects()
        .iter()
        .map(|o| format!("{:>10}", o.name()))
        .collect();
    println!(" Frame | Time(s) |{}", names.join(" |"));
    println!("-------|---------|{}", vec!["-----------"; names.len()].join("|"));
}

fn print_row(engine: &Engine) {
    let temperatures: Vec<String> = engine
        .registry()
        .objects()
        .iter()
        .map(|o| format!("{:>10.2}", *o.current_temperature()))
        .collect();
    println!(
        "{:6} | {:7.2} |{}",
        engine.frames(),
        engine.simulated_time().as_secs_f64(),
        temperatures.join(" |")
    );
}

/// Hot iron block between a water pool and an ice cube, with a copper probe
fn build_default_scene(engine: &Engine) -> Result<(), EngineError> {
    let materials = engine.materials();
    let iron = materials.get("Iron")?;
    let water = materials.get("Water")?;
    let copper = materials.get("Copper")?;
    drop(materials);

    engine.add_object(CompositeObject::rectangle(
        "Heater",
        Point::new(0.0, 0.0),
        4,
        4,
        iron,
        Kelvin::new(900.0),
    ))?;
    engine.add_object(CompositeObject::state_rectangle(
        "Pool",
        Point::new(4.0, 0.0),
        6,
        4,
        water.clone(),
        Kelvin::from_celsius(20.0),
    ))?;
    engine.add_object(CompositeObject::state_rectangle(
        "Ice",
        Point::new(-3.0, 1.0),
        3,
        2,
        water,
        Kelvin::from_celsius(-10.0),
    ))?;
    engine.add_object(CompositeObject::grain_square(
        "Probe",
        Point::new(1.0, 6.0),
        copper,
        Kelvin::from_celsius(20.0),
    ))?;
    Ok(())
}
