//! Time-Triggered Control Loop
//!
//! This example runs a sensor, a controller and a logger on a fixed
//! 30 ms cycle read from a dispatch table.
//!
//! Key concepts:
//! - Dispatch tables: one section per thread, `start,duration,machine` rows
//! - Slots start at fixed offsets into a shared cycle
//! - Late starts and overruns are counted, never fatal
//! - A stop signal raised from another thread
//!
//! Run with: RUST_LOG=info cargo run --example time_triggered

use llfsm::builder::{MachineBuilder, StateBuilder};
use llfsm::environment::InMemoryVariable;
use llfsm::machine::MachineData;
use llfsm::schedule::DispatchTable;
use llfsm::{Arrangement, RuntimeConfig, Runtime, SchedulerKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DISPATCH: &str = "
0,10000,Sensor
10000,20000,Controller

0,5000,Logger
";

#[derive(Default)]
struct Plant {
    reading: i64,
    command: i64,
}

struct Loop;

impl MachineData for Loop {
    type Vars = i64;
    type Environment = Plant;
    type Parameters = ();
    type Result = ();
}

type S = StateBuilder<Loop>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    println!("=== Time-Triggered Control Loop ===\n");

    let temperature = Arc::new(Mutex::new(0_i64));
    let heater = Arc::new(Mutex::new(0_i64));

    let sensor = MachineBuilder::<Loop>::new("Sensor")
        .variable(InMemoryVariable::actuator(
            "temperature",
            Arc::clone(&temperature),
            |plant: &Plant| &plant.command,
            |plant: &mut Plant| &mut plant.command,
        ))
        .initial("Sample")
        .state(
            S::new("Sample")
                .uses("temperature")
                .internal(|ctx| {
                    ctx.vars += 1;
                    ctx.environment.command = 15 + ctx.vars % 10;
                })
                .transition("Sample", |_| false),
        )
        .build()?;

    let controller = MachineBuilder::<Loop>::new("Controller")
        .variable(InMemoryVariable::sensor(
            "temperature",
            Arc::clone(&temperature),
            |plant: &Plant| &plant.reading,
            |plant: &mut Plant| &mut plant.reading,
        ))
        .variable(InMemoryVariable::actuator(
            "heater",
            Arc::clone(&heater),
            |plant: &Plant| &plant.command,
            |plant: &mut Plant| &mut plant.command,
        ))
        .initial("Regulate")
        .state(
            S::new("Regulate")
                .uses("temperature")
                .uses("heater")
                .internal(|ctx| ctx.environment.command = (20 - ctx.environment.reading).max(0))
                .transition("Regulate", |_| false),
        )
        .build()?;

    let logger_heater = Arc::clone(&heater);
    let logger = MachineBuilder::<Loop>::new("Logger")
        .initial("Log")
        .state(
            S::new("Log")
                .internal(move |ctx| {
                    ctx.vars += 1;
                    if ctx.vars % 10 == 0 {
                        tracing::info!(heater = *logger_heater.lock(), "heater output");
                    }
                })
                .transition("Log", |_| false),
        )
        .build()?;

    let schedule = DispatchTable::parse(DISPATCH)?.into_schedule();
    let runtime = Runtime::new(RuntimeConfig {
        scheduler: SchedulerKind::TimeTriggered,
        ..RuntimeConfig::default()
    });

    let stop = runtime.stop_signal();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(600));
        stop.stop();
    });

    let arrangement = Arrangement::new()
        .machine(sensor.boxed())
        .machine(controller.boxed())
        .machine(logger.boxed());
    let report = runtime.run(arrangement, &schedule)?;
    stopper.join().map_err(|_| "stop thread panicked")?;

    println!("Cycles:      {}", report.cycles);
    println!("Stopped:     {:?}", report.reason);
    println!("Late starts: {}", report.late_starts);
    println!("Overruns:    {}", report.overruns);
    println!("Last temperature {} -> heater {}", *temperature.lock(), *heater.lock());

    println!("\n=== Example Complete ===");
    Ok(())
}
