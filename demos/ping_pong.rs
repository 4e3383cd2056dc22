//! Ping Pong Machines
//!
//! This example runs two machines under the round-robin scheduler.
//!
//! Key concepts:
//! - Guarded transitions evaluated once per ringlet
//! - An external variable shared through environment snapshots
//! - Suspending and resuming a machine from outside
//!
//! Run with: RUST_LOG=debug cargo run --example ping_pong

use llfsm::builder::{MachineBuilder, StateBuilder};
use llfsm::environment::InMemoryVariable;
use llfsm::machine::{Executable, MachineData};
use llfsm::schedule::{GroupInformation, SlotInformation};
use llfsm::{Arrangement, BuildError, RoundRobinScheduler, Schedule, StackGateway};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Table {
    ball: bool,
}

struct Player;

impl MachineData for Player {
    type Vars = u32;
    type Environment = Table;
    type Parameters = ();
    type Result = ();
}

type S = StateBuilder<Player>;

/// A player waits until the ball is on its side, returns it, and counts
/// its hits.
fn player(name: &str, ball: &Arc<Mutex<bool>>, serve: bool) -> Result<Box<dyn Executable>, BuildError> {
    let machine = MachineBuilder::<Player>::new(name)
        .variable(InMemoryVariable::external(
            "ball",
            Arc::clone(ball),
            |table: &Table| &table.ball,
            |table: &mut Table| &mut table.ball,
        ))
        .initial("Wait")
        .state(
            S::new("Wait")
                .uses("ball")
                .transition("Hit", move |ctx| ctx.environment.ball == serve),
        )
        .state(
            S::new("Hit")
                .uses("ball")
                .on_entry(move |ctx| {
                    ctx.vars += 1;
                    ctx.environment.ball = !serve;
                })
                .always("Wait"),
        )
        .build()?;
    Ok(machine.boxed())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    println!("=== Ping Pong ===\n");

    let ball = Arc::new(Mutex::new(true));
    let arrangement = Arrangement::new()
        .machine(player("Ping", &ball, true)?)
        .machine(player("Pong", &ball, false)?);
    let schedule = Schedule::new(vec![
        GroupInformation::new(vec![SlotInformation::untimed("Ping")]),
        GroupInformation::new(vec![SlotInformation::untimed("Pong")]),
    ]);
    let mut scheduler = RoundRobinScheduler::new(arrangement, &schedule, Arc::new(StackGateway::default()))?;

    for cycle in 1..=8 {
        scheduler.cycle();
        let ping = scheduler.machine("Ping").ok_or("Ping left the schedule")?;
        let pong = scheduler.machine("Pong").ok_or("Pong left the schedule")?;
        println!(
            "cycle {cycle}: Ping in {:<5} Pong in {:<5} ball on {} side",
            ping.lock().current_state_name(),
            pong.lock().current_state_name(),
            if *ball.lock() { "Ping's" } else { "Pong's" }
        );
    }

    println!("\nSuspending Pong");
    scheduler.suspend("Pong")?;
    for _ in 0..3 {
        scheduler.cycle();
    }
    let pong = scheduler.machine("Pong").ok_or("Pong left the schedule")?;
    println!("Pong suspended: {}", pong.lock().is_suspended());

    println!("Resuming Pong");
    scheduler.resume("Pong")?;
    scheduler.cycle();
    println!("Pong back in {}", pong.lock().current_state_name());

    println!("\n=== Example Complete ===");
    Ok(())
}
