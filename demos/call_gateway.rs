//! Calling Parameterised Machines
//!
//! This example computes a factorial with a machine that calls itself
//! recursively, invoked asynchronously by a controlling machine.
//!
//! Key concepts:
//! - `invoke`: the callee runs in its own slot, the caller keeps going
//! - `call_self`: recursive calls stacked on the caller's slot
//! - Promises refreshed once per ringlet until fulfilled
//!
//! Run with: RUST_LOG=debug cargo run --example call_gateway

use llfsm::builder::{MachineBuilder, StateBuilder};
use llfsm::gateway::{Dependency, Promise};
use llfsm::machine::MachineData;
use llfsm::{Arrangement, Runtime, RuntimeConfig, Schedule};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

struct Factorial;

#[derive(Default, Deserialize)]
struct Request {
    n: u64,
}

#[derive(Default)]
struct Pending {
    promise: Option<Promise<u64>>,
}

impl MachineData for Factorial {
    type Vars = Pending;
    type Environment = ();
    type Parameters = Request;
    type Result = u64;
}

struct Main;

#[derive(Default)]
struct MainVars {
    promise: Option<Promise<u64>>,
    answer: Option<u64>,
}

impl MachineData for Main {
    type Vars = MainVars;
    type Environment = ();
    type Parameters = ();
    type Result = ();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    println!("=== Calling Parameterised Machines ===\n");

    let factorial = MachineBuilder::<Factorial>::new("Factorial")
        .depends_on(Dependency::synchronous("Factorial").parameter("n", "u64"))
        .initial("Check")
        .state(
            StateBuilder::<Factorial>::new("Check")
                .transition("Base", |ctx| ctx.parameters.n <= 1)
                .always("Recurse"),
        )
        .state(StateBuilder::<Factorial>::new("Base").on_entry(|ctx| ctx.result = Some(1)))
        .state(
            StateBuilder::<Factorial>::new("Recurse")
                .on_entry(|ctx| ctx.vars.promise = Some(ctx.call_self(&json!({ "n": ctx.parameters.n - 1 }))))
                .internal(|ctx| {
                    if let Some(mut promise) = ctx.vars.promise.take() {
                        ctx.poll(&mut promise);
                        ctx.vars.promise = Some(promise);
                    }
                })
                .transition("Combine", |ctx| {
                    ctx.vars.promise.as_ref().is_some_and(Promise::is_fulfilled)
                }),
        )
        .state(StateBuilder::<Factorial>::new("Combine").on_entry(|ctx| {
            let below = ctx
                .vars
                .promise
                .as_ref()
                .and_then(Promise::result)
                .copied()
                .unwrap_or(1);
            ctx.result = Some(ctx.parameters.n * below);
        }))
        .build()?;

    let controller = MachineBuilder::<Main>::new("Main")
        .depends_on(Dependency::asynchronous("Factorial").parameter("n", "u64"))
        .initial("Start")
        .state(
            StateBuilder::<Main>::new("Start")
                .on_entry(|ctx| ctx.vars.promise = Some(ctx.invoke("Factorial", &json!({ "n": 10 }))))
                .internal(|ctx| {
                    if let Some(mut promise) = ctx.vars.promise.take() {
                        if ctx.poll(&mut promise) {
                            ctx.vars.answer = promise.take_result();
                        }
                        ctx.vars.promise = Some(promise);
                    }
                })
                .transition("Report", |ctx| ctx.vars.answer.is_some()),
        )
        .state(StateBuilder::<Main>::new("Report").on_entry(|ctx| {
            println!("10! = {}", ctx.vars.answer.unwrap_or_default());
        }))
        .build()?;

    let runtime = Runtime::new(RuntimeConfig::default());
    let report = runtime.run(
        Arrangement::new()
            .machine(controller.boxed())
            .parameterised(factorial),
        &Schedule::sequential(["Main", "Factorial"]),
    )?;

    println!("\nFinished after {} cycles ({:?})", report.cycles, report.reason);
    println!("\n=== Example Complete ===");
    Ok(())
}
