//! Headless runner: load a program, simulate, print what happened.
//!
//! ```text
//! bytefarm-headless <program> [seconds] [config.json]
//! ```
//!
//! `<program>` is a `.rhai`/`.wasm`/`.wat` file or a directory holding
//! `main.rhai`. The engine advances in fixed frames of `frame_ms` simulated
//! milliseconds until the program ends or `seconds` of simulated time have
//! passed (default 60). Set `RUST_LOG=bytefarm=debug` for lifecycle logs.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use bytefarm_engine::prelude::*;

const DEFAULT_SECONDS: u64 = 60;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(program) = args.next() else {
        bail!("usage: bytefarm-headless <program> [seconds] [config.json]");
    };
    let seconds = match args.next() {
        Some(s) => s
            .parse::<u64>()
            .with_context(|| format!("invalid seconds: {s}"))?,
        None => DEFAULT_SECONDS,
    };
    let config = match args.next() {
        Some(path) => EngineConfig::from_json_file(&path)?,
        None => EngineConfig::default(),
    };

    let frame_ms = config.frame_ms.max(1);
    let limit = seconds.saturating_mul(1_000);
    let mut engine = FarmEngine::new(config);
    if let Err(e) = engine.load_and_start(&program) {
        print_output(&engine);
        return Err(e).with_context(|| format!("failed to start {program}"));
    }

    let mut applied = 0usize;
    while engine.tick_count() < limit {
        if engine.advance(frame_ms).is_some() {
            applied += 1;
        }
        if !engine.is_running() && engine.pending().is_none() {
            break;
        }
        if engine.pending().is_none() {
            // Give the program thread a chance to issue its next action.
            thread::sleep(Duration::from_millis(1));
        }
    }
    let timed_out = engine.is_running();
    engine.stop_program();

    print_output(&engine);
    let state = engine.state();
    let (x, y) = state.avatar.position();
    let (w, h) = state.map.size();
    println!("---");
    println!("tick: {}  operations applied: {applied}", engine.tick_count());
    println!("avatar: ({x}, {y}) on a {w}x{h} map");
    for (resource, amount) in state.avatar.inventory.iter() {
        println!("  {resource}: {amount}");
    }
    if timed_out {
        println!("(stopped after {seconds}s of simulated time)");
    }
    Ok(())
}

fn print_output(engine: &FarmEngine) {
    for line in engine.output().lines() {
        println!("{line}");
    }
    let partial = engine.output().partial();
    if !partial.is_empty() {
        println!("{partial}");
    }
}
