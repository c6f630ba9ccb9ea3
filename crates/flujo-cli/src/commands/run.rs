//! Run a patch against a timer-driven executor.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Args;

use flujo_engine::{EDITION_POLL_INTERVAL, Feedback};

use crate::patch::Patch;

#[derive(Args)]
pub struct RunArgs {
    /// Patch file (TOML)
    patch: PathBuf,

    /// Wall-clock tick period in milliseconds
    #[arg(long, default_value = "20")]
    period_ms: u64,

    /// Suppress value echoes
    #[arg(long)]
    quiet: bool,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let patch = Patch::load(&args.patch)?;
    let tick_samples = patch.tick_samples;
    let (mut session, executor, ids) = patch.build_session()?;

    // Reverse map for printable echo labels.
    let names: std::collections::HashMap<_, _> =
        ids.iter().map(|(name, id)| (*id, name.clone())).collect();

    println!(
        "running {} ({} nodes, {} cables), tick period {} ms",
        args.patch.display(),
        patch.node_count(),
        patch.cable_count(),
        args.period_ms
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    // The clock driver thread: owns the executor for the session's lifetime
    // and hands it back once ticking has ceased.
    let driver = {
        let stop = Arc::clone(&stop);
        let period = Duration::from_millis(args.period_ms);
        let mut executor = executor;
        thread::spawn(move || {
            let mut now = 0u64;
            while !stop.load(Ordering::SeqCst) {
                now += tick_samples;
                executor.tick(now);
                thread::sleep(period);
            }
            executor
        })
    };

    // The authoring loop: drain feedback on the reference period.
    while !stop.load(Ordering::SeqCst) {
        session.poll_feedback(|fb| match fb {
            Feedback::ValueEcho {
                node,
                outlet,
                value,
                date,
            } => {
                if !args.quiet {
                    let label = names.get(&node).map_or("?", |n| n.as_str());
                    println!("[{date:>8}] {label}:{outlet} = {value:?}");
                }
            }
            Feedback::PlaybackFinished => println!("playback finished"),
            Feedback::ScheduleRejected { reason } => eprintln!("schedule rejected: {reason}"),
            Feedback::NodeAdded { .. } | Feedback::CableConnected { .. } => {}
        });
        if session.is_finished() {
            stop.store(true, Ordering::SeqCst);
        }
        thread::sleep(EDITION_POLL_INTERVAL);
    }

    let mut executor = driver.join().expect("clock driver panicked");
    session.stop(&mut executor);
    println!("stopped");
    Ok(())
}
