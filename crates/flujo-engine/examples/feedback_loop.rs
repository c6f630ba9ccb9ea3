//! Feedback loop demo: a running total built from a delayed cable.
//!
//! A sequence node emits 1 every tick; a sum node adds it to its own output
//! from the previous tick, fed back over a delayed-glutton cable. Run with:
//! `cargo run -p flujo-engine --example feedback_loop`

use flujo_core::{ConnectionKind, PortRef, SchedulePolicy, SequenceNode, SumNode, Value};
use flujo_engine::{ExecutorSettings, Feedback, PortSpec, Session};

fn main() {
    let settings = ExecutorSettings {
        scheduling: SchedulePolicy::StaticTopo,
        ..ExecutorSettings::default()
    };
    let (mut session, mut executor) =
        Session::start(settings, Vec::new(), Some(10)).expect("settings are valid");

    let seq = session
        .register_process(
            Box::new(SequenceNode::repeat(Value::Int(1))),
            &[],
            &[PortSpec::value()],
        )
        .expect("queue has room");
    let sum = session
        .register_process(
            Box::new(SumNode::new()),
            &[PortSpec::value(), PortSpec::value()],
            &[PortSpec::value().observed(true)],
        )
        .expect("queue has room");

    session
        .connect_cable(
            PortRef::new(seq, 0),
            PortRef::new(sum, 0),
            ConnectionKind::ImmediateStrict,
        )
        .expect("endpoints exist");
    // The only legal way to close the loop: a delayed cable.
    session
        .connect_cable(
            PortRef::new(sum, 0),
            PortRef::new(sum, 1),
            ConnectionKind::DelayedGlutton,
        )
        .expect("endpoints exist");

    // Drive the executor inline; a real embedder does this from an audio
    // callback or timer thread.
    for now in 1..=10 {
        executor.tick(now);
    }

    session.poll_feedback(|fb| match fb {
        Feedback::ValueEcho { value, date, .. } => {
            println!("t={date:>2}  total = {}", value.as_int());
        }
        Feedback::PlaybackFinished => println!("finished"),
        _ => {}
    });

    session.stop(&mut executor);
}
