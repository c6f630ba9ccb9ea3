//! List scheduling policies.

use flujo_core::SchedulePolicy;

pub fn run() -> anyhow::Result<()> {
    println!("Available scheduling policies:\n");
    for (policy, blurb) in [
        (
            SchedulePolicy::Dynamic,
            "recompute the order whenever the graph changes; tolerant of \
             heavy editing, highest rebuild cost",
        ),
        (
            SchedulePolicy::StaticBfs,
            "fixed breadth-first order over dependency generations; cheap \
             ticks, rebuild on structural change",
        ),
        (
            SchedulePolicy::StaticFixed,
            "fixed insertion order with only dependency-forced reordering; \
             most predictable",
        ),
        (
            SchedulePolicy::StaticTopo,
            "fixed order via cycle condensation; names the offending nodes \
             when a feedback loop lacks a delayed cable",
        ),
    ] {
        println!("  {:<14} {}", policy.name(), blurb);
    }
    println!("\nStatic policies accept `parallel = true` to fan independent");
    println!("nodes out to worker threads; the dynamic policy does not.");
    Ok(())
}
