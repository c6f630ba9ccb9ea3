//! Validate a patch file without running it.

use std::path::PathBuf;

use clap::Args;

use crate::patch::Patch;

#[derive(Args)]
pub struct CheckArgs {
    /// Patch file (TOML)
    patch: PathBuf,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let patch = Patch::load(&args.patch)?;
    let mut graph = patch.build_graph()?;

    match graph.rebuild() {
        Ok(()) => {
            println!(
                "ok: {} nodes, {} cables, policy {}",
                patch.node_count(),
                patch.cable_count(),
                graph.policy().name()
            );
            let order: Vec<String> = graph
                .execution_order()
                .iter()
                .map(|id| id.to_string())
                .collect();
            println!("order: {}", order.join(" -> "));
            Ok(())
        }
        Err(e) => anyhow::bail!("patch is not schedulable: {e}"),
    }
}
