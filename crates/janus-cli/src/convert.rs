//! The `janus convert` subcommand: import then re-export a model.
//!
//! The round trip normalizes the file: operators come out in topological
//! order and derived names are re-resolved against their producers.

use std::path::Path;

use janus_core::{import_file, ExportOptions};

pub fn execute(model: &str, output: &str, verbose_export: bool) -> anyhow::Result<()> {
    let path = Path::new(model);
    if !path.exists() {
        anyhow::bail!("model file not found: {}", model);
    }

    let graph = import_file(path)?;
    let options = ExportOptions {
        non_verbose: !verbose_export,
    };
    let flat = graph.export(&options)?;
    flat.save(output)?;

    println!(
        "Converted {} -> {} ({} operators, {} edges)",
        model,
        output,
        flat.nodes.len(),
        graph.edge_count()
    );

    Ok(())
}
