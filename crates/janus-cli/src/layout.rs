//! The `janus layout` subcommand: compute positions and emit JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use janus_core::{import_file, LayeredBarycenter, LayoutOptions, Orientation, Position};

pub fn execute(
    model: &str,
    output: Option<&str>,
    horizontal: bool,
    passes: usize,
) -> anyhow::Result<()> {
    let path = Path::new(model);
    if !path.exists() {
        anyhow::bail!("model file not found: {}", model);
    }

    let graph = import_file(path)?;
    let backend = LayeredBarycenter::new(LayoutOptions {
        orientation: if horizontal {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        },
        ordering_passes: passes,
        ..LayoutOptions::default()
    });
    let positions = graph.auto_layout_with(&backend);

    // Key by display name and sort, so the output is stable and diffable.
    let named: BTreeMap<String, Position> = positions
        .iter()
        .filter_map(|(id, pos)| graph.node(*id).map(|n| (n.name.clone(), *pos)))
        .collect();

    let json = serde_json::to_string_pretty(&named)?;
    match output {
        Some(out) => {
            fs::write(out, json)?;
            println!("Wrote {} positions to {}", named.len(), out);
        }
        None => println!("{}", json),
    }

    Ok(())
}
