//! The `janus info` subcommand: import a model and print a summary.

use std::path::Path;

use janus_core::import_file;

pub fn execute(model: &str) -> anyhow::Result<()> {
    let path = Path::new(model);
    if !path.exists() {
        anyhow::bail!("model file not found: {}", model);
    }

    let graph = import_file(path)?;

    let name = if graph.name().is_empty() {
        "(unnamed)"
    } else {
        graph.name()
    };
    println!("name:      {}", name);
    println!("opset:     {}", graph.opset());
    let producer = graph.producer();
    if !producer.producer_name.is_empty() {
        println!(
            "producer:  {} {}",
            producer.producer_name, producer.producer_version
        );
    }
    println!("inputs:    {}", graph.inputs().len());
    println!("outputs:   {}", graph.outputs().len());
    println!("operators: {}", graph.operators().len());
    println!("edges:     {}", graph.edge_count());

    let mut header_printed = false;
    for node in graph.nodes() {
        for warning in &node.warnings {
            if !header_printed {
                println!();
                println!("warnings:");
                header_printed = true;
            }
            println!("  {}: {}", node.name, warning);
        }
    }

    Ok(())
}
