//! Janus CLI - graph editor core for ONNX-style model files.

mod convert;
mod info;
mod layout;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "janus")]
#[command(about = "Inspect, convert, and lay out ONNX-style graph files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a flat graph file
    Info {
        /// Path to the model (.json file)
        model: String,
    },

    /// Compute node positions and emit them as JSON
    Layout {
        /// Path to the model (.json file)
        model: String,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Lay layers out left to right instead of top to bottom
        #[arg(long)]
        horizontal: bool,

        /// Barycenter ordering passes (0 disables crossing reduction)
        #[arg(long, default_value = "4")]
        passes: usize,
    },

    /// Import then re-export a model, normalizing node order
    Convert {
        /// Path to the model (.json file)
        model: String,

        /// Output path
        #[arg(short, long)]
        output: String,

        /// Log every shape diagnostic during export
        #[arg(long)]
        verbose_export: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Info { model } => info::execute(&model)?,

        Commands::Layout {
            model,
            output,
            horizontal,
            passes,
        } => layout::execute(&model, output.as_deref(), horizontal, passes)?,

        Commands::Convert {
            model,
            output,
            verbose_export,
        } => convert::execute(&model, &output, verbose_export)?,
    }

    Ok(())
}
