use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use graphinfo::{inspect, load_graph_with_registry, Graph, GraphError, OpRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graph_info", version, about = "Print the operations of a TensorFlow GraphDef")]
struct Cli {
    /// Path to the serialized GraphDef
    #[arg(default_value = "graph.pb")]
    graph: PathBuf,

    /// JSON file with additional op signatures
    #[arg(long)]
    op_registry: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log: String,
}

fn main() -> ExitCode {
    // Every failure exits with 1; help and version still exit with 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    init_tracing(&cli.log);

    let graph = match load(&cli) {
        Ok(graph) => graph,
        Err(err) => {
            tracing::error!(path = %cli.graph.display(), error = %err, "failed to load graph");
            println!("Can't load graph");
            return ExitCode::from(1);
        }
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if let Err(err) = inspect(&graph, &mut out).and_then(|()| out.flush()) {
        tracing::error!(error = %err, "failed to write report");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load(cli: &Cli) -> Result<Graph, GraphError> {
    let mut registry = OpRegistry::builtin()?;
    if let Some(path) = &cli.op_registry {
        registry.merge_from_path(path)?;
    }
    load_graph_with_registry(&cli.graph, &registry)
}
