mod cli;

use anyhow::Context;
use flat_earth::service::{GraphService, ServiceConfig};
use flat_earth::snapshot::{snapshot_graph, snapshot_schema};
use flat_earth::toolchain::HclToolchain;
use serde::Serialize;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_env("FLAT_EARTH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        cli::LogFormat::Text => subscriber.init(),
        cli::LogFormat::Json => subscriber.json().init(),
    }

    let command_result = match cli.command {
        cli::Command::Serve(serve_cli) => serve(serve_cli),
        cli::Command::Graph(graph_cli) => graph(graph_cli),
        cli::Command::Schema(schema_cli) => schema(schema_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn serve(cli: cli::ServeCommand) -> anyhow::Result<()> {
    let root = cli.config.config_root();
    anyhow::ensure!(
        root.path.is_dir(),
        "Configuration root {} is not a directory",
        root.path.display()
    );

    let service = GraphService::new(
        ServiceConfig {
            root,
            enforce_schema: cli.enforce_schema,
        },
        HclToolchain::new(cli.config.schema_source()),
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(service.serve(cli.listen))
        .with_context(|| format!("Failed to serve on {}", cli.listen))?;

    Ok(())
}

pub fn graph(cli: cli::GraphCommand) -> anyhow::Result<()> {
    let toolchain = HclToolchain::new(cli.config.schema_source());
    let snapshot = snapshot_graph(&toolchain, &cli.config.config_root())?;

    output(&cli.output, &snapshot)
}

pub fn schema(cli: cli::GraphCommand) -> anyhow::Result<()> {
    let toolchain = HclToolchain::new(cli.config.schema_source());
    let schema = snapshot_schema(&toolchain, &cli.config.config_root())?;

    output(&cli.output, &schema)
}

fn output(output: &cli::OutputArgs, value: &impl Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), value)?;
            println!();
        }
    };

    Ok(())
}
