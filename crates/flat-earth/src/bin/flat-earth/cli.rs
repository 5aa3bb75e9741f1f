//! flat-earth cli interface

use clap::{Parser, Subcommand, ValueEnum};
use flat_earth::hcl_documents::ConfigRoot;
use flat_earth::toolchain::SchemaSource;
use std::fmt::Formatter;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long = "log-format", global(true), default_value_t)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the configuration over HTTP
    Serve(ServeCommand),

    /// Print the resource graph
    Graph(GraphCommand),

    /// Print the provider schemas
    Schema(GraphCommand),
}

#[derive(Parser, Debug)]
pub struct ServeCommand {
    #[clap(flatten)]
    pub config: ConfigArgs,

    /// Address to listen on
    #[arg(
        short = 'l',
        long = "listen",
        env = "FLAT_EARTH_LISTEN",
        default_value = "127.0.0.1:8080"
    )]
    pub listen: SocketAddr,

    /// Reject updates of attributes unknown to the provider schema
    #[arg(long = "enforce-schema")]
    pub enforce_schema: bool,
}

#[derive(Parser, Debug)]
pub struct GraphCommand {
    #[clap(flatten)]
    pub config: ConfigArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration root directory
    pub root: PathBuf,

    /// Extension of configuration files
    ///
    /// Can be specified multiple times.
    #[arg(short = 'e', long = "extension", default_value = ConfigRoot::DEFAULT_EXTENSION)]
    pub extensions: Vec<String>,

    /// Read provider schemas from a file instead of running a command
    ///
    /// The file holds the output of `terraform providers schema -json`.
    #[arg(long = "schema-file", env = "FLAT_EARTH_SCHEMA_FILE")]
    pub schema_file: Option<PathBuf>,

    /// Command printing provider schemas, run in the configuration root
    #[arg(
        long = "schema-command",
        conflicts_with("schema_file"),
        num_args = 1..,
        allow_hyphen_values = true,
        value_delimiter = ' '
    )]
    pub schema_command: Option<Vec<String>>,
}

impl ConfigArgs {
    pub fn config_root(&self) -> ConfigRoot {
        ConfigRoot::new(&self.root).with_extensions(self.extensions.iter().cloned())
    }

    pub fn schema_source(&self) -> SchemaSource {
        match (&self.schema_file, &self.schema_command) {
            (Some(file), _) => SchemaSource::File(file.clone()),
            (None, Some(command)) => SchemaSource::Command(command.clone()),
            (None, None) => SchemaSource::default(),
        }
    }
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}
