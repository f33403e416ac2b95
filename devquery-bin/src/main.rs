//! Command-line interface for devquery

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use devquery::{DeviceRuntime, QueryConfig, QueryError, QueryReport, SyntheticRuntime};
use log::info;
use std::io::{self, Write};
use std::process;

#[derive(Parser)]
#[command(name = "devquery")]
#[command(version = devquery::VERSION)]
#[command(about = "Query CUDA device capabilities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output verbosity
    #[arg(short, long, value_enum, default_value_t = Verbosity::Detailed, global = true)]
    verbosity: Verbosity,

    /// Replay a saved runtime description instead of the CUDA driver
    #[arg(long, env = "DEVQUERY_FROM_FILE", global = true)]
    from_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Query all devices (default)
    Query {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Export the full report to a JSON file
        #[arg(long)]
        json_output: Option<String>,

        /// Skip the peer access matrix
        #[arg(long)]
        no_peer: bool,
    },

    /// List device names only
    Devices,

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    Minimal,
    Normal,
    Detailed,
    Debug,
}

impl From<Verbosity> for devquery::Verbosity {
    fn from(v: Verbosity) -> Self {
        match v {
            Verbosity::Minimal => devquery::Verbosity::Minimal,
            Verbosity::Normal => devquery::Verbosity::Normal,
            Verbosity::Detailed => devquery::Verbosity::Detailed,
            Verbosity::Debug => devquery::Verbosity::Debug,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => {}
        Err(e) => {
            let code = match e.downcast_ref::<QueryError>() {
                Some(err) if devquery::is_no_device(err) => 1,
                _ => 2,
            };
            eprintln!("Error: {:#}", e);
            process::exit(code);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let runtime: Box<dyn DeviceRuntime> = match &cli.from_file {
        Some(path) => {
            info!("replaying runtime description from {}", path);
            Box::new(
                SyntheticRuntime::from_json_file(path)
                    .with_context(|| format!("failed to load {}", path))?,
            )
        }
        None => devquery::default_runtime(),
    };

    let default_command = Commands::Query {
        format: OutputFormat::Text,
        json_output: None,
        no_peer: false,
    };
    let command = cli.command.as_ref().unwrap_or(&default_command);

    match command {
        Commands::Query { format, json_output, no_peer } => {
            let config = QueryConfig {
                verbosity: match format {
                    OutputFormat::Text => cli.verbosity.into(),
                    OutputFormat::Json => devquery::Verbosity::Minimal,
                },
                peer_access: !no_peer,
            };

            let report = match format {
                // Keep stdout clean for the JSON document.
                OutputFormat::Json => {
                    devquery::query_devices_to(runtime.as_ref(), &config, &mut io::sink())?
                }
                OutputFormat::Text => devquery::query_devices(runtime.as_ref(), &config)?,
            };

            if *format == OutputFormat::Json {
                print_report_json(&report)?;
            }

            if let Some(path) = json_output {
                report.export_json(path)?;
                announce_export(*format, path, &mut io::stdout(), &mut io::stderr())?;
            }
        }

        Commands::Devices => {
            let count = runtime
                .device_count()
                .map_err(QueryError::DeviceCountQueryFailed)?;
            if count <= 0 {
                return Err(QueryError::NoDevicesFound.into());
            }
            println!("Found {} CUDA device(s):", count);
            for device in 0..count {
                let props = runtime
                    .device_properties(device)
                    .map_err(|source| QueryError::PropertiesQueryFailed { device, source })?;
                println!("  {}: {} (sm_{}{})", device, props.name, props.major, props.minor);
            }
        }

        Commands::Version => {
            println!("devquery v{}", devquery::version());
            println!("CUDA device capability reporter");
        }
    }

    Ok(())
}

// In JSON mode stdout carries only the document.
fn announce_export(
    format: OutputFormat,
    path: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => writeln!(err, "Report exported to: {}", path),
        OutputFormat::Text => writeln!(out, "\nReport exported to: {}", path),
    }
}

fn print_report_json(report: &QueryReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}
