use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use meshload_config::MeshloadConfig;
use meshload_engine::{run_service_mode, run_traffic_mode};
use meshload_telemetry::EventLogger;
use meshload_topology::{to_dot, ServiceGraph};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate traffic by running a service's script against its peers
    Run(RunArgs),
    /// Act as one simulated service, running its script for every request
    Serve(ServeArgs),
    /// Load and validate a topology file
    Check(CheckArgs),
    /// Render a topology file as a Graphviz digraph
    Graphviz(GraphvizArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file; the default locations are searched when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Topology file, overriding `topology.path`
    #[arg(short, long)]
    pub topology: Option<PathBuf>,
    /// Service to simulate, overriding `runner.service`
    #[arg(short, long)]
    pub service: Option<String>,
    #[arg(long)]
    pub invocations: Option<u64>,
    #[arg(long)]
    pub parallelism: Option<usize>,
    /// Seed of the request sampler
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut MeshloadConfig) {
        if let Some(path) = &self.topology {
            config.topology.path = path.clone();
        }
        if let Some(service) = &self.service {
            config.runner.service = Some(service.clone());
        }
        if let Some(invocations) = self.invocations {
            config.runner.invocations = invocations;
        }
        if let Some(parallelism) = self.parallelism {
            config.runner.parallelism = parallelism;
        }
        if let Some(seed) = self.seed {
            config.runner.seed = Some(seed);
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Configuration file; the default locations are searched when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Topology file, overriding `topology.path`
    #[arg(short, long)]
    pub topology: Option<PathBuf>,
    /// Service to act as, overriding `runner.service`
    #[arg(short, long)]
    pub service: Option<String>,
    /// Port to listen on, overriding `transport.port`
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    fn apply(&self, config: &mut MeshloadConfig) {
        if let Some(path) = &self.topology {
            config.topology.path = path.clone();
        }
        if let Some(service) = &self.service {
            config.runner.service = Some(service.clone());
        }
        if let Some(port) = self.port {
            config.transport.port = port;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    pub topology: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct GraphvizArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

pub async fn run_command(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Serve(args) => serve(args).await,
        Commands::Check(args) => {
            EventLogger::init("info");
            check(&args)
        }
        Commands::Graphviz(args) => {
            EventLogger::init("info");
            graphviz(&args)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<MeshloadConfig, CliError> {
    Ok(match path {
        Some(path) => MeshloadConfig::load_from_path(path)?,
        None => MeshloadConfig::load()?,
    })
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_ref())?;
    args.apply(&mut config);
    config.ensure_valid()?;
    EventLogger::init(&config.telemetry.log_level);

    let run = run_traffic_mode(&config).await?;
    println!("{}", run.report);
    if config.telemetry.print_metrics {
        let exposition = run
            .metrics
            .gather_metrics()
            .map_err(meshload_engine::EngineError::from)?;
        println!("{exposition}");
    }
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_ref())?;
    args.apply(&mut config);
    config.ensure_valid()?;
    EventLogger::init(&config.telemetry.log_level);

    run_service_mode(&config).await?;
    Ok(())
}

fn check(args: &CheckArgs) -> Result<(), CliError> {
    let graph = ServiceGraph::load(&args.topology)?;
    let entrypoints = graph.entrypoints().count();
    info!(services = graph.len(), entrypoints, "Topology is valid");
    println!(
        "{}: {} services, {} entrypoints",
        args.topology.display(),
        graph.len(),
        entrypoints
    );
    Ok(())
}

fn graphviz(args: &GraphvizArgs) -> Result<(), CliError> {
    let graph = ServiceGraph::load(&args.input)?;
    std::fs::write(&args.output, to_dot(&graph)).map_err(|source| CliError::Write {
        path: args.output.clone(),
        source,
    })?;
    info!(output = %args.output.display(), "Wrote Graphviz rendering");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_override_config() {
        let cli = Cli::try_parse_from([
            "meshload",
            "run",
            "--topology",
            "mesh.yaml",
            "--service",
            "frontend",
            "--invocations",
            "7",
            "--parallelism",
            "3",
            "--seed",
            "42",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        let mut config = MeshloadConfig::default();
        args.apply(&mut config);
        assert_eq!(config.topology.path, PathBuf::from("mesh.yaml"));
        assert_eq!(config.runner.service.as_deref(), Some("frontend"));
        assert_eq!(config.runner.invocations, 7);
        assert_eq!(config.runner.parallelism, 3);
        assert_eq!(config.runner.seed, Some(42));
    }

    #[test]
    fn serve_flags_override_config() {
        let cli = Cli::try_parse_from([
            "meshload", "serve", "--service", "reviews", "--port", "9090",
        ])
        .unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let mut config = MeshloadConfig::default();
        args.apply(&mut config);
        assert_eq!(config.runner.service.as_deref(), Some("reviews"));
        assert_eq!(config.transport.port, 9090);
        assert_eq!(config.topology, MeshloadConfig::default().topology);
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = MeshloadConfig::default();
        RunArgs::default().apply(&mut config);
        assert_eq!(config, MeshloadConfig::default());
    }

    #[test]
    fn graphviz_takes_input_and_output() {
        let cli = Cli::try_parse_from(["meshload", "graphviz", "in.yaml", "out.dot"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Graphviz(GraphvizArgs { ref input, ref output })
                if input == &PathBuf::from("in.yaml") && output == &PathBuf::from("out.dot")
        ));
    }

    #[test]
    fn check_requires_a_topology() {
        assert!(Cli::try_parse_from(["meshload", "check"]).is_err());
    }

    #[test]
    fn graphviz_writes_dot_file() {
        let dir = std::env::temp_dir().join(format!("meshload-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("topology.yaml");
        let output = dir.join("topology.dot");
        std::fs::write(
            &input,
            "services:\n  - name: a\n    isEntrypoint: true\n    script:\n      - call: b\n  - name: b\n",
        )
        .unwrap();

        graphviz(&GraphvizArgs {
            input,
            output: output.clone(),
        })
        .unwrap();

        let dot = std::fs::read_to_string(&output).unwrap();
        assert!(dot.starts_with("digraph"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
