use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use logwatch_docker::DockerClient;
use logwatch_logs::{LogParser, ScanAggregator, render};
use logwatch_runner::{Config, LogsChecker, ScenarioInfo, observe};
use logwatch_types::ContainerRuntime;

/// Config file picked up from the working directory when --config is not given
const DEFAULT_CONFIG_FILE: &str = "logwatch.toml";

/// Logwatch - fail test scenarios that leave error markers in container logs
#[derive(Parser, Debug)]
#[command(name = "logwatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (defaults to ./logwatch.toml when present)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Marker to search for; repeat to give several (replaces configured markers)
    #[arg(long = "marker", short, global = true, value_name = "TEXT")]
    markers: Vec<String>,

    /// Scenario prefix to skip; repeat to give several (replaces configured prefixes)
    #[arg(long = "ignore-prefix", global = true, value_name = "PREFIX")]
    ignore_prefixes: Vec<String>,

    /// Only check containers whose name contains this
    #[arg(long, global = true, value_name = "NAME")]
    project: Option<String>,

    /// Report matches as warnings instead of failing
    #[arg(long, global = true)]
    warn_only: bool,

    /// Per-container log fetch timeout in seconds (0 = none)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Containers whose logs are fetched at the same time
    #[arg(long, global = true, value_name = "N")]
    concurrency: Option<usize>,

    /// More log output (-v info, -vv debug)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a command as a scenario and check container logs once it exits
    Run {
        /// Scenario name (defaults to the command line)
        #[arg(long)]
        name: Option<String>,

        /// Scenario file, also matched against ignore prefixes
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Scan container logs emitted since an instant
    Scan {
        /// RFC 3339 instant, or a duration back from now (30s, 5m, 2h, 1d)
        #[arg(long, value_parser = parse_since)]
        since: DateTime<Utc>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;

    let runtime = DockerClient::connect()
        .await
        .context("Failed to connect to Docker. Is the daemon running?")?;

    match args.command {
        Command::Run {
            name,
            file,
            command,
        } => run_scenario(runtime, &config, name, file, &command).await,
        Command::Scan { since, format } => scan(&runtime, &config, since, format).await,
    }
}

/// Read the config file and apply command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Config::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, args)?;
    Ok(config)
}

/// Let command-line flags replace configured values
fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if !args.markers.is_empty() {
        config.markers = args.markers.clone();
    }
    if !args.ignore_prefixes.is_empty() {
        config.ignore_prefixes = args.ignore_prefixes.clone();
    }
    if let Some(project) = &args.project {
        config.project_name = project.clone();
    }
    if args.warn_only {
        config.fail_on_match = false;
    }
    if let Some(timeout) = args.timeout {
        config.fetch_timeout_secs = timeout;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent_fetches = concurrency;
    }

    if config.markers.iter().all(|m| m.trim().is_empty()) {
        anyhow::bail!("No markers configured, nothing would ever match");
    }

    Ok(())
}

async fn run_scenario(
    runtime: DockerClient,
    config: &Config,
    name: Option<String>,
    file: Option<PathBuf>,
    command: &[String],
) -> Result<ExitCode> {
    let Some((program, program_args)) = command.split_first() else {
        anyhow::bail!("No command given");
    };

    let mut scenario = ScenarioInfo::new(name.unwrap_or_else(|| command.join(" ")));
    if let Some(file) = file {
        scenario = scenario.with_path(file);
    }

    let checker = LogsChecker::new(runtime, config);
    let (status, outcome) = observe(&checker, &scenario, async {
        tokio::process::Command::new(program)
            .args(program_args)
            .status()
            .await
    })
    .await;
    let status = status.context(format!("Failed to run '{}'", program))?;

    if let Some(message) = outcome.failure_message() {
        eprintln!("Scenario '{}' failed:{}", scenario.subject, message);
    }

    if !status.success() {
        let code = status
            .code()
            .and_then(|c| u8::try_from(c).ok())
            .filter(|c| *c != 0)
            .unwrap_or(1);
        return Ok(ExitCode::from(code));
    }

    Ok(if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn scan(
    runtime: &DockerClient,
    config: &Config,
    since: DateTime<Utc>,
    format: Format,
) -> Result<ExitCode> {
    let containers = runtime
        .list_containers(config.project_filter())
        .await
        .context("Failed to list containers")?;

    let report = ScanAggregator::new(runtime, config.scan_options())
        .aggregate(&containers, since, &config.marker_set())
        .await;

    match format {
        Format::Text if report.is_empty() => {
            println!("No markers found in {} containers", containers.len());
        }
        Format::Text => print!("{}", render(&report)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if !report.is_empty() && config.fail_on_match {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Parse `--since`: an RFC 3339 instant or an amount of s/m/h/d back from now
fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    if let Some(instant) = LogParser::parse_timestamp(value) {
        return Ok(instant);
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("'{value}' is neither an instant nor a duration"))?;

    let seconds = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(format!("unknown duration unit in '{value}' (use s, m, h or d)")),
    };

    let out_of_range = || format!("'{value}' is out of range");
    let delta = amount
        .checked_mul(seconds)
        .and_then(Duration::try_seconds)
        .ok_or_else(out_of_range)?;
    Utc::now().checked_sub_signed(delta).ok_or_else(out_of_range)
}
