use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use tracing::{info, warn};
use visitnote_api::GatewayClient;
use visitnote_engine::{EngineError, ExecutionGateway, ExecutionObserver, ExecutionStatusSource, parse_interval};
use visitnote_server::{GatewayServer, VisitnoteConfig, build_executor, load_config, load_config_from_path, resolve_bind_address};
use visitnote_types::{ExecutionHandle, StartExecutionRequest};

/// Front door used when `--server` is not given.
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
/// Environment override for the front door URL.
const SERVER_URL_ENV: &str = "VISITNOTE_SERVER";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let matches = build_cli().get_matches();
    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let server_arg = Arg::new("server")
        .long("server")
        .action(ArgAction::Set)
        .help(format!("Front door base URL (default: ${SERVER_URL_ENV} or {DEFAULT_SERVER_URL})"));
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .action(ArgAction::Set)
        .value_parser(value_parser!(PathBuf))
        .help("Path to the configuration file (JSON or YAML)");
    let handle_arg = Arg::new("handle").required(true).help("Execution handle returned by submit");

    Command::new("visitnote")
        .about("Transcribe, summarize and annotate recorded patient visits")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP front door until interrupted")
                .arg(config_arg.clone())
                .arg(Arg::new("bind").long("bind").action(ArgAction::Set).help("Socket address to listen on")),
        )
        .subcommand(
            job_args(Command::new("submit").about("Start an execution and print its handle")).arg(server_arg.clone()),
        )
        .subcommand(
            Command::new("status")
                .about("Print an execution snapshot")
                .arg(handle_arg.clone())
                .arg(server_arg.clone()),
        )
        .subcommand(
            Command::new("history")
                .about("Print the state transitions of an execution")
                .arg(handle_arg.clone())
                .arg(server_arg.clone()),
        )
        .subcommand(
            Command::new("stop")
                .about("Stop a running execution")
                .arg(handle_arg.clone())
                .arg(
                    Arg::new("cause")
                        .long("cause")
                        .action(ArgAction::Set)
                        .help("Reason recorded on the aborted execution"),
                )
                .arg(server_arg.clone()),
        )
        .subcommand(
            Command::new("await")
                .about("Wait for an execution to finish and print its outputs")
                .arg(handle_arg)
                .arg(interval_arg())
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .action(ArgAction::Set)
                        .help("Give up after this long (for example 600 or 10m)"),
                )
                .arg(server_arg),
        )
        .subcommand(
            job_args(Command::new("run").about("Run the pipeline in-process and print its outputs")).arg(config_arg),
        )
}

fn job_args(command: Command) -> Command {
    command
        .arg(Arg::new("job-name").long("job-name").required(true).action(ArgAction::Set))
        .arg(Arg::new("job-uri").long("job-uri").required(true).action(ArgAction::Set))
        .arg(Arg::new("output-location").long("output-location").required(true).action(ArgAction::Set))
        .arg(Arg::new("output-prefix").long("output-prefix").required(true).action(ArgAction::Set))
        .arg(
            Arg::new("language")
                .long("language")
                .action(ArgAction::Set)
                .default_value("English"),
        )
}

fn interval_arg() -> Arg {
    Arg::new("interval")
        .long("interval")
        .action(ArgAction::Set)
        .help("Seconds between status checks (default 5)")
}

async fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("serve", sub)) => serve(sub).await,
        Some(("submit", sub)) => {
            let client = gateway_client(sub)?;
            let response = client
                .start_execution(&start_request(sub))
                .await
                .with_context(|| format!("starting execution via {}", client.base_url()))?;
            println!("{}", response.sm_execution_arn);
            Ok(())
        }
        Some(("status", sub)) => {
            let snapshot = gateway_client(sub)?.describe_execution(&handle(sub)).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Some(("history", sub)) => {
            let history = gateway_client(sub)?.execution_history(&handle(sub)).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(())
        }
        Some(("stop", sub)) => {
            let cause = sub.get_one::<String>("cause").map(String::as_str);
            let snapshot = gateway_client(sub)?.stop_execution(&handle(sub), cause).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Some(("await", sub)) => {
            let source: Arc<dyn ExecutionStatusSource> = Arc::new(gateway_client(sub)?);
            let mut observer = ExecutionObserver::new(source);
            if let Some(timeout) = sub.get_one::<String>("timeout") {
                observer = observer.with_deadline(duration_arg("timeout", timeout)?);
            }
            let interval = match sub.get_one::<String>("interval") {
                Some(raw) => interval_from(raw)?,
                None => visitnote_engine::DEFAULT_OBSERVER_INTERVAL,
            };
            print_outputs(&observer, &handle(sub), interval).await
        }
        Some(("run", sub)) => run_in_process(sub).await,
        _ => anyhow::bail!("expected a subcommand; see --help"),
    }
}

async fn serve(matches: &ArgMatches) -> Result<()> {
    let config = config_from(matches)?;
    let bind_address = resolve_bind_address(
        matches.get_one::<String>("bind").map(String::as_str),
        &config.http_server.bind_address,
    )?;
    let executor = build_executor(&config)?;
    let server = GatewayServer::new(bind_address, executor).start().await?;
    println!("listening on http://{}", server.bound_address());

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    server.stop().await
}

async fn run_in_process(matches: &ArgMatches) -> Result<()> {
    let config = config_from(matches)?;
    let executor = build_executor(&config)?;
    let shared = Arc::new(executor.clone());
    let gateway = ExecutionGateway::new(shared.clone());
    let mut observer = ExecutionObserver::new(shared);
    if let Some(deadline) = config.observer.deadline() {
        observer = observer.with_deadline(deadline);
    }

    let handle = gateway.start_from_wire(start_request(matches)).await?;
    info!(handle = %handle, "execution started in-process");
    let result = print_outputs(&observer, &handle, config.observer.interval).await;
    executor.shutdown();
    result
}

async fn print_outputs(observer: &ExecutionObserver, handle: &ExecutionHandle, interval: Duration) -> Result<()> {
    match observer.await_outputs(handle, interval).await {
        Ok(outputs) => {
            println!("{}", serde_json::to_string_pretty(&outputs)?);
            Ok(())
        }
        Err(EngineError::ExecutionFailed { status, cause }) => {
            warn!(handle = %handle, status = %status, "execution did not succeed");
            let cause = cause.map(|text| format!(": {text}")).unwrap_or_default();
            anyhow::bail!("{status}{cause}")
        }
        Err(other) => Err(other.into()),
    }
}

fn duration_arg(name: &str, raw: &str) -> Result<Duration> {
    parse_interval(raw).with_context(|| format!("invalid --{name} '{raw}'; expected seconds or a value like 30s or 5m"))
}

/// Interval between status checks; must be non-zero.
fn interval_from(raw: &str) -> Result<Duration> {
    let interval = duration_arg("interval", raw)?;
    if interval.is_zero() {
        anyhow::bail!("invalid --interval '{raw}'; must be greater than zero");
    }
    Ok(interval)
}

fn config_from(matches: &ArgMatches) -> Result<VisitnoteConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    config.context("loading configuration")
}

fn gateway_client(matches: &ArgMatches) -> Result<GatewayClient> {
    let base_url = matches
        .get_one::<String>("server")
        .cloned()
        .or_else(|| std::env::var(SERVER_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    GatewayClient::new(&base_url, Duration::from_secs(30)).with_context(|| format!("connecting to {base_url}"))
}

fn start_request(matches: &ArgMatches) -> StartExecutionRequest {
    let value = |name: &str| matches.get_one::<String>(name).cloned();
    StartExecutionRequest {
        job_name: value("job-name"),
        job_uri: value("job-uri"),
        output_location: value("output-location"),
        output_prefix: value("output-prefix"),
        language: value("language"),
    }
}

fn handle(matches: &ArgMatches) -> ExecutionHandle {
    ExecutionHandle::from(matches.get_one::<String>("handle").cloned().unwrap_or_default())
}
