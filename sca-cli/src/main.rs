use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use sca_engine::api::traits::EventSink;
use sca_engine::config::EngineConfig;
use sca_engine::core::dump::{dump_queue, parse_dump_request_line, run_dump_controller, try_push};
use sca_engine::core::policy::load_policy;
use sca_engine::core::scheduler::{run_scheduler, Schedule, Weekday};
use sca_engine::state::EngineState;
use sca_sink::{SinkConfig, TcpLineSink};

#[cfg(feature = "kafka")]
use sca_sink::KafkaSink;

#[derive(Parser)]
#[command(name = "sca-engine", version, about = "Security configuration assessment engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and dump controller against one or more policy files
    Run {
        /// Policy document paths (TOML)
        policies: Vec<PathBuf>,

        /// Path to an engine config file (interval, scan_day/wday/time, etc.)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to a sink config file (endpoint, max_eps, ...)
        #[arg(long = "sink-config")]
        sink_config: Option<PathBuf>,

        /// Use the Kafka sink backend instead of the newline-JSON collector
        #[cfg(feature = "kafka")]
        #[arg(long)]
        kafka: bool,

        /// Listen for inbound dump requests on this address (disabled if absent)
        #[arg(long = "listen")]
        listen: Option<String>,

        /// Prefix recognized on the inbound control channel
        #[arg(long = "dump-prefix", default_value = "dump")]
        dump_prefix: String,
    },
    /// Run a single scan cycle and print emitted events to stdout
    Scan {
        policies: Vec<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Parse and structurally validate policy documents without scanning
    Validate { policies: Vec<PathBuf> },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { policies } => cmd_validate(&policies),
        Commands::Scan { policies, config } => cmd_scan(&policies, config.as_deref()),
        Commands::Run {
            policies,
            config,
            sink_config,
            #[cfg(feature = "kafka")]
            kafka,
            listen,
            dump_prefix,
        } => {
            let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
                eprintln!("Error: failed to start async runtime: {e}");
                process::exit(2);
            });
            rt.block_on(cmd_run(
                &policies,
                config.as_deref(),
                sink_config.as_deref(),
                #[cfg(feature = "kafka")]
                kafka,
                listen,
                dump_prefix,
            ));
        }
    }
}

fn load_policies_or_exit(paths: &[PathBuf]) -> Vec<sca_engine::api::types::Policy> {
    if paths.is_empty() {
        eprintln!("Error: at least one policy file is required");
        process::exit(2);
    }
    paths
        .iter()
        .map(|p| {
            load_policy(p).unwrap_or_else(|e| {
                eprintln!("Error: cannot load policy '{}': {e}", p.display());
                process::exit(2);
            })
        })
        .collect()
}

fn cmd_validate(paths: &[PathBuf]) {
    let policies = load_policies_or_exit(paths);
    for policy in &policies {
        println!("{}: {} checks, ok", policy.policy_id, policy.checks.len());
    }
}

fn cmd_scan(paths: &[PathBuf], config_path: Option<&std::path::Path>) {
    let policies = load_policies_or_exit(paths);
    let capabilities = resolve_config(config_path).resolve();

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Error: failed to start async runtime: {e}");
        process::exit(2);
    });

    let state = EngineState::new(policies, capabilities);
    let mut sink = sca_engine::api::traits::CollectingSink::default();
    rt.block_on(state.run_scan_cycle(&mut sink));
    for line in &sink.lines {
        println!("{line}");
    }
}

fn resolve_config(config_path: Option<&std::path::Path>) -> EngineConfig {
    let mut config = match config_path {
        Some(p) => EngineConfig::from_file(p).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(2);
        }),
        None => EngineConfig::default(),
    };
    config.merge_env();
    config
}

fn schedule_from_config(config: &EngineConfig) -> Schedule {
    Schedule {
        interval: std::time::Duration::from_secs(config.interval),
        scan_on_start: config.scan_on_start,
        scan_day: config.scan_day,
        scan_wday: config.scan_wday.as_deref().and_then(Weekday::parse),
        scan_time: config.scan_time.as_deref().and_then(parse_scan_time),
    }
}

fn parse_scan_time(s: &str) -> Option<(u8, u8)> {
    let (h, m) = s.split_once(':')?;
    Some((h.parse().ok()?, m.parse().ok()?))
}

async fn cmd_run(
    policy_paths: &[PathBuf],
    config_path: Option<&std::path::Path>,
    sink_config_path: Option<&std::path::Path>,
    #[cfg(feature = "kafka")] kafka: bool,
    listen: Option<String>,
    dump_prefix: String,
) {
    let policies = load_policies_or_exit(policy_paths);
    let policy_ids: Vec<String> = policies.iter().map(|p| p.policy_id.clone()).collect();

    let config = resolve_config(config_path);
    let schedule = schedule_from_config(&config);
    let request_db_interval_secs = config.request_db_interval_seconds();
    let capabilities = config.resolve();

    let sink_config = match sink_config_path {
        Some(p) => SinkConfig::from_file(p).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(2);
        }),
        None => SinkConfig::from_env(),
    };

    let sink: Box<dyn EventSink> = {
        #[cfg(feature = "kafka")]
        {
            if kafka {
                Box::new(KafkaSink::new(&sink_config))
            } else {
                Box::new(TcpLineSink::new(&sink_config))
            }
        }
        #[cfg(not(feature = "kafka"))]
        {
            Box::new(TcpLineSink::new(&sink_config))
        }
    };
    let sink = Arc::new(AsyncMutex::new(sink));

    let state = Arc::new(EngineState::new(policies, capabilities));
    let (dump_tx, dump_rx) = dump_queue();

    let dump_state = Arc::clone(&state);
    let dump_sink = Arc::clone(&sink);
    let dump_task = tokio::spawn(async move {
        run_dump_controller(dump_state, dump_rx, dump_sink, request_db_interval_secs).await;
    });

    let listener_task = listen.map(|addr| {
        tokio::spawn(run_control_listener(addr, dump_prefix, policy_ids, dump_tx))
    });

    let scheduler_task = tokio::spawn(run_scheduler(state, schedule, sink));

    let _ = scheduler_task.await;
    let _ = dump_task.await;
    if let Some(task) = listener_task {
        let _ = task.await;
    }
}

/// Accept connections on `addr` and decode line-delimited dump requests
/// (§7.2): `<prefix>:<policy_id>:<first_scan_flag>\n`.
async fn run_control_listener(
    addr: String,
    prefix: String,
    policy_ids: Vec<String>,
    dump_tx: tokio::sync::mpsc::Sender<sca_engine::api::types::DumpRequest>,
) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(addr = %addr, error = %e, "control listener failed to bind");
            return;
        }
    };
    info!(addr = %addr, "control listener bound");

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "control listener accept failed");
                continue;
            }
        };
        let prefix = prefix.clone();
        let policy_ids = policy_ids.clone();
        let dump_tx = dump_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_dump_request_line(&line, &prefix, &policy_ids) {
                    Some(request) => try_push(&dump_tx, request),
                    None => warn!(line, "unrecognized control line, ignoring"),
                }
            }
        });
    }
}
