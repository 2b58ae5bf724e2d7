//! `rollcall` - CLI for offline-first attendance scanning

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use rollcall::cli::{resolve_token, Cli, Command, ConfigCommand, QueueCommand};
use rollcall::scan::redact_token;
use rollcall::{
    extract_id, init_logging, AttendanceResponse, Config, Connectivity, DrainStatus,
    HttpGateway, OfflineQueue, OfflineStore, ReachabilityProbe, Submitter, SyncScheduler,
};

/// Everything a command needs, wired from configuration.
#[derive(Debug)]
struct Runtime {
    config: Config,
    connectivity: Connectivity,
    submitter: Submitter,
    scheduler: Arc<SyncScheduler>,
    queue: OfflineQueue,
}

impl Runtime {
    fn build(config: Config) -> anyhow::Result<Self> {
        let database_path = config.database_path();
        let store = OfflineStore::open(&database_path).with_context(|| {
            format!("failed to open offline queue at {}", database_path.display())
        })?;
        let gateway = HttpGateway::from_config(&config).context("failed to set up gateway")?;
        let connectivity = Connectivity::new(config.connectivity.assume_online);

        let submitter = Submitter::new(Arc::new(gateway), store.clone(), connectivity.clone())
            .with_queue_rejections(config.sync.queue_rejections);
        let scheduler = Arc::new(SyncScheduler::new(&submitter, config.sync_interval()));
        let queue = OfflineQueue::new(store, Arc::clone(&scheduler));

        Ok(Self {
            config,
            connectivity,
            submitter,
            scheduler,
            queue,
        })
    }

    fn probe(&self) -> anyhow::Result<ReachabilityProbe> {
        let url = self.config.probe_url()?;
        Ok(ReachabilityProbe::new(
            url,
            self.config.probe_interval(),
            self.config.gateway_timeout(),
            self.connectivity.clone(),
        )?)
    }

    /// Probe once so one-shot commands act on the real state.
    async fn refresh_connectivity(&self) -> anyhow::Result<bool> {
        Ok(self.probe()?.refresh().await)
    }

    fn token(&self, flag: Option<&str>) -> anyhow::Result<String> {
        match resolve_token(flag, self.config.volunteer.vtoken.as_deref()) {
            Some(token) => Ok(token),
            None => bail!("a volunteer token is required (use --token or set volunteer.vtoken)"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Extract(cmd) => {
            println!("{}", extract_id(&cmd.input));
            Ok(ExitCode::SUCCESS)
        }
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::Scan(cmd) => {
            let runtime = Runtime::build(config)?;
            let token = runtime.token(cmd.token.as_deref())?;
            if cmd.offline {
                runtime.connectivity.set_online(false);
            } else {
                runtime.refresh_connectivity().await?;
            }

            let response = runtime.submitter.submit_attendance(&token, &cmd.input).await;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
            Ok(exit_code(&response))
        }
        Command::Queue(cmd) => {
            let runtime = Runtime::build(config)?;
            handle_queue(&runtime, cmd).await
        }
        Command::Sync => {
            let runtime = Runtime::build(config)?;
            runtime.refresh_connectivity().await?;
            handle_sync(&runtime).await
        }
        Command::Run(cmd) => {
            let runtime = Runtime::build(config)?;
            let token = runtime.token(cmd.token.as_deref())?;
            run(&runtime, &token).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status(cmd) => {
            let runtime = Runtime::build(config)?;
            handle_status(&runtime, cmd.json).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(response: &AttendanceResponse) -> ExitCode {
    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_response(response: &AttendanceResponse) {
    if !response.success {
        println!("FAILED   {}", response.message);
    } else if response.offline {
        println!(
            "QUEUED   {} ({}) at {}: {}",
            response.name, response.action, response.timestamp, response.message
        );
    } else {
        println!(
            "OK       {} ({}) at {}: {}",
            response.name, response.action, response.timestamp, response.message
        );
    }
}

async fn handle_queue(runtime: &Runtime, cmd: QueueCommand) -> anyhow::Result<ExitCode> {
    let queue = &runtime.queue;
    match cmd {
        QueueCommand::List { json } => {
            let scans = queue.get_pending_scans().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&scans)?);
            } else if scans.is_empty() {
                println!("No pending scans.");
            } else {
                println!("{:>6}  {:<20}  {:<12}  PARTICIPANT", "ID", "QUEUED AT", "TOKEN");
                for scan in &scans {
                    let queued_at = scan
                        .created_at()
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_default();
                    println!(
                        "{:>6}  {:<20}  {:<12}  {}",
                        scan.id,
                        queued_at,
                        redact_token(&scan.vtoken),
                        scan.participant_id()
                    );
                }
            }
        }
        QueueCommand::Count => {
            println!("{}", queue.get_pending_count().await?);
        }
        QueueCommand::Remove { id } => {
            queue.remove_scan_offline(id).await?;
            println!("Removed scan {id}.");
        }
        QueueCommand::Retry { id } => {
            let Some(scan) = queue.find(id).await? else {
                bail!("no pending scan with id {id}");
            };
            if !runtime.refresh_connectivity().await? {
                println!("Offline; scan {id} stays queued.");
                return Ok(ExitCode::FAILURE);
            }
            if queue.sync_item(&scan).await? {
                println!("Synced scan {id}.");
            } else {
                println!("Scan {id} could not be synced and stays queued.");
                return Ok(ExitCode::FAILURE);
            }
        }
        QueueCommand::Clear { yes } => {
            if !yes {
                println!("This discards every pending scan without syncing it.");
                println!("Use --yes to confirm.");
                return Ok(ExitCode::FAILURE);
            }
            let removed = queue.clear_all_offline_scans().await?;
            println!("Discarded {removed} pending scan(s).");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_sync(runtime: &Runtime) -> anyhow::Result<ExitCode> {
    match runtime.scheduler.sync_all().await? {
        DrainStatus::Completed(report) => {
            println!(
                "Synced {} of {} pending scan(s); {} remain.",
                report.synced,
                report.attempted,
                runtime.queue.get_pending_count().await?
            );
            if report.failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        DrainStatus::Offline => {
            println!("Offline; nothing was synced.");
            return Ok(ExitCode::FAILURE);
        }
        DrainStatus::Skipped => println!("A sync is already running."),
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_status(runtime: &Runtime, json: bool) -> anyhow::Result<()> {
    let online = runtime.refresh_connectivity().await?;
    let pending = runtime.queue.get_pending_count().await?;
    let config = &runtime.config;

    if json {
        let status = serde_json::json!({
            "online": online,
            "pending": pending,
            "database_path": config.database_path(),
            "remote_url": config.endpoints.remote_url,
            "proxy_url": config.endpoints.proxy_url,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("rollcall status");
        println!("---------------");
        println!("Connectivity:  {}", if online { "online" } else { "offline" });
        println!("Pending scans: {pending}");
        println!("Database:      {}", config.database_path().display());
        println!("Ledger:        {}", config.endpoints.remote_url);
        println!("Proxy:         {}", config.endpoints.proxy_url);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Endpoints]");
                println!("  Ledger:             {}", config.endpoints.remote_url);
                println!("  Proxy:              {}", config.endpoints.proxy_url);
                println!();
                println!("[Gateway]");
                println!("  Timeout (s):        {}", config.gateway.timeout_secs);
                println!();
                println!("[Sync]");
                println!("  Interval (s):       {}", config.sync.interval_secs);
                println!("  Queue rejections:   {}", config.sync.queue_rejections);
                println!();
                println!("[Connectivity]");
                println!(
                    "  Probe URL:          {}",
                    config
                        .connectivity
                        .probe_url
                        .as_deref()
                        .unwrap_or(&config.endpoints.proxy_url)
                );
                println!(
                    "  Probe interval (s): {}",
                    config.connectivity.probe_interval_secs
                );
                println!("  Assume online:      {}", config.connectivity.assume_online);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Volunteer]");
                println!(
                    "  Token:              {}",
                    config
                        .volunteer
                        .vtoken
                        .as_deref()
                        .map_or_else(|| "(not set)".to_string(), redact_token)
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Read scan payloads from stdin until EOF or Ctrl-C, syncing in the
/// background.
async fn run(runtime: &Runtime, token: &str) -> anyhow::Result<()> {
    let probe = Arc::new(runtime.probe()?);
    let probe_handle = probe.stop_handle();
    let probe_task = tokio::spawn({
        let probe = Arc::clone(&probe);
        async move { probe.run().await }
    });
    let scheduler = Arc::clone(&runtime.scheduler).spawn();

    info!(token = %redact_token(token), "Scanning session started");
    println!("Ready. Enter one scan per line; Ctrl-C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let response = runtime.submitter.submit_attendance(token, input).await;
                print_response(&response);
            }
        }
    }

    probe_handle.stop();
    probe_task.abort();
    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler did not shut down cleanly");
    }

    let pending = runtime.queue.get_pending_count().await?;
    if pending > 0 {
        println!("{pending} scan(s) still pending; they sync on the next run or `rollcall sync`.");
    }
    Ok(())
}
