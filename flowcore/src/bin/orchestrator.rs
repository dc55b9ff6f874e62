use clap::Parser;
use flowcore::load_config;
use flowcore_orchestrator::probe::{HealthProbe, ReadyProbe};
use flowcore_orchestrator::restart::RestartPolicy;
use flowcore_orchestrator::worker::{WorkerName, WorkerSpec, WORKER_ORDER};
use flowcore_orchestrator::{RunManifest, RunOutcome, SourceManifest, Supervisor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Supervises the pipeline's worker processes end to end: ordered launch,
/// readiness/health probing, restart-on-failure, reverse-order shutdown and
/// consolidated run/source manifests (§4.5). Spawns the workspace's own
/// sibling binaries (`harvester`, `signal-gen`, `strategy`) as child
/// processes rather than linking them in-process, matching §5's "one OS
/// process per worker" scheduling model.
#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    /// Comma-separated subset of `harvest,signal,strategy,broker,report`
    /// (§6). `broker` is accepted for vocabulary parity with the spec but
    /// has no separate process in this workspace — the Strategy binary
    /// already performs risk precheck *and* order submission as one
    /// component (§4.3), so enabling `broker` is folded into `strategy`
    /// (recorded in DESIGN.md).
    #[arg(long, value_delimiter = ',', default_value = "harvest,signal,strategy")]
    enable: Vec<String>,

    #[arg(long, value_enum, default_value = "dual")]
    sink: flowcore::SinkKind,

    /// Wall-clock budget for the whole run before the orchestrator
    /// initiates graceful shutdown on its own, independent of whether every
    /// worker has exited (§6 `--minutes <N>`).
    #[arg(long, default_value_t = 60)]
    minutes: u64,

    /// Validate configuration and worker specs, then exit without spawning
    /// anything (§4.5 supplement).
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

/// Launch parameters for one worker (§4.5, §6). The orchestrator config file
/// supplies the part of each worker's CLI surface that is run-specific
/// (input/signals paths, per-worker algorithm config); `--sink`, `--out` and
/// the binary directory are shared across every worker in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkerFiles {
    config: PathBuf,
    input: PathBuf,
    #[serde(default)]
    symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StrategyFiles {
    config: PathBuf,
    mode: String,
    signals_dir: PathBuf,
    #[serde(default)]
    features: Option<PathBuf>,
}

/// Optional external report worker (§1 non-goal: rendering/report generation
/// is an external collaborator, but the orchestrator still supervises
/// whatever program the operator points it at, per §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReportFiles {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SupervisionTuning {
    #[serde(default = "default_ready_timeout_ms")]
    ready_timeout_ms: u64,
    #[serde(default = "default_health_interval_ms")]
    health_interval_ms: u64,
    #[serde(default = "default_grace_period_ms")]
    grace_period_ms: u64,
    #[serde(default = "default_max_restarts")]
    max_restarts: u32,
    #[serde(default = "default_backoff_base_ms")]
    backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    backoff_cap_ms: u64,
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}
fn default_health_interval_ms() -> u64 {
    5_000
}
fn default_grace_period_ms() -> u64 {
    5_000
}
fn default_max_restarts() -> u32 {
    2
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_cap_ms() -> u64 {
    10_000
}

impl Default for SupervisionTuning {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout_ms(),
            health_interval_ms: default_health_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            max_restarts: default_max_restarts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

/// The orchestrator's `--config` document: everything needed to build a
/// [`WorkerSpec`] per enabled worker plus the run's shared output root.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrchestratorConfig {
    out: PathBuf,
    harvest: WorkerFiles,
    signal: WorkerFiles,
    strategy: StrategyFiles,
    #[serde(default)]
    report: Option<ReportFiles>,
    #[serde(default)]
    tuning: SupervisionTuning,
    /// Directory the sibling worker binaries live in; defaults to the
    /// orchestrator's own binary directory (the normal case — all four
    /// binaries land in the same `target/<profile>` directory from one
    /// workspace build).
    #[serde(default)]
    bin_dir: Option<PathBuf>,
}

fn sibling_bin_dir(override_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    let exe = std::env::current_exe()?;
    Ok(exe.parent().expect("a binary path always has a parent directory").to_path_buf())
}

fn parse_worker_name(s: &str) -> Option<WorkerName> {
    match s.to_ascii_lowercase().as_str() {
        "harvest" => Some(WorkerName::Harvest),
        "signal" => Some(WorkerName::Signal),
        "strategy" => Some(WorkerName::Strategy),
        "report" => Some(WorkerName::Report),
        _ => None,
    }
}

fn parse_enabled(raw: &[String]) -> Vec<WorkerName> {
    let mut names = Vec::new();
    for token in raw {
        let token = token.trim();
        if token.eq_ignore_ascii_case("broker") {
            warn!("`broker` has no separate process in this workspace; folded into `strategy`");
            if !names.contains(&WorkerName::Strategy) {
                names.push(WorkerName::Strategy);
            }
            continue;
        }
        match parse_worker_name(token) {
            Some(name) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            None => warn!(worker = token, "unrecognised worker name in --enable, ignoring"),
        }
    }
    names
}

fn build_specs(
    config: &OrchestratorConfig,
    enabled: &[WorkerName],
    bin_dir: &Path,
    sink: flowcore::SinkKind,
    tuning: &SupervisionTuning,
) -> anyhow::Result<HashMap<WorkerName, WorkerSpec>> {
    let sink_flag = match sink {
        flowcore::SinkKind::Jsonl => "jsonl",
        flowcore::SinkKind::Sqlite => "sqlite",
        flowcore::SinkKind::Dual => "dual",
    };
    let ready_timeout = Duration::from_millis(tuning.ready_timeout_ms);
    let health_interval = Duration::from_millis(tuning.health_interval_ms);
    let grace_period = Duration::from_millis(tuning.grace_period_ms);
    let restart = |seed: u64| {
        RestartPolicy::new(
            tuning.max_restarts,
            Duration::from_millis(tuning.backoff_base_ms),
            Duration::from_millis(tuning.backoff_cap_ms),
            seed,
        )
    };

    let mut specs = HashMap::new();

    if enabled.contains(&WorkerName::Harvest) {
        let out = config.out.clone();
        let ready_path = out.join("ready").join("canonical");
        let mut args = vec![
            "--config".to_string(),
            path_str(&config.harvest.config),
            "--input".to_string(),
            path_str(&config.harvest.input),
            "--sink".to_string(),
            sink_flag.to_string(),
            "--out".to_string(),
            path_str(&out),
        ];
        if !config.harvest.symbols.is_empty() {
            args.push("--symbols".to_string());
            args.push(config.harvest.symbols.join(","));
        }
        specs.insert(
            WorkerName::Harvest,
            WorkerSpec {
                name: WorkerName::Harvest,
                program: bin_dir.join("harvester").to_string_lossy().into_owned(),
                args,
                envs: vec![],
                ready_probe: ReadyProbe::SentinelFile { path: ready_path },
                ready_timeout,
                health_probe: HealthProbe::None,
                health_interval,
                grace_period,
                restart: restart(1),
            },
        );
    }

    if enabled.contains(&WorkerName::Signal) {
        let out = config.out.clone();
        let ready_path = out.join("ready").join("signal");
        specs.insert(
            WorkerName::Signal,
            WorkerSpec {
                name: WorkerName::Signal,
                program: bin_dir.join("signal-gen").to_string_lossy().into_owned(),
                args: vec![
                    "--config".to_string(),
                    path_str(&config.signal.config),
                    "--input".to_string(),
                    path_str(&config.signal.input),
                    "--sink".to_string(),
                    sink_flag.to_string(),
                    "--out".to_string(),
                    path_str(&out),
                ],
                envs: vec![],
                ready_probe: ReadyProbe::SentinelFile { path: ready_path },
                ready_timeout,
                health_probe: HealthProbe::None,
                health_interval,
                grace_period,
                restart: restart(2),
            },
        );
    }

    if enabled.contains(&WorkerName::Strategy) {
        let out = config.out.clone();
        let ready_path = out.join("ready").join("execlog");
        let mut args = vec![
            "--config".to_string(),
            path_str(&config.strategy.config),
            "--mode".to_string(),
            config.strategy.mode.clone(),
            "--signals-dir".to_string(),
            path_str(&config.strategy.signals_dir),
            "--sink".to_string(),
            sink_flag.to_string(),
            "--out".to_string(),
            path_str(&out),
        ];
        if let Some(features) = &config.strategy.features {
            args.push("--features".to_string());
            args.push(path_str(features));
        }
        specs.insert(
            WorkerName::Strategy,
            WorkerSpec {
                name: WorkerName::Strategy,
                program: bin_dir.join("strategy").to_string_lossy().into_owned(),
                args,
                envs: vec![],
                ready_probe: ReadyProbe::SentinelFile { path: ready_path },
                ready_timeout,
                health_probe: HealthProbe::None,
                health_interval,
                grace_period,
                restart: restart(3),
            },
        );
    }

    if enabled.contains(&WorkerName::Report) {
        let Some(report) = &config.report else {
            anyhow::bail!("`report` was enabled but the config has no [report] section");
        };
        specs.insert(
            WorkerName::Report,
            WorkerSpec {
                name: WorkerName::Report,
                program: report.program.clone(),
                args: report.args.clone(),
                envs: vec![],
                ready_probe: ReadyProbe::Immediate,
                ready_timeout,
                health_probe: HealthProbe::None,
                health_interval,
                grace_period,
                restart: restart(4),
            },
        );
    }

    Ok(specs)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn resolve_run_id() -> String {
    std::env::var("RUN_ID").unwrap_or_else(|_| {
        let now = chrono::Utc::now();
        now.format("%Y%m%d_%H%M%S").to_string()
    })
}

/// Whether the Signal worker published anything at all, across whichever
/// sink backend was active — an empty/missing `ready/signal` tree for the
/// JSONL side, and an empty or absent `signals.db` for the SQLite side
/// (§7 "no confirmed signals" is a warning, not a failure, since the run
/// otherwise completed cleanly).
fn signals_were_produced(out: &Path) -> bool {
    let jsonl_dir = out.join("ready").join("signal");
    let has_jsonl = std::fs::read_dir(&jsonl_dir).map(|mut entries| entries.next().is_some()).unwrap_or(false);
    let sqlite_path = out.join("artifacts").join("signals.db");
    let has_sqlite = std::fs::metadata(&sqlite_path).map(|m| m.len() > 0).unwrap_or(false);
    has_jsonl || has_sqlite
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowcore::init_logging(false);
    let args = Args::parse();

    let config: OrchestratorConfig = load_config(&args.config)?;
    let enabled = parse_enabled(&args.enable);
    if enabled.is_empty() {
        anyhow::bail!("no recognised workers in --enable");
    }
    let bin_dir = sibling_bin_dir(config.bin_dir.clone())?;
    let specs = build_specs(&config, &enabled, &bin_dir, args.sink, &config.tuning)?;

    let run_id = resolve_run_id();
    let config_digest = flowcore_integration::config_hash(&serde_json::to_value(&config)?);
    info!(run_id = %run_id, %config_digest, workers = ?enabled, "resolved orchestrator run");

    if args.dry_run {
        for name in WORKER_ORDER.into_iter().filter(|n| enabled.contains(n)) {
            let spec = specs.get(&name).expect("spec built for every enabled worker");
            info!(worker = %name, program = %spec.program, args = ?spec.args, "dry-run: would launch");
        }
        info!("dry-run complete, no workers spawned");
        return Ok(());
    }

    let started_ms = chrono::Utc::now().timestamp_millis();
    let manifest = RunManifest::new(run_id.clone(), started_ms, config_digest.clone());
    let source_manifest = SourceManifest::capture(run_id.clone(), config_digest);

    let mut supervisor = Supervisor::new(specs, manifest);
    let cancel_tx = supervisor.cancellation_handle();

    let run_budget = Duration::from_secs(args.minutes * 60);
    let supervise = supervisor.run(&enabled);
    tokio::pin!(supervise);

    let outcome = tokio::select! {
        result = &mut supervise => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, requesting graceful shutdown");
            cancel_tx.send_replace(true);
            supervise.await?;
            RunOutcome::SignalTerminated
        }
        _ = tokio::time::sleep(run_budget) => {
            warn!(minutes = args.minutes, "run budget elapsed, requesting graceful shutdown");
            cancel_tx.send_replace(true);
            supervise.await?
        }
    };

    let outcome = if matches!(outcome, RunOutcome::Clean)
        && enabled.contains(&WorkerName::Signal)
        && !signals_were_produced(&config.out)
    {
        warn!("signal worker ran but produced no confirmed signal records");
        RunOutcome::NoSignalsWarning
    } else {
        outcome
    };

    let mut manifest = supervisor.manifest().clone();
    manifest.finalize(chrono::Utc::now().timestamp_millis());
    manifest.write(&config.out)?;
    source_manifest.write(&config.out)?;

    info!(?outcome, exit_code = outcome.exit_code(), "orchestrator run complete");
    std::process::exit(outcome.exit_code());
}
