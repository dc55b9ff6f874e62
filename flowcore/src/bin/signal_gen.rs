use clap::Parser;
use flowcore::{load_config, load_feature_rows, OutputSink, SinkKind};
use flowcore_signal::config::AlgoConfig;
use flowcore_signal::engine::Decider;
use flowcore_signal::record::SignalRecord;
use std::path::PathBuf;
use tracing::info;

/// Turns every feature row the Harvester produced into one `SignalRecord`
/// via the deterministic, fingerprinted Decision Engine (§4.2).
#[derive(Parser, Debug)]
#[command(name = "signal-gen")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    /// A single feature JSON-lines file, or a directory of them.
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, default_value = "dual")]
    sink: SinkKind,

    #[arg(long)]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowcore::init_logging(false);
    let args = Args::parse();

    let config: AlgoConfig = load_config(&args.config)?;
    info!(config_hash = %config.config_hash(), "loaded algorithm config");

    let rows = load_feature_rows(&args.input)?;
    info!(rows = rows.len(), "loaded feature rows");

    std::fs::create_dir_all(&args.out)?;
    let mut sink = OutputSink::<SignalRecord>::open(args.sink, args.out.clone(), "signal", "signal", 500, 1_000)?;

    let mut decider = Decider::new();
    let mut confirmed = 0u64;
    for (idx, row) in rows.iter().enumerate() {
        let record = decider.decide(&row.symbol, row.ts_ms, idx as u64, &row.row, &config);
        if record.confirm {
            confirmed += 1;
        }
        sink.write_at(&record, row.ts_ms)?;
    }

    let last_ts_ms = rows.last().map(|r| r.ts_ms).unwrap_or(0);
    sink.flush_at(last_ts_ms)?;
    sink.close()?;

    info!(confirmed, total = rows.len(), "signal generation run complete");
    Ok(())
}
