use clap::Parser;
use flowcore::{load_config, OutputSink, SinkKind};
use flowcore_backtest::loader::TimestampedRow;
use flowcore_data::canonical::CanonicalRow;
use flowcore_data::exchange::MockExchangeStream;
use flowcore_data::harvester::{Harvester, HarvesterConfig};
use flowcore_instrument::ExchangeId;
use smol_str::SmolStr;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{info, warn};

/// Ingests a recorded stream of raw ticks, normalizes and gates them through
/// the data-quality checks, and publishes both the canonical rows and the
/// derived feature rows downstream for the Signal Generator (§4.1).
///
/// A live exchange connection is out of scope (§1 non-goal); this binary
/// reads a pre-recorded JSON-lines stream of `CanonicalRow`s in its place,
/// which is exactly the shape a replay/backtest-mode run and a recorded live
/// capture share.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    #[arg(long, value_enum, default_value = "dual")]
    sink: SinkKind,

    #[arg(long)]
    out: PathBuf,
}

fn read_canonical_rows(path: &PathBuf) -> anyhow::Result<Vec<CanonicalRow>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowcore::init_logging(false);
    let args = Args::parse();

    let config: HarvesterConfig = load_config(&args.config)?;
    let rows = read_canonical_rows(&args.input)?;
    info!(rows = rows.len(), "loaded recorded tick stream");

    let symbols: Vec<SmolStr> = args.symbols.iter().map(SmolStr::new).collect();
    let stream = MockExchangeStream::new(ExchangeId::Backtest, rows);
    let mut harvester = Harvester::new(stream, config, flowcore_data::canonical::SCHEMA_VERSION_CANONICAL_ROW);
    harvester.start(&symbols).await?;

    std::fs::create_dir_all(&args.out)?;
    let mut canonical_sink = OutputSink::<CanonicalRow>::open(args.sink, args.out.clone(), "canonical", "canonical", 500, 1_000)?;
    let mut feature_sink = OutputSink::<TimestampedRow>::open(args.sink, args.out.clone(), "feature", "feature", 500, 1_000)?;

    let mut last_ts_ms = 0i64;
    while let Some((row, feature)) = harvester.poll().await? {
        last_ts_ms = row.ts_ms;
        let symbol = row.symbol.clone();
        canonical_sink.write_at(&row, row.ts_ms)?;
        if let Some(feature) = feature {
            feature_sink.write_at(&TimestampedRow { ts_ms: row.ts_ms, symbol, row: feature }, row.ts_ms)?;
        }
    }

    canonical_sink.flush_at(last_ts_ms)?;
    canonical_sink.close()?;
    feature_sink.flush_at(last_ts_ms)?;
    feature_sink.close()?;

    let dq_report = harvester.dq_report();
    if dq_report.fail_rate() > flowcore_data::dq::DEAD_LETTER_FAIL_RATE {
        warn!(fail_rate = dq_report.fail_rate(), "DQ fail rate exceeded dead-letter threshold for this run");
    }
    dq_report.write_hourly(&args.out, "run")?;

    harvester.close().await?;
    info!("harvester run complete");
    Ok(())
}
