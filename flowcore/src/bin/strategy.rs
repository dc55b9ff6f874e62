use clap::{Parser, ValueEnum};
use flowcore::{load_config, OutputSink, SinkKind};
use flowcore_backtest::SymbolFilters;
use flowcore_execution::adapter::MockAdapter;
use flowcore_execution::backtest::{BacktestExecutor, FeeModel, MidPriceSource};
use flowcore_execution::executor::GuardedExecutor;
use flowcore_execution::live::AdapterExecutor;
use flowcore_execution::order::{
    ClientOrderId, ExecLogEvent, ExecResult, ExecStatus, OrderCtx, OrderType, RejectReason,
    Side as ExecSide, TimeInForce,
};
use flowcore_execution::outbox::Outbox;
use flowcore_execution::throttle::{AdaptiveThrottler, ThrottlerConfig};
use flowcore_instrument::exchange::ExchangeId;
use flowcore_instrument::time::{LiveClock, SimClock};
use flowcore_risk::alert::VecAlertHook;
use flowcore_risk::precheck::{PrecheckConfig, PrecheckOutcome, RiskPrecheck};
use flowcore_signal::record::{Side as SignalSide, SignalRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// The `--mode` flag (§6): which [`flowcore_execution::Executor`] variant
/// dispatches accepted orders. `Testnet`/`Live` differ only in which
/// exchange credentials and `ExchangeId` they carry — both route through
/// the same [`MockAdapter`]-backed path since a concrete venue client is
/// out of scope (§1 non-goal); `Live` additionally requires the operator
/// confirmation gate below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Backtest,
    Testnet,
    Live,
}

/// Consumes confirmed `SignalRecord`s, runs them through the ordered Risk
/// Precheck pipeline and the adaptive throttler, and dispatches accepted
/// orders through an idempotency-guarded executor, logging every lifecycle
/// transition to the exec-log outbox (§4.3).
#[derive(Parser, Debug)]
#[command(name = "strategy")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    #[arg(long, value_enum)]
    mode: ModeArg,

    /// A single signal JSON-lines file, or a directory of them (§6
    /// `--signals-dir`).
    #[arg(long = "signals-dir")]
    signals_dir: PathBuf,

    /// Reference mid prices the precheck's notional guards and the
    /// Backtest executor's fill simulation read from — the same feature
    /// rows the Harvester published (§4.1), supplementing the signal
    /// stream with the price context a signal record does not itself
    /// carry.
    #[arg(long)]
    features: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "dual")]
    sink: SinkKind,

    #[arg(long)]
    out: PathBuf,
}

/// Everything the Strategy worker needs besides the signal stream itself —
/// the union of the Risk Precheck, Adaptive Throttler and (Backtest-mode)
/// fee/fill config, plus per-symbol exchange filters and idempotent-retry
/// tunables (§4.3, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StrategyConfig {
    precheck: PrecheckConfig,
    throttle: ThrottlerConfig,
    fees: FeeModel,
    #[serde(default)]
    filters: HashMap<SmolStr, SymbolFilters>,
    /// Fixed order size applied to every submitted order — signal records
    /// carry a direction and confidence score but no position-sizing
    /// decision, which this worker takes as an external configuration
    /// input rather than reinventing a sizing model the spec does not
    /// describe (§9 decision, recorded in DESIGN.md).
    default_qty: Decimal,
    idempotency_capacity: usize,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
    seed: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            precheck: PrecheckConfig::default(),
            throttle: ThrottlerConfig::default(),
            fees: FeeModel::default(),
            filters: HashMap::new(),
            default_qty: Decimal::ONE,
            idempotency_capacity: 4_096,
            backoff_base_ms: 50,
            backoff_cap_ms: 2_000,
            seed: 7,
        }
    }
}

impl StrategyConfig {
    fn filters_for(&self, symbol: &str) -> SymbolFilters {
        self.filters.get(symbol).copied().unwrap_or_default()
    }
}

struct StaticMidPrices(HashMap<SmolStr, Decimal>);

impl MidPriceSource for StaticMidPrices {
    fn mid(&self, symbol: &str) -> Option<Decimal> {
        self.0.get(symbol).copied()
    }
}

fn read_signal_records(path: &Path) -> anyhow::Result<Vec<SignalRecord>> {
    let mut files: Vec<PathBuf> = if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };
    if files.is_empty() {
        files.push(path.to_path_buf());
    }

    let mut records = Vec::new();
    for file in files {
        let contents = std::fs::read_to_string(&file)?;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
    }
    records.sort_by_key(|r: &SignalRecord| r.ts_ms);
    Ok(records)
}

/// Latest mid price per symbol from a recorded feature stream, keyed last-
/// write-wins in timestamp order.
fn load_mid_prices(path: Option<&Path>) -> anyhow::Result<HashMap<SmolStr, Decimal>> {
    let Some(path) = path else { return Ok(HashMap::new()) };
    let rows = flowcore::load_feature_rows(path)?;
    let mut mids = HashMap::new();
    for row in rows {
        mids.insert(row.symbol, row.row.mid);
    }
    Ok(mids)
}

fn order_ctx_for(
    config: &StrategyConfig,
    signal: &SignalRecord,
    side: ExecSide,
    costs_bps: f64,
) -> OrderCtx {
    let filters = config.filters_for(signal.symbol.as_str());
    let guard_reason = signal.guard_reason.map(|code| {
        let value = serde_json::to_value(code).unwrap_or_default();
        SmolStr::new(value.as_str().unwrap_or("unknown"))
    });
    OrderCtx {
        client_order_id: ClientOrderId::derive(signal.signal_row_id, signal.ts_ms, side, config.default_qty, None),
        symbol: signal.symbol.clone(),
        side,
        qty: config.default_qty,
        order_type: OrderType::Market,
        price: None,
        time_in_force: TimeInForce::Ioc,
        signal_row_id: signal.signal_row_id,
        regime: signal.regime,
        scenario: signal.scenario,
        warmup: signal.warmup,
        guard_reason,
        consistency: signal.consistency,
        weak_signal_throttle: signal.weak_signal_throttle,
        tick_size: filters.tick_size,
        step_size: filters.step_size,
        min_notional: filters.min_notional,
        costs_bps,
        event_ts_ms: signal.ts_ms,
    }
}

fn rejected_result(ctx: &OrderCtx, reason: RejectReason) -> ExecResult {
    ExecResult {
        status: ExecStatus::Rejected,
        client_order_id: ctx.client_order_id.clone(),
        exchange_order_id: None,
        reject_reason: Some(reason),
        latency_ms: 0,
        slippage_bps: None,
        rounding_applied: false,
        sent_ts_ms: ctx.event_ts_ms,
        ack_ts_ms: None,
        fill_ts_ms: None,
        px_fill: None,
        fee: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowcore::init_logging(false);
    let args = Args::parse();

    if args.mode == ModeArg::Live && std::env::var("LIVE_CONFIRM").as_deref() != Ok("YES") {
        anyhow::bail!("live mode requires LIVE_CONFIRM=YES to be set explicitly (§6)");
    }

    let config: StrategyConfig = load_config(&args.config)?;
    let signals = read_signal_records(&args.signals_dir)?;
    info!(signals = signals.len(), mode = ?args.mode, "loaded signal records");
    let mid_prices = load_mid_prices(args.features.as_deref())?;

    // The exec-log outbox is always dual (§4.6 parity accounting, §8 P4) —
    // a non-dual `--sink` is accepted for CLI parity with the other workers
    // but has no effect here, since idempotent-retry auditing needs both
    // sinks to compute the same parity diff the other workers report.
    if args.sink != SinkKind::Dual {
        warn!(requested = ?args.sink, "exec log always writes the dual sink for audit parity; --sink override ignored");
    }

    std::fs::create_dir_all(&args.out)?;
    let exec_sqlite_path = args.out.join("artifacts").join("exec_events.db");
    let mut outbox = Outbox::open(&args.out, &exec_sqlite_path)?;

    let mut precheck = RiskPrecheck::new(config.precheck, VecAlertHook::default(), ExchangeId::Backtest);
    let mut throttler = AdaptiveThrottler::new(config.throttle);

    let first_ts_ms = signals.first().map(|s| s.ts_ms).unwrap_or(0);
    let backoff = flowcore_integration::JitteredBackoff::new(
        std::time::Duration::from_millis(config.backoff_base_ms),
        std::time::Duration::from_millis(config.backoff_cap_ms),
    );

    let mut submitted = 0u64;
    let mut rejected = 0u64;
    let mut throttled = 0u64;
    let mut last_ts_ms = first_ts_ms;

    match args.mode {
        ModeArg::Backtest => {
            let clock = SimClock::new(first_ts_ms);
            let inner = BacktestExecutor::new(StaticMidPrices(mid_prices.clone()), clock, config.fees, config.seed);
            let mut executor = GuardedExecutor::new(inner, config.idempotency_capacity, backoff, config.seed);

            for signal in &signals {
                last_ts_ms = signal.ts_ms;
                let Some(side) = signal_side(signal) else { continue };
                if !signal.confirm {
                    continue;
                }
                let ctx = order_ctx_for(&config, signal, side, config.fees.taker_fee_bps);
                let notional_px = mid_prices.get(&signal.symbol).copied().unwrap_or(Decimal::ONE);
                match precheck.check(ctx, notional_px) {
                    PrecheckOutcome::Accept(accepted) => {
                        let px_intent = accepted.price;
                        let symbol = accepted.symbol.clone();
                        let qty = accepted.qty;
                        let result = executor.submit_guarded(accepted).await;
                        throttler.record_outcome(result.status == ExecStatus::Rejected);
                        log_and_record(&mut outbox, &result, &symbol, qty, px_intent, signal.ts_ms, &mut submitted, &mut rejected)?;
                    }
                    PrecheckOutcome::Reject(reason) => {
                        reject_without_submit(&config, &mut outbox, signal, side, reason, &mut rejected)?;
                    }
                    PrecheckOutcome::Throttle => {
                        throttled += 1;
                        info!(symbol = %signal.symbol, "order throttled by precheck");
                    }
                }
            }
        }
        ModeArg::Testnet | ModeArg::Live => {
            let exchange_id = if args.mode == ModeArg::Live { ExchangeId::Live } else { ExchangeId::Testnet };
            let fee_bps = Decimal::from_f64_retain(config.fees.taker_fee_bps).unwrap_or_default();
            let adapter = Arc::new(MockAdapter { reject: false, fee_bps });
            let inner = AdapterExecutor::new(adapter, LiveClock);
            let mut executor = GuardedExecutor::new(inner, config.idempotency_capacity, backoff, config.seed);
            precheck = RiskPrecheck::new(config.precheck, VecAlertHook::default(), exchange_id);

            for signal in &signals {
                last_ts_ms = signal.ts_ms;
                let Some(side) = signal_side(signal) else { continue };
                if !signal.confirm {
                    continue;
                }
                let rate_limit = throttler.current_rate_limit(signal.regime);
                if rate_limit > 0.0 {
                    tokio::time::sleep(std::time::Duration::from_secs_f64(1.0 / rate_limit)).await;
                }
                let ctx = order_ctx_for(&config, signal, side, config.fees.taker_fee_bps);
                let notional_px = mid_prices.get(&signal.symbol).copied().unwrap_or(Decimal::ONE);
                match precheck.check(ctx, notional_px) {
                    PrecheckOutcome::Accept(accepted) => {
                        let px_intent = accepted.price;
                        let symbol = accepted.symbol.clone();
                        let qty = accepted.qty;
                        let result = executor.submit_guarded(accepted).await;
                        throttler.record_outcome(result.status == ExecStatus::Rejected);
                        log_and_record(&mut outbox, &result, &symbol, qty, px_intent, signal.ts_ms, &mut submitted, &mut rejected)?;
                    }
                    PrecheckOutcome::Reject(reason) => {
                        reject_without_submit(&config, &mut outbox, signal, side, reason, &mut rejected)?;
                    }
                    PrecheckOutcome::Throttle => {
                        throttled += 1;
                        info!(symbol = %signal.symbol, "order throttled by precheck");
                    }
                }
            }
        }
    }

    outbox.flush(last_ts_ms)?;
    let diffs = outbox.parity_diff();
    let parity_passed = diffs.iter().all(|d| d.passed);
    if !parity_passed {
        warn!(?diffs, "dual-sink parity diff failed core-counter threshold");
    }
    let parity_path = args.out.join("artifacts").join(format!("parity_diff_{last_ts_ms}.json"));
    std::fs::create_dir_all(parity_path.parent().expect("artifacts dir computed above"))?;
    std::fs::write(&parity_path, serde_json::to_vec_pretty(&diffs)?)?;
    outbox.close()?;

    info!(submitted, rejected, throttled, parity_passed, "strategy run complete");
    Ok(())
}

fn signal_side(signal: &SignalRecord) -> Option<ExecSide> {
    match signal.side {
        SignalSide::Buy => Some(ExecSide::Buy),
        SignalSide::Sell => Some(ExecSide::Sell),
        SignalSide::None => None,
    }
}

fn log_and_record(
    outbox: &mut Outbox,
    result: &ExecResult,
    symbol: &SmolStr,
    qty: Decimal,
    px_intent: Option<Decimal>,
    ts_ms: i64,
    submitted: &mut u64,
    rejected: &mut u64,
) -> anyhow::Result<()> {
    let event = ExecLogEvent::from_result(symbol.clone(), qty, px_intent, px_intent, result, ts_ms);
    // Failed orders are logged at full sample rate; accepted ones are
    // sampled to keep log volume bounded over a long run (§7).
    if result.status == ExecStatus::Rejected {
        *rejected += 1;
        warn!(symbol = %symbol, reason = ?result.reject_reason, "order rejected");
    } else {
        *submitted += 1;
        if *submitted % 100 == 1 {
            info!(symbol = %symbol, status = %result.status, "order submitted");
        }
    }
    outbox.record(&event, ts_ms)?;
    Ok(())
}

fn reject_without_submit(
    config: &StrategyConfig,
    outbox: &mut Outbox,
    signal: &SignalRecord,
    side: ExecSide,
    reason: RejectReason,
    rejected: &mut u64,
) -> anyhow::Result<()> {
    let ctx = order_ctx_for(config, signal, side, config.fees.taker_fee_bps);
    let result = rejected_result(&ctx, reason);
    *rejected += 1;
    warn!(symbol = %signal.symbol, ?reason, "order rejected by precheck before reaching the executor");
    let event = ExecLogEvent::from_result(signal.symbol.clone(), ctx.qty, ctx.price, None, &result, signal.ts_ms);
    outbox.record(&event, signal.ts_ms)?;
    Ok(())
}
