use crate::error::BacktestError;
use crate::manifest::RunManifest;
use crate::market_data::BacktestMarketData;
use crate::metrics::{compute_metrics, BacktestMetrics};
use crate::sink::{write_daily_pnl, TradeSink};
use crate::trade::{ClosedTrade, ExitPolicy, ExitReason, OpenTrade};
use flowcore_execution::backtest::{BacktestExecutor, FeeModel, MidPriceSource};
use flowcore_execution::executor::Executor;
use flowcore_execution::order::{ClientOrderId, OrderCtx, OrderType, Side as ExecSide, TimeInForce};
use flowcore_instrument::exchange::ExchangeId;
use flowcore_instrument::time::SimClock;
use flowcore_risk::alert::VecAlertHook;
use flowcore_risk::precheck::{PrecheckConfig, PrecheckOutcome, RiskPrecheck};
use flowcore_signal::config::AlgoConfig;
use flowcore_signal::engine::Decider;
use flowcore_signal::record::DecisionCode;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Per-symbol exchange filters applied by the Risk Precheck pipeline's
/// step 5/6 (§4.3). A backtest run has no live exchange to query these
/// from, so they are supplied up front per symbol, falling back to
/// [`SymbolFilters::default`] for any symbol not listed.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SymbolFilters {
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_notional: Decimal,
}

impl Default for SymbolFilters {
    fn default() -> Self {
        Self { tick_size: Decimal::new(1, 1), step_size: Decimal::new(1, 3), min_notional: Decimal::from(10) }
    }
}

/// Everything a [`BacktestRunner`] needs besides the market data itself.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub algo: AlgoConfig,
    pub precheck: PrecheckConfig,
    pub fees: FeeModel,
    pub exit_policy: ExitPolicy,
    pub filters: HashMap<SmolStr, SymbolFilters>,
    pub seed: u64,
    pub run_id: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            algo: AlgoConfig::default(),
            precheck: PrecheckConfig::default(),
            fees: FeeModel::default(),
            exit_policy: ExitPolicy::default(),
            filters: HashMap::new(),
            seed: 42,
            run_id: "backtest".to_string(),
        }
    }
}

impl BacktestConfig {
    fn filters_for(&self, symbol: &str) -> SymbolFilters {
        self.filters.get(symbol).copied().unwrap_or_default()
    }
}

/// Shared mid-price table the replay loop updates as it advances through
/// rows and [`BacktestExecutor`] reads from to fill orders (§4.4). Cloning
/// shares the same underlying map, mirroring the way a live executor shares
/// one order-book view with the strategy that drives it.
#[derive(Clone, Default)]
struct SharedMidPrices(Arc<Mutex<HashMap<SmolStr, Decimal>>>);

impl SharedMidPrices {
    fn set(&self, symbol: SmolStr, mid: Decimal) {
        self.0.lock().insert(symbol, mid);
    }
}

impl MidPriceSource for SharedMidPrices {
    fn mid(&self, symbol: &str) -> Option<Decimal> {
        self.0.lock().get(symbol).copied()
    }
}

/// Maps a baseline-guard [`DecisionCode`] to the exact snake_case string
/// [`flowcore_risk::precheck::RiskPrecheck`] matches `OrderCtx.guard_reason`
/// against, via `serde`'s own rename rather than `Display` — `DecisionCode`'s
/// `Display`/`#[error(...)]` text ("spread too wide") deliberately differs
/// from its serde wire form ("spread_too_wide"), and only the wire form is
/// what the precheck's string match expects.
fn guard_reason_of(code: DecisionCode) -> SmolStr {
    let value = serde_json::to_value(code).unwrap_or_default();
    SmolStr::new(value.as_str().unwrap_or("unknown"))
}

/// Output of a completed [`BacktestRunner::run`].
#[derive(Debug, Clone)]
pub struct BacktestRunOutput {
    pub metrics: BacktestMetrics,
    pub manifest: RunManifest,
    pub trades: Vec<ClosedTrade>,
}

/// Drives historical [`crate::loader::TimestampedRow`]s through the same
/// Decider → Risk Precheck → Executor stack the live pipeline uses, one row
/// at a time, tracking open/closed trades and writing `trades.jsonl`,
/// `pnl_daily.jsonl`, `metrics.json` and the run manifest (§4.4, §8 P1).
pub struct BacktestRunner<M> {
    market_data: M,
    config: BacktestConfig,
    root: PathBuf,
}

impl<M: BacktestMarketData> BacktestRunner<M> {
    pub fn new(market_data: M, config: BacktestConfig, root: impl Into<PathBuf>) -> Self {
        Self { market_data, config, root: root.into() }
    }

    pub async fn run(&mut self) -> Result<BacktestRunOutput, BacktestError> {
        let rows = self.market_data.rows();
        if rows.is_empty() {
            return Err(BacktestError::EmptyMarketData);
        }
        let started_ms = rows.first().expect("checked non-empty above").ts_ms;
        let ended_ms = rows.last().expect("checked non-empty above").ts_ms;

        let mid_prices = SharedMidPrices::default();
        let clock = SimClock::new(started_ms);
        let mut executor = BacktestExecutor::new(mid_prices.clone(), clock, self.config.fees, self.config.seed);
        let mut precheck = RiskPrecheck::new(self.config.precheck, VecAlertHook::default(), ExchangeId::Backtest);
        let mut decider = Decider::new();

        let mut open_trades: HashMap<SmolStr, OpenTrade> = HashMap::new();
        let mut closed_trades: Vec<ClosedTrade> = Vec::new();

        let trade_sink_path = self.root.join("artifacts").join("trades.db");
        let mut trade_sink = TradeSink::open(&self.root, &trade_sink_path)?;

        for (idx, row) in rows.iter().enumerate() {
            mid_prices.set(row.symbol.clone(), row.row.mid);

            let signal = decider.decide(&row.symbol, row.ts_ms, idx as u64, &row.row, &self.config.algo);

            let signal_side = match signal.side {
                flowcore_signal::record::Side::Buy => Some(ExecSide::Buy),
                flowcore_signal::record::Side::Sell => Some(ExecSide::Sell),
                flowcore_signal::record::Side::None => None,
            };

            if let Some(open) = open_trades.get(&row.symbol) {
                let reverse_signal = signal.confirm && signal_side.is_some_and(|s| s != open.side);
                if let Some(exit_reason) = open.exit_reason(row.row.mid, row.ts_ms, &self.config.exit_policy, reverse_signal) {
                    if let Some(closed) = self.close_trade(&mut executor, &mut precheck, idx as u64, row.ts_ms, open_trades.remove(&row.symbol).expect("presence checked above"), exit_reason).await? {
                        trade_sink.record(&closed, row.ts_ms)?;
                        closed_trades.push(closed);
                    }
                }
            }

            if !open_trades.contains_key(&row.symbol) {
                if let Some(side) = signal_side {
                    if signal.confirm {
                        let ctx = self.order_ctx_for(idx as u64, row.ts_ms, &row.symbol, side, &signal);
                        match precheck.check(ctx, row.row.mid) {
                            PrecheckOutcome::Accept(accepted) => {
                                let qty = accepted.qty;
                                if let Ok(result) = executor.submit(accepted).await {
                                    if let (Some(px_fill), Some(fee)) = (result.px_fill, result.fee) {
                                        open_trades.insert(
                                            row.symbol.clone(),
                                            OpenTrade { symbol: row.symbol.clone(), side, qty, entry_px: px_fill, entry_ts_ms: row.ts_ms, entry_fee: fee },
                                        );
                                    }
                                }
                            }
                            PrecheckOutcome::Reject(reason) => debug!(symbol = %row.symbol, ?reason, "order rejected by precheck"),
                            PrecheckOutcome::Throttle => debug!(symbol = %row.symbol, "order throttled by precheck"),
                        }
                    }
                }
            }
        }

        // Close out anything still open at the end of the window as time-neutral.
        let symbols: Vec<SmolStr> = open_trades.keys().cloned().collect();
        for symbol in symbols {
            let open = open_trades.remove(&symbol).expect("drained from the same map just iterated");
            if let Some(closed) = self.close_trade(&mut executor, &mut precheck, rows.len() as u64, ended_ms, open, ExitReason::TimeNeutral).await? {
                trade_sink.record(&closed, ended_ms)?;
                closed_trades.push(closed);
            }
        }

        trade_sink.flush(ended_ms)?;
        trade_sink.close()?;
        write_daily_pnl(&self.root, &closed_trades, ended_ms)?;

        let turnover: Decimal = closed_trades.iter().map(|t| (t.entry_px * t.qty).abs() + (t.exit_px * t.qty).abs()).sum();
        let metrics = compute_metrics(&closed_trades, (ended_ms - started_ms).max(1), turnover);
        self.write_metrics(&metrics)?;

        let manifest = RunManifest {
            run_id: self.config.run_id.clone(),
            seed: self.config.seed,
            config_hash: self.config.algo.config_hash(),
            rules_ver: AlgoConfig::rules_ver(),
            features_ver: AlgoConfig::features_ver(),
            started_ms,
            ended_ms,
            row_count: rows.len(),
            trade_count: closed_trades.len(),
        };
        manifest.write(&self.root)?;

        Ok(BacktestRunOutput { metrics, manifest, trades: closed_trades })
    }

    fn order_ctx_for(&self, signal_row_id: u64, ts_ms: i64, symbol: &SmolStr, side: ExecSide, signal: &flowcore_signal::record::SignalRecord) -> OrderCtx {
        let filters = self.config.filters_for(symbol.as_str());
        let guard_reason = signal.guard_reason.map(guard_reason_of);
        OrderCtx {
            client_order_id: ClientOrderId::derive(signal_row_id, ts_ms, side, Decimal::ONE, None),
            symbol: symbol.clone(),
            side,
            qty: Decimal::ONE,
            order_type: OrderType::Market,
            price: None,
            time_in_force: TimeInForce::Ioc,
            signal_row_id,
            regime: signal.regime,
            scenario: signal.scenario,
            warmup: signal.warmup,
            guard_reason,
            consistency: signal.consistency,
            weak_signal_throttle: signal.weak_signal_throttle,
            tick_size: filters.tick_size,
            step_size: filters.step_size,
            min_notional: filters.min_notional,
            costs_bps: self.config.fees.taker_fee_bps,
            event_ts_ms: ts_ms,
        }
    }

    async fn close_trade<E: Executor>(
        &self,
        executor: &mut E,
        precheck: &mut RiskPrecheck<VecAlertHook>,
        signal_row_id: u64,
        ts_ms: i64,
        open: OpenTrade,
        exit_reason: ExitReason,
    ) -> Result<Option<ClosedTrade>, BacktestError> {
        let closing_side = match open.side {
            ExecSide::Buy => ExecSide::Sell,
            ExecSide::Sell => ExecSide::Buy,
        };
        let filters = self.config.filters_for(open.symbol.as_str());
        let ctx = OrderCtx {
            client_order_id: ClientOrderId::derive(signal_row_id, ts_ms, closing_side, open.qty, None),
            symbol: open.symbol.clone(),
            side: closing_side,
            qty: open.qty,
            order_type: OrderType::Market,
            price: None,
            time_in_force: TimeInForce::Ioc,
            signal_row_id,
            regime: flowcore_signal::record::Regime::Active,
            scenario: flowcore_data::canonical::Scenario2x2::ActiveHighVol,
            warmup: false,
            guard_reason: None,
            consistency: 1.0,
            weak_signal_throttle: false,
            tick_size: filters.tick_size,
            step_size: filters.step_size,
            min_notional: filters.min_notional,
            costs_bps: self.config.fees.taker_fee_bps,
            event_ts_ms: ts_ms,
        };

        let outcome = precheck.check(ctx, open.entry_px);
        let accepted = match outcome {
            PrecheckOutcome::Accept(ctx) => ctx,
            _ => return Ok(None),
        };
        let Ok(result) = executor.submit(accepted).await else {
            return Ok(None);
        };
        let (Some(px_fill), Some(fee)) = (result.px_fill, result.fee) else {
            return Ok(None);
        };
        Ok(Some(ClosedTrade::close(open, px_fill, ts_ms, fee, exit_reason)))
    }

    fn write_metrics(&self, metrics: &BacktestMetrics) -> Result<(), BacktestError> {
        std::fs::create_dir_all(&self.root)?;
        let contents = serde_json::to_vec_pretty(metrics).map_err(|e| BacktestError::Loader(e.to_string()))?;
        std::fs::write(self.root.join("metrics.json"), contents)?;
        Ok(())
    }
}
