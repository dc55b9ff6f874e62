use crate::canonical::{CanonicalRow, FeatureRow, RowPayload};
use crate::feature::Divergence;
use crate::dq::{DqGate, DqReport, DEAD_LETTER_FAIL_RATE};
use crate::exchange::{ExchangeStream, StreamError};
use crate::feature::{classify_scenario, fuse, CvdCalculator, FusionWeights, OfiCalculator, PropagationCap, ScenarioThresholds};
use fnv::FnvHashMap;
use rust_decimal::prelude::ToPrimitive;
use smol_str::SmolStr;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum HarvesterError {
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Tunables for feature compute and activity classification.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub ofi_window: usize,
    pub cvd_window: usize,
    pub cvd_propagation_cap: PropagationCap,
    pub divergence_window: usize,
    pub fusion_weights: FusionWeights,
    pub scenario_thresholds: ScenarioThresholds,
    pub activity_window_ms: i64,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            ofi_window: 100,
            cvd_window: 100,
            cvd_propagation_cap: PropagationCap::default(),
            divergence_window: 20,
            fusion_weights: FusionWeights::default(),
            scenario_thresholds: ScenarioThresholds::default(),
            activity_window_ms: 60_000,
        }
    }
}

struct SymbolState {
    ofi: OfiCalculator,
    cvd: CvdCalculator,
    divergence: crate::feature::DivergenceDetector,
    trade_times_ms: VecDeque<i64>,
    quote_times_ms: VecDeque<i64>,
    last_mid: Option<rust_decimal::Decimal>,
    last_best_bid: Option<rust_decimal::Decimal>,
    last_best_ask: Option<rust_decimal::Decimal>,
    last_trade_ts_ms: Option<i64>,
    last_z_ofi: Option<f64>,
    last_z_cvd: Option<f64>,
    last_divergence: Divergence,
}

impl SymbolState {
    fn new(config: &HarvesterConfig) -> Self {
        Self {
            ofi: OfiCalculator::new(config.ofi_window),
            cvd: CvdCalculator::new(config.cvd_window, config.cvd_propagation_cap),
            divergence: crate::feature::DivergenceDetector::new(config.divergence_window),
            trade_times_ms: VecDeque::new(),
            quote_times_ms: VecDeque::new(),
            last_mid: None,
            last_best_bid: None,
            last_best_ask: None,
            last_trade_ts_ms: None,
            last_z_ofi: None,
            last_z_cvd: None,
            last_divergence: Divergence::None,
        }
    }

    fn prune(times: &mut VecDeque<i64>, now_ms: i64, window_ms: i64) {
        while times.front().is_some_and(|&t| now_ms - t > window_ms) {
            times.pop_front();
        }
    }
}

/// Ingests exchange streams, normalizes into [`CanonicalRow`], computes
/// derived features, and gates every row through [`DqGate`] (§4.1).
pub struct Harvester<E> {
    stream: E,
    config: HarvesterConfig,
    symbols: Vec<SmolStr>,
    dq_gate: DqGate,
    dq_report: DqReport,
    state: FnvHashMap<SmolStr, SymbolState>,
    ready: bool,
}

impl<E> Harvester<E>
where
    E: ExchangeStream,
{
    pub fn new(stream: E, config: HarvesterConfig, schema_version: u16) -> Self {
        Self {
            stream,
            config,
            symbols: Vec::new(),
            dq_gate: DqGate::new(schema_version),
            dq_report: DqReport::default(),
            state: FnvHashMap::default(),
            ready: false,
        }
    }

    /// Open the exchange connection and subscribe. Fails fast if any
    /// symbol is rejected.
    pub async fn start(&mut self, symbols: &[SmolStr]) -> Result<(), HarvesterError> {
        self.stream.subscribe(symbols).await?;
        self.symbols = symbols.to_vec();
        for symbol in symbols {
            self.state.entry(symbol.clone()).or_insert_with(|| SymbolState::new(&self.config));
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Pull and process the next row from the underlying stream, returning
    /// the produced [`CanonicalRow`] (if it passed the DQ gate) and, for
    /// depth/trade rows once enough state has accumulated, a derived
    /// feature row.
    pub async fn poll(&mut self) -> Result<Option<(CanonicalRow, Option<FeatureRow>)>, HarvesterError> {
        let Some(row) = self.stream.next_row().await? else {
            return Ok(None);
        };

        if self.dq_gate.validate(&row, &mut self.dq_report).is_err() {
            if self.dq_report.fail_rate() > DEAD_LETTER_FAIL_RATE {
                warn!(fail_rate = self.dq_report.fail_rate(), "DQ fail rate exceeds dead-letter threshold");
            }
            return Ok(Some((row, None)));
        }

        self.ready = true;
        let feature = self.on_row(&row);
        Ok(Some((row, feature)))
    }

    /// Consume a validated row, updating per-symbol feature state and
    /// returning a feature row once enough inputs are buffered.
    fn on_row(&mut self, row: &CanonicalRow) -> Option<FeatureRow> {
        let state = self.state.entry(row.symbol.clone()).or_insert_with(|| SymbolState::new(&self.config));

        match &row.payload {
            RowPayload::Orderbook(depth) => {
                SymbolState::prune(&mut state.quote_times_ms, row.ts_ms, self.config.activity_window_ms);
                state.quote_times_ms.push_back(row.ts_ms);

                let (_, z_ofi) = state.ofi.update(depth);
                state.last_z_ofi = z_ofi.or(state.last_z_ofi);
                state.last_mid = depth.mid();
                state.last_best_bid = depth.best_bid();
                state.last_best_ask = depth.best_ask();

                self.build_feature_row(row.symbol.as_str(), row.ts_ms)
            }
            RowPayload::Trade(trade) => {
                SymbolState::prune(&mut state.trade_times_ms, row.ts_ms, self.config.activity_window_ms);
                state.trade_times_ms.push_back(row.ts_ms);
                state.last_trade_ts_ms = Some(row.ts_ms);

                let (_, z_cvd) = state.cvd.update(row.ts_ms, trade.price, trade.qty);
                state.last_z_cvd = z_cvd.or(state.last_z_cvd);
                self.build_feature_row(row.symbol.as_str(), row.ts_ms)
            }
            RowPayload::Price { .. } | RowPayload::Feature(_) => None,
        }
    }

    /// Emits a feature row once at least one depth snapshot and one trade
    /// have been observed for the symbol ("enough inputs buffered").
    fn build_feature_row(&mut self, symbol: &str, ts_ms: i64) -> Option<FeatureRow> {
        let state = self.state.get_mut(symbol)?;
        let (mid, best_bid, best_ask) = (state.last_mid?, state.last_best_bid?, state.last_best_ask?);
        state.last_trade_ts_ms?;

        let z_ofi = state.last_z_ofi.unwrap_or(0.0);
        let z_cvd = state.last_z_cvd.unwrap_or(0.0);

        let fusion = fuse(z_ofi, z_cvd, self.config.fusion_weights);
        state.last_divergence = state.divergence.update(mid.to_f64().unwrap_or(0.0), fusion.fusion_score);
        let spread_bps = best_bid
            .to_f64()
            .zip(best_ask.to_f64())
            .and_then(|(bid, ask)| {
                let mid_f = (bid + ask) / 2.0;
                if mid_f == 0.0 {
                    None
                } else {
                    Some((ask - bid) / mid_f * 10_000.0)
                }
            })
            .unwrap_or(0.0);

        let trades_per_min = state.trade_times_ms.len() as f64
            * (60_000.0 / self.config.activity_window_ms as f64);
        let quote_updates_per_sec = state.quote_times_ms.len() as f64
            * (1_000.0 / self.config.activity_window_ms as f64);

        let scenario = classify_scenario(trades_per_min, quote_updates_per_sec, spread_bps, self.config.scenario_thresholds);
        let lag_ms_to_trade = state.last_trade_ts_ms.map(|t| ts_ms - t).unwrap_or(0);

        debug!(symbol, fusion_score = fusion.fusion_score, consistency = fusion.consistency, "feature row computed");

        Some(FeatureRow {
            mid,
            best_bid,
            best_ask,
            spread_bps,
            z_ofi,
            z_cvd,
            fusion_score: fusion.fusion_score,
            consistency: fusion.consistency,
            scenario_2x2: scenario,
            lag_ms_to_trade,
            trades_per_min,
            quote_updates_per_sec,
        })
    }

    pub fn dq_report(&self) -> &DqReport {
        &self.dq_report
    }

    /// Most recent divergence classification for a symbol, if any feature
    /// rows have been produced for it yet.
    pub fn divergence(&self, symbol: &str) -> Option<Divergence> {
        self.state.get(symbol).map(|s| s.last_divergence)
    }

    /// Drain any buffered state. The concrete sinks own their own
    /// flush/close semantics (§4.6); this only resets in-memory state that
    /// would otherwise leak stale activity counters into the next run.
    pub fn flush(&mut self) {
        self.dq_report = std::mem::take(&mut self.dq_report);
    }

    pub async fn close(&mut self) -> Result<(), HarvesterError> {
        self.stream.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalRow, DepthLevel, DepthSnapshot, Side, TradeRow};
    use crate::exchange::MockExchangeStream;
    use flowcore_instrument::ExchangeId;
    use rust_decimal_macros::dec;

    fn depth_row(ts_ms: i64, row_id: u64, bid: &str, ask: &str) -> CanonicalRow {
        CanonicalRow::new(
            ts_ms,
            ts_ms,
            "BTCUSDT",
            row_id,
            RowPayload::Orderbook(DepthSnapshot {
                bids: vec![DepthLevel { price: bid.parse().unwrap(), qty: dec!(1) }],
                asks: vec![DepthLevel { price: ask.parse().unwrap(), qty: dec!(1) }],
            }),
        )
    }

    fn trade_row(ts_ms: i64, row_id: u64) -> CanonicalRow {
        CanonicalRow::new(
            ts_ms,
            ts_ms,
            "BTCUSDT",
            row_id,
            RowPayload::Trade(TradeRow { price: dec!(100), qty: dec!(1), side: Side::Buy, is_maker: false }),
        )
    }

    #[tokio::test]
    async fn start_fails_fast_on_rejected_symbol() {
        let stream = MockExchangeStream::new(ExchangeId::Mock, vec![]).reject_symbol("BTCUSDT");
        let mut harvester = Harvester::new(stream, HarvesterConfig::default(), 1);
        let result = harvester.start(&["BTCUSDT".into()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn poll_marks_ready_after_first_accepted_row() {
        let rows = vec![depth_row(1_000, 1, "99.9", "100.1")];
        let stream = MockExchangeStream::new(ExchangeId::Mock, rows);
        let mut harvester = Harvester::new(stream, HarvesterConfig::default(), 1);
        harvester.start(&["BTCUSDT".into()]).await.unwrap();
        assert!(!harvester.is_ready());
        harvester.poll().await.unwrap();
        assert!(harvester.is_ready());
    }

    #[tokio::test]
    async fn feature_row_emitted_once_depth_and_trade_seen() {
        let rows = vec![depth_row(1_000, 1, "99.9", "100.1"), trade_row(1_010, 2)];
        let stream = MockExchangeStream::new(ExchangeId::Mock, rows);
        let mut harvester = Harvester::new(stream, HarvesterConfig::default(), 1);
        harvester.start(&["BTCUSDT".into()]).await.unwrap();

        let (_, feature_after_depth) = harvester.poll().await.unwrap().unwrap();
        assert!(feature_after_depth.is_none());

        let (_, feature_after_trade) = harvester.poll().await.unwrap().unwrap();
        assert!(feature_after_trade.is_some());
    }

    #[tokio::test]
    async fn rejected_rows_do_not_produce_features() {
        let crossed = CanonicalRow::new(
            1_000,
            1_000,
            "BTCUSDT",
            1,
            RowPayload::Orderbook(DepthSnapshot {
                bids: vec![DepthLevel { price: dec!(101), qty: dec!(1) }],
                asks: vec![DepthLevel { price: dec!(100), qty: dec!(1) }],
            }),
        );
        let stream = MockExchangeStream::new(ExchangeId::Mock, vec![crossed]);
        let mut harvester = Harvester::new(stream, HarvesterConfig::default(), 1);
        harvester.start(&["BTCUSDT".into()]).await.unwrap();
        let (_, feature) = harvester.poll().await.unwrap().unwrap();
        assert!(feature.is_none());
        assert_eq!(harvester.dq_report().accepted_rows, 0);
    }
}
