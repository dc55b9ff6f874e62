use crate::alert::{RiskAlertHook, RiskViolation};
use crate::exposure::ExposureTracker;
use crate::position_tracker::PositionTracker;
use crate::schema::SchemaValidator;
use flowcore_execution::{OrderCtx, RejectReason};
use flowcore_instrument::exchange::ExchangeId;
use flowcore_instrument::symbol::Symbol;
use rust_decimal::Decimal;

/// Outcome of running [`RiskPrecheck::check`] on an `OrderCtx` (§4.3 "Risk
/// Precheck"): either the order is cleared to submit (with filter/price-cap
/// rounding already applied), rejected outright, or throttled — deferred
/// rather than rejected, so the caller may retry on a later tick once
/// `consistency`/rate conditions improve.
#[derive(Debug, Clone, PartialEq)]
pub enum PrecheckOutcome {
    Accept(OrderCtx),
    Reject(RejectReason),
    Throttle,
}

/// Tunables for the ordered precheck pipeline (§4.3, steps 1-6).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct PrecheckConfig {
    pub consistency_min: f64,
    pub throttle_threshold: f64,
    pub per_symbol_notional_limit: Decimal,
    pub aggregate_notional_limit: Decimal,
    pub single_order_notional_limit: Decimal,
}

impl Default for PrecheckConfig {
    fn default() -> Self {
        Self {
            consistency_min: 0.3,
            throttle_threshold: 0.5,
            per_symbol_notional_limit: Decimal::from(100_000),
            aggregate_notional_limit: Decimal::from(500_000),
            single_order_notional_limit: Decimal::from(20_000),
        }
    }
}

/// Round `value` to the nearest multiple of `step` (§4.3 step 5/6: exchange
/// filter and `price_cap` alignment). A zero `step` leaves `value`
/// unchanged, matching [`flowcore_execution::ExchangeAdapter::normalize_quantity`]'s
/// convention for an unconstrained filter.
fn round_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    (value / step).round() * step
}

/// Runs the ordered Risk Precheck pipeline (§4.3) against a schema-validated
/// `OrderCtx`, maintaining per-symbol position and exposure state across
/// calls so position-limit guards see the book as it stood after every
/// previously accepted order.
pub struct RiskPrecheck<H> {
    schema: SchemaValidator,
    config: PrecheckConfig,
    positions: PositionTracker<Symbol>,
    exposure: ExposureTracker<Symbol>,
    alert_hook: H,
    exchange: ExchangeId,
}

impl<H: RiskAlertHook<Symbol>> RiskPrecheck<H> {
    pub fn new(config: PrecheckConfig, alert_hook: H, exchange: ExchangeId) -> Self {
        Self {
            schema: SchemaValidator,
            config,
            positions: PositionTracker::new(),
            exposure: ExposureTracker::new(),
            alert_hook,
            exchange,
        }
    }

    /// Run the full pipeline. `notional_estimate_px` is the reference price
    /// used to convert `ctx.qty` into notional for the position/exposure
    /// guards (steps 4) — ordinarily the order's own limit price or the
    /// current mid for a market order.
    pub fn check(&mut self, ctx: OrderCtx, notional_estimate_px: Decimal) -> PrecheckOutcome {
        if let Err(reason) = self.schema.validate(&ctx) {
            return PrecheckOutcome::Reject(reason);
        }

        // Step 1: warmup / guard gates.
        if ctx.warmup {
            return PrecheckOutcome::Reject(RejectReason::Warmup);
        }
        if let Some(reason) = &ctx.guard_reason {
            return PrecheckOutcome::Reject(match reason.as_str() {
                "warmup" => RejectReason::Warmup,
                "spread_too_wide" => RejectReason::SpreadTooWide,
                "lag_exceeds_cap" => RejectReason::LagExceedsCap,
                "market_inactive" => RejectReason::MarketInactive,
                _ => RejectReason::SchemaInvalid,
            });
        }

        // Step 2: consistency gate / throttle.
        if ctx.consistency < self.config.consistency_min {
            return PrecheckOutcome::Reject(RejectReason::LowConsistency);
        }
        if ctx.consistency < self.config.throttle_threshold {
            return PrecheckOutcome::Throttle;
        }

        // Step 3: weak-signal throttle.
        if ctx.weak_signal_throttle {
            return PrecheckOutcome::Throttle;
        }

        // Step 4: position limits.
        let symbol = Symbol::new(ctx.symbol.clone());
        let order_notional = ctx.qty * notional_estimate_px;
        if order_notional > self.config.single_order_notional_limit {
            self.alert_hook.alert(RiskViolation::ExposureLimit {
                instrument: symbol.clone(),
                exposure: order_notional,
                limit: self.config.single_order_notional_limit,
            });
            return PrecheckOutcome::Reject(RejectReason::NotionalLimitExceeded);
        }
        let projected_symbol_exposure = self.exposure.exposure(&symbol) + order_notional;
        if projected_symbol_exposure > self.config.per_symbol_notional_limit {
            return PrecheckOutcome::Reject(RejectReason::NotionalLimitExceeded);
        }
        let aggregate_exposure: Decimal = self.positions.position(self.exchange, &symbol).abs() * notional_estimate_px + order_notional;
        if aggregate_exposure > self.config.aggregate_notional_limit {
            return PrecheckOutcome::Reject(RejectReason::NotionalLimitExceeded);
        }

        // Step 5: exchange filter alignment.
        let aligned_qty = round_to_step(ctx.qty, ctx.step_size);
        if aligned_qty.is_zero() || aligned_qty * notional_estimate_px < ctx.min_notional {
            return PrecheckOutcome::Reject(RejectReason::FilterMinNotional);
        }
        if !ctx.step_size.is_zero() && (aligned_qty - ctx.qty).abs() >= ctx.step_size {
            return PrecheckOutcome::Reject(RejectReason::FilterStepSize);
        }

        // Step 6: price_cap alignment for limit orders.
        let aligned_price = ctx.price.map(|px| round_to_step(px, ctx.tick_size));

        let mut accepted = ctx;
        accepted.qty = aligned_qty;
        accepted.price = aligned_price;

        self.exposure.update(symbol.clone(), order_notional);
        self.positions.update(self.exchange, symbol, match accepted.side {
            flowcore_execution::Side::Buy => accepted.qty,
            flowcore_execution::Side::Sell => -accepted.qty,
        });

        PrecheckOutcome::Accept(accepted)
    }
}
