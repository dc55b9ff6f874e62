use flowcore_execution::{OrderCtx, RejectReason};

/// Hard gate at ingress (§4.3 "Schema Validator"): reject a structurally
/// malformed `OrderCtx` before it ever reaches the ordered precheck
/// pipeline, so every downstream step can assume well-formed numeric
/// invariants (positive qty, finite consistency score, non-negative tick
/// and step sizes).
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn validate(&self, ctx: &OrderCtx) -> Result<(), RejectReason> {
        if ctx.qty.is_sign_negative() || ctx.qty.is_zero() {
            return Err(RejectReason::SchemaInvalid);
        }
        if ctx.tick_size.is_sign_negative() || ctx.step_size.is_sign_negative() || ctx.min_notional.is_sign_negative() {
            return Err(RejectReason::SchemaInvalid);
        }
        if !(0.0..=1.0).contains(&ctx.consistency) || !ctx.consistency.is_finite() {
            return Err(RejectReason::SchemaInvalid);
        }
        if ctx.symbol.is_empty() {
            return Err(RejectReason::SchemaInvalid);
        }
        if matches!(ctx.order_type, flowcore_execution::OrderType::Limit) && ctx.price.is_none() {
            return Err(RejectReason::SchemaInvalid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcore_data::canonical::Scenario2x2;
    use flowcore_execution::{ClientOrderId, OrderType, Side, TimeInForce};
    use flowcore_signal::record::Regime;
    use rust_decimal_macros::dec;

    fn base_ctx() -> OrderCtx {
        OrderCtx {
            client_order_id: ClientOrderId::derive(1, 1_000, Side::Buy, dec!(1), Some(dec!(100))),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(1),
            order_type: OrderType::Limit,
            price: Some(dec!(100)),
            time_in_force: TimeInForce::Gtc,
            signal_row_id: 1,
            regime: Regime::Active,
            scenario: Scenario2x2::ActiveHighVol,
            warmup: false,
            guard_reason: None,
            consistency: 0.9,
            weak_signal_throttle: false,
            tick_size: dec!(0.1),
            step_size: dec!(0.001),
            min_notional: dec!(10),
            costs_bps: 1.0,
            event_ts_ms: 1_000,
        }
    }

    #[test]
    fn well_formed_order_passes() {
        assert!(SchemaValidator.validate(&base_ctx()).is_ok());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut ctx = base_ctx();
        ctx.qty = dec!(0);
        assert_eq!(SchemaValidator.validate(&ctx), Err(RejectReason::SchemaInvalid));
    }

    #[test]
    fn limit_order_without_a_price_is_rejected() {
        let mut ctx = base_ctx();
        ctx.price = None;
        assert_eq!(SchemaValidator.validate(&ctx), Err(RejectReason::SchemaInvalid));
    }

    #[test]
    fn out_of_range_consistency_is_rejected() {
        let mut ctx = base_ctx();
        ctx.consistency = 1.5;
        assert_eq!(SchemaValidator.validate(&ctx), Err(RejectReason::SchemaInvalid));
    }
}
