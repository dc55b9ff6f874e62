use flowcore_ta::{
    indicators::{ExponentialMovingAverage, SimpleMovingAverage},
    patterns::{crossover, Cross},
    zscore::RollingZScore,
};
use rust_decimal_macros::dec;

#[test]
fn sma_and_ema() {
    let mut sma = SimpleMovingAverage::new(3);
    assert_eq!(sma.update(dec!(1)), dec!(1));
    assert_eq!(sma.update(dec!(2)), dec!(1.5));
    assert_eq!(sma.update(dec!(3)), dec!(2));
    assert_eq!(sma.update(dec!(4)), dec!(3));

    let mut ema = ExponentialMovingAverage::new(3);
    assert_eq!(ema.update(dec!(1)), dec!(1));
    let v = ema.update(dec!(2));
    assert!(v > dec!(1));
}

#[test]
fn test_crossover_pattern() {
    let res = crossover(dec!(1), dec!(2), dec!(3), dec!(2));
    assert_eq!(res, Some(Cross::Above));
}

#[test]
fn test_crossunder_pattern() {
    let res = crossover(dec!(3), dec!(2), dec!(1), dec!(2));
    assert_eq!(res, Some(Cross::Below));
}

#[test]
fn rolling_zscore_feeds_fusion_inputs() {
    let mut z = RollingZScore::new(10);
    for _ in 0..9 {
        z.update(1.0);
    }
    let score = z.update(1.0).unwrap();
    assert!((score - 0.0).abs() < 1e-9);
}
