//! Registration table: config entries to strategy instances.

use lab_core::config::StrategyConfig;

use crate::random::RandomTrader;
use crate::trend::TrendFollower;
use crate::Strategy;

/// Build one strategy from its config entry.
pub fn build(config: &StrategyConfig) -> Box<dyn Strategy> {
    match config {
        StrategyConfig::TrendFollower {
            name,
            symbol,
            size,
            window,
            min_cash,
        } => Box::new(TrendFollower::new(name, symbol, *size, *window, *min_cash)),
        StrategyConfig::RandomTrader {
            name,
            symbol,
            size,
            trade_probability,
            seed,
            min_cash,
        } => Box::new(RandomTrader::new(
            name,
            symbol,
            *size,
            *trade_probability,
            *seed,
            *min_cash,
        )),
    }
}

/// Build every configured strategy, in config order.
pub fn build_all(configs: &[StrategyConfig]) -> Vec<Box<dyn Strategy>> {
    configs.iter().map(build).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let strategies = build_all(&StrategyConfig::defaults());
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();

        assert_eq!(names, vec!["Trend Follower", "Random Trader"]);
        assert_eq!(strategies[0].symbols(), &["BTCUSDT".to_string()]);
    }

    #[test]
    fn test_build_from_json() {
        let config: StrategyConfig = serde_json::from_str(
            r#"{"kind": "trend_follower", "name": "eth", "symbol": "ETHUSDT", "size": 0.1, "window": 5}"#,
        )
        .unwrap();
        let strategy = build(&config);

        assert_eq!(strategy.name(), "eth");
        assert_eq!(strategy.symbols(), &["ETHUSDT".to_string()]);
    }
}
