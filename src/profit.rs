//! Stateless profit projection for an arbitrary stake. Used by the API for
//! what-if exploration; carries no dependency on scan state.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitProjection {
    pub profit: f64,
    pub roi_percent: f64,
}

/// Project profit and ROI for buying at `buy_price` and selling the
/// equivalent position at `sell_price` with the given stake. Prices may be
/// in any consistent unit (probabilities or cents). Non-positive buy price
/// or stake yields a zero projection.
pub fn compute_profit(buy_price: f64, sell_price: f64, stake: f64) -> ProfitProjection {
    if buy_price <= 0.0 || stake <= 0.0 {
        return ProfitProjection {
            profit: 0.0,
            roi_percent: 0.0,
        };
    }

    let profit = stake * (sell_price - buy_price) / buy_price;
    let roi_percent = profit / stake * 100.0;

    ProfitProjection {
        profit,
        roi_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_profit_and_roi() {
        let p = compute_profit(60.0, 65.0, 100.0);
        assert!((p.profit - 8.3333).abs() < 0.001, "profit={}", p.profit);
        assert!((p.roi_percent - 8.3333).abs() < 0.001, "roi={}", p.roi_percent);
    }

    #[test]
    fn negative_spread_projects_a_loss() {
        let p = compute_profit(0.65, 0.60, 100.0);
        assert!(p.profit < 0.0);
        assert!(p.roi_percent < 0.0);
    }

    #[test]
    fn zero_buy_price_or_stake_is_a_zero_projection() {
        assert_eq!(compute_profit(0.0, 0.65, 100.0).profit, 0.0);
        assert_eq!(compute_profit(0.60, 0.65, 0.0).roi_percent, 0.0);
    }

    #[test]
    fn works_on_probability_prices_too() {
        let p = compute_profit(0.60, 0.65, 100.0);
        assert!((p.roi_percent - 8.3333).abs() < 0.001);
    }
}
