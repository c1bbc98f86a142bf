//! Deterministic synthetic feeds for development and demos.
//!
//! Produces a random walk on the TSE trading week (Saturday to Wednesday).
//! The flow feed starts a few sessions after the history feed so both
//! one-sided and joined dates appear. Data is clearly fake.

use super::provider::{DataError, FeedProvider, RawFlowRow, RawHistoryRow};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sessions of history before the flow feed begins.
const FLOW_LAG: usize = 3;

pub struct SyntheticProvider {
    start: NaiveDate,
    end: NaiveDate,
}

impl SyntheticProvider {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    fn sessions(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .filter(|d| !matches!(d.weekday(), Weekday::Thu | Weekday::Fri))
            .collect()
    }

    // Deterministic seed from symbol name, salted per feed
    fn rng(symbol: &str, feed: &str) -> StdRng {
        let seed = blake3::hash(format!("{feed}:{symbol}").as_bytes());
        StdRng::from_seed(*seed.as_bytes())
    }
}

impl FeedProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_history(&self, symbol: &str) -> Result<Option<Vec<RawHistoryRow>>, DataError> {
        let mut rng = Self::rng(symbol, "history");
        let mut price = 10_000.0_f64;

        let rows = self
            .sessions()
            .into_iter()
            .map(|date| {
                price = (price * (1.0 + rng.gen_range(-0.05..0.05_f64))).round();
                let volume = rng.gen_range(100_000..20_000_000u64) as f64;
                RawHistoryRow {
                    date: Some(date.format("%Y-%m-%d").to_string()),
                    volume: Some(volume),
                    value: Some(volume * price),
                    close: Some(price),
                }
            })
            .collect();
        Ok(Some(rows))
    }

    fn fetch_flow(&self, symbol: &str) -> Result<Option<Vec<RawFlowRow>>, DataError> {
        let mut rng = Self::rng(symbol, "flow");

        let rows = self
            .sessions()
            .into_iter()
            .skip(FLOW_LAG)
            .map(|date| {
                let ind_buy: u64 = rng.gen_range(1_000_000_000..50_000_000_000);
                let ind_sell: u64 = rng.gen_range(1_000_000_000..50_000_000_000);
                let corp_buy: u64 = rng.gen_range(0..20_000_000_000);
                let corp_sell: u64 = rng.gen_range(0..20_000_000_000);
                // Exports sometimes split a cell into a sum of parts
                let buy_value = if rng.gen_bool(0.2) {
                    let part = ind_buy / 3;
                    format!("{part}+{}", ind_buy - part)
                } else {
                    ind_buy.to_string()
                };

                RawFlowRow {
                    date: Some(date.format("%Y-%m-%d").to_string()),
                    individual_buy_count: Some(rng.gen_range(50..5_000u32).to_string()),
                    individual_buy_value: Some(buy_value),
                    individual_sell_count: Some(rng.gen_range(50..5_000u32).to_string()),
                    individual_sell_value: Some(ind_sell.to_string()),
                    corporate_buy_value: Some(corp_buy.to_string()),
                    corporate_sell_value: Some(corp_sell.to_string()),
                }
            })
            .collect();
        Ok(Some(rows))
    }
}
