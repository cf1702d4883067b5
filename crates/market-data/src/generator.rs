use crate::types::{round_to, DataPoint, PointSource};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED_PRICE: f64 = 2350.0;
pub const DEFAULT_SEED_OPEN_INTEREST: u64 = 450_000;
pub const DEFAULT_BOOTSTRAP_SPACING_MS: i64 = 15 * 60 * 1000;

/// Random-walk parameters for the simulator
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    /// Starting spot price for `bootstrap`
    pub seed_price: f64,
    /// Starting open interest for `bootstrap`
    pub seed_open_interest: u64,
    /// Largest absolute spot move per step
    pub max_step: f64,
    /// Futures premium range over spot (contango), both ends positive
    pub premium_min: f64,
    pub premium_max: f64,
    /// Moves larger than this bias the open interest change
    pub strong_move: f64,
    /// Largest absolute open interest change per step
    pub oi_step: u64,
    pub volume_max: u64,
    /// Spacing between bootstrapped points
    pub bootstrap_spacing_ms: i64,
    pub price_decimals: u32,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            seed_price: DEFAULT_SEED_PRICE,
            seed_open_interest: DEFAULT_SEED_OPEN_INTEREST,
            max_step: 2.5,
            premium_min: 0.5,
            premium_max: 3.0,
            strong_move: 1.0,
            oi_step: 1_200,
            volume_max: 5_000,
            bootstrap_spacing_ms: DEFAULT_BOOTSTRAP_SPACING_MS,
            price_decimals: 2,
        }
    }
}

/// Produces simulated data points from the previous state.
#[derive(Debug, Clone)]
pub struct SeriesGenerator {
    params: GeneratorParams,
    rng: StdRng,
}

impl SeriesGenerator {
    pub fn new(params: GeneratorParams) -> Self {
        Self {
            params,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a generator with a fixed seed (for reproducible runs and tests).
    pub fn with_seed(params: GeneratorParams, seed: u64) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    /// Next point, stamped now (or just after `previous` if the clock lags).
    pub fn next(&mut self, previous: &DataPoint) -> DataPoint {
        let now = Utc::now().timestamp_millis();
        self.next_at(previous, now.max(previous.timestamp + 1))
    }

    pub fn next_at(&mut self, previous: &DataPoint, timestamp: i64) -> DataPoint {
        let step = self.params.max_step.abs();
        let delta = self.rng.random_range(-step..=step);

        let decimals = self.params.price_decimals;
        let primary_price = round_to(previous.primary_price + delta, decimals);
        let derived_price = round_to(primary_price + self.premium(), decimals);

        let oi_change = self.oi_change(delta);
        let open_interest = saturating_i64(previous.open_interest)
            .saturating_add(oi_change)
            .max(0) as u64;

        let volume = self.rng.random_range(0..=self.params.volume_max);

        DataPoint {
            timestamp,
            label: DataPoint::label_for(timestamp),
            primary_price,
            derived_price,
            open_interest,
            volume,
            source: PointSource::Simulated,
        }
    }

    /// `count` points walking from the seed state, spaced
    /// `bootstrap_spacing_ms` apart and ending now.
    pub fn bootstrap(&mut self, count: usize) -> Vec<DataPoint> {
        let now = Utc::now().timestamp_millis();
        self.bootstrap_until(count, now)
    }

    pub fn bootstrap_until(&mut self, count: usize, end_timestamp: i64) -> Vec<DataPoint> {
        let spacing = self.params.bootstrap_spacing_ms.max(1);
        let start = end_timestamp - spacing * count.saturating_sub(1) as i64;

        let mut previous = DataPoint {
            timestamp: start - spacing,
            label: String::new(),
            primary_price: self.params.seed_price,
            derived_price: self.params.seed_price,
            open_interest: self.params.seed_open_interest,
            volume: 0,
            source: PointSource::Simulated,
        };

        let mut points = Vec::with_capacity(count);
        for i in 0..count {
            let point = self.next_at(&previous, start + spacing * i as i64);
            previous = point.clone();
            points.push(point);
        }
        points
    }

    fn premium(&mut self) -> f64 {
        let low = self.params.premium_min.min(self.params.premium_max);
        let high = self.params.premium_max.max(low);
        self.rng.random_range(low..=high)
    }

    /// Open interest change correlated with the sign of a large move.
    pub(crate) fn oi_change(&mut self, delta: f64) -> i64 {
        let step = saturating_i64(self.params.oi_step);
        if delta > self.params.strong_move {
            self.rng.random_range(-step / 4..=step)
        } else if delta < -self.params.strong_move {
            self.rng.random_range(-step..=step / 4)
        } else {
            self.rng.random_range(-step / 2..=step / 2)
        }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Default for SeriesGenerator {
    fn default() -> Self {
        Self::new(GeneratorParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_five_points() {
        let mut generator = SeriesGenerator::with_seed(GeneratorParams::default(), 7);
        let series = generator.bootstrap(5);

        assert_eq!(series.len(), 5);
        assert!(series.windows(2).all(|w| w[1].timestamp > w[0].timestamp));

        let last = series.last().unwrap();
        assert!(last.primary_price >= 2350.0 - 25.0);
        assert!(last.primary_price <= 2350.0 + 25.0);
    }

    #[test]
    fn test_bootstrap_ends_at_given_time_with_fixed_spacing() {
        let mut generator = SeriesGenerator::with_seed(GeneratorParams::default(), 1);
        let end = 1_700_000_000_000;
        let series = generator.bootstrap_until(4, end);

        assert_eq!(series.last().unwrap().timestamp, end);
        for w in series.windows(2) {
            assert_eq!(w[1].timestamp - w[0].timestamp, DEFAULT_BOOTSTRAP_SPACING_MS);
        }
    }

    #[test]
    fn test_steps_are_bounded_and_premium_positive() {
        let params = GeneratorParams::default();
        let mut generator = SeriesGenerator::with_seed(params.clone(), 42);
        let series = generator.bootstrap(200);

        for w in series.windows(2) {
            let delta = (w[1].primary_price - w[0].primary_price).abs();
            assert!(delta <= params.max_step + 0.01, "step {delta} too large");
        }
        for p in &series {
            assert!(p.basis() >= params.premium_min - 0.01);
            assert!(p.basis() <= params.premium_max + 0.01);
            assert!(p.volume <= params.volume_max);
        }
    }

    #[test]
    fn test_oi_change_follows_large_moves() {
        let mut generator = SeriesGenerator::with_seed(GeneratorParams::default(), 3);
        let samples = 2_000;

        let up: i64 = (0..samples).map(|_| generator.oi_change(2.4)).sum();
        let down: i64 = (0..samples).map(|_| generator.oi_change(-2.4)).sum();
        let flat: i64 = (0..samples).map(|_| generator.oi_change(0.2)).sum();

        assert!(up > 0);
        assert!(down < 0);
        assert!(flat.abs() < up.abs());
    }

    #[test]
    fn test_next_stays_after_previous() {
        let mut generator = SeriesGenerator::with_seed(GeneratorParams::default(), 9);
        let future = DataPoint {
            timestamp: i64::MAX / 2,
            label: String::new(),
            primary_price: 100.0,
            derived_price: 101.0,
            open_interest: 10,
            volume: 0,
            source: PointSource::External,
        };

        let next = generator.next(&future);
        assert!(next.timestamp > future.timestamp);
        assert_eq!(next.source, PointSource::Simulated);
    }

    #[test]
    fn test_huge_oi_step_does_not_wrap() {
        let params = GeneratorParams {
            oi_step: u64::MAX,
            seed_open_interest: u64::MAX,
            ..GeneratorParams::default()
        };
        let mut generator = SeriesGenerator::with_seed(params, 13);

        for delta in [2.4, -2.4, 0.0] {
            let _ = generator.oi_change(delta);
        }
        assert_eq!(generator.bootstrap(20).len(), 20);
    }

    #[test]
    fn test_open_interest_never_negative() {
        let params = GeneratorParams {
            seed_open_interest: 0,
            ..GeneratorParams::default()
        };
        let mut generator = SeriesGenerator::with_seed(params, 11);
        // u64 cannot go negative; this checks the saturating path doesn't wrap
        for p in generator.bootstrap(100) {
            assert!(p.open_interest < u64::MAX / 2);
        }
    }
}
