//! Small statistics helpers over price series

use ta::Next;
use ta::indicators::StandardDeviation;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple returns between consecutive closes
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
///
/// `ta`'s deviation is the population one over its window, so a window
/// spanning the whole series is rescaled by `sqrt(n / (n - 1))`.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let Ok(mut deviation) = StandardDeviation::new(n) else {
        return 0.0;
    };
    let population = values.iter().fold(0.0, |_, &value| deviation.next(value));
    population * (n as f64 / (n - 1) as f64).sqrt()
}

/// Annualized volatility of daily returns
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_returns() {
        let returns = pct_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_sample_std() {
        assert!(sample_std(&[1.0]).abs() < f64::EPSILON);
        // Sample variance of 2,4,4,4,5,5,7,9 is 32/7
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-9);
    }
}
