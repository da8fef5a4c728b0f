use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    AnalysisReport, AnalysisSummary, DeviationTable, Deviations, Distribution, Metric,
    Percentiles, Record, ReferenceBundle, RevenuePerformance, RevenueProjection, Scope,
    ScopeReference, ZScores,
};
use crate::scoring;

/// How a value is ranked against a distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileMethod {
    /// First-index rank, reproducing existing reports exactly.
    #[default]
    Approximate,
    /// Linear-interpolation percentile rank with mid-rank ties.
    Interpolated,
}

impl PercentileMethod {
    pub fn rank(self, value: f64, distribution: &Distribution) -> u8 {
        match self {
            PercentileMethod::Approximate => percentile(value, distribution),
            PercentileMethod::Interpolated => percentile_interpolated(value, distribution),
        }
    }
}

/// Rank of `value` as `round(index / len * 100)`, where `index` is the
/// first element `>= value`.
///
/// Values above the maximum rank 100; an empty distribution ranks 50.
pub fn percentile(value: f64, distribution: &Distribution) -> u8 {
    let values = distribution.as_slice();
    if values.is_empty() {
        return 50;
    }
    let value = if value.is_nan() { 0.0 } else { value };

    let index = values.partition_point(|x| *x < value);
    if index == values.len() {
        return 100;
    }
    ((index as f64 / values.len() as f64) * 100.0).round() as u8
}

/// Percentile rank by linear interpolation between neighbouring samples.
///
/// Inverse of the R-7 quantile: the minimum ranks 0, the maximum 100, and a
/// run of tied samples ranks at its midpoint.
pub fn percentile_interpolated(value: f64, distribution: &Distribution) -> u8 {
    let values = distribution.as_slice();
    let n = values.len();
    if n == 0 {
        return 50;
    }
    let value = if value.is_nan() { 0.0 } else { value };

    let lo = values.partition_point(|x| *x < value);
    let hi = values.partition_point(|x| *x <= value);
    if lo == n {
        return 100;
    }
    if hi == 0 {
        return 0;
    }
    if n == 1 {
        return 50;
    }

    let rank = if hi > lo {
        (lo + hi - 1) as f64 / 2.0
    } else {
        let below = values[lo - 1];
        let above = values[lo];
        (lo - 1) as f64 + (value - below) / (above - below)
    };
    ((rank / (n - 1) as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// `(value - mean) / std` to two decimals, 0 when `std` is 0.
pub fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    round_to((value - mean) / std, 2)
}

/// Percent difference from `baseline` to one decimal, 0 when `baseline` is 0.
pub fn deviation(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    round_to((value - baseline) / baseline * 100.0, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        0.0
    }
}

pub fn percentiles(target: &Record, city: &ScopeReference, method: PercentileMethod) -> Percentiles {
    let rank = |metric: Metric| method.rank(metric.value(target), &city.metric(metric).distribution);

    Percentiles {
        price: rank(Metric::Price),
        occupancy: rank(Metric::Occupancy),
        revenue: rank(Metric::Revenue),
        rating: rank(Metric::Rating),
    }
}

pub fn z_scores(target: &Record, city: &ScopeReference) -> ZScores {
    let z = |metric: Metric| {
        let stats = city.metric(metric).stats;
        z_score(metric.value(target), stats.mean, stats.std)
    };

    ZScores {
        price: z(Metric::Price),
        occupancy: z(Metric::Occupancy),
        revenue: z(Metric::Revenue),
    }
}

pub fn deviation_table(target: &Record, bundle: &ReferenceBundle) -> DeviationTable {
    let row = |scope: Scope| {
        let reference = bundle.scope(scope);
        let diff = |metric: Metric| deviation(metric.value(target), reference.metric(metric).stats.mean);
        Deviations {
            price: diff(Metric::Price),
            occupancy: diff(Metric::Occupancy),
            revenue: diff(Metric::Revenue),
        }
    };

    DeviationTable {
        neighbourhood: row(Scope::Neighbourhood),
        city: row(Scope::City),
        global: row(Scope::Global),
    }
}

/// Compares actual revenue with the p50..p75 band of `revenue`.
pub fn expected_revenue(target: &Record, revenue: &Distribution) -> RevenueProjection {
    let actual = Metric::Revenue.value(target);
    let p50 = revenue.at_fraction(0.5);
    let p75 = revenue.at_fraction(0.75);

    RevenueProjection {
        actual,
        expected_range: (p50, p75),
        performance: if actual > p50 {
            RevenuePerformance::AboveAverage
        } else {
            RevenuePerformance::BelowAverage
        },
    }
}

/// Positions `target` against `bundle` with the approximate percentile.
pub fn analyze(target: &Record, bundle: &ReferenceBundle) -> AnalysisReport {
    analyze_with(target, bundle, PercentileMethod::Approximate)
}

pub fn analyze_with(
    target: &Record,
    bundle: &ReferenceBundle,
    method: PercentileMethod,
) -> AnalysisReport {
    let percentiles = percentiles(target, &bundle.city, method);
    let z_scores = z_scores(target, &bundle.city);
    let deviation_table = deviation_table(target, bundle);
    let pricing_alignment = scoring::classify_alignment(percentiles.price, percentiles.occupancy);
    let competitiveness = scoring::competitiveness(&percentiles);
    let market_fit = scoring::market_fit(competitiveness.score, pricing_alignment);
    let anomalies = scoring::detect_anomalies(&percentiles, Metric::Rating.value(target));
    let expected_vs_actual_revenue = expected_revenue(target, &bundle.city.revenue.distribution);

    debug!(
        listing = %target.id,
        score = competitiveness.score,
        alignment = pricing_alignment.as_str(),
        anomalies = anomalies.len(),
        "analyzed listing"
    );

    AnalysisReport {
        percentiles,
        z_scores,
        deviation_table,
        pricing_alignment,
        competitiveness_score: competitiveness,
        market_fit,
        anomalies: anomalies.clone(),
        expected_vs_actual_revenue,
        summary: AnalysisSummary {
            percentiles,
            alignment: pricing_alignment,
            score: competitiveness.score,
            label: competitiveness.label,
            anomalies,
            market_fit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution;
    use crate::models::{Anomaly, MarketFit, PricingAlignment};

    fn dist(values: &[f64]) -> Distribution {
        Distribution::from_values(values.to_vec())
    }

    #[test]
    fn percentile_uses_first_index_at_or_above() {
        let values = dist(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(percentile(5.0, &values), 0);
        assert_eq!(percentile(10.0, &values), 0);
        assert_eq!(percentile(20.0, &values), 25);
        assert_eq!(percentile(25.0, &values), 75);
        assert_eq!(percentile(30.0, &values), 75);
        assert_eq!(percentile(31.0, &values), 100);
    }

    #[test]
    fn percentile_defaults_to_median_without_data() {
        for value in [-3.0, 0.0, 120.0] {
            assert_eq!(percentile(value, &Distribution::default()), 50);
            assert_eq!(percentile_interpolated(value, &Distribution::default()), 50);
        }
    }

    #[test]
    fn percentile_is_monotonic() {
        let values = dist(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
        for method in [PercentileMethod::Approximate, PercentileMethod::Interpolated] {
            let mut previous = 0;
            for step in 0..=110 {
                let rank = method.rank(step as f64 * 0.1, &values);
                assert!(rank >= previous, "{method:?} dropped at {step}");
                previous = rank;
            }
        }
    }

    #[test]
    fn interpolated_percentile_spans_min_to_max() {
        let values = dist(&[10.0, 20.0, 30.0]);
        assert_eq!(percentile_interpolated(10.0, &values), 0);
        assert_eq!(percentile_interpolated(15.0, &values), 25);
        assert_eq!(percentile_interpolated(20.0, &values), 50);
        assert_eq!(percentile_interpolated(30.0, &values), 100);
        assert_eq!(percentile_interpolated(9.0, &values), 0);
        assert_eq!(percentile_interpolated(31.0, &values), 100);
        assert_eq!(percentile_interpolated(7.0, &dist(&[7.0])), 50);
    }

    #[test]
    fn z_score_and_deviation_guard_zero() {
        assert_eq!(z_score(12.0, 10.0, 0.0), 0.0);
        assert_eq!(z_score(12.0, 10.0, 3.0), 0.67);
        assert_eq!(z_score(4.0, 10.0, 4.0), -1.5);
        assert_eq!(deviation(150.0, 0.0), 0.0);
        assert_eq!(deviation(150.0, 120.0), 25.0);
        assert_eq!(deviation(100.0, 300.0), -66.7);
    }

    #[test]
    fn expected_revenue_uses_lower_index_band() {
        let target = Record::new("t", "Bonfim", 50.0, 100, 4.5);
        let revenue = dist(&[1000.0, 2000.0, 3000.0, 4000.0, 5000.0]);
        let projection = expected_revenue(&target, &revenue);

        assert_eq!(projection.expected_range, (3000.0, 4000.0));
        assert_eq!(projection.performance, RevenuePerformance::AboveAverage);

        let empty = expected_revenue(&target, &Distribution::default());
        assert_eq!(empty.expected_range, (0.0, 0.0));
    }

    #[test]
    fn premium_listing_flags_premium_price() {
        let mut records: Vec<Record> = (0..91)
            .map(|i| Record::new(format!("p{i}"), "Ribeira", 60.0 + i as f64 * 0.5, 150, 4.6))
            .collect();
        records.extend((0..9).map(|i| Record::new(format!("q{i}"), "Ribeira", 150.0 + i as f64, 150, 4.6)));
        let target = Record::new("t", "Ribeira", 120.0, 200, 4.8);

        let report = analyze(&target, &distribution::build(&target, &records));

        assert_eq!(report.percentiles.price, 91);
        assert!(report.anomalies.contains(&Anomaly::PremiumPrice));
        assert!(!report.anomalies.contains(&Anomaly::LowRating));
    }

    #[test]
    fn empty_reference_gives_neutral_report() {
        let target = Record::new("t", "Ribeira", 120.0, 200, 4.8);
        let report = analyze(&target, &distribution::build(&target, &[]));

        assert_eq!(
            report.percentiles,
            Percentiles {
                price: 50,
                occupancy: 50,
                revenue: 50,
                rating: 50
            }
        );
        assert_eq!(report.z_scores, ZScores::default());
        assert_eq!(report.deviation_table, DeviationTable::default());
        assert_eq!(report.pricing_alignment, PricingAlignment::Balanced);
        assert_eq!(report.competitiveness_score.score, 50);
        assert_eq!(report.market_fit, MarketFit::Bad);
        assert!(report.anomalies.is_empty());
        assert_eq!(report.summary.anomalies, report.anomalies);
    }
}
