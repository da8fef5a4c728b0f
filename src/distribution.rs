use tracing::debug;

use crate::cache::{ReferenceCache, ScopeKey};
use crate::models::{Distribution, Metric, MetricReference, Record, ReferenceBundle, ScopeReference, SummaryStats};

/// Builds the neighbourhood, city and global references for `target`.
///
/// The neighbourhood scope is every record sharing the target's
/// neighbourhood; city and global both cover the full collection.
pub fn build(target: &Record, records: &[Record]) -> ReferenceBundle {
    let peers: Vec<&Record> = records
        .iter()
        .filter(|record| record.neighbourhood == target.neighbourhood)
        .collect();
    let neighbourhood = build_scope(&peers);
    let city = build_scope(&records.iter().collect::<Vec<_>>());

    debug!(
        neighbourhood = %target.neighbourhood,
        neighbourhood_peers = peers.len(),
        city_peers = records.len(),
        "built reference bundle"
    );

    ReferenceBundle {
        neighbourhood,
        global: city.clone(),
        city,
    }
}

/// Same as [`build`], reusing scope references already held in `cache`.
///
/// The cache is owned by the caller and must be cleared whenever `records`
/// changes; the result is identical to an uncached build.
pub fn build_with_cache(
    target: &Record,
    records: &[Record],
    cache: &mut ReferenceCache,
) -> ReferenceBundle {
    let city = cache
        .get_or_insert_with(ScopeKey::City, || {
            build_scope(&records.iter().collect::<Vec<_>>())
        })
        .clone();
    let neighbourhood = cache
        .get_or_insert_with(ScopeKey::Neighbourhood(target.neighbourhood.clone()), || {
            let peers: Vec<&Record> = records
                .iter()
                .filter(|record| record.neighbourhood == target.neighbourhood)
                .collect();
            build_scope(&peers)
        })
        .clone();

    ReferenceBundle {
        neighbourhood,
        global: city.clone(),
        city,
    }
}

pub fn build_scope(records: &[&Record]) -> ScopeReference {
    let metric = |metric: Metric| {
        let distribution =
            Distribution::from_values(records.iter().map(|record| metric.value(record)).collect());
        let stats = summarize(&distribution);
        MetricReference {
            distribution,
            stats,
        }
    };

    ScopeReference {
        price: metric(Metric::Price),
        occupancy: metric(Metric::Occupancy),
        revenue: metric(Metric::Revenue),
        rating: metric(Metric::Rating),
    }
}

/// Summary statistics of an already sorted distribution.
///
/// `median` is the lower median (`floor(n/2)`) and `std` is the population
/// standard deviation. An empty distribution yields all zeros.
pub fn summarize(distribution: &Distribution) -> SummaryStats {
    let values = distribution.as_slice();
    let (Some(&min), Some(&max)) = (values.first(), values.last()) else {
        return SummaryStats::default();
    };

    let count = values.len() as f64;
    // Clamped so identical samples give an exact mean and a zero std.
    let mean = (values.iter().sum::<f64>() / count).clamp(min, max);
    let variance = values
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / count;

    SummaryStats {
        min,
        max,
        mean,
        median: distribution.at_fraction(0.5),
        std: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, neighbourhood: &str, price: f64, occupancy: u32, rating: f64) -> Record {
        Record::new(id, neighbourhood, price, occupancy, rating)
    }

    fn sample_records() -> Vec<Record> {
        vec![
            listing("1", "Ribeira", 120.0, 200, 4.8),
            listing("2", "Ribeira", 80.0, 150, 4.5),
            listing("3", "Bonfim", 60.0, 300, 4.9),
            listing("4", "Bonfim", 45.0, 90, 3.7),
            listing("5", "Ribeira", 200.0, 40, 4.1),
        ]
    }

    #[test]
    fn neighbourhood_scope_filters_by_target() {
        let records = sample_records();
        let bundle = build(&records[0], &records);

        assert_eq!(bundle.neighbourhood.price.distribution.as_slice(), &[80.0, 120.0, 200.0]);
        assert_eq!(bundle.city.price.distribution.len(), 5);
        assert_eq!(bundle.global, bundle.city);
    }

    #[test]
    fn stats_use_lower_median_and_population_std() {
        let stats = summarize(&Distribution::from_values(vec![4.0, 1.0, 3.0, 2.0]));
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 3.0);
        assert!((stats.std - 1.25_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_collection_yields_zero_stats() {
        let target = listing("1", "Ribeira", 120.0, 200, 4.8);
        let bundle = build(&target, &[]);

        for metric in Metric::ALL {
            assert_eq!(bundle.city.metric(metric).stats, SummaryStats::default());
            assert_eq!(bundle.neighbourhood.metric(metric).stats, SummaryStats::default());
            assert!(bundle.global.metric(metric).distribution.is_empty());
        }
    }

    #[test]
    fn identical_values_have_zero_std() {
        let stats = summarize(&Distribution::from_values(vec![0.1, 0.1, 0.1]));
        assert_eq!(stats.mean, 0.1);
        assert_eq!(stats.std, 0.0);
    }

    #[test]
    fn stats_stay_ordered() {
        let samples = [
            vec![5.0],
            vec![1.0, 100.0],
            vec![0.3, 0.3, 0.3, 7.5, 2.25],
            vec![12.0, -4.0, 8.0, 8.0, 3.5, 0.0],
        ];
        for sample in samples {
            let stats = summarize(&Distribution::from_values(sample));
            assert!(stats.min <= stats.median && stats.median <= stats.max);
            assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        }
    }

    #[test]
    fn non_finite_metrics_count_as_zero() {
        let mut broken = listing("9", "Ribeira", f64::NAN, 10, 4.0);
        broken.revenue = f64::INFINITY;
        let bundle = build(&broken, &[broken.clone()]);

        assert_eq!(bundle.city.price.distribution.as_slice(), &[0.0]);
        assert_eq!(bundle.city.revenue.stats.max, 0.0);
    }

    #[test]
    fn cached_build_matches_uncached() {
        let records = sample_records();
        let mut cache = ReferenceCache::new();

        for target in &records {
            assert_eq!(build_with_cache(target, &records, &mut cache), build(target, &records));
        }
        // one city entry plus two neighbourhoods
        assert_eq!(cache.len(), 3);
    }
}
