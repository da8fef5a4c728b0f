use crate::models::{
    Anomaly, Competitiveness, CompetitivenessLabel, MarketFit, Percentiles, PricingAlignment,
};

const LOW_BAND: u8 = 40;
const HIGH_BAND: u8 = 60;

/// Places the price/occupancy percentile pair into a market posture.
///
/// Exactly 40 or 60 on either axis is neither low nor high.
pub fn classify_alignment(price: u8, occupancy: u8) -> PricingAlignment {
    if price < LOW_BAND && occupancy < LOW_BAND {
        PricingAlignment::MisalignedLow
    } else if price > HIGH_BAND && occupancy > HIGH_BAND {
        PricingAlignment::Premium
    } else if price < LOW_BAND && occupancy > HIGH_BAND {
        PricingAlignment::Undervalued
    } else if price > HIGH_BAND && occupancy < LOW_BAND {
        PricingAlignment::Overvalued
    } else {
        PricingAlignment::Balanced
    }
}

/// 40/40/20 blend of price, occupancy and revenue percentiles.
pub fn competitiveness(percentiles: &Percentiles) -> Competitiveness {
    let weighted = percentiles.price as f64 * 0.4
        + percentiles.occupancy as f64 * 0.4
        + percentiles.revenue as f64 * 0.2;
    let score = weighted.round().clamp(0.0, 100.0) as u8;

    Competitiveness {
        score,
        label: competitiveness_label(score),
    }
}

pub fn competitiveness_label(score: u8) -> CompetitivenessLabel {
    match score {
        80..=u8::MAX => CompetitivenessLabel::Dominant,
        60..=79 => CompetitivenessLabel::Strong,
        40..=59 => CompetitivenessLabel::Medium,
        _ => CompetitivenessLabel::Weak,
    }
}

/// First matching rule wins.
pub fn market_fit(score: u8, alignment: PricingAlignment) -> MarketFit {
    if score > 75 && alignment != PricingAlignment::MisalignedLow {
        MarketFit::Excellent
    } else if score > 50 && alignment != PricingAlignment::Overvalued {
        MarketFit::Good
    } else if matches!(
        alignment,
        PricingAlignment::Overvalued | PricingAlignment::MisalignedLow
    ) {
        MarketFit::NeedsWork
    } else {
        MarketFit::Bad
    }
}

/// Evaluates every anomaly rule independently, in a fixed emission order.
pub fn detect_anomalies(percentiles: &Percentiles, rating: f64) -> Vec<Anomaly> {
    let rules = [
        (percentiles.price > 90, Anomaly::PremiumPrice),
        (percentiles.price < 10, Anomaly::LowCost),
        (percentiles.rating < 20, Anomaly::CriticalRating),
        (rating < 4.0, Anomaly::LowRating),
        (percentiles.revenue > 90, Anomaly::TopRevenue),
        (percentiles.occupancy < 10, Anomaly::LowOccupancy),
    ];

    rules
        .into_iter()
        .filter_map(|(fired, anomaly)| fired.then_some(anomaly))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn percentiles(price: u8, occupancy: u8, revenue: u8, rating: u8) -> Percentiles {
        Percentiles {
            price,
            occupancy,
            revenue,
            rating,
        }
    }

    #[test]
    fn alignment_follows_expected_quadrants() {
        assert_eq!(classify_alignment(20, 30), PricingAlignment::MisalignedLow);
        assert_eq!(classify_alignment(70, 95), PricingAlignment::Premium);
        assert_eq!(classify_alignment(10, 80), PricingAlignment::Undervalued);
        assert_eq!(classify_alignment(85, 5), PricingAlignment::Overvalued);
        assert_eq!(classify_alignment(50, 50), PricingAlignment::Balanced);
    }

    #[test]
    fn alignment_boundaries_fall_through_to_balanced() {
        for price in [40, 60] {
            for occupancy in [40, 60] {
                assert_eq!(classify_alignment(price, occupancy), PricingAlignment::Balanced);
            }
        }
        assert_eq!(classify_alignment(39, 40), PricingAlignment::Balanced);
        assert_eq!(classify_alignment(61, 60), PricingAlignment::Balanced);
        assert_eq!(classify_alignment(39, 61), PricingAlignment::Undervalued);
    }

    #[test]
    fn alignment_covers_every_label() {
        let mut seen = HashSet::new();
        for price in 0..=100 {
            for occupancy in 0..=100 {
                let alignment = classify_alignment(price, occupancy);
                seen.insert(alignment);

                let on_boundary = [LOW_BAND, HIGH_BAND].contains(&price)
                    || [LOW_BAND, HIGH_BAND].contains(&occupancy);
                if on_boundary {
                    assert_eq!(alignment, PricingAlignment::Balanced, "{price}/{occupancy}");
                }
            }
        }

        assert_eq!(
            seen,
            HashSet::from([
                PricingAlignment::MisalignedLow,
                PricingAlignment::Premium,
                PricingAlignment::Undervalued,
                PricingAlignment::Overvalued,
                PricingAlignment::Balanced,
            ])
        );
    }

    #[test]
    fn score_weights_and_labels() {
        let result = competitiveness(&percentiles(90, 80, 70, 0));
        assert_eq!(result.score, 82);
        assert_eq!(result.label, CompetitivenessLabel::Dominant);

        assert_eq!(competitiveness(&percentiles(50, 50, 50, 50)).score, 50);
        assert_eq!(competitiveness_label(79), CompetitivenessLabel::Strong);
        assert_eq!(competitiveness_label(60), CompetitivenessLabel::Strong);
        assert_eq!(competitiveness_label(40), CompetitivenessLabel::Medium);
        assert_eq!(competitiveness_label(39), CompetitivenessLabel::Weak);
    }

    #[test]
    fn score_stays_in_range() {
        assert_eq!(competitiveness(&percentiles(0, 0, 0, 0)).score, 0);
        assert_eq!(competitiveness(&percentiles(100, 100, 100, 100)).score, 100);
        for value in (0..=100).step_by(7) {
            let score = competitiveness(&percentiles(value, 100 - value, value, 0)).score;
            assert!(score <= 100);
        }
    }

    #[test]
    fn market_fit_rules_apply_in_order() {
        assert_eq!(market_fit(80, PricingAlignment::Premium), MarketFit::Excellent);
        assert_eq!(market_fit(80, PricingAlignment::Overvalued), MarketFit::Excellent);
        assert_eq!(market_fit(80, PricingAlignment::MisalignedLow), MarketFit::Good);
        assert_eq!(market_fit(60, PricingAlignment::Overvalued), MarketFit::NeedsWork);
        assert_eq!(market_fit(30, PricingAlignment::MisalignedLow), MarketFit::NeedsWork);
        assert_eq!(market_fit(50, PricingAlignment::Balanced), MarketFit::Bad);
        assert_eq!(market_fit(51, PricingAlignment::Balanced), MarketFit::Good);
    }

    #[test]
    fn anomalies_fire_independently_in_order() {
        let found = detect_anomalies(&percentiles(95, 5, 96, 10), 3.9);
        assert_eq!(
            found,
            vec![
                Anomaly::PremiumPrice,
                Anomaly::CriticalRating,
                Anomaly::LowRating,
                Anomaly::TopRevenue,
                Anomaly::LowOccupancy,
            ]
        );

        assert!(detect_anomalies(&percentiles(50, 50, 50, 50), 4.0).is_empty());
        assert_eq!(
            detect_anomalies(&percentiles(9, 50, 50, 50), 4.5),
            vec![Anomaly::LowCost]
        );
    }
}
