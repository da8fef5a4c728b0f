use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{AnalysisReport, Metric, Record, ReferenceBundle, RevenuePerformance, Scope};

/// Renders one analysis as a Markdown section.
pub fn build_report(
    record: &Record,
    report: &AnalysisReport,
    bundle: &ReferenceBundle,
    generated_on: NaiveDate,
) -> String {
    let mut output = String::new();
    let title = record.name.as_deref().unwrap_or(&record.id);
    let neighbourhood = if record.neighbourhood.is_empty() {
        "unknown neighbourhood"
    } else {
        record.neighbourhood.as_str()
    };

    let _ = writeln!(output, "# Market Position: {}", title);
    let _ = writeln!(
        output,
        "Listing {} in {} (generated {})",
        record.id, neighbourhood, generated_on
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## City Positioning");
    let _ = writeln!(output, "| Metric | Value | Percentile | Z-score |");
    let _ = writeln!(output, "|---|---|---|---|");
    let positions = [
        (Metric::Price, report.percentiles.price, Some(report.z_scores.price)),
        (Metric::Occupancy, report.percentiles.occupancy, Some(report.z_scores.occupancy)),
        (Metric::Revenue, report.percentiles.revenue, Some(report.z_scores.revenue)),
        (Metric::Rating, report.percentiles.rating, None),
    ];
    for (metric, percentile, z_score) in positions {
        let z_label = z_score.map_or_else(|| "-".to_string(), |z| format!("{z:+.2}"));
        let _ = writeln!(
            output,
            "| {} | {:.2} | P{} | {} |",
            metric.as_str(),
            metric.value(record),
            percentile,
            z_label
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Deviation From Scope Mean");
    let _ = writeln!(output, "| Scope | Price | Occupancy | Revenue |");
    let _ = writeln!(output, "|---|---|---|---|");
    for scope in Scope::ALL {
        let row = report.deviation_table.scope(scope);
        let _ = writeln!(
            output,
            "| {} | {:+.1}% | {:+.1}% | {:+.1}% |",
            scope.as_str(),
            row.price,
            row.occupancy,
            row.revenue
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Competitiveness");
    let _ = writeln!(
        output,
        "- Score {} ({})",
        report.competitiveness_score.score,
        report.competitiveness_score.label.as_str()
    );
    let _ = writeln!(output, "- Pricing alignment: {}", report.pricing_alignment.as_str());
    let _ = writeln!(output, "- Market fit: {}", report.market_fit.as_str());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Anomalies");
    if report.anomalies.is_empty() {
        let _ = writeln!(output, "No anomalies flagged.");
    } else {
        for anomaly in report.anomalies.iter() {
            let _ = writeln!(output, "- {}", anomaly.as_str());
        }
    }

    let revenue = &report.expected_vs_actual_revenue;
    let performance = match revenue.performance {
        RevenuePerformance::AboveAverage => "above average",
        RevenuePerformance::BelowAverage => "below average",
    };
    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue");
    let _ = writeln!(
        output,
        "Actual {:.2} against an expected {:.2}..{:.2} ({})",
        revenue.actual, revenue.expected_range.0, revenue.expected_range.1, performance
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reference Benchmarks");
    for scope in Scope::ALL {
        let reference = bundle.scope(scope);
        let _ = writeln!(
            output,
            "### {} ({} listings)",
            scope.as_str(),
            reference.price.distribution.len()
        );
        for metric in Metric::ALL {
            let stats = reference.metric(metric).stats;
            let _ = writeln!(
                output,
                "- {}: min {:.2}, median {:.2}, mean {:.2}, max {:.2}, std {:.2}",
                metric.as_str(),
                stats.min,
                stats.median,
                stats.mean,
                stats.max,
                stats.std
            );
        }
    }

    output
}
