use serde::{Deserialize, Serialize};

/// One normalized property listing.
///
/// Built at the boundary by [`crate::listings`]; the core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
    pub neighbourhood: String,
    pub price: f64,
    /// Days occupied in the trailing 365-day window.
    pub occupancy: u32,
    pub revenue: f64,
    pub rating: f64,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        neighbourhood: impl Into<String>,
        price: f64,
        occupancy: u32,
        rating: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            host_id: None,
            room_type: None,
            neighbourhood: neighbourhood.into(),
            price,
            occupancy,
            revenue: price * occupancy as f64,
            rating,
            anomalies: Vec::new(),
        }
    }

    /// Copies the anomalies flagged by `report` onto the record.
    pub fn with_anomalies(mut self, report: &AnalysisReport) -> Self {
        self.anomalies = report.anomalies.clone();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Price,
    Occupancy,
    Revenue,
    Rating,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Price,
        Metric::Occupancy,
        Metric::Revenue,
        Metric::Rating,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Price => "price",
            Metric::Occupancy => "occupancy",
            Metric::Revenue => "revenue",
            Metric::Rating => "rating",
        }
    }

    /// Reads the metric off a record, mapping non-finite values to 0.
    pub fn value(self, record: &Record) -> f64 {
        let raw = match self {
            Metric::Price => record.price,
            Metric::Occupancy => record.occupancy as f64,
            Metric::Revenue => record.revenue,
            Metric::Rating => record.rating,
        };
        if raw.is_finite() {
            raw
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Neighbourhood,
    City,
    Global,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Neighbourhood, Scope::City, Scope::Global];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Neighbourhood => "neighbourhood",
            Scope::City => "city",
            Scope::Global => "global",
        }
    }
}

/// Ascending sample of one metric within one scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution(Vec<f64>);

impl Distribution {
    pub fn from_values(mut values: Vec<f64>) -> Self {
        for value in values.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        values.sort_by(|a, b| a.total_cmp(b));
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element at `floor(len * fraction)`, or 0 when empty.
    ///
    /// This is the lower-index convention shared by the median and the
    /// revenue band; it never interpolates.
    pub fn at_fraction(&self, fraction: f64) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        let index = ((self.0.len() as f64) * fraction).floor() as usize;
        self.0[index.min(self.0.len() - 1)]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReference {
    pub distribution: Distribution,
    pub stats: SummaryStats,
}

/// Per-metric references for one peer group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeReference {
    pub price: MetricReference,
    pub occupancy: MetricReference,
    pub revenue: MetricReference,
    pub rating: MetricReference,
}

impl ScopeReference {
    pub fn metric(&self, metric: Metric) -> &MetricReference {
        match metric {
            Metric::Price => &self.price,
            Metric::Occupancy => &self.occupancy,
            Metric::Revenue => &self.revenue,
            Metric::Rating => &self.rating,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBundle {
    pub neighbourhood: ScopeReference,
    pub city: ScopeReference,
    /// Same collection as `city` until multi-market datasets exist.
    pub global: ScopeReference,
}

impl ReferenceBundle {
    pub fn scope(&self, scope: Scope) -> &ScopeReference {
        match scope {
            Scope::Neighbourhood => &self.neighbourhood,
            Scope::City => &self.city,
            Scope::Global => &self.global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentiles {
    pub price: u8,
    pub occupancy: u8,
    pub revenue: u8,
    pub rating: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZScores {
    pub price: f64,
    pub occupancy: f64,
    pub revenue: f64,
}

/// Percent deviation from a scope mean, one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Deviations {
    pub price: f64,
    pub occupancy: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviationTable {
    pub neighbourhood: Deviations,
    pub city: Deviations,
    pub global: Deviations,
}

impl DeviationTable {
    pub fn scope(&self, scope: Scope) -> &Deviations {
        match scope {
            Scope::Neighbourhood => &self.neighbourhood,
            Scope::City => &self.city,
            Scope::Global => &self.global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingAlignment {
    MisalignedLow,
    Premium,
    Undervalued,
    Overvalued,
    Balanced,
}

impl PricingAlignment {
    pub fn as_str(self) -> &'static str {
        match self {
            PricingAlignment::MisalignedLow => "misaligned_low",
            PricingAlignment::Premium => "premium",
            PricingAlignment::Undervalued => "undervalued",
            PricingAlignment::Overvalued => "overvalued",
            PricingAlignment::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitivenessLabel {
    Dominant,
    Strong,
    Medium,
    Weak,
}

impl CompetitivenessLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitivenessLabel::Dominant => "dominant",
            CompetitivenessLabel::Strong => "strong",
            CompetitivenessLabel::Medium => "medium",
            CompetitivenessLabel::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitiveness {
    pub score: u8,
    pub label: CompetitivenessLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketFit {
    Excellent,
    Good,
    NeedsWork,
    Bad,
}

impl MarketFit {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketFit::Excellent => "excellent",
            MarketFit::Good => "good",
            MarketFit::NeedsWork => "needs_work",
            MarketFit::Bad => "bad",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    PremiumPrice,
    LowCost,
    CriticalRating,
    LowRating,
    TopRevenue,
    LowOccupancy,
}

impl Anomaly {
    pub fn as_str(self) -> &'static str {
        match self {
            Anomaly::PremiumPrice => "premium_price",
            Anomaly::LowCost => "low_cost",
            Anomaly::CriticalRating => "critical_rating",
            Anomaly::LowRating => "low_rating",
            Anomaly::TopRevenue => "top_revenue",
            Anomaly::LowOccupancy => "low_occupancy",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "premium_price" => Some(Anomaly::PremiumPrice),
            "low_cost" => Some(Anomaly::LowCost),
            "critical_rating" => Some(Anomaly::CriticalRating),
            "low_rating" => Some(Anomaly::LowRating),
            "top_revenue" => Some(Anomaly::TopRevenue),
            "low_occupancy" => Some(Anomaly::LowOccupancy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenuePerformance {
    AboveAverage,
    BelowAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueProjection {
    pub actual: f64,
    /// `[p50, p75]` of the city revenue distribution.
    pub expected_range: (f64, f64),
    pub performance: RevenuePerformance,
}

/// Structured, language-free digest of a report for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub percentiles: Percentiles,
    pub alignment: PricingAlignment,
    pub score: u8,
    pub label: CompetitivenessLabel,
    pub anomalies: Vec<Anomaly>,
    pub market_fit: MarketFit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub percentiles: Percentiles,
    pub z_scores: ZScores,
    pub deviation_table: DeviationTable,
    pub pricing_alignment: PricingAlignment,
    pub competitiveness_score: Competitiveness,
    pub market_fit: MarketFit,
    pub anomalies: Vec<Anomaly>,
    pub expected_vs_actual_revenue: RevenueProjection,
    pub summary: AnalysisSummary,
}
