use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinate pair (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// A single review text attached to a place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub text: String,
}

/// Canonical place record from the places-search provider.
///
/// Identity for dedup purposes is `formatted_address`: the pipeline keys on
/// the address string, so two listings with the same formatted address
/// collapse to one and two spellings of the same building do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub name: String,
    pub formatted_address: String,
    pub rating: f64,
    pub user_rating_count: u32,
    pub reviews: Vec<Review>,
    pub location: Coordinates,
    pub category_label: String,
    pub maps_link: String,
    pub editorial_summary: Option<String>,
    pub price_level: Option<String>,
    pub website: Option<String>,
}

impl PlaceRecord {
    /// Review texts available for analysis (provider caps these at ~5 per place)
    pub fn review_texts(&self) -> impl Iterator<Item = &str> {
        self.reviews.iter().map(|r| r.text.as_str())
    }
}

/// Name+address pair from candidate search (partial field mask, no detail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub formatted_address: String,
}

impl fmt::Display for PlaceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.formatted_address)
    }
}

/// Aggregate rating statistics over a merged market snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub count: usize,
    pub simple_average_rating: f64,
    pub weighted_average_rating: f64,
    pub total_review_count: u64,
    pub reviews_sampled: usize,
}

/// Share-of-voice split over the fixed topic buckets.
///
/// `degraded` marks the fixed 33/33/34 fallback so consumers can tell a
/// provider outage from a real classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopicShare {
    pub quality: u32,
    pub value: u32,
    pub service: u32,
    #[serde(default)]
    pub degraded: bool,
}

impl TopicShare {
    pub fn fallback() -> Self {
        Self { quality: 33, value: 33, service: 34, degraded: true }
    }
}

/// Whether a table row is the audited business or a competitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Target,
    Competitor,
}

/// One row of the market table shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct MarketRow {
    pub name: String,
    pub rating: f64,
    pub review_count: u32,
    pub kind: RowKind,
    pub summary: String,
    pub maps_link: String,
}

/// Leader entry used for benchmarking display
#[derive(Debug, Clone, Serialize)]
pub struct LeaderRow {
    pub name: String,
    pub rating: f64,
    pub review_count: u32,
}

/// Full result of one audit run. Request-scoped; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    pub category_label: String,
    pub center: Coordinates,
    pub radius_km: f64,
    pub rows: Vec<MarketRow>,
    pub metrics: AggregateMetrics,
    pub leaders: Vec<LeaderRow>,
    pub topics: TopicShare,
    pub executive_report: String,
    pub gap_report: Option<String>,
    pub api_cost: Decimal,
    pub generated_at: DateTime<Utc>,
}

impl MarketReport {
    /// Render the report as a standalone markdown document (CLI output)
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Market Radar: {}\n\n", self.category_label));
        out.push_str(&format!(
            "Center: {} | Radius: {} km | Generated: {}\n\n",
            self.center,
            self.radius_km,
            self.generated_at.format("%Y-%m-%d %H:%M UTC"),
        ));

        out.push_str("## Sample Metrics\n\n");
        out.push_str(&format!(
            "| Businesses | Avg Rating | Weighted Avg | Review Volume | Reviews Analyzed |\n\
             | --- | --- | --- | --- | --- |\n\
             | {} | {:.2} | {:.2} | {} | {} |\n\n",
            self.metrics.count,
            self.metrics.simple_average_rating,
            self.metrics.weighted_average_rating,
            self.metrics.total_review_count,
            self.metrics.reviews_sampled,
        ));

        out.push_str("## Market Table\n\n");
        out.push_str("| Business | Rating | Reviews | Type | AI Summary |\n| --- | --- | --- | --- | --- |\n");
        for row in &self.rows {
            let kind = match row.kind {
                RowKind::Target => "MY BUSINESS",
                RowKind::Competitor => "COMPETITOR",
            };
            out.push_str(&format!(
                "| {} | {:.1} | {} | {} | {} |\n",
                row.name, row.rating, row.review_count, kind, row.summary,
            ));
        }
        out.push('\n');

        out.push_str("## Consolidated Leaders\n\n");
        if self.leaders.is_empty() {
            out.push_str("No consolidated leaders in this area.\n\n");
        } else {
            for (i, l) in self.leaders.iter().enumerate() {
                out.push_str(&format!(
                    "{}. {} — {:.1} stars ({} reviews)\n",
                    i + 1,
                    l.name,
                    l.rating,
                    l.review_count,
                ));
            }
            out.push('\n');
        }

        out.push_str("## Share of Voice\n\n");
        out.push_str(&format!(
            "Quality: {}% | Value: {}% | Service: {}%{}\n\n",
            self.topics.quality,
            self.topics.value,
            self.topics.service,
            if self.topics.degraded { " (classification unavailable, default split)" } else { "" },
        ));

        out.push_str("## Market Intelligence\n\n");
        out.push_str(&self.executive_report);
        out.push('\n');

        if let Some(gap) = &self.gap_report {
            out.push_str("\n## Private Audit: Market vs Your Reviews\n\n");
            out.push_str(gap);
            out.push('\n');
        }

        out
    }
}
