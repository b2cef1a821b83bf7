use crate::analyzer::gemini::GeminiClient;
use crate::email::LeadNotifier;
use crate::market;
use crate::narrative;
use crate::places::{PlacesClient, ProviderError};
use crate::session::SearchMode;
use crate::types::{MarketReport, MarketRow, LeaderRow, PlaceCandidate, PlaceRecord, RowKind, TopicShare};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{info, warn};

/// Shown in place of a summary when the batch call degraded to an empty map
pub const SUMMARY_PLACEHOLDER: &str = "Analyzing...";

/// What one audit runs against
pub enum AuditTarget {
    /// A confirmed candidate from business-name search
    Business(PlaceCandidate),
    /// A validated center address plus chosen category terms
    Area {
        center: PlaceRecord,
        categories: Vec<String>,
    },
}

pub struct AuditRequest {
    pub target: AuditTarget,
    pub radius_km: f64,
    pub user_email: String,
    pub own_reviews: Vec<String>,
}

/// Validation and provider failures are kept distinct so callers can render
/// "nothing there" differently from "the provider fell over".
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("the selected business could not be re-resolved")]
    TargetNotFound,
    #[error("no market data found in the requested area")]
    EmptyMarket,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Build the display rows from a merged snapshot: target marked by name,
/// summaries keyed by name with a placeholder for any business the batch did
/// not cover (a degraded batch covers none), sorted by rating descending.
fn build_rows(
    snapshot: &[PlaceRecord],
    target_name: Option<&str>,
    summaries: &std::collections::HashMap<String, String>,
) -> Vec<MarketRow> {
    let mut rows: Vec<MarketRow> = snapshot
        .iter()
        .map(|record| {
            let kind = match target_name {
                Some(t) if t == record.name => RowKind::Target,
                _ => RowKind::Competitor,
            };
            MarketRow {
                name: record.name.clone(),
                rating: record.rating,
                review_count: record.user_rating_count,
                kind,
                summary: summaries
                    .get(&record.name)
                    .cloned()
                    .unwrap_or_else(|| SUMMARY_PLACEHOLDER.to_string()),
                maps_link: record.maps_link.clone(),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal));
    rows
}

/// Run the full market aggregation pipeline for one user action:
/// resolve -> fetch market -> merge/metrics/leaders -> narratives.
///
/// The three narrative calls are independent and joined concurrently; the gap
/// report depends on the market corpus and runs after them.
pub async fn run_audit(
    places: &PlacesClient,
    gemini: &GeminiClient,
    notifier: &LeadNotifier,
    request: AuditRequest,
) -> Result<MarketReport, AuditError> {
    let radius_km = request.radius_km;

    // ── Step 1: resolve + fetch ──
    let (target, market_data, category_label, mode, detail) = match request.target {
        AuditTarget::Business(candidate) => {
            let Some((target, market_data, label)) =
                places.fetch_target_and_market(&candidate, radius_km).await?
            else {
                return Err(AuditError::TargetNotFound);
            };
            let detail = format!("Business: {}", target.name);
            (Some(target), market_data, label, SearchMode::Business, detail)
        }
        AuditTarget::Area { center, categories } => {
            let label = categories.join(" or ");
            let market_data = places
                .fetch_market(center.location, &label, radius_km)
                .await?;
            let detail = format!("Categories: {} at {}", label, center.formatted_address);
            (None, market_data, label, SearchMode::Category, detail)
        }
    };

    if market_data.is_empty() {
        return Err(AuditError::EmptyMarket);
    }

    let center = target
        .as_ref()
        .map(|t| t.location)
        .or_else(|| market_data.first().map(|m| m.location))
        .unwrap_or_default();

    // ── Step 2: lead notification (fire-and-forget) ──
    notifier
        .notify_lead(&request.user_email, mode, &detail, radius_km, center)
        .await
        .ok();

    // ── Step 3: aggregate ──
    let leaders = market::select_leaders(&market_data);
    let target_name = target.as_ref().map(|t| t.name.clone());
    let snapshot = market::merge(target, market_data);
    let metrics = market::compute_metrics(&snapshot);

    info!(
        "Snapshot: {} entries, {} leaders, avg {:.2} (weighted {:.2})",
        metrics.count,
        leaders.len(),
        metrics.simple_average_rating,
        metrics.weighted_average_rating,
    );

    let market_corpus = market::market_text(&snapshot, target_name.as_deref());
    let leaders_corpus = market::leaders_text(&leaders);

    // ── Step 4: narratives (independent, joined) ──
    let mut api_cost = Decimal::ZERO;
    let (summaries_result, (topics, topic_cost), (executive, report_cost)) = tokio::join!(
        narrative::summarize_batch(gemini, &snapshot),
        narrative::classify_topics(gemini, &market_corpus, &category_label),
        narrative::executive_report(gemini, &market_corpus, &leaders_corpus, &category_label),
    );
    api_cost += topic_cost + report_cost;

    let summaries = match summaries_result {
        Ok((map, cost)) => {
            api_cost += cost;
            map
        }
        Err(e) => {
            warn!("Summary batch call failed: {e}");
            Default::default()
        }
    };

    let gap = if request.own_reviews.is_empty() {
        None
    } else {
        let (text, cost) = narrative::gap_report(
            gemini,
            &market_corpus,
            &request.own_reviews,
            &category_label,
        )
        .await;
        api_cost += cost;
        Some(text)
    };

    if topics == TopicShare::fallback() {
        warn!("Topic classification degraded to the default split");
    }

    // ── Step 5: assemble ──
    let rows = build_rows(&snapshot, target_name.as_deref(), &summaries);

    let leaders = leaders
        .into_iter()
        .map(|l| LeaderRow {
            name: l.name,
            rating: l.rating,
            review_count: l.user_rating_count,
        })
        .collect();

    info!("Audit complete: {} rows (API cost ${api_cost:.4})", rows.len());

    Ok(MarketReport {
        category_label,
        center,
        radius_km,
        rows,
        metrics,
        leaders,
        topics,
        executive_report: executive,
        gap_report: gap,
        api_cost,
        generated_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;
    use std::collections::HashMap;

    fn place(name: &str, rating: f64) -> PlaceRecord {
        PlaceRecord {
            name: name.to_string(),
            formatted_address: format!("{name} street"),
            rating,
            user_rating_count: 10,
            reviews: Vec::new(),
            location: Coordinates::default(),
            category_label: "Bakery".to_string(),
            maps_link: "#".to_string(),
            editorial_summary: None,
            price_level: None,
            website: None,
        }
    }

    #[test]
    fn degraded_summary_batch_puts_placeholder_on_every_row() {
        let snapshot = vec![place("Mine", 4.5), place("Rival", 4.0), place("Other", 3.5)];
        let rows = build_rows(&snapshot, Some("Mine"), &HashMap::new());
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.summary, SUMMARY_PLACEHOLDER);
        }
    }

    #[test]
    fn rows_carry_summaries_target_kind_and_rating_order() {
        let snapshot = vec![place("Mine", 4.0), place("Rival", 4.8)];
        let summaries = HashMap::from([
            ("Rival".to_string(), "Fast but pricey".to_string()),
        ]);
        let rows = build_rows(&snapshot, Some("Mine"), &summaries);
        // sorted by rating descending
        assert_eq!(rows[0].name, "Rival");
        assert_eq!(rows[0].kind, RowKind::Competitor);
        assert_eq!(rows[0].summary, "Fast but pricey");
        assert_eq!(rows[1].kind, RowKind::Target);
        assert_eq!(rows[1].summary, SUMMARY_PLACEHOLDER);
    }
}
