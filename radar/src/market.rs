use crate::types::{AggregateMetrics, PlaceRecord};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Display cap after merging target + market
pub const DISPLAY_CAP: usize = 15;
/// Minimum review volume for a "consolidated" leader
pub const LEADER_MIN_REVIEWS: u32 = 100;
/// Leaders kept for benchmarking
pub const LEADER_CAP: usize = 3;

/// Merge the target (first, when present) with the market candidates in
/// provider order, dedup by formatted address, truncate for display.
pub fn merge(target: Option<PlaceRecord>, market: Vec<PlaceRecord>) -> Vec<PlaceRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(market.len() + 1);

    if let Some(t) = target {
        seen.insert(t.formatted_address.clone());
        merged.push(t);
    }
    for record in market {
        if seen.insert(record.formatted_address.clone()) {
            merged.push(record);
        }
    }

    merged.truncate(DISPLAY_CAP);
    merged
}

/// Simple and review-weighted rating statistics over a snapshot.
///
/// Zero-rating entries count fully in the simple average; entries with zero
/// review count are excluded from the weighted average by construction.
pub fn compute_metrics(snapshot: &[PlaceRecord]) -> AggregateMetrics {
    let count = snapshot.len();
    let mut rating_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut total_reviews: u64 = 0;
    let mut reviews_sampled = 0;

    for record in snapshot {
        rating_sum += record.rating;
        weighted_sum += record.rating * record.user_rating_count as f64;
        total_reviews += record.user_rating_count as u64;
        reviews_sampled += record.reviews.len();
    }

    let simple_average_rating = if count > 0 { rating_sum / count as f64 } else { 0.0 };
    let weighted_average_rating = if total_reviews > 0 {
        weighted_sum / total_reviews as f64
    } else {
        0.0
    };

    AggregateMetrics {
        count,
        simple_average_rating,
        weighted_average_rating,
        total_review_count: total_reviews,
        reviews_sampled,
    }
}

/// Filter to consolidated entries and rank by rating descending.
/// Ties keep provider order (stable sort). Empty output is a valid result.
pub fn select_leaders(market: &[PlaceRecord]) -> Vec<PlaceRecord> {
    let mut leaders: Vec<PlaceRecord> = market
        .iter()
        .filter(|r| r.user_rating_count >= LEADER_MIN_REVIEWS)
        .cloned()
        .collect();
    leaders.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal));
    leaders.truncate(LEADER_CAP);
    leaders
}

/// Concatenated competitor review corpus for the narrative prompts.
/// The target's own reviews are excluded so the market text reflects
/// expectations around it, not about it.
pub fn market_text(snapshot: &[PlaceRecord], target_name: Option<&str>) -> String {
    let mut out = String::new();
    for record in snapshot {
        if let Some(target) = target_name {
            if record.name == target {
                continue;
            }
        }
        let reviews: Vec<&str> = record.review_texts().collect();
        if reviews.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "COMPETITOR ({}): {}\n\n",
            record.name,
            reviews.join(" "),
        ));
    }
    out
}

/// Leader profiles (name, rating, description, price tier, recent reviews)
/// for the executive-report prompt.
pub fn leaders_text(leaders: &[PlaceRecord]) -> String {
    if leaders.is_empty() {
        return "No consolidated leaders.".to_string();
    }
    let mut out = String::new();
    for (i, leader) in leaders.iter().enumerate() {
        let description = leader
            .editorial_summary
            .as_deref()
            .unwrap_or("No description.");
        let price = leader.price_level.as_deref().unwrap_or("N/A");
        let reviews: Vec<&str> = leader.review_texts().take(3).collect();
        out.push_str(&format!(
            "[LEADER {}]\nName: {}\nRating: {} ({} reviews)\nDescription: {}\nPrice: {}\nRecent reviews: {}\n\n",
            i + 1,
            leader.name,
            leader.rating,
            leader.user_rating_count,
            description,
            price,
            reviews.join(" "),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinates, Review};

    fn place(name: &str, address: &str, rating: f64, count: u32) -> PlaceRecord {
        PlaceRecord {
            name: name.to_string(),
            formatted_address: address.to_string(),
            rating,
            user_rating_count: count,
            reviews: Vec::new(),
            location: Coordinates::default(),
            category_label: "Bakery".to_string(),
            maps_link: "#".to_string(),
            editorial_summary: None,
            price_level: None,
            website: None,
        }
    }

    fn with_reviews(mut p: PlaceRecord, texts: &[&str]) -> PlaceRecord {
        p.reviews = texts.iter().map(|t| Review { text: t.to_string() }).collect();
        p
    }

    #[test]
    fn merge_dedups_by_address_target_first() {
        let target = place("A", "123 Main St", 4.5, 10);
        let market = vec![
            place("A listed again", "123 Main St", 4.5, 10),
            place("B", "200 Oak Ave", 4.0, 5),
            place("C", "300 Pine Rd", 3.5, 8),
        ];
        let merged = merge(Some(target), market);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].name, "A");
        assert_eq!(merged[1].name, "B");
        let mut addresses: Vec<&str> =
            merged.iter().map(|m| m.formatted_address.as_str()).collect();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), 3);
    }

    #[test]
    fn merge_without_target_keeps_provider_order() {
        let market = vec![
            place("B", "200 Oak Ave", 4.0, 5),
            place("C", "300 Pine Rd", 3.5, 8),
            place("B dup", "200 Oak Ave", 4.9, 50),
        ];
        let merged = merge(None, market);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "B");
        assert_eq!(merged[1].name, "C");
    }

    #[test]
    fn merge_truncates_to_display_cap() {
        let target = place("T", "addr-target", 5.0, 1);
        let market: Vec<PlaceRecord> = (0..24)
            .map(|i| place(&format!("P{i}"), &format!("addr-{i}"), 4.0, 1))
            .collect();
        let merged = merge(Some(target), market);
        assert_eq!(merged.len(), DISPLAY_CAP);
        assert_eq!(merged[0].name, "T");
    }

    #[test]
    fn metrics_on_empty_snapshot_are_all_zero() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics, AggregateMetrics::default());
    }

    #[test]
    fn simple_average_counts_zero_rating_entries() {
        let snapshot = vec![
            place("A", "a", 4.0, 10),
            place("B", "b", 0.0, 0),
            place("C", "c", 5.0, 20),
        ];
        let metrics = compute_metrics(&snapshot);
        assert!((metrics.simple_average_rating - 3.0).abs() < 1e-9);
        assert_eq!(metrics.count, 3);
    }

    #[test]
    fn weighted_average_skips_zero_count_entries() {
        // (4.0*10 + 5.0*30) / 40 = 4.75; the zero-count 1.0 entry has no weight
        let snapshot = vec![
            place("A", "a", 4.0, 10),
            place("B", "b", 1.0, 0),
            place("C", "c", 5.0, 30),
        ];
        let metrics = compute_metrics(&snapshot);
        assert!((metrics.weighted_average_rating - 4.75).abs() < 1e-9);
        assert_eq!(metrics.total_review_count, 40);
    }

    #[test]
    fn weighted_average_zero_when_no_reviews() {
        let snapshot = vec![place("A", "a", 4.0, 0), place("B", "b", 5.0, 0)];
        let metrics = compute_metrics(&snapshot);
        assert_eq!(metrics.weighted_average_rating, 0.0);
    }

    #[test]
    fn metrics_count_sampled_review_texts() {
        let snapshot = vec![
            with_reviews(place("A", "a", 4.0, 100), &["one", "two"]),
            with_reviews(place("B", "b", 3.0, 50), &["three"]),
        ];
        let metrics = compute_metrics(&snapshot);
        assert_eq!(metrics.reviews_sampled, 3);
    }

    #[test]
    fn leaders_filter_threshold_and_rank_by_rating() {
        let market = vec![
            place("Small", "a", 4.8, 50),
            place("Mid", "b", 4.0, 150),
            place("Big", "c", 4.5, 300),
            place("Near", "d", 5.0, 90),
        ];
        let leaders = select_leaders(&market);
        assert_eq!(leaders.len(), 2);
        assert_eq!(leaders[0].name, "Big");
        assert_eq!(leaders[1].name, "Mid");
    }

    #[test]
    fn leader_ties_keep_provider_order() {
        let market = vec![
            place("First", "a", 4.5, 200),
            place("Second", "b", 4.5, 400),
            place("Third", "c", 4.5, 100),
            place("Fourth", "d", 4.5, 999),
        ];
        let leaders = select_leaders(&market);
        assert_eq!(leaders.len(), LEADER_CAP);
        assert_eq!(leaders[0].name, "First");
        assert_eq!(leaders[1].name, "Second");
        assert_eq!(leaders[2].name, "Third");
    }

    #[test]
    fn no_leaders_when_none_consolidated() {
        let market = vec![place("A", "a", 5.0, 99), place("B", "b", 4.9, 12)];
        assert!(select_leaders(&market).is_empty());
        assert_eq!(leaders_text(&[]), "No consolidated leaders.");
    }

    #[test]
    fn market_text_excludes_target_and_reviewless_entries() {
        let snapshot = vec![
            with_reviews(place("Mine", "a", 4.0, 10), &["own review"]),
            with_reviews(place("Rival", "b", 4.2, 20), &["good", "bad"]),
            place("Silent", "c", 3.0, 5),
        ];
        let text = market_text(&snapshot, Some("Mine"));
        assert!(!text.contains("own review"));
        assert!(text.contains("COMPETITOR (Rival): good bad"));
        assert!(!text.contains("Silent"));
    }

    #[test]
    fn leaders_text_includes_profile_fields() {
        let mut leader = with_reviews(place("Big", "c", 4.5, 300), &["r1", "r2", "r3", "r4"]);
        leader.editorial_summary = Some("Local favorite".to_string());
        leader.price_level = Some("PRICE_LEVEL_EXPENSIVE".to_string());
        let text = leaders_text(&[leader]);
        assert!(text.contains("[LEADER 1]"));
        assert!(text.contains("Rating: 4.5 (300 reviews)"));
        assert!(text.contains("Local favorite"));
        // only the first 3 review texts feed the prompt
        assert!(text.contains("r1 r2 r3"));
        assert!(!text.contains("r4"));
    }
}
