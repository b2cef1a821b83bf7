use crate::analyzer::gemini::GeminiClient;
use crate::types::{PlaceRecord, TopicShare};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Character caps applied before submission, left-to-right, no smart boundary.
pub const TOPIC_TEXT_CAP: usize = 15_000;
pub const REPORT_TEXT_CAP: usize = 22_000;
pub const GAP_TEXT_CAP: usize = 10_000;
/// At most this many own reviews feed the gap prompt
pub const GAP_REVIEW_CAP: usize = 500;
const REVIEWS_PER_ITEM: usize = 5;

const SUMMARY_SYSTEM: &str = "You analyze customer reviews. For each ITEM, summarize its reviews in one sentence of at most 20 words. Output ONLY a JSON object mapping each item id to its summary, e.g. {\"ID_0\": \"...\", \"ID_1\": \"...\"}. Do not wrap in markdown code blocks.";

const TOPIC_SYSTEM: &str = "You classify customer review sentiment into exactly three buckets and allocate share-of-voice percentages:\n1. Quality (product/service quality)\n2. Value (price/value perception)\n3. Service (customer service and attention)\nOutput ONLY a JSON object: {\"Quality\": int, \"Value\": int, \"Service\": int}. Do not wrap in markdown code blocks.";

const REPORT_SYSTEM: &str = "ROLE: Senior business strategist. Decode what consumers of the given category want and define priorities based EXCLUSIVELY on the evidence read.\n\nSTYLE RULES:\n1. Professional markdown. Emojis allowed only in top-level (##) headings.\n2. Do not invent generic advice. Every recommendation must trace back to something in the reviews.\n\nREPORT STRUCTURE:\n\n## Consumer Psychology\n* What delights customers (recurring positives).\n* What irritates customers (recurring frictions).\n\n### The 3 Decision Drivers\n1. [Driver]: explanation.\n2. [Driver]: explanation.\n3. [Driver]: explanation.\n\n## Benchmarking: Lessons from the Leaders\n(Use the LEADERS data. If there is none, say so.)\n### [Business name]\n* Why it wins.\n* Price perception.\n* Key takeaway.\n\n### Niche Finding\n* One subtle detail this area values.\n\n## Priority Matrix (Evidence-Based)\n* 1. Start tomorrow: the most serious, frequent complaint in the area to fix now. Be specific.\n* 2. Prioritize in the coming weeks: the leader trait customers envy most.\n* 3. Skip for now: something owners usually consider important that nobody in these reviews mentioned.";

const GAP_SYSTEM: &str = "You are a customer-experience gap auditor. Compare market expectations against a business's own reviews.\n\nWeighting rule: <10% of reviews complaining = OK, 10-30% = WARNING, >30% = CRITICAL.\n\nOutput a markdown report:\n## Audit: Reality vs Expectation\n### 1. Compliance Matrix\n| Expectation | Performance (summary + 1 quote) | Verdict |\n| :--- | :--- | :--- |\n### 2. Analysis\n* Strength: ...\n* Improvement: ...\n### 3. Final Verdict\nAligned/Misaligned because...";

/// Clip to at most `cap` bytes without splitting a UTF-8 character.
pub fn clip(text: &str, cap: usize) -> &str {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Normalize the two structured shapes the provider emits into one object:
/// a single JSON object passes through; a sequence of single-entry objects is
/// merged left to right. Any other shape is a decode failure (None).
pub fn normalize_structured(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => {
            let mut merged = Map::new();
            for item in items {
                match item {
                    Value::Object(entries) => merged.extend(entries),
                    _ => return None,
                }
            }
            Some(merged)
        }
        _ => None,
    }
}

/// Pull the first balanced JSON object or array out of a response that may
/// carry prose or a code fence around it.
fn extract_json(text: &str) -> String {
    // Whichever delimiter opens first wins, so an array of objects is not
    // mistaken for its first element.
    let opener = match (text.find('{'), text.find('[')) {
        (Some(o), Some(a)) if a < o => Some(('[', ']', a)),
        (Some(o), _) => Some(('{', '}', o)),
        (None, Some(a)) => Some(('[', ']', a)),
        (None, None) => None,
    };
    if let Some((open, close, start)) = opener {
        let mut depth = 0;
        for (i, ch) in text[start..].char_indices() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return text[start..=start + i].to_string();
                }
            }
        }
    }
    if let Some(s) = text.find("```json") {
        let after = &text[s + 7..];
        if let Some(e) = after.find("```") {
            return after[..e].trim().to_string();
        }
    }
    text.to_string()
}

fn strip_fences(text: &str) -> String {
    text.replace("```markdown", "").replace("```", "").trim().to_string()
}

/// One-sentence AI summary per business, keyed by business name.
///
/// Transport failures propagate; an unparseable or unexpected-shape response
/// degrades to an empty map (consumers substitute a placeholder per row).
pub async fn summarize_batch(
    gemini: &GeminiClient,
    places: &[PlaceRecord],
) -> anyhow::Result<(HashMap<String, String>, Decimal)> {
    let mut prompt = String::from("Analyze the reviews and summarize each item.\n\n");
    let mut id_to_name: HashMap<String, String> = HashMap::new();
    for (i, place) in places.iter().enumerate() {
        let reviews: Vec<&str> = place.review_texts().take(REVIEWS_PER_ITEM).collect();
        let corpus = if reviews.is_empty() {
            "(no data)".to_string()
        } else {
            reviews.join(" | ")
        };
        let id = format!("ID_{i}");
        prompt.push_str(&format!("ITEM {id} ({}): {corpus}\n", place.name));
        id_to_name.insert(id, place.name.clone());
    }

    let (text, cost) = gemini.call_json(SUMMARY_SYSTEM, &prompt, 1024, 0.3).await?;

    let summaries = match parse_summaries(&text, &id_to_name) {
        Some(map) => map,
        None => {
            warn!("Summary batch returned unparseable output, degrading to empty map");
            HashMap::new()
        }
    };
    Ok((summaries, cost))
}

fn parse_summaries(
    text: &str,
    id_to_name: &HashMap<String, String>,
) -> Option<HashMap<String, String>> {
    let parsed: Value = serde_json::from_str(&extract_json(text)).ok()?;
    let object = normalize_structured(parsed)?;

    let mut summaries = HashMap::new();
    for (id, value) in object {
        let (Some(name), Some(summary)) = (id_to_name.get(&id), value.as_str()) else {
            // unknown ids and non-string values are dropped, not fatal
            continue;
        };
        summaries.insert(name.clone(), summary.to_string());
    }
    Some(summaries)
}

/// Share-of-voice classification over the fixed {Quality, Value, Service}
/// buckets. Any failure (transport, parse, or shape) yields exactly the
/// 33/33/34 split with the `degraded` flag set, never an error.
pub async fn classify_topics(
    gemini: &GeminiClient,
    market_text: &str,
    category_label: &str,
) -> (TopicShare, Decimal) {
    let prompt = format!(
        "Analyze these {category_label} reviews:\n{}\nAllocate share-of-voice percentages across the three buckets.",
        clip(market_text, TOPIC_TEXT_CAP),
    );

    let (text, cost) = match gemini.call_json(TOPIC_SYSTEM, &prompt, 256, 0.3).await {
        Ok(r) => r,
        Err(e) => {
            warn!("Topic classification call failed: {e}");
            return (TopicShare::fallback(), Decimal::ZERO);
        }
    };

    match parse_topics(&text) {
        Some(share) => (share, cost),
        None => {
            warn!("Topic classification returned an unexpected shape");
            (TopicShare::fallback(), cost)
        }
    }
}

fn parse_topics(text: &str) -> Option<TopicShare> {
    let value: Value = serde_json::from_str(&extract_json(text)).ok()?;
    let object = normalize_structured(value)?;
    let pct = |key: &str| -> Option<u32> {
        let v = object.get(key)?;
        v.as_u64()
            .or_else(|| v.as_f64().map(|f| f.round().max(0.0) as u64))
            .map(|n| n as u32)
    };
    Some(TopicShare {
        quality: pct("Quality")?,
        value: pct("Value")?,
        service: pct("Service")?,
        degraded: false,
    })
}

/// Executive market-intelligence report (free-form markdown). Failure embeds
/// an inline error line in the returned text rather than raising.
pub async fn executive_report(
    gemini: &GeminiClient,
    market_text: &str,
    leaders_text: &str,
    category_label: &str,
) -> (String, Decimal) {
    let prompt = format!(
        "CATEGORY: {category_label}\n\nDATA:\n[MARKET]: {}\n[LEADERS]: {leaders_text}",
        clip(market_text, REPORT_TEXT_CAP),
    );
    match gemini.call(REPORT_SYSTEM, &prompt, 4096, 0.15).await {
        Ok((text, cost)) => (strip_fences(&text), cost),
        Err(e) => {
            warn!("Executive report failed: {e}");
            (format!("_Market report unavailable: {e}_"), Decimal::ZERO)
        }
    }
}

/// Gap analysis: market expectations vs the user's own review corpus.
pub async fn gap_report(
    gemini: &GeminiClient,
    market_text: &str,
    own_reviews: &[String],
    category_label: &str,
) -> (String, Decimal) {
    let own: Vec<&str> = own_reviews
        .iter()
        .take(GAP_REVIEW_CAP)
        .map(String::as_str)
        .collect();
    let prompt = format!(
        "CATEGORY: {category_label}\nMARKET EXPECTATIONS:\n{}\n\nBUSINESS'S OWN REVIEWS:\n{}",
        clip(market_text, GAP_TEXT_CAP),
        own.join(" | "),
    );
    match gemini.call(GAP_SYSTEM, &prompt, 4096, 0.2).await {
        Ok((text, cost)) => (strip_fences(&text), cost),
        Err(e) => {
            warn!("Gap report failed: {e}");
            (format!("_Gap analysis unavailable: {e}_"), Decimal::ZERO)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clip_is_noop_under_cap() {
        assert_eq!(clip("hello", 100), "hello");
        assert_eq!(clip("hello", 5), "hello");
    }

    #[test]
    fn clip_truncates_left_to_right() {
        assert_eq!(clip("hello world", 5), "hello");
    }

    #[test]
    fn clip_respects_char_boundaries() {
        // 'é' is 2 bytes; cap lands mid-character
        let text = "caf\u{e9}teria";
        let clipped = clip(text, 4);
        assert_eq!(clipped, "caf");
        assert!(text.is_char_boundary(clipped.len()));
    }

    #[test]
    fn normalize_accepts_plain_object() {
        let v = json!({"a": 1, "b": 2});
        let m = normalize_structured(v).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m["a"], 1);
    }

    #[test]
    fn normalize_merges_sequence_of_single_entry_objects() {
        let v = json!([{"ID_0": "x"}, {"ID_1": "y"}]);
        let m = normalize_structured(v).unwrap();
        assert_eq!(m["ID_0"], "x");
        assert_eq!(m["ID_1"], "y");
    }

    #[test]
    fn normalize_rejects_other_shapes() {
        assert!(normalize_structured(json!("text")).is_none());
        assert!(normalize_structured(json!(42)).is_none());
        assert!(normalize_structured(json!([1, 2])).is_none());
        assert!(normalize_structured(json!([{"a": 1}, "stray"])).is_none());
    }

    #[test]
    fn extract_json_unwraps_surrounding_prose() {
        let text = "Here you go:\n{\"Quality\": 40, \"Value\": 30, \"Service\": 30}\nCheers";
        let parsed: Value = serde_json::from_str(&extract_json(text)).unwrap();
        assert_eq!(parsed["Quality"], 40);
    }

    #[test]
    fn extract_json_handles_array_payloads() {
        let text = "[{\"ID_0\": \"fine\"}]";
        let parsed: Value = serde_json::from_str(&extract_json(text)).unwrap();
        assert!(parsed.is_array());
    }

    #[test]
    fn parse_topics_reads_canonical_object() {
        let share = parse_topics(r#"{"Quality": 50, "Value": 20, "Service": 30}"#).unwrap();
        assert_eq!(share.quality, 50);
        assert_eq!(share.value, 20);
        assert_eq!(share.service, 30);
        assert!(!share.degraded);
    }

    #[test]
    fn parse_topics_accepts_list_wrapped_object() {
        let share = parse_topics(r#"[{"Quality": 10, "Value": 45, "Service": 45}]"#).unwrap();
        assert_eq!(share.value, 45);
    }

    #[test]
    fn parse_topics_rejects_missing_bucket() {
        assert!(parse_topics(r#"{"Quality": 50, "Value": 50}"#).is_none());
        assert!(parse_topics("not json at all").is_none());
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([
            ("ID_0".to_string(), "Poet's Bakery".to_string()),
            ("ID_1".to_string(), "Corner Cafe".to_string()),
        ])
    }

    #[test]
    fn parse_summaries_maps_ids_back_to_names() {
        let text = r#"{"ID_0": "Loved for fresh bread", "ID_1": "Slow but friendly"}"#;
        let map = parse_summaries(text, &names()).unwrap();
        assert_eq!(map["Poet's Bakery"], "Loved for fresh bread");
        assert_eq!(map["Corner Cafe"], "Slow but friendly");
    }

    #[test]
    fn parse_summaries_accepts_list_shape_and_drops_unknown_ids() {
        let text = r#"[{"ID_0": "Fine"}, {"ID_9": "Ghost"}]"#;
        let map = parse_summaries(text, &names()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["Poet's Bakery"], "Fine");
    }

    #[test]
    fn parse_summaries_malformed_output_is_none() {
        assert!(parse_summaries("sorry, I cannot do that", &names()).is_none());
        assert!(parse_summaries("[1, 2, 3]", &names()).is_none());
    }

    #[test]
    fn topic_fallback_is_exactly_the_fixed_split() {
        let share = TopicShare::fallback();
        assert_eq!((share.quality, share.value, share.service), (33, 33, 34));
        assert!(share.degraded);
    }

    #[test]
    fn strip_fences_removes_markdown_wrappers() {
        let text = "```markdown\n## Report\nbody\n```";
        assert_eq!(strip_fences(text), "## Report\nbody");
    }
}
