use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Column-name fragments accepted as a review column, checked in order
const COLUMN_CANDIDATES: &[&str] = &["comment", "review", "opinion", "text", "feedback", "message"];

/// Extract the user's own review corpus from an uploaded CSV.
///
/// The first header containing one of the candidate fragments
/// (case-insensitive substring) wins; that column's non-empty values become
/// the corpus. No matching header yields an empty corpus, not an error.
pub fn extract_reviews<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = csv.headers().context("Read CSV headers")?.clone();
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();

    let target = COLUMN_CANDIDATES.iter().find_map(|candidate| {
        lowered.iter().position(|h| h.contains(candidate))
    });
    let Some(column) = target else {
        debug!("No review column matched among headers: {:?}", headers);
        return Ok(Vec::new());
    };

    let mut reviews = Vec::new();
    for record in csv.records() {
        let record = record.context("Read CSV record")?;
        if let Some(value) = record.get(column) {
            let value = value.trim();
            if !value.is_empty() {
                reviews.push(value.to_string());
            }
        }
    }
    Ok(reviews)
}

pub fn load_reviews(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Open review file {}", path.display()))?;
    extract_reviews(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn picks_first_matching_column_by_candidate_order() {
        // "comment" is checked before "review", despite column order
        let data = "id,customer_review,client comment\n1,too slow,loved it\n2,fine,;\n";
        let reviews = extract_reviews(data.as_bytes()).unwrap();
        assert_eq!(reviews, vec!["loved it", ";"]);
    }

    #[test]
    fn matches_case_insensitive_substring() {
        let data = "ID,Customer Feedback\n1,great place\n2,\n3,  \n4,noisy\n";
        let reviews = extract_reviews(data.as_bytes()).unwrap();
        assert_eq!(reviews, vec!["great place", "noisy"]);
    }

    #[test]
    fn no_matching_column_yields_empty_corpus() {
        let data = "id,name,rating\n1,A,5\n";
        let reviews = extract_reviews(data.as_bytes()).unwrap();
        assert!(reviews.is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "opinion_text\nbest bakery in town\ncold coffee").unwrap();
        let reviews = load_reviews(&path).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0], "best bakery in town");
    }
}
