use crate::types::{PlaceCandidate, PlaceRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Business,
    Category,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Business => write!(f, "business"),
            SearchMode::Category => write!(f, "category"),
        }
    }
}

/// Explicit per-session state, created at session start and cleared whenever
/// a new search begins. One instance per interactive session; nothing here
/// outlives the session or is shared across users.
#[derive(Debug, Default)]
pub struct SessionState {
    pub mode: Option<SearchMode>,
    pub candidates: Vec<PlaceCandidate>,
    pub validated_address: Option<PlaceRecord>,
    pub categories: Vec<String>,
}

impl SessionState {
    /// Business-mode search: store the candidate list for confirmation.
    pub fn begin_business_search(&mut self, candidates: Vec<PlaceCandidate>) {
        self.reset();
        self.mode = Some(SearchMode::Business);
        self.candidates = candidates;
    }

    /// Category-mode search: store the validated center and chosen categories.
    pub fn begin_category_search(&mut self, validated: PlaceRecord, categories: Vec<String>) {
        self.reset();
        self.mode = Some(SearchMode::Category);
        self.validated_address = Some(validated);
        self.categories = categories;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_search_clears_prior_category_state() {
        let mut state = SessionState::default();
        state.begin_category_search(
            crate::types::PlaceRecord {
                name: String::new(),
                formatted_address: "Somewhere 1".to_string(),
                rating: 0.0,
                user_rating_count: 0,
                reviews: Vec::new(),
                location: Default::default(),
                category_label: "Bakery".to_string(),
                maps_link: "#".to_string(),
                editorial_summary: None,
                price_level: None,
                website: None,
            },
            vec!["Bakery".to_string()],
        );
        assert_eq!(state.mode, Some(SearchMode::Category));

        state.begin_business_search(vec![PlaceCandidate {
            name: "A".to_string(),
            formatted_address: "123 Main St".to_string(),
        }]);
        assert_eq!(state.mode, Some(SearchMode::Business));
        assert!(state.validated_address.is_none());
        assert!(state.categories.is_empty());
        assert_eq!(state.candidates.len(), 1);
    }
}
