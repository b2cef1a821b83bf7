use crate::types::{Coordinates, PlaceCandidate, PlaceRecord, Review};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const SEARCH_TEXT_URL: &str = "https://places.googleapis.com/v1/places:searchText";

// Field masks are request-scoped: candidate search and address validation ask
// for narrow subsets, market/detail fetches ask for the full record.
const CANDIDATE_FIELDS: &str = "places.displayName,places.formattedAddress";
const ADDRESS_FIELDS: &str = "places.formattedAddress,places.location";
const DETAIL_FIELDS: &str = "places.displayName,places.formattedAddress,places.rating,\
places.userRatingCount,places.reviews,places.primaryTypeDisplayName,places.googleMapsUri,\
places.location,places.editorialSummary,places.priceLevel,places.websiteUri";

/// Provider page cap for a market fetch
pub const MARKET_PAGE_SIZE: u8 = 20;
const CANDIDATE_PAGE_SIZE: u8 = 5;
const FALLBACK_CATEGORY: &str = "Local business";

/// Failure taxonomy for the places provider. A zero-result response is NOT an
/// error: callers get an empty list/None and can tell it apart from these.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("places request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("places API {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("places response decode: {0}")]
    Decode(#[from] serde_json::Error),
}

// ── Wire format ──

#[derive(Serialize)]
struct SearchRequest<'a> {
    #[serde(rename = "textQuery")]
    text_query: &'a str,
    #[serde(rename = "pageSize")]
    page_size: u8,
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    #[serde(rename = "locationBias", skip_serializing_if = "Option::is_none")]
    location_bias: Option<LocationBias>,
}

#[derive(Serialize)]
struct LocationBias {
    circle: BiasCircle,
}

#[derive(Serialize)]
struct BiasCircle {
    center: WireLatLngOut,
    radius: f64,
}

#[derive(Serialize)]
struct WireLatLngOut {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<WirePlace>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WirePlace {
    #[serde(rename = "displayName")]
    display_name: Option<WireText>,
    #[serde(rename = "formattedAddress")]
    formatted_address: Option<String>,
    rating: Option<f64>,
    #[serde(rename = "userRatingCount")]
    user_rating_count: Option<u32>,
    reviews: Vec<WireReview>,
    #[serde(rename = "primaryTypeDisplayName")]
    primary_type: Option<WireText>,
    #[serde(rename = "googleMapsUri")]
    maps_uri: Option<String>,
    location: Option<WireLatLng>,
    #[serde(rename = "editorialSummary")]
    editorial_summary: Option<WireText>,
    #[serde(rename = "priceLevel")]
    price_level: Option<String>,
    #[serde(rename = "websiteUri")]
    website_uri: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireText {
    text: Option<String>,
}

impl WireText {
    fn into_text(self) -> Option<String> {
        self.text
    }
}

#[derive(Deserialize, Default)]
struct WireReview {
    text: Option<WireText>,
}

#[derive(Deserialize, Default)]
struct WireLatLng {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl WirePlace {
    fn category_label(&self) -> String {
        self.primary_type
            .as_ref()
            .and_then(|t| t.text.clone())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }

    fn into_record(self) -> PlaceRecord {
        let category_label = self.category_label();
        let location = self
            .location
            .map(|l| Coordinates {
                lat: l.latitude.unwrap_or(0.0),
                lng: l.longitude.unwrap_or(0.0),
            })
            .unwrap_or_default();
        let reviews = self
            .reviews
            .into_iter()
            .filter_map(|r| r.text.and_then(WireText::into_text))
            .filter(|t| !t.is_empty())
            .map(|text| Review { text })
            .collect();

        PlaceRecord {
            name: self
                .display_name
                .and_then(WireText::into_text)
                .unwrap_or_default(),
            formatted_address: self.formatted_address.unwrap_or_default(),
            rating: self.rating.unwrap_or(0.0),
            user_rating_count: self.user_rating_count.unwrap_or(0),
            reviews,
            location,
            category_label,
            maps_link: self.maps_uri.unwrap_or_else(|| "#".to_string()),
            editorial_summary: self.editorial_summary.and_then(WireText::into_text),
            price_level: self.price_level,
            website: self.website_uri,
        }
    }
}

// ── Client ──

/// Places text-search client. One outbound POST per call, no retries.
pub struct PlacesClient {
    api_key: String,
    language: String,
    client: reqwest::Client,
}

impl PlacesClient {
    pub fn new(api_key: &str, language: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            language: language.to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("HTTP client"),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(
        &self,
        body: &SearchRequest<'_>,
        field_mask: &str,
    ) -> Result<Vec<WirePlace>, ProviderError> {
        let resp = self
            .client
            .post(SEARCH_TEXT_URL)
            .header("Content-Type", "application/json")
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", field_mask)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status,
                body: body.chars().take(300).collect(),
            });
        }

        let text = resp.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&text)?;
        debug!("places search: {} result(s)", parsed.places.len());
        Ok(parsed.places)
    }

    /// Business-name search: up to 5 candidates, name + address only.
    pub async fn resolve_by_name(
        &self,
        query: &str,
    ) -> Result<Vec<PlaceCandidate>, ProviderError> {
        let body = SearchRequest {
            text_query: query,
            page_size: CANDIDATE_PAGE_SIZE,
            language_code: &self.language,
            location_bias: None,
        };
        let places = self.search(&body, CANDIDATE_FIELDS).await?;
        Ok(places
            .into_iter()
            .map(|p| PlaceCandidate {
                name: p
                    .display_name
                    .and_then(WireText::into_text)
                    .unwrap_or_default(),
                formatted_address: p.formatted_address.unwrap_or_default(),
            })
            .collect())
    }

    /// Address validation: single best match with coordinates, or None.
    pub async fn resolve_by_address(
        &self,
        text: &str,
    ) -> Result<Option<PlaceRecord>, ProviderError> {
        let body = SearchRequest {
            text_query: text,
            page_size: 1,
            language_code: &self.language,
            location_bias: None,
        };
        let places = self.search(&body, ADDRESS_FIELDS).await?;
        Ok(places.into_iter().next().map(WirePlace::into_record))
    }

    /// Market fetch: up to 20 detailed records biased to a circle around `center`.
    pub async fn fetch_market(
        &self,
        center: Coordinates,
        category_terms: &str,
        radius_km: f64,
    ) -> Result<Vec<PlaceRecord>, ProviderError> {
        let body = SearchRequest {
            text_query: category_terms,
            page_size: MARKET_PAGE_SIZE,
            language_code: &self.language,
            location_bias: Some(LocationBias {
                circle: BiasCircle {
                    center: WireLatLngOut {
                        latitude: center.lat,
                        longitude: center.lng,
                    },
                    radius: radius_km * 1000.0,
                },
            }),
        };
        let places = self.search(&body, DETAIL_FIELDS).await?;
        Ok(places.into_iter().map(WirePlace::into_record).collect())
    }

    /// Re-resolve a selected candidate with the full field mask, detect its
    /// category label, then fetch the market centered on it.
    pub async fn fetch_target_and_market(
        &self,
        candidate: &PlaceCandidate,
        radius_km: f64,
    ) -> Result<Option<(PlaceRecord, Vec<PlaceRecord>, String)>, ProviderError> {
        let query = format!("{} {}", candidate.name, candidate.formatted_address);
        let body = SearchRequest {
            text_query: &query,
            page_size: 1,
            language_code: &self.language,
            location_bias: None,
        };
        let mut places = self.search(&body, DETAIL_FIELDS).await?;
        let Some(target_wire) = places.drain(..).next() else {
            return Ok(None);
        };

        let target = target_wire.into_record();
        let category = target.category_label.clone();
        let market = self
            .fetch_market(target.location, &category, radius_km)
            .await?;

        Ok(Some((target, market, category)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "places": [
            {
                "displayName": {"text": "Poet's Bakery"},
                "formattedAddress": "123 Main St, Springfield",
                "rating": 4.6,
                "userRatingCount": 321,
                "reviews": [
                    {"text": {"text": "Great bread"}},
                    {"text": {"text": ""}},
                    {"text": null}
                ],
                "primaryTypeDisplayName": {"text": "Bakery"},
                "googleMapsUri": "https://maps.example/abc",
                "location": {"latitude": -31.4, "longitude": -64.2},
                "editorialSummary": {"text": "Neighborhood classic"},
                "priceLevel": "PRICE_LEVEL_MODERATE",
                "websiteUri": "https://poets.example"
            },
            {
                "formattedAddress": "456 Oak Ave, Springfield"
            }
        ]
    }"#;

    #[test]
    fn decodes_full_and_sparse_places() {
        let parsed: SearchResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(parsed.places.len(), 2);

        let full = parsed.places.into_iter().next().unwrap().into_record();
        assert_eq!(full.name, "Poet's Bakery");
        assert_eq!(full.formatted_address, "123 Main St, Springfield");
        assert_eq!(full.user_rating_count, 321);
        assert_eq!(full.category_label, "Bakery");
        // empty and null review texts dropped
        assert_eq!(full.reviews.len(), 1);
        assert_eq!(full.reviews[0].text, "Great bread");
        assert!((full.location.lat - -31.4).abs() < 1e-9);
    }

    #[test]
    fn sparse_place_falls_back_to_defaults() {
        let parsed: SearchResponse = serde_json::from_str(SAMPLE).unwrap();
        let sparse = parsed.places.into_iter().nth(1).unwrap().into_record();
        assert_eq!(sparse.name, "");
        assert_eq!(sparse.rating, 0.0);
        assert_eq!(sparse.user_rating_count, 0);
        assert_eq!(sparse.category_label, FALLBACK_CATEGORY);
        assert_eq!(sparse.maps_link, "#");
        assert!(sparse.reviews.is_empty());
    }

    #[test]
    fn empty_response_is_zero_results_not_error() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.places.is_empty());
    }

    #[test]
    fn market_request_serializes_bias_circle_in_meters() {
        let body = SearchRequest {
            text_query: "Bakery",
            page_size: MARKET_PAGE_SIZE,
            language_code: "en",
            location_bias: Some(LocationBias {
                circle: BiasCircle {
                    center: WireLatLngOut { latitude: 1.5, longitude: -2.5 },
                    radius: 2.5 * 1000.0,
                },
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["pageSize"], 20);
        assert_eq!(json["locationBias"]["circle"]["radius"], 2500.0);
        assert_eq!(json["locationBias"]["circle"]["center"]["latitude"], 1.5);
    }

    #[test]
    fn candidate_request_omits_bias() {
        let body = SearchRequest {
            text_query: "Poet's Bakery",
            page_size: CANDIDATE_PAGE_SIZE,
            language_code: "en",
            location_bias: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("locationBias").is_none());
        assert_eq!(json["pageSize"], 5);
    }
}
