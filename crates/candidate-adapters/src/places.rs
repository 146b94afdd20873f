//! Place search: model-expanded queries against a Nominatim-compatible geocoder.

use std::time::Duration;

use async_trait::async_trait;
use candidate_engine::{DedupKey, Keyed, Lookup, QueryExpander};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::ChatClient;
use crate::error::{AdapterError, Result as AdapterResult};
use crate::http::{build_client, success_body};
use crate::parse::json_array;

/// Categories kept by default: places a student might actually visit.
pub const DEFAULT_PLACE_CATEGORIES: &[&str] = &["amenity", "building", "office", "leisure"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub display_name: String,
    pub category: String,
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
}

impl Keyed for Place {
    fn dedup_key(&self) -> DedupKey {
        DedupKey::from(self.place_id.as_str())
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }
}

/// One `jsonv2` search hit. Plain `json` output names the category `class`.
#[derive(Debug, Deserialize)]
struct GeocoderEntry {
    place_id: serde_json::Value,
    display_name: String,
    #[serde(alias = "class")]
    category: String,
    #[serde(rename = "type", default)]
    kind: String,
    lat: String,
    lon: String,
}

impl TryFrom<GeocoderEntry> for Place {
    type Error = AdapterError;

    fn try_from(entry: GeocoderEntry) -> Result<Self, Self::Error> {
        let place_id = match entry.place_id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            other => return Err(AdapterError::Malformed(format!("place_id {other}"))),
        };
        let coord = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| AdapterError::Malformed(format!("coordinate {raw:?}")))
        };
        Ok(Place {
            lat: coord(&entry.lat)?,
            lon: coord(&entry.lon)?,
            place_id,
            display_name: entry.display_name,
            category: entry.category,
            kind: entry.kind,
        })
    }
}

/// Parse a geocoder body, skipping entries that do not map to a [`Place`].
pub fn parse_places(body: &str) -> AdapterResult<Vec<Place>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .filter_map(|v| serde_json::from_value::<GeocoderEntry>(v).ok())
        .filter_map(|e| Place::try_from(e).ok())
        .collect())
}

/// Geocoder endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// Results requested per query
    pub limit: u32,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        GeocodingConfig {
            base_url: std::env::var("CANDIDATES_GEOCODER_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            limit: 10,
        }
    }
}

impl GeocodingConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}

pub struct GeocodingLookup {
    config: GeocodingConfig,
    http: reqwest::Client,
}

impl GeocodingLookup {
    pub fn new(config: GeocodingConfig) -> AdapterResult<Self> {
        Ok(GeocodingLookup {
            config,
            http: build_client()?,
        })
    }

    async fn search(&self, query: &str, timeout: Duration) -> AdapterResult<Vec<Place>> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let limit = self.config.limit.to_string();
        let response = self
            .http
            .get(url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", limit.as_str())])
            .timeout(timeout)
            .send()
            .await?;
        let body = success_body(response).await?;
        let places = parse_places(&body)?;
        debug!(query, hits = places.len(), "geocoder answered");
        Ok(places)
    }
}

#[async_trait]
impl Lookup<Place> for GeocodingLookup {
    async fn lookup(&self, query: &str, timeout: Duration) -> candidate_engine::Result<Vec<Place>> {
        self.search(query, timeout)
            .await
            .map_err(|e| e.into_lookup())
    }
}

const EXPANSION_PROMPT: &str = "You turn a vague request for a place into precise map \
search queries. Reply with a JSON array of short query strings and nothing else.";

/// Parse an expansion reply into non-blank queries.
pub fn parse_query_list(reply: &str) -> AdapterResult<Vec<String>> {
    let queries: Vec<String> = json_array(reply)?;
    Ok(queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect())
}

pub struct ChatQueryExpander {
    chat: ChatClient,
    max_queries: usize,
}

impl ChatQueryExpander {
    pub fn new(chat: ChatClient, max_queries: usize) -> Self {
        ChatQueryExpander {
            chat,
            max_queries: max_queries.max(1),
        }
    }
}

#[async_trait]
impl QueryExpander for ChatQueryExpander {
    async fn expand(
        &self,
        raw_query: &str,
        timeout: Duration,
    ) -> candidate_engine::Result<Vec<String>> {
        let user = format!(
            "Request: {raw_query}\nGive at most {} queries.",
            self.max_queries
        );
        let reply = self
            .chat
            .complete(EXPANSION_PROMPT, &user, timeout)
            .await
            .map_err(|e| e.into_generator())?;
        let mut queries = parse_query_list(&reply).map_err(|e| e.into_generator())?;
        queries.truncate(self.max_queries);
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSONV2_BODY: &str = r#"[
        {"place_id": 1234, "display_name": "Doe Library, Berkeley", "category": "amenity",
         "type": "library", "lat": "37.8722", "lon": "-122.2596"},
        {"place_id": 99, "display_name": "Bad coords", "category": "amenity",
         "type": "cafe", "lat": "north", "lon": "0"},
        {"place_id": "way/77", "display_name": "Student Union", "class": "building",
         "type": "university", "lat": "37.869", "lon": "-122.259"}
    ]"#;

    #[test]
    fn test_parses_jsonv2_and_class_alias() {
        let places = parse_places(JSONV2_BODY).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].place_id, "1234");
        assert_eq!(places[0].kind, "library");
        assert!((places[0].lat - 37.8722).abs() < 1e-9);
        assert_eq!(places[1].place_id, "way/77");
        assert_eq!(places[1].category, "building");
    }

    #[test]
    fn test_place_identity_is_place_id() {
        let places = parse_places(JSONV2_BODY).unwrap();
        assert_eq!(places[0].dedup_key(), DedupKey::from("1234"));
        assert_eq!(Keyed::category(&places[0]), Some("amenity"));
    }

    #[test]
    fn test_non_array_body_is_an_error() {
        assert!(parse_places(r#"{"error": "rate limited"}"#).is_err());
    }

    #[test]
    fn test_query_list_drops_blanks() {
        let queries = parse_query_list(r#"["campus library", "  ", "24h study room"]"#).unwrap();
        assert_eq!(queries, vec!["campus library", "24h study room"]);
    }

    #[tokio::test]
    async fn test_unreachable_geocoder_is_lookup_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let lookup = GeocodingLookup::new(GeocodingConfig {
            base_url: format!("http://{addr}"),
            limit: 5,
        })
        .unwrap();
        let err = lookup
            .lookup("library", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            candidate_engine::EngineError::LookupUnavailable { .. }
        ));
    }
}
