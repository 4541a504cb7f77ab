//! Gamma API response types.

use crate::error::{GammaError, GammaResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A series of related recurring events (e.g. "eth-up-or-down-15m").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Series {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub series_type: String,
    pub recurrence: String,
    pub active: bool,
    pub volume24hr: f64,
    pub liquidity: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

/// A prediction market event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub active: bool,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// When trading actually opens, when the API provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub volume24hr: f64,
    pub liquidity: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markets: Vec<Market>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// A tag on an event or market.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub id: String,
    pub label: String,
    pub slug: String,
}

/// A tradeable market descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub condition_id: String,
    pub slug: String,
    pub active: bool,
    pub closed: bool,
    pub liquidity_num: f64,
    pub volume24hr: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// JSON array encoded as a string; decode via [`Market::parse_token_ids`].
    pub clob_token_ids: String,
    /// JSON array encoded as a string.
    pub outcome_prices: String,
    /// JSON array encoded as a string.
    pub outcomes: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

impl Market {
    /// Decode the `clobTokenIds` string into a list of token ids.
    pub fn parse_token_ids(&self) -> GammaResult<Vec<String>> {
        if self.clob_token_ids.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.clob_token_ids).map_err(GammaError::TokenIds)
    }
}

/// Query parameters for Gamma list endpoints.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub active: Option<bool>,
    pub closed: Option<bool>,
    pub tag_slug: Option<String>,
    pub slug: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Filter {
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(active) = self.active {
            query.push(("active", active.to_string()));
        }
        if let Some(closed) = self.closed {
            query.push(("closed", closed.to_string()));
        }
        if let Some(tag_slug) = &self.tag_slug {
            query.push(("tag_slug", tag_slug.clone()));
        }
        if let Some(slug) = &self.slug {
            query.push(("slug", slug.clone()));
        }
        if self.limit > 0 {
            query.push(("_limit", self.limit.to_string()));
        }
        if self.offset > 0 {
            query.push(("_offset", self.offset.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_ids() {
        let cases: &[(&str, &str, Option<Vec<&str>>)] = &[
            ("valid tokens", r#"["token1", "token2"]"#, Some(vec!["token1", "token2"])),
            ("empty string", "", Some(vec![])),
            ("empty array", "[]", Some(vec![])),
            ("invalid json", "[invalid", None),
            (
                "single token",
                r#"["83955612885151370769947492812886282601680164705864046042194488203730621200472"]"#,
                Some(vec![
                    "83955612885151370769947492812886282601680164705864046042194488203730621200472",
                ]),
            ),
        ];

        for (name, input, want) in cases {
            let market = Market {
                clob_token_ids: input.to_string(),
                ..Default::default()
            };
            match (market.parse_token_ids(), want) {
                (Ok(got), Some(want)) => assert_eq!(&got, want, "{name}"),
                (Err(_), None) => {}
                (got, want) => panic!("{name}: got {got:?}, want {want:?}"),
            }
        }
    }

    #[test]
    fn test_market_deserializes_gamma_field_names() {
        let market: Market = serde_json::from_str(
            r#"{
                "id": "514061",
                "question": "Ethereum Up or Down?",
                "conditionId": "0x0d88",
                "closed": false,
                "endDate": "2026-08-30T12:15:00Z",
                "clobTokenIds": "[\"token1\", \"token2\"]"
            }"#,
        )
        .unwrap();
        assert_eq!(market.condition_id, "0x0d88");
        assert!(market.end_date.is_some());
        assert_eq!(market.parse_token_ids().unwrap().len(), 2);
    }

    #[test]
    fn test_filter_query_params() {
        let filter = Filter {
            active: Some(true),
            slug: Some("eth-up-or-down-15m".to_string()),
            limit: 5,
            ..Default::default()
        };
        let query = filter.to_query();
        assert!(query.contains(&("active", "true".to_string())));
        assert!(query.contains(&("slug", "eth-up-or-down-15m".to_string())));
        assert!(query.contains(&("_limit", "5".to_string())));
        assert_eq!(query.len(), 3);
    }
}
