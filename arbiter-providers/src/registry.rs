//! Declarative provider registry
//!
//! Each provider is one static row: quality tier, env vars for endpoint and
//! credential, URL composition and auth header style. A provider whose base
//! URL env is unset is "not configured" and the fan-out yields a `Skipped`
//! envelope for it instead of issuing a request.

use std::collections::HashMap;

use arbiter_core::Tier;

use crate::fetch::RetryPolicy;

/// The shared query-string parameters every provider URL is composed from.
/// Absent fields are omitted from the query string.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub statistic: Option<String>,
    pub match_id: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    /// ISO date (YYYY-MM-DD)
    pub date: Option<String>,
    pub competition: Option<String>,
    pub team: Option<String>,
    pub player: Option<String>,
    pub period: Option<String>,
}

impl QueryParams {
    /// Render as `key=value&…` in a fixed key order, values URL-encoded.
    pub fn to_query_string(&self) -> String {
        let fields: [(&str, &Option<String>); 9] = [
            ("statistic", &self.statistic),
            ("matchId", &self.match_id),
            ("homeTeam", &self.home_team),
            ("awayTeam", &self.away_team),
            ("date", &self.date),
            ("competition", &self.competition),
            ("team", &self.team),
            ("player", &self.player),
            ("period", &self.period),
        ];

        fields
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| format!("{}={}", key, urlencoding::encode(v)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// How a provider expects its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — the default when a key exists.
    Bearer,
    /// Key in a provider-specific header, e.g. `x-apisports-key`.
    Header(&'static str),
    /// Key appended to the query string, e.g. `apiKey=<key>`.
    QueryParam(&'static str),
}

/// One registered provider.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    /// Stable provider id used in evidence and consensus accounting.
    pub key: &'static str,
    pub name: &'static str,
    pub tier: Tier,
    pub base_url_env: &'static str,
    pub api_key_env: Option<&'static str>,
    /// Provider-specific path the shared query string is appended to.
    pub path: &'static str,
    pub auth: AuthStyle,
    /// Per-provider retry override; `None` means the default policy.
    pub retry: Option<RetryPolicy>,
}

impl ProviderSpec {
    /// Advisory weight from the tier table.
    pub fn weight(&self) -> f64 {
        self.tier.weight()
    }

    /// Configured endpoint, if any.
    pub fn base_url(&self) -> Option<String> {
        std::env::var(self.base_url_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Configured credential, if any.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .and_then(|env| std::env::var(env).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_default()
    }

    /// Compose the full request URL from the configured base and the shared
    /// query parameters.
    pub fn compose_url(&self, base_url: &str, params: &QueryParams) -> String {
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), self.path);
        let mut query = params.to_query_string();

        if let AuthStyle::QueryParam(param) = self.auth {
            if let Some(key) = self.api_key() {
                let pair = format!("{}={}", param, urlencoding::encode(&key));
                if query.is_empty() {
                    query = pair;
                } else {
                    query = format!("{}&{}", query, pair);
                }
            }
        }

        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// Request headers for this provider. Default auth is a bearer token
    /// when a key exists; header-style providers put the key in their own
    /// header; query-param providers send no auth header at all.
    pub fn build_headers(&self, api_key: Option<&str>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(key) = api_key {
            match self.auth {
                AuthStyle::Bearer => {
                    headers.insert("Authorization".to_string(), format!("Bearer {}", key));
                }
                AuthStyle::Header(name) => {
                    headers.insert(name.to_string(), key.to_string());
                }
                AuthStyle::QueryParam(_) => {}
            }
        }
        headers
    }
}

/// Providers consulted for outcome (who-won / scoreline / award) queries.
pub fn outcome_providers() -> &'static [ProviderSpec] {
    const PROVIDERS: &[ProviderSpec] = &[
        ProviderSpec {
            key: "THESPORTSDB",
            name: "TheSportsDB",
            tier: Tier::Aggregator,
            base_url_env: "THESPORTSDB_BASE_URL",
            api_key_env: Some("THESPORTSDB_API_KEY"),
            path: "/events",
            auth: AuthStyle::Bearer,
            retry: None,
        },
        ProviderSpec {
            key: "API_FOOTBALL",
            name: "API-Sports Football",
            tier: Tier::Industry,
            base_url_env: "API_FOOTBALL_BASE_URL",
            api_key_env: Some("API_FOOTBALL_API_KEY"),
            path: "/fixtures",
            auth: AuthStyle::Header("x-apisports-key"),
            retry: None,
        },
        ProviderSpec {
            key: "API_BASKETBALL",
            name: "API-Sports Basketball",
            tier: Tier::Industry,
            base_url_env: "API_BASKETBALL_BASE_URL",
            api_key_env: Some("API_BASKETBALL_API_KEY"),
            path: "/games",
            auth: AuthStyle::Header("x-apisports-key"),
            retry: None,
        },
        ProviderSpec {
            key: "THE_ODDS_API",
            name: "The Odds API",
            tier: Tier::Industry,
            base_url_env: "THE_ODDS_API_BASE_URL",
            api_key_env: Some("THE_ODDS_API_KEY"),
            path: "/scores",
            auth: AuthStyle::QueryParam("apiKey"),
            retry: None,
        },
    ];
    PROVIDERS
}

/// Providers consulted for statistic queries.
pub fn statistic_providers() -> &'static [ProviderSpec] {
    const PROVIDERS: &[ProviderSpec] = &[
        ProviderSpec {
            key: "OFFICIAL_LEAGUE",
            name: "Official League Feed",
            tier: Tier::Official,
            base_url_env: "OFFICIAL_LEAGUE_BASE_URL",
            api_key_env: Some("OFFICIAL_LEAGUE_API_KEY"),
            path: "/match-statistics",
            auth: AuthStyle::Bearer,
            retry: None,
        },
        ProviderSpec {
            key: "OPTA_STATS",
            name: "Opta",
            tier: Tier::Official,
            base_url_env: "OPTA_STATS_BASE_URL",
            api_key_env: Some("OPTA_STATS_API_KEY"),
            path: "/statistics",
            auth: AuthStyle::Bearer,
            retry: None,
        },
        ProviderSpec {
            key: "STATSBOMB",
            name: "StatsBomb",
            tier: Tier::Official,
            base_url_env: "STATSBOMB_BASE_URL",
            api_key_env: Some("STATSBOMB_API_KEY"),
            path: "/statistics",
            auth: AuthStyle::Bearer,
            retry: None,
        },
        ProviderSpec {
            key: "SPORTSRADAR",
            name: "Sportradar",
            tier: Tier::Industry,
            base_url_env: "SPORTSRADAR_BASE_URL",
            api_key_env: Some("SPORTSRADAR_API_KEY"),
            path: "/statistics",
            auth: AuthStyle::QueryParam("api_key"),
            retry: None,
        },
        ProviderSpec {
            key: "API_FOOTBALL",
            name: "API-Sports Football",
            tier: Tier::Industry,
            base_url_env: "API_FOOTBALL_BASE_URL",
            api_key_env: Some("API_FOOTBALL_API_KEY"),
            path: "/fixtures/statistics",
            auth: AuthStyle::Header("x-apisports-key"),
            retry: None,
        },
        ProviderSpec {
            key: "THE_ODDS_API",
            name: "The Odds API",
            tier: Tier::Industry,
            base_url_env: "THE_ODDS_API_BASE_URL",
            api_key_env: Some("THE_ODDS_API_KEY"),
            path: "/odds",
            auth: AuthStyle::QueryParam("apiKey"),
            retry: None,
        },
        ProviderSpec {
            key: "FLASHSCORE",
            name: "Flashscore",
            tier: Tier::Media,
            base_url_env: "FLASHSCORE_BASE_URL",
            api_key_env: Some("FLASHSCORE_API_KEY"),
            path: "/match/stats",
            auth: AuthStyle::Bearer,
            // Flashscore rate-limits aggressively; one retry is enough.
            retry: Some(RetryPolicy {
                retries: 1,
                initial_delay: std::time::Duration::from_millis(300),
                factor: 2,
            }),
        },
        ProviderSpec {
            key: "SOFASCORE",
            name: "Sofascore",
            tier: Tier::Media,
            base_url_env: "SOFASCORE_BASE_URL",
            api_key_env: Some("SOFASCORE_API_KEY"),
            path: "/statistics",
            auth: AuthStyle::Bearer,
            retry: None,
        },
        ProviderSpec {
            key: "THESPORTSDB",
            name: "TheSportsDB",
            tier: Tier::Aggregator,
            base_url_env: "THESPORTSDB_BASE_URL",
            api_key_env: Some("THESPORTSDB_API_KEY"),
            path: "/lookupstats",
            auth: AuthStyle::Bearer,
            retry: None,
        },
    ];
    PROVIDERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_omits_absent_fields() {
        let params = QueryParams {
            statistic: Some("yellow_cards".into()),
            home_team: Some("Arsenal".into()),
            away_team: Some("Chelsea".into()),
            date: Some("2024-11-05".into()),
            ..Default::default()
        };
        assert_eq!(
            params.to_query_string(),
            "statistic=yellow_cards&homeTeam=Arsenal&awayTeam=Chelsea&date=2024-11-05"
        );
    }

    #[test]
    fn test_query_string_encodes_values() {
        let params = QueryParams {
            team: Some("Real Madrid".into()),
            ..Default::default()
        };
        assert_eq!(params.to_query_string(), "team=Real%20Madrid");
    }

    #[test]
    fn test_compose_url_trims_trailing_slash() {
        let spec = &outcome_providers()[0];
        let url = spec.compose_url(
            "https://sportsdb.example.com/",
            &QueryParams {
                date: Some("2025-01-15".into()),
                ..Default::default()
            },
        );
        assert_eq!(url, "https://sportsdb.example.com/events?date=2025-01-15");
    }

    #[test]
    fn test_default_auth_is_bearer() {
        let spec = &statistic_providers()[0];
        let headers = spec.build_headers(Some("secret"));
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer secret");
    }

    #[test]
    fn test_header_auth_style() {
        let spec = outcome_providers()
            .iter()
            .find(|s| s.key == "API_FOOTBALL")
            .unwrap();
        let headers = spec.build_headers(Some("secret"));
        assert_eq!(headers.get("x-apisports-key").unwrap(), "secret");
        assert!(!headers.contains_key("Authorization"));
    }

    #[test]
    fn test_no_key_means_no_auth_header() {
        let spec = &statistic_providers()[0];
        assert!(spec.build_headers(None).is_empty());
    }
}
