//! Rate-limited HTTP client for the Lodestone lookup API.
//!
//! Two call types: a paginated search by name within a world, and a detail
//! fetch by character id. Every HTTP request first waits for a
//! [`RateLimiter`] grant.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use lodebot_shared::{
    Character, CharacterId, LodebotError, LookupConfig, Result, SearchCandidate,
};

use crate::rate_limit::RateLimiter;
use crate::wire::{CharacterEnvelope, SearchPage};
use crate::worlds::canonical_world;

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("lodebot/", env!("CARGO_PKG_VERSION"));

/// Stateless wrapper around the two upstream operations.
#[derive(Debug, Clone)]
pub struct LookupClient {
    config: LookupConfig,
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl LookupClient {
    /// Create a client with its own limiter sized from `config`. Clones
    /// share the limiter.
    pub fn new(config: LookupConfig) -> Result<Self> {
        // No idle pooling: each call's connection closes once the call returns.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| {
                LodebotError::UpstreamUnavailable(format!("failed to build HTTP client: {e}"))
            })?;
        let limiter = Arc::new(RateLimiter::per_second(config.rate_limit_per_sec));

        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    /// Search for characters by full name within a world.
    ///
    /// Fails fast with [`LodebotError::InvalidWorld`], without any request,
    /// when `world` is not a known world. An empty result is not an error.
    #[instrument(skip_all, fields(world = %world))]
    pub async fn search_character(
        &self,
        world: &str,
        forename: &str,
        surname: &str,
    ) -> Result<Vec<SearchCandidate>> {
        let world = canonical_world(world).ok_or_else(|| LodebotError::InvalidWorld {
            world: world.to_string(),
        })?;
        let name = format!("{} {}", forename.trim(), surname.trim());

        let mut candidates = Vec::new();
        let mut page = 1;
        for _ in 0..self.config.max_search_pages {
            let mut url = self.endpoint(&["character", "search"])?;
            url.query_pairs_mut()
                .append_pair("name", &name)
                .append_pair("server", world)
                .append_pair("page", &page.to_string());

            let Some(result) = self.get_json::<SearchPage>(url).await? else {
                debug!(page, "search endpoint returned 404, treating as no results");
                break;
            };
            candidates.extend(result.results.into_iter().map(SearchCandidate::from));

            match result.pagination.page_next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        debug!(candidates = candidates.len(), "search complete");
        Ok(candidates)
    }

    /// Fetch the extended profile of a known character.
    #[instrument(skip_all, fields(character_id = %id))]
    pub async fn fetch_character_by_id(&self, id: &CharacterId) -> Result<Character> {
        let mut url = self.endpoint(&["character", id.as_str()])?;
        url.query_pairs_mut().append_pair("extended", "1");

        match self.get_json::<CharacterEnvelope>(url).await? {
            Some(envelope) => Ok(Character::from(envelope.character)),
            None => Err(LodebotError::not_found(format!(
                "no character with id {id}"
            ))),
        }
    }

    /// Build `<base_url>/<segments...>` with the API key attached.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                LodebotError::config(format!(
                    "lodestone.base_url '{}' cannot be a base URL",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        if let Some(key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("private_key", key);
        }
        Ok(url)
    }

    /// Issue one rate-limited GET and decode the body. `Ok(None)` means HTTP 404.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        // Path only: the query string carries the API key.
        let path = url.path().to_string();
        self.limiter.acquire().await;
        debug!(%path, "calling upstream");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(%path, error = %e, "upstream request failed");
            LodebotError::UpstreamUnavailable(format!("{path}: {}", e.without_url()))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(%path, %status, "upstream returned error status");
            return Err(LodebotError::UpstreamUnavailable(format!(
                "{path}: HTTP {status}"
            )));
        }

        let body = response.text().await.map_err(|e| {
            LodebotError::UpstreamUnavailable(format!("{path}: body read failed: {}", e.without_url()))
        })?;

        serde_json::from_str(&body).map(Some).map_err(|e| {
            warn!(%path, error = %e, "upstream body did not decode");
            LodebotError::UpstreamUnavailable(format!("{path}: malformed response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LookupClient {
        let config = LookupConfig::for_base_url(Url::parse(&server.uri()).unwrap());
        LookupClient::new(config).unwrap()
    }

    fn detail_body(id: u64) -> serde_json::Value {
        serde_json::json!({
            "Character": {
                "ID": id,
                "Name": "Test Character",
                "Title": null,
                "Nameday": "3rd Sun of the 4th Umbral Moon",
                "Avatar": "https://img.example/a.jpg",
                "GrandCompany": null,
                "ActiveClassJob": {"ClassID": 6, "JobID": 24, "Level": 70, "Name": "conjurer / white mage",
                                   "UnlockedState": {"ID": 24, "Name": "White Mage"}},
                "ClassJobs": [
                    {"ClassID": 6, "JobID": 24, "Level": 70, "Name": "conjurer / white mage",
                     "UnlockedState": {"ID": 24, "Name": "White Mage"}}
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_search_returns_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/character/search"))
            .and(query_param("name", "Test Character"))
            .and(query_param("server", "Gilgamesh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Pagination": {"Page": 1, "PageNext": null, "PageTotal": 1},
                "Results": [{"ID": 12345, "Name": "Test Character", "Server": "Gilgamesh"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let results = client
            .search_character("gilgamesh", "Test", "Character")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "12345");
        assert_eq!(results[0].display_name, "Test Character");
    }

    #[tokio::test]
    async fn test_search_follows_pages_in_order() {
        let server = MockServer::start().await;

        Mock::given(path("/character/search"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Pagination": {"Page": 1, "PageNext": 2, "PageTotal": 2},
                "Results": [{"ID": 1, "Name": "First"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(path("/character/search"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Pagination": {"Page": 2, "PageNext": null, "PageTotal": 2},
                "Results": [{"ID": 2, "Name": "Second"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let results = client
            .search_character("Gilgamesh", "Test", "Character")
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_search_page_cap() {
        let server = MockServer::start().await;

        Mock::given(path("/character/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Pagination": {"Page": 1, "PageNext": 2, "PageTotal": 9},
                "Results": [{"ID": 1, "Name": "Only Page"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = LookupConfig::for_base_url(Url::parse(&server.uri()).unwrap());
        config.max_search_pages = 1;
        let client = LookupClient::new(config).unwrap();
        let results = client.search_character("Odin", "Only", "Page").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_empty_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(path("/character/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Pagination": {"Page": 1, "PageNext": null, "PageTotal": 0},
                "Results": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let results = client
            .search_character("Gilgamesh", "Nobody", "Here")
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_invalid_world_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .search_character("Atlantis", "Test", "Character")
            .await
            .unwrap_err();
        assert!(matches!(err, LodebotError::InvalidWorld { .. }));
    }

    #[tokio::test]
    async fn test_fetch_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/character/12345"))
            .and(query_param("extended", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(12345)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id: CharacterId = "12345".parse().unwrap();
        let character = client.fetch_character_by_id(&id).await.unwrap();

        assert_eq!(character.id, id);
        assert_eq!(character.active_job.name, "White Mage");
        assert_eq!(character.jobs[0].class_id, 24);
        assert!(character.grand_company.is_none());
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;

        Mock::given(path("/character/99999"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "Error": true, "Message": "Character not found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_character_by_id(&"99999".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LodebotError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_upstream_unavailable() {
        let server = MockServer::start().await;

        Mock::given(path("/character/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_character_by_id(&"1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LodebotError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(path("/character/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_character_by_id(&"1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }

    #[tokio::test]
    async fn test_api_key_sent_as_query_param() {
        let server = MockServer::start().await;

        Mock::given(path("/character/7"))
            .and(query_param("private_key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(7)))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = LookupConfig::for_base_url(Url::parse(&server.uri()).unwrap());
        config.api_key = Some("secret".into());
        let client = LookupClient::new(config).unwrap();
        client
            .fetch_character_by_id(&"7".parse().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on this port once the listener is dropped.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let client = LookupClient::new(LookupConfig::for_base_url(base)).unwrap();
        let err = client
            .fetch_character_by_id(&"1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LodebotError::UpstreamUnavailable(_)));
    }
}
