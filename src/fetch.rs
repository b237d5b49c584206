//!
//! src/fetch.rs
//!
//! Defines methods for hitting the home endpoint of the music API and
//! decoding its responses
//!

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header, redirect};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ApiConfig, HttpConfig};
use crate::types::{HomeData, SearchQuery, Song, SongKey, SubscriptionAction};
use crate::ClientError;

/// Everything the components need from the remote API
#[async_trait]
pub trait HomeApi: Send + Sync {
    /// POST home {email}
    async fn fetch_home(&self, email: &str) -> Result<HomeData, ClientError>;

    /// POST home {email, title, artist, year}; no match is an empty vec
    async fn search(&self, email: &str, query: &SearchQuery) -> Result<Vec<Song>, ClientError>;

    /// PATCH home {email, song_name, action}
    async fn update_subscription(
        &self,
        email: &str,
        key: &SongKey,
        action: SubscriptionAction
    ) -> Result<(), ClientError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ClientError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ClientError::Http(format!("build client: {e}")))
}

#[derive(Serialize)]
struct HomeBody<'a> {
    email: &'a str
}

// the server tells a search apart from a home fetch by these keys being
// present, so all three are always sent
#[derive(Serialize)]
struct SearchBody<'a> {
    email: &'a str,
    title: &'a str,
    artist: &'a str,
    year: &'a str
}

#[derive(Serialize)]
struct SubscriptionBody<'a> {
    email: &'a str,
    song_name: String,
    action: SubscriptionAction
}

const NO_RESULTS_BODY: &str = "No search results found";

#[derive(Clone, Debug)]
pub struct HomeClient {
    pub http: Client,
    pub cfg: ApiConfig
}

impl HomeClient {
    pub fn new(http_config: &HttpConfig, cfg: &ApiConfig) -> Result<Self, ClientError> {
        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    /// POST {base}/home {email}
    pub fn home_request(&self, email: &str) -> RequestBuilder {
        self.http.post(self.cfg.home_url.clone()).json(&HomeBody { email })
    }

    /// POST {base}/home {email, title, artist, year}
    pub fn search_request(&self, email: &str, query: &SearchQuery) -> RequestBuilder {
        self.http.post(self.cfg.home_url.clone()).json(&SearchBody {
            email,
            title: query.title.trim(),
            artist: query.artist.trim(),
            year: query.year.trim()
        })
    }

    /// PATCH {base}/home {email, song_name, action}
    pub fn subscription_request(
        &self,
        email: &str,
        key: &SongKey,
        action: SubscriptionAction
    ) -> RequestBuilder {
        self.http.patch(self.cfg.home_url.clone()).json(&SubscriptionBody {
            email,
            song_name: key.wire_name(),
            action
        })
    }
}

/// Turns a non-2xx response into a Status error carrying the body text
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status { status: status.as_u16(), body })
}

#[async_trait]
impl HomeApi for HomeClient {
    async fn fetch_home(&self, email: &str) -> Result<HomeData, ClientError> {
        let resp = check_status(self.home_request(email).send().await?).await?;
        let data = resp.json::<HomeData>().await?;
        debug!(songs = data.subscribed_songs.len(), "fetch.home");
        Ok(data)
    }

    async fn search(&self, email: &str, query: &SearchQuery) -> Result<Vec<Song>, ClientError> {
        let resp = self.search_request(email, query).send().await?;

        // the catalog answers an empty match with 404 and this message; any
        // other 404 (wrong stage or path) is a real error
        if resp.status() == StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            if body.contains(NO_RESULTS_BODY) {
                debug!("fetch.search.empty");
                return Ok(Vec::new());
            }
            warn!(body = %body, url = %self.cfg.home_url, "fetch.search.not_found");
            return Err(ClientError::Status { status: StatusCode::NOT_FOUND.as_u16(), body });
        }

        let resp = check_status(resp).await?;
        let songs = resp.json::<Vec<Song>>().await?;
        debug!(hits = songs.len(), "fetch.search");
        Ok(songs)
    }

    async fn update_subscription(
        &self,
        email: &str,
        key: &SongKey,
        action: SubscriptionAction
    ) -> Result<(), ClientError> {
        let resp = self.subscription_request(email, key, action).send().await?;
        check_status(resp).await?;
        debug!(song = %key, action = action.as_str(), "fetch.subscription");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::StatusCode as AxumStatus, routing::post};
    use serde_json::{Value, json};

    use super::*;

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    async fn home_post(State(seen): State<Seen>, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        seen.lock().unwrap().push(("POST".to_string(), body.clone()));
        if body.get("title").is_some() {
            if body["title"] == "nothing" {
                return (AxumStatus::NOT_FOUND, Json(json!("No search results found.")));
            }
            return (AxumStatus::OK, Json(json!([
                {"title": "X", "artist": "Y", "year": 2001, "img_url": "https://img/x.jpg"}
            ])));
        }
        if body["email"] == "missing@b.com" {
            return (AxumStatus::BAD_GATEWAY, Json(json!({"message": "Internal server error"})));
        }
        (AxumStatus::OK, Json(json!({
            "user_name": "A",
            "subscribed_songs": [{"title": "S", "artist": "T", "year": 1990, "img_url": ""}]
        })))
    }

    async fn home_patch(State(seen): State<Seen>, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        seen.lock().unwrap().push(("PATCH".to_string(), body));
        (AxumStatus::OK, Json(json!("Song added successfully.")))
    }

    async fn serve() -> (HomeClient, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/staging/home", post(home_post).patch(home_patch))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let api = ApiConfig::new(&format!("http://{addr}/staging"), "home").unwrap();
        // loopback traffic must not go through any proxy from the environment
        let http = client_helper(&HttpConfig::default()).no_proxy().build().unwrap();
        (HomeClient { http, cfg: api }, seen)
    }

    #[tokio::test]
    async fn fetch_home_decodes_user_and_songs() -> Result<(), ClientError> {
        let (client, seen) = serve().await;

        let data = client.fetch_home("a@b.com").await?;
        assert_eq!(data.user_name, "A");
        assert_eq!(data.subscribed_songs.len(), 1);
        assert_eq!(data.subscribed_songs[0].year, "1990");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1, json!({"email": "a@b.com"}));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_home_surfaces_bad_status() {
        let (client, _) = serve().await;

        let err = client.fetch_home("missing@b.com").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn search_sends_every_field() -> Result<(), ClientError> {
        let (client, seen) = serve().await;
        let query = SearchQuery { title: " X ".into(), ..Default::default() };

        let songs = client.search("a@b.com", &query).await?;
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].key(), SongKey::new("X", "Y"));

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0].1,
            json!({"email": "a@b.com", "title": "X", "artist": "", "year": ""})
        );
        Ok(())
    }

    #[tokio::test]
    async fn search_not_found_is_empty() -> Result<(), ClientError> {
        let (client, _) = serve().await;
        let query = SearchQuery { title: "nothing".into(), ..Default::default() };

        assert!(client.search("a@b.com", &query).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn search_on_wrong_path_is_an_error() {
        let (mut client, seen) = serve().await;
        let base = client.cfg.base_url.as_str().trim_end_matches('/').replace("/staging", "/prod");
        client.cfg = ApiConfig::new(&base, "home").unwrap();
        let query = SearchQuery { title: "X".into(), ..Default::default() };

        let err = client.search("a@b.com", &query).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_patch_uses_wire_name() -> Result<(), ClientError> {
        let (client, seen) = serve().await;

        client.update_subscription(
            "a@b.com",
            &SongKey::new("X", "Y"),
            SubscriptionAction::Subscribe
        ).await?;

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "PATCH");
        assert_eq!(
            seen[0].1,
            json!({"email": "a@b.com", "song_name": "X-Y", "action": "subscribe"})
        );
        Ok(())
    }
}
