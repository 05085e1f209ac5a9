//! REST client for the remote biorhythm API.

use std::time::Duration;

use chrono::NaiveDate;
use common::config::DashboardConfig;
use common::{ApiInfo, BiorhythmPoint, BiorhythmSeries, CalculationAck, Error, Person};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::{replay_with_refresh, Credentials, TokenStore};
use crate::retry::{run_with_retry, RetryPolicy};

/// Async client for the biorhythm API.
///
/// Holds a pooled reqwest client with a per-call timeout, the bearer-token
/// state, and the retry policy applied to every request.
pub struct BiorhythmClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
    policy: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct PeoplePage {
    #[serde(default)]
    results: Vec<Person>,
}

impl BiorhythmClient {
    pub fn from_config(cfg: &DashboardConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let credentials = cfg.has_refresh_credentials().then(|| Credentials {
            username: cfg.api_username.clone(),
            password: cfg.api_password.clone(),
        });

        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            tokens: TokenStore::new(cfg.api_token.clone(), credentials),
            policy: RetryPolicy::from_config(cfg),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// One HTTP round trip, classified into the error taxonomy.
    async fn attempt<T: DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let mut req = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(self.tokens.bearer().await);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        // Timeouts and aborted calls land here and classify as network
        // failures, same as connection errors.
        let resp = req
            .send()
            .await
            .map_err(|e| Error::Network(format!("{method} {path}: {e}")))?;

        let status = resp.status();
        match status {
            s if s.is_success() => resp
                .json::<T>()
                .await
                .map_err(|e| Error::DataValidation(format!("{method} {path}: {e}"))),
            StatusCode::UNAUTHORIZED => Err(Error::Auth(format!("{method} {path}: 401"))),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_ms = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(retry_after_hint_ms);
                Err(Error::RateLimited { retry_after_ms })
            }
            s if s.is_client_error() => {
                let message = resp.text().await.unwrap_or_default();
                Err(Error::ClientRequest {
                    status: s.as_u16(),
                    message,
                })
            }
            s => {
                let message = resp.text().await.unwrap_or_default();
                Err(Error::Server {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }

    /// Issue a request through the retry policy, with a one-shot token
    /// refresh on 401. A second 401 after the refresh is terminal.
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        replay_with_refresh(
            || run_with_retry(&self.policy, |_| self.attempt(&method, path, query, body)),
            self.tokens.can_refresh(),
            || self.tokens.refresh(&self.http, &self.base_url),
        )
        .await
    }

    // ── Read endpoints ────────────────────────────────────────────────

    /// API identity/health record from `GET /`.
    pub async fn fetch_api_info(&self) -> Result<ApiInfo, Error> {
        self.send_json(Method::GET, "/", &[], None).await
    }

    /// Fetch a single person record.
    pub async fn fetch_person(&self, id: u64) -> Result<Person, Error> {
        self.send_json(Method::GET, &format!("/people/{id}"), &[], None)
            .await
    }

    /// Fetch the people list, optionally filtered by a search term.
    pub async fn fetch_people(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Person>, Error> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(s) = search {
            query.push(("search", s.to_string()));
        }
        if let Some(l) = limit {
            query.push(("page_size", l.to_string()));
        }
        let page: PeoplePage = self.send_json(Method::GET, "/people/", &query, None).await?;
        Ok(page.results)
    }

    /// Fetch a person's biorhythm series over an inclusive date window,
    /// capped at `limit` points. The payload is validated before it is
    /// returned; out-of-range or mis-ordered data is rejected.
    pub async fn fetch_biorhythm_series(
        &self,
        person_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
    ) -> Result<BiorhythmSeries, Error> {
        let query = vec![
            ("person_id", person_id.to_string()),
            ("start_date", start_date.format("%Y-%m-%d").to_string()),
            ("end_date", end_date.format("%Y-%m-%d").to_string()),
            ("limit", limit.to_string()),
        ];
        let points: Vec<BiorhythmPoint> = self
            .send_json(Method::GET, "/biorhythm/", &query, None)
            .await?;

        let series = BiorhythmSeries { person_id, points };
        validate_series(&series, start_date, end_date, limit)?;
        debug!(
            "Fetched {} biorhythm points for person {}",
            series.len(),
            person_id
        );
        Ok(series)
    }

    // ── Write endpoints ───────────────────────────────────────────────

    /// Trigger a remote recalculation for a person. Side-effecting: on
    /// success, previously fetched data for that person is out of date.
    pub async fn trigger_calculation(
        &self,
        person_id: u64,
        days: u32,
        notes: &str,
    ) -> Result<CalculationAck, Error> {
        let body = serde_json::json!({
            "person_id": person_id,
            "days": days,
            "notes": notes,
        });
        self.send_json(Method::POST, "/calculate", &[], Some(&body))
            .await
    }
}

/// Parse a `Retry-After` header value (whole seconds) into milliseconds,
/// saturating rather than overflowing on absurd server values.
fn retry_after_hint_ms(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

/// Reject payloads the rendering layer must never see: out-of-range cycle
/// values, mis-ordered dates, points outside the requested window, or more
/// points than the caller asked for.
fn validate_series(
    series: &BiorhythmSeries,
    start_date: NaiveDate,
    end_date: NaiveDate,
    limit: u32,
) -> Result<(), Error> {
    if series.len() > limit as usize {
        return Err(Error::DataValidation(format!(
            "got {} points, requested at most {limit}",
            series.len()
        )));
    }
    let mut prev: Option<NaiveDate> = None;
    for point in &series.points {
        if !point.in_range() {
            return Err(Error::DataValidation(format!(
                "cycle value out of range on {}",
                point.date
            )));
        }
        if point.date < start_date || point.date > end_date {
            return Err(Error::DataValidation(format!(
                "point {} outside requested window {start_date}..={end_date}",
                point.date
            )));
        }
        if let Some(prev) = prev {
            if point.date <= prev {
                return Err(Error::DataValidation(format!(
                    "dates not strictly increasing at {}",
                    point.date
                )));
            }
        }
        prev = Some(point.date);
    }
    Ok(())
}
