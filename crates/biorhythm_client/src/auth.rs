//! Bearer-token state and the credential-exchange refresh path.

use std::future::Future;

use common::Error;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

/// Username/password pair for the `POST /auth/token/` exchange.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Shared bearer-token state for the REST client.
#[derive(Debug)]
pub(crate) struct TokenStore {
    token: RwLock<String>,
    credentials: Option<Credentials>,
}

impl TokenStore {
    pub(crate) fn new(initial: String, credentials: Option<Credentials>) -> Self {
        Self {
            token: RwLock::new(initial),
            credentials,
        }
    }

    pub(crate) async fn bearer(&self) -> String {
        self.token.read().await.clone()
    }

    pub(crate) fn can_refresh(&self) -> bool {
        self.credentials.is_some()
    }

    /// Exchange the configured credentials for a fresh token and store it.
    pub(crate) async fn refresh(
        &self,
        http: &reqwest::Client,
        base_url: &str,
    ) -> Result<(), Error> {
        let Some(creds) = &self.credentials else {
            return Err(Error::Auth("no refresh credentials configured".into()));
        };

        let url = format!("{base_url}/auth/token/");
        let resp = http
            .post(&url)
            .json(&serde_json::json!({
                "username": creds.username,
                "password": creds.password,
            }))
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token exchange failed: {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token exchange returned {status}: {body}"
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("token exchange parse error: {e}")))?;
        *self.token.write().await = body.token;
        debug!("Refreshed API token");
        Ok(())
    }
}

/// Run `op`; on an auth failure, refresh the token exactly once via
/// `refresh` and replay. A second auth failure is terminal, as is a
/// failed refresh. Non-auth errors pass through untouched.
pub(crate) async fn replay_with_refresh<T, F, Fut, R, RFut>(
    mut op: F,
    can_refresh: bool,
    refresh: R,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<(), Error>>,
{
    match op().await {
        Err(Error::Auth(_)) if can_refresh => {
            debug!("Auth failure; refreshing token and replaying");
            refresh().await?;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn auth_err() -> Error {
        Error::Auth("401".into())
    }

    #[tokio::test]
    async fn refresh_replays_once_after_auth_failure() {
        let ops = AtomicU32::new(0);
        let refreshes = AtomicU32::new(0);

        let result = replay_with_refresh(
            || {
                let n = ops.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(auth_err())
                    } else {
                        Ok(7)
                    }
                }
            },
            true,
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(ops.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_auth_failure_is_terminal() {
        let ops = AtomicU32::new(0);
        let refreshes = AtomicU32::new(0);

        let result: Result<(), Error> = replay_with_refresh(
            || {
                ops.fetch_add(1, Ordering::SeqCst);
                async { Err(auth_err()) }
            },
            true,
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Auth(_))));
        // Exactly one refresh, exactly one replay.
        assert_eq!(ops.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_credentials_means_no_refresh() {
        let refreshes = AtomicU32::new(0);

        let result: Result<(), Error> = replay_with_refresh(
            || async { Err(auth_err()) },
            false,
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_without_replay() {
        let ops = AtomicU32::new(0);

        let result: Result<(), Error> = replay_with_refresh(
            || {
                ops.fetch_add(1, Ordering::SeqCst);
                async { Err(auth_err()) }
            },
            true,
            || async { Err(Error::Auth("token exchange returned 403".into())) },
        )
        .await;

        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(ops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_auth_errors_never_trigger_refresh() {
        let refreshes = AtomicU32::new(0);

        let result: Result<(), Error> = replay_with_refresh(
            || async { Err(Error::Network("connection reset".into())) },
            true,
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }
}
