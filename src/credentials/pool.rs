use crate::server::metrics;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// An opaque API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "ApiKey({}***)", visible)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RotationError {
    #[error("Credential pool '{pool}' is empty")]
    EmptyPool { pool: String },

    #[error("All {pool_size} credentials in pool '{pool}' failed; last error: {last_error}")]
    Exhausted {
        pool: String,
        pool_size: usize,
        last_error: String,
    },
}

/// An ordered, non-empty list of interchangeable credentials for one provider.
#[derive(Debug, Clone)]
pub struct CredentialPool<C> {
    name: String,
    credentials: Vec<C>,
}

impl<C> CredentialPool<C> {
    /// Fails with [`RotationError::EmptyPool`] when `credentials` is empty, so
    /// a missing configuration is caught at startup rather than on first call.
    pub fn new(name: impl Into<String>, credentials: Vec<C>) -> Result<Self, RotationError> {
        let name = name.into();
        if credentials.is_empty() {
            return Err(RotationError::EmptyPool { pool: name });
        }
        Ok(Self { name, credentials })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Runs `op` with each credential of `pool` in order, starting from the first
/// one on every call, until one attempt succeeds.
///
/// Attempts are strictly sequential. When every credential fails the result is
/// [`RotationError::Exhausted`], carrying the pool size and the last error.
pub async fn rotate<'a, C, T, E, F, Fut>(
    pool: &'a CredentialPool<C>,
    mut op: F,
) -> Result<T, RotationError>
where
    F: FnMut(&'a C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut last_error = String::new();

    for (attempt, credential) in pool.credentials.iter().enumerate() {
        match op(credential).await {
            Ok(value) => {
                if attempt > 0 {
                    warn!(
                        pool = %pool.name,
                        attempt,
                        "Recovered after {} failed credential(s)",
                        attempt
                    );
                    metrics::record_credential_recovery(&pool.name);
                }
                return Ok(value);
            }
            Err(err) => {
                debug!(pool = %pool.name, attempt, error = %err, "Credential attempt failed");
                last_error = err.to_string();
            }
        }
    }

    warn!(
        pool = %pool.name,
        pool_size = pool.len(),
        "All credentials failed: {}",
        last_error
    );
    metrics::record_credential_exhaustion(&pool.name);
    Err(RotationError::Exhausted {
        pool: pool.name.clone(),
        pool_size: pool.len(),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pool(keys: &[&str]) -> CredentialPool<ApiKey> {
        CredentialPool::new("test", keys.iter().map(|k| ApiKey::new(*k)).collect()).unwrap()
    }

    #[test]
    fn empty_pool_is_rejected() {
        let err = CredentialPool::<ApiKey>::new("gemini", vec![]).unwrap_err();
        assert_eq!(
            err,
            RotationError::EmptyPool {
                pool: "gemini".to_string()
            }
        );
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("AIzaSySecretValue");
        assert_eq!(format!("{:?}", key), "ApiKey(AIza***)");
    }

    #[tokio::test]
    async fn exhausted_pool_attempts_every_credential_once() {
        let pool = make_pool(&["a", "b", "c"]);
        let mut attempts = 0;

        let result: Result<(), _> = rotate(&pool, |key: &ApiKey| {
            attempts += 1;
            let message = format!("key {} rejected", key.expose());
            async move { Err::<(), _>(message) }
        })
        .await;

        assert_eq!(attempts, 3);
        let err = result.unwrap_err();
        assert_eq!(
            err,
            RotationError::Exhausted {
                pool: "test".to_string(),
                pool_size: 3,
                last_error: "key c rejected".to_string(),
            }
        );
        assert!(err.to_string().contains("All 3 credentials"));
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let pool = make_pool(&["bad0", "bad1", "good", "unused"]);
        let mut attempts = 0;

        let result = rotate(&pool, |key: &ApiKey| {
            attempts += 1;
            let key = key.expose().to_string();
            async move {
                if key == "good" {
                    Ok(key)
                } else {
                    Err(format!("{} failed", key))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "good");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn every_call_restarts_from_first_credential() {
        let pool = make_pool(&["flaky", "good"]);
        let mut seen = Vec::new();

        for _ in 0..2 {
            let result = rotate(&pool, |key: &ApiKey| {
                seen.push(key.expose().to_string());
                let key = key.expose().to_string();
                async move {
                    if key == "good" {
                        Ok(())
                    } else {
                        Err("nope")
                    }
                }
            })
            .await;
            assert!(result.is_ok());
        }

        assert_eq!(seen, vec!["flaky", "good", "flaky", "good"]);
    }

    #[tokio::test]
    async fn first_credential_success_makes_one_attempt() {
        let pool = make_pool(&["good", "other"]);
        let mut attempts = 0;
        let result = rotate(&pool, |_key: &ApiKey| {
            attempts += 1;
            async { Ok::<_, String>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
    }
}
