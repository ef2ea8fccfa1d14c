use std::{future::Future, time::Duration};

use reqwest::StatusCode;
use shared::{
    difficulty::Requirement,
    interaction::{DifficultyQuery, RestfulResponse, ScoreQuery, ScoreResponse, ValidatePow, ValidateResponse},
    types::{Target, UserId},
};
use tokio::time::sleep;
use tracing::*;

const RETRY_TIMES: u32 = 5;
const RETRY_DELAY: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// The verifier examined the proof and said no. Terminal: the caller
    /// must discard the receipt and re-mine.
    #[error("proof rejected ({code}): {message}")]
    Rejected { code: i32, message: String },
    #[error("rate limited by validator")]
    RateLimited,
    #[error("validator internal error ({0})")]
    ServerError(StatusCode),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed validator response")]
    Malformed,
}

impl ValidateError {
    /// Transient failures are retried with backoff; everything else
    /// propagates immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ValidateError::RateLimited => true,
            ValidateError::ServerError(_) => true,
            ValidateError::Network(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

async fn retry<T, F, Fut>(retry_fn: F, max_retries: u32, delay: u64) -> Result<T, ValidateError>
where
    Fut: Future<Output = Result<T, ValidateError>> + Send,
    F: Fn() -> Fut, {
    let mut retries = 0;
    loop {
        match retry_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retries < max_retries => {
                retries += 1;
                let backoff = Duration::from_millis(delay << (retries - 1));
                warn!("transient validator failure ({err}), retry {retries}/{max_retries} in {backoff:?}");
                sleep(backoff).await;
            }
            Err(err) => {
                return Err(err);
            }
        }
    }
}

/// HTTP client for the remote verifier. The engine can be trusted to
/// search but never to certify; certification always happens here, on the
/// other side of this client.
pub struct ValidatorClient {
    http: reqwest::Client,
    base: String,
}

impl ValidatorClient {
    pub fn new(host: &str) -> Self {
        Self { http: reqwest::Client::new(), base: format!("http://{host}") }
    }

    pub async fn validate(&self, payload: &ValidatePow) -> Result<ValidateResponse, ValidateError> {
        retry(|| self.post("/api/v1/validate", payload), RETRY_TIMES, RETRY_DELAY).await
    }

    pub async fn difficulty(&self, target: &Target) -> Result<Requirement, ValidateError> {
        let query = DifficultyQuery { target: target.clone() };
        retry(|| self.post("/api/v1/difficulty", &query), RETRY_TIMES, RETRY_DELAY).await
    }

    pub async fn score(&self, user_id: &UserId) -> Result<ScoreResponse, ValidateError> {
        let query = ScoreQuery { user_id: user_id.clone() };
        retry(|| self.post("/api/v1/score", &query), RETRY_TIMES, RETRY_DELAY).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ValidateError>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned, {
        let resp = self.http.post(format!("{}{}", self.base, path)).json(body).send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ValidateError::RateLimited);
        }
        if resp.status().is_server_error() {
            return Err(ValidateError::ServerError(resp.status()));
        }
        let body: RestfulResponse<T> = resp.json().await?;
        if body.code == 200 {
            return body.data.ok_or(ValidateError::Malformed);
        }
        Err(ValidateError::Rejected {
            code: body.code,
            message: body.message.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
