use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Target, UserId};

/// Validation payload the client assembles from a captured mining result.
/// The verifier recomputes everything in here before crediting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePow {
    pub challenge: String,
    pub nonce: String,
    pub hash: String,
    pub points: u64,
    pub trailing_zeros: u32,
    pub prefix: String,
    #[serde(flatten)]
    pub target: Target,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub points: u64,
    pub target_total: u64,
    pub user_score: u64,
}

/// Target context pushed by the forum subsystem. Read-only to the mining
/// core; it only feeds the difficulty calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetContext {
    #[serde(flatten)]
    pub target: Target,
    pub reply_count: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyQuery {
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub user_id: UserId,
    pub score: u64,
}

// restful api

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestfulResponse<T> {
    pub code: i32,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> RestfulResponse<T> {
    pub fn success(data: T) -> Self {
        RestfulResponse {
            code: 200,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String, code: i32) -> Self {
        RestfulResponse {
            code,
            data: None,
            message: Some(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum RestfulError {
    #[error("hash does not match challenge and nonce")]
    HashMismatch,
    #[error("hash does not carry the claimed prefix")]
    PrefixMismatch,
    #[error("hash score is below the claimed points")]
    InsufficientScore,
    #[error("challenge already redeemed")]
    AlreadyRedeemed,
    #[error("target difficulty has risen since this challenge")]
    StaleDifficulty,
    #[error("target is locked until aggregate work catches up")]
    TargetLocked,
    #[error("invalid difficulty prefix")]
    InvalidPrefix,
    #[error("{0}")]
    Custom(String),
    #[error("Internal Server Error")]
    InternalServerError,
}

impl RestfulError {
    fn get_code(&self) -> i32 {
        match self {
            RestfulError::HashMismatch => -10000,
            RestfulError::PrefixMismatch => -10001,
            RestfulError::InsufficientScore => -10002,
            RestfulError::AlreadyRedeemed => -10003,
            RestfulError::StaleDifficulty => -10004,
            RestfulError::TargetLocked => -10005,
            RestfulError::InvalidPrefix => -10006,
            RestfulError::Custom(_) => -20000,
            RestfulError::InternalServerError => -30000,
        }
    }
}

impl ResponseError for RestfulError {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.get_code();
        let error = self.to_string();
        match self {
            RestfulError::InternalServerError => {
                HttpResponse::InternalServerError().json(RestfulResponse::<()>::error(error, code))
            }
            _ => HttpResponse::BadRequest().json(RestfulResponse::<()>::error(error, code)),
        }
    }
}
