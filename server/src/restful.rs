use actix::Addr;
use shared::{
    difficulty::Requirement,
    interaction::{RestfulError, ScoreResponse, TargetContext, ValidatePow, ValidateResponse},
    types::{Target, UserId},
};
use tracing::*;

use crate::ledger::{LedgerActor, LedgerError, LedgerMessage};

pub struct RESTful {
    pub ledger: Addr<LedgerActor>,
}

impl RESTful {
    pub async fn validate_pow(&self, payload: ValidatePow) -> Result<ValidateResponse, LedgerError> {
        trace!("validate pow");
        match self.ledger.send(LedgerMessage::Validate { payload }).await {
            Ok(res) => res,
            Err(err) => {
                error!("ledger mailbox error: {}", err);
                Err(LedgerError::InternalServerError)
            }
        }
    }

    pub async fn upsert_target(&self, context: TargetContext) -> Result<(), LedgerError> {
        trace!("upsert target");
        match self.ledger.send(LedgerMessage::UpsertTarget { context }).await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("ledger mailbox error: {}", err);
                Err(LedgerError::InternalServerError)
            }
        }
    }

    pub async fn peek_difficulty(&self, target: Target) -> Result<Requirement, LedgerError> {
        trace!("peek difficulty");
        match self.ledger.send(LedgerMessage::PeekDifficulty { target }).await {
            Ok(res) => res,
            Err(err) => {
                error!("ledger mailbox error: {}", err);
                Err(LedgerError::InternalServerError)
            }
        }
    }

    pub async fn fetch_score(&self, user_id: UserId) -> Result<ScoreResponse, LedgerError> {
        trace!("fetch score");
        match self.ledger.send(LedgerMessage::FetchScore { user_id: user_id.clone() }).await {
            Ok(res) => res.map(|score| ScoreResponse { user_id, score }),
            Err(err) => {
                error!("ledger mailbox error: {}", err);
                Err(LedgerError::InternalServerError)
            }
        }
    }
}

pub trait IntoRestfulError {
    fn into_restful_error(self) -> RestfulError;
}

impl IntoRestfulError for LedgerError {
    fn into_restful_error(self) -> RestfulError {
        match self {
            LedgerError::HashMismatch => RestfulError::HashMismatch,
            LedgerError::PrefixMismatch => RestfulError::PrefixMismatch,
            LedgerError::InsufficientScore => RestfulError::InsufficientScore,
            LedgerError::AlreadyRedeemed => RestfulError::AlreadyRedeemed,
            LedgerError::StaleDifficulty => RestfulError::StaleDifficulty,
            LedgerError::TargetLocked => RestfulError::TargetLocked,
            LedgerError::InvalidPrefix => RestfulError::InvalidPrefix,
            LedgerError::InternalServerError => RestfulError::InternalServerError,
            err => RestfulError::Custom(err.to_string()),
        }
    }
}
