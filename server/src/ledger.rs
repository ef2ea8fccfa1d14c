use std::collections::{HashMap, HashSet};

use actix::{Actor, Context, Handler};
use shared::{
    difficulty::{self, Requirement, STANDARD},
    interaction::{TargetContext, ValidateResponse},
    pow::{pow_hash, score_for_hash, zeros_after_magic},
    timestamp,
    types::{Target, TargetType, UserId},
};
use tracing::*;

pub use messages as LedgerMessage;

struct TargetState {
    reply_count: u64,
    created_at: i64,
    total_pow: u64,
}

/// Owns every mutable fact the verifier needs: target contexts and PoW
/// totals, user scores, the redeemed `(challenge, nonce)` set and the
/// site-wide multiplier. A single mailbox makes validate-and-credit atomic.
pub struct LedgerActor {
    multiplier: f64,
    targets: HashMap<Target, TargetState>,
    scores: HashMap<UserId, u64>,
    redeemed: HashSet<(String, String)>,
}

impl LedgerActor {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier: if multiplier > 0.0 { multiplier } else { 1.0 },
            targets: Default::default(),
            scores: Default::default(),
            redeemed: Default::default(),
        }
    }

    /// What the target demands right now. Threads escalate with the
    /// context the forum has pushed; everything else sits at STANDARD.
    fn requirement_for(&self, target: &Target) -> Requirement {
        match target.target_type {
            TargetType::Thread => match self.targets.get(target) {
                Some(state) => difficulty::thread_difficulty(
                    state.reply_count,
                    state.created_at,
                    self.multiplier,
                ),
                None => STANDARD.requirement(),
            },
            _ => STANDARD.requirement(),
        }
    }
}

impl Actor for LedgerActor {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("ledger started, multiplier: {}", self.multiplier);
    }
}

impl Handler<LedgerMessage::Validate> for LedgerActor {
    type Result = Result<ValidateResponse, LedgerError>;

    fn handle(&mut self, msg: LedgerMessage::Validate, _: &mut Self::Context) -> Self::Result {
        trace!("ledger: validate");
        let payload = msg.payload;

        if !difficulty::is_valid_prefix(&payload.prefix) {
            return Err(LedgerError::InvalidPrefix);
        }

        // independent recomputation; the client is never trusted to certify
        let recomputed = pow_hash(&payload.challenge, &payload.nonce);
        if recomputed != payload.hash {
            return Err(LedgerError::HashMismatch);
        }
        if !payload.hash.starts_with(&payload.prefix) {
            return Err(LedgerError::PrefixMismatch);
        }

        let score = score_for_hash(&payload.hash);
        if score < payload.points || payload.points == 0 {
            return Err(LedgerError::InsufficientScore);
        }
        if zeros_after_magic(&payload.hash).unwrap_or(0) != payload.trailing_zeros {
            return Err(LedgerError::ClaimMismatch);
        }

        let pair = (payload.challenge.clone(), payload.nonce.clone());
        if self.redeemed.contains(&pair) {
            return Err(LedgerError::AlreadyRedeemed);
        }

        if payload.target.target_type.is_content() {
            if let Some(state) = self.targets.get(&payload.target) {
                if difficulty::is_locked(state.reply_count, state.total_pow) {
                    return Err(LedgerError::TargetLocked);
                }
            }
        }

        // a stale, easier challenge must not pay for a target whose
        // difficulty has since risen
        let required = self.requirement_for(&payload.target);
        if payload.points < required.points {
            return Err(LedgerError::StaleDifficulty);
        }

        self.redeemed.insert(pair);

        let state = self.targets.entry(payload.target.clone()).or_insert_with(|| TargetState {
            reply_count: 0,
            created_at: timestamp(),
            total_pow: 0,
        });
        state.total_pow = state.total_pow.saturating_add(payload.points);
        let target_total = state.total_pow;

        let user_score = self.scores.entry(payload.user_id.clone()).or_insert(0);
        *user_score = user_score.saturating_add(payload.points);

        info!(
            "credited {} points to {} and user {} (target total {}, user score {})",
            payload.points, payload.target, payload.user_id, target_total, user_score
        );

        Ok(ValidateResponse {
            valid: true,
            points: payload.points,
            target_total,
            user_score: *user_score,
        })
    }
}

impl Handler<LedgerMessage::UpsertTarget> for LedgerActor {
    type Result = ();

    fn handle(&mut self, msg: LedgerMessage::UpsertTarget, _: &mut Self::Context) -> Self::Result {
        trace!("ledger: upsert target");
        let TargetContext { target, reply_count, created_at } = msg.context;
        debug!("target context: {} replies {}, created {}", target, reply_count, created_at);
        self.targets
            .entry(target)
            .and_modify(|state| {
                state.reply_count = reply_count;
                state.created_at = created_at;
            })
            .or_insert_with(|| TargetState { reply_count, created_at, total_pow: 0 });
    }
}

impl Handler<LedgerMessage::PeekDifficulty> for LedgerActor {
    type Result = Result<Requirement, LedgerError>;

    fn handle(&mut self, msg: LedgerMessage::PeekDifficulty, _: &mut Self::Context) -> Self::Result {
        trace!("ledger: peek difficulty");
        Ok(self.requirement_for(&msg.target))
    }
}

impl Handler<LedgerMessage::FetchScore> for LedgerActor {
    type Result = Result<u64, LedgerError>;

    fn handle(&mut self, msg: LedgerMessage::FetchScore, _: &mut Self::Context) -> Self::Result {
        trace!("ledger: fetch score");
        Ok(self.scores.get(&msg.user_id).copied().unwrap_or(0))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("hash does not match challenge and nonce")]
    HashMismatch,
    #[error("hash does not carry the claimed prefix")]
    PrefixMismatch,
    #[error("hash score is below the claimed points")]
    InsufficientScore,
    #[error("claimed trailing zeros do not match the hash")]
    ClaimMismatch,
    #[error("challenge already redeemed")]
    AlreadyRedeemed,
    #[error("target difficulty has risen since this challenge")]
    StaleDifficulty,
    #[error("target is locked until aggregate work catches up")]
    TargetLocked,
    #[error("invalid difficulty prefix")]
    InvalidPrefix,
    #[error("Internal Server Error")]
    InternalServerError,
}

pub mod messages {
    use actix::Message;
    use shared::{
        difficulty::Requirement,
        interaction::{TargetContext, ValidatePow, ValidateResponse},
        types::{Target, UserId},
    };

    use crate::ledger::LedgerError;

    #[derive(Message)]
    #[rtype(result = "Result<ValidateResponse, LedgerError>")]
    pub struct Validate {
        pub payload: ValidatePow,
    }

    #[derive(Message)]
    #[rtype(result = "()")]
    pub struct UpsertTarget {
        pub context: TargetContext,
    }

    #[derive(Message)]
    #[rtype(result = "Result<Requirement, LedgerError>")]
    pub struct PeekDifficulty {
        pub target: Target,
    }

    #[derive(Message)]
    #[rtype(result = "Result<u64, LedgerError>")]
    pub struct FetchScore {
        pub user_id: UserId,
    }
}
