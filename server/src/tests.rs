use std::sync::Arc;

use actix::Actor;
use actix_web::{test, web, App};
use shared::{
    interaction::{RestfulResponse, TargetContext, ValidatePow, ValidateResponse},
    pow::{pow_hash, score_for_hash, zeros_after_magic, Challenge},
    timestamp,
    types::{Target, TargetId, TargetType, UserId},
};

use crate::{
    ledger::{LedgerActor, LedgerError, LedgerMessage},
    restful::RESTful,
    routes,
};

fn thread_target(id: &str) -> Target {
    Target::new(TargetType::Thread, Some(TargetId(id.to_string())))
}

/// Brute-force a nonce whose hash starts with `prefix`. Only used with the
/// cheapest prefixes; a test finishes in a few tens of milliseconds.
fn mine(challenge: &str, prefix: &str) -> (String, String) {
    let mut nonce = 0u64;
    loop {
        let nonce_str = nonce.to_string();
        let hash = pow_hash(challenge, &nonce_str);
        if hash.starts_with(prefix) {
            return (nonce_str, hash);
        }
        nonce += 1;
    }
}

fn standard_payload(challenge: &Challenge, target: Target, user: &str) -> ValidatePow {
    let (nonce, hash) = mine(challenge.as_str(), "21e8");
    ValidatePow {
        challenge: challenge.as_str().to_string(),
        nonce,
        // claim the STANDARD minimum even when the hash luckily scores more
        points: 15,
        trailing_zeros: zeros_after_magic(&hash).unwrap_or(0),
        prefix: "21e8".to_string(),
        hash,
        target,
        user_id: UserId(user.to_string()),
    }
}

#[actix_rt::test]
async fn valid_proof_credits_and_replay_is_rejected() {
    let ledger = LedgerActor::new(1.0).start();
    let payload = standard_payload(&Challenge::generate(), thread_target("t-1"), "alice");

    let first = ledger
        .send(LedgerMessage::Validate { payload: payload.clone() })
        .await
        .unwrap()
        .expect("fresh proof must validate");
    assert!(first.valid);
    assert_eq!(first.points, 15);
    assert_eq!(first.target_total, 15);
    assert_eq!(first.user_score, 15);

    // same (challenge, nonce) pair a second time: no side effects
    let second = ledger.send(LedgerMessage::Validate { payload }).await.unwrap();
    assert!(matches!(second, Err(LedgerError::AlreadyRedeemed)));

    // a fresh proof still credits on top of the previous total
    let next = standard_payload(&Challenge::generate(), thread_target("t-1"), "alice");
    let third = ledger.send(LedgerMessage::Validate { payload: next }).await.unwrap().unwrap();
    assert_eq!(third.target_total, 30);
    assert_eq!(third.user_score, 30);
}

#[actix_rt::test]
async fn forged_claims_are_rejected() {
    let ledger = LedgerActor::new(1.0).start();
    let challenge = Challenge::generate();

    let mut tampered = standard_payload(&challenge, thread_target("t-1"), "mallory");
    tampered.hash = "21e8".to_string() + &"f".repeat(60);
    let res = ledger.send(LedgerMessage::Validate { payload: tampered }).await.unwrap();
    assert!(matches!(res, Err(LedgerError::HashMismatch)));

    // claiming more points than the hash earns
    let mut inflated = standard_payload(&challenge, thread_target("t-1"), "mallory");
    inflated.points = inflated.points * 4u64.pow(1 + inflated.trailing_zeros);
    let res = ledger.send(LedgerMessage::Validate { payload: inflated }).await.unwrap();
    assert!(matches!(res, Err(LedgerError::InsufficientScore)));

    let mut bad_prefix = standard_payload(&challenge, thread_target("t-1"), "mallory");
    bad_prefix.prefix = "21e7".to_string();
    let res = ledger.send(LedgerMessage::Validate { payload: bad_prefix }).await.unwrap();
    assert!(matches!(res, Err(LedgerError::InvalidPrefix)));
}

#[actix_rt::test]
async fn stale_easier_proofs_are_rejected_once_difficulty_rises() {
    let ledger = LedgerActor::new(1.0).start();
    let target = thread_target("busy");

    // 15 replies: the thread now requires HARD (60 points)
    ledger
        .send(LedgerMessage::UpsertTarget {
            context: TargetContext { target: target.clone(), reply_count: 15, created_at: timestamp() },
        })
        .await
        .unwrap();

    let requirement =
        ledger.send(LedgerMessage::PeekDifficulty { target: target.clone() }).await.unwrap().unwrap();
    assert_eq!(requirement.points, 60);

    let stale = standard_payload(&Challenge::generate(), target, "alice");
    let res = ledger.send(LedgerMessage::Validate { payload: stale }).await.unwrap();
    assert!(matches!(res, Err(LedgerError::StaleDifficulty)));
}

#[actix_rt::test]
async fn locked_threads_reject_mining_until_work_catches_up() {
    let ledger = LedgerActor::new(1.0).start();
    let target = thread_target("locked");

    // 150 replies demand 150000 aggregate PoW; the thread has none
    ledger
        .send(LedgerMessage::UpsertTarget {
            context: TargetContext { target: target.clone(), reply_count: 150, created_at: timestamp() },
        })
        .await
        .unwrap();

    let payload = standard_payload(&Challenge::generate(), target, "alice");
    let res = ledger.send(LedgerMessage::Validate { payload }).await.unwrap();
    assert!(matches!(res, Err(LedgerError::TargetLocked)));
}

#[actix_rt::test]
async fn unknown_targets_default_to_standard_difficulty() {
    let ledger = LedgerActor::new(1.0).start();
    let requirement = ledger
        .send(LedgerMessage::PeekDifficulty { target: thread_target("fresh") })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(requirement.prefix, "21e8");
    assert_eq!(requirement.points, 15);

    let score = ledger
        .send(LedgerMessage::FetchScore { user_id: UserId("nobody".to_string()) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(score, 0);
}

#[actix_rt::test]
async fn validate_route_round_trip() {
    let ledger = LedgerActor::new(1.0).start();
    let restful = Arc::new(RESTful { ledger });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(restful.clone()))
            .service(routes::validate)
            .service(routes::difficulty),
    )
    .await;

    let payload = standard_payload(&Challenge::generate(), thread_target("t-9"), "bob");
    assert!(score_for_hash(&payload.hash) >= 15);

    let req = test::TestRequest::post().uri("/api/v1/validate").set_json(&payload).to_request();
    let body: RestfulResponse<ValidateResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, 200);
    assert!(body.data.unwrap().valid);

    // the duplicate comes back as a protocol-level rejection
    let req = test::TestRequest::post().uri("/api/v1/validate").set_json(&payload).to_request();
    let body: RestfulResponse<ValidateResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, -10003);
    assert!(body.data.is_none());
}
