use std::sync::Arc;

use cfg_if::cfg_if;
use clap::Parser;
use shared::{
    log::init_log,
    types::{Target, TargetId, TargetType, UserId},
};
use tokio::signal;
use tracing::*;

use client::{
    engine::MiningEvent,
    manager::MiningManager,
    validate::{ValidateError, ValidatorClient},
};

cfg_if! {
    if #[cfg(feature = "build-version")] {
        include!(concat!(env!("OUT_DIR"), "/version.rs"));
    } else {
        pub const VERSION: &str = "unknown";
    }
}

#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    #[arg(long, value_name = "SERVER_HOST", help = "PoW validator host, e.g. 127.0.0.1:8080")]
    host: String,

    #[arg(long, value_name = "USER_ID", help = "Acting user credited when a proof is accepted")]
    user: String,

    #[arg(long, value_name = "TARGET_TYPE", help = "Entity kind to mine for (thread, post, board, ...)")]
    target_type: TargetType,

    #[arg(long, value_name = "TARGET_ID", help = "Entity id, omitted for global/user targets")]
    target_id: Option<String>,

    #[arg(long, value_name = "CORES_COUNT", help = "The number of CPU cores to allocate to mining")]
    cores: Option<usize>,

    #[arg(long, value_name = "MAX_ATTEMPTS", default_value_t = 3, help = "Mine-and-submit rounds before giving up")]
    max_attempts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log();

    info!("VERSION:{}", VERSION);

    let args = Args::parse();

    let cores = args.cores.unwrap_or(num_cpus::get());
    let target = Target::new(args.target_type, args.target_id.map(TargetId));
    let user = UserId(args.user);

    info!("Client Starting... Threads: {}, Target: {}, User: {}", cores, target, user);

    let client = ValidatorClient::new(&args.host);
    let manager = Arc::new(MiningManager::new(cores));

    let shutdown = manager.clone();
    tokio::spawn(async move {
        signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
        warn!("ctrl+c received. tearing down the search");
        shutdown.destroy();
        std::process::exit(0);
    });

    for attempt in 1..=args.max_attempts {
        // the target's requirement may have risen since the last round
        let requirement = client.difficulty(&target).await?;
        info!(
            "target {} requires prefix `{}` ({} points)",
            target, requirement.prefix, requirement.points
        );

        let mut events = manager.start_dedicated_mining(target.clone(), requirement)?;
        while let Some(event) = events.recv().await {
            match event {
                MiningEvent::Progress(p) => {
                    info!("attempts: {}, rate: {:.2} H/s, best: {} pts", p.attempts, p.hash_rate, p.points);
                }
                MiningEvent::Found(result) => {
                    info!(
                        "qualifying hash {} (+{} pts) after {} attempts ({:.2} H/s)",
                        result.hash, result.points, result.attempts, result.hash_rate
                    );
                    break;
                }
            }
        }

        let receipt = match manager.last_pow_result() {
            Some(receipt) => receipt,
            None => anyhow::bail!("search ended without a result"),
        };
        let payload = receipt.payload(user.clone());
        // the receipt is consumed whether or not the verifier accepts it
        manager.clear_last_pow_result();

        match client.validate(&payload).await {
            Ok(resp) => {
                info!(
                    "proof accepted: +{} points (target total {}, user score {})",
                    resp.points, resp.target_total, resp.user_score
                );
                return Ok(());
            }
            Err(ValidateError::Rejected { code, message }) => {
                warn!("proof rejected ({code}): {message}. re-mining ({attempt}/{})", args.max_attempts);
            }
            Err(err) => return Err(err.into()),
        }
    }

    anyhow::bail!("no accepted proof after {} attempts", args.max_attempts)
}
