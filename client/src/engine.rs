use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc,
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use core_affinity::CoreId;
use shared::{
    difficulty::{is_valid_prefix, Requirement},
    pow::{pow_hash, score_for_hash, zeros_after_magic, Challenge, MiningResult},
    types::Target,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::*;

// hashes between stop-flag checks / attempt-counter flushes
const FLUSH_INTERVAL: u64 = 1024;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
const COLLECT_TICK: Duration = Duration::from_millis(200);

/// Stream of events a mining session emits toward the UI side.
#[derive(Debug, Clone)]
pub enum MiningEvent {
    Progress(Progress),
    Found(MiningResult),
}

/// Periodic snapshot of the running search. `hash`/`nonce`/`points` describe
/// the best non-qualifying candidate seen so far.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub hash: String,
    pub nonce: String,
    pub points: u64,
    pub attempts: u64,
    pub hash_rate: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid difficulty requirement: {0}")]
    InvalidRequirement(String),
    #[error("mining unavailable: {0}")]
    Unavailable(String),
}

enum WorkerEvent {
    Sample { hash: String, nonce: String, points: u64 },
    Found { hash: String, nonce: String, points: u64, trailing_zeros: u32 },
}

/// One nonce-search session: worker threads brute-forcing
/// `sha256(challenge ++ nonce)` until one hash meets the requirement.
/// One-shot: the first qualifying hash halts the whole search.
pub struct MiningEngine {
    cores: usize,
    target: Option<Target>,
    challenge: Option<Challenge>,
    stop: Arc<AtomicBool>,
    mining: Arc<AtomicBool>,
    attempts: Arc<AtomicU64>,
    workers: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
}

impl MiningEngine {
    pub fn new(cores: usize) -> Self {
        Self {
            cores: cores.max(1),
            target: None,
            challenge: None,
            stop: Arc::new(AtomicBool::new(false)),
            mining: Arc::new(AtomicBool::new(false)),
            attempts: Arc::new(AtomicU64::new(0)),
            workers: vec![],
            collector: None,
        }
    }

    /// Start searching for `target`. Restarting while mining is idempotent:
    /// the previous session is fully torn down first. The held challenge is
    /// reused only when the target is unchanged.
    pub fn start(
        &mut self,
        target: Target,
        requirement: Requirement,
    ) -> Result<UnboundedReceiver<MiningEvent>, EngineError> {
        if !is_valid_prefix(&requirement.prefix) {
            return Err(EngineError::InvalidRequirement(format!(
                "prefix `{}` does not match 21e80*",
                requirement.prefix
            )));
        }
        if requirement.points == 0 {
            return Err(EngineError::InvalidRequirement("points must be positive".to_string()));
        }

        self.stop();

        if self.target.as_ref() != Some(&target) || self.challenge.is_none() {
            self.challenge = Some(Challenge::generate());
        }
        self.target = Some(target.clone());

        let challenge = match &self.challenge {
            Some(c) => c.clone(),
            None => return Err(EngineError::Unavailable("no challenge held".to_string())),
        };

        debug!(
            "engine start: target {target}, prefix `{}`, points {}, challenge {challenge}",
            requirement.prefix, requirement.points
        );

        self.stop = Arc::new(AtomicBool::new(false));
        self.attempts = Arc::new(AtomicU64::new(0));

        let (worker_tx, worker_rx) = mpsc::channel::<WorkerEvent>();
        let (event_tx, event_rx) = unbounded_channel();

        for cid in 0..self.cores {
            let handle = self.spawn_worker(cid, &challenge, &requirement, worker_tx.clone());
            match handle {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    // no background-execution facility: fail gracefully
                    self.stop();
                    return Err(EngineError::Unavailable(format!("worker spawn failed: {err}")));
                }
            }
        }
        drop(worker_tx);

        let collector = self.spawn_collector(worker_rx, event_tx);
        match collector {
            Ok(handle) => self.collector = Some(handle),
            Err(err) => {
                self.stop();
                return Err(EngineError::Unavailable(format!("collector spawn failed: {err}")));
            }
        }

        self.mining.store(true, Ordering::Relaxed);
        Ok(event_rx)
    }

    fn spawn_worker(
        &self,
        cid: usize,
        challenge: &Challenge,
        requirement: &Requirement,
        tx: mpsc::Sender<WorkerEvent>,
    ) -> std::io::Result<JoinHandle<()>> {
        let stop = self.stop.clone();
        let attempts = self.attempts.clone();
        let challenge = challenge.as_str().to_string();
        let prefix = requirement.prefix.clone();
        let points = requirement.points;
        let stride = self.cores as u64;

        std::thread::Builder::new().name(format!("pow-worker-{cid}")).spawn(move || {
            // bound thread to core
            let _ = core_affinity::set_for_current(CoreId { id: cid });

            let mut nonce = cid as u64;
            let mut pending = 0u64;
            let mut best = 0u64;

            loop {
                let nonce_str = nonce.to_string();
                let hash = pow_hash(&challenge, &nonce_str);
                pending += 1;

                let score = score_for_hash(&hash);
                if score >= points && hash.starts_with(&prefix) {
                    // halt siblings before reporting
                    stop.store(true, Ordering::Relaxed);
                    attempts.fetch_add(pending, Ordering::Relaxed);
                    let trailing_zeros = zeros_after_magic(&hash).unwrap_or(0);
                    trace!("worker {cid}: qualifying hash {hash} at nonce {nonce_str}");
                    tx.send(WorkerEvent::Found {
                        hash,
                        nonce: nonce_str,
                        points: score,
                        trailing_zeros,
                    })
                    .ok();
                    return;
                }

                if score > best {
                    best = score;
                    tx.send(WorkerEvent::Sample { hash, nonce: nonce_str, points: score }).ok();
                }

                if pending == FLUSH_INTERVAL {
                    attempts.fetch_add(pending, Ordering::Relaxed);
                    pending = 0;
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                }

                nonce += stride;
            }
        })
    }

    fn spawn_collector(
        &self,
        rx: mpsc::Receiver<WorkerEvent>,
        events: UnboundedSender<MiningEvent>,
    ) -> std::io::Result<JoinHandle<()>> {
        let attempts = self.attempts.clone();
        let mining = self.mining.clone();

        std::thread::Builder::new().name("pow-collector".to_string()).spawn(move || {
            let started = Instant::now();
            let mut last_emit = Instant::now();
            let mut best: Option<(String, String, u64)> = None;

            loop {
                match rx.recv_timeout(COLLECT_TICK) {
                    Ok(WorkerEvent::Found { hash, nonce, points, trailing_zeros }) => {
                        let attempts = attempts.load(Ordering::Relaxed);
                        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
                        mining.store(false, Ordering::Relaxed);
                        events
                            .send(MiningEvent::Found(MiningResult {
                                hash,
                                nonce,
                                points,
                                trailing_zeros,
                                attempts,
                                hash_rate: attempts as f64 / elapsed,
                            }))
                            .ok();
                        return;
                    }
                    Ok(WorkerEvent::Sample { hash, nonce, points }) => {
                        if best.as_ref().map_or(true, |(_, _, p)| points > *p) {
                            best = Some((hash, nonce, points));
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        // all workers gone without a result: stopped session
                        mining.store(false, Ordering::Relaxed);
                        return;
                    }
                }

                if last_emit.elapsed() >= PROGRESS_INTERVAL {
                    last_emit = Instant::now();
                    let attempts = attempts.load(Ordering::Relaxed);
                    let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
                    let (hash, nonce, points) = best.clone().unwrap_or_default();
                    let sent = events.send(MiningEvent::Progress(Progress {
                        hash,
                        nonce,
                        points,
                        attempts,
                        hash_rate: attempts as f64 / elapsed,
                    }));
                    if sent.is_err() {
                        // nobody listening anymore; keep draining workers
                        trace!("progress receiver dropped");
                    }
                }
            }
        })
    }

    /// Terminate workers immediately and discard in-flight work. The held
    /// challenge survives so a caller can still tell which challenge a
    /// captured result belongs to.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            handle.join().ok();
        }
        if let Some(handle) = self.collector.take() {
            handle.join().ok();
        }
        self.mining.store(false, Ordering::Relaxed);
    }

    /// Drop the challenge so the next session mines a fresh anchor, even for
    /// the same target. Called once a result has been consumed.
    pub fn clear_challenge(&mut self) {
        self.challenge = None;
    }

    pub fn current_challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::Relaxed)
    }

    /// Stop and release everything. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        self.stop();
        self.challenge = None;
        self.target = None;
    }
}

impl Drop for MiningEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
