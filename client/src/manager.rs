use std::sync::{Arc, Mutex};

use shared::{
    difficulty::Requirement,
    interaction::ValidatePow,
    pow::{Challenge, MiningResult},
    types::{Target, UserId},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::*;

use crate::engine::{EngineError, MiningEngine, MiningEvent};

/// Why a session is running: bound to a pending user action, or
/// opportunistic hover mining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Dedicated,
    Mouseover,
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub kind: SessionKind,
    pub target: Target,
    pub requirement: Requirement,
    pub challenge: Challenge,
}

/// A captured mining result together with everything the submission flow
/// needs to assemble a validation payload.
#[derive(Debug, Clone)]
pub struct PowReceipt {
    pub challenge: Challenge,
    pub prefix: String,
    pub required_points: u64,
    pub target: Target,
    pub result: MiningResult,
}

impl PowReceipt {
    pub fn payload(&self, user_id: UserId) -> ValidatePow {
        ValidatePow {
            challenge: self.challenge.as_str().to_string(),
            nonce: self.result.nonce.clone(),
            hash: self.result.hash.clone(),
            points: self.result.points,
            trailing_zeros: self.result.trailing_zeros,
            prefix: self.prefix.clone(),
            target: self.target.clone(),
            user_id,
        }
    }
}

struct Inner {
    engine: Option<MiningEngine>,
    session: Option<SessionInfo>,
    last_result: Option<PowReceipt>,
    generation: u64,
}

/// Sole owner of the process-wide "may mine now" right. At most one engine
/// session is ever live; every start fully tears down the previous one
/// before the next begins. Constructed explicitly and shared by `Arc`, not
/// an ambient global.
pub struct MiningManager {
    cores: usize,
    inner: Arc<Mutex<Inner>>,
}

impl MiningManager {
    pub fn new(cores: usize) -> Self {
        Self {
            cores: cores.max(1),
            inner: Arc::new(Mutex::new(Inner {
                engine: None,
                session: None,
                last_result: None,
                generation: 0,
            })),
        }
    }

    /// Background search tied to a pending user action. Interrupts whatever
    /// session was active, dedicated or mouseover.
    pub fn start_dedicated_mining(
        &self,
        target: Target,
        requirement: Requirement,
    ) -> Result<UnboundedReceiver<MiningEvent>, EngineError> {
        self.start_session(SessionKind::Dedicated, target, requirement)
    }

    /// Last-hover-wins: attaching a new hover target interrupts the prior
    /// search, whatever its kind.
    pub fn attach_mouseover(
        &self,
        target: Target,
        requirement: Requirement,
    ) -> Result<UnboundedReceiver<MiningEvent>, EngineError> {
        self.start_session(SessionKind::Mouseover, target, requirement)
    }

    fn start_session(
        &self,
        kind: SessionKind,
        target: Target,
        requirement: Requirement,
    ) -> Result<UnboundedReceiver<MiningEvent>, EngineError> {
        let mut inner = self.inner.lock().unwrap();

        // full teardown of the previous session before anything new starts
        let cores = self.cores;
        let engine = inner.engine.get_or_insert_with(|| MiningEngine::new(cores));
        engine.stop();

        let mut rx = engine.start(target.clone(), requirement.clone())?;
        let challenge = match engine.current_challenge() {
            Some(c) => c.clone(),
            None => return Err(EngineError::Unavailable("engine holds no challenge".to_string())),
        };

        inner.generation += 1;
        let generation = inner.generation;
        inner.session =
            Some(SessionInfo { kind, target: target.clone(), requirement: requirement.clone(), challenge: challenge.clone() });

        debug!("session start ({kind:?}) for {target}, generation {generation}");

        let (out_tx, out_rx) = unbounded_channel();
        let shared = self.inner.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let MiningEvent::Found(result) = &event {
                    let mut guard = shared.lock().unwrap();
                    // a stale stream must not clobber a newer session
                    if guard.generation == generation {
                        guard.last_result = Some(PowReceipt {
                            challenge: challenge.clone(),
                            prefix: requirement.prefix.clone(),
                            required_points: requirement.points,
                            target: target.clone(),
                            result: result.clone(),
                        });
                        guard.session = None;
                        info!("qualifying hash captured for {target}: {}", result.hash);
                    }
                }
                if out_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Ok(out_rx)
    }

    /// Stops the engine only if the active session is the dedicated one.
    pub fn stop_dedicated_mining(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.session.as_ref().map(|s| s.kind) == Some(SessionKind::Dedicated) {
            if let Some(engine) = inner.engine.as_mut() {
                engine.stop();
            }
            inner.session = None;
        }
    }

    /// Stops the engine only if `target` is still the hovered session.
    pub fn detach_mouseover(&self, target: &Target) {
        let mut inner = self.inner.lock().unwrap();
        let hovered = matches!(
            inner.session.as_ref(),
            Some(session) if session.kind == SessionKind::Mouseover && session.target == *target
        );
        if hovered {
            if let Some(engine) = inner.engine.as_mut() {
                engine.stop();
            }
            inner.session = None;
        }
    }

    pub fn last_pow_result(&self) -> Option<PowReceipt> {
        self.inner.lock().unwrap().last_result.clone()
    }

    /// Mandatory once a result has been submitted (accepted or not): the
    /// receipt is discarded and the engine's challenge cleared, so a
    /// consumed anchor can never back a second claim.
    pub fn clear_last_pow_result(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_result = None;
        if let Some(engine) = inner.engine.as_mut() {
            engine.clear_challenge();
        }
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.inner.lock().unwrap().session.clone()
    }

    pub fn is_mining(&self) -> bool {
        self.inner.lock().unwrap().engine.as_ref().map_or(false, |e| e.is_mining())
    }

    /// Tear down the engine entirely.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut engine) = inner.engine.take() {
            engine.destroy();
        }
        inner.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::pow::pow_hash;
    use shared::types::{TargetId, TargetType};

    fn thread_target(id: &str) -> Target {
        Target::new(TargetType::Thread, Some(TargetId(id.to_string())))
    }

    fn easy() -> Requirement {
        Requirement::from_prefix("21e8").unwrap()
    }

    fn effectively_unreachable() -> Requirement {
        Requirement::from_prefix("21e80000000").unwrap()
    }

    #[tokio::test]
    async fn second_dedicated_session_leaves_exactly_one_search() {
        let manager = MiningManager::new(1);
        let mut rx1 = manager
            .start_dedicated_mining(thread_target("t-1"), effectively_unreachable())
            .unwrap();
        let first_session = manager.session().unwrap();

        let _rx2 = manager
            .start_dedicated_mining(thread_target("t-2"), effectively_unreachable())
            .unwrap();
        let second_session = manager.session().unwrap();

        assert!(manager.is_mining());
        assert_eq!(second_session.target, thread_target("t-2"));
        assert_ne!(first_session.challenge, second_session.challenge);

        // the interrupted session's stream closes; no duplicate callbacks
        while rx1.recv().await.is_some() {}
        manager.destroy();
        assert!(!manager.is_mining());
    }

    #[tokio::test]
    async fn mouseover_is_last_hover_wins() {
        let manager = MiningManager::new(1);
        let _rx = manager.attach_mouseover(thread_target("a"), effectively_unreachable()).unwrap();
        let _rx = manager.attach_mouseover(thread_target("b"), effectively_unreachable()).unwrap();

        let session = manager.session().unwrap();
        assert_eq!(session.kind, SessionKind::Mouseover);
        assert_eq!(session.target, thread_target("b"));

        // detaching a stale hover target is a no-op
        manager.detach_mouseover(&thread_target("a"));
        assert!(manager.is_mining());

        manager.detach_mouseover(&thread_target("b"));
        assert!(!manager.is_mining());
        assert!(manager.session().is_none());
        manager.destroy();
    }

    #[tokio::test]
    async fn stop_dedicated_leaves_mouseover_sessions_alone() {
        let manager = MiningManager::new(1);
        let _rx = manager.attach_mouseover(thread_target("a"), effectively_unreachable()).unwrap();
        manager.stop_dedicated_mining();
        assert!(manager.is_mining());
        manager.destroy();
    }

    #[tokio::test]
    async fn found_result_is_captured_once_and_cleared_on_consumption() {
        let manager = MiningManager::new(2);
        let mut rx = manager.start_dedicated_mining(thread_target("t-1"), easy()).unwrap();

        let found = loop {
            match rx.recv().await.expect("stream closed before a result") {
                MiningEvent::Found(result) => break result,
                MiningEvent::Progress(_) => {}
            }
        };

        let receipt = manager.last_pow_result().expect("receipt missing after found event");
        assert_eq!(receipt.result.hash, found.hash);
        assert_eq!(receipt.result.hash, pow_hash(receipt.challenge.as_str(), &receipt.result.nonce));
        assert!(manager.session().is_none());

        let payload = receipt.payload(UserId("u-1".to_string()));
        assert_eq!(payload.challenge, receipt.challenge.as_str());
        assert_eq!(payload.prefix, "21e8");

        manager.clear_last_pow_result();
        assert!(manager.last_pow_result().is_none());

        // post-consumption restart for the same target mines a fresh anchor
        let _rx = manager
            .start_dedicated_mining(thread_target("t-1"), effectively_unreachable())
            .unwrap();
        assert_ne!(manager.session().unwrap().challenge, receipt.challenge);
        manager.destroy();
    }
}
