//! Context load phases
//!
//! Loading a context walks Connecting → Establishing → Syncing → Complete,
//! reporting each transition once on the caller's progress channel. A load
//! may only fail while Connecting or Establishing; once informers are
//! talking to the server, kinds that never sync are given up on one by one
//! instead of failing the whole context.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::connector::Connector;
use crate::error::PoolError;
use crate::repository::Repository;
use kubedeck_types::{ContextLoadProgress, LoadPhase};

/// Channel receiving load progress; the pool never closes it
pub type ProgressSender = mpsc::UnboundedSender<ContextLoadProgress>;

/// Reason recorded on kinds still pending at the sync deadline
pub const SYNC_TIMED_OUT: &str = "sync timed out";

pub(crate) struct LoadCoordinator<'a> {
    context: &'a str,
    progress: &'a ProgressSender,
    phase: Option<LoadPhase>,
}

impl<'a> LoadCoordinator<'a> {
    pub fn new(context: &'a str, progress: &'a ProgressSender) -> Self {
        Self {
            context,
            progress,
            phase: None,
        }
    }

    pub fn phase(&self) -> Option<LoadPhase> {
        self.phase
    }

    /// Enter `phase` and report it
    fn advance(&mut self, phase: LoadPhase, message: impl Into<String>) {
        debug_assert_eq!(
            self.phase.map_or(Some(LoadPhase::Connecting), LoadPhase::next),
            Some(phase),
            "load phases must advance in order"
        );
        self.phase = Some(phase);
        // The receiver may have gone away; loading carries on regardless
        let _ = self
            .progress
            .send(ContextLoadProgress::new(self.context, message, phase));
    }

    /// Leave through the Failed side exit
    fn fail(&self, err: PoolError) -> PoolError {
        debug_assert!(matches!(
            self.phase,
            Some(LoadPhase::Connecting | LoadPhase::Establishing)
        ));
        warn!(
            context = %self.context,
            phase = ?self.phase,
            error = %err,
            "context load failed"
        );
        err
    }

    /// Connect, start informers and wait for them to settle
    pub async fn run<C: Connector>(
        mut self,
        connector: &C,
        sync_timeout: Duration,
    ) -> Result<Repository<C::Session>, PoolError> {
        self.advance(LoadPhase::Connecting, "Connecting to API server");
        let session = connector.connect(self.context).await.map_err(|e| {
            self.fail(PoolError::Connection {
                context: self.context.to_string(),
                reason: e.to_string(),
            })
        })?;

        self.advance(LoadPhase::Establishing, "Starting informers");
        let deadline = Instant::now() + sync_timeout;
        let repo = Repository::start(self.context, session);
        repo.wait_until(deadline, |r| r.handshake().is_settled()).await;

        let handshake = repo.handshake();
        if handshake.responded == 0 {
            repo.stop();
            let err = if handshake.is_settled() {
                PoolError::Connection {
                    context: self.context.to_string(),
                    reason: repo
                        .first_error()
                        .unwrap_or_else(|| "no resource kind could be watched".to_string()),
                }
            } else {
                PoolError::SyncTimeout {
                    context: self.context.to_string(),
                    timeout: sync_timeout,
                }
            };
            return Err(self.fail(err));
        }

        self.advance(
            LoadPhase::Syncing,
            format!(
                "Syncing resources ({}/{} kinds answered)",
                handshake.responded, handshake.total
            ),
        );
        if !repo.wait_until(deadline, |r| r.are_typed_informers_ready()).await {
            let marked = repo.mark_pending_unavailable(SYNC_TIMED_OUT);
            warn!(
                context = %self.context,
                kinds = ?marked,
                "informers did not sync in time"
            );
        }

        let unavailable = repo.unavailable_kinds().len();
        let message = if unavailable == 0 {
            "All resources synced".to_string()
        } else {
            format!("Synced with {} kinds unavailable", unavailable)
        };
        self.advance(LoadPhase::Complete, message);
        info!(context = %self.context, unavailable, "context loaded");

        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Behaviour, FakeCluster, FakeConnector};
    use kubedeck_types::{KindReadiness, ResourceKind};

    fn phases(rx: &mut mpsc::UnboundedReceiver<ContextLoadProgress>) -> Vec<LoadPhase> {
        let mut phases = Vec::new();
        while let Ok(p) = rx.try_recv() {
            phases.push(p.phase);
        }
        phases
    }

    async fn load(
        connector: &FakeConnector,
        context: &str,
        timeout: Duration,
    ) -> (
        Result<Repository<FakeCluster>, PoolError>,
        Vec<LoadPhase>,
    ) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = LoadCoordinator::new(context, &tx).run(connector, timeout).await;
        (result, phases(&mut rx))
    }

    #[tokio::test]
    async fn test_phases_in_order() {
        let connector = FakeConnector::new().with_cluster("dev", FakeCluster::new());
        let (result, phases) = load(&connector, "dev", Duration::from_secs(5)).await;

        let repo = result.unwrap();
        assert!(repo.are_typed_informers_ready());
        assert_eq!(phases, LoadPhase::ALL.to_vec());
        assert!(phases.last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_unreachable_emits_only_connecting() {
        let connector = FakeConnector::new().with_unreachable("dead");
        let (result, phases) = load(&connector, "dead", Duration::from_secs(5)).await;

        assert!(matches!(result, Err(PoolError::Connection { .. })));
        assert_eq!(phases, vec![LoadPhase::Connecting]);
    }

    #[tokio::test]
    async fn test_all_kinds_erroring_is_connection_failure() {
        let cluster = FakeCluster::new().with_all(Behaviour::Erroring);
        let connector = FakeConnector::new().with_cluster("flaky", cluster);
        let (result, phases) = load(&connector, "flaky", Duration::from_secs(5)).await;

        match result {
            Err(PoolError::Connection { reason, .. }) => assert_eq!(reason, "connection refused"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert_eq!(phases, vec![LoadPhase::Connecting, LoadPhase::Establishing]);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let cluster = FakeCluster::new().with_all(Behaviour::Silent);
        let connector = FakeConnector::new().with_cluster("silent", cluster);
        let (result, phases) = load(&connector, "silent", Duration::from_millis(150)).await;

        assert!(matches!(result, Err(PoolError::SyncTimeout { .. })));
        assert_eq!(phases, vec![LoadPhase::Connecting, LoadPhase::Establishing]);
    }

    #[tokio::test]
    async fn test_stragglers_marked_unavailable() {
        let cluster = FakeCluster::new()
            .with_behaviour(ResourceKind::Ingress, Behaviour::Silent)
            .with_behaviour(ResourceKind::Secret, Behaviour::Forbidden);
        let connector = FakeConnector::new().with_cluster("dev", cluster);
        let (result, phases) = load(&connector, "dev", Duration::from_millis(300)).await;

        let repo = result.unwrap();
        assert_eq!(phases.len(), 4);
        assert_eq!(
            repo.readiness(ResourceKind::Ingress),
            KindReadiness::Unavailable(SYNC_TIMED_OUT.to_string())
        );
        assert!(matches!(
            repo.readiness(ResourceKind::Secret),
            KindReadiness::Unavailable(_)
        ));
        assert_eq!(repo.readiness(ResourceKind::Pod), KindReadiness::Synced);
    }

    #[tokio::test]
    async fn test_delayed_kinds_still_sync() {
        let cluster = FakeCluster::new()
            .with_behaviour(ResourceKind::Node, Behaviour::Delayed(Duration::from_millis(50)));
        let connector = FakeConnector::new().with_cluster("dev", cluster);
        let (result, _) = load(&connector, "dev", Duration::from_secs(5)).await;

        let repo = result.unwrap();
        assert_eq!(repo.readiness(ResourceKind::Node), KindReadiness::Synced);
        assert!(repo.unavailable_kinds().is_empty());
    }
}
