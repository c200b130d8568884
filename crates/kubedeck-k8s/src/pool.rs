//! Bounded pool of per-context repositories
//!
//! The pool owns every [`Repository`]. Contexts are loaded on demand, kept
//! in least-recently-used order and evicted once more than `max_contexts`
//! are loaded. The active context is never evicted.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connector::{Connector, KubeConnector};
use crate::error::PoolError;
use crate::load::{LoadCoordinator, ProgressSender};
use crate::repository::Repository;
use kubedeck_types::{ContextInfo, ContextState};

/// Upper bound for `max_contexts`
pub const MAX_CONTEXTS_LIMIT: usize = 20;

/// Default time allowed for a context's informers to sync
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct PoolOptions {
    pub sync_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

/// Outcome of [`RepositoryPool::switch_context`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextSwitch {
    pub old: Option<String>,
    pub new: String,
}

type Repo<C> = Arc<Repository<<C as Connector>::Session>>;

/// Published once a load finishes; `None` while it is still running
type LoadOutcome = Option<Result<(), PoolError>>;

/// Pool bookkeeping, guarded by a single lock
///
/// At most `max_contexts` repositories are kept, except that the active
/// context and the context registered last are both pinned. With
/// `max_contexts == 1` a freshly loaded, not yet activated context can
/// therefore sit next to the active one until the next activation brings
/// the pool back within bounds.
struct PoolInner<C: Connector> {
    repositories: HashMap<String, Repo<C>>,
    /// Most recently used first
    lru: VecDeque<String>,
    states: HashMap<String, ContextState>,
    /// Completion signal of each load in flight
    in_flight: HashMap<String, watch::Receiver<LoadOutcome>>,
    active: Option<String>,
    closed: bool,
}

impl<C: Connector> PoolInner<C> {
    fn touch(&mut self, name: &str) {
        self.lru.retain(|n| n != name);
        self.lru.push_front(name.to_string());
    }

    /// Remove least recently used repositories until within `max`, skipping
    /// the active context and `keep`
    fn evict_over_capacity(&mut self, max: usize, keep: &str) -> Vec<(String, Repo<C>)> {
        let mut evicted = Vec::new();
        while self.repositories.len() > max {
            let victim = self
                .lru
                .iter()
                .rev()
                .find(|name| name.as_str() != keep && self.active.as_ref() != Some(*name))
                .cloned();
            let Some(victim) = victim else {
                break;
            };
            self.lru.retain(|n| *n != victim);
            self.states.remove(&victim);
            if let Some(repo) = self.repositories.remove(&victim) {
                evicted.push((victim, repo));
            }
        }
        evicted
    }
}

/// What a caller found when asking to load a context
enum Claim<'a, C: Connector> {
    Loaded,
    InFlight(watch::Receiver<LoadOutcome>),
    Started(LoadTicket<'a, C>),
}

/// Held by the task running a load; clears the in-flight entry however the
/// load ends, including when its future is dropped
struct LoadTicket<'a, C: Connector> {
    pool: &'a RepositoryPool<C>,
    name: &'a str,
    done: watch::Sender<LoadOutcome>,
}

impl<C: Connector> Drop for LoadTicket<'_, C> {
    fn drop(&mut self) {
        let mut inner = self.pool.inner.lock();
        inner.in_flight.remove(self.name);
        if !inner.closed && matches!(inner.states.get(self.name), Some(ContextState::Loading)) {
            inner.states.insert(
                self.name.to_string(),
                ContextState::Failed("load was cancelled".to_string()),
            );
        }
    }
}

pub struct RepositoryPool<C: Connector = KubeConnector> {
    connector: C,
    max_contexts: usize,
    options: PoolOptions,
    inner: Mutex<PoolInner<C>>,
}

impl RepositoryPool<KubeConnector> {
    /// Pool over the contexts of the kubeconfig at `kubeconfig_path`
    pub fn new(kubeconfig_path: &Path, max_contexts: usize) -> Result<Self, PoolError> {
        validate_max_contexts(max_contexts)?;
        let connector = KubeConnector::from_path(kubeconfig_path)?;
        Self::with_connector(connector, max_contexts, PoolOptions::default())
    }
}

fn validate_max_contexts(max_contexts: usize) -> Result<(), PoolError> {
    if (1..=MAX_CONTEXTS_LIMIT).contains(&max_contexts) {
        Ok(())
    } else {
        Err(PoolError::Validation {
            value: max_contexts,
            max: MAX_CONTEXTS_LIMIT,
        })
    }
}

impl<C: Connector> RepositoryPool<C> {
    pub fn with_connector(
        connector: C,
        max_contexts: usize,
        options: PoolOptions,
    ) -> Result<Self, PoolError> {
        validate_max_contexts(max_contexts)?;
        Ok(Self {
            connector,
            max_contexts,
            options,
            inner: Mutex::new(PoolInner {
                repositories: HashMap::new(),
                lru: VecDeque::new(),
                states: HashMap::new(),
                in_flight: HashMap::new(),
                active: None,
                closed: false,
            }),
        })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn max_contexts(&self) -> usize {
        self.max_contexts
    }

    /// Contexts available to load
    pub fn contexts(&self) -> Vec<ContextInfo> {
        self.connector.contexts()
    }

    fn claim<'a>(&'a self, name: &'a str) -> Result<Claim<'a, C>, PoolError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PoolError::Closed);
        }
        if inner.repositories.contains_key(name) {
            return Ok(Claim::Loaded);
        }
        if let Some(rx) = inner.in_flight.get(name) {
            return Ok(Claim::InFlight(rx.clone()));
        }
        let (done, rx) = watch::channel(None);
        inner.in_flight.insert(name.to_string(), rx);
        inner.states.insert(name.to_string(), ContextState::Loading);
        Ok(Claim::Started(LoadTicket {
            pool: self,
            name,
            done,
        }))
    }

    /// Load `name`, reporting phases on `progress`
    ///
    /// Resolves once the context's informers have synced (or the load has
    /// failed). Loading an already loaded context is a no-op; loading one
    /// that is still loading fails with [`PoolError::LoadInProgress`].
    ///
    /// Registering the new repository may leave the pool one over
    /// `max_contexts` when the active context is the only other entry; see
    /// [`RepositoryPool::set_active`].
    pub async fn load_context(&self, name: &str, progress: &ProgressSender) -> Result<(), PoolError> {
        match self.claim(name)? {
            Claim::Loaded => {
                debug!(context = %name, "context already loaded");
                Ok(())
            }
            Claim::InFlight(_) => Err(PoolError::LoadInProgress(name.to_string())),
            Claim::Started(ticket) => self.run_load(ticket, progress, false).await,
        }
    }

    async fn run_load(
        &self,
        ticket: LoadTicket<'_, C>,
        progress: &ProgressSender,
        activate: bool,
    ) -> Result<(), PoolError> {
        let name = ticket.name;
        let result = match LoadCoordinator::new(name, progress)
            .run(&self.connector, self.options.sync_timeout)
            .await
        {
            Ok(repo) => self.register(name, Arc::new(repo), activate),
            Err(err) => {
                let mut inner = self.inner.lock();
                if !inner.closed {
                    inner
                        .states
                        .insert(name.to_string(), ContextState::Failed(err.to_string()));
                }
                Err(err)
            }
        };
        ticket.done.send_replace(Some(result.clone()));
        result
    }

    /// Insert a synced repository, optionally making it active under the
    /// same lock so nothing can evict it in between
    fn register(&self, name: &str, repo: Repo<C>, activate: bool) -> Result<(), PoolError> {
        let evicted = {
            let mut inner = self.inner.lock();
            if inner.closed {
                None
            } else {
                inner.repositories.insert(name.to_string(), Arc::clone(&repo));
                inner.states.insert(name.to_string(), ContextState::Ready);
                if activate {
                    inner.active = Some(name.to_string());
                }
                inner.touch(name);
                Some(inner.evict_over_capacity(self.max_contexts, name))
            }
        };

        match evicted {
            None => {
                debug!(context = %name, "pool closed during load, discarding repository");
                retire(vec![(name.to_string(), repo)]);
                Err(PoolError::Closed)
            }
            Some(evicted) => {
                info!(context = %name, active = activate, "context registered");
                retire(evicted);
                Ok(())
            }
        }
    }

    /// Make a loaded context the active one
    ///
    /// Evicts down to `max_contexts`. Evicted repositories are stopped
    /// right away; waiting for their tasks to wind down needs a Tokio
    /// runtime and is skipped when called outside one.
    pub fn set_active(&self, name: &str) -> Result<(), PoolError> {
        let evicted = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(PoolError::Closed);
            }
            if !inner.repositories.contains_key(name) {
                return Err(PoolError::NotLoaded(name.to_string()));
            }
            inner.active = Some(name.to_string());
            inner.touch(name);
            inner.evict_over_capacity(self.max_contexts, name)
        };
        debug!(context = %name, "active context set");
        retire(evicted);
        Ok(())
    }

    /// Activate `name`, loading it first if needed
    ///
    /// A load already running for `name` (a background preload, say) is
    /// awaited instead of rejected, and its failure is returned as is.
    pub async fn switch_context(
        &self,
        name: &str,
        progress: &ProgressSender,
    ) -> Result<ContextSwitch, PoolError> {
        let old = self.active_context();
        loop {
            match self.claim(name)? {
                Claim::Loaded => match self.set_active(name) {
                    // evicted between the claim and the activation
                    Err(PoolError::NotLoaded(_)) => continue,
                    other => other?,
                },
                Claim::InFlight(mut rx) => {
                    debug!(context = %name, "waiting for in-flight load");
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    if let Some(Err(err)) = outcome {
                        return Err(err);
                    }
                    continue;
                }
                Claim::Started(ticket) => self.run_load(ticket, progress, true).await?,
            }
            break;
        }
        info!(from = ?old, to = %name, "switched context");
        Ok(ContextSwitch {
            old,
            new: name.to_string(),
        })
    }

    /// Clear a failed context and load it again
    pub async fn retry_failed_context(
        &self,
        name: &str,
        progress: &ProgressSender,
    ) -> Result<(), PoolError> {
        {
            let mut inner = self.inner.lock();
            match inner.states.get(name) {
                None => return Err(PoolError::NeverAttempted(name.to_string())),
                Some(ContextState::Failed(_)) => {
                    inner.states.remove(name);
                }
                Some(_) => {}
            }
        }
        self.load_context(name, progress).await
    }

    pub fn active_context(&self) -> Option<String> {
        self.inner.lock().active.clone()
    }

    pub fn active_repository(&self) -> Option<Repo<C>> {
        let inner = self.inner.lock();
        let name = inner.active.as_ref()?;
        inner.repositories.get(name).cloned()
    }

    pub fn repository(&self, name: &str) -> Option<Repo<C>> {
        self.inner.lock().repositories.get(name).cloned()
    }

    /// Loaded contexts, most recently used first
    pub fn loaded_contexts(&self) -> Vec<String> {
        self.inner.lock().lru.iter().cloned().collect()
    }

    pub fn context_state(&self, name: &str) -> Option<ContextState> {
        self.inner.lock().states.get(name).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Stop every repository; later loads fail with [`PoolError::Closed`]
    pub async fn close(&self) {
        let repositories: Vec<(String, Repo<C>)> = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.active = None;
            inner.lru.clear();
            inner.states.clear();
            inner.in_flight.clear();
            inner.repositories.drain().collect()
        };

        info!(count = repositories.len(), "closing repository pool");
        for (_, repo) in &repositories {
            repo.stop();
        }
        for (_, repo) in &repositories {
            repo.join().await;
        }
    }
}

/// Stop evicted repositories off the caller's path
fn retire<S: crate::session::ClusterSession>(evicted: Vec<(String, Arc<Repository<S>>)>) {
    let runtime = Handle::try_current().ok();
    for (name, repo) in evicted {
        if repo.stop() {
            debug!(context = %name, "evicted context");
        } else {
            warn!(context = %name, "evicted context was already stopped");
        }
        match &runtime {
            Some(handle) => {
                handle.spawn(async move {
                    repo.join().await;
                });
            }
            None => debug!(context = %name, "no runtime, not waiting for evicted context"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Behaviour, FakeCluster, FakeConnector};
    use crate::selector::Selector;
    use k8s_openapi::api::core::v1::Pod;
    use kubedeck_types::{ContextLoadProgress, LoadPhase, ResourceKind};
    use tokio::sync::mpsc;

    fn pod(name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some(name.to_string());
        pod.metadata.namespace = Some("default".to_string());
        pod
    }

    fn connector(names: &[&str]) -> FakeConnector {
        names.iter().fold(FakeConnector::new(), |c, name| {
            c.with_cluster(name, FakeCluster::new().with(pod(&format!("{}-pod", name))))
        })
    }

    fn pool(connector: FakeConnector, max: usize) -> RepositoryPool<FakeConnector> {
        let options = PoolOptions {
            sync_timeout: Duration::from_secs(5),
        };
        RepositoryPool::with_connector(connector, max, options).unwrap()
    }

    fn progress() -> (ProgressSender, mpsc::UnboundedReceiver<ContextLoadProgress>) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ContextLoadProgress>) -> Vec<ContextLoadProgress> {
        let mut events = Vec::new();
        while let Ok(p) = rx.try_recv() {
            events.push(p);
        }
        events
    }

    #[test]
    fn test_max_contexts_validation() {
        for bad in [0, 21, 100] {
            assert!(matches!(
                RepositoryPool::with_connector(FakeConnector::new(), bad, PoolOptions::default()),
                Err(PoolError::Validation { .. })
            ));
        }
        for good in [1, 20] {
            assert!(RepositoryPool::with_connector(FakeConnector::new(), good, PoolOptions::default()).is_ok());
        }
    }

    #[test]
    fn test_new_with_bad_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-config");
        assert!(matches!(
            RepositoryPool::new(&missing, 5),
            Err(PoolError::Config { .. })
        ));
        assert!(matches!(
            RepositoryPool::new(&missing, 0),
            Err(PoolError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_capacity_holds_over_load_sequences() {
        let names = ["a", "b", "c", "d", "e"];
        for max in 1..=3 {
            let pool = pool(connector(&names), max);
            let (tx, _rx) = progress();
            for name in names.iter().chain(names.iter().rev()) {
                pool.load_context(name, &tx).await.unwrap();
                assert!(pool.loaded_contexts().len() <= max, "max={} after {}", max, name);
                assert!(pool.repository(name).is_some());
            }
            pool.close().await;
        }
    }

    #[tokio::test]
    async fn test_active_never_evicted() {
        let pool = pool(connector(&["a", "b", "c", "d"]), 2);
        let (tx, _rx) = progress();

        pool.switch_context("a", &tx).await.unwrap();
        for name in ["b", "c", "d"] {
            pool.load_context(name, &tx).await.unwrap();
            assert!(pool.repository("a").is_some());
            assert_eq!(pool.active_context().as_deref(), Some("a"));
        }
        assert_eq!(pool.loaded_contexts(), vec!["d", "a"]);
        assert_eq!(pool.active_repository().unwrap().context(), "a");
    }

    #[tokio::test]
    async fn test_eviction_scenario() {
        let pool = pool(connector(&["A", "B", "C"]), 2);
        let (tx, _rx) = progress();

        pool.switch_context("A", &tx).await.unwrap();
        pool.load_context("B", &tx).await.unwrap();
        let b = pool.repository("B").unwrap();
        pool.load_context("C", &tx).await.unwrap();

        // B was the least recently used non-active context
        assert!(pool.repository("B").is_none());
        assert_eq!(pool.context_state("B"), None);
        assert!(pool.repository("A").is_some());
        assert!(pool.repository("C").is_some());
        assert!(b.is_stopped());

        // Evicted informers wind down in the background
        tokio::time::timeout(Duration::from_secs(5), async {
            while b.running_tasks() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_eviction_scenario_never_activated() {
        let pool = pool(connector(&["A", "B", "C"]), 2);
        let (tx, _rx) = progress();

        for name in ["A", "B", "C"] {
            pool.load_context(name, &tx).await.unwrap();
        }

        assert_eq!(pool.loaded_contexts(), vec!["C", "B"]);
        assert!(pool.repository("A").is_none());
        assert_eq!(pool.context_state("A"), None);
        assert!(pool.active_context().is_none());
        assert!(matches!(pool.set_active("A"), Err(PoolError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn test_single_slot_pins_active_until_next_activation() {
        let pool = pool(connector(&["a", "b"]), 1);
        let (tx, _rx) = progress();

        pool.switch_context("a", &tx).await.unwrap();
        pool.load_context("b", &tx).await.unwrap();
        assert_eq!(pool.loaded_contexts().len(), 2);

        pool.set_active("b").unwrap();
        assert_eq!(pool.loaded_contexts(), vec!["b"]);
        assert!(pool.repository("a").is_none());
    }

    #[tokio::test]
    async fn test_close_twice() {
        let pool = pool(connector(&["a", "b"]), 5);
        let (tx, _rx) = progress();
        pool.switch_context("a", &tx).await.unwrap();
        pool.load_context("b", &tx).await.unwrap();
        let a = pool.repository("a").unwrap();

        pool.close().await;
        pool.close().await;

        assert!(pool.is_closed());
        assert!(a.is_stopped());
        assert!(pool.active_repository().is_none());
        assert!(pool.loaded_contexts().is_empty());
        assert!(matches!(pool.load_context("a", &tx).await, Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn test_readiness_after_load() {
        let pool = pool(connector(&["a"]), 5);
        let (tx, _rx) = progress();
        pool.switch_context("a", &tx).await.unwrap();

        let repo = pool.active_repository().unwrap();
        assert!(repo.are_typed_informers_ready());
        let pods = repo.list(ResourceKind::Pod, None, &Selector::everything()).unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name(), "a-pod");
        assert_eq!(pool.context_state("a"), Some(ContextState::Ready));
    }

    #[tokio::test]
    async fn test_rbac_isolation() {
        let cluster = FakeCluster::new()
            .with(pod("web"))
            .with_behaviour(ResourceKind::Secret, Behaviour::Forbidden);
        let pool = pool(FakeConnector::new().with_cluster("restricted", cluster), 5);
        let (tx, mut rx) = progress();

        pool.switch_context("restricted", &tx).await.unwrap();
        let repo = pool.active_repository().unwrap();

        assert!(repo.list(ResourceKind::Secret, None, &Selector::everything()).is_err());
        assert_eq!(repo.list(ResourceKind::Pod, None, &Selector::everything()).unwrap().len(), 1);
        assert!(repo.are_typed_informers_ready());
        assert!(drain(&mut rx).last().unwrap().phase.is_complete());
    }

    #[tokio::test]
    async fn test_bad_context_fails_with_connection() {
        let connector = connector(&["good"]).with_unreachable("bad");
        let pool = pool(connector, 5);
        let (tx, mut rx) = progress();

        let err = pool.load_context("bad", &tx).await.unwrap_err();
        assert!(matches!(err, PoolError::Connection { .. }));
        assert!(err.is_context_failure());

        let phases: Vec<LoadPhase> = drain(&mut rx).into_iter().map(|p| p.phase).collect();
        assert_eq!(phases, vec![LoadPhase::Connecting]);
        assert!(matches!(pool.context_state("bad"), Some(ContextState::Failed(_))));
        assert!(pool.repository("bad").is_none());
    }

    #[tokio::test]
    async fn test_switch_to_loaded_emits_nothing() {
        let pool = pool(connector(&["a", "b"]), 5);
        let (tx, mut rx) = progress();

        pool.switch_context("a", &tx).await.unwrap();
        pool.load_context("b", &tx).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 8);

        let switch = pool.switch_context("b", &tx).await.unwrap();
        assert_eq!(
            switch,
            ContextSwitch {
                old: Some("a".to_string()),
                new: "b".to_string()
            }
        );
        assert!(drain(&mut rx).is_empty());
        assert_eq!(pool.loaded_contexts(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_load_ready_context_is_noop() {
        let connector = connector(&["a"]);
        let pool = pool(connector.clone(), 5);
        let (tx, mut rx) = progress();

        pool.load_context("a", &tx).await.unwrap();
        drain(&mut rx);
        pool.load_context("a", &tx).await.unwrap();

        assert!(drain(&mut rx).is_empty());
        assert_eq!(connector.connect_count("a"), 1);
    }

    #[tokio::test]
    async fn test_retry_after_fix() {
        let connector = connector(&[]).with_unreachable("flaky");
        let pool = pool(connector.clone(), 5);
        let (tx, _rx) = progress();

        assert!(matches!(
            pool.retry_failed_context("flaky", &tx).await,
            Err(PoolError::NeverAttempted(_))
        ));

        assert!(pool.load_context("flaky", &tx).await.is_err());
        assert!(pool.context_state("flaky").unwrap().is_failed());

        connector.set_reachable("flaky");
        pool.retry_failed_context("flaky", &tx).await.unwrap();
        assert_eq!(pool.context_state("flaky"), Some(ContextState::Ready));
        assert_eq!(connector.connect_count("flaky"), 2);
    }

    #[tokio::test]
    async fn test_set_active_requires_loaded() {
        let pool = pool(connector(&["a"]), 5);
        assert!(matches!(pool.set_active("a"), Err(PoolError::NotLoaded(_))));
        assert!(pool.active_repository().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_load_rejected() {
        let cluster = FakeCluster::new().with_all(Behaviour::Delayed(Duration::from_millis(100)));
        let pool = Arc::new(pool(FakeConnector::new().with_cluster("slow", cluster), 5));
        let (tx, _rx) = progress();

        let background = {
            let pool = Arc::clone(&pool);
            let tx = tx.clone();
            tokio::spawn(async move { pool.load_context("slow", &tx).await })
        };
        while pool.context_state("slow").is_none() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            pool.load_context("slow", &tx).await,
            Err(PoolError::LoadInProgress(_))
        ));
        background.await.unwrap().unwrap();
        assert_eq!(pool.context_state("slow"), Some(ContextState::Ready));
    }

    fn spawn_load(
        pool: &Arc<RepositoryPool<FakeConnector>>,
        name: &'static str,
        tx: &ProgressSender,
    ) -> tokio::task::JoinHandle<Result<(), PoolError>> {
        let pool = Arc::clone(pool);
        let tx = tx.clone();
        tokio::spawn(async move { pool.load_context(name, &tx).await })
    }

    async fn wait_until_loading(pool: &RepositoryPool<FakeConnector>, name: &str) {
        while pool.context_state(name) != Some(ContextState::Loading) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_switch_waits_for_in_flight_load() {
        let cluster = FakeCluster::new().with_all(Behaviour::Delayed(Duration::from_millis(200)));
        let connector = FakeConnector::new().with_cluster("slow", cluster);
        let pool = Arc::new(pool(connector.clone(), 5));
        let (tx, _rx) = progress();

        let preload = spawn_load(&pool, "slow", &tx);
        wait_until_loading(&pool, "slow").await;

        let switch = pool.switch_context("slow", &tx).await.unwrap();
        assert_eq!(switch.new, "slow");
        assert_eq!(pool.active_context().as_deref(), Some("slow"));
        assert_eq!(pool.context_state("slow"), Some(ContextState::Ready));

        preload.await.unwrap().unwrap();
        assert_eq!(connector.connect_count("slow"), 1);
    }

    #[tokio::test]
    async fn test_switch_returns_failure_of_in_flight_load() {
        let cluster = FakeCluster::new().with_all(Behaviour::Silent);
        let connector = FakeConnector::new().with_cluster("quiet", cluster);
        let options = PoolOptions {
            sync_timeout: Duration::from_millis(100),
        };
        let pool = Arc::new(RepositoryPool::with_connector(connector.clone(), 5, options).unwrap());
        let (tx, _rx) = progress();

        let preload = spawn_load(&pool, "quiet", &tx);
        wait_until_loading(&pool, "quiet").await;

        assert!(matches!(
            pool.switch_context("quiet", &tx).await,
            Err(PoolError::SyncTimeout { .. })
        ));
        assert!(preload.await.unwrap().is_err());
        assert!(pool.active_context().is_none());
        assert!(pool.context_state("quiet").unwrap().is_failed());
        assert_eq!(connector.connect_count("quiet"), 1);
    }

    #[tokio::test]
    async fn test_switch_activates_when_registered() {
        let connector = connector(&["a", "b"]).with_cluster(
            "slow",
            FakeCluster::new().with_all(Behaviour::Delayed(Duration::from_millis(200))),
        );
        let pool = Arc::new(pool(connector, 2));
        let (tx, _rx) = progress();

        pool.switch_context("a", &tx).await.unwrap();

        let switch = {
            let pool = Arc::clone(&pool);
            let tx = tx.clone();
            tokio::spawn(async move { pool.switch_context("slow", &tx).await })
        };
        wait_until_loading(&pool, "slow").await;
        pool.load_context("b", &tx).await.unwrap();

        switch.await.unwrap().unwrap();

        // "a" stops being pinned as soon as "slow" lands, so it goes
        // before the more recently used "b"
        assert_eq!(pool.active_context().as_deref(), Some("slow"));
        assert_eq!(pool.loaded_contexts(), vec!["slow", "b"]);
        assert!(pool.repository("a").is_none());
    }

    #[tokio::test]
    async fn test_dropped_load_clears_in_flight() {
        let cluster = FakeCluster::new().with_all(Behaviour::Delayed(Duration::from_secs(30)));
        let pool = Arc::new(pool(FakeConnector::new().with_cluster("slow", cluster), 5));
        let (tx, _rx) = progress();

        let preload = spawn_load(&pool, "slow", &tx);
        wait_until_loading(&pool, "slow").await;
        preload.abort();
        assert!(preload.await.unwrap_err().is_cancelled());

        assert!(pool.context_state("slow").unwrap().is_failed());
        assert!(pool.inner.lock().in_flight.is_empty());
    }

    #[test]
    fn test_eviction_outside_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let pool = pool(connector(&["a", "b"]), 1);
        let (tx, _rx) = progress();

        let a = runtime.block_on(async {
            pool.switch_context("a", &tx).await.unwrap();
            pool.load_context("b", &tx).await.unwrap();
            pool.repository("a").unwrap()
        });

        pool.set_active("b").unwrap();
        assert_eq!(pool.loaded_contexts(), vec!["b"]);
        assert!(a.is_stopped());

        runtime.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), async {
                while a.running_tasks() > 0 {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .unwrap();
            pool.close().await;
        });
    }
}
