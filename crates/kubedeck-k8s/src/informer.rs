//! Per-kind informer cache
//!
//! Each cache keeps a local snapshot of one resource kind for one context.
//! The watch stream is translated into [`InformerEvent`]s and fed through
//! [`InformerCache::apply`], which is the only place the snapshot changes.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures::StreamExt;
use kube::Resource as KubeResource;
use kube::runtime::watcher;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::error::RepositoryError;
use crate::resource::{KindObject, Resource};
use crate::selector::Selector;
use crate::session::ClusterSession;
use kubedeck_types::{KindReadiness, ResourceKind};

/// Namespace/name key of a cached object
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    fn of<K: KubeResource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        Some(Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone()?,
        })
    }
}

/// Why a watch stream reported an error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchFailure {
    /// The server refused to serve this kind (RBAC denial, kind not served)
    Denied { code: u16, message: String },
    /// Anything the watcher's backoff will retry
    Transient(String),
}

impl From<&watcher::Error> for WatchFailure {
    fn from(err: &watcher::Error) -> Self {
        let response = match err {
            watcher::Error::InitialListFailed(kube::Error::Api(resp))
            | watcher::Error::WatchStartFailed(kube::Error::Api(resp))
            | watcher::Error::WatchFailed(kube::Error::Api(resp)) => Some(resp),
            watcher::Error::WatchError(resp) => Some(resp),
            _ => None,
        };

        match response {
            Some(resp) if matches!(resp.code, 403 | 404) => Self::Denied {
                code: resp.code,
                message: resp.message.clone(),
            },
            _ => Self::Transient(err.to_string()),
        }
    }
}

/// One step of the watch stream as seen by a cache
#[derive(Clone, Debug)]
pub enum InformerEvent<K> {
    /// A (re)list started; following `InitApply`s replace the snapshot
    Init,
    InitApply(K),
    /// The (re)list finished
    InitDone,
    Apply(K),
    Delete(K),
    Error(WatchFailure),
}

impl<K> From<watcher::Event<K>> for InformerEvent<K> {
    fn from(event: watcher::Event<K>) -> Self {
        match event {
            watcher::Event::Init => Self::Init,
            watcher::Event::InitApply(obj) => Self::InitApply(obj),
            watcher::Event::InitDone => Self::InitDone,
            watcher::Event::Apply(obj) => Self::Apply(obj),
            watcher::Event::Delete(obj) => Self::Delete(obj),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct InformerStatus {
    readiness: KindReadiness,
    /// The API server answered at least once (data or a definitive refusal)
    responded: bool,
    last_error: Option<String>,
}

/// Local snapshot of one resource kind
pub struct InformerCache<K> {
    context: String,
    store: RwLock<BTreeMap<ObjectKey, Arc<K>>>,
    /// Objects of an in-progress relist
    staging: Mutex<Option<BTreeMap<ObjectKey, Arc<K>>>>,
    status: RwLock<InformerStatus>,
    changes: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
}

impl<K: KindObject> InformerCache<K> {
    pub fn new(context: &str, changes: Arc<watch::Sender<u64>>, cancel: CancellationToken) -> Self {
        Self {
            context: context.to_string(),
            store: RwLock::new(BTreeMap::new()),
            staging: Mutex::new(None),
            status: RwLock::new(InformerStatus::default()),
            changes,
            cancel,
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut InformerStatus)) {
        f(&mut self.status.write());
        self.changes.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Apply one watch event to the snapshot
    ///
    /// Returns `Break` once the kind is permanently unavailable and the
    /// watch should stop.
    pub fn apply(&self, event: InformerEvent<K>) -> ControlFlow<()> {
        match event {
            InformerEvent::Init => {
                *self.staging.lock() = Some(BTreeMap::new());
            }
            InformerEvent::InitApply(obj) => {
                let Some(key) = ObjectKey::of(&obj) else {
                    return ControlFlow::Continue(());
                };
                let mut staging = self.staging.lock();
                match staging.as_mut() {
                    Some(pending) => {
                        pending.insert(key, Arc::new(obj));
                    }
                    None => {
                        self.store.write().insert(key, Arc::new(obj));
                    }
                }
            }
            InformerEvent::InitDone => {
                if let Some(fresh) = self.staging.lock().take() {
                    *self.store.write() = fresh;
                }
                self.update_status(|status| {
                    status.responded = true;
                    status.last_error = None;
                    if status.readiness == KindReadiness::Pending {
                        status.readiness = KindReadiness::Synced;
                    }
                });
                trace!(context = %self.context, kind = %K::KIND, "informer synced");
            }
            InformerEvent::Apply(obj) => {
                if let Some(key) = ObjectKey::of(&obj) {
                    self.store.write().insert(key, Arc::new(obj));
                }
            }
            InformerEvent::Delete(obj) => {
                if let Some(key) = ObjectKey::of(&obj) {
                    self.store.write().remove(&key);
                }
            }
            InformerEvent::Error(WatchFailure::Denied { code, message }) => {
                debug!(
                    context = %self.context,
                    kind = %K::KIND,
                    code,
                    error = %message,
                    "watch denied, marking kind unavailable"
                );
                self.store.write().clear();
                self.staging.lock().take();
                self.update_status(|status| {
                    status.responded = true;
                    status.readiness = KindReadiness::Unavailable(message);
                });
                return ControlFlow::Break(());
            }
            InformerEvent::Error(WatchFailure::Transient(message)) => {
                debug!(
                    context = %self.context,
                    kind = %K::KIND,
                    error = %message,
                    "watch error, backing off"
                );
                self.update_status(|status| status.last_error = Some(message));
            }
        }
        ControlFlow::Continue(())
    }

    fn check_readable(&self) -> Result<(), RepositoryError> {
        match &self.status.read().readiness {
            KindReadiness::Synced => Ok(()),
            KindReadiness::Pending => Err(RepositoryError::NotReady(K::KIND)),
            KindReadiness::Unavailable(reason) => Err(RepositoryError::Unavailable {
                kind: K::KIND,
                reason: reason.clone(),
            }),
        }
    }

    /// Objects in `namespace` (all namespaces if `None`) matching `selector`
    pub fn list(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<Arc<K>>, RepositoryError> {
        self.check_readable()?;
        let namespace = namespace.filter(|_| K::KIND.is_namespaced());
        let store = self.store.read();
        Ok(store
            .iter()
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace.as_deref() == Some(ns)))
            .filter(|(_, obj)| selector.matches(obj.meta().labels.as_ref()))
            .map(|(_, obj)| Arc::clone(obj))
            .collect())
    }

    pub fn get(&self, namespace: Option<&str>, name: &str) -> Result<Arc<K>, RepositoryError> {
        self.check_readable()?;
        let namespace = namespace.filter(|_| K::KIND.is_namespaced());
        self.store
            .read()
            .get(&ObjectKey::new(namespace, name))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                kind: K::KIND,
                name: name.to_string(),
            })
    }
}

/// Kind-erased view of an informer cache, as held by a repository
pub trait KindCache: Send + Sync {
    fn kind(&self) -> ResourceKind;
    fn readiness(&self) -> KindReadiness;
    fn has_responded(&self) -> bool;
    fn last_error(&self) -> Option<String>;
    fn len(&self) -> usize;
    fn list(&self, namespace: Option<&str>, selector: &Selector)
    -> Result<Vec<Resource>, RepositoryError>;
    fn get(&self, namespace: Option<&str>, name: &str) -> Result<Resource, RepositoryError>;
    /// Give up on this kind: stop its watch and fail reads from now on
    fn mark_unavailable(&self, reason: &str);
}

impl<K: KindObject> KindCache for InformerCache<K> {
    fn kind(&self) -> ResourceKind {
        K::KIND
    }

    fn readiness(&self) -> KindReadiness {
        self.status.read().readiness.clone()
    }

    fn has_responded(&self) -> bool {
        self.status.read().responded
    }

    fn last_error(&self) -> Option<String> {
        self.status.read().last_error.clone()
    }

    fn len(&self) -> usize {
        self.store.read().len()
    }

    fn list(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<Resource>, RepositoryError> {
        Ok(InformerCache::list(self, namespace, selector)?
            .into_iter()
            .map(K::wrap)
            .collect())
    }

    fn get(&self, namespace: Option<&str>, name: &str) -> Result<Resource, RepositoryError> {
        InformerCache::get(self, namespace, name).map(K::wrap)
    }

    fn mark_unavailable(&self, reason: &str) {
        self.cancel.cancel();
        self.update_status(|status| {
            if !status.readiness.is_settled() {
                status.readiness = KindReadiness::Unavailable(reason.to_string());
            }
        });
    }
}

/// Drive `cache` from the session's watch stream until cancelled
pub(crate) fn spawn_informer<K: KindObject, S: ClusterSession>(
    cache: Arc<InformerCache<K>>,
    session: &S,
    tracker: &TaskTracker,
) {
    let mut events = session.watch::<K>();
    let cancel = cache.cancel.clone();

    tracker.spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                event = events.next() => {
                    match event {
                        Some(event) => {
                            if cache.apply(event).is_break() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        trace!(context = %cache.context, kind = %K::KIND, "informer stopped");
    });
}
