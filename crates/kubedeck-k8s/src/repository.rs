//! Resource repository for one context
//!
//! A [`Repository`] owns the session bound to its context and one informer
//! cache per supported kind. Reads are served from the caches; mutations and
//! manifest/log requests go straight to the API server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::error::{RemoteError, RepositoryError};
use crate::informer::KindCache;
use crate::render;
use crate::resource::{Resource, start_informers};
use crate::selector::Selector;
use crate::session::{ClusterSession, KubeSession, LogRequest};
use kubedeck_types::{KindReadiness, ResourceKind, ResourceSummary, SelectedResource};

/// Result of a log request
pub enum LogOutput {
    Snapshot(String),
    /// Lines as they are written, until the container exits or the stream is dropped
    Stream(BoxStream<'static, Result<String, RemoteError>>),
}

impl std::fmt::Debug for LogOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(text) => f.debug_tuple("Snapshot").field(&text.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// How far the informers got in their first exchange with the API server
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Kinds the server answered for (data or a definitive refusal)
    pub responded: usize,
    /// Kinds that have only seen transport errors so far
    pub erroring: usize,
    pub total: usize,
}

impl Handshake {
    /// Every kind has either been answered or has failed at least once
    pub fn is_settled(&self) -> bool {
        self.responded + self.erroring >= self.total
    }
}

pub struct Repository<S: ClusterSession = KubeSession> {
    context: String,
    session: S,
    caches: HashMap<ResourceKind, Arc<dyn KindCache>>,
    changes: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    stopped: AtomicBool,
}

impl<S: ClusterSession> Repository<S> {
    /// Start one informer per supported kind; must run inside a tokio runtime
    pub fn start(context: &str, session: S) -> Self {
        let (changes, _) = watch::channel(0u64);
        let changes = Arc::new(changes);
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        let caches = start_informers(&session, context, &changes, &cancel, &tasks);
        tasks.close();

        info!(context = %context, kinds = caches.len(), "started informers");

        Self {
            context: context.to_string(),
            session,
            caches,
            changes,
            cancel,
            tasks,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn cache(&self, kind: ResourceKind) -> Result<&Arc<dyn KindCache>, RepositoryError> {
        if self.is_stopped() {
            return Err(RepositoryError::Stopped(self.context.clone()));
        }
        self.caches
            .get(&kind)
            .ok_or_else(|| RepositoryError::Unsupported(format!("{} are not cached", kind)))
    }

    // ------------------------------------------------------------------------
    // Cached reads
    // ------------------------------------------------------------------------

    /// Cached objects of `kind` in `namespace` (all namespaces if `None`)
    pub fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<Resource>, RepositoryError> {
        self.cache(kind)?.list(namespace, selector)
    }

    /// Table rows for `kind`, sorted by namespace then name
    pub fn summaries(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<ResourceSummary>, RepositoryError> {
        let mut rows: Vec<ResourceSummary> = self
            .list(kind, namespace, selector)?
            .iter()
            .map(Resource::summary)
            .collect();
        rows.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(rows)
    }

    pub fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Resource, RepositoryError> {
        self.cache(kind)?.get(namespace, name)
    }

    pub fn readiness(&self, kind: ResourceKind) -> KindReadiness {
        self.caches
            .get(&kind)
            .map(|c| c.readiness())
            .unwrap_or_default()
    }

    /// Readiness of every kind, in display order
    pub fn readiness_summary(&self) -> Vec<(ResourceKind, KindReadiness)> {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, self.readiness(kind)))
            .collect()
    }

    /// Every kind is synced or permanently unavailable
    pub fn are_typed_informers_ready(&self) -> bool {
        self.caches.values().all(|c| c.readiness().is_settled())
    }

    pub fn unavailable_kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| matches!(self.readiness(*kind), KindReadiness::Unavailable(_)))
            .collect()
    }

    pub fn handshake(&self) -> Handshake {
        let mut handshake = Handshake {
            total: self.caches.len(),
            ..Default::default()
        };
        for cache in self.caches.values() {
            if cache.has_responded() {
                handshake.responded += 1;
            } else if cache.last_error().is_some() {
                handshake.erroring += 1;
            }
        }
        handshake
    }

    /// First transport error reported by any kind that never got an answer
    pub fn first_error(&self) -> Option<String> {
        ResourceKind::ALL
            .into_iter()
            .filter_map(|kind| self.caches.get(&kind))
            .filter(|c| !c.has_responded())
            .find_map(|c| c.last_error())
    }

    /// Wait until `done` holds or `deadline` passes; returns the final check
    pub async fn wait_until(&self, deadline: Instant, mut done: impl FnMut(&Self) -> bool) -> bool {
        let mut changes = self.changes.subscribe();
        loop {
            changes.borrow_and_update();
            if done(self) {
                return true;
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                _ => return done(self),
            }
        }
    }

    /// Give up on kinds that are still pending; returns the kinds marked
    pub fn mark_pending_unavailable(&self, reason: &str) -> Vec<ResourceKind> {
        let mut marked = Vec::new();
        for kind in ResourceKind::ALL {
            if let Some(cache) = self.caches.get(&kind) {
                if cache.readiness() == KindReadiness::Pending {
                    cache.mark_unavailable(reason);
                    marked.push(kind);
                }
            }
        }
        marked
    }

    // ------------------------------------------------------------------------
    // Live requests
    // ------------------------------------------------------------------------

    fn live(&self) -> Result<(), RepositoryError> {
        if self.is_stopped() {
            Err(RepositoryError::Stopped(self.context.clone()))
        } else {
            Ok(())
        }
    }

    pub async fn delete(&self, target: &SelectedResource) -> Result<(), RepositoryError> {
        self.live()?;
        self.session
            .delete(target.kind, target.namespace.as_deref(), &target.name)
            .await?;
        info!(context = %self.context, resource = %target, "deleted");
        Ok(())
    }

    pub async fn scale(
        &self,
        target: &SelectedResource,
        replicas: i32,
    ) -> Result<(), RepositoryError> {
        self.live()?;
        if !target.kind.is_scalable() {
            return Err(RepositoryError::Unsupported(format!(
                "{} cannot be scaled",
                target.kind
            )));
        }
        if replicas < 0 {
            return Err(RepositoryError::Invalid(format!(
                "replica count must not be negative, got {}",
                replicas
            )));
        }
        self.session
            .scale(target.kind, target.namespace.as_deref(), &target.name, replicas)
            .await?;
        info!(context = %self.context, resource = %target, replicas, "scaled");
        Ok(())
    }

    /// Live manifest as YAML
    pub async fn get_yaml(&self, target: &SelectedResource) -> Result<String, RepositoryError> {
        self.live()?;
        let value = self
            .session
            .fetch(target.kind, target.namespace.as_deref(), &target.name)
            .await?;
        render::to_yaml(value)
    }

    /// Describe output for the live object and its recent events
    pub async fn describe(&self, target: &SelectedResource) -> Result<String, RepositoryError> {
        self.live()?;
        let namespace = target.namespace.as_deref();
        let value = self.session.fetch(target.kind, namespace, &target.name).await?;

        // Events are best-effort; a denied event list still yields a description
        let events = match self.session.events_for(namespace, &target.name).await {
            Ok(events) => events
                .into_iter()
                .filter(|e| {
                    e.involved_object.kind.as_deref() == Some(target.kind.kind_name())
                })
                .collect(),
            Err(e) => {
                debug!(context = %self.context, resource = %target, error = %e, "could not list events");
                Vec::new()
            }
        };

        Ok(render::describe(&value, &events, chrono::Utc::now()))
    }

    pub async fn get_logs(
        &self,
        target: &SelectedResource,
        request: &LogRequest,
    ) -> Result<LogOutput, RepositoryError> {
        self.live()?;
        if target.kind != ResourceKind::Pod {
            return Err(RepositoryError::Unsupported(format!(
                "logs are only available for pods, not {}",
                target.kind
            )));
        }
        let Some(namespace) = target.namespace.as_deref() else {
            return Err(RepositoryError::Invalid(format!(
                "pod '{}' has no namespace",
                target.name
            )));
        };

        if request.follow {
            let stream = self
                .session
                .follow_logs(namespace, &target.name, request)
                .await?;
            Ok(LogOutput::Stream(stream))
        } else {
            let text = self.session.logs(namespace, &target.name, request).await?;
            Ok(LogOutput::Snapshot(text))
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Cancel every informer; returns false if already stopped
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();
        debug!(context = %self.context, "stopping informers");
        true
    }

    /// Wait for the informer tasks to exit after [`stop`](Self::stop)
    pub async fn join(&self) {
        self.tasks.wait().await;
        debug!(context = %self.context, "informers stopped");
    }

    /// Informer tasks still running
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }
}

impl<S: ClusterSession> Drop for Repository<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
