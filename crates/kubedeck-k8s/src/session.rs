//! Live access to one cluster
//!
//! A [`ClusterSession`] is everything a repository needs from the API server:
//! watch streams for its informers and pass-through requests for mutations,
//! manifests, events and logs.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{AsyncBufReadExt, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::RemoteError;
use crate::informer::{InformerEvent, WatchFailure};
use crate::resource::{KindObject, api_resource};
use kubedeck_types::ResourceKind;

/// Server-side watch timeout, kept below the client read timeout so idle
/// watches are closed by the server and resumed rather than timing out
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Options for fetching container logs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogRequest {
    /// Container name; the pod's only container when `None`
    pub container: Option<String>,
    /// Number of trailing lines, all lines when `None`
    pub tail: Option<i64>,
    pub follow: bool,
}

impl LogRequest {
    fn params(&self, follow: bool) -> LogParams {
        LogParams {
            follow,
            container: self.container.clone(),
            tail_lines: self.tail,
            ..Default::default()
        }
    }
}

/// A connected cluster
#[async_trait]
pub trait ClusterSession: Send + Sync + 'static {
    /// Event stream driving the informer for kind `K`
    fn watch<K: KindObject>(&self) -> BoxStream<'static, InformerEvent<K>>;

    /// Current object from the server as JSON
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<serde_json::Value, RemoteError>;

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), RemoteError>;

    async fn scale(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        replicas: i32,
    ) -> Result<(), RemoteError>;

    /// Events whose involved object is `name`
    async fn events_for(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Vec<Event>, RemoteError>;

    async fn logs(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<String, RemoteError>;

    /// Follow a container's log; the stream ends when the container does
    async fn follow_logs(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<BoxStream<'static, Result<String, RemoteError>>, RemoteError>;
}

/// [`ClusterSession`] backed by a `kube::Client`
#[derive(Clone)]
pub struct KubeSession {
    client: Client,
}

impl KubeSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn dynamic_api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(kind);
        if !kind.is_namespaced() {
            return Api::all_with(self.client.clone(), &ar);
        }
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::default_namespaced_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ClusterSession for KubeSession {
    fn watch<K: KindObject>(&self) -> BoxStream<'static, InformerEvent<K>> {
        let api: Api<K> = Api::all(self.client.clone());
        watcher(api, watcher::Config::default().timeout(WATCH_TIMEOUT_SECS))
            .default_backoff()
            .map(|event| match event {
                Ok(event) => InformerEvent::from(event),
                Err(err) => InformerEvent::Error(WatchFailure::from(&err)),
            })
            .boxed()
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<serde_json::Value, RemoteError> {
        let obj = self.dynamic_api(kind, namespace).get(name).await?;
        serde_json::to_value(obj)
            .map_err(|e| RemoteError::new("InvalidObject", 0, e.to_string()))
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), RemoteError> {
        self.dynamic_api(kind, namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn scale(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        replicas: i32,
    ) -> Result<(), RemoteError> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.dynamic_api(kind, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn events_for(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Vec<Event>, RemoteError> {
        let api: Api<Event> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let params = ListParams::default().fields(&format!("involvedObject.name={}", name));
        Ok(api.list(&params).await?.items)
    }

    async fn logs(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<String, RemoteError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.logs(pod, &request.params(false)).await?)
    }

    async fn follow_logs(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<BoxStream<'static, Result<String, RemoteError>>, RemoteError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = request.params(true);
        let pod_name = pod.to_string();
        let (opened_tx, opened_rx) = oneshot::channel();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let reader = match api.log_stream(&pod_name, &params).await {
                Ok(reader) => {
                    let _ = opened_tx.send(Ok(()));
                    reader
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(RemoteError::from(e)));
                    return;
                }
            };

            let mut lines = reader.lines();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,

                    result = lines.try_next() => {
                        let item = match result {
                            Ok(Some(line)) => Ok(line),
                            Ok(None) => break,
                            Err(e) => Err(RemoteError::new("StreamError", 0, e.to_string())),
                        };
                        let failed = item.is_err();
                        if tx.send(item).is_err() || failed {
                            break;
                        }
                    }
                }
            }
            debug!(pod = %pod_name, "log stream closed");
        });

        // A refused request fails the call itself rather than the stream
        opened_rx
            .await
            .map_err(|_| RemoteError::new("StreamError", 0, "log stream task ended"))??;

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}
