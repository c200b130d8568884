//! In-memory clusters for tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, future};
use k8s_openapi::api::core::v1::Event;
use parking_lot::Mutex;
use serde_json::Value;

use crate::connector::Connector;
use crate::error::{ConnectError, RemoteError};
use crate::informer::{InformerEvent, WatchFailure};
use crate::resource::KindObject;
use crate::session::{ClusterSession, LogRequest};
use kubedeck_types::{ContextInfo, ResourceKind, SelectedResource};

/// How a fake cluster answers the watch for one kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Behaviour {
    /// List the stored objects, then stay quiet
    #[default]
    Normal,
    /// Same as `Normal` after a delay
    Delayed(Duration),
    /// RBAC denial
    Forbidden,
    /// Transport errors only
    Erroring,
    /// Never answers
    Silent,
}

#[derive(Default)]
struct ClusterState {
    objects: HashMap<ResourceKind, Vec<Value>>,
    behaviours: HashMap<ResourceKind, Behaviour>,
    deleted: Vec<String>,
    scaled: Vec<(String, i32)>,
}

/// A fake API server; clones share state
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

fn matches_key(value: &Value, kind: ResourceKind, namespace: Option<&str>, name: &str) -> bool {
    let meta = &value["metadata"];
    meta["name"].as_str() == Some(name)
        && (!kind.is_namespaced() || namespace.is_none() || meta["namespace"].as_str() == namespace)
}

fn not_found(kind: ResourceKind, name: &str) -> RemoteError {
    RemoteError::new("NotFound", 404, format!("{} \"{}\" not found", kind, name))
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, kind: ResourceKind, value: Value) -> Self {
        self.state.lock().objects.entry(kind).or_default().push(value);
        self
    }

    /// Store a typed object
    pub fn with<K: KindObject>(self, obj: K) -> Self {
        let value = serde_json::to_value(&obj).unwrap();
        self.with_object(K::KIND, value)
    }

    pub fn with_behaviour(self, kind: ResourceKind, behaviour: Behaviour) -> Self {
        self.state.lock().behaviours.insert(kind, behaviour);
        self
    }

    /// Apply `behaviour` to every kind
    pub fn with_all(self, behaviour: Behaviour) -> Self {
        {
            let mut state = self.state.lock();
            for kind in ResourceKind::ALL {
                state.behaviours.insert(kind, behaviour.clone());
            }
        }
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    pub fn scaled(&self) -> Vec<(String, i32)> {
        self.state.lock().scaled.clone()
    }

    fn find(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Option<Value> {
        self.state
            .lock()
            .objects
            .get(&kind)?
            .iter()
            .find(|v| matches_key(v, kind, namespace, name))
            .cloned()
    }
}

#[async_trait]
impl ClusterSession for FakeCluster {
    fn watch<K: KindObject>(&self) -> BoxStream<'static, InformerEvent<K>> {
        let state = self.state.lock();
        let behaviour = state.behaviours.get(&K::KIND).cloned().unwrap_or_default();

        let listing = || {
            let objects = state.objects.get(&K::KIND).cloned().unwrap_or_default();
            let mut events = vec![InformerEvent::Init];
            events.extend(
                objects
                    .into_iter()
                    .filter_map(|v| serde_json::from_value::<K>(v).ok())
                    .map(InformerEvent::InitApply),
            );
            events.push(InformerEvent::InitDone);
            events
        };

        match behaviour {
            Behaviour::Normal => stream::iter(listing()).chain(stream::pending()).boxed(),
            Behaviour::Delayed(delay) => stream::once(tokio::time::sleep(delay))
                .filter_map(|_| future::ready(None))
                .chain(stream::iter(listing()))
                .chain(stream::pending())
                .boxed(),
            Behaviour::Forbidden => stream::iter(vec![InformerEvent::Error(WatchFailure::Denied {
                code: 403,
                message: format!("{} is forbidden", K::KIND),
            })])
            .chain(stream::pending())
            .boxed(),
            Behaviour::Erroring => stream::iter(vec![InformerEvent::Error(
                WatchFailure::Transient("connection refused".to_string()),
            )])
            .chain(stream::pending())
            .boxed(),
            Behaviour::Silent => stream::pending().boxed(),
        }
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value, RemoteError> {
        self.find(kind, namespace, name)
            .ok_or_else(|| not_found(kind, name))
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        let objects = state.objects.entry(kind).or_default();
        let before = objects.len();
        objects.retain(|v| !matches_key(v, kind, namespace, name));
        if objects.len() == before {
            return Err(not_found(kind, name));
        }
        let target = SelectedResource::new(kind, namespace.map(str::to_string), name);
        state.deleted.push(target.to_string());
        Ok(())
    }

    async fn scale(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        replicas: i32,
    ) -> Result<(), RemoteError> {
        if self.find(kind, namespace, name).is_none() {
            return Err(not_found(kind, name));
        }
        let target = SelectedResource::new(kind, namespace.map(str::to_string), name);
        self.state.lock().scaled.push((target.to_string(), replicas));
        Ok(())
    }

    async fn events_for(
        &self,
        _namespace: Option<&str>,
        _name: &str,
    ) -> Result<Vec<Event>, RemoteError> {
        Ok(Vec::new())
    }

    async fn logs(
        &self,
        namespace: &str,
        pod: &str,
        _request: &LogRequest,
    ) -> Result<String, RemoteError> {
        if self.find(ResourceKind::Pod, Some(namespace), pod).is_none() {
            return Err(not_found(ResourceKind::Pod, pod));
        }
        Ok(format!("started {}\nready {}\n", pod, pod))
    }

    async fn follow_logs(
        &self,
        namespace: &str,
        pod: &str,
        _request: &LogRequest,
    ) -> Result<BoxStream<'static, Result<String, RemoteError>>, RemoteError> {
        if self.find(ResourceKind::Pod, Some(namespace), pod).is_none() {
            return Err(not_found(ResourceKind::Pod, pod));
        }
        let lines = vec![Ok(format!("started {}", pod)), Ok(format!("ready {}", pod))];
        Ok(stream::iter(lines).boxed())
    }
}

#[derive(Default)]
struct ConnectorState {
    clusters: BTreeMap<String, FakeCluster>,
    unreachable: HashSet<String>,
    connects: HashMap<String, usize>,
}

/// A set of fake clusters addressed by context name; clones share state
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(self, context: &str, cluster: FakeCluster) -> Self {
        self.state
            .lock()
            .clusters
            .insert(context.to_string(), cluster);
        self
    }

    /// A context whose API server refuses connections
    pub fn with_unreachable(self, context: &str) -> Self {
        {
            let mut state = self.state.lock();
            state
                .clusters
                .entry(context.to_string())
                .or_insert_with(FakeCluster::new);
            state.unreachable.insert(context.to_string());
        }
        self
    }

    pub fn set_reachable(&self, context: &str) {
        self.state.lock().unreachable.remove(context);
    }

    pub fn connect_count(&self, context: &str) -> usize {
        self.state.lock().connects.get(context).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeCluster;

    fn contexts(&self) -> Vec<ContextInfo> {
        self.state
            .lock()
            .clusters
            .keys()
            .map(|name| {
                ContextInfo::new(
                    name.clone(),
                    format!("{}-cluster", name),
                    format!("{}-user", name),
                    None,
                    false,
                )
            })
            .collect()
    }

    async fn connect(&self, context: &str) -> Result<FakeCluster, ConnectError> {
        let mut state = self.state.lock();
        *state.connects.entry(context.to_string()).or_default() += 1;
        if state.unreachable.contains(context) {
            return Err(ConnectError::Unreachable("connection refused".to_string()));
        }
        state
            .clusters
            .get(context)
            .cloned()
            .ok_or_else(|| ConnectError::UnknownContext(context.to_string()))
    }
}
