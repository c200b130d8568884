//! Typed resource union over the supported kinds

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolumeClaim, Pod, Secret, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource as KubeResource;
use kube::core::ApiResource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::informer::{InformerCache, KindCache, spawn_informer};
use crate::session::ClusterSession;
use kubedeck_types::ResourceKind;

/// A Kubernetes object type that has an informer in every repository
pub trait KindObject:
    KubeResource<DynamicType = ()>
    + Clone
    + Debug
    + Default
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    const KIND: ResourceKind;

    fn wrap(obj: Arc<Self>) -> Resource;
}

fn start<K: KindObject, S: ClusterSession>(
    session: &S,
    context: &str,
    changes: &Arc<watch::Sender<u64>>,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
    caches: &mut HashMap<ResourceKind, Arc<dyn KindCache>>,
) {
    let cache = Arc::new(InformerCache::<K>::new(
        context,
        Arc::clone(changes),
        cancel.child_token(),
    ));
    spawn_informer(Arc::clone(&cache), session, tracker);
    caches.insert(K::KIND, cache);
}

macro_rules! resource_kinds {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// A cached object of one of the supported kinds
        #[derive(Clone, Debug)]
        pub enum Resource {
            $($variant(Arc<$ty>),)*
        }

        $(
            impl KindObject for $ty {
                const KIND: ResourceKind = ResourceKind::$variant;

                fn wrap(obj: Arc<Self>) -> Resource {
                    Resource::$variant(obj)
                }
            }
        )*

        impl Resource {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(Self::$variant(_) => ResourceKind::$variant,)*
                }
            }

            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Self::$variant(obj) => obj.meta(),)*
                }
            }

            /// Full object as JSON, including apiVersion and kind
            pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
                match self {
                    $(Self::$variant(obj) => serde_json::to_value(obj.as_ref()),)*
                }
            }
        }

        /// API coordinates for a kind
        pub fn api_resource(kind: ResourceKind) -> ApiResource {
            match kind {
                $(ResourceKind::$variant => ApiResource::erase::<$ty>(&()),)*
            }
        }

        /// Start one informer task per kind against `session`
        pub(crate) fn start_informers<S: ClusterSession>(
            session: &S,
            context: &str,
            changes: &Arc<watch::Sender<u64>>,
            cancel: &CancellationToken,
            tracker: &TaskTracker,
        ) -> HashMap<ResourceKind, Arc<dyn KindCache>> {
            let mut caches = HashMap::new();
            $(start::<$ty, S>(session, context, changes, cancel, tracker, &mut caches);)*
            caches
        }
    };
}

resource_kinds! {
    Pod => Pod,
    Deployment => Deployment,
    Service => Service,
    ConfigMap => ConfigMap,
    Secret => Secret,
    Namespace => Namespace,
    StatefulSet => StatefulSet,
    DaemonSet => DaemonSet,
    Job => Job,
    CronJob => CronJob,
    Node => Node,
    ReplicaSet => ReplicaSet,
    PersistentVolumeClaim => PersistentVolumeClaim,
    Ingress => Ingress,
    Endpoints => Endpoints,
    HorizontalPodAutoscaler => HorizontalPodAutoscaler,
}

impl Resource {
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }

    pub fn selected(&self) -> kubedeck_types::SelectedResource {
        kubedeck_types::SelectedResource::new(
            self.kind(),
            self.namespace().map(str::to_string),
            self.name(),
        )
    }
}
