//! Multi-context Kubernetes resource cache for kubedeck
//!
//! This crate keeps watch-backed caches of cluster resources for a bounded
//! number of kubeconfig contexts, and passes mutations, manifests and logs
//! through to the live API server.

mod connector;
mod error;
mod informer;
mod load;
mod pool;
mod render;
mod repository;
mod resource;
mod selector;
mod session;
mod summary;

#[cfg(test)]
mod fake;

pub use connector::{Connector, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, KubeConnector};
pub use error::{ConnectError, PoolError, RemoteError, RepositoryError};
pub use informer::{InformerCache, InformerEvent, KindCache, ObjectKey, WatchFailure};
pub use load::{ProgressSender, SYNC_TIMED_OUT};
pub use pool::{
    ContextSwitch, DEFAULT_SYNC_TIMEOUT, MAX_CONTEXTS_LIMIT, PoolOptions, RepositoryPool,
};
pub use repository::{Handshake, LogOutput, Repository};
pub use resource::{KindObject, Resource, api_resource};
pub use selector::Selector;
pub use session::{ClusterSession, KubeSession, LogRequest};

// Re-export types that are used in our public API
pub use kubedeck_types::{
    ContextInfo, ContextLoadProgress, ContextState, KindReadiness, LoadPhase, ResourceKind,
    ResourceSummary, SelectedResource,
};
