//! Shared types for kubedeck
//!
//! This crate contains data structures passed between the resource cache and
//! the terminal UI.

use chrono::{DateTime, Utc};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Contexts
// ============================================================================

/// Kubernetes context information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextInfo {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
    pub is_current: bool,
}

impl ContextInfo {
    pub fn new(
        name: String,
        cluster: String,
        user: String,
        namespace: Option<String>,
        is_current: bool,
    ) -> Self {
        Self {
            name,
            cluster,
            user,
            namespace,
            is_current,
        }
    }
}

/// Lifecycle state of a context inside the repository pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    Loading,
    Ready,
    Failed(String),
}

impl ContextState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Loading => Color::Yellow,
            Self::Ready => Color::Green,
            Self::Failed(_) => Color::Red,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

// ============================================================================
// Load progress
// ============================================================================

/// One step of a context load, in the order they are reported
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPhase {
    Connecting = 0,
    Establishing = 1,
    Syncing = 2,
    Complete = 3,
}

impl LoadPhase {
    pub const ALL: [LoadPhase; 4] = [
        Self::Connecting,
        Self::Establishing,
        Self::Syncing,
        Self::Complete,
    ];

    /// Wire ordinal (0..=3)
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::Establishing => "Establishing",
            Self::Syncing => "Syncing",
            Self::Complete => "Complete",
        }
    }

    /// The phase that legally follows this one
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Establishing),
            Self::Establishing => Some(Self::Syncing),
            Self::Syncing => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single progress report for a loading context
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextLoadProgress {
    pub context: String,
    pub message: String,
    pub phase: LoadPhase,
}

impl ContextLoadProgress {
    pub fn new(context: impl Into<String>, message: impl Into<String>, phase: LoadPhase) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            phase,
        }
    }
}

/// Messages the cache delivers to the UI event loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheMessage {
    Progress(ContextLoadProgress),
    Loaded { context: String },
    LoadFailed { context: String, error: String },
    Switched { old: Option<String>, new: String },
    /// A mutation issued from the command bar succeeded
    OperationDone { message: String },
    OperationFailed { message: String },
}

// ============================================================================
// Resource kinds
// ============================================================================

/// The resource kinds every repository keeps an informer for
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Deployment,
    Service,
    ConfigMap,
    Secret,
    Namespace,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
    Node,
    ReplicaSet,
    PersistentVolumeClaim,
    Ingress,
    Endpoints,
    HorizontalPodAutoscaler,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 16] = [
        Self::Pod,
        Self::Deployment,
        Self::Service,
        Self::ConfigMap,
        Self::Secret,
        Self::Namespace,
        Self::StatefulSet,
        Self::DaemonSet,
        Self::Job,
        Self::CronJob,
        Self::Node,
        Self::ReplicaSet,
        Self::PersistentVolumeClaim,
        Self::Ingress,
        Self::Endpoints,
        Self::HorizontalPodAutoscaler,
    ];

    /// Plural resource name as used by kubectl
    pub fn plural(self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::Deployment => "deployments",
            Self::Service => "services",
            Self::ConfigMap => "configmaps",
            Self::Secret => "secrets",
            Self::Namespace => "namespaces",
            Self::StatefulSet => "statefulsets",
            Self::DaemonSet => "daemonsets",
            Self::Job => "jobs",
            Self::CronJob => "cronjobs",
            Self::Node => "nodes",
            Self::ReplicaSet => "replicasets",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::Ingress => "ingresses",
            Self::Endpoints => "endpoints",
            Self::HorizontalPodAutoscaler => "horizontalpodautoscalers",
        }
    }

    /// kubectl short name
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Pod => "po",
            Self::Deployment => "deploy",
            Self::Service => "svc",
            Self::ConfigMap => "cm",
            Self::Secret => "secret",
            Self::Namespace => "ns",
            Self::StatefulSet => "sts",
            Self::DaemonSet => "ds",
            Self::Job => "job",
            Self::CronJob => "cj",
            Self::Node => "no",
            Self::ReplicaSet => "rs",
            Self::PersistentVolumeClaim => "pvc",
            Self::Ingress => "ing",
            Self::Endpoints => "ep",
            Self::HorizontalPodAutoscaler => "hpa",
        }
    }

    /// Kind name as it appears in object manifests
    pub fn kind_name(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Namespace => "Namespace",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
            Self::CronJob => "CronJob",
            Self::Node => "Node",
            Self::ReplicaSet => "ReplicaSet",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::Ingress => "Ingress",
            Self::Endpoints => "Endpoints",
            Self::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
        }
    }

    pub fn is_namespaced(self) -> bool {
        !matches!(self, Self::Namespace | Self::Node)
    }

    pub fn is_scalable(self) -> bool {
        matches!(self, Self::Deployment | Self::StatefulSet | Self::ReplicaSet)
    }

    /// Next kind in display order, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous kind in display order, wrapping around
    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Error returned when a kind name is not recognized
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    /// Accepts plural, singular, short and manifest names, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| {
                wanted == kind.plural()
                    || wanted == kind.short_name()
                    || wanted == kind.kind_name().to_lowercase()
            })
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Sync state of one kind's informer
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum KindReadiness {
    /// Initial list has not completed yet
    #[default]
    Pending,
    /// Initial list completed; the snapshot follows the watch
    Synced,
    /// Permanently unavailable for this repository (e.g. RBAC denied)
    Unavailable(String),
}

impl KindReadiness {
    /// Synced or permanently given up on
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ============================================================================
// Resource rows
// ============================================================================

/// Identifies the resource a command operates on
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectedResource {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl SelectedResource {
    pub fn new(kind: ResourceKind, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace,
            name: name.into(),
        }
    }
}

impl fmt::Display for SelectedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// One row of a resource table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
}

impl ResourceSummary {
    pub fn selected(&self) -> SelectedResource {
        SelectedResource::new(self.kind, self.namespace.clone(), self.name.clone())
    }

    /// kubectl-style age ("45s", "12m", "3h", "9d")
    pub fn age(&self, now: DateTime<Utc>) -> String {
        match self.created {
            Some(created) => format_age(now.signed_duration_since(created)),
            None => "<unknown>".to_string(),
        }
    }
}

pub fn format_age(elapsed: chrono::TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 24 * 60 * 60 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_phase_ordinals() {
        let ordinals: Vec<u8> = LoadPhase::ALL.iter().map(|p| p.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        assert!(LoadPhase::Complete.is_complete());
        assert!(!LoadPhase::Syncing.is_complete());
        assert_eq!(LoadPhase::Syncing.next(), Some(LoadPhase::Complete));
        assert_eq!(LoadPhase::Complete.next(), None);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("pods".parse::<ResourceKind>(), Ok(ResourceKind::Pod));
        assert_eq!("po".parse::<ResourceKind>(), Ok(ResourceKind::Pod));
        assert_eq!("Deployment".parse::<ResourceKind>(), Ok(ResourceKind::Deployment));
        assert_eq!("HPA".parse::<ResourceKind>(), Ok(ResourceKind::HorizontalPodAutoscaler));
        assert_eq!(
            "persistentvolumeclaim".parse::<ResourceKind>(),
            Ok(ResourceKind::PersistentVolumeClaim)
        );
        assert!("widgets".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_cycle_wraps() {
        assert_eq!(ResourceKind::HorizontalPodAutoscaler.next(), ResourceKind::Pod);
        assert_eq!(ResourceKind::Pod.prev(), ResourceKind::HorizontalPodAutoscaler);
        assert_eq!(ResourceKind::ALL.len(), 16);
    }

    #[test]
    fn test_cluster_scoped_kinds() {
        assert!(!ResourceKind::Node.is_namespaced());
        assert!(!ResourceKind::Namespace.is_namespaced());
        assert!(ResourceKind::Pod.is_namespaced());
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(chrono::TimeDelta::seconds(42)), "42s");
        assert_eq!(format_age(chrono::TimeDelta::seconds(150)), "2m");
        assert_eq!(format_age(chrono::TimeDelta::hours(5)), "5h");
        assert_eq!(format_age(chrono::TimeDelta::days(3)), "3d");
        assert_eq!(format_age(chrono::TimeDelta::seconds(-5)), "0s");
    }

    #[test]
    fn test_selected_resource_display() {
        let pod = SelectedResource::new(ResourceKind::Pod, Some("default".into()), "web-0");
        assert_eq!(pod.to_string(), "pods/default/web-0");
        let node = SelectedResource::new(ResourceKind::Node, None, "node-a");
        assert_eq!(node.to_string(), "nodes/node-a");
    }
}
