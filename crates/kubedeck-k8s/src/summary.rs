//! One-line status summaries for resource tables

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolumeClaim, Pod, Secret, Service,
};
use k8s_openapi::api::networking::v1::Ingress;

use crate::resource::Resource;
use kubedeck_types::ResourceSummary;

impl Resource {
    /// Table row for this object
    pub fn summary(&self) -> ResourceSummary {
        let meta = self.meta();
        let status = if meta.deletion_timestamp.is_some() {
            "Terminating".to_string()
        } else {
            self.status_text()
        };

        ResourceSummary {
            kind: self.kind(),
            name: self.name().to_string(),
            namespace: self.namespace().map(str::to_string),
            status,
            created: meta.creation_timestamp.as_ref().map(|t| t.0),
        }
    }

    fn status_text(&self) -> String {
        match self {
            Self::Pod(pod) => pod_status(pod),
            Self::Deployment(d) => deployment_status(d),
            Self::Service(s) => service_status(s),
            Self::ConfigMap(cm) => config_map_status(cm),
            Self::Secret(s) => secret_status(s),
            Self::Namespace(ns) => namespace_status(ns),
            Self::StatefulSet(s) => stateful_set_status(s),
            Self::DaemonSet(d) => daemon_set_status(d),
            Self::Job(j) => job_status(j),
            Self::CronJob(c) => cron_job_status(c),
            Self::Node(n) => node_status(n),
            Self::ReplicaSet(r) => replica_set_status(r),
            Self::PersistentVolumeClaim(p) => pvc_status(p),
            Self::Ingress(i) => ingress_status(i),
            Self::Endpoints(e) => endpoints_status(e),
            Self::HorizontalPodAutoscaler(h) => hpa_status(h),
        }
    }
}

fn ready_of(ready: Option<i32>, desired: Option<i32>) -> String {
    format!("{}/{}", ready.unwrap_or(0), desired.unwrap_or(0))
}

/// Phase, or the reason a container is stuck waiting (CrashLoopBackOff etc.)
fn pod_status(pod: &Pod) -> String {
    let Some(status) = &pod.status else {
        return "Unknown".to_string();
    };

    let waiting = status
        .container_statuses
        .iter()
        .flatten()
        .filter_map(|cs| cs.state.as_ref()?.waiting.as_ref()?.reason.clone())
        .next();

    waiting
        .or_else(|| status.reason.clone())
        .or_else(|| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn deployment_status(d: &Deployment) -> String {
    ready_of(
        d.status.as_ref().and_then(|s| s.ready_replicas),
        d.spec.as_ref().and_then(|s| s.replicas),
    )
}

fn stateful_set_status(s: &StatefulSet) -> String {
    ready_of(
        s.status.as_ref().and_then(|s| s.ready_replicas),
        s.spec.as_ref().and_then(|s| s.replicas),
    )
}

fn replica_set_status(r: &ReplicaSet) -> String {
    ready_of(
        r.status.as_ref().and_then(|s| s.ready_replicas),
        r.spec.as_ref().and_then(|s| s.replicas),
    )
}

fn daemon_set_status(d: &DaemonSet) -> String {
    match &d.status {
        Some(s) => format!("{}/{}", s.number_ready, s.desired_number_scheduled),
        None => "0/0".to_string(),
    }
}

fn service_status(s: &Service) -> String {
    let spec = s.spec.as_ref();
    let kind = spec
        .and_then(|s| s.type_.clone())
        .unwrap_or_else(|| "ClusterIP".to_string());
    match spec.and_then(|s| s.cluster_ip.as_deref()) {
        Some(ip) => format!("{} {}", kind, ip),
        None => kind,
    }
}

fn config_map_status(cm: &ConfigMap) -> String {
    let keys = cm.data.as_ref().map_or(0, |d| d.len())
        + cm.binary_data.as_ref().map_or(0, |d| d.len());
    format!("{} keys", keys)
}

fn secret_status(s: &Secret) -> String {
    let keys = s.data.as_ref().map_or(0, |d| d.len());
    format!("{} ({} keys)", s.type_.as_deref().unwrap_or("Opaque"), keys)
}

fn namespace_status(ns: &Namespace) -> String {
    ns.status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn job_status(j: &Job) -> String {
    let succeeded = j.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0);
    let completions = j.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
    let failed = j.status.as_ref().and_then(|s| s.failed).unwrap_or(0);
    if failed > 0 {
        format!("{}/{} ({} failed)", succeeded, completions, failed)
    } else {
        format!("{}/{}", succeeded, completions)
    }
}

fn cron_job_status(c: &CronJob) -> String {
    let Some(spec) = &c.spec else {
        return String::new();
    };
    if spec.suspend == Some(true) {
        format!("{} (suspended)", spec.schedule)
    } else {
        spec.schedule.clone()
    }
}

fn node_status(n: &Node) -> String {
    let ready = n
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status == "True");
    let unschedulable = n.spec.as_ref().and_then(|s| s.unschedulable) == Some(true);

    let base = match ready {
        Some(true) => "Ready",
        Some(false) => "NotReady",
        None => "Unknown",
    };
    if unschedulable {
        format!("{},SchedulingDisabled", base)
    } else {
        base.to_string()
    }
}

fn pvc_status(p: &PersistentVolumeClaim) -> String {
    p.status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Pending".to_string())
}

fn ingress_status(i: &Ingress) -> String {
    let hosts: Vec<&str> = i
        .spec
        .iter()
        .flat_map(|s| s.rules.iter().flatten())
        .filter_map(|r| r.host.as_deref())
        .collect();
    if hosts.is_empty() {
        "*".to_string()
    } else {
        hosts.join(",")
    }
}

fn endpoints_status(e: &Endpoints) -> String {
    let addresses: usize = e
        .subsets
        .iter()
        .flatten()
        .map(|s| s.addresses.as_ref().map_or(0, |a| a.len()))
        .sum();
    format!("{} addresses", addresses)
}

fn hpa_status(h: &HorizontalPodAutoscaler) -> String {
    let current = h.status.as_ref().and_then(|s| s.current_replicas).unwrap_or(0);
    let (min, max) = h
        .spec
        .as_ref()
        .map(|s| (s.min_replicas.unwrap_or(1), s.max_replicas))
        .unwrap_or((1, 0));
    format!("{} ({}-{})", current, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateWaiting, ContainerStatus, NodeCondition, NodeStatus,
        PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kubedeck_types::ResourceKind;
    use std::sync::Arc;

    #[test]
    fn test_pod_waiting_reason_wins() {
        let mut pod = Pod::default();
        pod.metadata.name = Some("web-0".to_string());
        pod.status = Some(PodStatus {
            phase: Some("Running".to_string()),
            container_statuses: Some(vec![ContainerStatus {
                name: "app".to_string(),
                state: Some(ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: Some("CrashLoopBackOff".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        });
        let summary = Resource::Pod(Arc::new(pod)).summary();
        assert_eq!(summary.status, "CrashLoopBackOff");
        assert_eq!(summary.kind, ResourceKind::Pod);
    }

    #[test]
    fn test_deployment_ready_count() {
        let mut d = Deployment::default();
        d.metadata.name = Some("api".to_string());
        d.metadata.namespace = Some("default".to_string());
        d.metadata.creation_timestamp = Some(Time(chrono::Utc::now()));
        d.spec = Some(DeploymentSpec {
            replicas: Some(3),
            ..Default::default()
        });
        d.status = Some(DeploymentStatus {
            ready_replicas: Some(2),
            ..Default::default()
        });

        let summary = Resource::Deployment(Arc::new(d)).summary();
        assert_eq!(summary.status, "2/3");
        assert_eq!(summary.namespace.as_deref(), Some("default"));
        assert!(summary.created.is_some());
    }

    #[test]
    fn test_terminating_overrides_status() {
        let mut pod = Pod::default();
        pod.metadata.name = Some("old".to_string());
        pod.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert_eq!(Resource::Pod(Arc::new(pod)).summary().status, "Terminating");
    }

    #[test]
    fn test_node_conditions() {
        let mut node = Node::default();
        node.metadata.name = Some("node-a".to_string());
        node.status = Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert_eq!(Resource::Node(Arc::new(node)).summary().status, "NotReady");
        assert_eq!(
            Resource::Node(Arc::new(Node::default())).summary().status,
            "Unknown"
        );
    }
}
