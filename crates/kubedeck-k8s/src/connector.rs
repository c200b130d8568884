//! Client construction per kubeconfig context

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{debug, info};

use crate::error::{ConnectError, PoolError};
use crate::session::{ClusterSession, KubeSession};
use kubedeck_types::ContextInfo;

/// Default TCP connect timeout for API clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout for API clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces a [`ClusterSession`] for a named context
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: ClusterSession;

    /// Every context the connector knows about
    fn contexts(&self) -> Vec<ContextInfo>;

    /// Build a session and check the API server answers
    async fn connect(&self, context: &str) -> Result<Self::Session, ConnectError>;
}

/// [`Connector`] reading contexts from a kubeconfig file
pub struct KubeConnector {
    kubeconfig: Kubeconfig,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl KubeConnector {
    /// Load the kubeconfig at `path`
    pub fn from_path(path: &Path) -> Result<Self, PoolError> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| PoolError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        Self {
            kubeconfig,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// The kubeconfig's `current-context`
    pub fn current_context(&self) -> Option<&str> {
        self.kubeconfig.current_context.as_deref()
    }
}

#[async_trait]
impl Connector for KubeConnector {
    type Session = KubeSession;

    fn contexts(&self) -> Vec<ContextInfo> {
        let current = self.current_context();
        self.kubeconfig
            .contexts
            .iter()
            .map(|ctx| {
                let context = ctx.context.as_ref();
                ContextInfo::new(
                    ctx.name.clone(),
                    context.map(|c| c.cluster.clone()).unwrap_or_default(),
                    context.and_then(|c| c.user.clone()).unwrap_or_default(),
                    context.and_then(|c| c.namespace.clone()),
                    Some(ctx.name.as_str()) == current,
                )
            })
            .collect()
    }

    async fn connect(&self, context: &str) -> Result<KubeSession, ConnectError> {
        if !self.kubeconfig.contexts.iter().any(|c| c.name == context) {
            return Err(ConnectError::UnknownContext(context.to_string()));
        }

        let mut config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| ConnectError::Config(e.to_string()))?;

        config.connect_timeout = Some(self.connect_timeout);
        config.read_timeout = Some(self.read_timeout);
        debug!(context = %context, cluster_url = %config.cluster_url, "building client");

        let client = Client::try_from(config).map_err(|e| ConnectError::Config(e.to_string()))?;

        let version = client
            .apiserver_version()
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;
        info!(
            context = %context,
            version = %version.git_version,
            "connected to API server"
        );

        Ok(KubeSession::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: https://127.0.0.1:6443
- name: prod-cluster
  cluster:
    server: https://127.0.0.1:7443
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: dev-user
    namespace: team-a
- name: prod
  context:
    cluster: prod-cluster
    user: prod-user
users:
- name: dev-user
  user:
    token: abc
- name: prod-user
  user:
    token: def
"#;

    fn write_kubeconfig(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_contexts_from_kubeconfig() {
        let file = write_kubeconfig(KUBECONFIG);
        let connector = KubeConnector::from_path(file.path()).unwrap();

        let contexts = connector.contexts();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].name, "dev");
        assert_eq!(contexts[0].cluster, "dev-cluster");
        assert_eq!(contexts[0].namespace.as_deref(), Some("team-a"));
        assert!(contexts[0].is_current);
        assert!(!contexts[1].is_current);
        assert_eq!(connector.current_context(), Some("dev"));
    }

    #[test]
    fn test_unparseable_kubeconfig() {
        let file = write_kubeconfig("contexts: [this is not: valid");
        assert!(matches!(
            KubeConnector::from_path(file.path()),
            Err(PoolError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_context() {
        let file = write_kubeconfig(KUBECONFIG);
        let connector = KubeConnector::from_path(file.path()).unwrap();
        assert!(matches!(
            connector.connect("staging").await,
            Err(ConnectError::UnknownContext(name)) if name == "staging"
        ));
    }
}
