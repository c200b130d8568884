use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use kubedeck_k8s::{
    Connector, ContextLoadProgress, KubeConnector, LoadPhase, PoolOptions, RepositoryPool,
};
use kubedeck_tui::{CommandRegistry, ScreenRegistry};

mod app;
mod config;

use config::Settings;

/// kubedeck - browse Kubernetes resources across many contexts
#[derive(Parser, Debug)]
#[command(name = "kubedeck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the kubeconfig file
    #[arg(long, value_name = "PATH")]
    kubeconfig: Option<PathBuf>,

    /// Context to load; repeat to preload more (default: current context)
    #[arg(short, long, value_name = "NAME")]
    context: Vec<String>,

    /// Contexts kept loaded at once (1-20)
    #[arg(long, value_name = "N")]
    max_contexts: Option<usize>,

    /// Seconds to wait for a context's informers to sync
    #[arg(long, value_name = "SECS")]
    sync_timeout: Option<u64>,

    /// Settings file (default: ~/.kubedeck/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "kubedeck_k8s=trace"
    #[arg(long, env = "KUBEDECK_LOG", value_name = "FILTER")]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(max) = self.max_contexts {
            settings.max_contexts = max;
        }
        if let Some(secs) = self.sync_timeout {
            settings.sync_timeout_secs = secs;
        }
    }
}

/// Client libraries that are noisy below warn
const QUIET_TARGETS: [&str; 4] = ["kube=warn", "hyper=warn", "tower=warn", "rustls=warn"];

/// Log to ~/.kubedeck/kubedeck.log; the terminal belongs to the UI
fn init_logging(filter: Option<&str>) -> Result<()> {
    let Some(dir) = config::data_dir() else {
        return Ok(());
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("kubedeck.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let mut env_filter =
        EnvFilter::try_new(filter.unwrap_or("warn")).context("Invalid log filter")?;
    for directive in QUIET_TARGETS {
        env_filter = env_filter.add_directive(directive.parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let mut settings = match args.config.clone().or_else(Settings::default_path) {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    args.apply(&mut settings);
    init_logging(args.log_level.as_deref())?;

    let kubeconfig = config::resolve_kubeconfig(
        args.kubeconfig.clone(),
        std::env::var_os("KUBECONFIG").as_deref(),
    )?;
    let connector = KubeConnector::from_path(&kubeconfig)?
        .with_timeouts(settings.connect_timeout(), settings.read_timeout());

    let requested = if args.context.is_empty() {
        let current = connector
            .current_context()
            .context("No --context given and the kubeconfig has no current-context")?;
        vec![current.to_string()]
    } else {
        args.context.clone()
    };
    let known = connector.contexts();
    for name in &requested {
        if !known.iter().any(|c| &c.name == name) {
            anyhow::bail!("Context '{}' not found in {}", name, kubeconfig.display());
        }
    }

    let pool = Arc::new(RepositoryPool::with_connector(
        connector,
        settings.max_contexts,
        PoolOptions {
            sync_timeout: settings.sync_timeout(),
        },
    )?);

    // The first context is loaded before the UI starts; the rest follow in the background
    let (first, preload) = requested
        .split_first()
        .context("No context to load")?;
    if let Err(e) = load_initial(&pool, first).await {
        pool.close().await;
        return Err(e);
    }
    pool.set_active(first)?;

    let mut screens = ScreenRegistry::new();
    let commands = CommandRegistry::new();
    let result = app::run(
        Arc::clone(&pool),
        &settings,
        preload.to_vec(),
        &mut screens,
        &commands,
    )
    .await;

    pool.close().await;
    result
}

/// Load `context`, printing each phase to stdout
async fn load_initial(pool: &RepositoryPool, context: &str) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ContextLoadProgress>();
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            println!(
                "[{}/{}] {}: {}",
                progress.phase.ordinal() + 1,
                LoadPhase::ALL.len(),
                progress.context,
                progress.message
            );
        }
    });

    let result = pool.load_context(context, &tx).await;
    drop(tx);
    let _ = printer.await;

    result.with_context(|| format!("Failed to load context '{}'", context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "kubedeck",
            "--context",
            "dev",
            "-c",
            "prod",
            "--max-contexts",
            "3",
        ])
        .unwrap();
        assert_eq!(args.context, vec!["dev", "prod"]);

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.max_contexts, 3);
        assert_eq!(settings.sync_timeout_secs, 30);
    }

    #[test]
    fn test_quiet_targets_parse() {
        for directive in QUIET_TARGETS {
            assert!(directive.parse::<tracing_subscriber::filter::Directive>().is_ok());
        }
    }

    #[tokio::test]
    async fn test_load_initial_reports_unknown_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(
            &path,
            "apiVersion: v1\nkind: Config\nclusters: []\ncontexts: []\nusers: []\n",
        )
        .unwrap();
        let pool = RepositoryPool::new(&path, 1).unwrap();

        let err = load_initial(&pool, "missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load context 'missing'");
        assert!(pool.context_state("missing").unwrap().is_failed());

        pool.close().await;
    }
}
