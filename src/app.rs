//! The UI event loop
//!
//! A single loop drains the [`EventHandler`] queue. Terminal input
//! is turned into [`Action`]s; anything that talks to a cluster is spawned
//! and reports back on the same queue, so the loop never awaits the network.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::StreamExt;
use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use kubedeck_k8s::{
    Connector, ContextLoadProgress, LogOutput, LogRequest, Repository, RepositoryPool, SelectedResource,
};
use kubedeck_tui::{
    Action, AppState, CommandRegistry, Event, EventHandler, EventSender, KeyBindings, Layout,
    ScreenId, ScreenRegistry, Tui,
};
use kubedeck_types::{CacheMessage, ResourceKind};

use crate::config::Settings;

/// Content area for a terminal of `width` x `height`
fn content_area(width: u16, height: u16) -> Rect {
    Layout::main(Rect::new(0, 0, width, height)).1
}

/// Forward load progress to the UI while `load` runs, keeping order with
/// the final outcome the caller sends afterwards
async fn forwarding_progress<T>(
    load: impl Future<Output = T>,
    mut progress: mpsc::UnboundedReceiver<ContextLoadProgress>,
    events: &EventSender,
) -> T {
    tokio::pin!(load);
    let result = loop {
        tokio::select! {
            biased;
            Some(p) = progress.recv() => {
                let _ = events.send(Event::Cache(CacheMessage::Progress(p)));
            }
            result = &mut load => break result,
        }
    };
    while let Ok(p) = progress.try_recv() {
        let _ = events.send(Event::Cache(CacheMessage::Progress(p)));
    }
    result
}

struct App<'a> {
    pool: Arc<RepositoryPool>,
    state: AppState,
    screens: &'a mut ScreenRegistry,
    commands: &'a CommandRegistry,
    keybindings: KeyBindings,
    events: EventSender,
    status_ttl: Duration,
    log_tail_lines: i64,
}

pub async fn run(
    pool: Arc<RepositoryPool>,
    settings: &Settings,
    preload: Vec<String>,
    screens: &mut ScreenRegistry,
    commands: &CommandRegistry,
) -> Result<()> {
    let mut tui = Tui::new().context("Failed to initialise terminal")?;
    let mut events = EventHandler::new(settings.tick_rate());

    let size = tui.terminal().size()?;
    screens.set_size(content_area(size.width, size.height));

    let contexts = pool.connector().contexts();
    let mut app = App {
        pool,
        state: AppState::new(contexts),
        screens,
        commands,
        keybindings: KeyBindings::new(),
        events: events.sender(),
        status_ttl: settings.status_ttl(),
        log_tail_lines: settings.log_tail_lines,
    };
    if let Some(ns) = app.active_namespace() {
        app.state.set_namespace(Some(ns));
    }

    for name in preload {
        app.spawn_load(name);
    }

    app.draw(&mut tui)?;
    while let Some(event) = events.next().await {
        let dirty = app.handle_event(event);
        if app.state.should_quit {
            break;
        }
        if dirty {
            app.draw(&mut tui)?;
        }
    }

    events.shutdown();
    app.state.detail.close();
    tui.restore()?;
    Ok(())
}

impl App<'_> {
    fn draw(&mut self, tui: &mut Tui) -> Result<()> {
        let Self {
            pool,
            state,
            screens,
            commands,
            ..
        } = self;
        tui.terminal()
            .draw(|frame| kubedeck_tui::render(frame, screens, commands, state, pool))?;
        Ok(())
    }

    /// Default namespace of the active context, if its kubeconfig entry has one
    fn active_namespace(&self) -> Option<String> {
        let active = self.pool.active_context()?;
        self.state
            .contexts
            .iter()
            .find(|c| c.name == active)
            .and_then(|c| c.namespace.clone())
    }

    /// Returns whether the screen needs redrawing
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Tick => {
                self.state.expire_status(Instant::now(), self.status_ttl);
                // Informer updates land in the caches without notifying the
                // UI, so every tick redraws
                true
            }
            Event::Key(key) => {
                let action = if self.state.command_input.is_some() {
                    self.keybindings.get_command_bar_action(&key)
                } else {
                    self.keybindings
                        .get_action(self.state.current_screen.into(), &key)
                };
                if let Some(action) = action {
                    self.handle_action(action);
                }
                true
            }
            Event::Resize(width, height) => {
                self.screens.set_size(content_area(width, height));
                true
            }
            Event::Error(e) => {
                self.state.show_error(e);
                true
            }
            Event::Cache(msg) => {
                self.handle_cache_message(msg);
                true
            }
            Event::Detail { generation, text } => self.state.detail.set_text(generation, &text),
            Event::DetailFailed { generation, error } => {
                let shown = self
                    .state
                    .detail
                    .set_text(generation, &format!("Error: {}", error));
                if shown {
                    self.state.show_error(error);
                }
                shown
            }
            Event::LogLine { generation, line } => {
                self.state.detail.push_line(generation, line)
                    && self.state.current_screen == ScreenId::Detail
            }
        }
    }

    fn handle_cache_message(&mut self, msg: CacheMessage) {
        match msg {
            CacheMessage::Progress(progress) => {
                if progress.phase.is_complete() {
                    self.state.loading.remove(&progress.context);
                } else {
                    self.state
                        .loading
                        .insert(progress.context.clone(), progress);
                }
            }
            CacheMessage::Loaded { context } => {
                self.state.loading.remove(&context);
                self.state.show_info(format!("Context '{}' loaded", context));
            }
            CacheMessage::LoadFailed { context, error } => {
                self.state.loading.remove(&context);
                self.state
                    .show_error(format!("Context '{}' failed: {}", context, error));
            }
            CacheMessage::Switched { old, new } => {
                self.state.loading.remove(&new);
                let namespace = self.active_namespace();
                self.state.reset_to(ScreenId::Resources);
                self.state.set_namespace(namespace);
                let text = match old {
                    Some(old) if old != new => format!("Switched from '{}' to '{}'", old, new),
                    _ => format!("Switched to '{}'", new),
                };
                self.state.show_info(text);
            }
            CacheMessage::OperationDone { message } => self.state.show_info(message),
            CacheMessage::OperationFailed { message } => self.state.show_error(message),
        }
    }

    fn handle_action(&mut self, action: Action) {
        if self.state.help_visible {
            match action {
                Action::Quit => self.state.should_quit = true,
                _ => self.state.help_visible = false,
            }
            return;
        }

        let page = self.screens.page_size(self.state.current_screen);
        let on_detail = self.state.current_screen == ScreenId::Detail;

        match action {
            Action::Quit => self.state.should_quit = true,
            Action::GoBack => {
                self.state.go_back();
            }
            Action::ShowContexts => self.state.navigate_to(ScreenId::Contexts),

            Action::ListUp => self.state.list_up(),
            Action::ListDown => self.state.list_down(),
            Action::PageUp if on_detail => self.state.detail.scroll_up(page),
            Action::PageDown if on_detail => self.state.detail.scroll_down(page),
            Action::PageUp => self.state.page_up(page),
            Action::PageDown => self.state.page_down(page),
            Action::ScrollToTop => self.state.detail.scroll_up(usize::MAX),
            Action::ScrollToBottom => {
                let detail = &mut self.state.detail;
                detail.scroll = detail.lines.len().saturating_sub(page);
            }
            Action::ScrollUp(n) => self.state.detail.scroll_up(n),
            Action::ScrollDown(n) => self.state.detail.scroll_down(n),
            Action::ListSelect => match self.state.current_screen {
                ScreenId::Contexts => {
                    if let Some(name) = self.state.selected_context().map(|c| c.name.clone()) {
                        self.switch_context(name);
                    }
                }
                ScreenId::Resources => self.handle_action(Action::Describe),
                ScreenId::Detail => {}
            },

            Action::NextKind => self.set_kind(self.state.kind.next()),
            Action::PrevKind => self.set_kind(self.state.kind.prev()),
            Action::SetKind(kind) => self.set_kind(kind),
            Action::SetNamespace(namespace) => {
                self.state.reset_to(ScreenId::Resources);
                self.state.set_namespace(namespace);
            }
            Action::SetSelector(selector) => {
                self.state.reset_to(ScreenId::Resources);
                self.state.set_selector(selector);
            }

            Action::SwitchContext(name) => self.switch_context(name),
            Action::RetrySelected => {
                let selected = match self.state.current_screen {
                    ScreenId::Contexts => self.state.selected_context().map(|c| c.name.clone()),
                    _ => None,
                };
                match selected {
                    Some(name) => self.spawn_retry(name),
                    None => self.state.show_error("Select a context to retry"),
                }
            }
            Action::RetryContext(name) => self.spawn_retry(name),

            Action::ShowYaml => self.show_yaml(),
            Action::Describe => self.describe(),
            Action::ShowLogs { follow } => self.show_logs(follow),
            Action::Delete => self.delete(),
            Action::Scale(replicas) => self.scale(replicas),

            Action::OpenCommandBar => self.state.open_command_bar(),
            Action::CommandInput(c) => self.state.command_push(c),
            Action::CommandBackspace => self.state.command_backspace(),
            Action::CommandClear => self.state.command_clear(),
            Action::CommandCancel => {
                self.state.take_command();
            }
            Action::CommandSubmit => {
                let Some(input) = self.state.take_command() else {
                    return;
                };
                match self.commands.parse(&input) {
                    Ok(action) => {
                        debug!(command = %input, ?action, "command");
                        self.handle_action(action);
                    }
                    Err(e) => self.state.show_error(e),
                }
            }

            Action::ToggleHelp => self.state.help_visible = !self.state.help_visible,
            Action::None => {}
        }
    }

    fn set_kind(&mut self, kind: ResourceKind) {
        if self.state.current_screen != ScreenId::Resources {
            self.state.reset_to(ScreenId::Resources);
        }
        self.state.set_kind(kind);
    }

    // ------------------------------------------------------------------------
    // Context loads
    // ------------------------------------------------------------------------

    fn switch_context(&mut self, name: String) {
        if self.state.contexts.iter().all(|c| c.name != name) {
            self.state.show_error(format!("Unknown context '{}'", name));
            return;
        }
        let pool = Arc::clone(&self.pool);
        let events = self.events.clone();
        tokio::spawn(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            let result = forwarding_progress(pool.switch_context(&name, &tx), rx, &events).await;
            let msg = match result {
                Ok(switch) => CacheMessage::Switched {
                    old: switch.old,
                    new: switch.new,
                },
                Err(e) => CacheMessage::LoadFailed {
                    context: name,
                    error: e.to_string(),
                },
            };
            let _ = events.send(Event::Cache(msg));
        });
    }

    fn spawn_load(&mut self, name: String) {
        let pool = Arc::clone(&self.pool);
        let events = self.events.clone();
        tokio::spawn(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            let result = forwarding_progress(pool.load_context(&name, &tx), rx, &events).await;
            let _ = events.send(Event::Cache(load_outcome(name, result)));
        });
    }

    fn spawn_retry(&mut self, name: String) {
        info!(context = %name, "retrying context");
        let pool = Arc::clone(&self.pool);
        let events = self.events.clone();
        tokio::spawn(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            let result =
                forwarding_progress(pool.retry_failed_context(&name, &tx), rx, &events).await;
            let _ = events.send(Event::Cache(load_outcome(name, result)));
        });
    }

    // ------------------------------------------------------------------------
    // Operations on the selected resource
    // ------------------------------------------------------------------------

    /// Active repository and the resource under the cursor
    fn target(&mut self) -> Option<(Arc<Repository>, SelectedResource)> {
        let Some(repo) = self.pool.active_repository() else {
            self.state.show_error("No active context");
            return None;
        };
        let Some(selected) = self.state.selected_resource() else {
            self.state.show_error("Nothing selected");
            return None;
        };
        Some((repo, selected))
    }

    fn delete(&mut self) {
        let Some((repo, target)) = self.target() else {
            return;
        };
        let events = self.events.clone();
        tokio::spawn(async move {
            let msg = match repo.delete(&target).await {
                Ok(()) => CacheMessage::OperationDone {
                    message: format!("Deleted {}", target),
                },
                Err(e) => CacheMessage::OperationFailed {
                    message: format!("Delete {} failed: {}", target, e),
                },
            };
            let _ = events.send(Event::Cache(msg));
        });
    }

    fn scale(&mut self, replicas: i32) {
        let Some((repo, target)) = self.target() else {
            return;
        };
        let events = self.events.clone();
        tokio::spawn(async move {
            let msg = match repo.scale(&target, replicas).await {
                Ok(()) => CacheMessage::OperationDone {
                    message: format!("Scaled {} to {}", target, replicas),
                },
                Err(e) => CacheMessage::OperationFailed {
                    message: format!("Scale {} failed: {}", target, e),
                },
            };
            let _ = events.send(Event::Cache(msg));
        });
    }

    /// Open the detail screen for a new request
    fn open_detail(&mut self, title: String, following: bool) -> u64 {
        let generation = self.state.detail.open(title, following);
        self.state.navigate_to(ScreenId::Detail);
        generation
    }

    fn show_yaml(&mut self) {
        let Some((repo, target)) = self.target() else {
            return;
        };
        let generation = self.open_detail(format!("{} (yaml)", target), false);
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match repo.get_yaml(&target).await {
                Ok(text) => Event::Detail { generation, text },
                Err(e) => Event::DetailFailed {
                    generation,
                    error: e.to_string(),
                },
            };
            let _ = events.send(event);
        });
    }

    fn describe(&mut self) {
        let Some((repo, target)) = self.target() else {
            return;
        };
        let generation = self.open_detail(format!("{} (describe)", target), false);
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match repo.describe(&target).await {
                Ok(text) => Event::Detail { generation, text },
                Err(e) => Event::DetailFailed {
                    generation,
                    error: e.to_string(),
                },
            };
            let _ = events.send(event);
        });
    }

    fn show_logs(&mut self, follow: bool) {
        let Some((repo, target)) = self.target() else {
            return;
        };
        let generation = self.open_detail(format!("{} (logs)", target), follow);
        let cancel = CancellationToken::new();
        self.state.detail.attach_stream(cancel.clone());

        let request = LogRequest {
            container: None,
            tail: Some(self.log_tail_lines),
            follow,
        };
        let events = self.events.clone();
        tokio::spawn(async move {
            let output = match repo.get_logs(&target, &request).await {
                Ok(output) => output,
                Err(e) => {
                    let _ = events.send(Event::DetailFailed {
                        generation,
                        error: e.to_string(),
                    });
                    return;
                }
            };
            match output {
                LogOutput::Snapshot(text) => {
                    let _ = events.send(Event::Detail { generation, text });
                }
                LogOutput::Stream(mut lines) => loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => break,
                        next = lines.next() => next,
                    };
                    let (line, done) = match next {
                        Some(Ok(line)) => (line, false),
                        Some(Err(e)) => (format!("-- log stream failed: {} --", e), true),
                        None => ("-- log stream ended --".to_string(), true),
                    };
                    if events.send(Event::LogLine { generation, line }).is_err() || done {
                        break;
                    }
                },
            }
            debug!(resource = %target, "log task finished");
        });
    }
}

fn load_outcome(context: String, result: Result<(), kubedeck_k8s::PoolError>) -> CacheMessage {
    match result {
        Ok(()) => CacheMessage::Loaded { context },
        Err(e) => CacheMessage::LoadFailed {
            context,
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubedeck_k8s::{LoadPhase, PoolError};

    #[tokio::test]
    async fn test_progress_forwarded_before_outcome() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::unbounded_channel();

        let load = async {
            for phase in LoadPhase::ALL {
                let _ = tx.send(ContextLoadProgress::new("dev", phase.label(), phase));
                tokio::task::yield_now().await;
            }
            42
        };
        let result = forwarding_progress(load, rx, &events_tx).await;
        assert_eq!(result, 42);

        let mut phases = Vec::new();
        while let Ok(Event::Cache(CacheMessage::Progress(p))) = events_rx.try_recv() {
            phases.push(p.phase);
        }
        assert_eq!(phases, LoadPhase::ALL.to_vec());
    }

    #[test]
    fn test_load_outcome() {
        assert_eq!(
            load_outcome("dev".to_string(), Ok(())),
            CacheMessage::Loaded {
                context: "dev".to_string()
            }
        );
        match load_outcome("dev".to_string(), Err(PoolError::NotLoaded("dev".to_string()))) {
            CacheMessage::LoadFailed { context, error } => {
                assert_eq!(context, "dev");
                assert!(error.contains("dev"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_content_area_excludes_bars() {
        let area = content_area(100, 30);
        assert_eq!(area.y, 3);
        assert_eq!(area.height, 26);
    }
}
