use std::collections::HashMap;
use std::time::{Duration, Instant};

use ratatui::widgets::ListState;
use tokio_util::sync::CancellationToken;

use kubedeck_k8s::Selector;
use kubedeck_types::{ContextInfo, ContextLoadProgress, ResourceKind, ResourceSummary, SelectedResource};

/// Lines kept in the detail view while following logs
pub const MAX_DETAIL_LINES: usize = 10_000;

/// Screen enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScreenId {
    Contexts,
    Resources,
    Detail,
}

/// A transient message shown in the bottom bar
#[derive(Clone, Debug)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    pub shown_at: Instant,
}

/// Text shown by the detail screen (manifest, describe output or logs)
#[derive(Debug, Default)]
pub struct DetailView {
    pub title: String,
    pub lines: Vec<String>,
    pub scroll: usize,
    pub loading: bool,
    /// Follow mode keeps the view pinned to the newest line
    pub following: bool,
    /// Bumped every time the view is reopened, so late results from an
    /// earlier request can be told apart and dropped
    pub generation: u64,
    follow_cancel: Option<CancellationToken>,
}

impl DetailView {
    /// Start a new request, stopping any log stream still attached
    pub fn open(&mut self, title: impl Into<String>, following: bool) -> u64 {
        self.close();
        self.generation += 1;
        self.title = title.into();
        self.lines.clear();
        self.scroll = 0;
        self.loading = true;
        self.following = following;
        self.generation
    }

    /// Replace the content with a finished result
    pub fn set_text(&mut self, generation: u64, text: &str) -> bool {
        if generation != self.generation {
            return false;
        }
        self.lines = text.lines().map(str::to_string).collect();
        self.loading = false;
        true
    }

    /// Append a followed log line
    pub fn push_line(&mut self, generation: u64, line: String) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        self.lines.push(line);
        if self.lines.len() > MAX_DETAIL_LINES {
            let excess = self.lines.len() - MAX_DETAIL_LINES;
            self.lines.drain(..excess);
            self.scroll = self.scroll.saturating_sub(excess);
        }
        true
    }

    pub fn attach_stream(&mut self, cancel: CancellationToken) {
        self.follow_cancel = Some(cancel);
    }

    /// Stop the attached log stream, if any
    pub fn close(&mut self) {
        if let Some(cancel) = self.follow_cancel.take() {
            cancel.cancel();
        }
        self.following = false;
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.following = false;
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll = (self.scroll + n).min(self.lines.len().saturating_sub(1));
    }
}

/// Application state
pub struct AppState {
    pub current_screen: ScreenId,
    pub screen_stack: Vec<ScreenId>,

    /// Contexts from the kubeconfig
    pub contexts: Vec<ContextInfo>,
    /// Latest load progress per context still loading
    pub loading: HashMap<String, ContextLoadProgress>,

    // What the resource list shows
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub selector: Selector,
    /// Rows shown by the last render of the resource list
    pub rows: Vec<ResourceSummary>,

    pub list_state: ListState,
    pub detail: DetailView,

    /// Command bar input; `Some` while the bar is open
    pub command_input: Option<String>,
    pub help_visible: bool,
    pub status: Option<StatusMessage>,

    pub should_quit: bool,
}

impl AppState {
    pub fn new(contexts: Vec<ContextInfo>) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            current_screen: ScreenId::Resources,
            screen_stack: Vec::new(),
            contexts,
            loading: HashMap::new(),
            kind: ResourceKind::Pod,
            namespace: None,
            selector: Selector::everything(),
            rows: Vec::new(),
            list_state,
            detail: DetailView::default(),
            command_input: None,
            help_visible: false,
            status: None,
            should_quit: false,
        }
    }

    /// Navigate to a new screen
    pub fn navigate_to(&mut self, screen: ScreenId) {
        if self.current_screen == screen {
            return;
        }
        self.screen_stack.push(self.current_screen);
        self.current_screen = screen;
        if screen != ScreenId::Detail {
            self.list_state.select(Some(0));
        }
    }

    /// Go back to previous screen
    pub fn go_back(&mut self) -> bool {
        let Some(prev) = self.screen_stack.pop() else {
            return false;
        };
        if self.current_screen == ScreenId::Detail {
            self.detail.close();
        }
        self.current_screen = prev;
        true
    }

    /// Jump to `screen`, dropping navigation history
    pub fn reset_to(&mut self, screen: ScreenId) {
        if self.current_screen == ScreenId::Detail {
            self.detail.close();
        }
        self.screen_stack.clear();
        self.current_screen = screen;
        self.list_state.select(Some(0));
    }

    /// Change the browsed kind, keeping the namespace and selector
    pub fn set_kind(&mut self, kind: ResourceKind) {
        self.kind = kind;
        self.reset_rows();
    }

    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
        self.reset_rows();
    }

    pub fn set_selector(&mut self, selector: Selector) {
        self.selector = selector;
        self.reset_rows();
    }

    fn reset_rows(&mut self) {
        self.rows.clear();
        self.list_state.select(Some(0));
    }

    /// Store freshly rendered rows, keeping the selection in range
    pub fn set_rows(&mut self, rows: Vec<ResourceSummary>) {
        self.rows = rows;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.current_list_len();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(Some(0)),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            None => self.list_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn current_list_len(&self) -> usize {
        match self.current_screen {
            ScreenId::Contexts => self.contexts.len(),
            ScreenId::Resources => self.rows.len(),
            ScreenId::Detail => 0,
        }
    }

    /// Move selection up, wrapping to the bottom
    pub fn list_up(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    /// Move selection down, wrapping to the top
    pub fn list_down(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn page_up(&mut self, page: usize) {
        let i = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(i.saturating_sub(page)));
    }

    pub fn page_down(&mut self, page: usize) {
        let len = self.current_list_len();
        let i = self.list_state.selected().unwrap_or(0);
        self.list_state
            .select(Some((i + page).min(len.saturating_sub(1))));
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.list_state.selected()
    }

    /// The resource under the cursor on the resource list
    pub fn selected_resource(&self) -> Option<SelectedResource> {
        self.rows
            .get(self.selected_index()?)
            .map(ResourceSummary::selected)
    }

    /// The context under the cursor on the context list
    pub fn selected_context(&self) -> Option<&ContextInfo> {
        self.contexts.get(self.selected_index()?)
    }

    pub fn show_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    pub fn show_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: true,
            shown_at: Instant::now(),
        });
    }

    /// Drop the status message once it has been shown for `ttl`
    pub fn expire_status(&mut self, now: Instant, ttl: Duration) -> bool {
        match &self.status {
            Some(msg) if now.duration_since(msg.shown_at) >= ttl => {
                self.status = None;
                true
            }
            _ => false,
        }
    }

    // Command bar input

    pub fn open_command_bar(&mut self) {
        self.command_input = Some(String::new());
    }

    pub fn command_push(&mut self, c: char) {
        if let Some(input) = self.command_input.as_mut() {
            input.push(c);
        }
    }

    pub fn command_backspace(&mut self) {
        if let Some(input) = self.command_input.as_mut() {
            input.pop();
        }
    }

    pub fn command_clear(&mut self) {
        if let Some(input) = self.command_input.as_mut() {
            input.clear();
        }
    }

    /// Close the bar and return what was typed
    pub fn take_command(&mut self) -> Option<String> {
        self.command_input.take()
    }
}
