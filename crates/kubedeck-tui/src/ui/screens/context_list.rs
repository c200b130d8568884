use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
};

use kubedeck_k8s::RepositoryPool;
use kubedeck_types::ContextState;

use super::{Screen, visible_rows};
use crate::app::{AppState, ScreenId};
use crate::ui::{
    Layout, Theme,
    components::{ListSelector, ListSelectorExt},
};

/// Kubeconfig contexts with their load state in the pool
pub struct ContextListScreen {
    page: usize,
}

impl ContextListScreen {
    pub fn new() -> Self {
        Self { page: 1 }
    }

    fn state_text(state: &AppState, name: &str, pool_state: Option<&ContextState>) -> String {
        match pool_state {
            Some(ContextState::Loading) => match state.loading.get(name) {
                Some(progress) => format!("{}: {}", progress.phase.label(), progress.message),
                None => ContextState::Loading.label().to_string(),
            },
            Some(ContextState::Failed(reason)) => format!("Failed: {}", reason),
            Some(s) => s.label().to_string(),
            None => "Not loaded".to_string(),
        }
    }
}

impl Default for ContextListScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for ContextListScreen {
    fn id(&self) -> ScreenId {
        ScreenId::Contexts
    }

    fn title(&self, _state: &AppState) -> String {
        "Contexts".to_string()
    }

    fn set_size(&mut self, area: Rect) {
        self.page = visible_rows(area);
    }

    fn page_size(&self) -> usize {
        self.page
    }

    fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &mut AppState,
        pool: &RepositoryPool,
    ) {
        let active = pool.active_context();
        let lines: Vec<Line> = state
            .contexts
            .iter()
            .map(|ctx| {
                let pool_state = pool.context_state(&ctx.name);
                let is_active = active.as_deref() == Some(ctx.name.as_str());
                let name_style = if is_active {
                    Theme::list_item_current()
                } else {
                    Theme::list_item()
                };

                let mut spans = vec![
                    Span::styled("● ", Theme::context_state(pool_state.as_ref())),
                    Span::styled(format!("{:<32}", ctx.name), name_style),
                    Span::styled(
                        format!("{:<12}", if ctx.is_current { "(current)" } else { "" }),
                        Theme::text_dim(),
                    ),
                    Span::styled(
                        Self::state_text(state, &ctx.name, pool_state.as_ref()),
                        Theme::context_state(pool_state.as_ref()),
                    ),
                ];
                if is_active {
                    spans.push(Span::styled("  [active]", Theme::text_highlight()));
                }
                Line::from(spans)
            })
            .collect();

        let title = format!(
            " Kubernetes Contexts ({} loaded, max {}) ",
            pool.loaded_contexts().len(),
            pool.max_contexts()
        );
        let selector = ListSelector::new(title).lines(lines);
        frame.render_list_selector(Layout::centered_list(area, 90), selector, &mut state.list_state);
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("↑/k", "Up"),
            ("↓/j", "Down"),
            ("Enter", "Switch"),
            ("r", "Retry"),
            ("Esc", "Back"),
            ("?", "Help"),
        ]
    }
}
