use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use kubedeck_k8s::{RepositoryError, RepositoryPool};
use kubedeck_types::ResourceSummary;

use super::{Screen, visible_rows};
use crate::app::{AppState, ScreenId};
use crate::ui::{Theme, components::list_nav_hints};

/// Table of cached objects of the selected kind in the active context
pub struct ResourceListScreen {
    table: TableState,
    page: usize,
}

impl ResourceListScreen {
    pub fn new() -> Self {
        Self {
            table: TableState::default(),
            page: 1,
        }
    }

    fn block(title: String) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border_focused())
            .title(Span::styled(title, Theme::title()))
    }

    fn render_message(frame: &mut Frame, area: Rect, title: String, line: Line) {
        frame.render_widget(Paragraph::new(line).block(Self::block(title)), area);
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect, title: String, state: &AppState) {
        let now = Utc::now();
        let show_namespace = state.kind.is_namespaced() && state.namespace.is_none();

        let mut header = Vec::new();
        let mut widths = Vec::new();
        if show_namespace {
            header.push("NAMESPACE");
            widths.push(Constraint::Percentage(20));
        }
        header.extend(["NAME", "STATUS", "AGE"]);
        widths.extend([
            Constraint::Percentage(if show_namespace { 40 } else { 55 }),
            Constraint::Percentage(30),
            Constraint::Length(8),
        ]);

        let rows = state.rows.iter().map(|row: &ResourceSummary| {
            let mut cells = Vec::new();
            if show_namespace {
                cells.push(Cell::from(row.namespace.clone().unwrap_or_default()));
            }
            cells.push(Cell::from(row.name.clone()));
            cells.push(Cell::from(row.status.clone()).style(Theme::resource_status(&row.status)));
            cells.push(Cell::from(row.age(now)));
            Row::new(cells)
        });

        let table = Table::new(rows, widths)
            .header(Row::new(header).style(Theme::table_header()))
            .block(Self::block(title))
            .row_highlight_style(Theme::list_item_selected())
            .highlight_symbol("▶ ");

        self.table.select(state.list_state.selected());
        frame.render_stateful_widget(table, area, &mut self.table);
    }
}

impl Default for ResourceListScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for ResourceListScreen {
    fn id(&self) -> ScreenId {
        ScreenId::Resources
    }

    fn title(&self, state: &AppState) -> String {
        let scope = match (&state.namespace, state.kind.is_namespaced()) {
            (_, false) => "cluster".to_string(),
            (Some(ns), true) => ns.clone(),
            (None, true) => "all namespaces".to_string(),
        };
        if state.selector.is_empty() {
            format!("{} [{}]", state.kind, scope)
        } else {
            format!("{} [{}] {{{}}}", state.kind, scope, state.selector)
        }
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
        let title = format!(" {} ", self.title(state));

        // Looked up on every render so a switch or eviction is picked up
        let Some(repo) = pool.active_repository() else {
            state.set_rows(Vec::new());
            let line = Line::from(Span::styled(
                "No active context. Press 'c' to choose one.",
                Theme::text_dim(),
            ));
            Self::render_message(frame, area, title, line);
            return;
        };

        match repo.summaries(state.kind, state.namespace.as_deref(), &state.selector) {
            Ok(rows) => {
                state.set_rows(rows);
                let title = format!(" {} ({}) ", self.title(state), state.rows.len());
                self.render_table(frame, area, title, state);
            }
            Err(RepositoryError::NotReady(kind)) => {
                state.set_rows(Vec::new());
                let line = Line::from(Span::styled(
                    format!("Loading {}...", kind),
                    Theme::text_highlight(),
                ));
                Self::render_message(frame, area, title, line);
            }
            Err(e) => {
                state.set_rows(Vec::new());
                let line = Line::from(Span::styled(e.to_string(), Theme::error()));
                Self::render_message(frame, area, title, line);
            }
        }
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        let mut hints = vec![("Tab", "Kind"), ("d", "Describe"), ("y", "YAML"), ("l", "Logs")];
        hints.extend(list_nav_hints());
        hints
    }
}
