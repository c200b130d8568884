use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use kubedeck_k8s::RepositoryPool;

use super::{Screen, visible_rows};
use crate::app::{AppState, ScreenId};
use crate::ui::Theme;

/// Scrollable text: manifests, describe output and logs
pub struct DetailScreen {
    page: usize,
}

impl DetailScreen {
    pub fn new() -> Self {
        Self { page: 1 }
    }
}

impl Default for DetailScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for DetailScreen {
    fn id(&self) -> ScreenId {
        ScreenId::Detail
    }

    fn title(&self, state: &AppState) -> String {
        state.detail.title.clone()
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
        _pool: &RepositoryPool,
    ) {
        let detail = &mut state.detail;
        let height = usize::from(area.height.saturating_sub(2));
        if detail.following {
            detail.scroll = detail.lines.len().saturating_sub(height);
        }

        let mut title = format!(" {} ", detail.title);
        if detail.following {
            title.push_str("[follow] ");
        }

        let lines: Vec<Line> = if detail.loading {
            vec![Line::from(Span::styled("Loading...", Theme::text_highlight()))]
        } else {
            detail
                .lines
                .iter()
                .skip(detail.scroll)
                .take(height)
                .map(|l| Line::from(l.as_str()))
                .collect()
        };

        let position = format!(
            " {}/{} ",
            (detail.scroll + 1).min(detail.lines.len()),
            detail.lines.len()
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border_focused())
            .title(Span::styled(title, Theme::title()))
            .title_bottom(Line::from(Span::styled(position, Theme::text_dim())).right_aligned());

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("j/k", "Scroll"),
            ("C-d/C-u", "Page"),
            ("g/G", "Top/Bottom"),
            ("Esc", "Back"),
        ]
    }
}
