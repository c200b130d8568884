pub mod components;
mod layout;
pub mod screens;
mod theme;

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use kubedeck_k8s::RepositoryPool;

use crate::app::{AppState, CommandRegistry};
use components::{CommandBar, HelpOverlay, StatusBar};
use screens::ScreenRegistry;

pub use layout::Layout;
pub use theme::Theme;

/// Draw one frame: header, the current screen, the bottom bar and any overlay
pub fn render(
    frame: &mut Frame,
    screens: &mut ScreenRegistry,
    commands: &CommandRegistry,
    state: &mut AppState,
    pool: &RepositoryPool,
) {
    let (header_area, content_area, bottom_area) = Layout::main(frame.area());

    let Some(screen) = screens.get_mut(state.current_screen) else {
        return;
    };
    render_header(frame, header_area, &screen.title(state), pool);
    screen.render(frame, content_area, state, pool);

    if let Some(input) = &state.command_input {
        frame.render_widget(CommandBar::Input(input), bottom_area);
    } else if let Some(msg) = &state.status {
        frame.render_widget(CommandBar::Message(msg), bottom_area);
    } else {
        let right = match state.loading.len() {
            0 => String::new(),
            n => format!("loading {} context(s)", n),
        };
        let status = StatusBar::new().hints(screen.hints()).right(right);
        frame.render_widget(status, bottom_area);
    }

    if state.help_visible {
        HelpOverlay::render(frame, commands);
    }
}

fn render_header(frame: &mut Frame, area: Rect, title: &str, pool: &RepositoryPool) {
    let context = pool
        .active_context()
        .unwrap_or_else(|| "no context".to_string());
    let line = Line::from(vec![
        Span::styled("kubedeck", Theme::title()),
        Span::styled(" │ ", Theme::text_dim()),
        Span::styled(context, Theme::text_highlight()),
        Span::styled(" │ ", Theme::text_dim()),
        Span::styled(title.to_string(), Theme::text()),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border()),
    );
    frame.render_widget(header, area);
}
