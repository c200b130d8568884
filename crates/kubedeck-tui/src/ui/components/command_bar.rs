use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Color,
    text::{Line, Span},
    widgets::Widget,
};

use crate::app::StatusMessage;
use crate::ui::Theme;

/// Bottom line while typing a command, or showing a status message
pub enum CommandBar<'a> {
    Input(&'a str),
    Message(&'a StatusMessage),
}

impl Widget for CommandBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = match self {
            Self::Input(input) => {
                buf.set_style(area, Theme::command_bar());
                Line::from(vec![
                    Span::styled(":", Theme::text_highlight()),
                    Span::styled(input, Theme::command_bar()),
                    Span::styled("█", Theme::text_dim()),
                ])
            }
            Self::Message(msg) => {
                buf.set_style(area, Theme::status_bar());
                let style = if msg.is_error {
                    Theme::error()
                } else {
                    Theme::info()
                };
                Line::from(Span::styled(msg.text.as_str(), style.bg(Color::DarkGray)))
            }
        };
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));
    }
}
