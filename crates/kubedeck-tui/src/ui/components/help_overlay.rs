use ratatui::{
    Frame,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::CommandRegistry;
use crate::ui::Layout;

/// Help overlay showing keybindings and commands
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame, commands: &CommandRegistry) {
        let popup_area = Layout::popup(frame.area(), 64, 40);
        frame.render_widget(Clear, popup_area);

        let mut help_text = vec![
            Line::from(Span::styled(
                "Keybindings",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Self::section("Resources"),
            Self::key_line("Tab/S-Tab", "Next / previous kind"),
            Self::key_line("Enter/d", "Describe"),
            Self::key_line("y", "Manifest (YAML)"),
            Self::key_line("l / f", "Logs / follow logs"),
            Self::key_line("Ctrl+x", "Delete"),
            Self::key_line("c", "Contexts"),
            Line::from(""),
            Self::section("Contexts"),
            Self::key_line("Enter", "Switch to context"),
            Self::key_line("r", "Retry failed context"),
            Line::from(""),
            Self::section("General"),
            Self::key_line(":", "Command bar"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("Esc", "Go back"),
            Self::key_line("q", "Quit"),
            Line::from(""),
            Self::section("Commands"),
        ];
        help_text.extend(
            commands
                .commands()
                .iter()
                .map(|c| Self::key_line(c.usage, c.description)),
        );

        let help_widget = Paragraph::new(help_text)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(Span::styled(
                        " Help ",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )),
            );

        frame.render_widget(help_widget, popup_area);
    }

    fn section(title: &str) -> Line<'_> {
        Line::from(Span::styled(title, Style::default().fg(Color::Yellow)))
    }

    fn key_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
        Line::from(vec![
            Span::styled(format!("  {:>16}", key), Style::default().fg(Color::Green)),
            Span::styled(format!("  {}", desc), Style::default().fg(Color::White)),
        ])
    }
}
