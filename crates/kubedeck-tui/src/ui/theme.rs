use ratatui::style::{Color, Modifier, Style};

use kubedeck_types::ContextState;

/// Color theme for the application
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    // Border styles
    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::PRIMARY)
    }

    // Text styles
    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn table_header() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    // List styles
    pub fn list_item() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn list_item_selected() -> Style {
        Style::default()
            .fg(Self::BG)
            .bg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn list_item_current() -> Style {
        Style::default()
            .fg(Self::SUCCESS)
            .add_modifier(Modifier::BOLD)
    }

    /// Colour for a context's load state
    pub fn context_state(state: Option<&ContextState>) -> Style {
        match state {
            Some(state) => Style::default().fg(state.color()),
            None => Self::text_dim(),
        }
    }

    /// Colour for a row's status column
    pub fn resource_status(status: &str) -> Style {
        match status {
            "Running" | "Ready" | "Active" | "Bound" | "Succeeded" | "Complete" => {
                Style::default().fg(Self::SUCCESS)
            }
            "Pending" | "ContainerCreating" | "Terminating" => Style::default().fg(Self::WARNING),
            s if s.starts_with("Err")
                || s.ends_with("BackOff")
                || s == "Failed"
                || s == "NotReady"
                || s == "OOMKilled" =>
            {
                Style::default().fg(Self::ERROR)
            }
            _ => Self::text(),
        }
    }

    // Status bar
    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG_DIM).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    pub fn command_bar() -> Style {
        Style::default().fg(Self::FG).bg(Color::Black)
    }

    pub fn info() -> Style {
        Style::default().fg(Self::SUCCESS)
    }

    // Error
    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_colours() {
        assert_eq!(Theme::resource_status("Running").fg, Some(Theme::SUCCESS));
        assert_eq!(Theme::resource_status("CrashLoopBackOff").fg, Some(Theme::ERROR));
        assert_eq!(Theme::resource_status("ErrImagePull").fg, Some(Theme::ERROR));
        assert_eq!(Theme::resource_status("2/3").fg, Some(Theme::FG));
    }
}
