mod action;
mod command;
mod state;

pub use action::Action;
pub use command::{Command, CommandRegistry};
pub use state::{AppState, DetailView, MAX_DETAIL_LINES, ScreenId, StatusMessage};
