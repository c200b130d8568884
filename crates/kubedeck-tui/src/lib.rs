//! Terminal UI for kubedeck
//!
//! Screens read straight from the shared `RepositoryPool` on every frame;
//! everything that talks to a cluster runs on background tasks and reports
//! back through the single [`EventHandler`] queue.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{
    Action, AppState, Command, CommandRegistry, DetailView, ScreenId, StatusMessage,
};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, EventSender, Tui};
pub use ui::components::{CommandBar, HelpOverlay, ListSelector, ListSelectorExt, StatusBar};
pub use ui::screens::{
    ContextListScreen, DetailScreen, ResourceListScreen, Screen, ScreenRegistry,
};
pub use ui::{Layout, Theme, render};
