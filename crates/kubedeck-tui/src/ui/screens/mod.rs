//! Screens and the registry the UI loop draws them from

mod context_list;
mod detail;
mod resource_list;

use ratatui::{Frame, layout::Rect};

use kubedeck_k8s::RepositoryPool;

use crate::app::{AppState, ScreenId};

pub use context_list::ContextListScreen;
pub use detail::DetailScreen;
pub use resource_list::ResourceListScreen;

/// A full-size view of the content area
pub trait Screen {
    fn id(&self) -> ScreenId;

    /// Short title for the header
    fn title(&self, state: &AppState) -> String;

    /// Called with the content area whenever the terminal is resized
    fn set_size(&mut self, area: Rect);

    /// Rows moved by PageUp/PageDown
    fn page_size(&self) -> usize;

    fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        state: &mut AppState,
        pool: &RepositoryPool,
    );

    /// Key hints for the status bar
    fn hints(&self) -> Vec<(&'static str, &'static str)>;
}

/// Content-area height minus borders and a header row
fn visible_rows(area: Rect) -> usize {
    usize::from(area.height.saturating_sub(3)).max(1)
}

/// Every screen of the application, built once at startup
pub struct ScreenRegistry {
    screens: Vec<Box<dyn Screen>>,
}

impl ScreenRegistry {
    pub fn new() -> Self {
        let screens: Vec<Box<dyn Screen>> = vec![
            Box::new(ContextListScreen::new()),
            Box::new(ResourceListScreen::new()),
            Box::new(DetailScreen::new()),
        ];
        Self { screens }
    }

    pub fn get(&self, id: ScreenId) -> Option<&dyn Screen> {
        self.screens
            .iter()
            .find(|s| s.id() == id)
            .map(|s| &**s)
    }

    pub fn get_mut(&mut self, id: ScreenId) -> Option<&mut (dyn Screen + 'static)> {
        self.screens
            .iter_mut()
            .find(|s| s.id() == id)
            .map(|s| &mut **s)
    }

    pub fn ids(&self) -> Vec<ScreenId> {
        self.screens.iter().map(|s| s.id()).collect()
    }

    /// Propagate a new content area to every screen
    pub fn set_size(&mut self, area: Rect) {
        for screen in &mut self.screens {
            screen.set_size(area);
        }
    }

    pub fn page_size(&self, id: ScreenId) -> usize {
        self.get(id).map_or(1, |s| s.page_size())
    }
}

impl Default for ScreenRegistry {
    fn default() -> Self {
        Self::new()
    }
}
