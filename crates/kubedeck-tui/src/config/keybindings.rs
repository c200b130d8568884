use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

use crate::app::{Action, ScreenId};

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    ContextList,
    ResourceList,
    Detail,
    CommandBar,
}

impl From<ScreenId> for KeyContext {
    fn from(screen: ScreenId) -> Self {
        match screen {
            ScreenId::Contexts => Self::ContextList,
            ScreenId::Resources => Self::ResourceList,
            ScreenId::Detail => Self::Detail,
        }
    }
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

fn list_navigation() -> HashMap<KeyBinding, Action> {
    let mut list_nav = HashMap::new();
    list_nav.insert(KeyBinding::new(KeyCode::Char('j')), Action::ListDown);
    list_nav.insert(KeyBinding::new(KeyCode::Down), Action::ListDown);
    list_nav.insert(KeyBinding::new(KeyCode::Char('k')), Action::ListUp);
    list_nav.insert(KeyBinding::new(KeyCode::Up), Action::ListUp);
    list_nav.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
    list_nav.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
    list_nav.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
    list_nav.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
    list_nav.insert(KeyBinding::new(KeyCode::Enter), Action::ListSelect);
    list_nav
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        // Global bindings
        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char(':')), Action::OpenCommandBar);
        global.insert(KeyBinding::shift(KeyCode::Char(':')), Action::OpenCommandBar);
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::shift(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::new(KeyCode::Esc), Action::GoBack);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        // Context list
        let mut contexts = list_navigation();
        contexts.insert(KeyBinding::new(KeyCode::Char('r')), Action::RetrySelected);
        bindings.insert(KeyContext::ContextList, contexts);

        // Resource list
        let mut resources = list_navigation();
        resources.insert(KeyBinding::new(KeyCode::Enter), Action::Describe);
        resources.insert(KeyBinding::new(KeyCode::Tab), Action::NextKind);
        resources.insert(KeyBinding::shift(KeyCode::BackTab), Action::PrevKind);
        resources.insert(KeyBinding::new(KeyCode::BackTab), Action::PrevKind);
        resources.insert(KeyBinding::new(KeyCode::Char('c')), Action::ShowContexts);
        resources.insert(KeyBinding::new(KeyCode::Char('y')), Action::ShowYaml);
        resources.insert(KeyBinding::new(KeyCode::Char('d')), Action::Describe);
        resources.insert(
            KeyBinding::new(KeyCode::Char('l')),
            Action::ShowLogs { follow: false },
        );
        resources.insert(
            KeyBinding::new(KeyCode::Char('f')),
            Action::ShowLogs { follow: true },
        );
        resources.insert(KeyBinding::ctrl(KeyCode::Char('x')), Action::Delete);
        bindings.insert(KeyContext::ResourceList, resources);

        // Detail view - less-like scrolling
        let mut detail = HashMap::new();
        detail.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        detail.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        detail.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        detail.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        detail.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
        detail.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
        detail.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
        detail.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
        detail.insert(KeyBinding::new(KeyCode::Char('g')), Action::ScrollToTop);
        detail.insert(KeyBinding::shift(KeyCode::Char('G')), Action::ScrollToBottom);
        detail.insert(KeyBinding::new(KeyCode::Home), Action::ScrollToTop);
        detail.insert(KeyBinding::new(KeyCode::End), Action::ScrollToBottom);
        bindings.insert(KeyContext::Detail, detail);

        // Command bar (while typing)
        let mut command_bar = HashMap::new();
        command_bar.insert(KeyBinding::new(KeyCode::Enter), Action::CommandSubmit);
        command_bar.insert(KeyBinding::new(KeyCode::Esc), Action::CommandCancel);
        command_bar.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::CommandCancel);
        command_bar.insert(KeyBinding::new(KeyCode::Backspace), Action::CommandBackspace);
        command_bar.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::CommandClear);
        bindings.insert(KeyContext::CommandBar, command_bar);

        Self { bindings }
    }

    /// Look up action for key event in given context
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&context)
            .and_then(|bindings| bindings.get(&binding))
        {
            return Some(action.clone());
        }

        // Fall back to global bindings
        self.bindings
            .get(&KeyContext::Global)?
            .get(&binding)
            .cloned()
    }

    /// Handle key event while the command bar is open
    /// Returns CommandInput for plain characters
    pub fn get_command_bar_action(&self, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&KeyContext::CommandBar)
            .and_then(|bindings| bindings.get(&binding))
        {
            return Some(action.clone());
        }

        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                Some(Action::CommandInput(c))
            }
            _ => None,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}
