use kubedeck_k8s::Selector;
use kubedeck_types::ResourceKind;

/// Actions the UI loop can perform
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    // Navigation
    Quit,
    GoBack,
    ShowContexts,

    // List navigation
    ListUp,
    ListDown,
    ListSelect,
    PageUp,
    PageDown,
    ScrollToTop,
    ScrollToBottom,

    // Detail view scrolling
    ScrollUp(usize),
    ScrollDown(usize),

    // Resource browsing
    NextKind,
    PrevKind,
    SetKind(ResourceKind),
    SetNamespace(Option<String>),
    SetSelector(Selector),

    // Context management
    SwitchContext(String),
    RetrySelected,
    RetryContext(String),

    // Operations on the selected resource
    ShowYaml,
    Describe,
    ShowLogs { follow: bool },
    Delete,
    Scale(i32),

    // Command bar
    OpenCommandBar,
    CommandInput(char),
    CommandBackspace,
    CommandClear,
    CommandSubmit,
    CommandCancel,

    // UI
    ToggleHelp,
    None,
}
