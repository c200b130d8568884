//! Command bar commands
//!
//! Commands are typed after `:` and parsed into [`Action`]s by the
//! [`CommandRegistry`], which is built once at startup and handed to the
//! event loop and the help overlay.

use kubedeck_k8s::Selector;
use kubedeck_types::ResourceKind;

use crate::app::Action;

type Parser = fn(&[&str]) -> Result<Action, String>;

/// A single command bar entry
pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub description: &'static str,
    parse: Parser,
}

impl Command {
    fn matches(&self, word: &str) -> bool {
        self.name == word || self.aliases.contains(&word)
    }
}

/// Registry of the command bar's commands
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let commands = vec![
            Command {
                name: "scale",
                aliases: &[],
                usage: "scale N",
                description: "Set replicas of the selected workload",
                parse: parse_scale,
            },
            Command {
                name: "delete",
                aliases: &["del"],
                usage: "delete",
                description: "Delete the selected resource",
                parse: |_| Ok(Action::Delete),
            },
            Command {
                name: "yaml",
                aliases: &[],
                usage: "yaml",
                description: "Show the live manifest",
                parse: |_| Ok(Action::ShowYaml),
            },
            Command {
                name: "describe",
                aliases: &["desc"],
                usage: "describe",
                description: "Describe with recent events",
                parse: |_| Ok(Action::Describe),
            },
            Command {
                name: "logs",
                aliases: &["log"],
                usage: "logs [-f]",
                description: "Show (or follow) pod logs",
                parse: parse_logs,
            },
            Command {
                name: "ctx",
                aliases: &["context"],
                usage: "ctx [NAME]",
                description: "Switch context, or list contexts",
                parse: parse_context,
            },
            Command {
                name: "retry",
                aliases: &[],
                usage: "retry NAME",
                description: "Retry loading a failed context",
                parse: parse_retry,
            },
            Command {
                name: "kind",
                aliases: &["k"],
                usage: "kind KIND",
                description: "Browse another resource kind",
                parse: parse_kind,
            },
            Command {
                name: "ns",
                aliases: &["namespace"],
                usage: "ns NAME|all",
                description: "Filter by namespace",
                parse: parse_namespace,
            },
            Command {
                name: "selector",
                aliases: &["sel", "l"],
                usage: "selector [EXPR]",
                description: "Filter by label selector",
                parse: parse_selector,
            },
            Command {
                name: "quit",
                aliases: &["q"],
                usage: "quit",
                description: "Exit kubedeck",
                parse: |_| Ok(Action::Quit),
            },
        ];
        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Parse a command line (without the leading `:`)
    ///
    /// A bare kind name such as `po` or `deployments` is shorthand for
    /// `kind po`.
    pub fn parse(&self, input: &str) -> Result<Action, String> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let Some((&head, args)) = words.split_first() else {
            return Ok(Action::None);
        };

        if let Some(command) = self.commands.iter().find(|c| c.matches(head)) {
            return (command.parse)(args).map_err(|e| format!("{}: {}", command.usage, e));
        }
        match head.parse::<ResourceKind>() {
            Ok(kind) if args.is_empty() => Ok(Action::SetKind(kind)),
            _ => Err(format!("unknown command '{}'", head)),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_scale(args: &[&str]) -> Result<Action, String> {
    match args {
        [n] => n
            .parse::<i32>()
            .map(Action::Scale)
            .map_err(|_| format!("'{}' is not a replica count", n)),
        _ => Err("expected a replica count".to_string()),
    }
}

fn parse_logs(args: &[&str]) -> Result<Action, String> {
    match args {
        [] => Ok(Action::ShowLogs { follow: false }),
        ["-f"] | ["--follow"] => Ok(Action::ShowLogs { follow: true }),
        _ => Err("unexpected arguments".to_string()),
    }
}

fn parse_context(args: &[&str]) -> Result<Action, String> {
    match args {
        [] => Ok(Action::ShowContexts),
        [name] => Ok(Action::SwitchContext(name.to_string())),
        _ => Err("expected one context name".to_string()),
    }
}

fn parse_retry(args: &[&str]) -> Result<Action, String> {
    match args {
        [] => Ok(Action::RetrySelected),
        [name] => Ok(Action::RetryContext(name.to_string())),
        _ => Err("expected one context name".to_string()),
    }
}

fn parse_kind(args: &[&str]) -> Result<Action, String> {
    match args {
        [kind] => kind
            .parse::<ResourceKind>()
            .map(Action::SetKind)
            .map_err(|e| e.to_string()),
        _ => Err("expected a kind".to_string()),
    }
}

fn parse_namespace(args: &[&str]) -> Result<Action, String> {
    match args {
        [] | ["all"] | ["-A"] => Ok(Action::SetNamespace(None)),
        [ns] => Ok(Action::SetNamespace(Some(ns.to_string()))),
        _ => Err("expected one namespace".to_string()),
    }
}

fn parse_selector(args: &[&str]) -> Result<Action, String> {
    // Selector expressions may contain spaces ("env in (a, b)")
    let expr = args.join(" ");
    expr.parse::<Selector>()
        .map(Action::SetSelector)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        let registry = CommandRegistry::new();
        assert_eq!(registry.parse("scale 3"), Ok(Action::Scale(3)));
        assert!(registry.parse("scale").is_err());
        assert!(registry.parse("scale three").is_err());
    }

    #[test]
    fn test_kind_aliases() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.parse("kind deploy"),
            Ok(Action::SetKind(ResourceKind::Deployment))
        );
        assert_eq!(registry.parse("po"), Ok(Action::SetKind(ResourceKind::Pod)));
        assert_eq!(
            registry.parse("hpa"),
            Ok(Action::SetKind(ResourceKind::HorizontalPodAutoscaler))
        );
        assert!(registry.parse("kind widgets").is_err());
    }

    #[test]
    fn test_namespace() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.parse("ns kube-system"),
            Ok(Action::SetNamespace(Some("kube-system".to_string())))
        );
        assert_eq!(registry.parse("ns all"), Ok(Action::SetNamespace(None)));
    }

    #[test]
    fn test_context_and_logs() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.parse("ctx prod"),
            Ok(Action::SwitchContext("prod".to_string()))
        );
        assert_eq!(registry.parse("ctx"), Ok(Action::ShowContexts));
        assert_eq!(
            registry.parse("logs -f"),
            Ok(Action::ShowLogs { follow: true })
        );
        assert_eq!(registry.parse("retry"), Ok(Action::RetrySelected));
    }

    #[test]
    fn test_selector_with_spaces() {
        let registry = CommandRegistry::new();
        let expected: Selector = "env in (a,b)".parse().unwrap();
        match registry.parse("sel env in (a, b)") {
            Ok(Action::SetSelector(selector)) => {
                assert_eq!(selector.to_string(), expected.to_string())
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(
            registry.parse("selector"),
            Ok(Action::SetSelector(Selector::everything()))
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.parse("frobnicate").is_err());
        assert_eq!(registry.parse("   "), Ok(Action::None));
    }
}
