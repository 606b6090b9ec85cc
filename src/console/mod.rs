//! Text-command console: registry, dispatch, history and the message log.

pub mod history;
pub mod log;
pub mod registry;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::alias::AliasStore;
use crate::schedule::panic_text;
pub use history::InputHistory;
pub use log::{FileMirror, LogEntry, MessageLog, Severity};
pub use registry::{CommandDescriptor, CommandFn, CommandRegistry};

/// Command console: resolves raw input lines against the registry and
/// routes everything through the message log.
pub struct Console {
    log: Arc<MessageLog>,
    registry: CommandRegistry,
    history: InputHistory,
}

impl Console {
    #[must_use]
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self {
            log,
            registry: CommandRegistry::new(),
            history: InputHistory::new(),
        }
    }

    #[must_use]
    pub fn with_history_limit(log: Arc<MessageLog>, history_limit: usize) -> Self {
        Self {
            log,
            registry: CommandRegistry::new(),
            history: InputHistory::with_limit(history_limit),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    #[must_use]
    pub fn history(&self) -> &InputHistory {
        &self.history
    }

    /// Resolve and execute one input line.
    ///
    /// The line is echoed verbatim as an input entry and pushed onto the
    /// history before resolution, resolved or not. The leading token —
    /// leading slash stripped, lower-cased — selects the command; the
    /// handler receives the full argument vector with the command token at
    /// index 0. Unknown keys that match an alias are expanded once against
    /// the alias store and re-resolved.
    ///
    /// Never fatal: unknown commands, handler errors and handler panics all
    /// come back as user-visible text.
    pub fn dispatch(&self, raw: &str, aliases: &AliasStore) -> String {
        let line = raw.trim();
        if line.is_empty() {
            self.log.input("");
            return String::new();
        }

        self.log.input(line);
        self.history.push(line);

        let mut argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let mut key = argv[0].trim_start_matches('/').to_lowercase();

        if !self.registry.contains(&key) {
            if let Some(target) = aliases.resolve(&key) {
                let mut expanded: Vec<String> =
                    target.split_whitespace().map(str::to_string).collect();
                expanded.extend(argv.into_iter().skip(1));
                argv = expanded;
                key = argv
                    .first()
                    .map(|token| token.trim_start_matches('/').to_lowercase())
                    .unwrap_or_default();
            }
        }
        if let Some(first) = argv.first_mut() {
            *first = key.clone();
        }

        let Some(handler) = self.registry.resolve(&key) else {
            let text = format!("*** Unknown Command: {key} ***");
            self.log.output(&text);
            return text;
        };

        match catch_unwind(AssertUnwindSafe(|| handler(&argv))) {
            Ok(Ok(text)) => {
                self.log.output(&text);
                text
            }
            Ok(Err(e)) => {
                let text = format!("Error: {e}");
                self.log.error(&text);
                text
            }
            Err(payload) => {
                let text = format!(
                    "Error: command {key} panicked: {}",
                    panic_text(payload.as_ref())
                );
                self.log.error(&text);
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> (Arc<MessageLog>, Console, AliasStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let aliases = AliasStore::open(dir.path().join("aliases.txt"));
        let log = Arc::new(MessageLog::new());
        let console = Console::new(Arc::clone(&log));
        (log, console, aliases, dir)
    }

    fn register(console: &Console, plugin: &str, name: &str, reply: &'static str) {
        console.registry().register(CommandDescriptor::new(
            plugin,
            name,
            "",
            format!("{name} command"),
            Arc::new(move |_args| Ok(reply.to_string())),
        ));
    }

    #[test]
    fn test_empty_input_logs_echo_and_runs_nothing() {
        let (log, console, aliases, _dir) = console();
        let result = console.dispatch("", &aliases);
        assert!(result.is_empty());
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].severity, Severity::Input);
        assert!(snapshot[0].text.is_empty());
        assert!(console.history().is_empty());
    }

    #[test]
    fn test_unknown_command_is_reported_not_fatal() {
        let (log, console, aliases, _dir) = console();
        let result = console.dispatch("/nope", &aliases);
        assert_eq!(result, "*** Unknown Command: nope ***");
        assert!(log
            .snapshot()
            .iter()
            .any(|entry| entry.text.contains("Unknown Command")));
    }

    #[test]
    fn test_mixed_case_and_slash_resolve() {
        let (_log, console, aliases, _dir) = console();
        register(&console, "core", "version", "0.3.0");
        assert_eq!(console.dispatch("VERSION", &aliases), "0.3.0");
        assert_eq!(console.dispatch("/Version", &aliases), "0.3.0");
    }

    #[test]
    fn test_handler_receives_command_token_and_args() {
        let (_log, console, aliases, _dir) = console();
        console.registry().register(CommandDescriptor::new(
            "core",
            "echo",
            "[text]",
            "echo args",
            Arc::new(|args| Ok(args.join(" "))),
        ));
        assert_eq!(console.dispatch("/Echo one two", &aliases), "echo one two");
    }

    #[test]
    fn test_history_records_every_line_without_dedup() {
        let (_log, console, aliases, _dir) = console();
        console.dispatch("help", &aliases);
        console.dispatch("help", &aliases);
        console.dispatch("/bogus arg", &aliases);
        assert_eq!(
            console.history().entries(),
            vec!["/bogus arg", "help", "help"]
        );
    }

    #[test]
    fn test_alias_expansion() {
        let (_log, console, aliases, _dir) = console();
        console.registry().register(CommandDescriptor::new(
            "core",
            "echo",
            "[text]",
            "echo args",
            Arc::new(|args| Ok(args.join(" "))),
        ));
        aliases.add("e", "echo hi").unwrap();
        assert_eq!(console.dispatch("e there", &aliases), "echo hi there");
    }

    #[test]
    fn test_handler_error_becomes_error_entry() {
        let (log, console, aliases, _dir) = console();
        console.registry().register(CommandDescriptor::new(
            "core",
            "fail",
            "",
            "always fails",
            Arc::new(|_args| anyhow::bail!("not today")),
        ));
        let result = console.dispatch("fail", &aliases);
        assert_eq!(result, "Error: not today");
        assert!(log
            .snapshot()
            .iter()
            .any(|entry| entry.severity == Severity::Error && entry.text.contains("not today")));
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let (log, console, aliases, _dir) = console();
        console.registry().register(CommandDescriptor::new(
            "core",
            "explode",
            "",
            "panics",
            Arc::new(|_args| panic!("kaboom")),
        ));
        let result = console.dispatch("explode", &aliases);
        assert!(result.contains("kaboom"));
        assert!(log
            .snapshot()
            .iter()
            .any(|entry| entry.severity == Severity::Error));
    }
}
