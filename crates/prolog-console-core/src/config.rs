//! Configuration types for the Prolog query console.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{ConsoleCommand, Error, KeyBinding};

/// Console configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Query submission settings
    pub query: QuerySettings,
    /// History settings
    pub history: HistorySettings,
    /// Completion settings
    pub completion: CompletionSettings,
    /// Namespace prefix refresh settings
    pub namespaces: NamespaceSettings,
    /// Key bindings
    pub keys: KeySettings,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

impl ConsoleConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ConsoleConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.query.predicate_names_query.trim().is_empty() {
            return Err(Error::Config(
                "query.predicate_names_query cannot be empty".to_string(),
            ));
        }

        if self.namespaces.enabled {
            if self.namespaces.refresh_interval_ms == 0 {
                return Err(Error::Config(
                    "namespaces.refresh_interval_ms must be > 0".to_string(),
                ));
            }
            if self.namespaces.query.trim().is_empty() {
                return Err(Error::Config("namespaces.query cannot be empty".to_string()));
            }
        }

        if self.completion.source_tag.trim().is_empty() {
            return Err(Error::Config(
                "completion.source_tag cannot be empty".to_string(),
            ));
        }

        // Every configured chord must parse
        for command in ConsoleCommand::ALL {
            self.keys.binding(command)?;
        }

        if let Some(level) = &self.log_level {
            if !matches!(
                level.as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ) {
                return Err(Error::Config(format!("unknown log_level '{level}'")));
            }
        }

        Ok(())
    }
}

/// What to do with the statement terminator at the end of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingPeriodPolicy {
    /// Strip a trailing `.` if present and submit either way
    #[default]
    Strip,
    /// Only submit text ending in `.`; otherwise just close the open query
    RequireTerminator,
}

impl TrailingPeriodPolicy {
    /// Normalize trimmed editor text into the goal sent to the service.
    ///
    /// Returns `None` when the text is not a complete query under this
    /// policy. The returned goal never carries the terminating period and
    /// may be empty.
    ///
    /// # Example
    /// ```
    /// use prolog_console_core::TrailingPeriodPolicy;
    ///
    /// let strip = TrailingPeriodPolicy::Strip;
    /// assert_eq!(strip.normalize("member(X, [1,2]).").as_deref(), Some("member(X, [1,2])"));
    /// assert_eq!(strip.normalize("member(X, [1,2])").as_deref(), Some("member(X, [1,2])"));
    ///
    /// let strict = TrailingPeriodPolicy::RequireTerminator;
    /// assert_eq!(strict.normalize("member(X, [1,2])"), None);
    /// ```
    pub fn normalize(&self, text: &str) -> Option<String> {
        let text = text.trim();
        match text.strip_suffix('.') {
            Some(goal) => Some(goal.trim_end().to_string()),
            None => match self {
                TrailingPeriodPolicy::Strip => Some(text.to_string()),
                TrailingPeriodPolicy::RequireTerminator => None,
            },
        }
    }
}

/// Query submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Trailing period policy
    pub trailing_period: TrailingPeriodPolicy,
    /// Goal enumerating predicate and module names for completion
    pub predicate_names_query: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            trailing_period: TrailingPeriodPolicy::Strip,
            predicate_names_query: "findall(X, current_predicate(X/_);current_module(X), L)"
                .to_string(),
        }
    }
}

/// Where submitted queries are remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPersistence {
    /// Server-side log via `history_add/1` and `history_get/2`
    #[default]
    Remote,
    /// Local, process-lifetime list
    Memory,
    /// No history at all
    Disabled,
}

/// History settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Persistence backend
    pub persistence: HistoryPersistence,
}

/// Completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Offer predicate and module names as completions
    pub enabled: bool,
    /// Score attached to each predicate name
    pub score: i32,
    /// Source tag attached to each predicate name
    pub source_tag: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            score: 100,
            source_tag: "pl".to_string(),
        }
    }
}

/// Namespace prefix refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceSettings {
    /// Keep a namespace prefix map refreshed in the background
    pub enabled: bool,
    /// Refresh interval in milliseconds
    pub refresh_interval_ms: u64,
    /// Goal binding `L` to a list of `[Prefix, URI]` pairs
    pub query: String,
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            refresh_interval_ms: 10_000,
            query: "findall([P,U], rdf_current_prefix(P,U), L)".to_string(),
        }
    }
}

/// Chord strings for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSettings {
    /// Chord on Windows and Linux
    pub win: String,
    /// Chord on macOS
    pub mac: String,
}

impl ChordSettings {
    fn new(win: &str, mac: &str) -> Self {
        Self {
            win: win.to_string(),
            mac: mac.to_string(),
        }
    }
}

/// Key binding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    /// Submit the editor contents
    pub submit_query: ChordSettings,
    /// Request the next solution
    pub next_solution: ChordSettings,
    /// Show the next history entry
    pub history_next: ChordSettings,
    /// Show the previous history entry
    pub history_previous: ChordSettings,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            submit_query: ChordSettings::new("Ctrl-Enter", "Command-Enter"),
            next_solution: ChordSettings::new("Ctrl-;", "Command-;"),
            history_next: ChordSettings::new("Up", "Up"),
            history_previous: ChordSettings::new("Down", "Down"),
        }
    }
}

impl KeySettings {
    /// Parsed binding for `command`.
    pub fn binding(&self, command: ConsoleCommand) -> crate::Result<KeyBinding> {
        let chords = match command {
            ConsoleCommand::SubmitQuery => &self.submit_query,
            ConsoleCommand::NextSolution => &self.next_solution,
            ConsoleCommand::HistoryNext => &self.history_next,
            ConsoleCommand::HistoryPrevious => &self.history_previous,
        };
        KeyBinding::parse(&chords.win, &chords.mac).map_err(|e| {
            Error::Config(format!("keys.{}: {e}", command.name()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Key, KeyChord, Platform};

    #[test]
    fn test_default_config() {
        let config = ConsoleConfig::default();
        assert_eq!(config.query.trailing_period, TrailingPeriodPolicy::Strip);
        assert_eq!(config.history.persistence, HistoryPersistence::Remote);
        assert_eq!(config.completion.score, 100);
        assert_eq!(config.completion.source_tag, "pl");
        assert!(!config.namespaces.enabled);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_strip_policy_normalizes_both_forms() {
        let policy = TrailingPeriodPolicy::Strip;
        assert_eq!(policy.normalize("foo(X).").as_deref(), Some("foo(X)"));
        assert_eq!(policy.normalize("foo(X)").as_deref(), Some("foo(X)"));
        assert_eq!(policy.normalize("  foo(X) .  ").as_deref(), Some("foo(X)"));
        // Only one terminator is removed
        assert_eq!(policy.normalize("foo..").as_deref(), Some("foo."));
        assert_eq!(policy.normalize("").as_deref(), Some(""));
        assert_eq!(policy.normalize(".").as_deref(), Some(""));
    }

    #[test]
    fn test_require_terminator_policy() {
        let policy = TrailingPeriodPolicy::RequireTerminator;
        assert_eq!(policy.normalize("foo(X).").as_deref(), Some("foo(X)"));
        assert_eq!(policy.normalize("foo(X)"), None);
        assert_eq!(policy.normalize(""), None);
    }

    #[test]
    fn test_config_validation() {
        let config = ConsoleConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_keys_match_command_defaults() {
        let keys = KeySettings::default();
        for command in ConsoleCommand::ALL {
            assert_eq!(keys.binding(command).unwrap(), command.default_binding());
        }
    }

    #[test]
    fn test_invalid_refresh_interval() {
        let mut config = ConsoleConfig::default();
        config.namespaces.enabled = true;
        config.namespaces.refresh_interval_ms = 0;
        assert!(config.validate().is_err());

        // Ignored while the refresher is disabled
        config.namespaces.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_key_binding() {
        let mut config = ConsoleConfig::default();
        config.keys.next_solution.win = "Ctrl-Nonsense".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("next_result"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ConsoleConfig::default();
        config.log_level = Some("loud".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
query:
  trailing_period: require_terminator

history:
  persistence: memory

completion:
  score: 50
  source_tag: prolog

namespaces:
  enabled: true
  refresh_interval_ms: 2500

keys:
  next_solution:
    win: "Ctrl-n"
    mac: "Command-n"

log_level: debug
"#;

        let config = ConsoleConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.query.trailing_period,
            TrailingPeriodPolicy::RequireTerminator
        );
        assert_eq!(config.history.persistence, HistoryPersistence::Memory);
        assert_eq!(config.completion.score, 50);
        assert_eq!(config.completion.source_tag, "prolog");
        assert!(config.namespaces.enabled);
        assert_eq!(config.namespaces.refresh_interval_ms, 2500);
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let binding = config.keys.binding(ConsoleCommand::NextSolution).unwrap();
        assert_eq!(
            binding.for_platform(Platform::Linux),
            KeyChord::ctrl(Key::Char('n'))
        );
        // Untouched commands keep their defaults
        assert_eq!(
            config.keys.binding(ConsoleCommand::SubmitQuery).unwrap(),
            ConsoleCommand::SubmitQuery.default_binding()
        );
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ConsoleConfig::from_yaml("query: [unclosed");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = ConsoleConfig::from_yaml("query:\n  trailing_period: sometimes\n");
        assert!(result.is_err());
    }
}
