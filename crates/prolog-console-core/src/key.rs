//! Key chords and console commands for editor key bindings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Platform, Result};

/// Keyboard key, without modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Regular character
    Char(char),

    // Navigation
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up
    PageUp,
    /// Page Down
    PageDown,

    // Actions
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Space key
    Space,
}

impl Key {
    /// Parse a key name such as `Enter`, `Up` or `;`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Enter" | "Return" => Ok(Key::Enter),
            "Tab" => Ok(Key::Tab),
            "Escape" | "Esc" => Ok(Key::Escape),
            "Backspace" => Ok(Key::Backspace),
            "Delete" | "Del" => Ok(Key::Delete),
            "Space" => Ok(Key::Space),
            "Up" => Ok(Key::Up),
            "Down" => Ok(Key::Down),
            "Left" => Ok(Key::Left),
            "Right" => Ok(Key::Right),
            "Home" => Ok(Key::Home),
            "End" => Ok(Key::End),
            "PageUp" | "PgUp" => Ok(Key::PageUp),
            "PageDown" | "PgDn" => Ok(Key::PageDown),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Key::Char(ch)),
                    _ => Err(Error::InvalidKey(s.to_string())),
                }
            }
        }
    }

    /// Name used when displaying the key.
    pub fn name(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Up => "Up".to_string(),
            Key::Down => "Down".to_string(),
            Key::Left => "Left".to_string(),
            Key::Right => "Right".to_string(),
            Key::Home => "Home".to_string(),
            Key::End => "End".to_string(),
            Key::PageUp => "PageUp".to_string(),
            Key::PageDown => "PageDown".to_string(),
            Key::Enter => "Enter".to_string(),
            Key::Tab => "Tab".to_string(),
            Key::Escape => "Escape".to_string(),
            Key::Backspace => "Backspace".to_string(),
            Key::Delete => "Delete".to_string(),
            Key::Space => "Space".to_string(),
        }
    }
}

/// Modifier keys held together with a key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Modifiers {
    /// Control
    pub ctrl: bool,
    /// Alt / Option
    pub alt: bool,
    /// Shift
    pub shift: bool,
    /// Command (macOS)
    pub command: bool,
}

impl Modifiers {
    /// Whether no modifier is held.
    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.command)
    }
}

/// A key together with its modifiers, e.g. `Ctrl-Enter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct KeyChord {
    /// Held modifiers
    pub modifiers: Modifiers,
    /// The key itself
    pub key: Key,
}

impl KeyChord {
    /// Chord without modifiers.
    pub fn plain(key: Key) -> Self {
        Self {
            modifiers: Modifiers::default(),
            key,
        }
    }

    /// Chord with Control held.
    pub fn ctrl(key: Key) -> Self {
        Self {
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
            key,
        }
    }

    /// Chord with Command held.
    pub fn command(key: Key) -> Self {
        Self {
            modifiers: Modifiers {
                command: true,
                ..Modifiers::default()
            },
            key,
        }
    }

    /// Parse a chord string.
    ///
    /// Modifiers are separated from the key by `-` or `+`:
    /// - "Ctrl-Enter" -> Ctrl + Enter
    /// - "Command-;" -> Command + `;`
    /// - "Ctrl+Shift+Up" -> Ctrl + Shift + Up
    /// - "Down" -> Down
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut modifiers = Modifiers::default();
        let mut rest = s;

        loop {
            let Some((name, tail)) = split_modifier(rest) else {
                break;
            };
            match name.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "cmd" | "command" | "meta" => modifiers.command = true,
                _ => break,
            }
            rest = tail;
        }

        if rest.is_empty() {
            return Err(Error::InvalidKey(s.to_string()));
        }

        let key = match Key::parse(rest)? {
            Key::Char(c) if modifiers.ctrl || modifiers.alt || modifiers.command => {
                Key::Char(c.to_ascii_lowercase())
            }
            key => key,
        };

        Ok(Self { modifiers, key })
    }
}

fn split_modifier(s: &str) -> Option<(&str, &str)> {
    let idx = s.find(|c: char| c == '-' || c == '+')?;
    if idx == 0 {
        return None;
    }
    Some((&s[..idx], &s[idx + 1..]))
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl-")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt-")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift-")?;
        }
        if self.modifiers.command {
            f.write_str("Command-")?;
        }
        f.write_str(&self.key.name())
    }
}

impl std::str::FromStr for KeyChord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// User intents the console binds to keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleCommand {
    /// Submit the editor contents as a new query
    SubmitQuery,
    /// Ask the active query for its next solution
    NextSolution,
    /// Show the next (older) history entry
    HistoryNext,
    /// Show the previous (newer) history entry
    HistoryPrevious,
}

impl ConsoleCommand {
    /// All commands, in registration order.
    pub const ALL: [ConsoleCommand; 4] = [
        ConsoleCommand::SubmitQuery,
        ConsoleCommand::NextSolution,
        ConsoleCommand::HistoryNext,
        ConsoleCommand::HistoryPrevious,
    ];

    /// Command name registered with the editor.
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::SubmitQuery => "send_query",
            ConsoleCommand::NextSolution => "next_result",
            ConsoleCommand::HistoryNext => "next_history",
            ConsoleCommand::HistoryPrevious => "previous_history",
        }
    }

    /// Default binding for this command.
    pub fn default_binding(&self) -> KeyBinding {
        match self {
            ConsoleCommand::SubmitQuery => KeyBinding {
                win: KeyChord::ctrl(Key::Enter),
                mac: KeyChord::command(Key::Enter),
            },
            ConsoleCommand::NextSolution => KeyBinding {
                win: KeyChord::ctrl(Key::Char(';')),
                mac: KeyChord::command(Key::Char(';')),
            },
            ConsoleCommand::HistoryNext => KeyBinding::same(KeyChord::plain(Key::Up)),
            ConsoleCommand::HistoryPrevious => KeyBinding::same(KeyChord::plain(Key::Down)),
        }
    }
}

/// Platform-specific chords for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyBinding {
    /// Chord on Windows and Linux
    pub win: KeyChord,
    /// Chord on macOS
    pub mac: KeyChord,
}

impl KeyBinding {
    /// Same chord on every platform.
    pub fn same(chord: KeyChord) -> Self {
        Self {
            win: chord,
            mac: chord,
        }
    }

    /// Parse both chords.
    pub fn parse(win: &str, mac: &str) -> Result<Self> {
        Ok(Self {
            win: KeyChord::parse(win)?,
            mac: KeyChord::parse(mac)?,
        })
    }

    /// Chord used on `platform`.
    pub fn for_platform(&self, platform: Platform) -> KeyChord {
        match platform {
            Platform::MacOS => self.mac,
            _ => self.win,
        }
    }
}
