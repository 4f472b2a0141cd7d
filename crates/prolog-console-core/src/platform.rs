//! Platform detection for selecting key bindings.
//!
//! Editors bind commands to different chords on macOS (Command) than on
//! Windows and Linux (Ctrl).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Platforms with distinct key binding conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux
    Linux,
    /// macOS
    MacOS,
    /// Windows
    Windows,
    /// Anything else (e.g. wasm targets); uses the Windows/Linux chords
    Other,
}

impl Platform {
    /// Detect the current platform at compile time.
    ///
    /// # Examples
    ///
    /// ```
    /// use prolog_console_core::Platform;
    ///
    /// let platform = Platform::detect();
    /// println!("Running on: {:?}", platform);
    /// ```
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    /// Get the platform name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOS => "macOS",
            Platform::Windows => "Windows",
            Platform::Other => "other",
        }
    }

    /// Whether the platform uses Command instead of Ctrl for shortcuts.
    pub fn uses_command_key(&self) -> bool {
        matches!(self, Platform::MacOS)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
