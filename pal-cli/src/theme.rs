//! Persisted dark/light preference.
//!
//! Stored as `{"theme": "dark"}` next to the configuration file. A missing or
//! unreadable file means `light`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use console::Style;
use pal_common::{Result, ResultExt};
use serde::{Deserialize, Serialize};

/// Color scheme of the terminal client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Light => Palette {
                user: Style::new().blue().bold(),
                assistant: Style::new().magenta().bold(),
                body: Style::new().black(),
                muted: Style::new().black().dim(),
                accent: Style::new().cyan(),
                error: Style::new().red(),
            },
            Self::Dark => Palette {
                user: Style::new().cyan().bold(),
                assistant: Style::new().yellow().bold(),
                body: Style::new().white(),
                muted: Style::new().white().dim(),
                accent: Style::new().green(),
                error: Style::new().red().bright(),
            },
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal styles for one theme.
#[derive(Debug, Clone)]
pub struct Palette {
    pub user: Style,
    pub assistant: Style,
    pub body: Style,
    pub muted: Style,
    pub accent: Style,
    pub error: Style,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    theme: Theme,
}

/// `~/.policypal/preferences.json`
pub fn preferences_path() -> PathBuf {
    pal_common::config::config_dir().join("preferences.json")
}

/// Read the stored theme, falling back to `light`.
pub fn load_from(path: &Path) -> Theme {
    let Ok(content) = fs::read_to_string(path) else {
        return Theme::default();
    };
    match serde_json::from_str::<Preferences>(&content) {
        Ok(prefs) => prefs.theme,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Ignoring unreadable preferences");
            Theme::default()
        }
    }
}

/// Persist the theme, creating parent directories.
pub fn save_to(path: &Path, theme: Theme) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(&Preferences { theme })?;
    fs::write(path, content).context(format!("Failed to write {}", path.display()))
}

pub fn load() -> Theme {
    load_from(&preferences_path())
}

pub fn save(theme: Theme) -> Result<()> {
    save_to(&preferences_path(), theme)
}
