//! `richdoc.toml`: backend address, mention behaviour, rendering and editor
//! limits. Every field has a default, so a missing file or an empty one is
//! a valid configuration.

use std::path::{Path, PathBuf};

use composer::{ApiClient, ComposerConfig, MatchMode, MentionConfig, RemoteLookup};
use richdoc::RenderOptions;
use serde::Deserialize;

pub const DEFAULT_PATH: &str = "richdoc.toml";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api: ApiSettings,
    pub mentions: MentionSettings,
    pub render: RenderSettings,
    pub editor: EditorSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    pub base_url: String,
    /// Clubs fetched for mention suggestions.
    pub page_size: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: "http://localhost:8080".to_string(),
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MentionSettings {
    pub trigger: char,
    pub limit: usize,
    pub match_mode: MatchMode,
    pub allow_spaces: bool,
}

impl Default for MentionSettings {
    fn default() -> Self {
        let defaults = MentionConfig::default();
        MentionSettings {
            trigger: defaults.trigger,
            limit: defaults.limit,
            match_mode: defaults.match_mode,
            allow_spaces: defaults.allow_spaces,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    pub mention_base: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            mention_base: RenderOptions::default().mention_base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorSettings {
    pub history_depth: usize,
}

impl Default for EditorSettings {
    fn default() -> Self {
        EditorSettings {
            history_depth: ComposerConfig::default().history_depth,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl Settings {
    /// Load settings from `path`. With no explicit path, `richdoc.toml` in
    /// the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Settings, SettingsError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_PATH);
                if !default.exists() {
                    tracing::debug!("no {} found, using defaults", DEFAULT_PATH);
                    return Ok(Settings::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        let settings = Settings::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Settings, SettingsError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.mentions.trigger.is_whitespace() {
            return Err(SettingsError::Invalid(
                "mentions.trigger must not be whitespace".into(),
            ));
        }
        if self.api.page_size == 0 {
            return Err(SettingsError::Invalid("api.page_size must be positive".into()));
        }
        if self.editor.history_depth == 0 {
            return Err(SettingsError::Invalid(
                "editor.history_depth must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn composer_config(&self) -> ComposerConfig {
        ComposerConfig {
            mentions: MentionConfig {
                trigger: self.mentions.trigger,
                allow_spaces: self.mentions.allow_spaces,
                match_mode: self.mentions.match_mode,
                limit: self.mentions.limit,
            },
            history_depth: self.editor.history_depth,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            mention_base: self.render.mention_base.clone(),
        }
    }

    pub fn api_client(&self) -> ApiClient {
        ApiClient::new(self.api.base_url.clone())
    }

    pub fn remote_lookup(&self) -> RemoteLookup {
        RemoteLookup::new(self.api_client(), self.api.page_size)
            .with_matching(self.mentions.match_mode, self.mentions.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.mentions.trigger, '@');
        assert_eq!(settings.render.mention_base, "/entities");
        assert_eq!(settings.composer_config(), ComposerConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let settings = Settings::from_toml(
            r##"
            [api]
            base_url = "https://clubs.uni.edu"

            [mentions]
            trigger = "#"
            match_mode = "substring"
            limit = 10
            "##,
        )
        .unwrap();
        assert_eq!(settings.api.base_url, "https://clubs.uni.edu");
        assert_eq!(settings.api.page_size, 50);
        let config = settings.composer_config();
        assert_eq!(config.mentions.trigger, '#');
        assert_eq!(config.mentions.match_mode, MatchMode::Substring);
        assert_eq!(config.mentions.limit, 10);
        assert!(config.mentions.allow_spaces);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(matches!(
            Settings::from_toml("[api]\nbase = \"x\""),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            Settings::from_toml("[mentions]\ntrigger = \" \""),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml("[editor]\nhistory_depth = 0"),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn loads_from_a_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("richdoc.toml");
        std::fs::write(&path, "[render]\nmention_base = \"/clubs\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.render_options().mention_base, "/clubs");

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            Settings::load(Some(&missing)),
            Err(SettingsError::Io { .. })
        ));
    }
}
