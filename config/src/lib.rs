use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::Deserialize;
use symbols::DemangleOptions;

pub static CONFIG: Lazy<Config> = Lazy::new(Config::parse);

/// Preset the printer options start out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Default,
    Simplified,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::style")]
    pub style: Style,

    /// `[T]` instead of `Swift.Array<T>`.
    #[serde(default)]
    pub sugar: Option<bool>,
    #[serde(default)]
    pub module_names: Option<bool>,
    #[serde(default)]
    pub entity_types: Option<bool>,
    #[serde(default)]
    pub where_clauses: Option<bool>,
    #[serde(default)]
    pub qualify_entities: Option<bool>,
    #[serde(default)]
    pub extension_contexts: Option<bool>,
    #[serde(default)]
    pub generic_specializations: Option<bool>,
    #[serde(default)]
    pub protocol_conformances: Option<bool>,
    #[serde(default)]
    pub private_discriminators: Option<bool>,
    #[serde(default)]
    pub function_argument_types: Option<bool>,
    #[serde(default)]
    pub unmangled_suffix: Option<bool>,
}

/// Default values when one is missing in the config.yaml.
mod defaults {
    use super::Style;

    pub fn style() -> Style {
        Style::Default
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: defaults::style(),
            sugar: None,
            module_names: None,
            entity_types: None,
            where_clauses: None,
            qualify_entities: None,
            extension_contexts: None,
            generic_specializations: None,
            protocol_conformances: None,
            private_discriminators: None,
            function_argument_types: None,
            unmangled_suffix: None,
        }
    }
}

impl Config {
    /// Location of the config, `<data dir>/swiftsym/config.yaml`.
    pub fn path() -> Option<PathBuf> {
        let mut dir = dirs::data_dir()?;
        dir.push("swiftsym");
        dir.push("config.yaml");
        Some(dir)
    }

    pub fn parse() -> Self {
        match Self::path() {
            Some(path) => Self::from_file(&path),
            None => {
                log::trace!("[config] no data directory set, using defaults");
                Self::default()
            }
        }
    }

    /// Read the config at `path`, a missing file being an empty config.
    pub fn from_file(path: &Path) -> Self {
        let raw = std::fs::read_to_string(path).unwrap_or_default();
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }

        match serde_yaml::from_str(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("Failed to parse config.\nError: {err}.");

                // parse everything as default
                Self::default()
            }
        }
    }

    /// Printer options with the overrides applied on top of the preset.
    pub fn options(&self) -> DemangleOptions {
        let mut options = match self.style {
            Style::Default => DemangleOptions::default(),
            Style::Simplified => DemangleOptions::simplified(),
        };

        let overrides = [
            (self.sugar, DemangleOptions::SYNTHESIZE_SUGAR_ON_TYPES),
            (self.module_names, DemangleOptions::DISPLAY_MODULE_NAMES),
            (self.entity_types, DemangleOptions::DISPLAY_ENTITY_TYPES),
            (self.where_clauses, DemangleOptions::DISPLAY_WHERE_CLAUSES),
            (self.qualify_entities, DemangleOptions::QUALIFY_ENTITIES),
            (self.extension_contexts, DemangleOptions::DISPLAY_EXTENSION_CONTEXTS),
            (self.generic_specializations, DemangleOptions::DISPLAY_GENERIC_SPECIALIZATIONS),
            (self.protocol_conformances, DemangleOptions::DISPLAY_PROTOCOL_CONFORMANCES),
            (self.private_discriminators, DemangleOptions::SHOW_PRIVATE_DISCRIMINATORS),
            (self.function_argument_types, DemangleOptions::SHOW_FUNCTION_ARGUMENT_TYPES),
            (self.unmangled_suffix, DemangleOptions::DISPLAY_UNMANGLED_SUFFIX),
        ];

        for (value, flag) in overrides {
            if let Some(value) = value {
                options.set(flag, value);
            }
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let config = Config::from_yaml("");
        assert_eq!(config, Config::default());
        assert_eq!(config.options(), DemangleOptions::default());
    }

    #[test]
    fn overrides() {
        let config = Config::from_yaml("style: simplified\nmodule_names: true\nsugar: false\n");
        assert_eq!(config.style, Style::Simplified);

        let options = config.options();
        assert!(options.contains(DemangleOptions::DISPLAY_MODULE_NAMES));
        assert!(!options.contains(DemangleOptions::SYNTHESIZE_SUGAR_ON_TYPES));
        assert!(options.contains(DemangleOptions::SHORTEN_THUNK));
    }

    #[test]
    fn malformed() {
        let config = Config::from_yaml("style: [not, a, style]");
        assert_eq!(config, Config::default());
    }
}
