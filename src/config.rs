use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logging::LogLevel;
use crate::sound::decoder::{DecodeOptions, FmtExtension, SampleScaling};

/// Player options that can be set via CLI or config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub log_level: LogLevel,
    /// Output device name; `None` selects the host default
    pub device: Option<String>,
    pub sample_scaling: SampleScaling,
    pub fmt_extension: FmtExtension,
}

impl Options {
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            sample_scaling: self.sample_scaling,
            fmt_extension: self.fmt_extension,
        }
    }
}

/// Parse options from TOML text
pub fn parse_config(text: &str) -> Result<Options> {
    toml::from_str(text).context("Invalid config file")
}

/// Load configuration from a TOML file.
///
/// No path yields the defaults; a named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("While loading {}", path.display()))
}
