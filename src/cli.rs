use std::path::PathBuf;

use crate::config::Options;
use crate::logging::LogLevel;
use crate::sound::decoder::{FmtExtension, SampleScaling};
use anyhow::Result;
use clap::Parser;

/// wavplay - decode and play RIFF/WAVE files
#[derive(Parser, Debug, Default)]
#[command(name = "wavplay")]
#[command(version)]
#[command(about = "Decode and play RIFF/WAVE files", long_about = None)]
pub struct Cli {
    /// Files to play, in order
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output device name
    #[arg(short, long, value_name = "NAME")]
    pub device: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Print the format of each file instead of playing it
    #[arg(short, long)]
    pub info: bool,

    /// Scale PCM symmetrically (v/32768, (v-128)/128)
    #[arg(long)]
    pub symmetric: bool,

    /// Always skip two bytes after the fmt chunk fields
    #[arg(long)]
    pub legacy_fmt_skip: bool,

    /// More logging (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log level (nothing, user, error, warning, info, debug, all or 0-6)
    #[arg(long, value_name = "LEVEL")]
    pub loglevel: Option<String>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref level) = self.loglevel {
            opts.log_level = Self::parse_log_level(level)?;
        }
        opts.log_level = opts.log_level.raised(self.verbose);

        if let Some(ref device) = self.device {
            opts.device = Some(device.clone());
        }

        if self.symmetric {
            opts.sample_scaling = SampleScaling::Symmetric;
        }

        if self.legacy_fmt_skip {
            opts.fmt_extension = FmtExtension::Legacy;
        }

        Ok(opts)
    }

    fn parse_log_level(s: &str) -> Result<LogLevel> {
        match LogLevel::parse(s) {
            Some(level) => Ok(level),
            None => anyhow::bail!(
                "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
                s
            ),
        }
    }
}
