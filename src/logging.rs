use log::LevelFilter;
use serde::Deserialize;

/// Log verbosity levels, from silent to everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Nothing = 0,
    User = 1,
    Error = 2,
    #[default]
    Warning = 3,
    Info = 4,
    Debug = 5,
    All = 6,
}

impl LogLevel {
    /// Create a LogLevel from an integer
    pub fn from_i32(level: i32) -> Self {
        match level {
            i32::MIN..=0 => LogLevel::Nothing,
            1 => LogLevel::User,
            2 => LogLevel::Error,
            3 => LogLevel::Warning,
            4 => LogLevel::Info,
            5 => LogLevel::Debug,
            _ => LogLevel::All,
        }
    }

    /// Parse a level name or number
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(n) = s.parse::<i32>() {
            return Some(Self::from_i32(n));
        }
        match s.to_lowercase().as_str() {
            "nothing" | "off" | "none" => Some(LogLevel::Nothing),
            "user" => Some(LogLevel::User),
            "error" => Some(LogLevel::Error),
            "warning" | "warn" => Some(LogLevel::Warning),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "all" | "trace" => Some(LogLevel::All),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Raise the level by `steps`, saturating at `All`
    pub fn raised(self, steps: u8) -> Self {
        Self::from_i32(self.as_i32() + steps as i32)
    }

    /// `User` messages are errors the user must see, so both map to `Error`
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::Off,
            LogLevel::User | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::All => LevelFilter::Trace,
        }
    }
}

/// Install the global logger.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Calling this more
/// than once is harmless.
pub fn init(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.to_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.format_timestamp(None).try_init();
}
