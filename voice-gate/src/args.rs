use std::{borrow::Cow, fmt, io::IsTerminal, net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use config::Config;
use logforth::filter::EnvFilter;

/// Workspace crates that log at the selected level. Everything else logs warnings only.
const LOGGING_CRATES: &[&str] = &["voice_gate", "server", "tts", "rate_limit", "config"];

#[derive(Debug, Parser)]
#[command(name = "Voice Gate", version, long_about = concat!("Voice Gate v", env!("CARGO_PKG_VERSION")))]
pub struct Args {
    /// IP address on which the server will listen for incoming connections.
    /// Default: 127.0.0.1:8000
    #[arg(short, long, env = "VOICE_GATE_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Path to the TOML configuration file. Defaults are used when the file does not exist.
    #[arg(long, short, env = "VOICE_GATE_CONFIG_PATH", default_value = "./voice-gate.toml")]
    pub config: PathBuf,
    /// Set the logging level.
    #[arg(long = "log", env = "VOICE_GATE_LOG", default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
    /// Set the style of log output
    #[arg(long, env = "VOICE_GATE_LOG_STYLE", default_value_t = LogStyle::default())]
    pub log_style: LogStyle,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        if !self.config.exists() {
            log::info!(
                "No configuration file at {}, starting with defaults",
                self.config.display()
            );

            return Ok(Config::default());
        }

        log::debug!("Loading configuration from {}", self.config.display());

        Config::load(&self.config)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text, used as the default with TTY output
    Color,
    /// Standard text, used as the default with non-TTY output
    Text,
    /// JSON objects
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stdout().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        };

        f.write_str(style)
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Disable logging
    Off,
    /// Only log errors
    Error,
    /// Log errors, and warnings
    Warn,
    /// Log errors, warnings, and info messages
    #[default]
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log errors, warnings, info, debug, and trace messages
    Trace,
}

impl LogLevel {
    pub fn env_filter(self) -> anyhow::Result<EnvFilter> {
        let directives = match self {
            LogLevel::Off => Cow::Borrowed("off"),
            level => {
                let crates = LOGGING_CRATES
                    .iter()
                    .map(|name| format!("{name}={level}"))
                    .collect::<Vec<_>>()
                    .join(",");

                Cow::Owned(format!("warn,{crates}"))
            }
        };

        EnvFilter::from_str(&directives).map_err(|e| anyhow::anyhow!("Invalid log filter '{directives}': {e:?}"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        f.write_str(level)
    }
}
