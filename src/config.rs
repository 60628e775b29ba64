use anyhow::Result;
use clap::Parser;

/// Logging verbosity, mirroring `log::Level` but derivable as a `clap`
/// value enum so it can be parsed straight off the command line.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

/// Command-line surface for the Chord node binary (spec.md §6 "CLI
/// surface"). Unlike the TURN server this is distilled from, there is no
/// configuration file to load — three flags and nothing persisted.
#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Config {
    /// Port this node listens on for Chord protocol traffic.
    #[arg(short = 'c', long = "chord-port", value_parser = clap::value_parser!(u16).range(1024..=65535))]
    pub chord_port: u16,

    /// Port this node's application layer listens on; returned to lookup
    /// callers as the owner's contact port.
    #[arg(short = 'p', long = "app-port", value_parser = clap::value_parser!(u16).range(1024..=65535))]
    pub app_port: u16,

    /// IP address of an existing ring member to join. Omit to start a new
    /// ring with this node as its only member.
    #[arg(short = 'j', long = "join")]
    pub join: Option<String>,

    /// Overrides this node's self-advertised IP. When absent it is derived
    /// from the host's outbound route at `init()` time.
    #[arg(long)]
    pub ip: Option<String>,

    /// Logging verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl Config {
    /// Parses argv. Port-range validation (spec.md §6: "Ports must be in
    /// [1024, 65535]") is enforced by `clap`'s value parser above, and
    /// missing required flags are `clap`'s own usage-error path.
    pub fn load() -> Result<Self> {
        Ok(Self::parse())
    }
}
