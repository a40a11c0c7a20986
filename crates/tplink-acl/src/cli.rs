use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

pub fn parse_duration(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

/// TP-Link router access control client
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Router hostname or IP address.
    /// Can also be set via TPLINK_HOST environment variable.
    #[arg(long, global = true, env = "TPLINK_HOST", default_value = "192.168.0.1")]
    pub host: String,

    /// Timeout in seconds for each request to the router
    #[arg(long, global = true, value_parser = parse_duration, default_value = "5")]
    pub timeout: Duration,

    /// Read the admin password from stdin.
    /// Useful for scripting: echo "password" | tplink-acl --password-stdin blocked
    /// The TPLINK_PASSWORD environment variable takes precedence.
    #[arg(long, global = true)]
    pub password_stdin: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Log in and report whether the router accepts the session
    Status,

    /// List MAC addresses on the blocked list
    Blocked,

    /// List devices connected to the router
    Connected,

    /// Block a device by MAC address
    Block {
        /// MAC address, e.g. AA-BB-CC-DD-EE-FF or aa:bb:cc:dd:ee:ff
        mac: String,
    },

    /// Remove a device from the blocked list
    Unblock {
        /// MAC address, e.g. AA-BB-CC-DD-EE-FF or aa:bb:cc:dd:ee:ff
        mac: String,
    },

    /// Show the LED state, or switch the LEDs on or off
    Led {
        /// New LED state; omit to read the current one
        #[arg(value_enum)]
        state: Option<LedState>,
    },

    /// End the admin session on the router
    Logout,

    /// Show version information for CLI and core library
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LedState {
    On,
    Off,
}

impl LedState {
    pub fn is_on(self) -> bool {
        self == LedState::On
    }
}
