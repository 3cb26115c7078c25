//! Command-line interface argument parsing
//!
//! Defines all CLI commands and their arguments using Clap.

use clap::{Parser, Subcommand};

/// OISP CLI - manage accounts and devices on an Open IoT Service Platform
#[derive(Parser, Debug)]
#[command(name = "oisp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage accounts, devices and component types on an OISP instance")]
#[command(long_about = concat!(
    "OISP CLI (v", env!("CARGO_PKG_VERSION"), ")\n",
    "Command-line client for the Open IoT Service Platform REST API.\n\n",
    "Authenticate with 'login'; the user token is saved to ~/.config/oisp/config.toml\n",
    "and reused by every other command until 'logout'."
))]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// API root, overrides the config file (e.g. https://streammyiot.com/v1/api)
    #[arg(long, global = true, env = "OISP_API_URL")]
    pub api_url: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show service health and version
    ///
    /// Example:
    ///   oisp health
    #[command(visible_alias = "info")]
    #[command(display_order = 1)]
    Health,

    /// Authenticate and save the user token
    ///
    /// Prompts for whatever is not given on the command line.
    ///
    /// Example:
    ///   oisp login --username me@example.com
    #[command(visible_alias = "auth")]
    #[command(display_order = 2)]
    Login {
        /// Username (email)
        #[arg(long, short)]
        username: Option<String>,

        /// Password; prompted for when omitted
        #[arg(long, env = "OISP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Logout and clear saved credentials
    ///
    /// Example:
    ///   oisp logout
    #[command(display_order = 3)]
    Logout,

    /// Show the logged in user
    ///
    /// Example:
    ///   oisp whoami
    #[command(display_order = 4)]
    Whoami,

    /// List the accounts the user belongs to
    ///
    /// Example:
    ///   oisp accounts
    #[command(display_order = 5)]
    Accounts,

    /// List devices of an account
    ///
    /// Examples:
    ///   oisp devices --account home
    ///   oisp devices --account home --status active --limit 20
    #[command(display_order = 6)]
    Devices {
        /// Account id or name
        #[arg(long, short, required = true)]
        account: String,

        /// Only devices with this status (created, active)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Register a new device
    ///
    /// Example:
    ///   oisp create-device --account home --device-id thermo-1 --name "Thermostat"
    #[command(display_order = 7)]
    CreateDevice {
        /// Account id or name
        #[arg(long, short, required = true)]
        account: String,

        /// Unique device id
        #[arg(long, required = true)]
        device_id: String,

        /// Device name
        #[arg(long, required = true)]
        name: String,

        /// Gateway id, defaults to the device id
        #[arg(long)]
        gateway_id: Option<String>,

        /// Tag, may be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a device
    ///
    /// Example:
    ///   oisp delete-device --account home --device-id thermo-1
    #[command(display_order = 8)]
    DeleteDevice {
        /// Account id or name
        #[arg(long, short, required = true)]
        account: String,

        /// Device id
        #[arg(long, required = true)]
        device_id: String,
    },

    /// Activate a device and print its device token
    ///
    /// Without --code the account's current activation code is used.
    ///
    /// Example:
    ///   oisp activate --account home --device-id thermo-1
    #[command(display_order = 9)]
    Activate {
        /// Account id or name
        #[arg(long, short, required = true)]
        account: String,

        /// Device id
        #[arg(long, required = true)]
        device_id: String,

        /// Activation code
        #[arg(long)]
        code: Option<String>,
    },

    /// List the component type catalog of an account
    ///
    /// Example:
    ///   oisp catalog --account home --full
    #[command(display_order = 10)]
    Catalog {
        /// Account id or name
        #[arg(long, short, required = true)]
        account: String,

        /// Include full component type definitions
        #[arg(long)]
        full: bool,
    },

    /// Check CLI version
    ///
    /// Example:
    ///   oisp version
    #[command(display_order = 11)]
    Version,
}

impl Cli {
    /// Parse command-line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }
}
