//! Module describing all possible commands and sub-commands to the `trackctl` main driver
//!
//! We have the following commands:
//!
//! - `watch` follows an ambulance on a terminal "map"
//! - `locate` asks the position source once
//! - `publish` sends the driver position continuously
//! - `notify` prints the notifications sent to the user
//! - `list` shows what can be configured
//!
//! `completion` is here just to configure the various shells completion system.
//!

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, Parser, ValueEnum};
use clap_complete::shells::Shell;

use ambutrack_tracker::Transport;

/// CLI options
#[derive(Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// configuration file.
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// debug mode (hierarchical traces).
    #[clap(short = 'D', long = "debug")]
    pub debug: bool,
    /// Also write traces in this directory.
    #[clap(short = 'L', long)]
    pub log_dir: Option<String>,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

// ------

/// All sub-commands:
///
/// `completion SHELL`
/// `watch [-T poll|push] [-R file] ambulance`
/// `locate`
/// `publish ambulance`
/// `notify`
/// `list (sources|transports|config)`
/// `version`
///
#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Generate Completion stuff
    Completion(ComplOpts),
    /// List configurable items
    List(ListOpts),
    /// Get our own position once
    Locate,
    /// Print notifications for the session user
    Notify,
    /// Publish the driver position for an ambulance
    Publish(PublishOpts),
    /// List all package versions
    Version,
    /// Follow an ambulance
    Watch(WatchOpts),
}

// ------

/// Options for following an ambulance.
///
#[derive(Debug, Parser)]
pub struct WatchOpts {
    /// Override the configured transport.
    #[clap(short = 'T', long, value_parser = parse_transport)]
    pub transport: Option<Transport>,
    /// Replay a recorded session (one payload per line) instead of the network.
    #[clap(short = 'R', long)]
    pub replay: Option<PathBuf>,
    /// Delay between replayed payloads.
    #[clap(long, default_value = "1s")]
    pub delay: humantime::Duration,
    /// Ambulance id
    pub entity: String,
}

fn parse_transport(s: &str) -> Result<Transport, String> {
    s.parse::<Transport>()
        .map_err(|_| format!("unknown transport {s}, use poll or push"))
}

#[derive(Debug, Parser)]
pub struct PublishOpts {
    /// Ambulance id
    pub entity: String,
}

// ------

/// Options to generate completion files at runtime
///
#[derive(Debug, Parser)]
pub struct ComplOpts {
    #[clap(value_parser)]
    pub shell: Shell,
}

// ------

#[derive(Debug, Parser)]
pub struct ListOpts {
    #[clap(value_parser)]
    pub cmd: ListSubCommand,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListSubCommand {
    /// Position sources
    Sources,
    /// Feed transports
    Transports,
    /// Effective configuration
    Config,
}
