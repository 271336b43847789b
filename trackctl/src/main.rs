//! `trackctl`: follow an ambulance, publish a driver position or get notifications.
//!

use std::io;

use clap::{crate_authors, crate_description, crate_version, CommandFactory, Parser};
use clap_complete::generate;
use eyre::Result;
use tracing::{info, trace};

use ambutrack_common::init_logging;
use trackctl::{
    list_config, list_sources, list_transports, locate, print_notifications, publish_position,
    watch_entity, Config, ListSubCommand, Opts, SubCommand,
};

/// Binary name, using a different binary name
pub const NAME: &str = env!("CARGO_BIN_NAME");
/// Binary version
pub const VERSION: &str = crate_version!();
/// Authors
pub const AUTHORS: &str = crate_authors!();

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    let cfn = opts.config.clone();

    // Initialise logging early
    //
    init_logging(NAME, opts.debug, opts.log_dir.clone())?;
    trace!("Logging initialised.");

    let cfg = Config::load(cfn)?;

    // Banner
    //
    banner()?;

    handle_subcmd(&cfg, &opts.subcmd).await
}

pub async fn handle_subcmd(cfg: &Config, subcmd: &SubCommand) -> Result<()> {
    match subcmd {
        // Handle `watch entity`
        //
        SubCommand::Watch(wopts) => {
            trace!("watch");

            let stats = watch_entity(cfg, wopts).await?;
            eprintln!("{}", stats);
        }

        // Handle `locate`
        //
        SubCommand::Locate => {
            trace!("locate");

            let (pos, fallback) = locate(cfg).await?;
            if fallback {
                println!("{} (fallback)", pos);
            } else {
                println!("{}", pos);
            }
        }

        // Handle `publish entity`
        //
        SubCommand::Publish(popts) => {
            trace!("publish");

            let stats = publish_position(cfg, popts).await?;
            eprintln!("{}", stats);
        }

        // Handle `notify`
        //
        SubCommand::Notify => {
            trace!("notify");

            let n = print_notifications(cfg).await?;
            info!("{} notifications", n);
        }

        // Standalone completion generation
        //
        // NOTE: you can generate UNIX shells completion on Windows and vice-versa.  Not worth
        //       trying to limit depending on the OS.
        //
        SubCommand::Completion(copts) => {
            let generator = copts.shell;
            generate(generator, &mut Opts::command(), NAME, &mut io::stdout());
        }

        // Standalone `list` command
        //
        SubCommand::List(lopts) => {
            let str = match lopts.cmd {
                ListSubCommand::Sources => list_sources()?,
                ListSubCommand::Transports => list_transports()?,
                ListSubCommand::Config => list_config(&cfg.tracker)?,
            };
            eprintln!("{}", str);
        }

        // Standalone `version` command
        //
        SubCommand::Version => {
            eprintln!("Modules: ");
            eprintln!("\t{}", version());
            eprintln!("\t{}", ambutrack_common::version());
            eprintln!("\t{}", ambutrack_tracker::version());
        }
    }
    Ok(())
}

/// Return our version number
///
#[inline]
pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}

/// Display banner
///
fn banner() -> Result<()> {
    Ok(eprintln!(
        r##"
{}/{} by {}
{}
"##,
        NAME,
        VERSION,
        AUTHORS,
        crate_description!()
    ))
}
