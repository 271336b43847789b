//! Library part of the `trackctl` utility.
//!
//! The tracking itself is in `ambutrack-tracker`, this only has the CLI definitions, the
//! configuration file, a terminal renderer and the code of each sub-command.
//!

pub use cli::*;
pub use cmds::*;
pub use config::*;
pub use render::*;

mod cli;
mod cmds;
mod config;
mod render;
