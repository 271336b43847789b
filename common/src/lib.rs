//! This library is there to share some common code amongst all ambutrack modules.
//!

mod config;
mod location;
mod logging;
mod session;

use clap::{crate_name, crate_version};
pub use config::*;
pub use location::*;
pub use logging::*;
pub use session::*;

const NAME: &str = crate_name!();
const VERSION: &str = crate_version!();

pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}
