//! All about `Stats`.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Counters gathered while a feed or a publisher is running.
///
/// - `tm`: elapsed time in seconds
/// - `pkts`: number of coordinates delivered (or published)
/// - `bytes`: payload bytes received
/// - `dropped`: malformed payloads ignored
/// - `dups`: coordinates identical to the previous one
/// - `err`: transport/authorization errors
///
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub tm: u64,
    pub pkts: u32,
    pub bytes: u64,
    pub dropped: u32,
    pub dups: u32,
    pub err: u32,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time={}s pkts={} bytes={} dropped={} dups={} errors={}",
            self.tm, self.pkts, self.bytes, self.dropped, self.dups, self.err
        )
    }
}
