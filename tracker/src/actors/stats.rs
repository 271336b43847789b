//! Actor definition for `Stats`
//!

use std::fmt::{Display, Formatter};
use std::time::Instant;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{info, trace};

use crate::Stats;

pub struct StatsActor;

/// Messages handled by the `StatsActor`.
///
/// Feeds send the update ones for every payload, the screen sends `Dup` when the reconciler
/// decides nothing moved.
///
#[derive(Debug)]
pub enum StatsMsg {
    /// stat updates
    Pkts(u32),
    Bytes(u64),
    Dropped,
    Dup,
    Error,
    /// commands
    Reset,
    Print,
    Snapshot(RpcReplyPort<Stats>),
    Exit(RpcReplyPort<Stats>),
}

#[derive(Debug)]
pub struct State {
    pub start: Instant,
    pub stat: Stats,
}

impl State {
    fn update_time(&mut self) {
        self.stat.tm = self.start.elapsed().as_secs();
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stat)
    }
}

#[ractor::async_trait]
impl Actor for StatsActor {
    type Msg = StatsMsg;
    type State = State;
    type Arguments = ();

    #[tracing::instrument(skip(self, myself))]
    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        trace!("stats({}) starting.", myself.get_id());
        Ok(State {
            start: Instant::now(),
            stat: Stats::default(),
        })
    }

    #[tracing::instrument(skip(self, myself, state))]
    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            // updates
            StatsMsg::Pkts(n) => state.stat.pkts += n,
            StatsMsg::Bytes(n) => state.stat.bytes += n,
            StatsMsg::Dropped => state.stat.dropped += 1,
            StatsMsg::Dup => state.stat.dups += 1,
            StatsMsg::Error => state.stat.err += 1,
            // commands
            StatsMsg::Reset => {
                state.stat = Stats::default();
                state.start = Instant::now();
            }
            StatsMsg::Print => {
                state.update_time();
                info!("Stats: {}", state);
            }
            StatsMsg::Snapshot(port) => {
                state.update_time();
                let _ = port.send(state.stat.clone());
            }
            // The end
            StatsMsg::Exit(port) => {
                state.update_time();
                info!("Session: {}", state);
                let _ = port.send(state.stat.clone());
                myself.stop(None);
            }
        }
        Ok(())
    }
}
