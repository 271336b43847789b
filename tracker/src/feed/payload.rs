//! Wire format for position payloads.
//!
//! The canonical schema is `{ "latitude": number, "longitude": number }`.  The backend has been
//! seen sending `{ "lat": .., "lng": .. }` as well, sometimes with numbers as strings, so both are
//! accepted here and normalized into a `Coordinate`.  Nothing past this module ever sees the
//! aliases.
//!

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use ambutrack_common::Coordinate;

use crate::FeedError;

#[serde_as]
#[derive(Debug, Deserialize)]
struct WirePosition {
    #[serde(alias = "lat")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    longitude: f64,
}

/// Parse one payload into a validated `Coordinate`.
///
pub fn parse_coordinate(raw: &str) -> Result<Coordinate, FeedError> {
    let pos: WirePosition =
        serde_json::from_str(raw.trim()).map_err(|e| FeedError::Parse(e.to_string()))?;
    Coordinate::new(pos.latitude, pos.longitude).map_err(|e| FeedError::Parse(e.to_string()))
}

/// Canonical encoding, the same as `Coordinate`'s own `Serialize`.
///
pub fn encode_coordinate(coord: &Coordinate) -> Result<String, FeedError> {
    serde_json::to_string(coord).map_err(|e| FeedError::Protocol(e.to_string()))
}
