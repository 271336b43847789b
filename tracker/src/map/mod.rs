//! Map rendering.
//!
//! The map screen never draws anything itself: it builds a `MapView` describing what should be
//! on screen and hands it to a `Renderer`, along with camera paths when the tracked ambulance
//! moved.  Renderers only ever see plain values, errors are already turned into a banner.
//!

use std::fmt::{Display, Formatter};

use ambutrack_common::Coordinate;

mod camera;
mod screen;

pub use camera::*;
pub use screen::*;

/// Default zoom level
pub const DEFAULT_ZOOM: u8 = 13;
/// OpenStreetMap tiles
pub const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum MarkerKind {
    Ambulance,
    User,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: Coordinate,
    pub popup: String,
}

impl Marker {
    pub fn ambulance(position: Coordinate) -> Self {
        Marker {
            kind: MarkerKind::Ambulance,
            position,
            popup: String::from("Ambulance Location"),
        }
    }

    pub fn user(position: Coordinate) -> Self {
        Marker {
            kind: MarkerKind::User,
            position,
            popup: String::from("User Location"),
        }
    }
}

/// Everything a renderer needs for one frame.
///
#[derive(Clone, Debug, PartialEq)]
pub struct MapView {
    pub state: ScreenState,
    /// `None` while the screen is not ready, renderers show a loading placeholder then
    pub center: Option<Coordinate>,
    pub zoom: u8,
    pub tiles: String,
    pub markers: Vec<Marker>,
    /// Shown on top of the map when the live feed is interrupted
    pub banner: Option<String>,
}

impl MapView {
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.center.is_none()
    }

    pub fn marker(&self, kind: MarkerKind) -> Option<&Marker> {
        self.markers.iter().find(|m| m.kind == kind)
    }
}

impl Display for MapView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(center) = self.center else {
            return write!(f, "[{}] Loading map...", self.state);
        };
        write!(f, "[{}] center={} zoom={}", self.state, center, self.zoom)?;
        for m in &self.markers {
            write!(f, " {}=({})", m.kind, m.position)?;
        }
        if let Some(banner) = &self.banner {
            write!(f, " !! {banner}")?;
        }
        Ok(())
    }
}

/// Where frames go.
///
pub trait Renderer: Send {
    /// Called once before anything else, load icons, tiles, etc.
    fn prepare(&mut self) {}
    /// Draw one frame.
    fn render(&mut self, view: &MapView);
    /// Move the viewport along `path`, the last point is the new center.
    fn fly_to(&mut self, path: &[Coordinate]);
}

/// Renderer keeping everything it was given, for tests and dry runs.
///
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<MapView>,
    pub flights: Vec<Vec<Coordinate>>,
}

impl RecordingRenderer {
    pub fn last(&self) -> Option<&MapView> {
        self.frames.last()
    }

    /// Destinations of all camera moves
    ///
    pub fn destinations(&self) -> Vec<Coordinate> {
        self.flights.iter().filter_map(|p| p.last().copied()).collect()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, view: &MapView) {
        self.frames.push(view.clone());
    }

    fn fly_to(&mut self, path: &[Coordinate]) {
        self.flights.push(path.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_display() {
        let view = MapView {
            state: ScreenState::Initializing,
            center: None,
            zoom: DEFAULT_ZOOM,
            tiles: TILE_URL.to_owned(),
            markers: vec![],
            banner: None,
        };
        assert!(view.is_placeholder());
        assert_eq!("[Initializing] Loading map...", view.to_string());

        let pos = Coordinate::new(9.05, 7.49).unwrap();
        let view = MapView {
            state: ScreenState::Stalled,
            center: Some(pos),
            markers: vec![Marker::ambulance(pos)],
            banner: Some("offline".into()),
            ..view
        };
        assert_eq!(
            "[Stalled] center=9.050000, 7.490000 zoom=13 Ambulance=(9.050000, 7.490000) !! offline",
            view.to_string()
        );
        assert_eq!("Ambulance Location", view.marker(MarkerKind::Ambulance).unwrap().popup);
        assert!(view.marker(MarkerKind::User).is_none());
    }
}
