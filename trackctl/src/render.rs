//! Terminal "map": one line per frame on stdout.
//!

use std::io::{self, Write};

use chrono::Local;

use ambutrack_common::Coordinate;
use ambutrack_tracker::map::{MapView, Renderer};

/// Print frames as text lines.  Only frames which differ from the previous one are printed.
///
#[derive(Debug)]
pub struct TermRenderer<W: Write + Send> {
    out: W,
    last: Option<MapView>,
}

impl TermRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        TermRenderer::new(io::stdout())
    }
}

impl<W: Write + Send> TermRenderer<W> {
    pub fn new(out: W) -> Self {
        TermRenderer { out, last: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let now = Local::now().format("%H:%M:%S");
        // Nothing sensible to do if the terminal is gone
        let _ = writeln!(self.out, "{now} {text}");
    }
}

impl<W: Write + Send> Renderer for TermRenderer<W> {
    fn prepare(&mut self) {
        self.line("Loading map...");
    }

    fn render(&mut self, view: &MapView) {
        if self.last.as_ref() == Some(view) {
            return;
        }
        self.line(&view.to_string());
        self.last = Some(view.clone());
    }

    fn fly_to(&mut self, path: &[Coordinate]) {
        if let Some(to) = path.last() {
            self.line(&format!("flying to {} ({} steps)", to, path.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambutrack_tracker::map::{Marker, ScreenState, DEFAULT_ZOOM, TILE_URL};

    #[test]
    fn test_term_renderer() {
        let pos = Coordinate::new(9.05, 7.49).unwrap();
        let view = MapView {
            state: ScreenState::Live,
            center: Some(pos),
            zoom: DEFAULT_ZOOM,
            tiles: TILE_URL.to_owned(),
            markers: vec![Marker::ambulance(pos)],
            banner: None,
        };

        let mut r = TermRenderer::new(Vec::new());
        r.fly_to(&[pos]);
        r.render(&view);
        r.render(&view);

        let out = String::from_utf8(r.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(2, lines.len());
        assert!(lines[0].ends_with("flying to 9.050000, 7.490000 (1 steps)"));
        assert!(lines[1].ends_with("[Live] center=9.050000, 7.490000 zoom=13 Ambulance=(9.050000, 7.490000)"));
    }
}
