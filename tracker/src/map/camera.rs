//! Smooth camera moves.
//!
//! Renderers do not snap to a new center, they follow the path given by `Camera::path()`: a
//! fixed number of points eased in and out between the old and the new center.
//!

use ambutrack_common::Coordinate;

/// Default number of points in a fly-to path
pub const DEF_STEPS: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Points per move, including the destination
    pub steps: usize,
}

impl Default for Camera {
    fn default() -> Self {
        Camera { steps: DEF_STEPS }
    }
}

/// Cubic ease-in-out on [0, 1].
///
#[inline]
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0., 1.);
    if t < 0.5 {
        4. * t * t * t
    } else {
        1. - (-2. * t + 2.).powi(3) / 2.
    }
}

impl Camera {
    pub fn new(steps: usize) -> Self {
        Camera {
            steps: steps.max(1),
        }
    }

    /// Path from `from` to `to`, `to` always being the last point.  Without a previous center
    /// there is nowhere to fly from and the path is just the destination.
    ///
    pub fn path(&self, from: Option<Coordinate>, to: Coordinate) -> Vec<Coordinate> {
        match from {
            Some(from) if from != to => {
                let mut path: Vec<Coordinate> = (1..self.steps)
                    .map(|i| from.lerp(&to, ease_in_out(i as f64 / self.steps as f64)))
                    .collect();
                path.push(to);
                path
            }
            _ => vec![to],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0., 0.)]
    #[case(0.5, 0.5)]
    #[case(1., 1.)]
    #[case(-1., 0.)]
    #[case(3., 1.)]
    fn test_ease(#[case] t: f64, #[case] v: f64) {
        assert!((ease_in_out(t) - v).abs() < 1e-12);
    }

    #[test]
    fn test_path() {
        let a = Coordinate::new(9.05, 7.49).unwrap();
        let b = Coordinate::new(9.06, 7.50).unwrap();

        let path = Camera::default().path(Some(a), b);
        assert_eq!(DEF_STEPS, path.len());
        assert_eq!(Some(&b), path.last());

        // Monotonic, no overshoot
        let lats: Vec<f64> = path.iter().map(|c| c.latitude()).collect();
        assert!(lats.windows(2).all(|w| w[0] <= w[1]));
        assert!(lats.iter().all(|&l| (9.05..=9.06).contains(&l)));
    }

    #[test]
    fn test_path_nowhere() {
        let b = Coordinate::new(9.06, 7.50).unwrap();
        assert_eq!(vec![b], Camera::default().path(None, b));
        assert_eq!(vec![b], Camera::new(0).path(Some(b), b));
    }
}
