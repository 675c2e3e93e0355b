//! Water styling: a gradient fill clipped to visible water, plus an edge layer
//! carrying the outline and the Voronoi ripple mosaic.

pub mod edge;
pub mod fill;

pub use edge::{build_water_edge, water_edge_enabled};
pub use fill::build_water_fill;

use crate::color::Color;

/// Piecewise linear color ramp over sorted `(position, color)` stops
pub(crate) fn gradient(stops: &[(f32, Color)], t: f32) -> Color {
    let Some(&(first_pos, first)) = stops.first() else {
        return Color::rgba(0.0, 0.0, 0.0, 0.0);
    };
    if t <= first_pos {
        return first;
    }
    for pair in stops.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if t <= p1 {
            let span = (p1 - p0).max(1e-6);
            return c0.mix(c1, (t - p0) / span);
        }
    }
    stops[stops.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_interpolates_between_stops() {
        let stops = [(0.0, Color::BLACK), (1.0, Color::WHITE)];
        let mid = gradient(&stops, 0.5);
        assert!((mid.r - 0.5).abs() < 1e-6);
        assert_eq!(gradient(&stops, -1.0), Color::BLACK);
        assert_eq!(gradient(&stops, 2.0), Color::WHITE);
    }
}
