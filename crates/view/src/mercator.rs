use std::f64::consts::PI;

use protocol::{LatLon, Projection, TileCoord};

/// Latitude at which the square Web-Mercator world ends.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Spherical Web-Mercator, the projection used by slippy-map tile servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebMercator;

impl Projection for WebMercator {
    fn project(&self, position: LatLon, zoom: f64) -> TileCoord {
        let tiles = 2f64.powf(zoom);
        let lat = position.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let column = (position.lon + 180.0) / 360.0 * tiles;
        let row = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * tiles;
        TileCoord::new(column, row, zoom)
    }

    fn unproject(&self, coord: TileCoord) -> LatLon {
        let tiles = 2f64.powf(coord.zoom);
        let lon = coord.column / tiles * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * coord.row / tiles))
            .sinh()
            .atan()
            .to_degrees();
        LatLon::new(lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_world_center() {
        let coord = WebMercator.project(LatLon::new(0.0, 0.0), 3.0);
        assert!((coord.column - 4.0).abs() < 1e-9);
        assert!((coord.row - 4.0).abs() < 1e-9);
    }

    #[test]
    fn unproject_inverts_project() {
        let position = LatLon::new(55.7558, 37.6173);
        let coord = WebMercator.project(position, 12.3);
        let back = WebMercator.unproject(coord);
        assert!((back.lat - position.lat).abs() < 1e-9);
        assert!((back.lon - position.lon).abs() < 1e-9);
    }

    #[test]
    fn latitude_limit_maps_to_top_edge() {
        let coord = WebMercator.project(LatLon::new(90.0, -180.0), 0.0);
        assert!(coord.row.abs() < 1e-9);
        assert!(coord.column.abs() < 1e-12);
    }
}
