mod fallback;
mod mercator;
mod visible;

use protocol::{LatLon, MAX_SUPPORTED_ZOOM, Projection, Quad, TileCoord, TileKey};
use thiserror::Error;

pub use fallback::{Fallback, resolve_fallback};
pub use mercator::{MAX_LATITUDE, WebMercator};
pub use visible::{TileRange, ring_order};

pub const DEFAULT_TILE_SIZE: f64 = 256.0;
/// Zoom delta applied per mouse-wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("zoom must be finite and within 0..={MAX_SUPPORTED_ZOOM}")]
    InvalidZoom,
    #[error("viewport size must be finite and positive")]
    InvalidViewport,
    #[error("tile size must be finite and positive")]
    InvalidTileSize,
    #[error("view math produced a non-finite value")]
    NonFiniteValue,
}

/// Camera over the tile pyramid.
///
/// `center` is expressed at the current continuous zoom, so one unit of
/// column/row spans `tile_size` screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    center: TileCoord,
    viewport_width: f64,
    viewport_height: f64,
    tile_size: f64,
}

impl MapView {
    pub fn new(
        center: TileCoord,
        viewport_width: f64,
        viewport_height: f64,
        tile_size: f64,
    ) -> Result<Self, ViewError> {
        validate_zoom(center.zoom)?;
        if !center.column.is_finite() || !center.row.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        validate_viewport(viewport_width, viewport_height)?;
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(ViewError::InvalidTileSize);
        }
        Ok(Self {
            center,
            viewport_width,
            viewport_height,
            tile_size,
        })
    }

    pub fn centered_on(
        projection: &impl Projection,
        position: LatLon,
        zoom: f64,
        viewport_width: f64,
        viewport_height: f64,
        tile_size: f64,
    ) -> Result<Self, ViewError> {
        validate_zoom(zoom)?;
        let center = projection.project(position, zoom);
        Self::new(center, viewport_width, viewport_height, tile_size)
    }

    pub fn center(&self) -> TileCoord {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.center.zoom
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    pub fn center_position(&self, projection: &impl Projection) -> LatLon {
        projection.unproject(self.center)
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) -> Result<(), ViewError> {
        validate_viewport(width, height)?;
        self.viewport_width = width;
        self.viewport_height = height;
        Ok(())
    }

    /// Moves the camera by a screen-space delta in pixels.
    pub fn pan_by(&mut self, delta_x: f64, delta_y: f64) -> Result<(), ViewError> {
        let column = checked_add(self.center.column, checked_div(delta_x, self.tile_size)?)?;
        let row = checked_add(self.center.row, checked_div(delta_y, self.tile_size)?)?;
        self.center.column = column;
        self.center.row = row;
        Ok(())
    }

    pub fn zoom_by(&mut self, delta: f64) -> Result<(), ViewError> {
        let next_zoom = checked_add(self.center.zoom, delta)?;
        validate_zoom(next_zoom)?;
        let next = self.center.zoom_to(next_zoom);
        if !next.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        self.center = next;
        Ok(())
    }

    /// Zooms while keeping the map point under `(screen_x, screen_y)` fixed.
    pub fn zoom_about_point(
        &mut self,
        delta: f64,
        screen_x: f64,
        screen_y: f64,
    ) -> Result<(), ViewError> {
        if !screen_x.is_finite() || !screen_y.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        let next_zoom = checked_add(self.center.zoom, delta)?;
        validate_zoom(next_zoom)?;

        let anchor_column = (screen_x - self.viewport_width * 0.5) / self.tile_size;
        let anchor_row = (screen_y - self.viewport_height * 0.5) / self.tile_size;
        let anchor = self
            .center
            .offset_by(anchor_column, anchor_row)
            .zoom_to(next_zoom);
        let next = anchor.offset_by(-anchor_column, -anchor_row);
        if !next.is_finite() {
            return Err(ViewError::NonFiniteValue);
        }
        self.center = next;
        Ok(())
    }

    /// Map position under a screen pixel, at the current zoom.
    pub fn screen_to_coord(&self, screen_x: f64, screen_y: f64) -> TileCoord {
        self.center.offset_by(
            (screen_x - self.viewport_width * 0.5) / self.tile_size,
            (screen_y - self.viewport_height * 0.5) / self.tile_size,
        )
    }

    /// Integer zoom whose tiles are requested for the current continuous zoom.
    pub fn base_zoom(&self, max_zoom: u8) -> u8 {
        let max_zoom = max_zoom.min(MAX_SUPPORTED_ZOOM);
        let rounded = (self.center.zoom + 0.5).floor();
        rounded.clamp(0.0, f64::from(max_zoom)) as u8
    }

    /// Tiles covering the viewport at the base zoom, one tile of margin on every side.
    /// `None` when the viewport lies entirely off the map.
    pub fn visible_range(&self, max_zoom: u8) -> Option<TileRange> {
        let zoom = self.base_zoom(max_zoom);
        let corners = [
            (0.0, 0.0),
            (self.viewport_width, 0.0),
            (0.0, self.viewport_height),
            (self.viewport_width, self.viewport_height),
        ]
        .map(|(x, y)| self.screen_to_coord(x, y).zoom_to(f64::from(zoom)));

        let min_column = corners
            .iter()
            .map(|c| c.column)
            .fold(f64::INFINITY, f64::min);
        let max_column = corners
            .iter()
            .map(|c| c.column)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_row = corners.iter().map(|c| c.row).fold(f64::INFINITY, f64::min);
        let max_row = corners
            .iter()
            .map(|c| c.row)
            .fold(f64::NEG_INFINITY, f64::max);

        TileRange::clamped(
            zoom,
            (min_column.floor() as i64).saturating_sub(1),
            (max_column.floor() as i64).saturating_add(1),
            (min_row.floor() as i64).saturating_sub(1),
            (max_row.floor() as i64).saturating_add(1),
        )
    }

    /// Screen quad of `key`, relative to the viewport center.
    pub fn tile_quad(&self, key: TileKey) -> Quad {
        let tile_zoom = f64::from(key.zoom);
        let size = self.tile_size * 2f64.powf(self.center.zoom - tile_zoom);
        let coord = self.center.zoom_to(tile_zoom);
        Quad {
            x: ((f64::from(key.x) - coord.column) * size) as f32,
            y: ((f64::from(key.y) - coord.row) * size) as f32,
            size: size as f32,
        }
    }
}

fn validate_zoom(zoom: f64) -> Result<(), ViewError> {
    if !zoom.is_finite() || !(0.0..=f64::from(MAX_SUPPORTED_ZOOM)).contains(&zoom) {
        return Err(ViewError::InvalidZoom);
    }
    Ok(())
}

fn validate_viewport(width: f64, height: f64) -> Result<(), ViewError> {
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return Err(ViewError::InvalidViewport);
    }
    Ok(())
}

fn checked_add(current: f64, delta: f64) -> Result<f64, ViewError> {
    if !delta.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    let next = current + delta;
    if !next.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    Ok(next)
}

fn checked_div(numerator: f64, denominator: f64) -> Result<f64, ViewError> {
    if !numerator.is_finite() || !denominator.is_finite() || denominator == 0.0 {
        return Err(ViewError::NonFiniteValue);
    }
    let next = numerator / denominator;
    if !next.is_finite() {
        return Err(ViewError::NonFiniteValue);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_at(column: f64, row: f64, zoom: f64) -> MapView {
        MapView::new(TileCoord::new(column, row, zoom), 512.0, 512.0, 256.0).expect("view")
    }

    #[test]
    fn base_zoom_rounds_and_clamps() {
        assert_eq!(view_at(1.0, 1.0, 4.49).base_zoom(18), 4);
        assert_eq!(view_at(1.0, 1.0, 4.5).base_zoom(18), 5);
        assert_eq!(view_at(1.0, 1.0, 20.0).base_zoom(18), 18);
        assert_eq!(view_at(0.5, 0.5, 0.2).base_zoom(18), 0);
    }

    #[test]
    fn visible_range_adds_margin_and_clamps_to_grid() {
        // 2x2 tiles of viewport centered on (8, 8) at zoom 4.
        let range = view_at(8.0, 8.0, 4.0).visible_range(18).expect("range");
        assert_eq!(range.zoom, 4);
        assert_eq!((range.min_x, range.max_x), (6, 10));
        assert_eq!((range.min_y, range.max_y), (6, 10));

        let edge = view_at(0.5, 0.5, 1.0).visible_range(18).expect("range");
        assert_eq!(
            (edge.min_x, edge.max_x, edge.min_y, edge.max_y),
            (0, 1, 0, 1)
        );
    }

    #[test]
    fn visible_range_is_empty_far_off_the_map() {
        assert!(view_at(-40.0, 2.0, 3.0).visible_range(18).is_none());
    }

    #[test]
    fn pan_moves_center_by_tile_fraction() {
        let mut view = view_at(2.0, 2.0, 2.0);
        view.pan_by(128.0, -64.0).expect("pan");
        assert!((view.center().column - 2.5).abs() < 1e-12);
        assert!((view.center().row - 1.75).abs() < 1e-12);
    }

    #[test]
    fn zoom_by_keeps_geographic_center() {
        let mut view = view_at(2.0, 3.0, 2.0);
        view.zoom_by(1.0).expect("zoom");
        assert_eq!(view.center(), TileCoord::new(4.0, 6.0, 3.0));
        assert_eq!(view.zoom_by(40.0), Err(ViewError::InvalidZoom));
        assert_eq!(view.center(), TileCoord::new(4.0, 6.0, 3.0));
    }

    #[test]
    fn zoom_about_point_keeps_anchor_fixed() {
        let mut view = view_at(4.0, 4.0, 3.0);
        let before = view.screen_to_coord(384.0, 128.0).zoom_to(4.0);
        view.zoom_about_point(1.0, 384.0, 128.0)
            .expect("zoom about point");
        let after = view.screen_to_coord(384.0, 128.0);
        assert!((after.column - before.column).abs() < 1e-9);
        assert!((after.row - before.row).abs() < 1e-9);
        assert_eq!(
            view.zoom_about_point(0.5, f64::NAN, 1.0),
            Err(ViewError::NonFiniteValue)
        );
    }

    #[test]
    fn tile_quad_scales_with_fractional_zoom() {
        let view = view_at(8.0, 8.0, 4.0);
        let quad = view.tile_quad(TileKey::new(4, 8, 7));
        assert_eq!(
            quad,
            Quad {
                x: 0.0,
                y: -256.0,
                size: 256.0
            }
        );

        let coarse = view.tile_quad(TileKey::new(3, 4, 4));
        assert_eq!(
            coarse,
            Quad {
                x: 0.0,
                y: 0.0,
                size: 512.0
            }
        );
    }

    #[test]
    fn rejects_invalid_construction() {
        assert_eq!(
            MapView::new(TileCoord::new(0.0, 0.0, 1.0), 0.0, 10.0, 256.0),
            Err(ViewError::InvalidViewport)
        );
        assert_eq!(
            MapView::new(TileCoord::new(0.0, 0.0, -1.0), 10.0, 10.0, 256.0),
            Err(ViewError::InvalidZoom)
        );
        assert_eq!(
            MapView::new(TileCoord::new(0.0, 0.0, 1.0), 10.0, 10.0, 0.0),
            Err(ViewError::InvalidTileSize)
        );
    }
}
