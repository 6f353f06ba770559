//! Projection helpers.
//!
//! Matrices are column-major and map to wgpu clip space (depth 0..1).

use crate::TransformMatrix4x4;

pub fn orthographic_off_center(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> TransformMatrix4x4 {
    assert!(
        right != left && top != bottom && far != near,
        "orthographic volume must not be degenerate"
    );
    [
        2.0 / (right - left),
        0.0,
        0.0,
        0.0,
        0.0,
        2.0 / (top - bottom),
        0.0,
        0.0,
        0.0,
        0.0,
        1.0 / (near - far),
        0.0,
        (left + right) / (left - right),
        (top + bottom) / (bottom - top),
        near / (near - far),
        1.0,
    ]
}

/// Maps pixel offsets from the viewport center (y down) to clip space.
pub fn viewport_clip_matrix(viewport_width: u32, viewport_height: u32) -> TransformMatrix4x4 {
    assert!(
        viewport_width > 0 && viewport_height > 0,
        "viewport size must be positive"
    );
    let half_width = viewport_width as f32 * 0.5;
    let half_height = viewport_height as f32 * 0.5;
    orthographic_off_center(
        -half_width,
        half_width,
        half_height,
        -half_height,
        -1.0,
        1.0,
    )
}

pub fn transform_point(matrix: &TransformMatrix4x4, x: f32, y: f32) -> [f32; 2] {
    [
        matrix[0] * x + matrix[4] * y + matrix[12],
        matrix[1] * x + matrix[5] * y + matrix[13],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point_near(actual: [f32; 2], expected: [f32; 2]) {
        assert!(
            (actual[0] - expected[0]).abs() < 1e-6 && (actual[1] - expected[1]).abs() < 1e-6,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn viewport_corners_land_on_clip_corners() {
        let matrix = viewport_clip_matrix(800, 600);
        assert_point_near(transform_point(&matrix, -400.0, -300.0), [-1.0, 1.0]);
        assert_point_near(transform_point(&matrix, 400.0, 300.0), [1.0, -1.0]);
        assert_point_near(transform_point(&matrix, 0.0, 0.0), [0.0, 0.0]);
    }

    #[test]
    fn off_center_volume_is_recentered() {
        let matrix = orthographic_off_center(0.0, 100.0, 0.0, 50.0, 0.0, 1.0);
        assert_point_near(transform_point(&matrix, 0.0, 0.0), [-1.0, -1.0]);
        assert_point_near(transform_point(&matrix, 100.0, 50.0), [1.0, 1.0]);
    }
}
