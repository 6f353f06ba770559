use protocol::{TexRect, TextureHandle, TileKey};

/// Ancestor texture region that stands in for a tile whose own texture is not ready.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fallback {
    pub ancestor: TileKey,
    pub texture: TextureHandle,
    pub rect: TexRect,
}

/// Finds the nearest ancestor of `leaf` with a ready texture.
///
/// Each step up contributes the child's quadrant bits, weighted by the number of
/// leaf-sized cells per ancestor half. The sampled rectangle is
/// `offset = cells * scale`, `scale = 2^-depth`.
pub fn resolve_fallback<F>(leaf: TileKey, mut ready_texture: F) -> Option<Fallback>
where
    F: FnMut(TileKey) -> Option<TextureHandle>,
{
    let mut current = leaf.parent()?;
    let (x_bit, y_bit) = leaf.quadrant();
    let mut cells_x = u64::from(x_bit);
    let mut cells_y = u64::from(y_bit);
    let mut span = 2u64;
    let mut scale = 0.5f64;

    loop {
        if let Some(texture) = ready_texture(current) {
            return Some(Fallback {
                ancestor: current,
                texture,
                rect: TexRect {
                    offset: [
                        (cells_x as f64 * scale) as f32,
                        (cells_y as f64 * scale) as f32,
                    ],
                    scale: [scale as f32, scale as f32],
                },
            });
        }
        let (x_bit, y_bit) = current.quadrant();
        cells_x += u64::from(x_bit) * span;
        cells_y += u64::from(y_bit) * span;
        current = current.parent()?;
        span *= 2;
        scale *= 0.5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_levels_up_selects_quarter_region() {
        let ready = TileKey::new(3, 2, 3);
        let fallback = resolve_fallback(TileKey::new(5, 10, 12), |key| {
            (key == ready).then_some(TextureHandle(7))
        })
        .expect("fallback");

        assert_eq!(fallback.ancestor, ready);
        assert_eq!(fallback.texture, TextureHandle(7));
        assert_eq!(fallback.rect.scale, [0.25, 0.25]);
        // Column 10 is cell 2 of ancestor column 2's four; row 12 is cell 0.
        assert_eq!(fallback.rect.offset, [0.5, 0.0]);
    }

    #[test]
    fn direct_parent_uses_half_size_quadrant() {
        let fallback = resolve_fallback(TileKey::new(4, 7, 2), |key| {
            (key == TileKey::new(3, 3, 1)).then_some(TextureHandle(1))
        })
        .expect("fallback");
        assert_eq!(fallback.rect.offset, [0.5, 0.0]);
        assert_eq!(fallback.rect.scale, [0.5, 0.5]);
    }

    #[test]
    fn region_always_contains_leaf_footprint() {
        let leaf = TileKey::new(6, 45, 19);
        for depth in 1..=6u8 {
            let target = TileKey::new(6 - depth, 45 >> depth, 19 >> depth);
            let fallback =
                resolve_fallback(leaf, |key| (key == target).then_some(TextureHandle(1)))
                    .expect("fallback");
            let cells = f64::from(1u32 << depth);
            let expected_x = f64::from(45 - (target.x << depth)) / cells;
            let expected_y = f64::from(19 - (target.y << depth)) / cells;
            assert!((f64::from(fallback.rect.offset[0]) - expected_x).abs() < 1e-6);
            assert!((f64::from(fallback.rect.offset[1]) - expected_y).abs() < 1e-6);
            assert!((f64::from(fallback.rect.scale[0]) - 1.0 / cells).abs() < 1e-6);
        }
    }

    #[test]
    fn nothing_ready_yields_none() {
        assert!(resolve_fallback(TileKey::new(5, 10, 12), |_| None).is_none());
        assert!(resolve_fallback(TileKey::ROOT, |_| Some(TextureHandle(1))).is_none());
    }
}
