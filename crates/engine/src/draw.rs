use protocol::{DrawItem, TextureSource, TileKey};
use tiles::{ActiveSet, ReleaseBuffer, TileRef};
use view::{MapView, resolve_fallback};

/// The per-frame list handed to the renderer.
///
/// Holds one reference per visible leaf. Ancestor textures used for fallback are
/// only looked up; they stay alive because the active set owns them.
#[derive(Debug, Default)]
pub(crate) struct DrawList {
    items: Vec<DrawItem>,
    holders: Vec<TileRef>,
}

impl DrawList {
    pub(crate) fn items(&self) -> &[DrawItem] {
        &self.items
    }

    /// References this list holds on `key`.
    pub(crate) fn holds(&self, key: TileKey) -> usize {
        self.holders
            .iter()
            .filter(|record| record.key() == key)
            .count()
    }

    pub(crate) fn rebuild(
        &mut self,
        leaves: &[TileKey],
        view: &MapView,
        active: &ActiveSet,
        releases: &ReleaseBuffer,
    ) {
        let previous = std::mem::take(&mut self.holders);
        self.items.clear();
        self.items.reserve(leaves.len());
        self.holders.reserve(leaves.len());

        for &key in leaves {
            let Some(record) = active.find(&key) else {
                continue;
            };
            record.acquire();
            self.holders.push(TileRef::clone(record));

            let source = match record.texture() {
                Some(texture) => TextureSource::Own(texture),
                None => {
                    let ready = |candidate: TileKey| {
                        active.find(&candidate).and_then(|record| record.texture())
                    };
                    match resolve_fallback(key, ready) {
                        Some(fallback) => TextureSource::Ancestor {
                            key: fallback.ancestor,
                            texture: fallback.texture,
                            rect: fallback.rect,
                        },
                        None => continue,
                    }
                }
            };
            self.items.push(DrawItem {
                key,
                quad: view.tile_quad(key),
                source,
            });
        }

        for record in previous {
            releases.release(record);
        }
    }

    pub(crate) fn clear(&mut self, releases: &ReleaseBuffer) {
        self.items.clear();
        for record in self.holders.drain(..) {
            releases.release(record);
        }
    }
}
