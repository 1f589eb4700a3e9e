//! Fixtures shared by the unit tests of this crate.

use rustc_hash::FxHashMap;
use strata_voxel::{Aabb, BlockDef, BlockId, Chunk, ChunkHandle, ChunkSource, ContentRegistry, new_handle};

/// Ids of the blocks registered by [`test_content`].
#[derive(Clone, Copy)]
pub(crate) struct TestBlocks {
    pub stone: BlockId,
    /// 2×1×1 rotatable extended block.
    pub bed: BlockId,
    /// Bottom half slab.
    pub slab: BlockId,
    /// Replaceable, non-solid decoration.
    pub tuft: BlockId,
    /// Red light source.
    pub lamp: BlockId,
}

pub(crate) fn test_content() -> (ContentRegistry, TestBlocks) {
    let mut content = ContentRegistry::new();
    let stone = content.register(BlockDef::opaque("base:stone")).unwrap();
    let bed = content
        .register(BlockDef {
            size: [2, 1, 1],
            rotatable: true,
            light_passing: true,
            sky_light_passing: false,
            ..BlockDef::opaque("base:bed")
        })
        .unwrap();
    let slab = content
        .register(BlockDef {
            hitbox: Aabb::new(glam::Vec3::ZERO, glam::Vec3::new(1.0, 0.5, 1.0)),
            light_passing: true,
            solid: false,
            ..BlockDef::opaque("base:slab")
        })
        .unwrap();
    let tuft = content
        .register(BlockDef {
            light_passing: true,
            sky_light_passing: true,
            obstacle: false,
            solid: false,
            replaceable: true,
            ..BlockDef::opaque("base:tuft")
        })
        .unwrap();
    let lamp = content
        .register(BlockDef {
            emission: [15, 0, 0],
            ..BlockDef::opaque("base:lamp")
        })
        .unwrap();
    (
        content,
        TestBlocks {
            stone,
            bed,
            slab,
            tuft,
            lamp,
        },
    )
}

/// All-air chunks in a square of `radius` around chunk (0, 0).
pub(crate) struct TestSource {
    pub chunks: FxHashMap<(i32, i32), ChunkHandle>,
    pub content: ContentRegistry,
}

impl TestSource {
    pub fn new(content: ContentRegistry, radius: i32) -> Self {
        let mut chunks = FxHashMap::default();
        for cx in -radius..=radius {
            for cz in -radius..=radius {
                chunks.insert((cx, cz), new_handle(Chunk::new(cx, cz)));
            }
        }
        Self { chunks, content }
    }
}

impl ChunkSource for TestSource {
    fn chunk(&self, cx: i32, cz: i32) -> Option<&ChunkHandle> {
        self.chunks.get(&(cx, cz))
    }

    fn content(&self) -> &ContentRegistry {
        &self.content
    }

    fn for_each_chunk(&self, f: &mut dyn FnMut(&ChunkHandle)) {
        self.chunks.values().for_each(f);
    }
}
