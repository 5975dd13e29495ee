//! Slot-pool resource registry (spec §4.K), layered directly on
//! [`crate::mem::containers::SlotPool`] (spec: "Layered on 4.B.3 slot
//! pools"): mesh, texture, material, and technique registries keyed by
//! generation-tagged handles over the Vulkan resource inventory (H).
//!
//! The mesh registry additionally owns a [`StreamAllocator`] per vertex
//! stream — a virtual (offset-only) free-list allocator carving ranges out
//! of the shared vertex/index buffers (spec §1 "a mesh/material/texture
//! slot registry with a shared vertex/index buffer strategy"; §4.K "per-
//! stream virtual allocations... giving base offsets into the global
//! geometry buffers").

use crate::mem::containers::{SlotHandle, SlotPool};
use crate::mem::Arena;
use crate::vk::inventory::{ImageRecord, ImageViewRecord};
use crate::vk::pipeline::PipelineBundle;

/// One free or allocated span of a virtual buffer range, kept in
/// ascending-offset order so neighbors can be detected and coalesced the
/// same way [`crate::mem::free_list`] does for real memory (spec §4.K
/// "removal adds the range back to the free list").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    offset: u64,
    size: u64,
}

/// A first-fit free-list allocator over a fixed-capacity range of opaque
/// offsets — no backing memory of its own, since the bytes it indexes live
/// in a GPU buffer the caller owns. Used once per vertex/index stream.
pub struct StreamAllocator {
    capacity: u64,
    free: Vec<Span>,
    high_water: u64,
}

impl StreamAllocator {
    pub fn new(capacity: u64) -> Self {
        Self { capacity, free: vec![Span { offset: 0, size: capacity }], high_water: 0 }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// Allocates `size` elements, returning the base offset. First-fit over
    /// the free-span list (mirrors [`crate::mem::free_list`]'s `FindFirst`
    /// placement, §4.A).
    pub fn alloc(&mut self, size: u64) -> Option<u64> {
        if size == 0 {
            return Some(0);
        }
        let idx = self.free.iter().position(|s| s.size >= size)?;
        let span = self.free[idx];
        let base = span.offset;
        if span.size == size {
            self.free.remove(idx);
        } else {
            self.free[idx] = Span { offset: span.offset + size, size: span.size - size };
        }
        self.high_water = self.high_water.max(base + size);
        Some(base)
    }

    /// Returns `[offset, offset+size)` to the free list, coalescing with an
    /// immediately-adjacent predecessor and/or successor span (spec §4.K
    /// "removal adds the range back to the free list").
    pub fn free(&mut self, offset: u64, size: u64) {
        if size == 0 {
            return;
        }
        let insert_at = self.free.iter().position(|s| s.offset > offset).unwrap_or(self.free.len());
        self.free.insert(insert_at, Span { offset, size });

        // Coalesce with the right neighbor first, then the left, matching
        // the free-list arena's release order (spec §4.A "coalesce on
        // release; adjacent free blocks coalesce... (right then left)").
        if insert_at + 1 < self.free.len() {
            let right = self.free[insert_at + 1];
            if self.free[insert_at].offset + self.free[insert_at].size == right.offset {
                self.free[insert_at].size += right.size;
                self.free.remove(insert_at + 1);
            }
        }
        if insert_at > 0 {
            let left = self.free[insert_at - 1];
            if left.offset + left.size == self.free[insert_at].offset {
                self.free[insert_at - 1].size += self.free[insert_at].size;
                self.free.remove(insert_at);
            }
        }
    }
}

/// One of the four vertex/index streams a decoded mesh is split across
/// (spec §4.K "position+color, normal+tangent+UV, bone weights+ids,
/// indices").
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamRange {
    pub offset: u64,
    pub count: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SubmeshRange {
    pub vertex_count: u32,
    pub index_count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct MeshRecord {
    pub submeshes: Vec<SubmeshRange>,
    pub position_color: StreamRange,
    pub normal_tangent_uv: StreamRange,
    pub bone_weights_ids: StreamRange,
    pub indices: StreamRange,
}

/// Already-decoded mesh data handed to [`MeshRegistry::upload`] — the
/// vertex/index file-loading step itself is out of scope (spec §1
/// Non-goals: "Model/mesh file loading").
pub struct DecodedMesh {
    pub submeshes: Vec<SubmeshRange>,
    pub position_color_count: u64,
    pub normal_tangent_uv_count: u64,
    pub bone_weights_ids_count: u64,
    pub index_count: u64,
}

pub type MeshHandle = SlotHandle<MeshRecord>;

pub struct MeshRegistry<'a> {
    meshes: SlotPool<'a, MeshRecord>,
    position_color: StreamAllocator,
    normal_tangent_uv: StreamAllocator,
    bone_weights_ids: StreamAllocator,
    indices: StreamAllocator,
}

impl<'a> MeshRegistry<'a> {
    pub fn new(
        arena: &'a Arena<'a>,
        position_color_capacity: u64,
        normal_tangent_uv_capacity: u64,
        bone_weights_ids_capacity: u64,
        index_capacity: u64,
    ) -> Self {
        Self {
            meshes: SlotPool::new(arena),
            position_color: StreamAllocator::new(position_color_capacity),
            normal_tangent_uv: StreamAllocator::new(normal_tangent_uv_capacity),
            bone_weights_ids: StreamAllocator::new(bone_weights_ids_capacity),
            indices: StreamAllocator::new(index_capacity),
        }
    }

    /// Allocates one virtual range per stream and records the submesh table
    /// (spec §4.K "Upload takes a decoded mesh and allocates one virtual
    /// range per stream").
    pub fn upload(&mut self, mesh: DecodedMesh) -> crate::Result<Option<MeshHandle>> {
        let Some(position_color_offset) = self.position_color.alloc(mesh.position_color_count) else { return Ok(None) };
        let Some(normal_tangent_uv_offset) = self.normal_tangent_uv.alloc(mesh.normal_tangent_uv_count) else { return Ok(None) };
        let Some(bone_weights_ids_offset) = self.bone_weights_ids.alloc(mesh.bone_weights_ids_count) else { return Ok(None) };
        let Some(indices_offset) = self.indices.alloc(mesh.index_count) else { return Ok(None) };

        let record = MeshRecord {
            submeshes: mesh.submeshes,
            position_color: StreamRange { offset: position_color_offset, count: mesh.position_color_count },
            normal_tangent_uv: StreamRange { offset: normal_tangent_uv_offset, count: mesh.normal_tangent_uv_count },
            bone_weights_ids: StreamRange { offset: bone_weights_ids_offset, count: mesh.bone_weights_ids_count },
            indices: StreamRange { offset: indices_offset, count: mesh.index_count },
        };
        Ok(Some(self.meshes.acquire(record)?))
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&MeshRecord> {
        self.meshes.get(handle)
    }

    /// Frees the mesh's stream ranges back to their allocators; the device
    /// data itself is left in place, to be overwritten by the next upload
    /// into that range (spec §4.K "leaves the data in-place on the device").
    pub fn remove(&mut self, handle: MeshHandle) {
        if let Some(record) = self.meshes.get(handle).cloned() {
            self.position_color.free(record.position_color.offset, record.position_color.count);
            self.normal_tangent_uv.free(record.normal_tangent_uv.offset, record.normal_tangent_uv.count);
            self.bone_weights_ids.free(record.bone_weights_ids.offset, record.bone_weights_ids.count);
            self.indices.free(record.indices.offset, record.indices.count);
        }
        self.meshes.release(handle);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TextureRecord {
    pub image: SlotHandle<ImageRecord>,
    pub image_view: SlotHandle<ImageViewRecord>,
}

pub type TextureHandle = SlotHandle<TextureRecord>;

pub struct TextureRegistry<'a> {
    textures: SlotPool<'a, TextureRecord>,
}

impl<'a> TextureRegistry<'a> {
    pub fn new(arena: &'a Arena<'a>) -> Self {
        Self { textures: SlotPool::new(arena) }
    }

    pub fn insert(&mut self, record: TextureRecord) -> crate::Result<TextureHandle> {
        self.textures.acquire(record)
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&TextureRecord> {
        self.textures.get(handle)
    }

    pub fn remove(&mut self, handle: TextureHandle) {
        self.textures.release(handle);
    }
}

/// A technique is a set of pipelines keyed by render-pass type (spec §3
/// "Technique registry: per-render-pass-type array of pipeline handles").
pub type RenderPassTypeId = u32;

#[derive(Default)]
pub struct TechniqueRecord {
    pub pipelines: Vec<(RenderPassTypeId, PipelineBundle)>,
}

impl TechniqueRecord {
    pub fn pipeline_for(&self, render_pass_type: RenderPassTypeId) -> Option<&PipelineBundle> {
        self.pipelines.iter().find(|(ty, _)| *ty == render_pass_type).map(|(_, p)| p)
    }
}

pub type TechniqueHandle = SlotHandle<TechniqueRecord>;

pub struct TechniqueRegistry<'a> {
    techniques: SlotPool<'a, TechniqueRecord>,
}

impl<'a> TechniqueRegistry<'a> {
    pub fn new(arena: &'a Arena<'a>) -> Self {
        Self { techniques: SlotPool::new(arena) }
    }

    pub fn insert(&mut self, record: TechniqueRecord) -> crate::Result<TechniqueHandle> {
        self.techniques.acquire(record)
    }

    pub fn get(&self, handle: TechniqueHandle) -> Option<&TechniqueRecord> {
        self.techniques.get(handle)
    }

    pub fn remove(&mut self, handle: TechniqueHandle) {
        self.techniques.release(handle);
    }
}

/// Fixed number of sampler slots a material can bind a texture to.
pub const MATERIAL_SAMPLER_SLOTS: usize = 4;

/// References a technique plus up to [`MATERIAL_SAMPLER_SLOTS`] bound
/// textures (spec §3 "Material registry: references a technique slot plus
/// per-sampler-slot texture handles").
#[derive(Clone, Copy, Debug, Default)]
pub struct MaterialRecord {
    pub technique: TechniqueHandle,
    pub textures: [Option<TextureHandle>; MATERIAL_SAMPLER_SLOTS],
}

pub type MaterialHandle = SlotHandle<MaterialRecord>;

pub struct MaterialRegistry<'a> {
    materials: SlotPool<'a, MaterialRecord>,
}

impl<'a> MaterialRegistry<'a> {
    pub fn new(arena: &'a Arena<'a>) -> Self {
        Self { materials: SlotPool::new(arena) }
    }

    pub fn insert(&mut self, record: MaterialRecord) -> crate::Result<MaterialHandle> {
        self.materials.acquire(record)
    }

    pub fn get(&self, handle: MaterialHandle) -> Option<&MaterialRecord> {
        self.materials.get(handle)
    }

    pub fn remove(&mut self, handle: MaterialHandle) {
        self.materials.release(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::free_list::Placement;

    #[test]
    fn stream_allocator_coalesces_on_free() {
        let mut alloc = StreamAllocator::new(300);
        let a = alloc.alloc(100).unwrap();
        let b = alloc.alloc(100).unwrap();
        let c = alloc.alloc(100).unwrap();
        assert_eq!((a, b, c), (0, 100, 200));

        alloc.free(b, 100);
        alloc.free(a, 100);
        alloc.free(c, 100);

        // After all three are freed in any order, the free list should be a
        // single span covering the whole capacity again.
        assert_eq!(alloc.free.len(), 1);
        assert_eq!(alloc.free[0], Span { offset: 0, size: 300 });
    }

    #[test]
    fn mesh_upload_then_remove_frees_all_streams() {
        let arena = Arena::new_free_list(1 << 20, Placement::FindFirst, None).unwrap();
        let mut registry = MeshRegistry::new(&arena, 1000, 1000, 1000, 1000);
        let handle = registry
            .upload(DecodedMesh {
                submeshes: vec![SubmeshRange { vertex_count: 10, index_count: 30 }],
                position_color_count: 10,
                normal_tangent_uv_count: 10,
                bone_weights_ids_count: 10,
                index_count: 30,
            })
            .unwrap()
            .unwrap();
        assert!(registry.get(handle).is_some());
        registry.remove(handle);
        assert!(registry.get(handle).is_none());

        // Streams should be fully reclaimed: a second upload of the same
        // size must land back at offset 0.
        let handle2 = registry
            .upload(DecodedMesh {
                submeshes: vec![],
                position_color_count: 10,
                normal_tangent_uv_count: 10,
                bone_weights_ids_count: 10,
                index_count: 30,
            })
            .unwrap()
            .unwrap();
        assert_eq!(registry.get(handle2).unwrap().position_color.offset, 0);
    }

    #[test]
    fn texture_registry_roundtrip() {
        let arena = Arena::new_free_list(1 << 16, Placement::FindFirst, None).unwrap();
        let mut registry = TextureRegistry::new(&arena);
        let handle = registry.insert(TextureRecord::default()).unwrap();
        assert!(registry.get(handle).is_some());
        registry.remove(handle);
        assert!(registry.get(handle).is_none());
    }
}
