//! The renderer (spec §2 component R, §4.I/§4.J/§4.K/§4.M): the
//! frames-in-flight scheduler, the transient transfer service, the
//! slot-pool mesh/texture/material/technique registries, and the frame
//! loop orchestrator that ties them together with the input stack (L).

pub mod frame;
pub mod loop_;
pub mod registry;
pub mod transfer;

pub use frame::{DescriptorPoolCfg, FrameContext, FrameOutcome, FrameScheduler, FRAMES_IN_FLIGHT};
pub use loop_::{FrameLoop, LoopExit};
pub use registry::{
    MaterialHandle, MaterialRecord, MaterialRegistry, MeshHandle, MeshRecord, MeshRegistry, StreamAllocator, TechniqueHandle,
    TechniqueRecord, TechniqueRegistry, TextureHandle, TextureRecord, TextureRegistry, MATERIAL_SAMPLER_SLOTS,
};
pub use transfer::TransferService;
