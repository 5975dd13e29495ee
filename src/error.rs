//! Crate-wide error taxonomy (spec §7).
//!
//! Every fallible entry point returns `Result<T, Error>`. Construction sites
//! log at `error!` with the acting subsystem before the value is returned or
//! propagated with `?`, rather than attaching file/line metadata to the
//! error type itself.

use thiserror::Error as ThisError;

/// Platform lifecycle failures (spec §7 "Platform").
#[derive(Debug, ThisError)]
pub enum PlatformError {
    #[error("platform initialization failed: {0}")]
    Init(String),
    #[error("run-frame callback failed: {0}")]
    RunFrame(String),
    #[error("platform termination failed: {0}")]
    Terminate(String),
}

/// File I/O failures (spec §7 "File"). `vkforge` itself never touches the
/// filesystem (SPIR-V bytes are supplied already-read by the caller), but
/// the variant set is kept so collaborators reporting through this crate's
/// error type have a home for them.
#[derive(Debug, ThisError)]
pub enum FileError {
    #[error("failed to open '{0}'")]
    Open(String),
    #[error("seek failed on '{0}'")]
    Seek(String),
    #[error("tell failed on '{0}'")]
    Tell(String),
    #[error("short read on '{path}': expected {expected} got {actual}")]
    ShortRead { path: String, expected: usize, actual: usize },
    #[error("short write on '{path}': expected {expected} wrote {actual}")]
    ShortWrite { path: String, expected: usize, actual: usize },
    #[error("failed to get current working directory")]
    GetCwd,
}

/// Instance/device/swapchain bring-up failures (spec §7 "Vulkan init").
#[derive(Debug, ThisError)]
pub enum VulkanInitError {
    #[error("vkCreateInstance failed: {0}")]
    CreateInstance(String),
    #[error("surface creation failed: {0}")]
    CreateSurface(String),
    #[error("vkEnumeratePhysicalDevices failed: {0}")]
    EnumeratePhysicalDevices(String),
    #[error("no physical devices are available")]
    NoPhysicalDevices,
    #[error("no physical device satisfies the required feature set")]
    NoSuitablePhysicalDevice,
    #[error("vkCreateDevice failed: {0}")]
    CreateDevice(String),
    #[error("failed to create the GPU memory allocator: {0}")]
    CreateGpuAllocator(String),
    #[error("vkCreateSemaphore failed: {0}")]
    CreateSemaphore(String),
    #[error("vkCreateFence failed: {0}")]
    CreateFence(String),
    #[error("vkCreateSwapchainKHR failed: {0}")]
    CreateSwapchain(String),
    #[error("vkGetSwapchainImagesKHR failed: {0}")]
    GetSwapchainImages(String),
    #[error("vkCreateImageView failed: {0}")]
    CreateImageView(String),
}

/// Resource-inventory object creation failures (spec §7 "Vulkan objects").
#[derive(Debug, ThisError)]
pub enum VulkanObjectError {
    #[error("shader module creation failed: {0}")]
    CreateShaderModule(String),
    #[error("descriptor set layout creation failed: {0}")]
    InitDescriptorSetLayout(String),
    #[error("pipeline layout creation failed: {0}")]
    CreatePipelineLayout(String),
    #[error("render pass creation failed: {0}")]
    CreateRenderPass(String),
    #[error("graphics pipeline creation failed: {0}")]
    CreatePipeline(String),
    #[error("framebuffer creation failed: {0}")]
    CreateFramebuffer(String),
    #[error("command pool creation failed: {0}")]
    CreateCommandPool(String),
    #[error("command buffer allocation failed: {0}")]
    CreateCommandBuffer(String),
    #[error("descriptor pool creation failed: {0}")]
    CreateDescriptorPool(String),
    #[error("descriptor set allocation failed: {0}")]
    CreateDescriptorSets(String),
    #[error("sampler creation failed: {0}")]
    CreateSampler(String),
    #[error("buffer creation failed: {0}")]
    CreateBuffer(String),
    #[error("image creation failed: {0}")]
    CreateImage(String),
}

/// Command recording / submission failures (spec §7 "Recording/submit").
#[derive(Debug, ThisError)]
pub enum RecordError {
    #[error("vkBeginCommandBuffer failed: {0}")]
    BeginCommandBuffer(String),
    #[error("vkEndCommandBuffer failed: {0}")]
    EndCommandBuffer(String),
    #[error("failed to begin a transient copy-buffer command: {0}")]
    CopyBufferBegin(String),
    #[error("failed to submit a transient copy-buffer command: {0}")]
    CopyBufferSubmit(String),
    #[error("vkQueueWaitIdle failed while copying: {0}")]
    CopyBufferWaitIdle(String),
    #[error("unsupported image layout transition {old:?} -> {new:?}")]
    TransitionImageUnsupportedLayout { old: String, new: String },
}

/// Per-frame rendering failures (spec §7 "Rendering").
#[derive(Debug, ThisError)]
pub enum RenderError {
    #[error("failed to load shader stage '{0}'")]
    LoadShaders(String),
    #[error("vkAcquireNextImageKHR failed: {0}")]
    AcquireImage(String),
    #[error("image initialization failed: {0}")]
    InitImage(String),
    #[error("image upload failed: {0}")]
    UploadImage(String),
    #[error("image view initialization failed: {0}")]
    InitImageView(String),
    #[error("failed to add an image to the inventory: {0}")]
    AddImage(String),
    #[error("vkWaitForFences failed: {0}")]
    WaitFence(String),
    #[error("vkResetFences failed: {0}")]
    ResetFence(String),
    #[error("vkQueueSubmit failed: {0}")]
    SubmitQueue(String),
    #[error("vkQueuePresentKHR failed: {0}")]
    Present(String),
    #[error("sampler initialization failed: {0}")]
    InitSampler(String),
}

/// Out-of-memory at the arena layer (spec §4.A).
#[derive(Debug, ThisError)]
#[error("arena allocation of {requested} bytes (align {alignment}) failed: out of memory")]
pub struct OutOfMemory {
    pub requested: usize,
    pub alignment: usize,
}

/// The crate-wide error type, one variant per subsystem group.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    VulkanInit(#[from] VulkanInitError),
    #[error(transparent)]
    VulkanObject(#[from] VulkanObjectError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vulkanalia::vk::ErrorCode),
}
