//! Swapchain and framebuffer management (spec §4.G).

use vulkanalia::vk::{self, HasBuilder, KhrSurfaceExtension, KhrSwapchainExtension};
use vulkanalia::{Device, Instance};

use crate::error::VulkanInitError;
use crate::vk::host_alloc::HostAllocBridge;
use crate::window::Window;
use crate::Result;

pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query(instance: &Instance, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> Result<Self> {
        unsafe {
            Ok(Self {
                capabilities: instance
                    .get_physical_device_surface_capabilities_khr(physical_device, surface)
                    .map_err(|e| VulkanInitError::CreateSwapchain(e.to_string()))?,
                formats: instance
                    .get_physical_device_surface_formats_khr(physical_device, surface)
                    .map_err(|e| VulkanInitError::CreateSwapchain(e.to_string()))?,
                present_modes: instance
                    .get_physical_device_surface_present_modes_khr(physical_device, surface)
                    .map_err(|e| VulkanInitError::CreateSwapchain(e.to_string()))?,
            })
        }
    }
}

/// 8-bit BGRA SRGB + SRGB-nonlinear colorspace if offered, else the first
/// format (spec §4.G "Format preference").
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .copied()
        .unwrap_or(formats[0])
}

/// Mailbox if offered, else fifo (spec §4.G "Present-mode preference").
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// `currentExtent` when defined, else the window's pixel size clamped to
/// the surface's min/max (spec §4.G "Extent").
fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window: &dyn Window) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let (w, h) = window.pixel_size();
    vk::Extent2D {
        width: w.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: h.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

pub fn create_swapchain(
    instance: &Instance,
    device: &Device,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    graphics_family: u32,
    present_family: u32,
    window: &dyn Window,
    host_alloc: &HostAllocBridge,
) -> Result<Swapchain> {
    let support = SwapchainSupport::query(instance, physical_device, surface)?;
    let surface_format = choose_surface_format(&support.formats);
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = choose_extent(&support.capabilities, window);

    // Image count = minImageCount + 1, clamped by maxImageCount (spec §4.G).
    let mut image_count = support.capabilities.min_image_count + 1;
    if support.capabilities.max_image_count > 0 {
        image_count = image_count.min(support.capabilities.max_image_count);
    }

    let different_families = graphics_family != present_family;
    let queue_family_indices = [graphics_family, present_family];

    let mut info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .pre_transform(support.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    info = if different_families {
        info.image_sharing_mode(vk::SharingMode::CONCURRENT).queue_family_indices(&queue_family_indices)
    } else {
        info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
    };

    let vk_callbacks = host_alloc.as_vk_callbacks();
    let handle = unsafe { device.create_swapchain_khr(&info, Some(&vk_callbacks)) }
        .map_err(|e| VulkanInitError::CreateSwapchain(e.to_string()))?;
    let images = unsafe { device.get_swapchain_images_khr(handle) }
        .map_err(|e| VulkanInitError::GetSwapchainImages(e.to_string()))?;

    let image_views = images
        .iter()
        .map(|&image| create_color_image_view(device, image, surface_format.format, &vk_callbacks))
        .collect::<Result<Vec<_>>>()?;

    Ok(Swapchain { handle, format: surface_format.format, extent, images, image_views })
}

fn create_color_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    vk_callbacks: &vk::AllocationCallbacks,
) -> Result<vk::ImageView> {
    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    let info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::_2D)
        .format(format)
        .subresource_range(subresource_range);

    unsafe { device.create_image_view(&info, Some(vk_callbacks)) }.map_err(|e| VulkanInitError::CreateImageView(e.to_string()).into())
}

/// Builds one framebuffer per swapchain image view, with optional extra
/// per-image attachments such as depth (spec §4.G "Framebuffer builder").
pub fn create_framebuffers(
    device: &Device,
    render_pass: vk::RenderPass,
    swapchain: &Swapchain,
    extra_attachments: &[vk::ImageView],
    host_alloc: &HostAllocBridge,
) -> Result<Vec<vk::Framebuffer>> {
    let vk_callbacks = host_alloc.as_vk_callbacks();
    swapchain
        .image_views
        .iter()
        .map(|&view| {
            let mut attachments = vec![view];
            attachments.extend_from_slice(extra_attachments);
            let info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(swapchain.extent.width)
                .height(swapchain.extent.height)
                .layers(1);
            unsafe { device.create_framebuffer(&info, Some(&vk_callbacks)) }
                .map_err(|e| crate::error::VulkanObjectError::CreateFramebuffer(e.to_string()).into())
        })
        .collect()
}

impl Swapchain {
    /// Destroys image views and the swapchain itself (spec §4.G
    /// recreation: "destroy framebuffers and swapchain image views, destroy
    /// swapchain").
    pub fn destroy(&mut self, device: &Device, host_alloc: &HostAllocBridge) {
        let vk_callbacks = host_alloc.as_vk_callbacks();
        unsafe {
            for &view in &self.image_views {
                device.destroy_image_view(view, Some(&vk_callbacks));
            }
            device.destroy_swapchain_khr(self.handle, Some(&vk_callbacks));
        }
    }
}
