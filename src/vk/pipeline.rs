//! Pipeline configuration and builder (spec §4.H "Pipelines additionally
//! own..."), a config-driven builder covering every field spec §4.H
//! enumerates rather than one hardcoded pipeline layout.

use vulkanalia::bytecode::Bytecode;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};
use vulkanalia::Device;

use crate::error::VulkanObjectError;
use crate::vk::host_alloc::HostAllocBridge;
use crate::Result;

#[derive(Clone, Copy, Debug)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub stage: vk::ShaderStageFlags,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct DescriptorSetLayoutCfg {
    pub bindings: Vec<DescriptorBinding>,
}

#[derive(Clone, Debug)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub spirv: Vec<u8>,
    pub entry_point: &'static str,
}

/// A rich enumeration of every fixed-function and programmable stage
/// spec §4.H requires a pipeline config to cover.
#[derive(Clone, Debug)]
pub struct PipelineCfg {
    pub descriptor_set_layouts: Vec<DescriptorSetLayoutCfg>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    pub shader_stages: Vec<ShaderStage>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_bias_enable: bool,
    pub line_width: f32,
    pub rasterization_samples: vk::SampleCountFlags,
    pub color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    pub blend_constants: [f32; 4],
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
    pub stencil_test_enable: bool,
}

pub struct PipelineBundle {
    pub descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

fn create_shader_module(device: &Device, bytecode: &[u8], vk_callbacks: &vk::AllocationCallbacks) -> Result<vk::ShaderModule> {
    let bytecode = Bytecode::new(bytecode).map_err(|_| VulkanObjectError::CreateShaderModule("invalid SPIR-V bytecode".into()))?;
    let info = vk::ShaderModuleCreateInfo::builder().code_size(bytecode.code_size()).code(bytecode.code());
    unsafe { device.create_shader_module(&info, Some(vk_callbacks)) }.map_err(|e| VulkanObjectError::CreateShaderModule(e.to_string()).into())
}

fn create_descriptor_set_layout(
    device: &Device,
    cfg: &DescriptorSetLayoutCfg,
    vk_callbacks: &vk::AllocationCallbacks,
) -> Result<vk::DescriptorSetLayout> {
    let bindings: Vec<_> = cfg
        .bindings
        .iter()
        .map(|b| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(b.binding)
                .descriptor_type(b.descriptor_type)
                .descriptor_count(b.count)
                .stage_flags(b.stage)
        })
        .collect();
    let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    unsafe { device.create_descriptor_set_layout(&info, Some(vk_callbacks)) }
        .map_err(|e| VulkanObjectError::InitDescriptorSetLayout(e.to_string()).into())
}

/// Builds descriptor-set layouts, a pipeline layout, and a graphics
/// pipeline from `cfg` against `render_pass` (spec §4.H).
pub fn create_pipeline(
    device: &Device,
    render_pass: vk::RenderPass,
    cfg: &PipelineCfg,
    host_alloc: &HostAllocBridge,
) -> Result<PipelineBundle> {
    let vk_callbacks = host_alloc.as_vk_callbacks();

    let descriptor_set_layouts: Vec<_> = cfg
        .descriptor_set_layouts
        .iter()
        .map(|l| create_descriptor_set_layout(device, l, &vk_callbacks))
        .collect::<Result<_>>()?;

    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&descriptor_set_layouts)
        .push_constant_ranges(&cfg.push_constant_ranges);
    let layout = unsafe { device.create_pipeline_layout(&layout_info, Some(&vk_callbacks)) }
        .map_err(|e| VulkanObjectError::CreatePipelineLayout(e.to_string()))?;

    let shader_modules: Vec<_> = cfg
        .shader_stages
        .iter()
        .map(|s| create_shader_module(device, &s.spirv, &vk_callbacks).map(|m| (m, s.stage, s.entry_point)))
        .collect::<Result<_>>()?;

    let entry_point_cstrs: Vec<_> = shader_modules.iter().map(|(_, _, ep)| format!("{ep}\0")).collect();
    let stages: Vec<_> = shader_modules
        .iter()
        .zip(&entry_point_cstrs)
        .map(|((module, stage, _), entry)| {
            vk::PipelineShaderStageCreateInfo::builder().stage(*stage).module(*module).name(entry.as_bytes())
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&cfg.vertex_bindings)
        .vertex_attribute_descriptions(&cfg.vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(cfg.topology)
        .primitive_restart_enable(cfg.primitive_restart);

    let viewports = [cfg.viewport];
    let scissors = [cfg.scissor];
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder().viewports(&viewports).scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(cfg.polygon_mode)
        .line_width(cfg.line_width)
        .cull_mode(cfg.cull_mode)
        .front_face(cfg.front_face)
        .depth_bias_enable(cfg.depth_bias_enable);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(cfg.rasterization_samples);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(cfg.depth_test_enable)
        .depth_write_enable(cfg.depth_write_enable)
        .depth_compare_op(cfg.depth_compare_op)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(cfg.stencil_test_enable);

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&cfg.color_blend_attachments)
        .blend_constants(cfg.blend_constants);

    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&cfg.dynamic_states);

    let info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], Some(&vk_callbacks)) }
        .map_err(|e| VulkanObjectError::CreatePipeline(e.1.to_string()))?
        .0[0];

    for (module, _, _) in &shader_modules {
        unsafe { device.destroy_shader_module(*module, Some(&vk_callbacks)) };
    }

    Ok(PipelineBundle { descriptor_set_layouts, layout, pipeline })
}

impl PipelineBundle {
    pub fn destroy(&self, device: &Device, host_alloc: &HostAllocBridge) {
        let vk_callbacks = host_alloc.as_vk_callbacks();
        unsafe {
            device.destroy_pipeline(self.pipeline, Some(&vk_callbacks));
            device.destroy_pipeline_layout(self.layout, Some(&vk_callbacks));
            for &layout in &self.descriptor_set_layouts {
                device.destroy_descriptor_set_layout(layout, Some(&vk_callbacks));
            }
        }
    }
}
