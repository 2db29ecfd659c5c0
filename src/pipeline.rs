use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use ash::{
    vk::{
        Extent2D, PipelineInputAssemblyStateCreateInfo, PipelineRasterizationStateCreateInfo,
        PipelineShaderStageCreateInfo, PipelineVertexInputStateCreateInfo,
        PipelineViewportStateCreateInfo, PolygonMode, PrimitiveTopology, Rect2D, ShaderModule,
        ShaderModuleCreateInfo, ShaderStageFlags, Viewport,
    },
    Device,
};
use tracing::debug;

use crate::InitConfig;

/// Reads a compiled SPIR-V binary in full and reinterprets it as the u32
/// words Vulkan expects. Compilation happens offline; this is only the file
/// I/O collaborator.
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let bytes =
        fs::read(path).with_context(|| format!("reading shader {}", path.display()))?;
    ensure!(
        bytes.len() % 4 == 0,
        "shader {} is not a whole number of SPIR-V words",
        path.display()
    );
    let words = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok(words)
}

pub fn create_shader_module(device: &Device, code: &[u32]) -> Result<ShaderModule> {
    let shader_module_create_info = ShaderModuleCreateInfo::default().code(code);
    let shader_module =
        unsafe { device.create_shader_module(&shader_module_create_info, None)? };
    Ok(shader_module)
}

/// Scaffolding for the eventual graphics pipeline: loads the shaders and
/// describes the shader stages and the first few fixed-function states, then
/// releases the modules again. No pipeline object is created yet; command
/// recording and drawing are still to come.
pub fn configure(device: &Device, extent: Extent2D, config: &InitConfig) -> Result<()> {
    let vertex_shader_module = create_shader_module(device, &read_spirv(&config.vertex_shader)?)?;
    let fragment_shader_module =
        create_shader_module(device, &read_spirv(&config.fragment_shader)?)?;

    let shader_entrypoint_name = c"main";
    let _shader_stages = [
        PipelineShaderStageCreateInfo::default()
            .stage(ShaderStageFlags::VERTEX)
            .module(vertex_shader_module)
            .name(shader_entrypoint_name),
        PipelineShaderStageCreateInfo::default()
            .stage(ShaderStageFlags::FRAGMENT)
            .module(fragment_shader_module)
            .name(shader_entrypoint_name),
    ];

    // no vertex buffers yet, so nothing to describe
    let _vertex_input_state = PipelineVertexInputStateCreateInfo::default();

    // interpret the vertex stream as a plain triangle list
    let _input_assembly_state = PipelineInputAssemblyStateCreateInfo::default()
        .topology(PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // viewport covering the whole swapchain extent, scissor doing nothing
    let viewport = [Viewport::default()
        .x(0.0f32)
        .y(0.0f32)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0f32)
        .max_depth(1.0f32)];
    let scissor = [Rect2D::default().extent(extent)];
    let _viewport_state = PipelineViewportStateCreateInfo::default()
        .viewports(&viewport)
        .scissors(&scissor);

    let _rasterization_state = PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(PolygonMode::FILL)
        .line_width(1.0f32);

    debug!("graphics pipeline fixed-function state described, creation not wired up yet");

    unsafe {
        device.destroy_shader_module(fragment_shader_module, None);
        device.destroy_shader_module(vertex_shader_module, None);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("hello_vulkan_{name}_{}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn spirv_bytes_become_native_endian_words() {
        let path = temp_file("words.spv", &[0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00]);
        let words = read_spirv(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(
            words,
            vec![
                u32::from_ne_bytes([0x03, 0x02, 0x23, 0x07]),
                u32::from_ne_bytes([0x00, 0x00, 0x01, 0x00]),
            ]
        );
    }

    #[test]
    fn truncated_spirv_is_rejected() {
        let path = temp_file("truncated.spv", &[0x03, 0x02, 0x23]);
        let result = read_spirv(&path);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn missing_shader_file_is_an_error() {
        let result = read_spirv(Path::new("definitely/not/here.spv"));
        assert!(result.is_err());
    }
}
