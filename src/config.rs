use std::ffi::CString;
use std::path::PathBuf;

use ash::vk::{Extent2D, KHR_SWAPCHAIN_NAME};

/// Immutable configuration for the whole initialization pipeline. Built once
/// in `main` and passed by reference into every stage, instead of the usual
/// scattering of compile-time constants.
#[derive(Debug, Clone)]
pub struct InitConfig {
    pub window_title: String,
    /// Preferred framebuffer size. Only consulted when the surface reports
    /// the "undefined extent" sentinel; otherwise the surface wins.
    pub window_width: u32,
    pub window_height: u32,
    /// Enables the validation layers and the debug messenger.
    pub validation: bool,
    pub validation_layers: Vec<CString>,
    pub device_extensions: Vec<CString>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl InitConfig {
    pub fn new(validation: bool) -> Self {
        Self {
            window_title: "Hello, Triangle".to_owned(),
            window_width: 800,
            window_height: 600,
            validation,
            validation_layers: vec![c"VK_LAYER_KHRONOS_validation".to_owned()],
            device_extensions: vec![KHR_SWAPCHAIN_NAME.to_owned()],
            vertex_shader: PathBuf::from("shaders/vert.spv"),
            fragment_shader: PathBuf::from("shaders/frag.spv"),
        }
    }

    pub fn preferred_extent(&self) -> Extent2D {
        Extent2D {
            width: self.window_width,
            height: self.window_height,
        }
    }
}
