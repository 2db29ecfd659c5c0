pub mod config;
pub mod debug;
pub mod error;
pub mod instance;
pub mod logical_device;
pub mod physical_device;
pub mod pipeline;
pub mod queue_families;
pub mod surface;
pub mod swapchain;

pub use config::InitConfig;
pub use error::InitError;
pub use instance::Instance;
pub use logical_device::LogicalDevice;
pub use queue_families::QueueFamilyIndices;
pub use surface::Surface;
pub use swapchain::{Swapchain, SwapchainConfig, SwapchainSupport};

use anyhow::Result;
use simple_logger::{set_up_color_terminal, SimpleLogger};

pub fn init_logging() -> Result<()> {
    set_up_color_terminal();
    let logger = SimpleLogger::new();
    logger.init()?;
    Ok(())
}
