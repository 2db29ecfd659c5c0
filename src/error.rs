use ash::vk;
use thiserror::Error;

/// Failures the initialization pipeline can surface. Every variant is a
/// deterministic configuration or driver-capability mismatch, so nothing
/// here is worth retrying; callers abort the remaining init sequence.
#[derive(Debug, Error)]
pub enum InitError {
    /// A requested validation layer is not installed on this system.
    /// Checked before any creation call is attempted.
    #[error("validation layer {0} requested, but not available")]
    LayerUnavailable(String),

    #[error("failed to create instance")]
    InstanceCreationFailed(#[source] vk::Result),

    #[error("failed to create window surface")]
    SurfaceCreationFailed(#[source] vk::Result),

    /// No enumerated physical device passed the suitability predicate.
    #[error("could not find a suitable physical device")]
    NoSuitableDevice,

    /// The surface offers neither the "no preference" sentinel nor the
    /// B8G8R8A8_UNORM / SRGB_NONLINEAR pair we render in.
    #[error("no compatible surface format offered by the device")]
    NoCompatibleSurfaceFormat,

    #[error("failed to create logical device")]
    LogicalDeviceCreationFailed(#[source] vk::Result),

    #[error("failed to create swapchain")]
    SwapchainCreationFailed(#[source] vk::Result),

    #[error("failed to create swapchain image view")]
    ImageViewCreationFailed(#[source] vk::Result),

    /// Capability queries and enumerations that have no dedicated variant.
    #[error("vulkan call failed")]
    Vulkan(#[from] vk::Result),
}
