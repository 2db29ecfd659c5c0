use std::{collections::HashSet, ops::Deref, rc::Rc};

use anyhow::{Context, Result};
use ash::{
    khr::swapchain,
    vk::{
        self, ColorSpaceKHR, ComponentMapping, ComponentSwizzle, CompositeAlphaFlagsKHR, Extent2D,
        Format, ImageAspectFlags, ImageSubresourceRange, ImageUsageFlags, ImageViewCreateInfo,
        ImageViewType, PhysicalDevice, PresentModeKHR, SharingMode, SurfaceCapabilitiesKHR,
        SurfaceFormatKHR, SwapchainCreateInfoKHR, SwapchainKHR,
    },
};
use tracing::debug;

use crate::{
    error::InitError, queue_families::QueueFamilyIndices, surface::Surface, Instance,
    LogicalDevice,
};

/// Raw presentation capabilities of a (device, surface) pair: surface
/// capabilities plus the enumerated format and present-mode lists, either of
/// which may be empty. Queried once while filtering candidates and again
/// when configuring the swapchain; the two phases do not share a result.
pub struct SwapchainSupport {
    pub capabilities: SurfaceCapabilitiesKHR,
    pub formats: Vec<SurfaceFormatKHR>,
    pub present_modes: Vec<PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query(
        surface: &Surface,
        physical_device: &PhysicalDevice,
    ) -> Result<Self, InitError> {
        Ok(Self {
            capabilities: surface.get_physical_device_surface_capabilities(physical_device)?,
            formats: surface.get_physical_device_surface_formats(physical_device)?,
            present_modes: surface.get_physical_device_surface_present_modes(physical_device)?,
        })
    }

    /// A device can present at all iff it offers at least one format and one
    /// present mode for this surface.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Derives the concrete configuration from what the surface supports and
    /// the preferred window size. Done once; the result is never mutated.
    pub fn negotiate(&self, preferred_extent: Extent2D) -> Result<SwapchainConfig, InitError> {
        Ok(SwapchainConfig {
            surface_format: choose_surface_format(&self.formats)?,
            present_mode: choose_present_mode(&self.present_modes),
            extent: choose_extent(&self.capabilities, preferred_extent),
            image_count: choose_image_count(&self.capabilities),
        })
    }
}

/// The negotiated swapchain configuration.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    pub surface_format: SurfaceFormatKHR,
    pub present_mode: PresentModeKHR,
    pub extent: Extent2D,
    pub image_count: u32,
}

/// Picks the surface format. A single UNDEFINED entry means the surface has
/// no preference, so we take our default; otherwise we require an exact
/// B8G8R8A8_UNORM / SRGB_NONLINEAR entry and refuse anything else rather
/// than render into an arbitrary format.
fn choose_surface_format(formats: &[SurfaceFormatKHR]) -> Result<SurfaceFormatKHR, InitError> {
    if formats.len() == 1 && formats[0].format == Format::UNDEFINED {
        return Ok(SurfaceFormatKHR {
            format: Format::B8G8R8A8_UNORM,
            color_space: ColorSpaceKHR::SRGB_NONLINEAR,
        });
    }

    formats
        .iter()
        .copied()
        .find(|format| {
            format.format == Format::B8G8R8A8_UNORM
                && format.color_space == ColorSpaceKHR::SRGB_NONLINEAR
        })
        .ok_or(InitError::NoCompatibleSurfaceFormat)
}

/// Precedence MAILBOX > IMMEDIATE > FIFO. Mailbox wins as soon as it is
/// seen; immediate is remembered as the running best in case mailbox shows
/// up later in the list. FIFO is the only mode the API guarantees.
fn choose_present_mode(present_modes: &[PresentModeKHR]) -> PresentModeKHR {
    let mut best_mode = PresentModeKHR::FIFO;
    for present_mode in present_modes {
        if *present_mode == PresentModeKHR::MAILBOX {
            return *present_mode;
        } else if *present_mode == PresentModeKHR::IMMEDIATE {
            best_mode = *present_mode;
        }
    }
    best_mode
}

/// The surface's current extent is authoritative unless it reports the
/// u32::MAX sentinel, in which case the preferred size is clamped per axis
/// into the supported range.
fn choose_extent(capabilities: &SurfaceCapabilitiesKHR, preferred: Extent2D) -> Extent2D {
    match capabilities.current_extent.width {
        u32::MAX => Extent2D {
            width: preferred.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: preferred.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        },
        _ => capabilities.current_extent,
    }
}

/// One more image than the minimum, so we are not stuck waiting on the
/// driver; max_image_count of 0 means "no limit".
fn choose_image_count(capabilities: &SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }
    image_count
}

/// Families the swapchain images are shared across: EXCLUSIVE with no
/// explicit list when graphics and present coincide, CONCURRENT across the
/// two distinct families otherwise. The index list has set semantics.
fn image_sharing(graphics_family: u32, present_family: u32) -> (SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            SharingMode::CONCURRENT,
            Vec::from_iter(HashSet::from([graphics_family, present_family])),
        )
    }
}

/// The created swapchain plus one 2D color view per presentable image. Owns
/// the views (destroyed before the swapchain in Drop) but not the images
/// themselves, which belong to the driver.
pub struct Swapchain {
    swapchain_fn: swapchain::Device,
    swapchain_ptr: SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    config: SwapchainConfig,
    // references we need to keep to ensure we are cleaned up before they are
    logical_device: Rc<LogicalDevice>,
    _instance: Rc<Instance>,
}

impl Swapchain {
    pub fn new(
        instance: &Rc<Instance>,
        logical_device: &Rc<LogicalDevice>,
        surface: &Surface,
        support: &SwapchainSupport,
        config: &SwapchainConfig,
        indices: &QueueFamilyIndices,
    ) -> Result<Self> {
        let (graphics_family, present_family) = indices
            .pair()
            .context("queue family roles must be resolved before swapchain creation")?;
        let (sharing_mode, shared_families) = image_sharing(graphics_family, present_family);

        let mut swapchain_create_info = SwapchainCreateInfoKHR::default()
            .surface(**surface)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .present_mode(config.present_mode)
            // always 1 unless doing sterioscopic 3D
            .image_array_layers(1)
            // the images are color attachments to draw into
            .image_usage(ImageUsageFlags::COLOR_ATTACHMENT)
            // whatever transform the surface already has
            .pre_transform(support.capabilities.current_transform)
            // ignore the alpha channel when compositing
            .composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
            // discard pixels that end up obscured
            .clipped(true)
            // always created fresh; recreation is out of scope
            .old_swapchain(SwapchainKHR::null())
            .image_sharing_mode(sharing_mode);
        if !shared_families.is_empty() {
            swapchain_create_info = swapchain_create_info.queue_family_indices(&shared_families);
        }

        let swapchain_fn = swapchain::Device::new(instance, logical_device);
        let swapchain_ptr = unsafe { swapchain_fn.create_swapchain(&swapchain_create_info, None) }
            .map_err(InitError::SwapchainCreationFailed)?;
        debug!(
            "Swapchain created: {} images, {:?}, {:?}, {}x{}",
            config.image_count,
            config.surface_format.format,
            config.present_mode,
            config.extent.width,
            config.extent.height
        );

        // build Self before the views so a mid-loop failure still tears
        // down the swapchain and any views created so far
        let mut this = Self {
            swapchain_fn,
            swapchain_ptr,
            image_views: Vec::new(),
            config: *config,
            logical_device: Rc::clone(logical_device),
            _instance: Rc::clone(instance),
        };
        this.create_image_views()?;
        Ok(this)
    }

    fn create_image_views(&mut self) -> Result<(), InitError> {
        let images = unsafe { self.swapchain_fn.get_swapchain_images(self.swapchain_ptr) }?;
        self.image_views.reserve(images.len());
        for image in images {
            let image_view_create_info = ImageViewCreateInfo::default()
                .image(image)
                // 2D images
                .view_type(ImageViewType::TYPE_2D)
                .format(self.config.surface_format.format)
                // no swizzling
                .components(
                    ComponentMapping::default()
                        .r(ComponentSwizzle::IDENTITY)
                        .g(ComponentSwizzle::IDENTITY)
                        .b(ComponentSwizzle::IDENTITY)
                        .a(ComponentSwizzle::IDENTITY),
                )
                // color images with no mipmapping or layers
                .subresource_range(
                    ImageSubresourceRange::default()
                        .aspect_mask(ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let image_view = unsafe {
                self.logical_device
                    .create_image_view(&image_view_create_info, None)
            }
            .map_err(InitError::ImageViewCreationFailed)?;
            self.image_views.push(image_view);
        }
        Ok(())
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn extent(&self) -> Extent2D {
        self.config.extent
    }

    pub fn surface_format(&self) -> SurfaceFormatKHR {
        self.config.surface_format
    }

    pub fn get_handle(&self) -> &SwapchainKHR {
        &self.swapchain_ptr
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for image_view in self.image_views.drain(..) {
            unsafe { self.logical_device.destroy_image_view(image_view, None) }
        }
        unsafe {
            self.swapchain_fn
                .destroy_swapchain(self.swapchain_ptr, None)
        }
    }
}

impl Deref for Swapchain {
    type Target = swapchain::Device;

    fn deref(&self) -> &Self::Target {
        &self.swapchain_fn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: Format, color_space: ColorSpaceKHR) -> SurfaceFormatKHR {
        SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(
        current: (u32, u32),
        min: (u32, u32),
        max: (u32, u32),
        image_counts: (u32, u32),
    ) -> SurfaceCapabilitiesKHR {
        SurfaceCapabilitiesKHR {
            current_extent: Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: image_counts.0,
            max_image_count: image_counts.1,
            ..Default::default()
        }
    }

    #[test]
    fn undefined_sentinel_yields_the_default_format() {
        let formats = [format(Format::UNDEFINED, ColorSpaceKHR::SRGB_NONLINEAR)];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn exact_match_is_found_anywhere_in_the_list() {
        let wanted = format(Format::B8G8R8A8_UNORM, ColorSpaceKHR::SRGB_NONLINEAR);
        let other = format(Format::R8G8B8A8_UNORM, ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);

        let chosen = choose_surface_format(&[other, wanted]).unwrap();
        assert_eq!(chosen.format, wanted.format);

        let chosen = choose_surface_format(&[wanted, other]).unwrap();
        assert_eq!(chosen.format, wanted.format);
    }

    #[test]
    fn no_sentinel_and_no_exact_match_is_an_error() {
        let formats = [format(
            Format::R8G8B8A8_UNORM,
            ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        )];
        let result = choose_surface_format(&formats);
        assert!(matches!(result, Err(InitError::NoCompatibleSurfaceFormat)));
    }

    #[test]
    fn mailbox_wins_over_everything() {
        let modes = [
            PresentModeKHR::FIFO,
            PresentModeKHR::IMMEDIATE,
            PresentModeKHR::MAILBOX,
        ];
        assert_eq!(choose_present_mode(&modes), PresentModeKHR::MAILBOX);
    }

    #[test]
    fn immediate_beats_fifo() {
        let modes = [PresentModeKHR::FIFO, PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn fifo_is_the_fallback() {
        let modes = [PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), PresentModeKHR::FIFO);
    }

    #[test]
    fn undefined_current_extent_clamps_the_preferred_size() {
        let capabilities = capabilities(
            (u32::MAX, u32::MAX),
            (64, 64),
            (4096, 4096),
            (2, 0),
        );
        let chosen = choose_extent(
            &capabilities,
            Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!((chosen.width, chosen.height), (800, 600));
    }

    #[test]
    fn defined_current_extent_is_authoritative() {
        let capabilities = capabilities((1920, 1080), (64, 64), (4096, 4096), (2, 0));
        let chosen = choose_extent(
            &capabilities,
            Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!((chosen.width, chosen.height), (1920, 1080));
    }

    #[test]
    fn preferred_extent_clamps_per_axis() {
        let capabilities = capabilities((u32::MAX, u32::MAX), (64, 64), (1024, 1024), (2, 0));
        let chosen = choose_extent(
            &capabilities,
            Extent2D {
                width: 32,
                height: 2048,
            },
        );
        assert_eq!((chosen.width, chosen.height), (64, 1024));
    }

    #[test]
    fn image_count_is_min_plus_one_when_unbounded() {
        let capabilities = capabilities((800, 600), (64, 64), (4096, 4096), (2, 0));
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_is_clamped_to_the_maximum() {
        let capabilities = capabilities((800, 600), (64, 64), (4096, 4096), (2, 2));
        assert_eq!(choose_image_count(&capabilities), 2);
    }

    #[test]
    fn shared_family_uses_exclusive_with_no_index_list() {
        let (mode, families) = image_sharing(0, 0);
        assert_eq!(mode, SharingMode::EXCLUSIVE);
        assert!(families.is_empty());
    }

    #[test]
    fn distinct_families_use_concurrent_with_both_indices() {
        let (mode, mut families) = image_sharing(2, 0);
        assert_eq!(mode, SharingMode::CONCURRENT);
        families.sort_unstable();
        assert_eq!(families, vec![0, 2]);
    }
}
