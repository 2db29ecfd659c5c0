use std::{collections::HashSet, ffi::CString};

use anyhow::Result;
use ash::vk::{PhysicalDevice, QueueFamilyProperties};
use tracing::debug;

use crate::{
    error::InitError,
    queue_families::find_queue_families,
    swapchain::SwapchainSupport,
    surface::Surface,
    InitConfig, Instance,
};

/// A device under consideration during selection: the driver-owned handle
/// plus the properties the suitability predicate needs. Candidates only live
/// for the duration of the pick.
pub struct PhysicalDeviceCandidate {
    pub device: PhysicalDevice,
    pub queue_families: Vec<QueueFamilyProperties>,
    pub extensions: HashSet<CString>,
}

/// Enumerates every physical device as a candidate, in driver-reported
/// order. The order is never changed; selection is first-fit over it.
pub fn enumerate(instance: &Instance) -> Result<Vec<PhysicalDeviceCandidate>> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(InitError::Vulkan)?;
    debug!("Found {} physical device(s)", devices.len());

    let mut candidates = Vec::with_capacity(devices.len());
    for device in devices {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };
        let extension_properties =
            unsafe { instance.enumerate_device_extension_properties(device) }
                .map_err(InitError::Vulkan)?;
        let mut extensions = HashSet::new();
        for extension in extension_properties {
            extensions.insert(extension.extension_name_as_c_str()?.to_owned());
        }
        candidates.push(PhysicalDeviceCandidate {
            device,
            queue_families,
            extensions,
        });
    }
    Ok(candidates)
}

/// First-fit selection: the first candidate the predicate accepts wins, even
/// if a later one would be "better".
pub fn pick<P>(
    candidates: Vec<PhysicalDeviceCandidate>,
    mut predicate: P,
) -> Result<PhysicalDeviceCandidate, InitError>
where
    P: FnMut(&PhysicalDeviceCandidate) -> Result<bool, InitError>,
{
    for candidate in candidates {
        if predicate(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(InitError::NoSuitableDevice)
}

/// The full suitability predicate: complete queue roles, every required
/// device extension present, and a surface that offers at least one format
/// and one present mode.
pub fn is_suitable(
    candidate: &PhysicalDeviceCandidate,
    surface: &Surface,
    config: &InitConfig,
) -> Result<bool, InitError> {
    let indices = find_queue_families(&candidate.queue_families, |family_index| {
        surface.get_physical_device_surface_support(&candidate.device, family_index)
    })?;
    if !indices.is_complete() {
        return Ok(false);
    }

    if !supports_required_extensions(candidate, &config.device_extensions) {
        return Ok(false);
    }

    let support = SwapchainSupport::query(surface, &candidate.device)?;
    Ok(support.is_adequate())
}

/// Subtract the available extensions from the required set; the device
/// qualifies when nothing is left over.
pub fn supports_required_extensions(
    candidate: &PhysicalDeviceCandidate,
    required: &[CString],
) -> bool {
    let mut missing: HashSet<&CString> = required.iter().collect();
    for extension_name in &candidate.extensions {
        missing.remove(extension_name);
    }
    missing.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::{QueueFlags, KHR_SWAPCHAIN_NAME};

    fn candidate(family_count: usize, flags: QueueFlags) -> PhysicalDeviceCandidate {
        let family = QueueFamilyProperties {
            queue_count: 1,
            queue_flags: flags,
            ..Default::default()
        };
        PhysicalDeviceCandidate {
            device: PhysicalDevice::null(),
            queue_families: vec![family; family_count],
            extensions: HashSet::from([KHR_SWAPCHAIN_NAME.to_owned()]),
        }
    }

    fn has_graphics(candidate: &PhysicalDeviceCandidate) -> Result<bool, InitError> {
        let indices = find_queue_families(&candidate.queue_families, |_| Ok(true))?;
        Ok(indices.is_complete())
    }

    #[test]
    fn pick_returns_the_first_suitable_candidate() {
        // distinguishable by family count: the incomplete one, then two
        // suitable ones of 2 and 3 families
        let candidates = vec![
            candidate(1, QueueFlags::COMPUTE),
            candidate(2, QueueFlags::GRAPHICS),
            candidate(3, QueueFlags::GRAPHICS),
        ];
        let picked = pick(candidates, |c| has_graphics(c)).unwrap();
        assert_eq!(picked.queue_families.len(), 2);
    }

    #[test]
    fn pick_fails_when_nothing_is_suitable() {
        let candidates = vec![
            candidate(1, QueueFlags::COMPUTE),
            candidate(1, QueueFlags::TRANSFER),
        ];
        let result = pick(candidates, |c| has_graphics(c));
        assert!(matches!(result, Err(InitError::NoSuitableDevice)));
    }

    #[test]
    fn pick_fails_on_an_empty_enumeration() {
        let result = pick(Vec::new(), |_| Ok(true));
        assert!(matches!(result, Err(InitError::NoSuitableDevice)));
    }

    #[test]
    fn extension_check_subtracts_to_empty() {
        let candidate = candidate(1, QueueFlags::GRAPHICS);
        assert!(supports_required_extensions(
            &candidate,
            &[KHR_SWAPCHAIN_NAME.to_owned()]
        ));
    }

    #[test]
    fn extension_check_fails_on_missing_extension() {
        let candidate = candidate(1, QueueFlags::GRAPHICS);
        let required = vec![
            KHR_SWAPCHAIN_NAME.to_owned(),
            c"VK_KHR_ray_tracing_pipeline".to_owned(),
        ];
        assert!(!supports_required_extensions(&candidate, &required));
    }

    #[test]
    fn extension_check_passes_with_nothing_required() {
        let candidate = candidate(1, QueueFlags::GRAPHICS);
        assert!(supports_required_extensions(&candidate, &[]));
    }
}
