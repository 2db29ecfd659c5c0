use ash::vk::{QueueFamilyProperties, QueueFlags};

use crate::error::InitError;

/// The queue family indices the pipeline needs, resolved once per device and
/// immutable afterwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family capable of running graphics commands.
    pub graphics: Option<u32>,
    /// Family capable of presenting to the target surface.
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// True once every role the pipeline needs has a family.
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both resolved indices, or None while incomplete.
    pub fn pair(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.present?))
    }
}

/// Resolves queue roles against the device's families, in device-reported
/// index order. Both roles are first-fit and resolved independently: a
/// family supporting graphics and presentation at once is not preferred over
/// two separate families. `supports_present` is the per-family surface query
/// supplied by the windowing side. Iteration stops as soon as every role has
/// an index.
pub fn find_queue_families<F>(
    families: &[QueueFamilyProperties],
    mut supports_present: F,
) -> Result<QueueFamilyIndices, InitError>
where
    F: FnMut(u32) -> Result<bool, InitError>,
{
    let mut indices = QueueFamilyIndices::default();
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if indices.graphics.is_none()
            && family.queue_count > 0
            && family.queue_flags.contains(QueueFlags::GRAPHICS)
        {
            indices.graphics = Some(index);
        }
        if indices.present.is_none() && supports_present(index)? {
            indices.present = Some(index);
        }
        if indices.is_complete() {
            break;
        }
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(queue_count: u32, queue_flags: QueueFlags) -> QueueFamilyProperties {
        QueueFamilyProperties {
            queue_count,
            queue_flags,
            ..Default::default()
        }
    }

    #[test]
    fn graphics_is_first_fit() {
        let families = [
            family(1, QueueFlags::COMPUTE),
            family(1, QueueFlags::GRAPHICS),
            family(1, QueueFlags::GRAPHICS | QueueFlags::COMPUTE),
        ];
        let indices = find_queue_families(&families, |_| Ok(false)).unwrap();
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, None);
        assert!(!indices.is_complete());
    }

    #[test]
    fn families_with_no_queues_are_skipped() {
        let families = [
            family(0, QueueFlags::GRAPHICS),
            family(1, QueueFlags::GRAPHICS),
        ];
        let indices = find_queue_families(&families, |_| Ok(false)).unwrap();
        assert_eq!(indices.graphics, Some(1));
    }

    #[test]
    fn roles_are_resolved_independently() {
        // family 0 does graphics, family 1 presents, family 2 does both;
        // the dual-role family must not win over the two first fits
        let families = [
            family(1, QueueFlags::GRAPHICS),
            family(1, QueueFlags::TRANSFER),
            family(1, QueueFlags::GRAPHICS),
        ];
        let indices = find_queue_families(&families, |index| Ok(index >= 1)).unwrap();
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn shared_family_resolves_both_roles() {
        let families = [family(1, QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.pair(), Some((0, 0)));
    }

    #[test]
    fn iteration_stops_once_complete() {
        let families = [
            family(1, QueueFlags::GRAPHICS),
            family(1, QueueFlags::GRAPHICS),
            family(1, QueueFlags::GRAPHICS),
        ];
        let mut queries = 0;
        let indices = find_queue_families(&families, |_| {
            queries += 1;
            Ok(true)
        })
        .unwrap();
        assert!(indices.is_complete());
        assert_eq!(queries, 1);
    }

    #[test]
    fn query_errors_propagate() {
        let families = [family(1, QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| {
            Err(InitError::Vulkan(ash::vk::Result::ERROR_SURFACE_LOST_KHR))
        });
        assert!(result.is_err());
    }
}
