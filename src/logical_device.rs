use std::{collections::HashSet, ops::Deref, rc::Rc};

use anyhow::{Context, Result};
use ash::{
    vk::{DeviceCreateInfo, DeviceQueueCreateInfo, PhysicalDevice, PhysicalDeviceFeatures, Queue},
    Device,
};
use tracing::debug;

use crate::{error::InitError, queue_families::QueueFamilyIndices, InitConfig, Instance};

/// Application-facing interface to the selected physical device. Exclusively
/// owns its role-bound queue handles; created once after selection and
/// destroyed exactly once at shutdown (after the swapchain it backs).
pub struct LogicalDevice {
    device: Device,
    graphics_queue: Queue,
    present_queue: Queue,
    indices: QueueFamilyIndices,
    // keeps the instance alive until we are dropped
    _instance: Rc<Instance>,
}

impl LogicalDevice {
    /// Creates the device with one queue-creation request per unique family
    /// among the resolved roles, each asking for a single queue at priority
    /// 1.0. When graphics and present share a family, one request covers
    /// both roles and both handles come from sub-index 0.
    pub fn new(
        instance: &Rc<Instance>,
        physical_device: &PhysicalDevice,
        indices: QueueFamilyIndices,
        config: &InitConfig,
    ) -> Result<Self> {
        let (graphics_family, present_family) = indices
            .pair()
            .context("queue family roles must be resolved before device creation")?;

        let unique_queue_families = HashSet::from([graphics_family, present_family]);
        debug!(
            "Creating logical device with queue families {:?}",
            unique_queue_families
        );

        let queue_priorities = [1.0f32];
        let queue_create_infos = unique_queue_families
            .into_iter()
            .map(|queue_family_index| {
                DeviceQueueCreateInfo::default()
                    .queue_family_index(queue_family_index)
                    .queue_priorities(&queue_priorities)
            })
            .collect::<Vec<_>>();

        let physical_device_features = PhysicalDeviceFeatures::default();

        let extension_name_ptrs = config
            .device_extensions
            .iter()
            .map(|extension_name| extension_name.as_ptr())
            .collect::<Vec<_>>();

        let device_create_info = DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_features(&physical_device_features)
            .enabled_extension_names(&extension_name_ptrs);

        let device = unsafe { instance.create_device(*physical_device, &device_create_info, None) }
            .map_err(InitError::LogicalDeviceCreationFailed)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            indices,
            _instance: Rc::clone(instance),
        })
    }

    pub fn graphics_queue(&self) -> Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> Queue {
        self.present_queue
    }

    pub fn queue_family_indices(&self) -> &QueueFamilyIndices {
        &self.indices
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) }
    }
}

impl Deref for LogicalDevice {
    type Target = Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
