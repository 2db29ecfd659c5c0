use std::{ops::Deref, rc::Rc};

use anyhow::Result;
use ash::{
    khr::surface,
    vk::{PhysicalDevice, PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR, SurfaceKHR},
};
use winit::{
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::Window,
};

use crate::{error::InitError, Instance};

/// A window's presentable drawing target. The windowing collaborator
/// (winit + ash-window) owns the actual platform surface creation; this
/// wrapper owns the handle and answers the per-device capability queries
/// the selection and negotiation stages need.
pub struct Surface {
    surface_fn: surface::Instance,
    surface_ptr: SurfaceKHR,
    // keeps the instance alive until we are dropped
    _instance: Rc<Instance>,
}

impl Surface {
    pub fn new(instance: &Rc<Instance>, window: &Window) -> Result<Self> {
        let surface_fn = surface::Instance::new(instance.get_entry(), instance);
        let surface_ptr = unsafe {
            ash_window::create_surface(
                instance.get_entry(),
                instance,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )
        }
        .map_err(InitError::SurfaceCreationFailed)?;
        Ok(Self {
            surface_fn,
            surface_ptr,
            _instance: Rc::clone(instance),
        })
    }

    pub fn get_physical_device_surface_capabilities(
        &self,
        physical_device: &PhysicalDevice,
    ) -> Result<SurfaceCapabilitiesKHR, InitError> {
        let capabilities = unsafe {
            self.surface_fn
                .get_physical_device_surface_capabilities(*physical_device, self.surface_ptr)
        }?;
        Ok(capabilities)
    }

    pub fn get_physical_device_surface_formats(
        &self,
        physical_device: &PhysicalDevice,
    ) -> Result<Vec<SurfaceFormatKHR>, InitError> {
        let formats = unsafe {
            self.surface_fn
                .get_physical_device_surface_formats(*physical_device, self.surface_ptr)
        }?;
        Ok(formats)
    }

    pub fn get_physical_device_surface_present_modes(
        &self,
        physical_device: &PhysicalDevice,
    ) -> Result<Vec<PresentModeKHR>, InitError> {
        let modes = unsafe {
            self.surface_fn
                .get_physical_device_surface_present_modes(*physical_device, self.surface_ptr)
        }?;
        Ok(modes)
    }

    /// Whether the given queue family of the given device can present to
    /// this surface. Queried per family during queue resolution.
    pub fn get_physical_device_surface_support(
        &self,
        physical_device: &PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool, InitError> {
        let supported = unsafe {
            self.surface_fn.get_physical_device_surface_support(
                *physical_device,
                queue_family_index,
                self.surface_ptr,
            )
        }?;
        Ok(supported)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.surface_fn.destroy_surface(self.surface_ptr, None) }
    }
}

impl Deref for Surface {
    type Target = SurfaceKHR;

    fn deref(&self) -> &Self::Target {
        &self.surface_ptr
    }
}
