use std::{
    ffi::{CString, FromBytesUntilNulError},
    ops::Deref,
};

use anyhow::Result;
use ash::{
    ext::debug_utils,
    vk::{
        make_api_version, ApplicationInfo, DebugUtilsMessengerEXT, InstanceCreateInfo,
        API_VERSION_1_3,
    },
    Entry,
};
use tracing::debug;

use crate::{debug::get_debug_messenger_create_info, error::InitError, InitConfig};

const API_VERSION: u32 = API_VERSION_1_3;

/// Root connection to the Vulkan driver. Owns the optional debug messenger
/// so that it is destroyed before the instance that created it. One per
/// application, alive for the whole process.
pub struct Instance {
    debug_messenger: Option<(debug_utils::Instance, DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    entry: Entry,
}

impl Instance {
    /// Creates the instance. Verifies the requested validation layers are
    /// installed before any creation call is made, registers the platform's
    /// required extensions (plus debug utils when validation is on), and
    /// installs the debug messenger when validation is on.
    pub fn new(entry: Entry, required_extensions: Vec<&str>, config: &InitConfig) -> Result<Self> {
        if config.validation {
            let available = available_layers(&entry)?;
            check_layer_support(&config.validation_layers, &available)?;
        }

        let appname = CString::new(env!("CARGO_PKG_NAME"))?;
        let version_major = env!("CARGO_PKG_VERSION_MAJOR").parse::<u32>()?;
        let version_minor = env!("CARGO_PKG_VERSION_MINOR").parse::<u32>()?;
        let version_patch = env!("CARGO_PKG_VERSION_PATCH").parse::<u32>()?;
        let app_version = make_api_version(0, version_major, version_minor, version_patch);

        let app_info = ApplicationInfo::default()
            .application_name(&appname)
            .application_version(app_version)
            .api_version(API_VERSION)
            .engine_name(&appname)
            .engine_version(app_version);

        let mut enabled_extension_names = required_extensions
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;
        if config.validation {
            enabled_extension_names.push(debug_utils::NAME.to_owned());
        }
        let enabled_extension_name_ptrs = enabled_extension_names
            .iter()
            .map(|extension_name| extension_name.as_ptr())
            .collect::<Vec<_>>();

        let enabled_layer_names = if config.validation {
            config.validation_layers.clone()
        } else {
            Vec::new()
        };
        debug!("Layers to enable: {:?}", enabled_layer_names);
        let enabled_layer_name_ptrs = enabled_layer_names
            .iter()
            .map(|layer_name| layer_name.as_ptr())
            .collect::<Vec<_>>();

        let mut debug_messenger_create_info = get_debug_messenger_create_info();

        let mut instance_create_info = InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extension_name_ptrs)
            .enabled_layer_names(&enabled_layer_name_ptrs);
        if config.validation {
            // covers the create/destroy instance calls, which the messenger
            // created below cannot observe
            instance_create_info = instance_create_info.push_next(&mut debug_messenger_create_info);
        }

        let instance = unsafe { entry.create_instance(&instance_create_info, None) }
            .map_err(InitError::InstanceCreationFailed)?;

        let mut this = Self {
            debug_messenger: None,
            instance,
            entry,
        };
        if config.validation {
            let loader = debug_utils::Instance::new(&this.entry, &this.instance);
            let messenger = unsafe {
                loader.create_debug_utils_messenger(&get_debug_messenger_create_info(), None)
            }
            .map_err(InitError::Vulkan)?;
            this.debug_messenger = Some((loader, messenger));
        }

        Ok(this)
    }

    pub fn get_entry(&self) -> &Entry {
        &self.entry
    }
}

fn available_layers(entry: &Entry) -> Result<Vec<CString>> {
    let layer_properties =
        unsafe { entry.enumerate_instance_layer_properties() }.map_err(InitError::Vulkan)?;
    let names = layer_properties
        .iter()
        .map(|layer| Ok(layer.layer_name_as_c_str()?.to_owned()))
        .collect::<Result<Vec<_>, FromBytesUntilNulError>>()?;
    Ok(names)
}

/// Every requested layer must appear in the available list (exact string
/// match, order independent) or instance creation is refused up front.
fn check_layer_support(requested: &[CString], available: &[CString]) -> Result<(), InitError> {
    for layer_name in requested {
        if !available.contains(layer_name) {
            return Err(InitError::LayerUnavailable(
                layer_name.to_string_lossy().into_owned(),
            ));
        }
    }
    Ok(())
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some((loader, messenger)) = self.debug_messenger.take() {
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
        unsafe { self.instance.destroy_instance(None) }
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}
