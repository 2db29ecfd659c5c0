use std::{ffi::CStr, rc::Rc};

use anyhow::Result;
use ash::Entry;
use hello_vulkan::{
    init_logging, physical_device, pipeline, queue_families, InitConfig, Instance, LogicalDevice,
    Surface, Swapchain, SwapchainSupport,
};
use tracing::{error, info};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    raw_window_handle::HasDisplayHandle,
    window::{Window, WindowBuilder, WindowButtons},
};

#[cfg(feature = "enable_validations")]
const ENABLE_VALIDATIONS: bool = true;
#[cfg(not(feature = "enable_validations"))]
const ENABLE_VALIDATIONS: bool = false;

fn main() {
    // initialization failures are deterministic capability mismatches, so
    // report and bail instead of retrying
    if let Err(error) = run() {
        error!("initialization failed: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_logging()?;

    let config = InitConfig::new(ENABLE_VALIDATIONS);
    let event_loop = EventLoop::new()?;
    let mut app = App::new(&event_loop, config)?;
    app.run(event_loop)?;

    Ok(())
}

/// Owns every initialization product. Field order doubles as teardown
/// order: the swapchain goes first, the instance and window last.
struct App {
    /// Swapchain plus its image views
    _swapchain: Swapchain,
    /// The logical device for interfacing with the physical hardware
    device: Rc<LogicalDevice>,
    /// The rendering surface bound to the window
    _surface: Surface,
    /// The instance for interacting with Vulkan core
    _instance: Rc<Instance>,
    /// The actual window presented to the user; must outlive the surface
    _window: Window,
}

impl App {
    pub fn new(event_loop: &EventLoop<()>, config: InitConfig) -> Result<Self> {
        let required_extensions =
            ash_window::enumerate_required_extensions(event_loop.display_handle()?.as_raw())?
                .iter()
                .map(|extension| unsafe { CStr::from_ptr(*extension) }.to_str())
                .collect::<Result<Vec<_>, _>>()?;

        let window = Self::init_window(event_loop, &config)?;

        let entry = Entry::linked();
        let instance = Rc::new(Instance::new(entry, required_extensions, &config)?);
        let surface = Surface::new(&instance, &window)?;

        let candidates = physical_device::enumerate(&instance)?;
        let candidate = physical_device::pick(candidates, |candidate| {
            physical_device::is_suitable(candidate, &surface, &config)
        })?;
        let indices = queue_families::find_queue_families(&candidate.queue_families, |family| {
            surface.get_physical_device_surface_support(&candidate.device, family)
        })?;
        info!(
            "Selected device with graphics family {:?}, present family {:?}",
            indices.graphics, indices.present
        );

        let device = Rc::new(LogicalDevice::new(
            &instance,
            &candidate.device,
            indices,
            &config,
        )?);

        // queried again on purpose: selection filtering and swapchain
        // configuration are separate phases and do not share a result
        let support = SwapchainSupport::query(&surface, &candidate.device)?;
        let swapchain_config = support.negotiate(config.preferred_extent())?;
        let swapchain = Swapchain::new(
            &instance,
            &device,
            &surface,
            &support,
            &swapchain_config,
            &indices,
        )?;

        pipeline::configure(&device, swapchain.extent(), &config)?;

        Ok(Self {
            _swapchain: swapchain,
            device,
            _surface: surface,
            _instance: instance,
            _window: window,
        })
    }

    pub fn run(&mut self, event_loop: EventLoop<()>) -> Result<()> {
        event_loop.set_control_flow(ControlFlow::Wait);
        event_loop.run(move |event, elwt| match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                window_id: _,
            } => {
                elwt.exit();
            }
            Event::LoopExiting => {
                info!("Window closed, shutting down");
                // let vulkan finish up before teardown begins
                if let Err(error) = unsafe { self.device.device_wait_idle() } {
                    error!("device_wait_idle failed during shutdown: {error}");
                }
            }
            _ => {}
        })?;
        Ok(())
    }

    /// Creates the window that the surface will be bound to
    fn init_window(event_loop: &EventLoop<()>, config: &InitConfig) -> Result<Window> {
        let window = WindowBuilder::new()
            .with_inner_size(PhysicalSize::<u32>::from((
                config.window_width,
                config.window_height,
            )))
            .with_resizable(false)
            .with_enabled_buttons(WindowButtons::CLOSE)
            .with_active(true)
            .with_title(&config.window_title)
            .build(event_loop)?;
        Ok(window)
    }
}
