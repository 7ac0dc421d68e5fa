use std::sync::Arc;

use wgpu::{
    Adapter, AdapterInfo, Backend, Backends, Device, DeviceDescriptor, DeviceType, Features, Instance,
    InstanceDescriptor, Limits, PowerPreference, PresentMode, Queue, Surface, SurfaceConfiguration, TextureFormat,
    TextureUsages,
};

use crate::RendererInitializationError;

/// Features the deferred pipeline can't run without.
pub const REQUIRED_FEATURES: Features = Features::empty();

/// Features used when the adapter has them.
pub const OPTIONAL_FEATURES: Features = Features::from_bits_truncate(
    Features::ADDRESS_MODE_CLAMP_TO_BORDER.bits()
        | Features::POLYGON_MODE_LINE.bits()
        | Features::TEXTURE_COMPRESSION_BC.bits(),
);

/// Limits needed by the G-Buffer, light gather and post passes.
pub fn required_limits() -> Limits {
    Limits {
        // point lights, spot lights, cluster ranges, cluster indices
        max_storage_buffers_per_shader_stage: 4,
        max_storage_textures_per_shader_stage: 1,
        max_compute_invocations_per_workgroup: 256,
        max_compute_workgroup_size_x: 16,
        max_compute_workgroup_size_y: 16,
        ..Limits::downlevel_defaults()
    }
}

/// Check that all required features are present in the feature set given, returning the features to enable.
pub fn check_features(device: Features) -> Result<Features, RendererInitializationError> {
    let missing = REQUIRED_FEATURES - device;
    if !missing.is_empty() {
        return Err(RendererInitializationError::MissingDeviceFeatures { features: missing });
    }
    Ok(REQUIRED_FEATURES | (OPTIONAL_FEATURES & device))
}

/// Container for Instance/Adapter/Device/Queue.
///
/// Create these yourself, or call [`create_iad`].
pub struct InstanceAdapterDevice {
    pub instance: Arc<Instance>,
    pub adapter: Arc<Adapter>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub info: AdapterInfo,
}

pub fn create_instance(desired_backend: Option<Backend>) -> Instance {
    let backends = match desired_backend {
        Some(backend) => Backends::from(backend),
        None => Backends::PRIMARY | Backends::GL,
    };
    Instance::new(InstanceDescriptor {
        backends,
        ..Default::default()
    })
}

fn device_type_rank(ty: DeviceType, power_preference: PowerPreference) -> u8 {
    match (ty, power_preference) {
        (DeviceType::DiscreteGpu, PowerPreference::LowPower) => 1,
        (DeviceType::IntegratedGpu, PowerPreference::LowPower) => 0,
        (DeviceType::DiscreteGpu, _) => 0,
        (DeviceType::IntegratedGpu, _) => 1,
        (DeviceType::VirtualGpu, _) => 2,
        (DeviceType::Cpu, _) => 3,
        (DeviceType::Other, _) => 4,
    }
}

/// Picks the best adapter that can present to `compatible_surface` and opens a device on it.
pub async fn create_iad(
    instance: Instance,
    power_preference: PowerPreference,
    compatible_surface: Option<&Surface<'_>>,
) -> Result<InstanceAdapterDevice, RendererInitializationError> {
    profiling::scope!("create_iad");

    let limits = required_limits();
    let mut candidates = Vec::new();
    for (idx, adapter) in instance.enumerate_adapters(Backends::all()).into_iter().enumerate() {
        let info = adapter.get_info();
        log::debug!("Adapter {}: {:#?}", idx, info);

        if let Some(surface) = compatible_surface {
            if !adapter.is_surface_supported(surface) {
                log::debug!("Adapter can't present to the surface");
                continue;
            }
        }
        let features = match check_features(adapter.features()) {
            Ok(features) => features,
            Err(e) => {
                log::debug!("Adapter not usable: {}", e);
                continue;
            }
        };
        if !limits.check_limits(&adapter.limits()) {
            log::debug!("Adapter not usable: limits too low");
            continue;
        }
        candidates.push((adapter, info, features));
    }

    candidates.sort_by_key(|(_, info, _)| device_type_rank(info.device_type, power_preference));

    let (adapter, info, features) = candidates
        .into_iter()
        .next()
        .ok_or(RendererInitializationError::MissingAdapter)?;

    log::info!("Chosen adapter: {} ({:?})", info.name, info.backend);
    log::debug!("Chosen features: {:#?}", features);

    let (device, queue) = adapter
        .request_device(
            &DeviceDescriptor {
                label: None,
                required_features: features,
                required_limits: limits,
            },
            None,
        )
        .await
        .map_err(RendererInitializationError::RequestDeviceFailed)?;

    Ok(InstanceAdapterDevice {
        instance: Arc::new(instance),
        adapter: Arc::new(adapter),
        device: Arc::new(device),
        queue: Arc::new(queue),
        info,
    })
}

/// Logs GPU errors that no [`DeviceErrorScope`](crate::util::error_scope::DeviceErrorScope)
/// caught, replacing wgpu's default handler which panics.
pub fn log_uncaptured_errors(device: &Device) {
    device.on_uncaptured_error(Box::new(report_uncaptured_error));
}

fn report_uncaptured_error(error: wgpu::Error) {
    log::error!("Uncaptured GPU error: {}", error);
}

/// Configures `surface` for rendering, preferring an sRGB format.
pub fn configure_surface(
    surface: &Surface<'_>,
    adapter: &Adapter,
    device: &Device,
    width: u32,
    height: u32,
    vsync: bool,
) -> SurfaceConfiguration {
    let caps = surface.get_capabilities(adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(TextureFormat::is_srgb)
        .or_else(|| caps.formats.first().copied())
        .unwrap_or(TextureFormat::Bgra8UnormSrgb);

    let config = SurfaceConfiguration {
        usage: TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: match vsync {
            true => PresentMode::AutoVsync,
            false => PresentMode::AutoNoVsync,
        },
        desired_maximum_frame_latency: 2,
        alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: Vec::new(),
    };
    surface.configure(device, &config);
    config
}

#[cfg(test)]
mod tests {
    use wgpu::{DeviceType, Features, PowerPreference};

    use super::*;

    #[test]
    fn optional_features_are_kept_only_when_present() {
        let enabled = check_features(Features::POLYGON_MODE_LINE | Features::SHADER_F64).unwrap();
        assert_eq!(enabled, Features::POLYGON_MODE_LINE);
        assert_eq!(check_features(Features::empty()).unwrap(), Features::empty());
    }

    #[test]
    fn power_preference_orders_adapters() {
        let low = |ty| device_type_rank(ty, PowerPreference::LowPower);
        let high = |ty| device_type_rank(ty, PowerPreference::HighPerformance);
        assert!(low(DeviceType::IntegratedGpu) < low(DeviceType::DiscreteGpu));
        assert!(high(DeviceType::DiscreteGpu) < high(DeviceType::IntegratedGpu));
        assert!(high(DeviceType::Cpu) > high(DeviceType::VirtualGpu));
    }

    #[test]
    fn uncaptured_errors_are_only_logged() {
        report_uncaptured_error(wgpu::Error::Validation {
            source: Box::new(std::io::Error::new(std::io::ErrorKind::Other, "index range out of bounds")),
            description: String::from("index range out of bounds"),
        });
    }
}
