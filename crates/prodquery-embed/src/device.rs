use candle_core::Device;
use tracing::info;

/// Metal when built with the `metal` feature and a GPU is present, else CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(dev) => {
            info!(device = "metal", "selected compute device");
            return dev;
        }
        Err(e) => tracing::warn!(error = %e, "metal unavailable, falling back to CPU"),
    }
    info!(device = "cpu", "selected compute device");
    Device::Cpu
}
