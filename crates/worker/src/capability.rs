//! Host hardware detection.
//!
//! Gathers what the worker advertises at registration: CPU thread count,
//! GPU count and model via NVML, platform, and hostname.
//!
//! NVML initialisation is gracefully optional -- a host without NVIDIA
//! drivers registers as a CPU-only worker instead of panicking.

use nvml_wrapper::Nvml;

/// Hardware snapshot taken at worker startup.
#[derive(Debug, Clone)]
pub struct HostCapabilities {
    pub hostname: String,
    pub platform: String,
    pub cpu_threads: i32,
    pub gpu_count: i32,
    /// Model name of GPU 0, when any GPU is present.
    pub gpu_model: Option<String>,
}

/// Probe the host hardware.
pub fn detect() -> HostCapabilities {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let cpu_threads = std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(1);

    let (gpu_count, gpu_model) = detect_gpus();

    HostCapabilities {
        hostname,
        platform: platform_name().to_string(),
        cpu_threads,
        gpu_count,
        gpu_model,
    }
}

/// Count NVIDIA GPUs and name the first one.
///
/// Returns `(0, None)` when NVML is unavailable (missing drivers, no
/// NVIDIA hardware, etc.).
fn detect_gpus() -> (i32, Option<String>) {
    let nvml = match Nvml::init() {
        Ok(nvml) => nvml,
        Err(e) => {
            tracing::warn!(error = %e, "NVML unavailable, registering as CPU-only");
            return (0, None);
        }
    };

    let count = match nvml.device_count() {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "Failed to query GPU device count");
            return (0, None);
        }
    };

    let model = nvml
        .device_by_index(0)
        .ok()
        .and_then(|device| device.name().ok());

    (count as i32, model)
}

/// OS/architecture label matching the `tools.platform` column, e.g.
/// `linux-x86_64`.
pub fn platform_name() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => "linux-x86_64",
        ("linux", "aarch64") => "linux-aarch64",
        ("macos", "x86_64") => "macos-x86_64",
        ("macos", "aarch64") => "macos-aarch64",
        ("windows", _) => "windows-x86_64",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_reports_at_least_one_cpu_thread() {
        let caps = detect();
        assert!(caps.cpu_threads >= 1);
    }

    #[test]
    fn gpu_model_requires_a_gpu() {
        let caps = detect();
        if caps.gpu_count == 0 {
            assert!(caps.gpu_model.is_none());
        }
    }

    #[test]
    fn platform_name_is_known() {
        assert_ne!(platform_name(), "");
    }
}
