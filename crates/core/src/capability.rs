//! Render device kinds and worker capability matching.
//!
//! A task requests a device class; a worker advertises what it has. The
//! matching rule lives here so the claim query in the repository layer and
//! the worker agent agree on what "compatible" means.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Device class
// ---------------------------------------------------------------------------

/// Device class a task wants to render on.
///
/// Stored as TEXT in the `tasks` and `jobs` tables using the uppercase
/// wire names below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderDevice {
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "GPU")]
    Gpu,
    /// Whatever the claiming worker has; GPU preferred when present.
    #[serde(rename = "ANY")]
    Any,
}

impl RenderDevice {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderDevice::Cpu => "CPU",
            RenderDevice::Gpu => "GPU",
            RenderDevice::Any => "ANY",
        }
    }
}

impl fmt::Display for RenderDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderDevice {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CPU" => Ok(RenderDevice::Cpu),
            "GPU" => Ok(RenderDevice::Gpu),
            "ANY" => Ok(RenderDevice::Any),
            other => Err(CoreError::Validation(format!(
                "Unknown render device: {other} (expected CPU, GPU, or ANY)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Capability matching
// ---------------------------------------------------------------------------

/// Hardware a worker reported at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    pub cpu_threads: i32,
    pub gpu_count: i32,
    pub platform: String,
}

/// Whether a worker with `gpu_count` GPUs may claim a task requesting
/// `device`.
///
/// CPU and ANY tasks run anywhere; GPU tasks need at least one GPU.
pub fn device_supported(device: RenderDevice, gpu_count: i32) -> bool {
    match device {
        RenderDevice::Gpu => gpu_count > 0,
        RenderDevice::Cpu | RenderDevice::Any => true,
    }
}

/// Resolve the device a worker should actually render on.
///
/// ANY resolves to GPU when the worker has one, otherwise CPU.
pub fn resolve_device(requested: RenderDevice, gpu_count: i32) -> RenderDevice {
    match requested {
        RenderDevice::Any if gpu_count > 0 => RenderDevice::Gpu,
        RenderDevice::Any => RenderDevice::Cpu,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn cpu_task_runs_anywhere() {
        assert!(device_supported(RenderDevice::Cpu, 0));
        assert!(device_supported(RenderDevice::Cpu, 2));
    }

    #[test]
    fn gpu_task_needs_a_gpu() {
        assert!(!device_supported(RenderDevice::Gpu, 0));
        assert!(device_supported(RenderDevice::Gpu, 1));
    }

    #[test]
    fn any_task_runs_anywhere() {
        assert!(device_supported(RenderDevice::Any, 0));
    }

    #[test]
    fn any_resolves_to_gpu_when_present() {
        assert_eq!(resolve_device(RenderDevice::Any, 1), RenderDevice::Gpu);
        assert_eq!(resolve_device(RenderDevice::Any, 0), RenderDevice::Cpu);
    }

    #[test]
    fn explicit_device_is_never_rewritten() {
        assert_eq!(resolve_device(RenderDevice::Cpu, 4), RenderDevice::Cpu);
        assert_eq!(resolve_device(RenderDevice::Gpu, 0), RenderDevice::Gpu);
    }

    #[test]
    fn round_trips_through_str() {
        for device in [RenderDevice::Cpu, RenderDevice::Gpu, RenderDevice::Any] {
            assert_eq!(device.as_str().parse::<RenderDevice>().unwrap(), device);
        }
    }

    #[test]
    fn unknown_device_is_a_validation_error() {
        assert_matches!(
            "TPU".parse::<RenderDevice>(),
            Err(CoreError::Validation(_))
        );
    }
}
