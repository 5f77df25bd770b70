//! Compute device resolution
//!
//! Picks the best usable backend for inference in fixed priority order:
//! CUDA, then Metal (Apple Silicon), then CPU. A backend that is
//! physically present but not supported by the compiled inference
//! engine is demoted to the next one, never surfaced as an error.

use std::fmt;
use std::path::Path;
use std::sync::Once;

/// Acceleration backend, in demotion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Cuda,
    Metal,
    Cpu,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cuda => "cuda",
            Backend::Metal => "metal",
            Backend::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric precision used for inference on the chosen backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Float16,
    Float32,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Float16 => "float16",
            Precision::Float32 => "float32",
        }
    }
}

/// The device a model bundle was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub backend: Backend,
    pub precision: Precision,
}

impl ResolvedDevice {
    pub fn cpu() -> Self {
        Self {
            backend: Backend::Cpu,
            precision: Precision::Float32,
        }
    }

    /// Whether the whisper context should be created with GPU offload
    pub fn use_gpu(&self) -> bool {
        self.backend != Backend::Cpu
    }
}

/// Hardware that is physically present on this machine
#[derive(Debug, Clone, Copy)]
pub struct BackendProbe {
    pub cuda_present: bool,
    pub metal_present: bool,
}

impl BackendProbe {
    pub fn detect() -> Self {
        Self {
            cuda_present: nvidia_driver_present(),
            metal_present: cfg!(target_os = "macos") && cfg!(target_arch = "aarch64"),
        }
    }
}

/// Backends the compiled inference engine can actually drive.
///
/// This set is a property of the library build, so it must be asked
/// fresh on every resolution rather than cached next to the probe.
#[derive(Debug, Clone, Copy)]
pub struct EngineSupport {
    pub cuda: bool,
    pub metal: bool,
}

impl EngineSupport {
    pub fn current() -> Self {
        Self {
            cuda: cfg!(feature = "cuda"),
            metal: cfg!(all(target_os = "macos", target_arch = "aarch64")),
        }
    }
}

fn nvidia_driver_present() -> bool {
    if cfg!(target_os = "linux") {
        Path::new("/proc/driver/nvidia/version").exists()
    } else {
        false
    }
}

static LOG_DEVICE_ONCE: Once = Once::new();

/// Resolve the best usable device for inference.
///
/// Logs the chosen device once per process; mutates nothing else.
pub fn resolve_device() -> ResolvedDevice {
    let resolved = resolve_with(BackendProbe::detect(), EngineSupport::current());
    LOG_DEVICE_ONCE.call_once(|| {
        tracing::info!(
            "Using {} for inference ({})",
            resolved.backend,
            resolved.precision.as_str()
        );
    });
    resolved
}

/// Resolution policy, separated from hardware probing for testability
pub fn resolve_with(probe: BackendProbe, support: EngineSupport) -> ResolvedDevice {
    if probe.cuda_present {
        if support.cuda {
            return ResolvedDevice {
                backend: Backend::Cuda,
                precision: Precision::Float16,
            };
        }
        tracing::debug!("CUDA device present but engine build lacks CUDA support, demoting");
    }

    if probe.metal_present {
        if support.metal {
            return ResolvedDevice {
                backend: Backend::Metal,
                precision: Precision::Float32,
            };
        }
        tracing::debug!("Metal device present but engine build lacks Metal support, demoting");
    }

    ResolvedDevice::cpu()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_cuda_when_supported() {
        let device = resolve_with(
            BackendProbe {
                cuda_present: true,
                metal_present: false,
            },
            EngineSupport {
                cuda: true,
                metal: false,
            },
        );
        assert_eq!(device.backend, Backend::Cuda);
        assert_eq!(device.precision, Precision::Float16);
    }

    #[test]
    fn demotes_unsupported_cuda_to_metal() {
        let device = resolve_with(
            BackendProbe {
                cuda_present: true,
                metal_present: true,
            },
            EngineSupport {
                cuda: false,
                metal: true,
            },
        );
        assert_eq!(device.backend, Backend::Metal);
        assert_eq!(device.precision, Precision::Float32);
    }

    #[test]
    fn falls_back_to_cpu_without_error() {
        let device = resolve_with(
            BackendProbe {
                cuda_present: true,
                metal_present: true,
            },
            EngineSupport {
                cuda: false,
                metal: false,
            },
        );
        assert_eq!(device.backend, Backend::Cpu);
        assert_eq!(device.precision, Precision::Float32);
    }

    #[test]
    fn cpu_when_nothing_present() {
        let device = resolve_with(
            BackendProbe {
                cuda_present: false,
                metal_present: false,
            },
            EngineSupport {
                cuda: true,
                metal: true,
            },
        );
        assert_eq!(device, ResolvedDevice::cpu());
        assert!(!device.use_gpu());
    }
}
