// config.rs — Device selection policy and limits profile.
//
// `ContextConfig` is the only input to `DeviceContext::create_with`. It can be
// built in code or read from the environment:
//
//   GRIDLINE_DEVICE=gpu|cpu        preferred adapter class (default gpu)
//   GRIDLINE_STRICT_DEVICE=1       fail instead of falling back to any adapter
//   GRIDLINE_IMAGES=1              require storage-image support
//   GRIDLINE_LIMITS=adapter|downlevel
//   WGPU_BACKEND=vulkan,metal,...  read through wgpu's own parser
//
// LIMITS PROFILES
// ───────────────
// `Adapter` requests whatever the adapter supports. `Downlevel` requests
// wgpu's conservative downlevel defaults instead; wgpu then validates every
// allocation and dispatch against those smaller limits, so a kernel that
// would fail on a weak device fails on the development machine too.

use std::fmt;

use crate::error::{ComputeError, Result};

/// Which adapter class to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Discrete, integrated or virtual GPUs.
    #[default]
    Accelerator,
    /// Software / multi-core CPU adapters (llvmpipe, lavapipe, WARP).
    Cpu,
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Accelerator => write!(f, "accelerator"),
            DevicePreference::Cpu => write!(f, "cpu"),
        }
    }
}

/// Device limits to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitsProfile {
    /// The adapter's full limits.
    #[default]
    Adapter,
    /// `wgpu::Limits::downlevel_defaults()`.
    Downlevel,
}

impl LimitsProfile {
    /// Limits to request from an adapter that supports `supported`.
    pub fn limits(self, supported: &wgpu::Limits) -> wgpu::Limits {
        match self {
            LimitsProfile::Adapter => supported.clone(),
            LimitsProfile::Downlevel => wgpu::Limits::downlevel_defaults(),
        }
    }
}

/// Selection policy for `DeviceContext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    pub preference: DevicePreference,
    /// Take any compute-capable adapter when none of the preferred class exists.
    pub allow_fallback: bool,
    /// Only accept adapters that can bind 4×unorm8 images as storage.
    pub require_image_support: bool,
    /// Backends to enumerate. All of them by default, GL included, so a
    /// software adapter is still found on a headless machine.
    pub backends: wgpu::Backends,
    pub limits: LimitsProfile,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            preference: DevicePreference::Accelerator,
            allow_fallback: true,
            require_image_support: false,
            backends: wgpu::Backends::all(),
            limits: LimitsProfile::Adapter,
        }
    }
}

impl ContextConfig {
    /// Defaults overridden by `GRIDLINE_*` and `WGPU_BACKEND`.
    ///
    /// # Errors
    /// `Config` if a variable holds an unrecognised value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Some(backends) = wgpu::util::backend_bits_from_env() {
            config.backends = backends;
        }
        Ok(config)
    }

    /// Parse `GRIDLINE_*` settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = ContextConfig::default();

        if let Some(value) = lookup("GRIDLINE_DEVICE") {
            config.preference = match value.trim().to_ascii_lowercase().as_str() {
                "gpu" | "accelerator" => DevicePreference::Accelerator,
                "cpu" => DevicePreference::Cpu,
                other => {
                    return Err(ComputeError::Config(format!(
                        "GRIDLINE_DEVICE must be `gpu` or `cpu`, got `{other}`"
                    )))
                }
            };
        }
        if let Some(value) = lookup("GRIDLINE_STRICT_DEVICE") {
            config.allow_fallback = !parse_flag("GRIDLINE_STRICT_DEVICE", &value)?;
        }
        if let Some(value) = lookup("GRIDLINE_IMAGES") {
            config.require_image_support = parse_flag("GRIDLINE_IMAGES", &value)?;
        }
        if let Some(value) = lookup("GRIDLINE_LIMITS") {
            config.limits = match value.trim().to_ascii_lowercase().as_str() {
                "adapter" | "native" => LimitsProfile::Adapter,
                "downlevel" => LimitsProfile::Downlevel,
                other => {
                    return Err(ComputeError::Config(format!(
                        "GRIDLINE_LIMITS must be `adapter` or `downlevel`, got `{other}`"
                    )))
                }
            };
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ComputeError::Config(format!(
            "{key} must be a boolean flag, got `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = ContextConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c, ContextConfig::default());
        assert!(c.allow_fallback);
        assert_eq!(c.preference, DevicePreference::Accelerator);
        // GL carries the software adapter on headless machines.
        assert!(c.backends.contains(wgpu::Backends::GL));
        assert!(c.backends.contains(wgpu::Backends::VULKAN));
    }

    #[test]
    fn test_cpu_strict() {
        let c = ContextConfig::from_lookup(lookup(&[
            ("GRIDLINE_DEVICE", "CPU"),
            ("GRIDLINE_STRICT_DEVICE", "1"),
            ("GRIDLINE_IMAGES", "true"),
            ("GRIDLINE_LIMITS", "downlevel"),
        ]))
        .unwrap();
        assert_eq!(c.preference, DevicePreference::Cpu);
        assert!(!c.allow_fallback);
        assert!(c.require_image_support);
        assert_eq!(c.limits, LimitsProfile::Downlevel);
    }

    #[test]
    fn test_bad_values_rejected() {
        let err = ContextConfig::from_lookup(lookup(&[("GRIDLINE_DEVICE", "tpu")])).unwrap_err();
        assert!(matches!(err, ComputeError::Config(_)));
        let err =
            ContextConfig::from_lookup(lookup(&[("GRIDLINE_IMAGES", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("GRIDLINE_IMAGES"));
    }

    #[test]
    fn test_downlevel_limits_are_smaller() {
        let adapter = wgpu::Limits::default();
        assert_eq!(LimitsProfile::Adapter.limits(&adapter), adapter);
        let down = LimitsProfile::Downlevel.limits(&adapter);
        assert!(down.max_storage_buffer_binding_size <= adapter.max_storage_buffer_binding_size);
    }
}
