// error.rs — Crate-wide error type.
//
// Every public operation returns `Result<T, ComputeError>`. The variants
// fall into three groups:
//
//   Setup       : NoDevice, DeviceRequest, Config
//   Caller input: Compile, UnknownEntryPoint, ShapeMismatch, ArgumentBinding,
//                 WorkShape, AccessMode, UnsupportedFormat, CapacityExceeded
//   Device      : DeviceExecution
//
// Caller-input errors are always raised before anything is enqueued on the
// device, so they are fully recoverable by fixing the call. Nothing here is
// retried automatically.

use thiserror::Error;

use crate::format::{ElementFormat, HostAccess};

/// Errors produced by context creation, allocation, compilation and dispatch.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// No adapter satisfies the selection policy.
    #[error("no compute device matches the selection policy: {reason}")]
    NoDevice { reason: String },

    /// The adapter was found but refused to create a device.
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Kernel source failed to parse or validate. `log` is the full
    /// diagnostic as rendered by the compiler, including line:column markers.
    #[error("kernel compilation failed:\n{log}")]
    Compile { log: String },

    #[error("unknown entry point `{name}` (available: {})", available.join(", "))]
    UnknownEntryPoint { name: String, available: Vec<String> },

    /// Host data does not match the declared shape of a memory object.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A bound argument does not match the kernel's parameter at `position`.
    #[error("argument {position} of `{entry_point}`: {reason}")]
    ArgumentBinding {
        entry_point: String,
        position: usize,
        reason: String,
    },

    #[error("invalid work shape: {0}")]
    WorkShape(String),

    /// `operation` is not allowed by the object's declared host access.
    #[error("{operation} not permitted on a memory object declared host-{access}")]
    AccessMode {
        access: HostAccess,
        operation: &'static str,
    },

    #[error("element format {0} has no device texture format")]
    UnsupportedFormat(ElementFormat),

    /// Allocation exceeds a device limit.
    #[error("{what} of {requested} exceeds the device limit of {max}")]
    CapacityExceeded {
        what: &'static str,
        requested: u64,
        max: u64,
    },

    /// The device reported a failure during or after a kernel run or transfer.
    #[error("device execution failed: {0}")]
    DeviceExecution(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ComputeError>;
