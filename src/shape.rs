// shape.rs — Work shapes and dispatch planning.
//
// A kernel launch is described host-side by a global shape (how many
// work-items) and an optional local shape (how they group). wgpu dispatches
// whole workgroups whose size is fixed in the shader by `@workgroup_size`,
// so planning turns (global, local, declared) into a workgroup count:
//
//   local given : global must divide evenly by local, and local must equal
//                 the declared workgroup size. count = global / local.
//   local absent: count = ceil(global / declared). The trailing workgroup
//                 may run past the global extent; kernels guard with
//
//                   if gid.x >= n { return; }
//
// Everything here is pure arithmetic so it is tested without a device. It
// runs before any enqueue, which is what lets `Task::execute` reject a bad
// shape without touching the queue.

use std::fmt;

use crate::error::{ComputeError, Result};

/// N-dimensional extent (rank 1–3) of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkShape {
    dims: [u32; 3],
    rank: u8,
}

impl WorkShape {
    pub fn d1(x: u32) -> Self {
        WorkShape { dims: [x, 1, 1], rank: 1 }
    }

    pub fn d2(x: u32, y: u32) -> Self {
        WorkShape { dims: [x, y, 1], rank: 2 }
    }

    pub fn d3(x: u32, y: u32, z: u32) -> Self {
        WorkShape { dims: [x, y, z], rank: 3 }
    }

    pub fn rank(&self) -> usize {
        self.rank as usize
    }

    /// Extents padded with 1 to three dimensions.
    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    /// Total number of work-items.
    pub fn total(&self) -> u64 {
        self.dims.iter().map(|&d| d as u64).product()
    }
}

impl From<u32> for WorkShape {
    fn from(x: u32) -> Self {
        WorkShape::d1(x)
    }
}

impl From<(u32, u32)> for WorkShape {
    fn from((x, y): (u32, u32)) -> Self {
        WorkShape::d2(x, y)
    }
}

impl From<(u32, u32, u32)> for WorkShape {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        WorkShape::d3(x, y, z)
    }
}

impl fmt::Display for WorkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.dims[..self.rank()];
        let parts: Vec<String> = d.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join("×"))
    }
}

/// Workgroup counts for one `dispatch_workgroups` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPlan {
    pub workgroups: [u32; 3],
    /// The workgroup size the kernel runs with.
    pub local: [u32; 3],
}

/// Plan a dispatch of `global` work-items for a kernel declaring
/// `declared` as its `@workgroup_size`.
///
/// `max_workgroups` is the device's `max_compute_workgroups_per_dimension`.
///
/// # Errors
/// `WorkShape` for zero extents, rank mismatch, indivisible or
/// non-matching local shapes, and counts above the device limit.
pub fn plan_dispatch(
    global: WorkShape,
    local: Option<WorkShape>,
    declared: [u32; 3],
    max_workgroups: u32,
) -> Result<DispatchPlan> {
    if global.dims.contains(&0) {
        return Err(ComputeError::WorkShape(format!(
            "global shape {global} has a zero extent"
        )));
    }

    let workgroups = match local {
        Some(local) => {
            if local.rank != global.rank {
                return Err(ComputeError::WorkShape(format!(
                    "local shape {local} has rank {} but global shape {global} has rank {}",
                    local.rank, global.rank
                )));
            }
            if local.dims.contains(&0) {
                return Err(ComputeError::WorkShape(format!(
                    "local shape {local} has a zero extent"
                )));
            }
            for axis in 0..3 {
                if global.dims[axis] % local.dims[axis] != 0 {
                    return Err(ComputeError::WorkShape(format!(
                        "global extent {} in dimension {axis} is not divisible by local extent {}",
                        global.dims[axis], local.dims[axis]
                    )));
                }
            }
            if local.dims != declared {
                return Err(ComputeError::WorkShape(format!(
                    "local shape {local} differs from the kernel's @workgroup_size({}, {}, {})",
                    declared[0], declared[1], declared[2]
                )));
            }
            [
                global.dims[0] / local.dims[0],
                global.dims[1] / local.dims[1],
                global.dims[2] / local.dims[2],
            ]
        }
        None => [
            global.dims[0].div_ceil(declared[0]),
            global.dims[1].div_ceil(declared[1]),
            global.dims[2].div_ceil(declared[2]),
        ],
    };

    if let Some(axis) = workgroups.iter().position(|&n| n > max_workgroups) {
        return Err(ComputeError::WorkShape(format!(
            "{} workgroups in dimension {axis} exceeds the device limit of {max_workgroups}",
            workgroups[axis]
        )));
    }

    Ok(DispatchPlan { workgroups, local: declared })
}
