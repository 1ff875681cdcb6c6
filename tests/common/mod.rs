// tests/common/mod.rs — Device context for the device-backed suites.
//
// The default config enumerates every backend, so a software adapter
// (llvmpipe over GL or Vulkan) is enough. A machine with no adapter at all
// fails these suites unless GRIDLINE_SKIP_GPU_TESTS=1 is set, in which case
// each test prints a skip note and returns.

use gridline::DeviceContext;

const SKIP_VAR: &str = "GRIDLINE_SKIP_GPU_TESTS";

fn skip_requested() -> bool {
    std::env::var(SKIP_VAR).is_ok_and(|v| matches!(v.trim(), "1" | "true" | "yes"))
}

pub fn context() -> Option<DeviceContext> {
    match DeviceContext::create() {
        Ok(ctx) => Some(ctx),
        Err(e) if skip_requested() => {
            eprintln!("skipping ({SKIP_VAR} set): {e}");
            None
        }
        Err(e) => panic!("no device context: {e}; set {SKIP_VAR}=1 to skip device tests"),
    }
}
