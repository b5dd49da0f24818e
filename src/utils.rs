//! Clock and output geometry helpers

use std::time::Duration;

use smithay::utils::{Logical, Physical, Size, Transform};

/// Current `CLOCK_MONOTONIC` time, the clock frame callbacks are timestamped with.
pub fn get_monotonic_time() -> Duration {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: clock_gettime only writes into the timespec we hand it.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

/// Logical size of an output mode once scale and transform are applied.
///
/// A 2560x1440 mode at scale 2 yields 1280x720; a 90 degree transform then
/// swaps width and height.
pub fn effective_resolution(
    mode_size: Size<i32, Physical>,
    scale: f64,
    transform: Transform,
) -> Size<i32, Logical> {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let logical = transform.transform_size(mode_size.to_f64().to_logical(scale));
    Size::from((logical.w.round() as i32, logical.h.round() as i32))
}

/// Refresh interval of a mode given in mHz. `None` for unknown refresh rates.
pub fn refresh_interval(refresh_mhz: i32) -> Option<Duration> {
    let refresh = u64::try_from(refresh_mhz).ok().filter(|r| *r > 0)?;
    Some(Duration::from_nanos(1_000_000_000_000 / refresh))
}
