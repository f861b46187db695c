//! Pure dimension math shared by the builtin deriver and the views.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions of an image scaled to fit within a `long_edge` square box,
/// preserving aspect ratio. Images already inside the box keep their size.
///
/// # Examples
/// ```
/// # use thyme::thumbs::calculations::fit_within;
/// assert_eq!(fit_within((4000, 3000), 1000), (1000, 750));
/// assert_eq!(fit_within((3000, 4000), 1000), (750, 1000));
/// assert_eq!(fit_within((640, 480), 1000), (640, 480));
/// ```
pub fn fit_within(source: (u32, u32), long_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= long_edge || longer == 0 {
        return (w, h);
    }
    let ratio = long_edge as f64 / longer as f64;
    if w >= h {
        (long_edge, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        (((w as f64 * ratio).round() as u32).max(1), long_edge)
    }
}

/// Aspect ratio reduced to lowest terms, e.g. 6000x4000 → 3:2.
///
/// A zero side has no meaningful ratio and is returned as-is.
pub fn reduced_aspect(width: u32, height: u32) -> (u32, u32) {
    let d = gcd(width, height);
    if d == 0 {
        return (width, height);
    }
    (width / d, height / d)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}
