/// Rolling frame-rate estimate.
///
/// Accumulates frame deltas and, once at least `window` seconds have been
/// accumulated, yields the average frames-per-second over that span and starts
/// over.
#[derive(Debug, Clone)]
pub struct FrameStats {
    window: f32,
    accumulated: f32,
    frames: u32,
}

impl FrameStats {
    /// One-second reporting window.
    pub fn new() -> Self {
        Self::with_window(1.0)
    }

    pub fn with_window(window: f32) -> Self {
        debug_assert!(window > 0.0);
        Self {
            window,
            accumulated: 0.0,
            frames: 0,
        }
    }

    /// Records one frame of `dt` seconds. Returns the average FPS when a window
    /// elapses, resetting the accumulator.
    pub fn record(&mut self, dt: f32) -> Option<f32> {
        self.accumulated += dt;
        self.frames += 1;

        if self.accumulated < self.window {
            return None;
        }

        let fps = self.frames as f32 / self.accumulated;
        self.accumulated = 0.0;
        self.frames = 0;
        Some(fps)
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats `value` rounded to `digits` significant digits, without exponent.
///
/// `59.94` → `"60"`, `144.2` → `"140"`, `7.53` → `"7.5"`, `0.5` → `"0.50"`.
pub fn format_significant(value: f32, digits: u32) -> String {
    if !value.is_finite() || value == 0.0 || digits == 0 {
        return format!("{value}");
    }

    let value = value as f64;
    let mut magnitude = value.abs().log10().floor() as i32;
    let scale = 10f64.powi(digits as i32 - 1 - magnitude);
    let rounded = (value * scale).round() / scale;
    // Rounding may carry into the next power of ten (9.96 -> 10).
    if rounded.abs() >= 10f64.powi(magnitude + 1) {
        magnitude += 1;
    }

    let decimals = (digits as i32 - 1 - magnitude).max(0) as usize;
    format!("{rounded:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_report_before_window_elapses() {
        let mut stats = FrameStats::new();
        for _ in 0..59 {
            assert_eq!(stats.record(1.0 / 60.0), None);
        }
        assert_eq!(stats.frames(), 59);
    }

    #[test]
    fn reports_average_and_resets() {
        let mut stats = FrameStats::new();
        let mut report = None;
        for _ in 0..4 {
            report = stats.record(0.25);
        }
        assert_eq!(report, Some(4.0));
        assert_eq!(stats.frames(), 0);
        assert_eq!(stats.accumulated(), 0.0);
    }

    #[test]
    fn long_frame_reports_immediately() {
        let mut stats = FrameStats::new();
        assert_eq!(stats.record(2.0), Some(0.5));
    }

    #[test]
    fn significant_digits() {
        assert_eq!(format_significant(59.94, 2), "60");
        assert_eq!(format_significant(144.2, 2), "140");
        assert_eq!(format_significant(7.53, 2), "7.5");
        assert_eq!(format_significant(0.5, 2), "0.50");
        assert_eq!(format_significant(30.0, 2), "30");
    }

    #[test]
    fn rounding_carry_keeps_digit_count() {
        assert_eq!(format_significant(9.96, 2), "10");
        assert_eq!(format_significant(0.999, 2), "1.0");
        assert_eq!(format_significant(99.7, 2), "100");
    }

    #[test]
    fn slow_frames_report_true_rate() {
        let mut stats = FrameStats::new();
        assert_eq!(stats.record(0.6), None);
        let fps = stats.record(0.6).unwrap();
        assert!((fps - 2.0 / 1.2).abs() < 1e-4, "fps = {fps}");
    }
}
