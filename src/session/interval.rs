/// Largest interval a periodic timer accepts, in milliseconds
pub const MAX_INTERVAL_MS: u64 = i32::MAX as u64;

/// Turn the interval control's text into an effective interval in milliseconds
///
/// Non-numeric, non-finite and below-floor values resolve to the floor.
/// Fractional milliseconds are truncated.
pub fn resolve_interval(input: &str, floor_ms: u64) -> u64 {
    match input.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= floor_ms as f64 => {
            (value.trunc() as u64).clamp(floor_ms, MAX_INTERVAL_MS.max(floor_ms))
        }
        _ => floor_ms,
    }
}
