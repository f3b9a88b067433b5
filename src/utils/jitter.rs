//! Lightweight jitter for retry backoff
//!
//! Uses the system clock's sub-second nanoseconds as pseudo-randomness so
//! concurrent replicas retrying a failed upstream do not line up.

use std::time::{SystemTime, UNIX_EPOCH};

/// Pseudo-random value in `0..=max_jitter_ms`
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);

    nanos % (max_jitter_ms + 1)
}

/// Pseudo-random value in `0..=base_value * jitter_percent / 100`
///
/// ```
/// use location_cache::utils::jitter::generate_jitter_percent;
///
/// let jitter = generate_jitter_percent(1000, 25);
/// assert!(jitter <= 250);
/// ```
pub fn generate_jitter_percent(base_value: u64, jitter_percent: u8) -> u64 {
    if jitter_percent == 0 || base_value == 0 {
        return 0;
    }

    let max_jitter = base_value.saturating_mul(jitter_percent as u64) / 100;
    generate_jitter_ms(max_jitter)
}
