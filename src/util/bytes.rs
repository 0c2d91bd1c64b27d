//! Human-readable rendering of byte counts.

/// Render a byte count in IEC units, keeping at most two significant
/// decimals and trimming trailing zeros.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let exponent = (UNITS.len() - 1).min((63 - bytes.leading_zeros() as usize) / 10);
    let value = bytes as f64 / (1u64 << (exponent * 10)) as f64;

    let rendered = if value >= 10.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    };
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');

    format!("{trimmed} {}", UNITS[exponent])
}
