//! Byte size formatting and conversion utilities
//!
//! Shared by download progress reporting and disk usage output.

/// One megabyte in bytes.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Format bytes into a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Convert a byte count to fractional megabytes
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

/// Convert megabytes to bytes, saturating on overflow
pub fn mb_to_bytes(mb: f64) -> u64 {
    if mb <= 0.0 {
        return 0;
    }
    (mb * BYTES_PER_MB as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(BYTES_PER_MB), 1.0);
        assert_eq!(bytes_to_mb(0), 0.0);
        assert!((bytes_to_mb(BYTES_PER_MB / 2) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mb_to_bytes() {
        assert_eq!(mb_to_bytes(1.0), BYTES_PER_MB);
        assert_eq!(mb_to_bytes(0.0), 0);
        assert_eq!(mb_to_bytes(-5.0), 0);
    }
}
