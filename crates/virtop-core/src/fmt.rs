//! Formatting helpers for table cells.
//!
//! All pure formatting (no ratatui styles, no layout) lives here so the rate
//! engine can render cells without depending on the front end.

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const TIB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

/// Format a byte count with binary units.
///
/// `"512 B"`, `"50.0 KiB"`, `"100.3 MiB"`, `"1.5 GiB"`
pub fn format_bytes(bytes: u64) -> String {
    let f = bytes as f64;
    if f >= TIB {
        format!("{:.1} TiB", f / TIB)
    } else if f >= GIB {
        format!("{:.1} GiB", f / GIB)
    } else if f >= MIB {
        format!("{:.1} MiB", f / MIB)
    } else if f >= KIB {
        format!("{:.1} KiB", f / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a bytes-per-second rate with binary units.
///
/// Negative or sub-byte rates render as `"0 B/s"`.
pub fn format_bytes_rate(rate: f64) -> String {
    if !(rate >= 1.0) {
        return "0 B/s".to_string();
    }
    if rate >= GIB {
        format!("{:.1} GiB/s", rate / GIB)
    } else if rate >= MIB {
        format!("{:.1} MiB/s", rate / MIB)
    } else if rate >= KIB {
        format!("{:.1} KiB/s", rate / KIB)
    } else {
        format!("{:.0} B/s", rate)
    }
}

/// Format a percentage with two decimals, e.g. `"12.50%"`.
pub fn format_percent(pct: f64) -> String {
    format!("{:.2}%", pct)
}

/// Join a read/write (or rx/tx) pair the way the table shows it.
pub fn format_pair(a: &str, b: &str) -> String {
    format!("{} / {}", a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.0 GiB");
    }

    #[test]
    fn rates_clamp_small_and_negative_values() {
        assert_eq!(format_bytes_rate(0.0), "0 B/s");
        assert_eq!(format_bytes_rate(-10.0), "0 B/s");
        assert_eq!(format_bytes_rate(f64::NAN), "0 B/s");
        assert_eq!(format_bytes_rate(100.0), "100 B/s");
        assert_eq!(format_bytes_rate(1024.0 * 1024.0 * 3.0), "3.0 MiB/s");
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(50.0), "50.00%");
        assert_eq!(format_percent(3.14159), "3.14%");
    }
}
