//! Purpose: Small text helpers for log lines and data inspection.
//! Exports: timestamp, duration, number, OS-error, and hex-dump formatting.
//! Role: Pure formatting; never touches the sink or the host.

use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Seconds since the Unix epoch as a float, for cheap interval math in
/// log lines.
pub fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// RFC 3339 rendering of a [`timestamp`] value. Out-of-range input
/// renders a placeholder rather than failing.
pub fn timestamp_string(seconds: f64) -> String {
    let nanos = (seconds * 1e9) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|moment| moment.format(&Rfc3339).ok())
        .unwrap_or_else(|| "<invalid time>".to_string())
}

/// Compact duration rendering: `H:MM:SS.mmm`, `M:SS.mmm`, or `S.mmm s`.
pub fn elapsed_string(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let secs = (total_ms / 1000) % 60;
    let mins = (total_ms / 60_000) % 60;
    let hours = total_ms / 3_600_000;
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}.{ms:03}")
    } else if mins > 0 {
        format!("{mins}:{secs:02}.{ms:03}")
    } else {
        format!("{secs}.{ms:03}s")
    }
}

/// Thousands-grouped rendering of a count.
pub fn comma_separated(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Human-readable text for a raw OS error code.
pub fn os_error_string(code: i32) -> String {
    std::io::Error::from_raw_os_error(code).to_string()
}

/// Multi-line hex dump: 16 bytes per row, offset column, optional ASCII
/// gutter with non-printable bytes shown as `.`.
pub fn hex_dump(data: &[u8], show_ascii: bool) -> String {
    use std::fmt::Write;
    const ROW: usize = 16;
    let mut out = String::new();
    for (row, chunk) in data.chunks(ROW).enumerate() {
        let _ = write!(out, "{:08x}:", row * ROW);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        if show_ascii {
            for _ in chunk.len()..ROW {
                out.push_str("   ");
            }
            out.push_str("  |");
            for byte in chunk {
                let ch = if byte.is_ascii_graphic() || *byte == b' ' {
                    *byte as char
                } else {
                    '.'
                };
                out.push(ch);
            }
            out.push('|');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{comma_separated, elapsed_string, hex_dump, os_error_string, timestamp_string};

    #[test]
    fn timestamp_renders_rfc3339() {
        let rendered = timestamp_string(0.0);
        assert_eq!(rendered, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn absurd_timestamp_renders_placeholder() {
        assert_eq!(timestamp_string(1e30), "<invalid time>");
    }

    #[test]
    fn elapsed_picks_the_shortest_form() {
        assert_eq!(elapsed_string(0.25), "0.250s");
        assert_eq!(elapsed_string(75.0), "1:15.000");
        assert_eq!(elapsed_string(3661.5), "1:01:01.500");
    }

    #[test]
    fn comma_grouping() {
        assert_eq!(comma_separated(0), "0");
        assert_eq!(comma_separated(999), "999");
        assert_eq!(comma_separated(1000), "1,000");
        assert_eq!(comma_separated(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn os_error_text_is_nonempty() {
        assert!(!os_error_string(1).is_empty());
    }

    #[test]
    fn hex_dump_rows_and_ascii_gutter() {
        let dump = hex_dump(b"hello, plugin world!", true);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000: 68 65 6c 6c 6f"));
        assert!(lines[0].ends_with("|hello, plugin wo|"));
        assert!(lines[1].starts_with("00000010: 72 6c 64 21"));
        assert!(lines[1].ends_with("|rld!|"));
    }

    #[test]
    fn hex_dump_without_ascii_is_bare() {
        let dump = hex_dump(&[0x00, 0xff], false);
        assert_eq!(dump, "00000000: 00 ff\n");
    }
}
