//! Shared formatting helpers for plan and dashboard display.
//!
//! All functions are pure: one numeric (or string) input, one display string out.
//! Plan formatters use fixed unit thresholds; absent optional values render as `"-"`.

/// Placeholder for absent optional values.
pub const ABSENT: &str = "-";

// ---------------------------------------------------------------------------
// Plan formatters
// ---------------------------------------------------------------------------

/// Format a duration given in milliseconds.
///
/// `0.5` -> `"500.00 µs"`, `12.3` -> `"12.30 ms"`, `1500.0` -> `"1.50 s"`
pub fn format_time(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.2} µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.2} ms", ms)
    } else {
        format!("{:.2} s", ms / 1000.0)
    }
}

/// Format a planner cost estimate.
///
/// `500.0` -> `"500.00"`, `25000.0` -> `"25.0K"`, `3_200_000.0` -> `"3.2M"`
pub fn format_cost(cost: f64) -> String {
    if cost < 1000.0 {
        format!("{:.2}", cost)
    } else if cost < 1_000_000.0 {
        format!("{:.1}K", cost / 1000.0)
    } else {
        format!("{:.1}M", cost / 1_000_000.0)
    }
}

/// Format a row (or block) count.
///
/// `999.0` -> `"999"`, `2500.0` -> `"2.5K"`, `2_500_000.0` -> `"2.5M"`
pub fn format_rows(rows: f64) -> String {
    if rows < 1000.0 {
        format!("{:.0}", rows)
    } else if rows < 1_000_000.0 {
        format!("{:.1}K", rows / 1000.0)
    } else {
        format!("{:.1}M", rows / 1_000_000.0)
    }
}

/// [`format_time`] or `"-"` for `None`.
pub fn format_opt_time(ms: Option<f64>) -> String {
    ms.map(format_time).unwrap_or_else(|| ABSENT.to_string())
}

/// [`format_rows`] or `"-"` for `None`.
pub fn format_opt_rows(rows: Option<f64>) -> String {
    rows.map(format_rows).unwrap_or_else(|| ABSENT.to_string())
}

// ---------------------------------------------------------------------------
// Dashboard formatters
// ---------------------------------------------------------------------------

/// Format byte count as human-readable size: `"1.5 GiB"`, `"100.3 MiB"`, `"512 B"`.
pub fn format_bytes(bytes: u64) -> String {
    let f = bytes as f64;
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1} GiB", f / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", f / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", f / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a cumulative counter for table columns: `"9999"`, `"12.3K"`, `"4.1M"`, `"2.0G"`.
pub fn format_count(v: i64) -> String {
    if v >= 1_000_000_000 {
        format!("{:.1}G", v as f64 / 1e9)
    } else if v >= 1_000_000 {
        format!("{:.1}M", v as f64 / 1e6)
    } else if v >= 10_000 {
        format!("{:.1}K", v as f64 / 1e3)
    } else {
        v.to_string()
    }
}

/// Format a percentage with one decimal, `"-"` for `None`.
pub fn format_percent(pct: Option<f64>) -> String {
    match pct {
        Some(v) => format!("{:.1}%", v),
        None => ABSENT.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Text normalization
// ---------------------------------------------------------------------------

/// Truncate string to at most `max_chars` characters, ending with `…` when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Collapse query text onto one line: newlines and tabs become spaces,
/// runs of spaces collapse to one.
pub fn normalize_for_display(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        let ch = match ch {
            '\n' | '\t' => ' ',
            '\r' => continue,
            other => other,
        };
        if ch == ' ' {
            if !prev_space {
                result.push(ch);
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_sub_millisecond_uses_microseconds() {
        assert_eq!(format_time(0.5), "500.00 µs");
        assert_eq!(format_time(0.0), "0.00 µs");
    }

    #[test]
    fn time_tiers() {
        assert_eq!(format_time(1.0), "1.00 ms");
        assert_eq!(format_time(999.99), "999.99 ms");
        assert_eq!(format_time(1000.0), "1.00 s");
        assert_eq!(format_time(1500.0), "1.50 s");
    }

    #[test]
    fn cost_tiers() {
        assert_eq!(format_cost(500.0), "500.00");
        assert_eq!(format_cost(999.5), "999.50");
        assert_eq!(format_cost(25000.0), "25.0K");
        assert_eq!(format_cost(1_000_000.0), "1.0M");
    }

    #[test]
    fn rows_tiers() {
        assert_eq!(format_rows(0.0), "0");
        assert_eq!(format_rows(999.0), "999");
        assert_eq!(format_rows(2500.0), "2.5K");
        assert_eq!(format_rows(2_500_000.0), "2.5M");
    }

    #[test]
    fn absent_values_render_dash() {
        assert_eq!(format_opt_time(None), "-");
        assert_eq!(format_opt_rows(None), "-");
        assert_eq!(format_percent(None), "-");
        assert_eq!(format_opt_time(Some(2.0)), "2.00 ms");
        assert_eq!(format_opt_rows(Some(12.0)), "12");
    }

    #[test]
    fn bytes_and_counts() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
        assert_eq!(format_count(9999), "9999");
        assert_eq!(format_count(12_345), "12.3K");
        assert_eq!(format_count(4_100_000), "4.1M");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("µµµµµ", 3), "µµ…");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(
            normalize_for_display("SELECT *\n\tFROM  t\r\n WHERE x = 1 "),
            "SELECT * FROM t WHERE x = 1"
        );
    }
}
