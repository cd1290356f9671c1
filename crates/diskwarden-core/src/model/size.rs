/// Human-readable formatting for result descriptions.
///
/// All internal sizes are `u64` bytes. Floating point is only used at the
/// display boundary.
use std::time::{Duration, SystemTime};

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Format a byte count with binary units labelled KB/MB/GB/TB.
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}

/// Format a count with thousand separators: `1204` → `1,204`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole days elapsed since `then`, or `None` if it lies in the future.
pub fn age_days(then: SystemTime, now: SystemTime) -> Option<u64> {
    now.duration_since(then)
        .ok()
        .map(|d: Duration| d.as_secs() / 86_400)
}

/// "1 file" / "1,204 files".
pub fn files_phrase(count: u64) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", format_count(count))
    }
}
