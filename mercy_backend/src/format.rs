//! Display helpers shared by the status renderer and the chat host.

use chrono::{DateTime, Local};

use crate::error::{Result, TrackerError};

/// Glyphs and width used by [`format_progress_bar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarStyle {
    pub length: usize,
    pub filled: String,
    pub empty: String,
}

impl Default for BarStyle {
    fn default() -> Self {
        Self {
            length: 10,
            filled: "▰".to_string(),
            empty: "▱".to_string(),
        }
    }
}

/// Render `progress` (clamped to 0..=1) as `"▰▰▰▱▱▱▱▱▱▱ 30%"`.
pub fn format_progress_bar(progress: f64, style: &BarStyle) -> String {
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };

    let filled_length = (style.length as f64 * progress) as usize;
    let empty_length = style.length - filled_length;
    let percentage = (progress * 100.0) as u32;

    format!(
        "{}{} {}%",
        style.filled.repeat(filled_length),
        style.empty.repeat(empty_length),
        percentage
    )
}

pub fn validate_amount(amount: u64, min: u64, max: u64) -> bool {
    (min..=max).contains(&amount)
}

/// Parse a user-typed amount and check it against the inclusive bounds.
pub fn parse_amount(text: &str, min: u64, max: u64) -> Result<u64> {
    let amount: u64 = text
        .trim()
        .parse()
        .map_err(|_| TrackerError::Validation("Please enter a valid number.".to_string()))?;

    if !validate_amount(amount, min, max) {
        return Err(TrackerError::Validation(format!(
            "Invalid amount. Must be between {} and {}.",
            min, max
        )));
    }
    Ok(amount)
}

pub fn format_number_with_commas(number: u64) -> String {
    let digits = number.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn calculate_percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (current as f64 / total as f64) * 100.0
}

/// Cut `text` to at most `max_length` characters, ending in `...` when cut.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Trim and drop characters that would break chat markdown.
pub fn sanitize_input(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !matches!(c, '`' | '*' | '_'))
        .collect()
}

pub fn format_time_ago(then: DateTime<Local>, now: DateTime<Local>) -> String {
    let seconds = (now - then).num_seconds();

    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        format!("{} minute{} ago", minutes, plural(minutes))
    } else if seconds < 86_400 {
        let hours = seconds / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else {
        let days = seconds / 86_400;
        format!("{} day{} ago", days, plural(days))
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub fn rarity_emoji(rarity: &str) -> &'static str {
    match rarity.to_ascii_lowercase().as_str() {
        "legendary" => "🟡",
        "mythical" => "🔴",
        "epic" => "🟣",
        "rare" => "🔵",
        "uncommon" => "🟢",
        "common" => "⚪",
        _ => "⚫",
    }
}

/// Emoji for a counter key; primal sub-counters share the primal glyph.
pub fn shard_emoji(category: &str) -> &'static str {
    let category = category.to_ascii_lowercase();
    let shard = category.split('_').next().unwrap_or("");
    match shard {
        "ancient" => "🔵",
        "void" => "🟣",
        "sacred" => "🟡",
        "primal" => "🔴",
        "remnant" => "⚫",
        _ => "🔘",
    }
}

/// `"primal_legendary"` -> `"Primal Legendary"`
pub fn category_label(category: &str) -> String {
    category
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Discord-style snowflake: 17 to 20 digits.
pub fn validate_user_id(user_id: &str) -> bool {
    match user_id.trim().parse::<u64>() {
        Ok(id) => (10u64.pow(16)..=10u64.pow(19)).contains(&id),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn progress_bar_fills_proportionally() {
        let style = BarStyle::default();
        assert_eq!(format_progress_bar(0.5, &style), "▰▰▰▰▰▱▱▱▱▱ 50%");
        assert_eq!(format_progress_bar(0.0, &style), "▱▱▱▱▱▱▱▱▱▱ 0%");
    }

    #[test]
    fn progress_bar_clamps_out_of_range() {
        let style = BarStyle::default();
        assert_eq!(format_progress_bar(1.7, &style), "▰▰▰▰▰▰▰▰▰▰ 100%");
        assert_eq!(format_progress_bar(-0.2, &style), "▱▱▱▱▱▱▱▱▱▱ 0%");
        assert_eq!(format_progress_bar(f64::NAN, &style), "▱▱▱▱▱▱▱▱▱▱ 0%");
    }

    #[test]
    fn progress_bar_respects_custom_style() {
        let style = BarStyle {
            length: 4,
            filled: "#".to_string(),
            empty: "-".to_string(),
        };
        assert_eq!(format_progress_bar(0.75, &style), "###- 75%");
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        assert!(validate_amount(1, 1, 500));
        assert!(validate_amount(500, 1, 500));
        assert!(!validate_amount(0, 1, 500));
        assert!(!validate_amount(501, 1, 500));
    }

    #[test]
    fn parse_amount_rejections() {
        assert_eq!(parse_amount(" 42 ", 1, 500).unwrap(), 42);

        let err = parse_amount("ten", 1, 500).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid number.");

        let err = parse_amount("-3", 1, 500).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid number.");

        let err = parse_amount("900", 1, 500).unwrap_err();
        assert_eq!(err.to_string(), "Invalid amount. Must be between 1 and 500.");
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number_with_commas(0), "0");
        assert_eq!(format_number_with_commas(999), "999");
        assert_eq!(format_number_with_commas(1000), "1,000");
        assert_eq!(format_number_with_commas(1_234_567), "1,234,567");
    }

    #[test]
    fn percentage_handles_zero_total() {
        assert_eq!(calculate_percentage(5, 0), 0.0);
        assert_eq!(calculate_percentage(6, 12), 50.0);
    }

    #[test]
    fn truncation_is_char_aware() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("▰▰▰▰▰▰▰▰", 6), "▰▰▰...");
    }

    #[test]
    fn sanitize_strips_markdown() {
        assert_eq!(sanitize_input("  **sacred_shard** `x` "), "sacredshard x");
    }

    #[test]
    fn time_ago_buckets() {
        let now = Local::now();
        assert_eq!(format_time_ago(now - Duration::seconds(10), now), "just now");
        assert_eq!(format_time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_time_ago(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(format_time_ago(now - Duration::days(2), now), "2 days ago");
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1_500_000), "1.4 MB");
    }

    #[test]
    fn labels_and_emoji() {
        assert_eq!(category_label("primal_legendary"), "Primal Legendary");
        assert_eq!(category_label("sacred"), "Sacred");
        assert_eq!(shard_emoji("primal_mythical"), "🔴");
        assert_eq!(shard_emoji("Void"), "🟣");
        assert_eq!(shard_emoji("mystery"), "🔘");
        assert_eq!(rarity_emoji("Legendary"), "🟡");
        assert_eq!(rarity_emoji("unknown"), "⚫");
    }

    #[test]
    fn user_id_validation() {
        assert!(validate_user_id("123456789012345678"));
        assert!(!validate_user_id("12345"));
        assert!(!validate_user_id("not-a-number"));
    }
}
