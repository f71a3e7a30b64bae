//! shields.io-style coverage badges.

use serde::Serialize;

/// Lower bound (inclusive), color and label of each badge tier, best first.
const THRESHOLDS: [(f64, &str, &str); 4] = [
    (90.0, "brightgreen", "excellent"),
    (75.0, "green", "good"),
    (60.0, "yellowgreen", "acceptable"),
    (40.0, "yellow", "low"),
];

const FALLBACK: (&str, &str) = ("red", "critical");

const SHIELDS_URL: &str = "https://img.shields.io/badge";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub pct: f64,
    pub color: &'static str,
    pub label: &'static str,
    pub pct_str: String,
    pub badge_url: String,
    pub markdown: String,
}

impl Badge {
    /// CSS color used for this tier in HTML output.
    #[must_use]
    pub fn hex_color(&self) -> &'static str {
        match self.color {
            "brightgreen" => "#4c1",
            "green" => "#97ca00",
            "yellowgreen" => "#a4a61d",
            "yellow" => "#dfb317",
            "red" => "#e05d44",
            _ => "#999",
        }
    }
}

/// Map a coverage percentage onto its badge. A value exactly on a threshold
/// belongs to the higher tier.
#[must_use]
pub fn badge(pct: f64) -> Badge {
    let (color, label) = THRESHOLDS
        .iter()
        .find(|(min, _, _)| pct >= *min)
        .map(|&(_, color, label)| (color, label))
        .unwrap_or(FALLBACK);

    let pct_str = format!("{:.1}%", pct);
    let badge_url = format!("{}/coverage-{}-{}", SHIELDS_URL, shields_escape(&pct_str), color);
    let markdown = format!("![Coverage]({})", badge_url);

    Badge {
        pct,
        color,
        label,
        pct_str,
        badge_url,
        markdown,
    }
}

/// Escape text for a shields.io static badge path segment.
fn shields_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for c in text.chars() {
        match c {
            '-' => out.push_str("--"),
            '_' => out.push_str("__"),
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            _ => out.push(c),
        }
    }
    out
}
