//! Terminal styling helpers with NO_COLOR support.

/// Check if color output is enabled (respects `NO_COLOR` env var).
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Terminal style helper that respects NO_COLOR.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

impl Style {
    pub fn new() -> Self {
        Self {
            enabled: color_enabled(),
        }
    }

    /// Create a style with colors explicitly enabled (for tests).
    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    /// Create a style with colors explicitly disabled.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn code(&self, code: &'static str) -> &'static str {
        if self.enabled {
            code
        } else {
            ""
        }
    }

    pub fn dim_start(&self) -> &'static str {
        self.code("\x1b[2m")
    }

    pub fn bold_start(&self) -> &'static str {
        self.code("\x1b[1m")
    }

    pub fn red_start(&self) -> &'static str {
        self.code("\x1b[31m")
    }

    pub fn yellow_start(&self) -> &'static str {
        self.code("\x1b[33m")
    }

    pub fn green_start(&self) -> &'static str {
        self.code("\x1b[32m")
    }

    pub fn cyan_start(&self) -> &'static str {
        self.code("\x1b[36m")
    }

    pub fn reset(&self) -> &'static str {
        self.code("\x1b[0m")
    }
}

/// Approximate display width of a character.
/// CJK characters and some symbols are double-width.
fn char_width(c: char) -> usize {
    if c < ' ' {
        return 0;
    }
    if c.is_ascii() {
        return 1;
    }
    let cp = c as u32;
    if (0x1100..=0x115F).contains(&cp)       // Hangul Jamo
        || (0x2E80..=0x303E).contains(&cp)   // CJK Radicals
        || (0x3040..=0x33BF).contains(&cp)   // Hiragana, Katakana, CJK
        || (0x3400..=0x4DBF).contains(&cp)   // CJK Extension A
        || (0x4E00..=0x9FFF).contains(&cp)   // CJK Unified
        || (0xF900..=0xFAFF).contains(&cp)   // CJK Compatibility
        || (0xFE30..=0xFE6F).contains(&cp)   // CJK Compatibility Forms
        || (0xFF01..=0xFF60).contains(&cp)   // Fullwidth Forms
        || (0x1F300..=0x1FAFF).contains(&cp) // Emoji
        || (0x20000..=0x2FFFF).contains(&cp)
    // CJK Extension B+
    {
        2
    } else {
        1
    }
}

/// Visible width of plain text (no escape sequences).
pub fn text_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Shorten `s` to at most `max` columns, ending in `...` when cut.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if text_width(s) <= max {
        return s.to_string();
    }
    if max <= 3 {
        return ".".repeat(max);
    }

    let budget = max - 3;
    let mut width = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = char_width(c);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push_str("...");
    out
}
