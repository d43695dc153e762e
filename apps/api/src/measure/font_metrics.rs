//! Approximate font metrics for the CV template fonts.
//!
//! Widths are in em units and grouped by character class rather than per
//! glyph. That is coarse, but a section height estimate only needs the line
//! count right, and a class table is within a few percent of real shaping
//! for Latin body text. Non-ASCII falls back to the family's average width.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Font family enum
// ────────────────────────────────────────────────────────────────────────────

/// Font families offered by the CV templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    /// Modern template: humanist sans-serif.
    Inter,
    /// Classic template: old-style serif.
    EbGaramond,
    /// Professional template: geometric humanist sans-serif.
    Lato,
    /// Bold template: condensed display sans-serif.
    Oswald,
    /// ATS-safe template: traditional TeX face.
    ComputerModern,
}

impl std::str::FromStr for FontFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inter" => Ok(FontFamily::Inter),
            "eb_garamond" | "garamond" => Ok(FontFamily::EbGaramond),
            "lato" => Ok(FontFamily::Lato),
            "oswald" => Ok(FontFamily::Oswald),
            "computer_modern" | "cm" => Ok(FontFamily::ComputerModern),
            other => Err(format!("unknown font family '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Metric table
// ────────────────────────────────────────────────────────────────────────────

/// Per-class advance widths for one family, in em.
#[derive(Debug)]
pub struct FontMetricTable {
    pub font: FontFamily,
    /// i l j . , ; : ' ! | and similar.
    pub narrow: f32,
    /// Remaining lowercase letters.
    pub lowercase: f32,
    /// Uppercase letters other than M and W.
    pub uppercase: f32,
    /// m w M W @ % &.
    pub wide: f32,
    pub digit: f32,
    pub space: f32,
    /// Fallback for punctuation outside the classes above and for non-ASCII.
    pub average: f32,
}

impl FontMetricTable {
    fn char_width(&self, c: char) -> f32 {
        match c {
            ' ' => self.space,
            'i' | 'l' | 'j' | 'I' | 'f' | 't' | 'r' | '.' | ',' | ';' | ':' | '\'' | '!' | '|' => {
                self.narrow
            }
            'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' => self.wide,
            'a'..='z' => self.lowercase,
            'A'..='Z' => self.uppercase,
            '0'..='9' => self.digit,
            _ => self.average,
        }
    }

    /// Rendered width of a string in em.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c)).sum()
    }

    /// Lines `s` occupies when greedily word-wrapped at `max_width_em`.
    ///
    /// Empty or whitespace-only text takes no lines. A single word wider than
    /// the line still counts as one line (it would overflow horizontally).
    pub fn wrapped_lines(&self, s: &str, max_width_em: f32) -> u32 {
        let mut words = s.split_whitespace();
        let Some(first) = words.next() else {
            return 0;
        };
        let mut lines = 1u32;
        let mut current = self.measure_str(first);
        for word in words {
            let word_w = self.measure_str(word);
            if current + self.space + word_w > max_width_em {
                lines += 1;
                current = word_w;
            } else {
                current += self.space + word_w;
            }
        }
        lines
    }
}

static INTER: FontMetricTable = FontMetricTable {
    font: FontFamily::Inter,
    narrow: 0.27,
    lowercase: 0.55,
    uppercase: 0.68,
    wide: 0.86,
    digit: 0.60,
    space: 0.25,
    average: 0.52,
};

static EB_GARAMOND: FontMetricTable = FontMetricTable {
    font: FontFamily::EbGaramond,
    narrow: 0.24,
    lowercase: 0.45,
    uppercase: 0.62,
    wide: 0.74,
    digit: 0.46,
    space: 0.21,
    average: 0.44,
};

static LATO: FontMetricTable = FontMetricTable {
    font: FontFamily::Lato,
    narrow: 0.26,
    lowercase: 0.53,
    uppercase: 0.66,
    wide: 0.83,
    digit: 0.58,
    space: 0.26,
    average: 0.55,
};

static OSWALD: FontMetricTable = FontMetricTable {
    font: FontFamily::Oswald,
    narrow: 0.20,
    lowercase: 0.37,
    uppercase: 0.43,
    wide: 0.58,
    digit: 0.42,
    space: 0.17,
    average: 0.35,
};

static COMPUTER_MODERN: FontMetricTable = FontMetricTable {
    font: FontFamily::ComputerModern,
    narrow: 0.28,
    lowercase: 0.50,
    uppercase: 0.72,
    wide: 0.83,
    digit: 0.50,
    space: 0.33,
    average: 0.47,
};

/// Returns the static metric table for a family.
pub fn get_metrics(font: FontFamily) -> &'static FontMetricTable {
    match font {
        FontFamily::Inter => &INTER,
        FontFamily::EbGaramond => &EB_GARAMOND,
        FontFamily::Lato => &LATO,
        FontFamily::Oswald => &OSWALD,
        FontFamily::ComputerModern => &COMPUTER_MODERN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_str_empty_returns_zero() {
        assert_eq!(get_metrics(FontFamily::Inter).measure_str(""), 0.0);
    }

    #[test]
    fn test_measure_str_uses_character_classes() {
        let m = get_metrics(FontFamily::Inter);
        // "Mil" = wide + narrow + narrow
        let width = m.measure_str("Mil");
        assert!((width - (0.86 + 0.27 + 0.27)).abs() < 1e-4, "got {width}");
    }

    #[test]
    fn test_non_ascii_falls_back_to_average() {
        let m = get_metrics(FontFamily::Lato);
        assert!((m.measure_str("é") - m.average).abs() < 1e-6);
    }

    #[test]
    fn test_wrapped_lines_blank_is_zero() {
        assert_eq!(get_metrics(FontFamily::Inter).wrapped_lines("   ", 40.0), 0);
    }

    #[test]
    fn test_wrapped_lines_short_text_is_one_line() {
        let m = get_metrics(FontFamily::Inter);
        assert_eq!(m.wrapped_lines("Built the billing pipeline", 40.0), 1);
    }

    #[test]
    fn test_wrapped_lines_long_text_wraps() {
        let m = get_metrics(FontFamily::Inter);
        let text = "word ".repeat(60);
        let lines = m.wrapped_lines(&text, 40.0);
        // "word" = 0.86 + 0.55 + 0.27 + 0.55 = 2.23em, plus a 0.25 space → 16 words per 40em line.
        assert!((4..=5).contains(&lines), "got {lines}");
    }

    #[test]
    fn test_condensed_family_wraps_less() {
        let text = "Designed and operated a multi-region event ingestion platform ".repeat(10);
        let inter = get_metrics(FontFamily::Inter).wrapped_lines(&text, 40.0);
        let oswald = get_metrics(FontFamily::Oswald).wrapped_lines(&text, 40.0);
        assert!(oswald < inter, "oswald {oswald} should wrap less than inter {inter}");
    }

    #[test]
    fn test_font_family_from_str() {
        assert_eq!("Inter".parse::<FontFamily>(), Ok(FontFamily::Inter));
        assert_eq!("garamond".parse::<FontFamily>(), Ok(FontFamily::EbGaramond));
        assert!("comic_sans".parse::<FontFamily>().is_err());
    }
}
