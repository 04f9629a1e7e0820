//! Text layout and line breaking
//!
//! Paragraphs come from explicit line breaks; within a paragraph words are
//! packed greedily against the measured column width.

use crate::font_registry::{FontId, FontRegistry};

/// Width factor used when a font cannot measure a word
const APPROX_CHAR_WIDTH: f64 = 0.6;

/// Line breaker for wrapping text into a fixed-width column
pub struct LineBreaker<'a> {
    max_width: f64,
    font: FontId,
    font_size: f64,
    fonts: &'a FontRegistry,
}

impl<'a> LineBreaker<'a> {
    pub fn new(max_width: f64, font: FontId, font_size: f64, fonts: &'a FontRegistry) -> Self {
        Self {
            max_width,
            font,
            font_size,
            fonts,
        }
    }

    /// Measured width of `text`, approximated from its length when the font
    /// cannot measure it
    pub fn measure(&self, text: &str) -> f64 {
        self.fonts
            .measure(self.font, text, self.font_size)
            .unwrap_or_else(|| text.chars().count() as f64 * APPROX_CHAR_WIDTH * self.font_size)
    }

    /// Break `text` into lines. Blank paragraphs yield empty lines; a word wider
    /// than the column is placed on a line of its own.
    pub fn wrap(&self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            if paragraph.trim().is_empty() {
                lines.push(String::new());
                continue;
            }
            self.wrap_paragraph(paragraph, &mut lines);
        }
        lines
    }

    fn wrap_paragraph(&self, paragraph: &str, lines: &mut Vec<String>) {
        let space_width = self.measure(" ");
        let mut current = String::new();
        let mut current_width = 0.0;

        for word in paragraph.split_whitespace() {
            let word_width = self.measure(word);
            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
                continue;
            }
            let needed = current_width + space_width + word_width;
            if needed <= self.max_width {
                current.push(' ');
                current.push_str(word);
                current_width = needed;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_stays_on_one_line() {
        let fonts = FontRegistry::new(1000);
        let breaker = LineBreaker::new(495.0, FontId::Regular, 9.0, &fonts);
        assert_eq!(breaker.wrap("Appendectomy"), vec!["Appendectomy".to_string()]);
    }

    #[test]
    fn long_paragraph_wraps_within_width() {
        let fonts = FontRegistry::new(1000);
        let breaker = LineBreaker::new(100.0, FontId::Regular, 9.0, &fonts);
        let text = "The procedure involves general anaesthesia and carries a small risk of bleeding and infection";
        let lines = breaker.wrap(text);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(breaker.measure(line) <= 100.0, "line too wide: {}", line);
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn blank_paragraphs_are_kept() {
        let fonts = FontRegistry::new(1000);
        let breaker = LineBreaker::new(495.0, FontId::Regular, 9.0, &fonts);
        assert_eq!(
            breaker.wrap("Risks:\n\nBleeding"),
            vec!["Risks:".to_string(), String::new(), "Bleeding".to_string()]
        );
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let fonts = FontRegistry::new(1000);
        let breaker = LineBreaker::new(40.0, FontId::Regular, 9.0, &fonts);
        let lines = breaker.wrap("a Pneumonoultramicroscopicsilicovolcanoconiosis b");
        assert_eq!(
            lines,
            vec![
                "a".to_string(),
                "Pneumonoultramicroscopicsilicovolcanoconiosis".to_string(),
                "b".to_string()
            ]
        );
    }

    #[test]
    fn unmeasurable_text_is_approximated() {
        let fonts = FontRegistry::new(1000);
        let breaker = LineBreaker::new(495.0, FontId::Regular, 10.0, &fonts);
        // six Malayalam code points at 0.6 em each
        assert!((breaker.measure("ശസ്ത്ര") - 6.0 * 0.6 * 10.0).abs() < 1e-9);
    }
}
