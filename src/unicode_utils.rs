//! Unicode utilities for consent text
//!
//! Script detection drives font selection, WinAnsi encoding feeds the built-in
//! Type1 fonts, and `clean_text` normalises free text typed into the consent
//! forms before it reaches layout.

use serde::{Deserialize, Serialize};

/// Writing systems the renderer distinguishes when choosing a font
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Latin,
    Malayalam,
}

impl Script {
    /// Unicode block owned by the script, if it needs a dedicated font
    pub fn block(self) -> Option<std::ops::RangeInclusive<u32>> {
        match self {
            Script::Latin => None,
            Script::Malayalam => Some(0x0D00..=0x0D7F),
        }
    }

    /// Returns the first non-Latin script found in `text`, or `Latin`
    pub fn detect(text: &str) -> Script {
        if contains_script(text, Script::Malayalam) {
            Script::Malayalam
        } else {
            Script::Latin
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Script::Latin => "latin",
            Script::Malayalam => "malayalam",
        }
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Check whether any character of `text` falls in the script's Unicode block
pub fn contains_script(text: &str, script: Script) -> bool {
    match script.block() {
        Some(block) => text.chars().any(|ch| block.contains(&(ch as u32))),
        None => false,
    }
}

/// Map one character to its WinAnsiEncoding byte, if it has one
pub fn winansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E => Some(code as u8),
        0xA0..=0xFF => Some(code as u8),
        _ => {
            let byte = match ch {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                _ => return None,
            };
            Some(byte)
        }
    }
}

/// Convert a Unicode string to WinAnsiEncoding bytes for the built-in fonts.
///
/// Tabs become spaces; anything else without a WinAnsi code point becomes `?`.
pub fn unicode_to_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' => b' ',
            other => winansi_byte(other).unwrap_or(b'?'),
        })
        .collect()
}

/// Normalise free text from the consent forms.
///
/// Line endings become `\n`, NUL and other control characters are dropped,
/// stray bullet glyphs are removed (`•` becomes `-`), runs of spaces collapse
/// and every line is trimmed. Malayalam and other scripts pass through intact.
pub fn clean_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .split('\n')
        .map(clean_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last_space = false;
    for ch in line.chars() {
        let ch = match ch {
            '■' | '●' => continue,
            '•' => '-',
            '\t' => ' ',
            c if c.is_control() => continue,
            c => c,
        };
        if ch == ' ' {
            if last_space {
                continue;
            }
            last_space = true;
        } else {
            last_space = false;
        }
        out.push(ch);
    }
    out.trim().to_string()
}
