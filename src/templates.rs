//! Consent templates: plain-text procedure descriptions kept as `.txt` files

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::error::{ConsentError, ConsentResult};

/// Templates written into an empty template folder
pub const SAMPLE_TEMPLATES: [(&str, &str); 4] = [
    (
        "surgical_consent.txt",
        include_str!("../assets/templates/surgical_consent.txt"),
    ),
    (
        "anesthesia_consent.txt",
        include_str!("../assets/templates/anesthesia_consent.txt"),
    ),
    (
        "blood_transfusion.txt",
        include_str!("../assets/templates/blood_transfusion.txt"),
    ),
    (
        "lama_consent.txt",
        include_str!("../assets/templates/lama_consent.txt"),
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsentTemplate {
    pub filename: String,
    pub display_name: String,
    pub content: String,
}

/// `blood_transfusion.txt` -> `Blood Transfusion`
pub fn display_name(filename: &str) -> String {
    let stem = filename
        .strip_suffix(".txt")
        .or_else(|| filename.strip_suffix(".TXT"))
        .unwrap_or(filename);
    let mut out = String::with_capacity(stem.len());
    let mut start_of_word = true;
    for ch in stem.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if start_of_word {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(ch);
            start_of_word = true;
        }
    }
    out
}

/// Templates found in `dir`, keyed and ordered by filename.
///
/// A missing folder is created and filled with the sample templates first.
pub fn load_templates(dir: &Path) -> ConsentResult<BTreeMap<String, ConsentTemplate>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        write_samples(dir)?;
    }

    let mut templates = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !filename.to_ascii_lowercase().ends_with(".txt") || !entry.path().is_file() {
            continue;
        }
        let name = display_name(&filename);
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Error reading template {}: {}", filename, e);
                format!("Template for {}", name)
            }
        };
        templates.insert(
            filename.clone(),
            ConsentTemplate {
                filename,
                display_name: name,
                content,
            },
        );
    }
    Ok(templates)
}

/// Look up one template by filename
pub fn load_template(dir: &Path, filename: &str) -> ConsentResult<ConsentTemplate> {
    load_templates(dir)?
        .remove(filename)
        .ok_or_else(|| ConsentError::Template(format!("Unknown consent template: {}", filename)))
}

fn write_samples(dir: &Path) -> ConsentResult<()> {
    for (filename, content) in SAMPLE_TEMPLATES {
        std::fs::write(dir.join(filename), content.trim_end())?;
        info!("Created sample template: {}", filename);
    }
    Ok(())
}
