//! Render configuration: hospital branding and output options

use serde::{Deserialize, Serialize};

use crate::error::{ConsentError, ConsentResult};

/// Options for one `ConsentRenderer`; every field has a default so hosts can
/// pass partial JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub hospital_name: String,
    pub hospital_location: String,
    pub document_title: String,
    /// Text drawn inside the placeholder badge when no logo resolves
    pub badge_lines: Vec<String>,
    pub footer_title: String,
    pub footer_note: String,
    /// FlateDecode content, font and image streams
    pub compress_streams: bool,
    /// Embed only the glyphs used from script fonts
    pub subset_fonts: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            hospital_name: "MES MEDICAL COLLEGE".to_string(),
            hospital_location: "PERINTHALMANNA".to_string(),
            document_title: "DIGITAL CONSENT FORM".to_string(),
            badge_lines: vec!["MES".to_string(), "MEDICAL".to_string()],
            footer_title: "MES Medical College, Perinthalmanna".to_string(),
            footer_note: "Digital Consent System - Generated Electronically".to_string(),
            compress_streams: true,
            subset_fonts: true,
        }
    }
}

impl RenderConfig {
    pub fn from_json(json: &str) -> ConsentResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConsentResult<()> {
        if self.hospital_name.trim().is_empty() {
            return Err(ConsentError::InvalidConfig(
                "hospital_name must not be empty".to_string(),
            ));
        }
        if self.document_title.trim().is_empty() {
            return Err(ConsentError::InvalidConfig(
                "document_title must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RenderConfig::from_json(r#"{"hospital_location": "MALAPPURAM", "compress_streams": false}"#)
                .unwrap();
        assert_eq!(config.hospital_location, "MALAPPURAM");
        assert_eq!(config.hospital_name, "MES MEDICAL COLLEGE");
        assert!(!config.compress_streams);
        assert!(config.subset_fonts);
    }

    #[test]
    fn empty_title_is_rejected() {
        assert!(matches!(
            RenderConfig::from_json(r#"{"document_title": "  "}"#),
            Err(ConsentError::InvalidConfig(_))
        ));
    }
}
