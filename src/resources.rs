//! Resource resolution: where script fonts and the hospital logo come from

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::image_utils::sniff;
use crate::unicode_utils::Script;

/// Supplies the external files a render may use. Both lookups are optional:
/// the renderer falls back to Helvetica and a drawn badge.
pub trait ResourceResolver {
    /// Font file for text in `script`, if the script needs one and it exists
    fn resolve_font(&self, script: Script) -> Option<PathBuf>;

    /// Logo image bytes (JPEG, PNG, GIF, BMP or SVG)
    fn resolve_logo(&self) -> Option<Vec<u8>>;
}

/// Search paths for `FsResourceResolver`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub font_dirs: Vec<PathBuf>,
    /// Malayalam fonts in order of preference
    pub script_fonts: Vec<String>,
    pub logo_dirs: Vec<PathBuf>,
    pub logo_files: Vec<String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::for_static_dir(Path::new("static"))
    }
}

impl ResourceConfig {
    /// Conventional layout: logos in `<dir>`, fonts in `<dir>/fonts`
    pub fn for_static_dir(dir: &Path) -> Self {
        Self {
            font_dirs: vec![dir.join("fonts")],
            script_fonts: [
                "Manjari-Regular.ttf",
                "NotoSansMalayalam-Regular.ttf",
                "Rachana-Regular.ttf",
                "AnjaliOldLipi-Regular.ttf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            logo_dirs: vec![dir.to_path_buf()],
            logo_files: [
                "mes-logo.jpg",
                "mes-logo.png",
                "mes-logo-no-bgm.jpg",
                "mes-logo-animated.jpg",
                "logo.svg",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Looks resources up on the filesystem
#[derive(Debug, Clone, Default)]
pub struct FsResourceResolver {
    config: ResourceConfig,
}

impl FsResourceResolver {
    pub fn new(config: ResourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }
}

impl ResourceResolver for FsResourceResolver {
    fn resolve_font(&self, script: Script) -> Option<PathBuf> {
        if script.block().is_none() {
            return None;
        }
        for file in &self.config.script_fonts {
            for dir in &self.config.font_dirs {
                let candidate = dir.join(file);
                if candidate.is_file() {
                    debug!("Resolved {} font {}", script, candidate.display());
                    return Some(candidate);
                }
            }
        }
        warn!("No {} font found in {:?}", script, self.config.font_dirs);
        None
    }

    fn resolve_logo(&self) -> Option<Vec<u8>> {
        for file in &self.config.logo_files {
            for dir in &self.config.logo_dirs {
                let candidate = dir.join(file);
                if !candidate.is_file() {
                    continue;
                }
                match std::fs::read(&candidate) {
                    Ok(data) if sniff(&data).is_some() => {
                        debug!("Resolved logo {}", candidate.display());
                        return Some(data);
                    }
                    Ok(_) => warn!("{} is not a recognised image, skipping", candidate.display()),
                    Err(e) => warn!("Failed to read logo {}: {}", candidate.display(), e),
                }
            }
        }
        None
    }
}

/// Serves fixed, in-memory resources
#[derive(Debug, Clone, Default)]
pub struct StaticResourceResolver {
    fonts: BTreeMap<Script, PathBuf>,
    logo: Option<Vec<u8>>,
}

impl StaticResourceResolver {
    pub fn with_font(mut self, script: Script, path: impl Into<PathBuf>) -> Self {
        self.fonts.insert(script, path.into());
        self
    }

    pub fn with_logo(mut self, data: Vec<u8>) -> Self {
        self.logo = Some(data);
        self
    }
}

impl ResourceResolver for StaticResourceResolver {
    fn resolve_font(&self, script: Script) -> Option<PathBuf> {
        self.fonts.get(&script).cloned()
    }

    fn resolve_logo(&self) -> Option<Vec<u8>> {
        self.logo.clone()
    }
}
