//! Font registry for one render: the two built-in Helvetica faces plus an
//! optional embedded script font
use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, warn};
use pdf_writer::{Name, Pdf, Ref};
use ttf_parser::{Face, GlyphId};

use crate::error::ConsentResult;
use crate::font_utils::{load_font_file, write_type0_font, BuiltinFont, Type0Refs};
use crate::unicode_utils::{contains_script, unicode_to_winansi, Script};

/// Logical fonts a page can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontId {
    Regular,
    Bold,
    Script,
}

impl FontId {
    /// Resource name used in page `/Font` dictionaries
    pub fn resource_name(self) -> Name<'static> {
        match self {
            FontId::Regular => Name(b"F1"),
            FontId::Bold => Name(b"F2"),
            FontId::Script => Name(b"F3"),
        }
    }
}

struct EmbeddedFont {
    script: Script,
    data: Vec<u8>,
    refs: Type0Refs,
    // glyph id -> first character drawn with it
    used: BTreeMap<u16, char>,
}

pub struct FontRegistry {
    next_ref_id: i32,
    regular: Ref,
    bold: Ref,
    script: Option<EmbeddedFont>,
}

impl FontRegistry {
    pub fn new(start_ref: i32) -> Self {
        let mut registry = Self {
            next_ref_id: start_ref,
            regular: Ref::new(start_ref),
            bold: Ref::new(start_ref),
            script: None,
        };
        registry.regular = registry.next_ref();
        registry.bold = registry.next_ref();
        registry
    }

    pub fn next_ref(&mut self) -> Ref {
        let r = Ref::new(self.next_ref_id);
        self.next_ref_id += 1;
        r
    }

    /// Load the dedicated font for `script` from `path`.
    ///
    /// Returns `false` (and logs) when the file is missing or unparsable; the
    /// registry then keeps serving Helvetica for that script.
    pub fn load_script_font(&mut self, script: Script, path: &Path) -> bool {
        let data = match load_font_file(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Script font unavailable for {}: {}, using Helvetica", script, e);
                return false;
            }
        };
        let refs = Type0Refs {
            type0: self.next_ref(),
            cid_font: self.next_ref(),
            descriptor: self.next_ref(),
            font_file: self.next_ref(),
            to_unicode: self.next_ref(),
        };
        debug!("Loaded {} font from {}", script, path.display());
        self.script = Some(EmbeddedFont {
            script,
            data,
            refs,
            used: BTreeMap::new(),
        });
        true
    }

    /// Whether any glyph of the script font ended up on a page
    pub fn script_font_used(&self) -> bool {
        self.script.as_ref().map_or(false, |font| !font.used.is_empty())
    }

    /// Pick the body font for `text`: the script font when the text needs it
    /// and one is loaded, Helvetica otherwise.
    pub fn select(&self, text: &str) -> FontId {
        match &self.script {
            Some(font) if contains_script(text, font.script) => FontId::Script,
            _ => FontId::Regular,
        }
    }

    /// Width of `text` in points, `None` if the font cannot measure every character
    pub fn measure(&self, font: FontId, text: &str, font_size: f64) -> Option<f64> {
        match font {
            FontId::Regular => BuiltinFont::Helvetica.text_width(text, font_size),
            FontId::Bold => BuiltinFont::HelveticaBold.text_width(text, font_size),
            FontId::Script => {
                let embedded = self.script.as_ref()?;
                let face = Face::parse(&embedded.data, 0).ok()?;
                let scale = font_size / face.units_per_em() as f64;
                let mut total = 0.0;
                for ch in text.chars() {
                    let gid = face.glyph_index(ch)?;
                    total += face.glyph_hor_advance(gid)? as f64 * scale;
                }
                Some(total)
            }
        }
    }

    /// Encode `text` for a `Tj` operator in `font`.
    ///
    /// Built-in fonts get WinAnsi bytes; the script font gets big-endian glyph
    /// ids, and every glyph drawn is recorded for subsetting and ToUnicode.
    pub fn encode(&mut self, font: FontId, text: &str) -> Vec<u8> {
        match (font, self.script.as_mut()) {
            (FontId::Script, Some(embedded)) => {
                let face = match Face::parse(&embedded.data, 0) {
                    Ok(face) => face,
                    Err(_) => return unicode_to_winansi(text),
                };
                let mut out = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    let gid = face.glyph_index(ch).unwrap_or(GlyphId(0)).0;
                    if gid != 0 {
                        embedded.used.entry(gid).or_insert(ch);
                    }
                    out.extend_from_slice(&gid.to_be_bytes());
                }
                out
            }
            _ => unicode_to_winansi(text),
        }
    }

    /// Declare every font in a page's `/Resources`
    pub fn write_resources(&self, resources: &mut pdf_writer::writers::Resources<'_>) {
        let mut fonts = resources.fonts();
        fonts.pair(FontId::Regular.resource_name(), self.regular);
        fonts.pair(FontId::Bold.resource_name(), self.bold);
        if let Some(embedded) = &self.script {
            fonts.pair(FontId::Script.resource_name(), embedded.refs.type0);
        }
    }

    /// Write the font objects once all pages are laid out
    pub fn write_fonts(&self, pdf: &mut Pdf, subset: bool, compress: bool) -> ConsentResult<()> {
        for (id, builtin) in [
            (self.regular, BuiltinFont::Helvetica),
            (self.bold, BuiltinFont::HelveticaBold),
        ] {
            pdf.type1_font(id)
                .base_font(builtin.base_font())
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }
        if let Some(embedded) = &self.script {
            debug!(
                "Embedding {} font with {} glyphs",
                embedded.script,
                embedded.used.len()
            );
            write_type0_font(pdf, embedded.refs, &embedded.data, &embedded.used, subset, compress)?;
        }
        Ok(())
    }
}
