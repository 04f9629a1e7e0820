//! Font utilities: loading TrueType files, built-in Helvetica metrics and
//! Type0 (CIDFontType2) embedding for script fonts

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use log::{debug, warn};
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo};
use pdf_writer::{Filter, Name, Pdf, Rect, Ref, Str};
use ttf_parser::Face;

use crate::compress::encode_stream;
use crate::error::{ConsentError, ConsentResult};

/// Load a TTF/OTF font from disk and check that ttf-parser accepts it
pub fn load_font_file(path: &Path) -> ConsentResult<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| {
        ConsentError::Font(format!("Failed to read font file {}: {}", path.display(), e))
    })?;
    Face::parse(&data, 0).map_err(|e| {
        ConsentError::Font(format!("Invalid font file {}: {}", path.display(), e))
    })?;
    Ok(data)
}

/// PostScript name of a face, reduced to characters that are safe in a PDF name
pub fn postscript_name(face: &Face<'_>) -> String {
    let raw = face
        .names()
        .into_iter()
        .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .and_then(|name| name.to_string())
        .unwrap_or_else(|| "EmbeddedFont".to_string());
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

/// The standard 14 fonts the renderer uses without embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
}

impl BuiltinFont {
    pub fn base_font(self) -> Name<'static> {
        match self {
            BuiltinFont::Helvetica => Name(b"Helvetica"),
            BuiltinFont::HelveticaBold => Name(b"Helvetica-Bold"),
        }
    }

    /// Advance width in 1/1000 em, `None` when the character has no WinAnsi code
    pub fn char_width(self, ch: char) -> Option<u16> {
        let code = crate::unicode_utils::winansi_byte(if ch == '\t' { ' ' } else { ch })?;
        let table = match self {
            BuiltinFont::Helvetica => &HELVETICA_WIDTHS,
            BuiltinFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        match code {
            0x20..=0x7E => Some(table[(code - 0x20) as usize]),
            // Accented Latin-1 and typographic extras: average lower-case advance
            _ => Some(556),
        }
    }

    /// Width of `text` at `font_size`, `None` if any character is unmeasurable
    pub fn text_width(self, text: &str, font_size: f64) -> Option<f64> {
        let mut units = 0u32;
        for ch in text.chars() {
            units += self.char_width(ch)? as u32;
        }
        Some(units as f64 * font_size / 1000.0)
    }
}

// AFM advance widths for U+0020..=U+007E
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Object ids reserved for one embedded Type0 font
#[derive(Debug, Clone, Copy)]
pub struct Type0Refs {
    pub type0: Ref,
    pub cid_font: Ref,
    pub descriptor: Ref,
    pub font_file: Ref,
    pub to_unicode: Ref,
}

/// Embed a TrueType font as a Type0 font with Identity-H encoding.
///
/// CIDs equal glyph ids, so content streams address glyphs directly and the
/// CIDToGIDMap is `/Identity`. `used` maps every glyph drawn to the character
/// it came from; it drives the width array, the ToUnicode CMap and, when
/// `subset` is set, the glyph set kept by subsetter.
pub fn write_type0_font(
    pdf: &mut Pdf,
    refs: Type0Refs,
    font_data: &[u8],
    used: &BTreeMap<u16, char>,
    subset: bool,
    compress: bool,
) -> ConsentResult<()> {
    let face = Face::parse(font_data, 0)
        .map_err(|e| ConsentError::Font(format!("Invalid font file: {}", e)))?;

    let scale = 1000.0 / face.units_per_em() as f32;
    let ascent = face.ascender() as f32 * scale;
    let descent = face.descender() as f32 * scale;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 * scale)
        .unwrap_or(ascent);
    let bbox = face.global_bounding_box();

    let base_name = format!("CNSNTF+{}", postscript_name(&face));
    let base_font = Name(base_name.as_bytes());

    let program = if subset {
        let mut glyphs: Vec<u16> = vec![0];
        glyphs.extend(used.keys().copied());
        match subsetter::subset(font_data, 0, subsetter::Profile::pdf(&glyphs)) {
            Ok(data) => {
                debug!(
                    "Subset {} to {} glyphs ({} -> {} bytes)",
                    base_name,
                    glyphs.len(),
                    font_data.len(),
                    data.len()
                );
                data
            }
            Err(e) => {
                warn!("Font subsetting failed for {}: {:?}, embedding full font", base_name, e);
                font_data.to_vec()
            }
        }
    } else {
        font_data.to_vec()
    };

    {
        let encoded = encode_stream(&program, compress)?;
        let mut stream = pdf.stream(refs.font_file, &encoded.data);
        if encoded.deflated {
            stream.filter(Filter::FlateDecode);
        }
        stream.pair(Name(b"Length1"), program.len() as i32);
    }

    pdf.font_descriptor(refs.descriptor)
        .name(base_font)
        .flags(FontFlags::SYMBOLIC)
        .bbox(Rect::new(
            bbox.x_min as f32 * scale,
            bbox.y_min as f32 * scale,
            bbox.x_max as f32 * scale,
            bbox.y_max as f32 * scale,
        ))
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(refs.font_file);

    {
        let mut cid_font = pdf.cid_font(refs.cid_font);
        cid_font
            .subtype(CidFontType::Type2)
            .base_font(base_font)
            .system_info(SystemInfo {
                registry: Str(b"Adobe"),
                ordering: Str(b"Identity"),
                supplement: 0,
            })
            .font_descriptor(refs.descriptor)
            .default_width(500.0)
            .cid_to_gid_map_predefined(Name(b"Identity"));

        let mut widths = cid_font.widths();
        let mut runs = used.keys().copied().peekable();
        while let Some(start) = runs.next() {
            let mut run = vec![glyph_width(&face, start, scale)];
            let mut last = start;
            while let Some(&next) = runs.peek() {
                if next != last + 1 {
                    break;
                }
                run.push(glyph_width(&face, next, scale));
                last = next;
                runs.next();
            }
            widths.consecutive(start, run);
        }
    }

    pdf.type0_font(refs.type0)
        .base_font(base_font)
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(refs.cid_font)
        .to_unicode(refs.to_unicode);

    let cmap = to_unicode_cmap(used);
    let encoded = encode_stream(cmap.as_bytes(), compress)?;
    let mut stream = pdf.stream(refs.to_unicode, &encoded.data);
    if encoded.deflated {
        stream.filter(Filter::FlateDecode);
    }
    Ok(())
}

fn glyph_width(face: &Face<'_>, gid: u16, scale: f32) -> f32 {
    face.glyph_hor_advance(ttf_parser::GlyphId(gid))
        .map(|adv| (adv as f32 * scale).round())
        .unwrap_or(500.0)
}

/// Build a ToUnicode CMap mapping glyph ids back to their characters
pub fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut sections = String::new();
    let pairs: Vec<(&u16, &char)> = used.iter().collect();
    for chunk in pairs.chunks(100) {
        let _ = writeln!(sections, "{} beginbfchar", chunk.len());
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(sections, "<{:04X}> <{}>", gid, hex);
        }
        sections.push_str("endbfchar\n");
    }

    format!(
        "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<< /Registry (Adobe)
   /Ordering (UCS)
   /Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
{}endcmap
CMapName currentdict /CMap defineresource pop
end
end",
        sections
    )
}
