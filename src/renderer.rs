//! Consent PDF renderer
//!
//! ## Architecture
//!
//! `ConsentRenderer` is stateless apart from its configuration and resource
//! resolver. Each call to `render` creates a private `DocumentBuilder` that owns
//! the pdf-writer document, the font and image registries and the vertical
//! cursor, so renders never share mutable state.
//!
//! ## Layout
//!
//! ```text
//! header (logo or badge, centred hospital name / location / title, red rule)
//! PATIENT DETAILS
//! CONSENT REQUIRED FOR
//! PROCEDURE/REASON DETAILS (wrapped, script-aware)
//! DECLARATION + SIGNATURES (kept on one page)
//! footer
//! ```
//!
//! The cursor is the baseline of the next element. Every block asks
//! `ensure_space` for its height first; when the block would cross the bottom
//! margin the page is closed, a new one opened and the header redrawn.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use pdf_writer::{Filter, Finish, Name, Pdf, Rect as PdfRect, Ref, TextStr};
use serde::Serialize;

use crate::canvas::PdfCanvas;
use crate::compress::encode_stream;
use crate::config::RenderConfig;
use crate::error::ConsentResult;
use crate::font_registry::{FontId, FontRegistry};
use crate::geometry::{centered_x, fit_within};
use crate::image_registry::{ImageRegistry, RegisteredImage};
use crate::image_utils::{parse_data_uri, prepare_image, ImageLimits};
use crate::record::{ConsentRecord, SignerRole};
use crate::resources::ResourceResolver;
use crate::text_layout::LineBreaker;
use crate::types::{Color, Rect, Size, A4};
use crate::unicode_utils::{clean_text, contains_script, Script};

const MARGIN_X: f64 = 50.0;
const RIGHT_COLUMN_X: f64 = 300.0;
/// Distance from the top edge to the header baseline reference
const HEADER_OFFSET: f64 = 50.0;
/// Distance from the header reference to the first content baseline
const HEADER_HEIGHT: f64 = 130.0;
const BOTTOM_MARGIN: f64 = 60.0;

const PATIENT_BLOCK_HEIGHT: f64 = 90.0;
const HEADING_ADVANCE: f64 = 22.0;
const REQUIRED_FOR_SIZE: f64 = 12.0;
const REQUIRED_FOR_LEADING: f64 = 16.0;
const REQUIRED_FOR_GAP: f64 = 8.0;
const LATIN_BODY: (f64, f64) = (9.0, 12.0);
const SCRIPT_BODY: (f64, f64) = (10.0, 14.0);
const PROCEDURE_GAP: f64 = 15.0;

const DECLARATION: [&str; 4] = [
    "I hereby acknowledge that:",
    "- I have read and understood the consent form",
    "- All my questions have been answered satisfactorily",
    "- I voluntarily consent to the procedure/treatment",
];
const DECLARATION_LEADING: f64 = 16.0;
const DECLARATION_GAP: f64 = 14.0;
const DECLARATION_HEIGHT: f64 =
    HEADING_ADVANCE + DECLARATION.len() as f64 * DECLARATION_LEADING + DECLARATION_GAP;

const SIGNATURE_HEADING_ADVANCE: f64 = 30.0;
const SIGNATURE_ROW_HEIGHT: f64 = 110.0;
const SIGNATURE_GRID_HEIGHT: f64 = SIGNATURE_HEADING_ADVANCE + 2.0 * SIGNATURE_ROW_HEIGHT;
const SIGNATURE_BOX: Size = Size {
    width: 120.0,
    height: 50.0,
};
const FOOTER_HEIGHT: f64 = 45.0;

const LOGO_BOX: f64 = 70.0;

// Object id ranges: document objects, fonts, images, then one page + content pair per page
const CATALOG_REF: i32 = 1;
const PAGE_TREE_REF: i32 = 2;
const FONT_REF_START: i32 = 3;
const IMAGE_REF_START: i32 = 10;
const INFO_REF: i32 = 20;
const PAGE_REF_START: i32 = 21;

const LOGO_KEY: &str = "logo";

/// What ended up in a signature slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotOutcome {
    /// Image decoded and drawn
    Signed,
    /// No signature yet
    Pending,
    /// A payload was supplied but could not be decoded; drawn as pending
    Malformed,
}

/// Whether the header shows the resolved logo or the drawn badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMark {
    Logo,
    Badge,
}

/// A rendered consent PDF and what happened while producing it
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub slots: BTreeMap<SignerRole, SlotOutcome>,
    /// Script detected in the procedure text
    pub body_script: Script,
    /// Whether glyphs from a dedicated script font were embedded
    pub script_font_embedded: bool,
    pub header_mark: HeaderMark,
    pub suggested_filename: String,
}

impl RenderedDocument {
    pub fn slot(&self, role: SignerRole) -> SlotOutcome {
        self.slots.get(&role).copied().unwrap_or(SlotOutcome::Pending)
    }

    pub fn signed_count(&self) -> usize {
        self.slots
            .values()
            .filter(|outcome| **outcome == SlotOutcome::Signed)
            .count()
    }
}

/// Renders consent records to PDF
pub struct ConsentRenderer<'a> {
    config: &'a RenderConfig,
    resolver: &'a dyn ResourceResolver,
}

impl<'a> ConsentRenderer<'a> {
    pub fn new(config: &'a RenderConfig, resolver: &'a dyn ResourceResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &RenderConfig {
        self.config
    }

    /// Lay out `record` and return the finished PDF.
    ///
    /// Missing fonts, logos and broken signature payloads degrade to
    /// fallbacks; only stream compression I/O failures are returned.
    pub fn render(&self, record: &ConsentRecord) -> ConsentResult<RenderedDocument> {
        let text = CleanRecord::from(record);
        let mut doc = DocumentBuilder::new(self.config, A4);

        if text.needs_script(Script::Malayalam) {
            match self.resolver.resolve_font(Script::Malayalam) {
                Some(path) => {
                    doc.fonts.load_script_font(Script::Malayalam, &path);
                }
                None => warn!("No Malayalam font resolved, rendering with Helvetica"),
            }
        }
        doc.load_logo(self.resolver.resolve_logo());

        doc.begin();
        doc.patient_details(&text)?;
        doc.required_for(&text.required_for)?;
        doc.procedure(&text.procedure)?;
        doc.ensure_space(DECLARATION_HEIGHT + SIGNATURE_GRID_HEIGHT)?;
        doc.declaration()?;
        let slots = doc.signatures(record, &text)?;
        doc.footer()?;

        let header_mark = if doc.logo.is_some() {
            HeaderMark::Logo
        } else {
            HeaderMark::Badge
        };
        let script_font_embedded = doc.fonts.script_font_used();
        let (bytes, page_count) = doc.finish(record)?;

        info!(
            "Consent PDF generated for record {}: {} bytes, {} page(s)",
            record.id,
            bytes.len(),
            page_count
        );

        Ok(RenderedDocument {
            bytes,
            page_count,
            slots,
            body_script: Script::detect(&text.procedure),
            script_font_embedded,
            header_mark,
            suggested_filename: record.suggested_filename(),
        })
    }
}

/// Record text after `clean_text`
struct CleanRecord {
    name: String,
    age: String,
    mrn: String,
    doctor: String,
    consent_type: String,
    created: String,
    required_for: String,
    procedure: String,
    signatory: String,
    relation: String,
}

impl From<&ConsentRecord> for CleanRecord {
    fn from(record: &ConsentRecord) -> Self {
        let opt = |value: &Option<String>| {
            value
                .as_deref()
                .map(clean_text)
                .filter(|v| !v.is_empty())
        };
        let name = clean_text(&record.patient_name);
        Self {
            signatory: opt(&record.signatory_name).unwrap_or_else(|| name.clone()),
            relation: opt(&record.signatory_relation).unwrap_or_else(|| "Relative".to_string()),
            name,
            age: clean_text(&record.patient_age),
            mrn: clean_text(&record.patient_mrn),
            doctor: non_empty(clean_text(&record.doctor_name), "Not assigned"),
            consent_type: clean_text(&record.consent_type),
            created: record
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            required_for: non_empty(clean_text(&record.consent_required_for), "Not specified"),
            procedure: clean_text(&record.procedure_details),
        }
    }
}

impl CleanRecord {
    fn needs_script(&self, script: Script) -> bool {
        [
            &self.name,
            &self.doctor,
            &self.consent_type,
            &self.required_for,
            &self.procedure,
            &self.signatory,
            &self.relation,
        ]
        .iter()
        .any(|text| contains_script(text, script))
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

struct PageInProgress {
    page_id: Ref,
    content_id: Ref,
    canvas: PdfCanvas,
}

/// Per-render document state
struct DocumentBuilder<'r> {
    config: &'r RenderConfig,
    pdf: Pdf,
    page_size: Size,
    next_ref_id: i32,
    pages: Vec<Ref>,
    page: PageInProgress,
    fonts: FontRegistry,
    images: ImageRegistry,
    logo: Option<RegisteredImage>,
    cursor: f64,
}

impl<'r> DocumentBuilder<'r> {
    fn new(config: &'r RenderConfig, page_size: Size) -> Self {
        let mut pdf = Pdf::new();
        pdf.catalog(Ref::new(CATALOG_REF))
            .pages(Ref::new(PAGE_TREE_REF));
        let first = PageInProgress {
            page_id: Ref::new(PAGE_REF_START),
            content_id: Ref::new(PAGE_REF_START + 1),
            canvas: PdfCanvas::new(),
        };
        Self {
            config,
            pdf,
            page_size,
            next_ref_id: PAGE_REF_START + 2,
            pages: vec![first.page_id],
            page: first,
            fonts: FontRegistry::new(FONT_REF_START),
            images: ImageRegistry::new(IMAGE_REF_START),
            logo: None,
            cursor: 0.0,
        }
    }

    fn next_ref(&mut self) -> Ref {
        let r = Ref::new(self.next_ref_id);
        self.next_ref_id += 1;
        r
    }

    fn header_top(&self) -> f64 {
        self.page_size.height - HEADER_OFFSET
    }

    fn content_top(&self) -> f64 {
        self.header_top() - HEADER_HEIGHT
    }

    fn load_logo(&mut self, data: Option<Vec<u8>>) {
        let Some(data) = data else {
            debug!("No logo resolved, using badge");
            return;
        };
        let prepared = match prepare_image(&data, None, ImageLimits::LOGO) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Logo could not be decoded ({}), using badge", e);
                return;
            }
        };
        match self
            .images
            .register(&mut self.pdf, LOGO_KEY, &prepared, self.config.compress_streams)
        {
            Ok(image) => self.logo = Some(image),
            Err(e) => warn!("Logo could not be embedded ({}), using badge", e),
        }
    }

    // ===== Pages =====

    /// Draw the first page's header once the logo is known
    fn begin(&mut self) {
        self.draw_header();
        self.cursor = self.content_top();
    }

    /// Close the open page: content stream, then the page object with its resources
    fn close_page(&mut self) -> ConsentResult<()> {
        let content = std::mem::take(&mut self.page.canvas).finish();
        let encoded = encode_stream(&content, self.config.compress_streams)?;
        {
            let mut stream = self.pdf.stream(self.page.content_id, &encoded.data);
            if encoded.deflated {
                stream.filter(Filter::FlateDecode);
            }
        }

        let mut page_writer = self.pdf.page(self.page.page_id);
        page_writer.media_box(PdfRect::new(
            0.0,
            0.0,
            self.page_size.width as f32,
            self.page_size.height as f32,
        ));
        page_writer.parent(Ref::new(PAGE_TREE_REF));
        page_writer.contents(self.page.content_id);
        {
            let mut resources = page_writer.resources();
            self.fonts.write_resources(&mut resources);
            self.images.write_resources(&mut resources);
        }
        page_writer.finish();
        self.images.end_page();
        Ok(())
    }

    fn new_page(&mut self) -> ConsentResult<()> {
        self.close_page()?;
        let page_id = self.next_ref();
        let content_id = self.next_ref();
        self.pages.push(page_id);
        self.page = PageInProgress {
            page_id,
            content_id,
            canvas: PdfCanvas::new(),
        };
        self.draw_header();
        self.cursor = self.content_top();
        Ok(())
    }

    fn ensure_space(&mut self, needed: f64) -> ConsentResult<()> {
        if self.cursor - needed >= BOTTOM_MARGIN {
            return Ok(());
        }
        debug!(
            "Page break before block of {:.0}pt at cursor {:.1} (page {})",
            needed,
            self.cursor,
            self.pages.len()
        );
        self.new_page()
    }

    fn canvas(&mut self) -> &mut PdfCanvas {
        &mut self.page.canvas
    }

    fn finish(mut self, record: &ConsentRecord) -> ConsentResult<(Vec<u8>, usize)> {
        self.close_page()?;
        let page_count = self.pages.len();
        self.pdf
            .pages(Ref::new(PAGE_TREE_REF))
            .kids(self.pages.iter().copied())
            .count(page_count as i32);
        self.fonts
            .write_fonts(&mut self.pdf, self.config.subset_fonts, self.config.compress_streams)?;

        let title = format!("{} - {}", self.config.document_title, record.suggested_filename());
        self.pdf
            .document_info(Ref::new(INFO_REF))
            .title(TextStr(&title))
            .producer(TextStr("consent_pdf_rust"));

        Ok((self.pdf.finish(), page_count))
    }

    // ===== Text =====

    fn text_width(&self, font: FontId, text: &str, size: f64) -> f64 {
        LineBreaker::new(f64::MAX, font, size, &self.fonts).measure(text)
    }

    fn draw_text(&mut self, x: f64, y: f64, font: FontId, size: f64, text: &str) {
        let encoded = self.fonts.encode(font, text);
        let canvas = self.canvas();
        canvas.set_font(font, size);
        canvas.draw_encoded(x, y, &encoded);
    }

    /// Draw `text` in the body font it needs (script font or Helvetica)
    fn draw_body_text(&mut self, x: f64, y: f64, size: f64, text: &str) {
        let font = self.fonts.select(text);
        self.draw_text(x, y, font, size, text);
    }

    fn draw_centered(&mut self, y: f64, font: FontId, size: f64, text: &str) {
        let x = centered_x(self.page_size.width, self.text_width(font, text, size));
        self.draw_text(x, y, font, size, text);
    }

    fn heading(&mut self, title: &str) -> ConsentResult<()> {
        self.ensure_space(HEADING_ADVANCE)?;
        let y = self.cursor;
        self.draw_text(MARGIN_X, y, FontId::Bold, 14.0, title);
        self.cursor -= HEADING_ADVANCE;
        Ok(())
    }

    /// Wrap `text` to the content column, one `ensure_space` per line
    fn wrapped(&mut self, text: &str, size: f64, leading: f64) -> ConsentResult<()> {
        let font = self.fonts.select(text);
        let column = self.page_size.width - 2.0 * MARGIN_X;
        let lines = LineBreaker::new(column, font, size, &self.fonts).wrap(text);
        for line in lines {
            self.ensure_space(leading)?;
            if !line.is_empty() {
                let y = self.cursor;
                self.draw_text(MARGIN_X, y, font, size, &line);
            }
            self.cursor -= leading;
        }
        Ok(())
    }

    // ===== Blocks =====

    fn draw_header(&mut self) {
        let top = self.header_top();
        let width = self.page_size.width;
        let mark = Rect::new(MARGIN_X, top - 80.0, LOGO_BOX, LOGO_BOX);

        match self.logo.clone() {
            Some(logo) => {
                let fitted = fit_within(logo.size, Size::new(LOGO_BOX, LOGO_BOX));
                let x = mark.x + (LOGO_BOX - fitted.width) / 2.0;
                let y = mark.y + (LOGO_BOX - fitted.height) / 2.0;
                self.images.mark_used(LOGO_KEY);
                self.canvas()
                    .draw_image(Name(logo.name.as_bytes()), x, y, fitted.width, fitted.height);
            }
            None => self.draw_badge(mark),
        }

        let config = self.config;
        let canvas = self.canvas();
        canvas.save_state();
        canvas.set_fill_color(Color::brand());
        self.draw_centered(top - 30.0, FontId::Bold, 18.0, &config.hospital_name);
        self.draw_centered(top - 55.0, FontId::Bold, 14.0, &config.hospital_location);
        self.canvas().set_fill_color(Color::black());
        self.draw_centered(top - 80.0, FontId::Bold, 16.0, &config.document_title);

        let canvas = self.canvas();
        canvas.set_stroke_color(Color::brand());
        canvas.set_line_width(2.0);
        canvas.line(MARGIN_X, top - 100.0, width - MARGIN_X, top - 100.0);
        canvas.restore_state();
    }

    fn draw_badge(&mut self, mark: Rect) {
        let config = self.config;
        let canvas = self.canvas();
        canvas.save_state();
        canvas.set_fill_color(Color::brand());
        canvas.round_rect(mark, 4.0, true, false);
        canvas.set_fill_color(Color::white());
        for (i, line) in config.badge_lines.iter().enumerate() {
            let y = mark.top() - 35.0 - 15.0 * i as f64;
            self.draw_text(mark.x + 5.0, y, FontId::Bold, 10.0, line);
        }
        self.canvas().restore_state();
    }

    fn patient_details(&mut self, text: &CleanRecord) -> ConsentResult<()> {
        self.ensure_space(PATIENT_BLOCK_HEIGHT)?;
        let y = self.cursor;
        self.draw_text(MARGIN_X, y, FontId::Bold, 12.0, "PATIENT DETAILS:");

        let left = [
            format!("Name: {}", text.name),
            format!("Age: {}", text.age),
            format!("MRN: {}", text.mrn),
        ];
        let right = [
            format!("Doctor: {}", text.doctor),
            format!("Consent: {}", text.consent_type),
            format!("Date: {}", text.created),
        ];
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let row_y = y - 20.0 * (i + 1) as f64;
            self.draw_body_text(MARGIN_X, row_y, 11.0, l);
            self.draw_body_text(RIGHT_COLUMN_X, row_y, 11.0, r);
        }
        self.cursor -= PATIENT_BLOCK_HEIGHT;
        Ok(())
    }

    fn required_for(&mut self, required_for: &str) -> ConsentResult<()> {
        self.heading("CONSENT REQUIRED FOR:")?;
        self.wrapped(required_for, REQUIRED_FOR_SIZE, REQUIRED_FOR_LEADING)?;
        self.cursor -= REQUIRED_FOR_GAP;
        Ok(())
    }

    fn procedure(&mut self, procedure: &str) -> ConsentResult<()> {
        self.heading("PROCEDURE/REASON DETAILS:")?;
        if procedure.is_empty() {
            return Ok(());
        }
        let (size, leading) = match Script::detect(procedure) {
            Script::Latin => LATIN_BODY,
            _ => SCRIPT_BODY,
        };
        debug!(
            "Procedure text: script={}, font={:?}, {}pt/{}pt",
            Script::detect(procedure),
            self.fonts.select(procedure),
            size,
            leading
        );
        self.wrapped(procedure, size, leading)?;
        self.cursor -= PROCEDURE_GAP;
        Ok(())
    }

    fn declaration(&mut self) -> ConsentResult<()> {
        self.heading("DECLARATION:")?;
        for line in DECLARATION {
            let y = self.cursor;
            self.draw_text(MARGIN_X + 10.0, y, FontId::Regular, 11.0, line);
            self.cursor -= DECLARATION_LEADING;
        }
        self.cursor -= DECLARATION_GAP;
        Ok(())
    }

    fn signatures(
        &mut self,
        record: &ConsentRecord,
        text: &CleanRecord,
    ) -> ConsentResult<BTreeMap<SignerRole, SlotOutcome>> {
        self.ensure_space(SIGNATURE_GRID_HEIGHT)?;
        let y = self.cursor;
        self.draw_text(MARGIN_X, y, FontId::Bold, 14.0, "SIGNATURES:");
        self.cursor -= SIGNATURE_HEADING_ADVANCE;

        let mut outcomes = BTreeMap::new();
        for row in SignerRole::ALL.chunks(2) {
            let row_y = self.cursor;
            for (role, x) in row.iter().zip([MARGIN_X, RIGHT_COLUMN_X]) {
                let outcome = self.signature_slot(*role, x, row_y, record, text);
                outcomes.insert(*role, outcome);
            }
            self.cursor -= SIGNATURE_ROW_HEIGHT;
        }
        Ok(outcomes)
    }

    fn signature_slot(
        &mut self,
        role: SignerRole,
        x: f64,
        row_y: f64,
        record: &ConsentRecord,
        text: &CleanRecord,
    ) -> SlotOutcome {
        self.draw_text(x, row_y, FontId::Bold, 11.0, role.slot_title());

        let signature = record.signatures.get(role);
        let outcome = match signature {
            None => SlotOutcome::Pending,
            Some(sig) => match self.signature_image(role, &sig.data) {
                Some(image) => {
                    let fitted = fit_within(image.size, SIGNATURE_BOX);
                    let key = signature_key(role);
                    self.images.mark_used(&key);
                    self.canvas().draw_image(
                        Name(image.name.as_bytes()),
                        x,
                        row_y - 65.0,
                        fitted.width,
                        fitted.height,
                    );
                    SlotOutcome::Signed
                }
                None => SlotOutcome::Malformed,
            },
        };

        if outcome != SlotOutcome::Signed {
            let canvas = self.canvas();
            canvas.save_state();
            canvas.set_stroke_color(Color::grey(0.5));
            canvas.set_line_width(0.5);
            canvas.line(x, row_y - 50.0, x + 150.0, row_y - 50.0);
            canvas.restore_state();
            self.draw_text(x, row_y - 63.0, FontId::Regular, 10.0, "Signature Pending");
        }

        let signed = outcome == SlotOutcome::Signed;
        let identity = match role {
            SignerRole::Patient => format!("Patient: {}", text.signatory),
            SignerRole::Relative => format!("Relationship: {}", text.relation),
            SignerRole::Nurse if signed => format!(
                "Signed by: Nurse {}",
                signer_name(signature.and_then(|s| s.signed_by.as_deref()), "")
            ),
            SignerRole::Doctor if signed => format!(
                "Signed by: Dr. {}",
                signer_name(signature.and_then(|s| s.signed_by.as_deref()), &text.doctor)
            ),
            SignerRole::Nurse | SignerRole::Doctor => "Signed by: Pending".to_string(),
        };
        let timestamp = match signature.filter(|_| signed) {
            Some(sig) => match sig.signed_at {
                Some(at) => format!("Signed at: {}", at.format("%Y-%m-%d %H:%M:%S")),
                None => "Signed at: Not recorded".to_string(),
            },
            None => "Signed at: Pending".to_string(),
        };
        self.draw_body_text(x, row_y - 78.0, 8.0, identity.trim_end());
        self.draw_text(x, row_y - 90.0, FontId::Regular, 8.0, &timestamp);
        outcome
    }

    /// Decode and embed one slot's payload; `None` when it is not a usable image
    fn signature_image(&mut self, role: SignerRole, data: &str) -> Option<RegisteredImage> {
        let Some((mime, bytes)) = parse_data_uri(data) else {
            warn!("{} signature is not an inline image, drawing as pending", role);
            return None;
        };
        let prepared = match prepare_image(&bytes, Some(mime.as_str()), ImageLimits::SIGNATURE) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("{} signature ({}) could not be decoded: {}", role, mime, e);
                return None;
            }
        };
        match self.images.register(
            &mut self.pdf,
            &signature_key(role),
            &prepared,
            self.config.compress_streams,
        ) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("{} signature could not be embedded: {}", role, e);
                None
            }
        }
    }

    fn footer(&mut self) -> ConsentResult<()> {
        self.ensure_space(FOOTER_HEIGHT)?;
        let y = self.cursor;
        let width = self.page_size.width;
        let config = self.config;

        let canvas = self.canvas();
        canvas.save_state();
        canvas.set_stroke_color(Color::brand());
        canvas.set_line_width(1.0);
        canvas.line(MARGIN_X, y, width - MARGIN_X, y);
        canvas.set_fill_color(Color::brand());
        self.draw_text(MARGIN_X, y - 20.0, FontId::Bold, 10.0, &config.footer_title);
        self.canvas().set_fill_color(Color::black());
        self.draw_text(MARGIN_X, y - 35.0, FontId::Regular, 8.0, &config.footer_note);
        self.canvas().restore_state();
        self.cursor -= FOOTER_HEIGHT;
        Ok(())
    }
}

fn signature_key(role: SignerRole) -> String {
    format!("signature:{}", role)
}

fn signer_name<'s>(signed_by: Option<&'s str>, fallback: &'s str) -> &'s str {
    match signed_by.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Signature;
    use crate::resources::StaticResourceResolver;
    use crate::test_support::{
        data_uri, encoded_bytes, png_bytes, sample_record, signature_data_uri, system_font,
    };
    use image::ImageFormat;

    fn plain_config() -> RenderConfig {
        RenderConfig {
            compress_streams: false,
            ..RenderConfig::default()
        }
    }

    fn count(haystack: &[u8], needle: &str) -> usize {
        let needle = needle.as_bytes();
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    fn render(record: &ConsentRecord, resolver: &StaticResourceResolver) -> RenderedDocument {
        let config = plain_config();
        ConsentRenderer::new(&config, resolver).render(record).unwrap()
    }

    #[test]
    fn jane_doe_with_patient_and_relative() {
        let mut record = sample_record();
        record.signatures.patient = Some(Signature::new(signature_data_uri(200, 80)));
        record.signatures.relative = Some(Signature::new(signature_data_uri(90, 40)));

        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.signed_count(), 2);
        assert_eq!(doc.slot(SignerRole::Nurse), SlotOutcome::Pending);
        assert_eq!(doc.slot(SignerRole::Doctor), SlotOutcome::Pending);
        assert_eq!(count(&doc.bytes, "(Signature Pending) Tj"), 2);
        assert_eq!(count(&doc.bytes, "(Signed by: Pending) Tj"), 2);
        assert_eq!(count(&doc.bytes, "(Patient: Jane Doe) Tj"), 1);
        assert_eq!(doc.suggested_filename, "MRN_MRN100_Consent_1.pdf");
        assert!(doc.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut record = sample_record();
        record.signatures.patient = Some(Signature::new(signature_data_uri(50, 20)));
        let resolver = StaticResourceResolver::default().with_logo(png_bytes(30, 30));
        let config = RenderConfig::default();
        let renderer = ConsentRenderer::new(&config, &resolver);
        let first = renderer.render(&record).unwrap();
        let second = renderer.render(&record).unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.page_count, second.page_count);
    }

    #[test]
    fn long_procedure_flows_onto_more_pages_with_headers() {
        let mut record = sample_record();
        record.procedure_details = (1..=120)
            .map(|i| format!("Step {}: the surgical team will monitor vital signs throughout.", i))
            .collect::<Vec<_>>()
            .join("\n");

        let doc = render(&record, &StaticResourceResolver::default());
        assert!(doc.page_count > 1);
        assert_eq!(count(&doc.bytes, "(DIGITAL CONSENT FORM) Tj"), doc.page_count);
        assert_eq!(count(&doc.bytes, "(MES MEDICAL COLLEGE) Tj"), doc.page_count);
        assert_eq!(count(&doc.bytes, "(SIGNATURES:) Tj"), 1);
    }

    #[test]
    fn declaration_and_signatures_stay_together() {
        let mut record = sample_record();
        // Fill the first page so only part of the sign-off block would fit
        record.procedure_details = vec!["Observation line."; 26].join("\n");
        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(doc.page_count, 2);

        let text = String::from_utf8_lossy(&doc.bytes);
        let declaration = text.find("(DECLARATION:) Tj").unwrap();
        let signatures = text.find("(SIGNATURES:) Tj").unwrap();
        let second_header = text.rfind("(DIGITAL CONSENT FORM) Tj").unwrap();
        assert!(declaration > second_header);
        assert!(signatures > second_header);
    }

    #[test]
    fn malayalam_without_font_falls_back_to_helvetica() {
        let mut record = sample_record();
        record.procedure_details = "ശസ്ത്രക്രിയ - Appendectomy".to_string();
        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(doc.body_script, Script::Malayalam);
        assert!(!doc.script_font_embedded);
        assert_eq!(count(&doc.bytes, "/Type0"), 0);
        assert!(count(&doc.bytes, "(??????????? - Appendectomy) Tj") == 1);
    }

    #[test]
    fn unreadable_script_font_is_not_fatal() {
        let mut record = sample_record();
        record.procedure_details = "ശസ്ത്രക്രിയ".to_string();
        let resolver =
            StaticResourceResolver::default().with_font(Script::Malayalam, "/missing/Manjari-Regular.ttf");
        let doc = render(&record, &resolver);
        assert_eq!(doc.page_count, 1);
        assert!(!doc.script_font_embedded);
    }

    #[test]
    fn resolved_script_font_is_embedded() {
        let Some(font) = system_font() else {
            return;
        };
        let mut record = sample_record();
        // The Latin half has glyphs in any system font
        record.procedure_details = "ശസ്ത്രക്രിയ - Appendectomy".to_string();
        let resolver = StaticResourceResolver::default().with_font(Script::Malayalam, font);
        let doc = render(&record, &resolver);
        assert_eq!(doc.body_script, Script::Malayalam);
        assert!(doc.script_font_embedded);
        assert_eq!(count(&doc.bytes, "/Identity-H"), 1);
        assert_eq!(count(&doc.bytes, "/FontFile2"), 1);
        assert_eq!(count(&doc.bytes, "/Length1"), 1);
        assert_eq!(count(&doc.bytes, "beginbfchar"), 1);
        assert!(count(&doc.bytes, "/F3 10 Tf") >= 1);
    }

    #[test]
    fn script_font_without_needed_glyphs_is_not_reported() {
        let Some(font) = system_font() else {
            return;
        };
        let mut record = sample_record();
        record.procedure_details = "ശസ്ത്രക്രിയ".to_string();
        let resolver = StaticResourceResolver::default().with_font(Script::Malayalam, font.clone());
        let doc = render(&record, &resolver);
        let face_has_glyph = std::fs::read(&font)
            .ok()
            .and_then(|data| {
                ttf_parser::Face::parse(&data, 0)
                    .ok()
                    .map(|face| face.glyph_index('ശ').is_some())
            })
            .unwrap_or(false);
        assert_eq!(doc.script_font_embedded, face_has_glyph);
    }

    #[test]
    fn latin_text_uses_helvetica() {
        let doc = render(&sample_record(), &StaticResourceResolver::default());
        assert_eq!(doc.body_script, Script::Latin);
        assert_eq!(count(&doc.bytes, "/F3"), 0);
        assert!(count(&doc.bytes, "/F1 9 Tf") >= 1);
        assert_eq!(count(&doc.bytes, "/BaseFont /Helvetica-Bold"), 1);
    }

    #[test]
    fn malformed_signatures_render_as_pending() {
        let mut record = sample_record();
        record.signatures.patient = Some(Signature::new("not an image at all"));
        record.signatures.relative = Some(Signature::new("data:image/png;base64,!!!!"));
        record.signatures.nurse = Some(Signature::new("data:image/png;base64,aGVsbG8gd29ybGQ="));
        record.signatures.doctor = Some(Signature::new(signature_data_uri(40, 20)).by("Rao"));

        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(doc.slot(SignerRole::Patient), SlotOutcome::Malformed);
        assert_eq!(doc.slot(SignerRole::Relative), SlotOutcome::Malformed);
        assert_eq!(doc.slot(SignerRole::Nurse), SlotOutcome::Malformed);
        assert_eq!(doc.slot(SignerRole::Doctor), SlotOutcome::Signed);
        assert_eq!(count(&doc.bytes, "(Signature Pending) Tj"), 3);
        assert_eq!(count(&doc.bytes, "(Signed by: Dr. Rao) Tj"), 1);
        assert_eq!(count(&doc.bytes, "(Signed at: Not recorded) Tj"), 1);
    }

    #[test]
    fn tiff_signature_is_embedded() {
        let mut record = sample_record();
        let tiff = encoded_bytes(60, 20, ImageFormat::Tiff);
        record.signatures.patient = Some(Signature::new(data_uri("image/tiff", &tiff)));
        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(doc.slot(SignerRole::Patient), SlotOutcome::Signed);
        assert_eq!(count(&doc.bytes, "(Signature Pending) Tj"), 3);
    }

    #[test]
    fn huge_svg_signature_is_rasterised_small() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="40000" height="40000"><path d="M0 0 L40000 40000" stroke="black" stroke-width="400"/></svg>"#;
        let mut record = sample_record();
        record.signatures.nurse =
            Some(Signature::new(data_uri("image/svg+xml", svg.as_bytes())).by("Mary"));
        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(doc.slot(SignerRole::Nurse), SlotOutcome::Signed);
        // 200x200 RGB plus soft mask, uncompressed
        assert!(doc.bytes.len() < 1_000_000);
    }

    #[test]
    fn nurse_caption_names_signer_and_time() {
        let mut record = sample_record();
        let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        record.signatures.nurse = Some(Signature::new(signature_data_uri(40, 20)).by("Mary").at(at));
        let doc = render(&record, &StaticResourceResolver::default());
        assert_eq!(count(&doc.bytes, "(Signed by: Nurse Mary) Tj"), 1);
        assert_eq!(count(&doc.bytes, "(Signed at: 2024-03-01 10:15:00) Tj"), 1);
    }

    #[test]
    fn logo_or_badge_in_header() {
        let record = sample_record();
        let with_logo = render(
            &record,
            &StaticResourceResolver::default().with_logo(png_bytes(64, 32)),
        );
        assert_eq!(with_logo.header_mark, HeaderMark::Logo);
        assert_eq!(count(&with_logo.bytes, "/Im1 Do"), 1);

        let badge = render(&record, &StaticResourceResolver::default());
        assert_eq!(badge.header_mark, HeaderMark::Badge);
        assert_eq!(count(&badge.bytes, "(MES) Tj"), 1);

        let broken = render(
            &record,
            &StaticResourceResolver::default().with_logo(b"GIF89a broken".to_vec()),
        );
        assert_eq!(broken.header_mark, HeaderMark::Badge);
    }

    #[test]
    fn logo_is_shared_across_pages() {
        let mut record = sample_record();
        record.procedure_details = vec!["Line of procedure text."; 150].join("\n");
        let doc = render(
            &record,
            &StaticResourceResolver::default().with_logo(png_bytes(10, 10)),
        );
        assert!(doc.page_count > 1);
        assert_eq!(count(&doc.bytes, "/Im1 Do"), doc.page_count);
        assert_eq!(count(&doc.bytes, "/Subtype /Image"), 2); // image + soft mask
    }

    #[test]
    fn empty_record_still_renders() {
        let doc = render(&ConsentRecord::default(), &StaticResourceResolver::default());
        assert_eq!(doc.page_count, 1);
        assert_eq!(count(&doc.bytes, "(Doctor: Not assigned) Tj"), 1);
        assert_eq!(count(&doc.bytes, "(Not specified) Tj"), 1);
    }

    #[test]
    fn compressed_output_uses_flate() {
        let config = RenderConfig::default();
        let resolver = StaticResourceResolver::default();
        let doc = ConsentRenderer::new(&config, &resolver)
            .render(&sample_record())
            .unwrap();
        assert!(count(&doc.bytes, "/FlateDecode") >= 1);
        assert_eq!(count(&doc.bytes, "(DIGITAL CONSENT FORM) Tj"), 0);
    }
}
