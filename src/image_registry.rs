//! Image registry for managing image XObjects and page resources
use std::collections::{BTreeMap, BTreeSet};

use pdf_writer::{Name, Pdf, Ref};

use crate::error::ConsentResult;
use crate::image_utils::{write_image_xobject, PreparedImage};
use crate::types::Size;

/// An image already written to the document
#[derive(Debug, Clone)]
pub struct RegisteredImage {
    pub id: Ref,
    pub name: String,
    /// Pixel dimensions, used for aspect-preserving placement
    pub size: Size,
}

pub struct ImageRegistry {
    next_ref_id: i32,
    // logical key ("logo", "signature:patient") -> XObject
    images: BTreeMap<String, RegisteredImage>,
    used_on_page: BTreeSet<String>,
}

impl ImageRegistry {
    pub fn new(start_ref: i32) -> Self {
        Self {
            next_ref_id: start_ref,
            images: BTreeMap::new(),
            used_on_page: BTreeSet::new(),
        }
    }

    pub fn next_ref(&mut self) -> Ref {
        let r = Ref::new(self.next_ref_id);
        self.next_ref_id += 1;
        r
    }

    /// Write `image` as an XObject under `key`; later calls with the same key
    /// reuse the existing object.
    pub fn register(
        &mut self,
        pdf: &mut Pdf,
        key: &str,
        image: &PreparedImage,
        compress: bool,
    ) -> ConsentResult<RegisteredImage> {
        if let Some(existing) = self.images.get(key) {
            return Ok(existing.clone());
        }
        let id = self.next_ref();
        let smask = self.next_ref();
        write_image_xobject(pdf, image, id, smask, compress)?;
        let registered = RegisteredImage {
            id,
            name: format!("Im{}", self.images.len() + 1),
            size: image.pixel_size(),
        };
        self.images.insert(key.to_string(), registered.clone());
        Ok(registered)
    }

    /// Note that the current page draws `key`
    pub fn mark_used(&mut self, key: &str) {
        if self.images.contains_key(key) {
            self.used_on_page.insert(key.to_string());
        }
    }

    /// Declare the images drawn on the current page in its `/Resources`
    pub fn write_resources(&self, resources: &mut pdf_writer::writers::Resources<'_>) {
        if self.used_on_page.is_empty() {
            return;
        }
        let mut x_objects = resources.x_objects();
        for key in &self.used_on_page {
            if let Some(image) = self.images.get(key) {
                x_objects.pair(Name(image.name.as_bytes()), image.id);
            }
        }
    }

    /// Reset per-page usage once a page has been written
    pub fn end_page(&mut self) {
        self.used_on_page.clear();
    }
}
