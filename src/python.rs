//! Python bindings (enabled with the `python` feature)

use std::path::{Path, PathBuf};

use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::artifact::{ArtifactStore, StoreConfig};
use crate::config::RenderConfig;
use crate::record::ConsentRecord;
use crate::renderer::ConsentRenderer;
use crate::resources::{FsResourceResolver, ResourceConfig};

/// Renders consent records passed as JSON strings
#[pyclass(name = "ConsentRenderer")]
pub struct PyConsentRenderer {
    config: RenderConfig,
    resolver: FsResourceResolver,
}

#[pymethods]
impl PyConsentRenderer {
    #[new]
    #[pyo3(signature = (config_json=None, static_dir=None, fonts_dir=None))]
    fn new(
        config_json: Option<&str>,
        static_dir: Option<String>,
        fonts_dir: Option<String>,
    ) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => RenderConfig::from_json(json)?,
            None => RenderConfig::default(),
        };
        let static_dir = static_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("static"));
        let mut resources = ResourceConfig::for_static_dir(&static_dir);
        if let Some(dir) = fonts_dir {
            resources.font_dirs.insert(0, PathBuf::from(dir));
        }
        Ok(Self {
            config,
            resolver: FsResourceResolver::new(resources),
        })
    }

    /// Render a record and return the PDF bytes
    fn render<'py>(&self, py: Python<'py>, record_json: &str) -> PyResult<&'py PyBytes> {
        let record = ConsentRecord::from_json(record_json)?;
        let document = ConsentRenderer::new(&self.config, &self.resolver).render(&record)?;
        Ok(PyBytes::new(py, &document.bytes))
    }

    /// Render a record into `output_dir` and return the written path
    fn render_to_file(&self, record_json: &str, output_dir: &str) -> PyResult<String> {
        let record = ConsentRecord::from_json(record_json)?;
        let document = ConsentRenderer::new(&self.config, &self.resolver).render(&record)?;
        let store = ArtifactStore::new(StoreConfig {
            output_dir: Path::new(output_dir).to_path_buf(),
        });
        let path = store.write(&document.suggested_filename, &document.bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }
}

/// `MRN_<mrn>_Consent_<id>.pdf` for a record
#[pyfunction]
fn suggested_filename(record_json: &str) -> PyResult<String> {
    Ok(ConsentRecord::from_json(record_json)?.suggested_filename())
}

/// Python module for consent PDF rendering
#[pymodule]
fn consent_pdf_rust(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyConsentRenderer>()?;
    m.add_function(wrap_pyfunction!(suggested_filename, m)?)?;
    Ok(())
}
