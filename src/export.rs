//! PDF export.
//!
//! render -> inline images -> hand the self-contained surface to a print
//! backend -> write the PDF. The output file only appears once the backend
//! has produced every byte.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{LazyLock, Mutex};

use regex::{Captures, Regex};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::assets::{extension_for_mime, inline_images, parse_data_uri, ImageCache, ImageFetcher, IMAGE_REF};
use crate::error::ExportError;
use crate::model::Document;
use crate::render::{typst_string, unescape_typst, Renderer, Surface};

pub const EXPORT_FAILED_NOTICE: &str = "Export failed, please retry.";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static PATH_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("path pattern is valid"));

fn file_safe(text: &str) -> String {
    let dashed = WHITESPACE.replace_all(text.trim(), "-");
    PATH_UNSAFE.replace_all(&dashed, "-").into_owned()
}

/// `Invoice-<invoice no>-<date>`, safe to use as a file name.
pub fn output_name(doc: &Document) -> String {
    let mut parts = vec!["Invoice".to_string()];
    parts.extend(
        [doc.invoice_no.as_str(), doc.date.as_str()]
            .into_iter()
            .map(file_safe)
            .filter(|p| !p.is_empty()),
    );
    parts.join("-")
}

// ==========================================
// Print backends
// ==========================================

/// Turns a self-contained surface into PDF bytes.
pub trait PrintBackend: Send + Sync {
    fn print(&self, surface: &Surface) -> Result<Vec<u8>, ExportError>;
}

/// Prints through the `typst` CLI inside a throwaway directory.
pub struct TypstPrinter {
    binary: String,
}

impl TypstPrinter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn is_installed(&self) -> bool {
        Command::new(&self.binary).arg("--version").output().is_ok()
    }
}

/// Unpacks inlined images into `dir` and points the markup at the local
/// copies. References that never got inlined, or whose data URI cannot be
/// read, become a visible placeholder.
pub fn materialize(markup: &str, dir: &Path) -> Result<String, ExportError> {
    let mut written = 0usize;
    let mut failure: Option<ExportError> = None;

    let rewritten = IMAGE_REF.replace_all(markup, |caps: &Captures| {
        let src = unescape_typst(&caps[1]);
        if !src.starts_with("data:") {
            warn!("image {src} was not inlined, printing a placeholder");
            return format!("broken-image({}", typst_string(&src));
        }
        match parse_data_uri(&src) {
            Ok(image) => {
                let name = format!("asset-{written}.{}", extension_for_mime(&image.mime));
                written += 1;
                if let Err(e) = fs::write(dir.join(&name), &image.bytes) {
                    failure.get_or_insert(ExportError::Io(e));
                }
                format!("image({}", typst_string(&name))
            }
            Err(e) => {
                warn!("unusable inlined image ({e}), printing a placeholder");
                format!("broken-image({}", typst_string("inline image"))
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(rewritten.into_owned()),
    }
}

impl PrintBackend for TypstPrinter {
    fn print(&self, surface: &Surface) -> Result<Vec<u8>, ExportError> {
        if !self.is_installed() {
            return Err(ExportError::RendererMissing(self.binary.clone()));
        }

        // isolated print context; removed when `context` drops
        let context = tempfile::tempdir()?;
        let markup = materialize(&surface.markup, context.path())?;
        let source = context.path().join("invoice.typ");
        let target = context.path().join("invoice.pdf");
        fs::write(&source, markup)?;

        debug!("compiling {:?}", source);
        let output = Command::new(&self.binary)
            .arg("compile")
            .arg("--root")
            .arg(context.path())
            .arg(&source)
            .arg(&target)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Render(stderr.trim().to_string()));
        }
        Ok(fs::read(&target)?)
    }
}

// ==========================================
// Pipeline
// ==========================================

#[derive(Debug)]
pub struct ExportReport {
    pub path: PathBuf,
    pub inlined: usize,
    pub failed_images: Vec<String>,
}

pub struct Exporter<'a> {
    renderer: &'a Renderer,
    fetcher: &'a dyn ImageFetcher,
    cache: &'a ImageCache,
    backend: &'a dyn PrintBackend,
    // one export at a time
    busy: Mutex<()>,
}

impl<'a> Exporter<'a> {
    pub fn new(
        renderer: &'a Renderer,
        fetcher: &'a dyn ImageFetcher,
        cache: &'a ImageCache,
        backend: &'a dyn PrintBackend,
    ) -> Self {
        Self { renderer, fetcher, cache, backend, busy: Mutex::new(()) }
    }

    /// Renders `doc` and writes `<out_dir>/<output_name>.pdf`.
    pub fn export(&self, doc: &Document, out_dir: &Path) -> Result<ExportReport, ExportError> {
        let _busy = self.busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let surface = self.renderer.render(doc)?;
        let outcome = inline_images(&surface, self.fetcher, self.cache);
        info!(inlined = outcome.inlined, failed = outcome.failed.len(), cached = self.cache.len(), "images inlined");

        let pdf = self.backend.print(&outcome.surface)?;

        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("{}.pdf", output_name(doc)));
        let mut staged = NamedTempFile::new_in(out_dir)?;
        staged.write_all(&pdf)?;
        staged.persist(&path).map_err(|e| ExportError::Io(e.error))?;

        Ok(ExportReport { path, inlined: outcome.inlined, failed_images: outcome.failed })
    }
}

/// Reduces any export failure to the single user notice.
pub fn or_notify<T>(result: Result<T, ExportError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!("export failed: {e}");
            println!("❌ {EXPORT_FAILED_NOTICE}");
            None
        }
    }
}

pub fn export_or_notify(exporter: &Exporter<'_>, doc: &Document, out_dir: &Path) -> Option<ExportReport> {
    or_notify(exporter.export(doc, out_dir))
}
