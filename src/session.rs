//! The editing session: one document, one outgoing link.
//!
//! The link is read exactly once, in [`Session::open`]. After that every edit
//! is pushed out through the [`AddressSink`], which the session never reads
//! back.

use reqwest::Url;
use tracing::{debug, info};

use crate::codec::{self, ParamSet};
use crate::error::CodecError;
use crate::model::Document;

/// Where the current link is written after each change.
pub trait AddressSink {
    /// Replaces the current link (after an edit).
    fn replace(&mut self, link: &str);

    /// Pushes a new link (after a reset). Defaults to `replace`.
    fn push(&mut self, link: &str) {
        self.replace(link);
    }
}

/// Keeps only the most recent link; the CLI prints it when done.
#[derive(Debug, Default)]
pub struct LatestLink {
    pub link: Option<String>,
}

impl AddressSink for LatestLink {
    fn replace(&mut self, link: &str) {
        self.link = Some(link.to_string());
    }
}

pub struct Session<S: AddressSink> {
    document: Document,
    base: Url,
    sink: S,
}

impl<S: AddressSink> Session<S> {
    /// Decodes `link` (if any) into the starting document. A link without an
    /// invoice number starts from the default document. Nothing is written
    /// to the sink here.
    pub fn open(base_url: &str, link: Option<&str>, sink: S) -> Result<Self, CodecError> {
        let base = codec::parse_base(base_url)?;
        let document = match link {
            Some(link) => {
                let params = ParamSet::from_link(link)?;
                match codec::decode(&params) {
                    Some(doc) => {
                        info!(invoice_no = %doc.invoice_no, "restored document from link");
                        doc
                    }
                    None => {
                        info!("link carries no document, starting from defaults");
                        Document::default()
                    }
                }
            }
            None => Document::default(),
        };
        Ok(Self { document, base, sink })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Replaces the document with `edit(current)` and writes the new link.
    pub fn apply(&mut self, edit: impl FnOnce(&Document) -> Document) {
        self.document = edit(&self.document);
        let link = self.share_link();
        debug!(len = link.len(), "document changed, link updated");
        self.sink.replace(&link);
    }

    /// Back to the default document, with the query stripped from the link.
    pub fn reset(&mut self) {
        self.document = Document::default();
        let bare = ParamSet::new().link_on(&self.base);
        info!("document reset");
        self.sink.push(&bare);
    }

    pub fn share_link(&self) -> String {
        codec::encode(&self.document).link_on(&self.base)
    }
}
