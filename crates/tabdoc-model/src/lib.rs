//! Document model for Tableau-family XML documents.
//!
//! The guiding principle is the one the vendor's own tooling rewards: keep
//! the original XML exactly as the desktop product generated it wherever we
//! did not explicitly edit it, and defer all writing until save time so that
//! in-memory changes are always included in their final state. A
//! [`TabDatasource`] therefore carries its source XML verbatim and rewrites
//! only the root attributes it manages; a [`TabWorkbook`] never materializes
//! the full workbook tree at all: it owns the datasource subtree plus the
//! path of the original file, which it copies forward at render time with a
//! regenerated datasources section spliced in.

mod datasource;
mod workbook;

use std::path::Path;

pub use datasource::TabDatasource;
pub use workbook::TabWorkbook;

/// Opening marker of the regenerable bookkeeping block stripped before
/// parsing and on every render.
///
/// The block is matched by literal marker text on a line, not by XML
/// parsing; it can be very large relative to the rest of the document and is
/// rebuilt by the desktop product from the surviving content.
pub const METADATA_OPEN_MARKER: &str = "<metadata-records";
/// Closing marker of the bookkeeping block.
pub const METADATA_CLOSE_MARKER: &str = "</metadata-records";

/// Opening marker of a workbook's datasources section.
pub const DATASOURCES_OPEN_MARKER: &str = "<datasources";
/// Closing marker of a workbook's datasources section.
pub const DATASOURCES_CLOSE_MARKER: &str = "</datasources>";

/// Replacement opening tag used when a workbook's datasources section is
/// parsed standalone. The section as stored in the workbook relies on a
/// namespace declaration from the workbook root that a standalone parse
/// does not see.
pub const SYNTHETIC_DATASOURCES_OPEN: &str =
    "<datasources xmlns:user='http://www.tableausoftware.com/xml/user'>";

/// What kind of document a model object represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Datasource,
    Workbook,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Datasource => "datasource",
            DocumentKind::Workbook => "workbook",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("xml error: {0}")]
    XmlEvent(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid document: {0}")]
    Invalid(String),
}

/// A document opened from disk: either a standalone datasource or a
/// workbook with its datasource subtree.
#[derive(Debug)]
pub enum TabDocument {
    Datasource(TabDatasource),
    Workbook(TabWorkbook),
}

impl TabDocument {
    pub fn kind(&self) -> DocumentKind {
        match self {
            TabDocument::Datasource(_) => DocumentKind::Datasource,
            TabDocument::Workbook(_) => DocumentKind::Workbook,
        }
    }

    /// Ordered datasources of this document. A standalone datasource
    /// document is its own single datasource.
    pub fn datasources(&self) -> &[TabDatasource] {
        match self {
            TabDocument::Datasource(ds) => std::slice::from_ref(ds),
            TabDocument::Workbook(wb) => wb.datasources(),
        }
    }

    pub fn datasources_mut(&mut self) -> &mut [TabDatasource] {
        match self {
            TabDocument::Datasource(ds) => std::slice::from_mut(ds),
            TabDocument::Workbook(wb) => wb.datasources_mut(),
        }
    }

    /// Serialize the current in-memory state to `dest`.
    pub fn render_to(&self, dest: impl AsRef<Path>) -> Result<(), ModelError> {
        match self {
            TabDocument::Datasource(ds) => ds.render_to(dest),
            TabDocument::Workbook(wb) => wb.render_to(dest),
        }
    }
}
