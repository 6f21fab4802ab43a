//! Standalone datasource documents.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};

use crate::{DocumentKind, ModelError};

/// Package subtree that holds materialized extract binaries.
pub const EXTRACT_DIR: &str = "Data/";

/// A datasource document, either standalone (`.tds` family) or one child of
/// a workbook's datasources section.
///
/// The source XML is preserved verbatim; only the root element's `caption`
/// attribute is rewritten (and only when the caller changed it). Everything
/// the parse captures (`name`, `version`, the existing extract member) is
/// read-only summary data.
#[derive(Debug, Clone)]
pub struct TabDatasource {
    xml: String,
    name: Option<String>,
    caption: Option<String>,
    version: Option<String>,
    existing_extract: Option<String>,
    caption_override: Option<String>,
    pending_extract: Option<PathBuf>,
}

impl TabDatasource {
    /// Parse a standalone `<datasource>` document.
    ///
    /// The input is expected to already have the bookkeeping block stripped;
    /// this parse is the point where a malformed reduced stream surfaces as
    /// a distinct error from filter-stage I/O.
    pub fn from_xml(xml: &str) -> Result<Self, ModelError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "datasource" {
            return Err(ModelError::Invalid(format!(
                "expected a <datasource> root element, found <{}>",
                root.tag_name().name()
            )));
        }
        Ok(Self::from_node(root, xml.to_owned()))
    }

    /// Build a datasource from an already-parsed node plus its verbatim
    /// source slice. Used for workbook datasources, whose slices may carry
    /// namespace prefixes declared on the (synthetic) section root and so
    /// cannot be re-parsed standalone.
    pub(crate) fn from_node(node: roxmltree::Node<'_, '_>, xml: String) -> Self {
        let attr = |name: &str| node.attribute(name).map(str::to_owned);

        let existing_extract = node
            .descendants()
            .filter(|n| n.has_tag_name("connection"))
            .find_map(|n| {
                n.attribute("dbname")
                    .filter(|dbname| dbname.starts_with(EXTRACT_DIR))
            })
            .map(str::to_owned);

        Self {
            xml,
            name: attr("name").or_else(|| attr("formatted-name")),
            caption: attr("caption"),
            version: attr("version"),
            existing_extract,
            caption_override: None,
            pending_extract: None,
        }
    }

    /// Skeleton datasource for from-scratch construction.
    pub fn new(version: &str) -> Self {
        let xml = format!(
            "<?xml version='1.0' encoding='utf-8' ?>\n<datasource inline='true' source-platform='win' version='{version}' xmlns:user='http://www.tableausoftware.com/xml/user'>\n  <connection/>\n</datasource>\n"
        );
        Self {
            xml,
            name: None,
            caption: None,
            version: Some(version.to_owned()),
            existing_extract: None,
            caption_override: None,
            pending_extract: None,
        }
    }

    pub fn document_kind(&self) -> DocumentKind {
        DocumentKind::Datasource
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption_override.as_deref().or(self.caption.as_deref())
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Change the user-facing caption. Applied to the root element's
    /// attributes at render time; the rest of the XML is untouched.
    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.caption_override = Some(caption.into());
    }

    /// In-package member name of the extract this datasource currently
    /// references, when it has one (e.g. `Data/Datasources/Sales.hyper`).
    pub fn existing_extract_name(&self) -> Option<&str> {
        self.existing_extract.as_deref()
    }

    /// On-disk file staged to become this datasource's extract at the next
    /// save. Its presence promotes a bare save to the packaged format.
    pub fn pending_extract(&self) -> Option<&Path> {
        self.pending_extract.as_deref()
    }

    /// File name component of the pending extract, as it will appear under
    /// the package's extract directory.
    pub fn pending_extract_name(&self) -> Option<&str> {
        self.pending_extract
            .as_deref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
    }

    /// Stage an on-disk extract file for packaging at the next save.
    ///
    /// The local file is consumed: after a successful packaged save it has
    /// been copied into the archive and deleted from disk.
    pub fn set_pending_extract(&mut self, path: impl Into<PathBuf>) {
        self.pending_extract = Some(path.into());
    }

    pub fn clear_pending_extract(&mut self) {
        self.pending_extract = None;
    }

    /// Serialize the datasource, applying any caption override.
    pub fn to_xml(&self) -> Result<String, ModelError> {
        match self.caption_override.as_deref() {
            None => Ok(self.xml.clone()),
            Some(caption) => rewrite_root_caption(&self.xml, caption),
        }
    }

    pub fn render_to(&self, dest: impl AsRef<Path>) -> Result<(), ModelError> {
        std::fs::write(dest.as_ref(), self.to_xml()?)?;
        Ok(())
    }
}

/// Rewrite the root `<datasource>` element so its `caption` attribute holds
/// `caption`, passing every other event through unchanged.
fn rewrite_root_caption(xml: &str, caption: &str) -> Result<String, ModelError> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = XmlWriter::new(Vec::with_capacity(xml.len() + 32));

    let mut patched = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) if !patched && e.name().local_name().as_ref() == b"datasource" => {
                writer.write_event(Event::Start(patch_caption_attr(e, caption)?))?;
                patched = true;
            }
            Event::Empty(ref e) if !patched && e.name().local_name().as_ref() == b"datasource" => {
                writer.write_event(Event::Empty(patch_caption_attr(e, caption)?))?;
                patched = true;
            }
            Event::Eof => break,
            ev => writer.write_event(ev)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

fn patch_caption_attr(e: &BytesStart<'_>, caption: &str) -> Result<BytesStart<'static>, ModelError> {
    let name = e.name();
    let tag = std::str::from_utf8(name.as_ref()).unwrap_or("datasource");
    let mut patched = BytesStart::new(tag.to_owned());

    let mut saw_caption = false;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == b"caption" {
            saw_caption = true;
            patched.push_attribute(("caption", caption));
        } else {
            patched.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    if !saw_caption {
        patched.push_attribute(("caption", caption));
    }

    Ok(patched)
}
