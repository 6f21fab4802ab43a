//! Workbook documents.
//!
//! Workbooks are vastly bigger than datasources, and editing datasource
//! attributes is the primary use case, so a workbook is deliberately a
//! shell: it owns the datasource subtree as model objects and remembers
//! where the original file lives. Everything outside the datasources
//! section is reconstructed at render time only by copying the original
//! forward.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{
    DocumentKind, ModelError, TabDatasource, DATASOURCES_CLOSE_MARKER, DATASOURCES_OPEN_MARKER,
    METADATA_CLOSE_MARKER, METADATA_OPEN_MARKER,
};

#[derive(Debug)]
pub struct TabWorkbook {
    twb_path: PathBuf,
    datasources: Vec<TabDatasource>,
}

impl TabWorkbook {
    /// Build a workbook shell from the path of the original workbook file
    /// and its (already filtered, standalone-parseable) datasources section.
    pub fn from_parts(
        twb_path: impl Into<PathBuf>,
        datasources_xml: &str,
    ) -> Result<Self, ModelError> {
        let doc = roxmltree::Document::parse(datasources_xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "datasources" {
            return Err(ModelError::Invalid(format!(
                "expected a <datasources> section root, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut datasources = Vec::new();
        for child in root.children().filter(|n| n.has_tag_name("datasource")) {
            // Slice the child's verbatim text out of the section; the slice
            // may use namespace prefixes declared on the section root, so it
            // is never re-parsed standalone.
            let slice = datasources_xml[child.range()].to_owned();
            datasources.push(TabDatasource::from_node(child, slice));
        }

        Ok(Self {
            twb_path: twb_path.into(),
            datasources,
        })
    }

    pub fn document_kind(&self) -> DocumentKind {
        DocumentKind::Workbook
    }

    /// Path of the nested workbook XML this shell regenerates from.
    pub fn twb_path(&self) -> &Path {
        &self.twb_path
    }

    /// Retarget the shell at a different copy of the workbook XML. The save
    /// pipeline uses this to point at a staging extraction so a render never
    /// reads a file that is about to be deleted.
    pub fn set_twb_path(&mut self, path: impl Into<PathBuf>) {
        self.twb_path = path.into();
    }

    pub fn datasources(&self) -> &[TabDatasource] {
        &self.datasources
    }

    pub fn datasources_mut(&mut self) -> &mut [TabDatasource] {
        &mut self.datasources
    }

    /// Stream the original workbook into `dest`, dropping the bookkeeping
    /// block and splicing a datasources section regenerated from the
    /// in-memory objects in place of the stale original section.
    pub fn render_to(&self, dest: impl AsRef<Path>) -> Result<(), ModelError> {
        let src = BufReader::new(File::open(&self.twb_path)?);
        let mut out = BufWriter::new(File::create(dest.as_ref())?);

        let mut metadata = BlockState::Unseen;
        let mut section = SectionState::BeforeOpen;

        for line in src.lines() {
            let line = line?;

            if section == SectionState::Replacing {
                if line.contains(DATASOURCES_CLOSE_MARKER) {
                    writeln!(out, "{line}")?;
                    section = SectionState::After;
                }
                continue;
            }

            if metadata == BlockState::Unseen && line.contains(METADATA_OPEN_MARKER) {
                metadata = BlockState::Inside;
            }

            if section == SectionState::BeforeOpen
                && metadata != BlockState::Inside
                && line.contains(DATASOURCES_OPEN_MARKER)
            {
                // Keep the workbook's own section opening tag; only the
                // children are regenerated.
                writeln!(out, "{line}")?;
                for ds in &self.datasources {
                    writeln!(out, "{}", ds.to_xml()?.trim_end())?;
                }
                section = SectionState::Replacing;
                continue;
            }

            if metadata != BlockState::Inside {
                writeln!(out, "{line}")?;
            } else if line.contains(METADATA_CLOSE_MARKER) {
                metadata = BlockState::Closed;
            }
        }

        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Unseen,
    Inside,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    BeforeOpen,
    Replacing,
    After,
}
