//! Package decomposition/recomposition engine for Tableau-family files.
//!
//! A file in this family is either a bare XML document (`.tds`, `.twb`) or
//! a ZIP package wrapping exactly one such document plus arbitrary sibling
//! resource files (`.tdsx`, `.twbx`, `.tflx`). The crate exposes:
//!
//! - [`open`]: the dispatch factory. It classifies a filename and constructs
//!   the matching [`TabFile`] handle, extracting and parsing the embedded
//!   document where the format supports one.
//! - [`TabFile`]: the format handle. It owns the document object (from
//!   `tabdoc-model`), the sibling member inventory captured at open time,
//!   and the staged replacement map; mutation happens through the document
//!   model, and every save is an independent call against the same
//!   in-memory state.
//! - [`TabFile::save_new_file`]: the save/repack pipeline. It decides
//!   whether the output format must be promoted to a packaged form, picks a
//!   collision-free output name, and rebuilds the archive: rendering the
//!   document fresh, copying untouched siblings through byte-for-byte,
//!   applying the caller's [`ReplacementPlan`], and skipping members
//!   superseded by newly-attached extracts.
//!
//! Sibling members are never parsed or mutated here; they are binary
//! content that must round-trip exactly. Every temporary resource a call
//! creates is scoped to that call and removed on success and failure
//! alike, and an output file never overwrites an existing file.

mod archive;
mod error;
mod filter;
mod kind;
mod save;

pub use tabdoc_model as model;

pub use archive::{MemberPartition, PackageArchive, PackageMember, MAX_MEMBER_BYTES};
pub use error::{FileError, Result};
pub use filter::{strip_metadata_records, workbook_datasources_section};
pub use kind::FileKind;
pub use save::{ReplacementPlan, SaveOutcome, EXTRACT_MEMBER_DIR};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tabdoc_model::{DocumentKind, ModelError, TabDatasource, TabDocument, TabWorkbook};
use tempfile::TempDir;

/// Open a Tableau-family file from disk.
///
/// This is the only public entry point for opening: the filename is
/// classified (packaged variants first), the matching handle variant is
/// constructed, and any failure during extraction or parsing aborts the
/// whole open; no partial handle is ever returned.
pub fn open(path: impl AsRef<Path>) -> Result<TabFile> {
    TabFile::open(path)
}

/// A handle on one opened (or freshly created) document file.
#[derive(Debug)]
pub struct TabFile {
    /// Original file on disk; `None` for from-scratch handles.
    pub(crate) path: Option<PathBuf>,
    /// Original kind, fixed at open time.
    pub(crate) kind: FileKind,
    /// `None` for the opaque formats.
    pub(crate) document: Option<TabDocument>,
    /// Non-root members captured at open time, in archive order.
    pub(crate) siblings: Vec<PackageMember>,
    /// Name of the root document member inside the original package.
    pub(crate) root_member: Option<String>,
    /// Replacements staged on the handle; they survive across saves.
    pub(crate) staged_replacements: BTreeMap<String, PathBuf>,
    /// Home of the root document extracted at open time; removed when the
    /// handle drops.
    pub(crate) _workdir: Option<TempDir>,
}

impl TabFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let Some(kind) = FileKind::from_filename(&path.to_string_lossy()) else {
            return Err(FileError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        };
        tracing::debug!("opening `{}` as {kind}", path.display());

        match kind {
            FileKind::Tds => {
                let document = TabDocument::Datasource(load_datasource(path)?);
                Ok(Self::bare(path, kind, Some(document)))
            }
            FileKind::Twb => {
                let document = TabDocument::Workbook(load_workbook(path)?);
                Ok(Self::bare(path, kind, Some(document)))
            }
            FileKind::Tdsx | FileKind::Twbx => Self::open_packaged(path, kind),
            FileKind::Tfl => {
                // Opaque: verify the file is readable, keep no document.
                drop(File::open(path)?);
                Ok(Self::bare(path, kind, None))
            }
            FileKind::Tflx => Self::open_packaged_opaque(path),
        }
    }

    /// Build a document handle from scratch, without an on-disk original.
    ///
    /// Only the datasource kinds support this; workbook-family and opaque
    /// construction is explicitly unsupported.
    pub fn create_new(kind: FileKind, version: &str) -> Result<Self> {
        match kind.document_kind() {
            Some(DocumentKind::Datasource) => Ok(Self {
                path: None,
                kind,
                document: Some(TabDocument::Datasource(TabDatasource::new(version))),
                siblings: Vec::new(),
                root_member: None,
                staged_replacements: BTreeMap::new(),
                _workdir: None,
            }),
            _ => Err(FileError::UnsupportedConstruction { kind }),
        }
    }

    fn bare(path: &Path, kind: FileKind, document: Option<TabDocument>) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            kind,
            document,
            siblings: Vec::new(),
            root_member: None,
            staged_replacements: BTreeMap::new(),
            _workdir: None,
        }
    }

    fn open_packaged(path: &Path, kind: FileKind) -> Result<Self> {
        let Some(suffix) = kind.root_member_suffix() else {
            return Err(FileError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        };

        let mut archive = PackageArchive::open(path)?;
        let partition = archive.partition(suffix);
        let root_member = match partition.root_candidates.as_slice() {
            [] => {
                return Err(FileError::MissingRootMember {
                    path: path.to_path_buf(),
                    suffix,
                })
            }
            [single] => single.clone(),
            _ => {
                return Err(FileError::AmbiguousRootMember {
                    path: path.to_path_buf(),
                    candidates: partition.root_candidates,
                })
            }
        };

        tracing::debug!(
            "extracting root document member `{root_member}` from `{}`",
            path.display()
        );
        let workdir = TempDir::new()?;
        let root_path = archive.extract_member(&root_member, workdir.path())?;

        let document = match kind {
            FileKind::Tdsx => TabDocument::Datasource(load_datasource(&root_path)?),
            _ => TabDocument::Workbook(load_workbook(&root_path)?),
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            kind,
            document: Some(document),
            siblings: partition.siblings,
            root_member: Some(root_member),
            staged_replacements: BTreeMap::new(),
            _workdir: Some(workdir),
        })
    }

    fn open_packaged_opaque(path: &Path) -> Result<Self> {
        let archive = PackageArchive::open(path)?;
        // No document member to locate: every member is an opaque sibling
        // and is carried through a repack unchanged.
        let siblings = archive
            .member_names()
            .iter()
            .map(|name| PackageMember { path: name.clone() })
            .collect();

        Ok(Self {
            path: Some(path.to_path_buf()),
            kind: FileKind::Tflx,
            document: None,
            siblings,
            root_member: None,
            staged_replacements: BTreeMap::new(),
            _workdir: None,
        })
    }

    /// Original kind, fixed at open time.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Path of the original file, when the handle was opened from disk.
    pub fn original_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> Option<&TabDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut TabDocument> {
        self.document.as_mut()
    }

    pub fn document_type(&self) -> Option<DocumentKind> {
        self.document.as_ref().map(TabDocument::kind)
    }

    /// Ordered datasources of the document. Opaque handles yield an empty
    /// slice rather than failing, so mixed collections of handles can be
    /// iterated uniformly.
    pub fn datasources(&self) -> &[TabDatasource] {
        self.document
            .as_ref()
            .map_or(&[], TabDocument::datasources)
    }

    pub fn datasources_mut(&mut self) -> &mut [TabDatasource] {
        self.document
            .as_mut()
            .map_or(&mut [], TabDocument::datasources_mut)
    }

    /// Non-root members of the original package, in archive order.
    pub fn members(&self) -> &[PackageMember] {
        &self.siblings
    }

    /// Stage a member of the package for replacement at the next save.
    ///
    /// Staged entries survive across saves; a save-call plan entry for the
    /// same member wins over the staged one.
    pub fn stage_replacement(
        &mut self,
        member_in_package: impl Into<String>,
        replacement_on_disk: impl Into<PathBuf>,
    ) {
        self.staged_replacements
            .insert(member_in_package.into(), replacement_on_disk.into());
    }
}

fn load_datasource(path: &Path) -> Result<TabDatasource> {
    let filtered = strip_metadata_records(BufReader::new(File::open(path)?))?;
    Ok(TabDatasource::from_xml(&filtered)?)
}

fn load_workbook(path: &Path) -> Result<TabWorkbook> {
    let section = workbook_datasources_section(BufReader::new(File::open(path)?))?.ok_or_else(
        || {
            FileError::Document(ModelError::Invalid(format!(
                "workbook `{}` has no datasources section",
                path.display()
            )))
        },
    )?;
    Ok(TabWorkbook::from_parts(path, &section)?)
}
