//! The save/repack pipeline.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tabdoc_fs::WriteNewError;
use tabdoc_model::{DocumentKind, ModelError, TabDocument};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::archive::PackageArchive;
use crate::error::{FileError, Result};
use crate::{FileKind, TabFile};

/// In-package directory that receives newly packaged extract binaries.
pub const EXTRACT_MEMBER_DIR: &str = "Data/Datasources";

/// Caller-supplied member edits applied during one save.
///
/// The plan is owned and consumed by the save call: entries are removed as
/// they are applied, and whatever is left of the `replace` map (keys that
/// matched no package member) is handed back in [`SaveOutcome`] instead of
/// being silently accepted.
#[derive(Debug, Default)]
pub struct ReplacementPlan {
    pub(crate) replace: BTreeMap<String, PathBuf>,
    pub(crate) add: BTreeMap<String, PathBuf>,
}

impl ReplacementPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitute the bytes of an existing sibling member with the contents
    /// of a file on disk.
    pub fn replace_member(
        mut self,
        member_in_package: impl Into<String>,
        source_on_disk: impl Into<PathBuf>,
    ) -> Self {
        self.replace
            .insert(member_in_package.into(), source_on_disk.into());
        self
    }

    /// Insert a file that did not exist in the original package. A non-empty
    /// set of additions promotes a bare save to the packaged format.
    pub fn add_member(
        mut self,
        member_in_package: impl Into<String>,
        source_on_disk: impl Into<PathBuf>,
    ) -> Self {
        self.add
            .insert(member_in_package.into(), source_on_disk.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.add.is_empty()
    }

    pub fn has_additions(&self) -> bool {
        !self.add.is_empty()
    }
}

/// What a save produced.
#[derive(Debug)]
pub struct SaveOutcome {
    /// The file written, with any collision suffix applied.
    pub path: PathBuf,
    /// `replace` entries that matched no package member.
    pub unmatched_replacements: BTreeMap<String, PathBuf>,
}

impl TabFile {
    /// Save the current in-memory state to a new file.
    ///
    /// `new_name` is taken as a base name: any extension is stripped (text
    /// before the first `.` of the file name component) and the final
    /// extension is chosen by the promotion rule: packaged whenever the
    /// original was packaged, any datasource reports a pending extract, or
    /// the plan contains additions. The output name is resolved against the
    /// target directory at call time and never overwrites an existing file:
    /// `name.ext`, then `name (1).ext`, `name (2).ext`, … first free name
    /// wins.
    ///
    /// Every temporary resource this call creates is removed before it
    /// returns, success or failure, and on failure nothing is left at the
    /// output path. The handle remains open for further mutation and
    /// further independent saves.
    pub fn save_new_file(
        &mut self,
        new_name: impl AsRef<Path>,
        plan: ReplacementPlan,
    ) -> Result<SaveOutcome> {
        let requested = new_name.as_ref();
        let file_name = requested
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_name.split('.').next().unwrap_or("").to_string();
        if stem.is_empty() {
            return Err(FileError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty output file name",
            )));
        }
        let dir = parent_dir_or_dot(requested).to_path_buf();

        let has_pending_extract = self
            .datasources()
            .iter()
            .any(|ds| ds.pending_extract().is_some());
        let final_kind = if self.kind.is_packaged() || has_pending_extract || plan.has_additions()
        {
            self.kind.promoted()
        } else {
            self.kind
        };

        let output = collision_free_path(&dir, &stem, final_kind.extension());
        tracing::debug!(
            "saving {} handle as {final_kind} to `{}`",
            self.kind,
            output.display()
        );

        if !final_kind.is_packaged() {
            match &self.document {
                Some(document) => {
                    tabdoc_fs::write_new_with_path(&output, |tmp| document.render_to(tmp))
                        .map_err(|err| match err {
                            WriteNewError::Io(err) => FileError::Io(err),
                            WriteNewError::Writer(err) => FileError::Document(err),
                        })?;
                }
                // Opaque documents round-trip as a byte copy.
                None => tabdoc_fs::copy_new(self.require_original_path()?, &output)?,
            }

            let unmatched = plan.replace;
            warn_unmatched(&unmatched);
            return Ok(SaveOutcome {
                path: output,
                unmatched_replacements: unmatched,
            });
        }

        // Packaged output. All staging lives in a per-call temporary
        // directory, and the archive is built on a temp file that is only
        // persisted to the resolved output name on full success.
        let staging = TempDir::new()?;
        let mut replace = self.staged_replacements.clone();
        replace.extend(plan.replace);
        let mut add = plan.add;

        let consumed_extracts = tabdoc_fs::write_new_with_path(&output, |tmp| {
            self.write_package(tmp, staging.path(), &stem, &mut replace, &mut add)
        })
        .map_err(|err| match err {
            WriteNewError::Io(err) => FileError::Io(err),
            WriteNewError::Writer(err) => err,
        })?;

        // The packaged extract sources are consumed: only delete them once
        // the archive holding their bytes is in place.
        for local in &consumed_extracts {
            tabdoc_fs::remove_file_if_exists(local)?;
            tracing::debug!("removed packaged extract source `{}`", local.display());
        }

        warn_unmatched(&replace);
        Ok(SaveOutcome {
            path: output,
            unmatched_replacements: replace,
        })
    }

    /// Build the output archive. Returns the on-disk extract files whose
    /// bytes were packaged and should be deleted once the archive is
    /// persisted.
    fn write_package(
        &mut self,
        dest: &Path,
        staging: &Path,
        stem: &str,
        replace: &mut BTreeMap<String, PathBuf>,
        add: &mut BTreeMap<String, PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        if let Some(document) = self.document.as_mut() {
            // For a packaged workbook, re-extract the original inner
            // document under a private staging name (never its member name,
            // which the open-time extraction already used) and retarget the
            // shell so its render reads fresh input.
            if self.kind == FileKind::Twbx {
                if let (TabDocument::Workbook(workbook), Some(original), Some(root_member)) =
                    (&mut *document, self.path.as_deref(), self.root_member.as_deref())
                {
                    let mut source = PackageArchive::open(original)?;
                    let inner_dir = staging.join("inner");
                    std::fs::create_dir_all(&inner_dir)?;
                    let staged_inner = source.extract_member(root_member, &inner_dir)?;
                    workbook.set_twb_path(&staged_inner);
                }
            }

            let root_name = match document.kind() {
                DocumentKind::Datasource => format!("{stem}.tds"),
                DocumentKind::Workbook => format!("{stem}.twb"),
            };
            let staged_root = staging.join(&root_name);
            document.render_to(&staged_root)?;
            write_file_member(&mut zip, &root_name, &staged_root, options)?;
        } else if !self.kind.is_packaged() {
            // A bare opaque file promoted by additions: the original file
            // itself becomes the root member.
            let original = self.require_original_path()?;
            let root_name = format!("{stem}.{}", self.kind.extension());
            write_file_member(&mut zip, &root_name, &original, options)?;
        }

        // Sibling members, in original order.
        if !self.siblings.is_empty() {
            let superseded: HashSet<String> = self
                .datasources()
                .iter()
                .filter(|ds| ds.pending_extract().is_some())
                .filter_map(|ds| ds.existing_extract_name())
                .map(str::to_owned)
                .collect();

            let original = self.require_original_path()?;
            let mut source = PackageArchive::open(&original)?;
            for member in &self.siblings {
                if superseded.contains(&member.path) {
                    tracing::debug!(
                        "skipping `{}`: its extract has been superseded",
                        member.path
                    );
                    continue;
                }

                if let Some(on_disk) = replace
                    .remove(&member.path)
                    .or_else(|| add.remove(&member.path))
                {
                    write_file_member(&mut zip, &member.path, &on_disk, options)?;
                } else {
                    let local = source.extract_member(&member.path, staging)?;
                    write_file_member(&mut zip, &member.path, &local, options)?;
                }
            }
        }

        // Remaining additions.
        for (target, on_disk) in std::mem::take(add) {
            write_file_member(&mut zip, &target, &on_disk, options)?;
        }

        // Newly attached extracts, under the fixed resource directory.
        let mut consumed_extracts = Vec::new();
        for ds in self.datasources() {
            let Some(local) = ds.pending_extract() else {
                continue;
            };
            let Some(name) = ds.pending_extract_name() else {
                return Err(FileError::Document(ModelError::Invalid(format!(
                    "pending extract path `{}` has no usable file name",
                    local.display()
                ))));
            };
            let target = format!("{EXTRACT_MEMBER_DIR}/{name}");
            write_file_member(&mut zip, &target, local, options)?;
            consumed_extracts.push(local.to_path_buf());
        }

        let mut inner = zip.finish()?;
        inner.flush()?;
        Ok(consumed_extracts)
    }

    fn require_original_path(&self) -> Result<PathBuf> {
        self.path.clone().ok_or_else(|| {
            FileError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "handle has no original file on disk",
            ))
        })
    }
}

fn write_file_member<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    source: &Path,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)?;
    let mut file = File::open(source)?;
    io::copy(&mut file, zip)?;
    Ok(())
}

fn warn_unmatched(unmatched: &BTreeMap<String, PathBuf>) {
    if !unmatched.is_empty() {
        tracing::warn!(
            "replacement plan entries matched no package member: {:?}",
            unmatched.keys().collect::<Vec<_>>()
        );
    }
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// First free output name in `dir`: `stem.ext`, then `stem (1).ext`,
/// `stem (2).ext`, … against the directory contents at call time.
fn collision_free_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{stem}.{extension}"));
    let mut version = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{stem} ({version}).{extension}"));
        version += 1;
    }
    candidate
}
