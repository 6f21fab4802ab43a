//! Read-side access to package containers.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{FileError, Result};

/// Maximum uncompressed size permitted for any single package member
/// inflated to disk or memory.
///
/// This is a guardrail against ZIP bombs (tiny compressed size, huge
/// uncompressed size) and forged ZIP metadata (an incorrect
/// `uncompressed_size` field).
pub const MAX_MEMBER_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// One archive entry that is not the root document, with its path relative
/// to the archive root. Siblings are binary-opaque: they are never parsed,
/// only copied through (or replaced wholesale) on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMember {
    pub path: String,
}

/// Result of splitting a package's member list into root-document
/// candidates and everything else.
#[derive(Debug)]
pub struct MemberPartition {
    pub root_candidates: Vec<String>,
    pub siblings: Vec<PackageMember>,
}

/// An opened package container.
#[derive(Debug)]
pub struct PackageArchive {
    path: PathBuf,
    members: Vec<String>,
    zip: ZipArchive<BufReader<File>>,
}

impl PackageArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;

        // Capture member names in central-directory order; sibling order in
        // the rebuilt archive follows this order.
        let mut members = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            members.push(entry.name().to_string());
        }

        Ok(Self { path, members, zip })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All file member names, in archive order.
    pub fn member_names(&self) -> &[String] {
        &self.members
    }

    /// Split the member list: a member with no path separator whose name
    /// ends (ASCII case-insensitively) in `root_suffix` is a root-document
    /// candidate; every other member, including any member containing a
    /// path separator regardless of suffix, is a sibling.
    pub fn partition(&self, root_suffix: &str) -> MemberPartition {
        let mut root_candidates = Vec::new();
        let mut siblings = Vec::new();

        for name in &self.members {
            let is_top_level = !name.contains('/');
            if is_top_level && name.to_ascii_lowercase().ends_with(root_suffix) {
                root_candidates.push(name.clone());
            } else {
                siblings.push(PackageMember { path: name.clone() });
            }
        }

        MemberPartition {
            root_candidates,
            siblings,
        }
    }

    /// Extract one member under `dest_dir`, creating intermediate
    /// directories as needed, and return the local path.
    pub fn extract_member(&mut self, member: &str, dest_dir: &Path) -> Result<PathBuf> {
        let mut entry = self.zip.by_name(member)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(FileError::UnsafeMemberPath {
                member: member.to_string(),
            });
        };

        let declared = entry.size();
        if declared > MAX_MEMBER_BYTES {
            return Err(FileError::MemberTooLarge {
                member: member.to_string(),
                size: declared,
                max: MAX_MEMBER_BYTES,
            });
        }

        let dest = dest_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        // Don't trust ZIP metadata alone: cap the bytes we actually observe.
        let mut out = File::create(&dest)?;
        let copied = io::copy(&mut Read::by_ref(&mut entry).take(MAX_MEMBER_BYTES + 1), &mut out)?;
        if copied > MAX_MEMBER_BYTES {
            drop(out);
            let _ = fs::remove_file(&dest);
            return Err(FileError::MemberTooLarge {
                member: member.to_string(),
                size: copied,
                max: MAX_MEMBER_BYTES,
            });
        }

        Ok(dest)
    }

    /// Inflate one member to memory, with the same size guardrails as
    /// [`PackageArchive::extract_member`].
    pub fn read_member(&mut self, member: &str) -> Result<Vec<u8>> {
        let mut entry = self.zip.by_name(member)?;

        let declared = entry.size();
        if declared > MAX_MEMBER_BYTES {
            return Err(FileError::MemberTooLarge {
                member: member.to_string(),
                size: declared,
                max: MAX_MEMBER_BYTES,
            });
        }

        let mut buf = Vec::new();
        Read::by_ref(&mut entry)
            .take(MAX_MEMBER_BYTES + 1)
            .read_to_end(&mut buf)?;
        if buf.len() as u64 > MAX_MEMBER_BYTES {
            return Err(FileError::MemberTooLarge {
                member: member.to_string(),
                size: buf.len() as u64,
                max: MAX_MEMBER_BYTES,
            });
        }

        Ok(buf)
    }
}
