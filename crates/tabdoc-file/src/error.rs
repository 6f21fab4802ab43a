use std::path::PathBuf;

use crate::FileKind;

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(
        "unsupported file format for `{path}`: expected one of tds, tdsx, twb, twbx, tfl, tflx"
    )]
    UnsupportedFormat { path: PathBuf },

    #[error("cannot create a `{kind}` document from scratch")]
    UnsupportedConstruction { kind: FileKind },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt package archive: {0}")]
    CorruptArchive(#[from] zip::result::ZipError),

    #[error("document error: {0}")]
    Document(#[from] tabdoc_model::ModelError),

    #[error("no root document member ending in `{suffix}` at the top level of `{path}`")]
    MissingRootMember { path: PathBuf, suffix: &'static str },

    #[error("multiple root document candidates at the top level of `{path}`: {candidates:?}")]
    AmbiguousRootMember {
        path: PathBuf,
        candidates: Vec<String>,
    },

    #[error("package member has an unsafe path: `{member}`")]
    UnsafeMemberPath { member: String },

    #[error(
        "package member is too large to extract safely: `{member}` is {size} bytes (max {max} bytes)"
    )]
    MemberTooLarge { member: String, size: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, FileError>;
