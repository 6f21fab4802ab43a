//! Small filesystem utilities shared across workspace crates.
//!
//! In particular, this provides helpers for no-clobber file creation:
//! - write to a temp file in the same directory (avoids cross-device renames)
//! - flush + `sync_all`
//! - rename into place *without* replace semantics
//!
//! Save output names must never overwrite an existing file; a rename that
//! refuses to replace surfaces a lost name race as an error.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug)]
pub enum WriteNewError<E> {
    Io(io::Error),
    Writer(E),
}

impl<E> From<io::Error> for WriteNewError<E> {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for WriteNewError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteNewError::Io(err) => write!(f, "io error: {err}"),
            WriteNewError::Writer(err) => write!(f, "write error: {err}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for WriteNewError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteNewError::Io(err) => Some(err),
            WriteNewError::Writer(err) => Some(err),
        }
    }
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` returns `Some("")` for bare relative file names like `out.tdsx`.
    // Treat that as the current directory so callers can use relative paths without
    // having to prepend `./`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Create `dest` by:
/// - writing to a temp file in the same directory
/// - flushing + syncing the temp file
/// - renaming it into place with no-clobber semantics
///
/// If `write_fn` returns an error, or `dest` already exists by rename time,
/// nothing is left behind at `dest` and the temp file is removed.
pub fn write_new<T, E>(
    dest: impl AsRef<Path>,
    write_fn: impl FnOnce(&mut File) -> Result<T, E>,
) -> Result<T, WriteNewError<E>> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir).map_err(WriteNewError::Io)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(WriteNewError::Io)?;
    let out = write_fn(tmp.as_file_mut()).map_err(WriteNewError::Writer)?;

    tmp.as_file_mut().flush().map_err(WriteNewError::Io)?;
    tmp.as_file().sync_all().map_err(WriteNewError::Io)?;

    tmp.into_temp_path()
        .persist_noclobber(dest)
        .map_err(|err| WriteNewError::Io(err.error))?;

    // Best-effort: sync directory metadata after the rename.
    // Failures here are not a write failure (the file is already in place).
    let _ = sync_parent_dir(dest);

    Ok(out)
}

/// Like [`write_new`], but passes a temp file *path* to the closure.
///
/// This is useful for libraries that only offer `save_as(path)` APIs.
///
/// Note: the temp file already exists when `write_fn` is called. `write_fn`
/// should be prepared to overwrite/truncate it (e.g. via `File::create`).
pub fn write_new_with_path<T, E>(
    dest: impl AsRef<Path>,
    write_fn: impl FnOnce(&Path) -> Result<T, E>,
) -> Result<T, WriteNewError<E>> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir).map_err(WriteNewError::Io)?;

    let tmp = NamedTempFile::new_in(dir).map_err(WriteNewError::Io)?;
    let tmp_path = tmp.into_temp_path();
    let tmp_path_ref: &Path = <tempfile::TempPath as AsRef<Path>>::as_ref(&tmp_path);

    let out = write_fn(tmp_path_ref).map_err(WriteNewError::Writer)?;

    // Ensure the temp file's contents are durably flushed before the rename.
    File::open(tmp_path_ref)
        .and_then(|f| f.sync_all())
        .map_err(WriteNewError::Io)?;

    tmp_path
        .persist_noclobber(dest)
        .map_err(|err| WriteNewError::Io(err.error))?;
    let _ = sync_parent_dir(dest);

    Ok(out)
}

/// Convenience helper for writing a full byte slice to a fresh file.
pub fn write_new_bytes(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    write_new(dest, |file| file.write_all(bytes)).map_err(|err| match err {
        WriteNewError::Io(err) => err,
        WriteNewError::Writer(err) => err,
    })
}

/// Copy `src` to `dest` with no-clobber semantics.
pub fn copy_new(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> io::Result<()> {
    let src = src.as_ref();
    write_new(dest, |file| {
        let mut reader = File::open(src)?;
        io::copy(&mut reader, file).map(|_| ())
    })
    .map_err(|err| match err {
        WriteNewError::Io(err) => err,
        WriteNewError::Writer(err) => err,
    })
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = parent_dir_or_dot(path);
    // On most Unix platforms, opening a directory as a file is supported.
    // On others (or on Windows), this may fail; callers treat it as best-effort.
    let dir = File::open(parent)?;
    dir.sync_all()
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: impl AsRef<Path>) -> io::Result<()> {
    match fs::remove_file(path.as_ref()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn write_new_creates_fresh_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("fresh.bin");

        write_new_bytes(&dest, b"hello").expect("write new");
        assert_eq!(std::fs::read(&dest).expect("read file"), b"hello");
    }

    #[test]
    fn write_new_refuses_to_replace_existing_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("existing.bin");

        let sentinel = b"sentinel-bytes";
        std::fs::write(&dest, sentinel).expect("write sentinel dest file");

        let err = write_new_bytes(&dest, b"replacement").expect_err("expected clobber refusal");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        // The destination file must remain untouched.
        assert_eq!(std::fs::read(&dest).expect("read dest"), sentinel);
    }

    #[test]
    fn write_new_with_path_leaves_no_temp_file_on_write_error() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("never-created.bin");

        let err = write_new_with_path(&dest, |tmp_path| {
            std::fs::write(tmp_path, b"partial").expect("write to temp file");
            Err::<(), _>(io::Error::new(io::ErrorKind::Other, "simulated write failure"))
        })
        .expect_err("expected write_new_with_path to return error");

        assert!(
            !dest.exists(),
            "dest must not exist after failed write: {err}"
        );

        // Temp file should be cleaned up.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .expect("read_dir")
            .collect::<Result<Vec<_>, _>>()
            .expect("list dir");
        assert!(
            leftovers.is_empty(),
            "expected empty directory, found {leftovers:?}"
        );
    }

    #[test]
    fn copy_new_copies_bytes() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let src = tmp.path().join("src.bin");
        let dest = tmp.path().join("dest.bin");
        std::fs::write(&src, b"payload").expect("write src");

        copy_new(&src, &dest).expect("copy new");
        assert_eq!(std::fs::read(&dest).expect("read dest"), b"payload");
    }

    #[test]
    fn remove_file_if_exists_tolerates_missing_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        remove_file_if_exists(tmp.path().join("not-there")).expect("missing file is ok");
    }
}
