/// Filesystem primitives for the quarantine store.
///
/// - [`move_into_store`]: rename, or copy + verify + unlink across devices.
/// - [`move_out_no_clobber`]: restore without ever replacing an existing file.
/// - [`write_json_atomic`]: temp file, fsync, rename.
use crate::hasher::{ContentHash, ContentHasher};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of an in-flight copy; never a valid payload name.
const PARTIAL_SUFFIX: &str = ".partial";

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

pub fn is_partial(path: &Path) -> bool {
    path.to_string_lossy().ends_with(PARTIAL_SUFFIX)
}

fn sync_parent(path: &Path) {
    // Directory fsync persists the rename on Unix; not supported on Windows.
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Copy `src` to `dest` through a temp name, verifying the copy's checksum.
///
/// `dest` must not exist; the final step is a no-clobber link/rename.
fn copy_verified(src: &Path, dest: &Path, expected: &ContentHash, hasher: &ContentHasher) -> io::Result<()> {
    let tmp = partial_path(dest);
    {
        let mut input = File::open(src)?;
        let mut output = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        if let Err(e) = io::copy(&mut input, &mut output).and_then(|_| output.sync_all()) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    }

    match hasher.hash_file(&tmp) {
        Ok(actual) if actual == *expected => {}
        Ok(_) => {
            let _ = fs::remove_file(&tmp);
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "copy does not match source checksum",
            ));
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e.source);
        }
    }

    let placed = fs::hard_link(&tmp, dest).and_then(|_| fs::remove_file(&tmp));
    if let Err(e) = placed {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    sync_parent(dest);
    Ok(())
}

/// Move a file into the store.
///
/// A plain rename is tried first. When that fails for a reason other than
/// the source missing or being locked (typically a cross-device move), the
/// file is copied, verified against `checksum`, and only then unlinked. If
/// the source cannot be unlinked the copy is removed again so the file is
/// never left in both places.
pub fn move_into_store(
    src: &Path,
    dest: &Path,
    checksum: &ContentHash,
    hasher: &ContentHasher,
) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(src, dest) {
        Ok(()) => {
            sync_parent(dest);
            return Ok(());
        }
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            return Err(e)
        }
        Err(e) => debug!("rename {} failed ({e}); copying instead", src.display()),
    }

    copy_verified(src, dest, checksum, hasher)?;
    if let Err(e) = fs::remove_file(src) {
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}

/// Move a payload back to `dest`, failing with `AlreadyExists` if anything
/// occupies `dest`.
///
/// A hard link is used as the no-clobber primitive; filesystems that refuse
/// links (or a cross-device restore) fall back to a verified copy.
pub fn move_out_no_clobber(
    src: &Path,
    dest: &Path,
    checksum: &ContentHash,
    hasher: &ContentHasher,
) -> io::Result<()> {
    match fs::hard_link(src, dest) {
        Ok(()) => {
            sync_parent(dest);
            fs::remove_file(src)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            debug!("hard link to {} failed ({e}); copying instead", dest.display());
            if fs::symlink_metadata(dest).is_ok() {
                return Err(io::Error::new(ErrorKind::AlreadyExists, "destination exists"));
            }
            copy_verified(src, dest, checksum, hasher)?;
            fs::remove_file(src)
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    let tmp = partial_path(path);
    {
        let mut f = File::create(&tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_parent(path);
    Ok(())
}
