use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Marker embedded in every in-flight temporary name. A file carrying it at rest is the
/// remnant of an interrupted durable write.
pub const TEMP_MARKER: &str = ".tmp-";
pub const STAGE_MARKER: &str = ".stage-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn temp_sibling_name(final_name: &str, marker: &str) -> String {
    format!(
        ".{}{}{}-{}-{}",
        final_name,
        marker,
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
    )
}

pub fn is_temp_sentinel(file_name: &str) -> bool {
    file_name.contains(TEMP_MARKER) || file_name.contains(STAGE_MARKER)
}

/// Writes `content` to a temporary sibling, forces it to disk, then renames it over
/// `path`. Readers observe either the previous file or the complete new one.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent"))?;
    let final_name = path.file_name().and_then(|v| v.to_str()).unwrap_or("state");
    let tmp_path = parent.join(temp_sibling_name(final_name, TEMP_MARKER));

    if let Err(err) = write_synced(&tmp_path, content) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    sync_parent_dir(parent)
}

/// Appends one line by staging `old + line` next to the target and renaming it into
/// place, so a crash mid-append never truncates records already on disk.
pub fn atomic_append_line(path: &Path, line: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent"))?;
    let final_name = path.file_name().and_then(|v| v.to_str()).unwrap_or("ledger");

    let scratch_dir = parent.join(temp_sibling_name("append", TEMP_MARKER));
    fs::create_dir(&scratch_dir)?;
    let result = stage_append(path, parent, final_name, &scratch_dir, line);
    let _ = fs::remove_dir_all(&scratch_dir);
    result
}

fn stage_append(
    path: &Path,
    parent: &Path,
    final_name: &str,
    scratch_dir: &Path,
    line: &[u8],
) -> std::io::Result<()> {
    let mut record = line.to_vec();
    if !record.ends_with(b"\n") {
        record.push(b'\n');
    }
    let scratch_file = scratch_dir.join(final_name);
    write_synced(&scratch_file, &record)?;

    let stage_path = parent.join(temp_sibling_name(final_name, STAGE_MARKER));
    let staged = (|| {
        let mut out = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&stage_path)?;
        match fs::File::open(path) {
            Ok(mut existing) => {
                std::io::copy(&mut existing, &mut out)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        let mut fresh = fs::File::open(&scratch_file)?;
        std::io::copy(&mut fresh, &mut out)?;
        out.flush()?;
        out.sync_all()
    })();
    if let Err(err) = staged {
        let _ = fs::remove_file(&stage_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&stage_path, path) {
        let _ = fs::remove_file(&stage_path);
        return Err(err);
    }
    sync_parent_dir(parent)
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)?;
    file.write_all(content)?;
    file.flush()?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> std::io::Result<()> {
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}
