use std::path::Path;

use tracing::warn;

/// Remove rolling-stream leftovers from a previous pipeline incarnation so a
/// live viewer never sees a manifest referencing dead fragments.
///
/// Deletes `<stream_name>*.ts` fragments and the `<stream_name>.m3u8`
/// manifest. Every failure here is a warning; streaming proceeds regardless.
pub fn clean_stale_outputs(live_dir: &Path, stream_name: &str) -> usize {
    let entries = match std::fs::read_dir(live_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read live output directory {:?}: {}", live_dir, e);
            return 0;
        }
    };

    let manifest = format!("{stream_name}.m3u8");
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let is_fragment = name.starts_with(stream_name) && name.ends_with(".ts");
        if is_fragment || name == manifest {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale live output {:?}: {}", path, e),
            }
        }
    }
    removed
}
