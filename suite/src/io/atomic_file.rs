//! Whole-file replacement shared by the runtime store and the config writer.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Write `contents` to a temp file beside `path`, then rename it over `path`.
///
/// Each call gets its own temp file, so concurrent writers never interleave
/// bytes and readers see either the old or the new file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp file {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parent_and_leaves_no_temp_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("state.json");

        write_atomic(&path, "first\n").expect("write");
        write_atomic(&path, "second\n").expect("overwrite");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second\n");
        let entries = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(entries, 1);
    }
}
