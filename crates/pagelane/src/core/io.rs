//! File I/O utilities.
//!
//! Path validation, directory traversal for job sources, and the sidecar text
//! round trip used by workers.

use crate::{PagelaneError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to an overlay path to form its sidecar text path.
pub const SIDECAR_SUFFIX: &str = ".txt";

/// Validate that a file or directory exists.
///
/// # Errors
///
/// Returns `PagelaneError::Validation` if the path doesn't exist.
pub fn validate_path_exists(path: impl AsRef<Path>) -> Result<()> {
    if !path.as_ref().exists() {
        return Err(PagelaneError::validation(format!(
            "Path does not exist: {}",
            path.as_ref().display()
        )));
    }
    Ok(())
}

/// Sidecar text path for an overlay: the suffix is appended, never substituted.
///
/// `out/page.jpg` becomes `out/page.jpg.txt`.
pub fn sidecar_path(output_path: &Path) -> PathBuf {
    let mut raw: OsString = output_path.as_os_str().to_owned();
    raw.push(SIDECAR_SUFFIX);
    PathBuf::from(raw)
}

/// Write the sidecar text and read it back from disk.
///
/// The returned string is what was actually persisted, so callers build
/// their records from the file rather than from the in-memory buffer.
///
/// # Errors
///
/// Returns `PagelaneError::Persistence` if either the write or the read fails.
pub fn write_sidecar(output_path: &Path, text: &str) -> Result<String> {
    let path = sidecar_path(output_path);

    std::fs::write(&path, text.as_bytes()).map_err(|e| {
        PagelaneError::persistence_with_source(format!("Failed to write sidecar {}", path.display()), e)
    })?;

    std::fs::read_to_string(&path).map_err(|e| {
        PagelaneError::persistence_with_source(format!("Failed to read back sidecar {}", path.display()), e)
    })
}

/// Traverse a directory and return all file paths matching a filter, sorted.
///
/// # Arguments
///
/// * `dir` - Directory to traverse
/// * `recursive` - Whether to recursively traverse subdirectories
/// * `filter` - Optional filter function to match files
///
/// # Errors
///
/// Returns `PagelaneError::Validation` if `dir` is not a directory and
/// `PagelaneError::Io` for I/O errors.
pub fn traverse_directory<F>(dir: impl AsRef<Path>, recursive: bool, filter: Option<F>) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let dir = dir.as_ref();
    let mut files = Vec::new();

    if !dir.is_dir() {
        return Err(PagelaneError::validation(format!(
            "Path is not a directory: {}",
            dir.display()
        )));
    }

    traverse_directory_impl(dir, recursive, &filter, &mut files)?;
    files.sort();
    Ok(files)
}

fn traverse_directory_impl<F>(dir: &Path, recursive: bool, filter: &Option<F>, files: &mut Vec<PathBuf>) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    let entries = std::fs::read_dir(dir).map_err(PagelaneError::Io)?;

    for entry in entries {
        let entry = entry.map_err(PagelaneError::Io)?;
        let path = entry.path();

        if path.is_file() {
            let should_include = match filter {
                Some(f) => f(&path),
                None => true,
            };

            if should_include {
                files.push(path);
            }
        } else if path.is_dir() && recursive {
            traverse_directory_impl(&path, recursive, filter, files)?;
        }
    }

    Ok(())
}

/// Create a directory (and parents) if it does not exist yet.
pub fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    std::fs::create_dir_all(dir.as_ref()).map_err(PagelaneError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_validate_path_exists() {
        let dir = tempdir().unwrap();
        assert!(validate_path_exists(dir.path()).is_ok());

        let result = validate_path_exists(dir.path().join("missing.png"));
        assert!(matches!(result, Err(PagelaneError::Validation { .. })));
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(sidecar_path(Path::new("out/page.jpg")), PathBuf::from("out/page.jpg.txt"));
        assert_eq!(sidecar_path(Path::new("scan.pdf_0.jpg")), PathBuf::from("scan.pdf_0.jpg.txt"));
    }

    #[test]
    fn test_write_sidecar_round_trip() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("page.jpg");

        let content = write_sidecar(&output, "first line\nzweite Zeile\n第三行").unwrap();
        assert_eq!(content, "first line\nzweite Zeile\n第三行");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("page.jpg.txt")).unwrap(),
            "first line\nzweite Zeile\n第三行"
        );
    }

    #[test]
    fn test_write_sidecar_missing_directory() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("missing").join("page.jpg");

        let result = write_sidecar(&output, "text");
        assert!(matches!(result, Err(PagelaneError::Persistence { .. })));
    }

    #[test]
    fn test_traverse_directory_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("b.png")).unwrap();
        File::create(dir.path().join("a.png")).unwrap();
        File::create(dir.path().join("notes.md")).unwrap();
        File::create(dir.path().join("nested").join("c.png")).unwrap();

        let files = traverse_directory(
            dir.path(),
            true,
            Some(|p: &Path| p.extension().is_some_and(|e| e == "png")),
        )
        .unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.png"),
                PathBuf::from("nested").join("c.png"),
            ]
        );
    }

    #[test]
    fn test_traverse_directory_non_recursive() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("a.png")).unwrap();
        File::create(dir.path().join("nested").join("c.png")).unwrap();

        let files = traverse_directory(dir.path(), false, None::<fn(&Path) -> bool>).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_traverse_directory_not_a_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.png");
        File::create(&file).unwrap();

        let result = traverse_directory(&file, true, None::<fn(&Path) -> bool>);
        assert!(matches!(result, Err(PagelaneError::Validation { .. })));
    }
}
