//! Lexical path validation.

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::{Error, Result};

/// Normalizes a request-relative path without touching the file system.
///
/// Rejects empty paths, NUL bytes, absolute paths, drive prefixes and any
/// `..` that would climb above the root. `.` components are dropped and
/// interior `..` components are folded.
pub fn normalize_relative(relative: &str) -> Result<PathBuf> {
    if relative.contains('\0') {
        return Err(Error::invalid_path("path contains a NUL byte"));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(Error::path_traversal(format!(
                        "path '{relative}' escapes the asset root"
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::path_traversal(format!(
                    "path '{relative}' is absolute"
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::invalid_path("path is empty"));
    }

    Ok(normalized)
}

/// Returns the content type implied by the extension of `path`.
///
/// Unknown extensions yield an empty string.
pub fn content_type(path: impl AsRef<Path>) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or_default()
        .to_owned()
}

/// Returns a unique temporary sibling of `path` used while it is written.
///
/// The temporary file lives in the same directory so the final rename stays
/// on one file system.
pub fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    path.with_file_name(format!(".{name}.{}.part", Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn accepts_nested_relative_paths() {
        assert_eq!(
            normalize_relative("ab/cd/file.png").unwrap(),
            PathBuf::from("ab/cd/file.png")
        );
        assert_eq!(
            normalize_relative("./ab/../ab/cd/file.png").unwrap(),
            PathBuf::from("ab/cd/file.png")
        );
    }

    #[test]
    fn rejects_traversal() {
        for input in [
            "..",
            "../secret",
            "ab/../../secret",
            "ab/cd/../../../etc/passwd",
            "/etc/passwd",
        ] {
            let err = normalize_relative(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathTraversal, "input: {input}");
        }
    }

    #[test]
    fn rejects_empty_and_nul() {
        assert_eq!(
            normalize_relative("").unwrap_err().kind(),
            ErrorKind::InvalidPath
        );
        assert_eq!(
            normalize_relative("./.").unwrap_err().kind(),
            ErrorKind::InvalidPath
        );
        assert_eq!(
            normalize_relative("ab\0cd").unwrap_err().kind(),
            ErrorKind::InvalidPath
        );
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type("ab/cd/file.png"), "image/png");
        assert_eq!(content_type("credits.json"), "application/json");
        assert_eq!(content_type("file.unknownext"), "");
        assert_eq!(content_type("no_extension"), "");
    }

    #[test]
    fn partial_path_is_a_hidden_sibling() {
        let partial = partial_path(Path::new("/root/ab/cd/file.png"));

        assert_eq!(partial.parent(), Some(Path::new("/root/ab/cd")));
        let name = partial.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".file.png."));
        assert!(name.ends_with(".part"));
    }
}
