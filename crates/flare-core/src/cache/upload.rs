//! Validation of image upload paths.

use std::fmt;

use uuid::Uuid;

use crate::{Error, Result};

const UUID_LEN: usize = 36;
const EXTENSION: &str = ".png";

/// A validated image upload path.
///
/// Accepted shapes are `<ab>/<cd>/<uuid><suffix>.png` and
/// `<category>/<ab>/<cd>/<uuid><suffix>.png`, where `ab` and `cd` are the
/// first and second pair of characters of the UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPath {
    category: Option<String>,
    id: Uuid,
    relative: String,
}

impl UploadPath {
    /// Parses and validates an upload path relative to the image root.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let (category, first, second, file_name) = match segments.as_slice() {
            [first, second, file_name] => (None, *first, *second, *file_name),
            [category, first, second, file_name] => {
                if category.is_empty() || *category == "." || *category == ".." {
                    return Err(Error::invalid_path("invalid category folder"));
                }
                (Some((*category).to_owned()), *first, *second, *file_name)
            }
            _ => {
                return Err(Error::invalid_path(
                    "expected '<ab>/<cd>/<uuid>.png' with an optional category folder",
                ));
            }
        };

        let stem = file_name
            .strip_suffix(EXTENSION)
            .ok_or_else(|| Error::invalid_path("upload must be a .png file"))?;

        let id_text = stem
            .get(..UUID_LEN)
            .ok_or_else(|| Error::invalid_path("file name does not start with a UUID"))?;
        let id = Uuid::try_parse(id_text)
            .map_err(|err| Error::invalid_path("file name does not start with a UUID").with_source(err))?;

        if first != &id_text[..2] || second != &id_text[2..4] {
            return Err(Error::invalid_path(
                "directory segments do not match the UUID prefix",
            ));
        }

        let relative = segments.join("/");
        Ok(Self {
            category,
            id,
            relative,
        })
    }

    /// Returns the UUID embedded in the file name.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the category folder, if the path has one.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Returns the validated path relative to the image root.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative
    }
}

impl fmt::Display for UploadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative)
    }
}
