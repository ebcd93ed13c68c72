/// Errors that can occur when validating a document name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input is a relative path component (`.` or `..`)
    #[error("Name cannot be a relative path component: {0}")]
    RelativeComponent(String),

    /// The input contains a path separator or NUL byte
    #[error("Name contains a forbidden character: {0:?}")]
    ForbiddenCharacter(char),
}

/// The filename of a document in the store directory.
///
/// A `DocumentName` is a single path component: it is not blank, is not `.` or
/// `..`, and contains no `/`, `\` or NUL. Joining it to a directory therefore
/// always names an entry directly inside that directory.
///
/// The name is kept exactly as given, surrounding whitespace included, so it
/// addresses the same directory entry it was read from.
///
/// Symlinks are not considered here; the store re-checks the resolved path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentName(String);

impl DocumentName {
    /// Validates `input` as a document filename.
    ///
    /// # Errors
    ///
    /// - [`TextError::Empty`] if the input is empty or only whitespace
    /// - [`TextError::RelativeComponent`] for `.` and `..`
    /// - [`TextError::ForbiddenCharacter`] if a separator or NUL is present
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let input = input.as_ref();
        if input.trim().is_empty() {
            return Err(TextError::Empty);
        }

        if let Some(c) = input.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(TextError::ForbiddenCharacter(c));
        }

        if matches!(input, "." | "..") {
            return Err(TextError::RelativeComponent(input.to_owned()));
        }

        Ok(Self(input.to_owned()))
    }

    /// Returns the filename as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DocumentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
