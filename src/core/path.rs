//! File name helpers
//!
//! Validation of file and directory names and file extension handling.

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const DEFAULT_NAME: &str = "Untitled";

const INVALID_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Makes names usable as file or directory names on common file systems
pub struct FilenameValidator;

impl FilenameValidator {
    /// Returns `true` if [`FilenameValidator::validate`] would leave `name`
    /// unchanged
    pub fn is_valid(name: &str) -> bool {
        Self::validate(name) == name
    }

    /// Returns a valid version of `name`
    ///
    /// Invalid and control characters are removed, trailing spaces and
    /// periods are stripped, reserved device names get a `_` prefix and an
    /// empty result becomes `Untitled`.
    ///
    /// # Examples
    ///
    /// ```
    /// use batcher::core::path::FilenameValidator;
    ///
    /// assert_eq!(FilenameValidator::validate("a:b?c. "), "abc");
    /// assert_eq!(FilenameValidator::validate("con"), "_con");
    /// assert_eq!(FilenameValidator::validate("???"), "Untitled");
    /// ```
    pub fn validate(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .filter(|c| !c.is_control() && !INVALID_CHARS.contains(c))
            .collect();
        let trimmed = cleaned.trim_end_matches([' ', '.']);

        if trimmed.is_empty() {
            return DEFAULT_NAME.to_string();
        }

        let stem = trimmed.split('.').next().unwrap_or(trimmed);
        if RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(stem))
        {
            return format!("_{trimmed}");
        }

        trimmed.to_string()
    }
}

/// Returns the extension of `filename` (without the period), or `""`
///
/// A leading period alone (`.hidden`) does not make an extension.
pub fn file_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => "",
        Some(index) => &filename[index + 1..],
    }
}

/// Replaces (or adds) the extension of `filename`
///
/// An empty `extension` removes the current one. Unless
/// `keep_extra_trailing_periods` is set, periods left at the end of the
/// name after removing the extension are stripped.
pub fn filename_with_new_extension(
    filename: &str,
    extension: &str,
    keep_extra_trailing_periods: bool,
) -> String {
    let current = file_extension(filename);
    let mut stem = if current.is_empty() {
        filename
    } else {
        &filename[..filename.len() - current.len() - 1]
    };

    if !keep_extra_trailing_periods {
        stem = stem.trim_end_matches('.');
    }

    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}

/// Byte position right before `.extension` at the end of `s`
///
/// Suffixes inserted there leave the extension intact.
pub fn unique_substring_position(s: &str, extension: &str) -> usize {
    if extension.is_empty() {
        return s.len();
    }
    s.len().saturating_sub(extension.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("layer", "layer" ; "already valid")]
    #[test_case("a/b\\c", "abc" ; "path separators")]
    #[test_case("tab\there", "tabhere" ; "control characters")]
    #[test_case("name. . ", "name" ; "trailing periods and spaces")]
    #[test_case("", "Untitled" ; "empty")]
    #[test_case("<>", "Untitled" ; "only invalid")]
    #[test_case("LPT1.png", "_LPT1.png" ; "reserved with extension")]
    #[test_case("console", "console" ; "reserved prefix only")]
    fn test_validate(name: &str, expected: &str) {
        assert_eq!(FilenameValidator::validate(name), expected);
    }

    #[test]
    fn test_is_valid() {
        assert!(FilenameValidator::is_valid("ok.png"));
        assert!(!FilenameValidator::is_valid("bad?.png"));
    }

    #[test_case("image.png", "png" ; "simple")]
    #[test_case("archive.tar.gz", "gz" ; "last component")]
    #[test_case("noext", "" ; "none")]
    #[test_case(".hidden", "" ; "leading period")]
    #[test_case("trailing.", "" ; "trailing period")]
    fn test_file_extension(filename: &str, expected: &str) {
        assert_eq!(file_extension(filename), expected);
    }

    #[test_case("image.png", "jpg", false, "image.jpg" ; "replace")]
    #[test_case("image", "png", false, "image.png" ; "add")]
    #[test_case("image.png", "", false, "image" ; "remove")]
    #[test_case("image..png", "jpg", false, "image.jpg" ; "strip extra periods")]
    #[test_case("image..png", "jpg", true, "image..jpg" ; "keep extra periods")]
    fn test_filename_with_new_extension(
        filename: &str,
        extension: &str,
        keep: bool,
        expected: &str,
    ) {
        assert_eq!(filename_with_new_extension(filename, extension, keep), expected);
    }

    #[test]
    fn test_unique_substring_position() {
        assert_eq!(unique_substring_position("/out/image.png", "png"), 10);
        assert_eq!(unique_substring_position("image", ""), 5);
    }
}
