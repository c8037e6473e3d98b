//! Pause marker resolution.
//!
//! Scenarios name pause points with a marker string instead of a line
//! number, so edits to the debuggee source do not silently shift where the
//! harness breaks.

use std::path::Path;

use crate::error::RunnerError;

/// Find the 1-based line number of the first line containing `marker`.
pub fn find_marker_line(file: &Path, marker: &str) -> Result<i64, RunnerError> {
    let content = std::fs::read_to_string(file)?;
    for (index, line) in content.lines().enumerate() {
        if line.contains(marker) {
            return Ok(index as i64 + 1);
        }
    }
    Err(RunnerError::MarkerNotFound {
        marker: marker.to_string(),
        file: file.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn marker_line_is_one_based() {
        let file = source_file("package main // CL_PAUSE_1\n");
        assert_eq!(find_marker_line(file.path(), "CL_PAUSE_1").unwrap(), 1);
    }

    #[test]
    fn marker_found_mid_file() {
        let file = source_file("line one\nline two\nx := 1 // CL_PAUSE_2\nline four\n");
        assert_eq!(find_marker_line(file.path(), "CL_PAUSE_2").unwrap(), 3);
    }

    #[test]
    fn first_occurrence_wins() {
        let file = source_file("a // MARK\nb // MARK\n");
        assert_eq!(find_marker_line(file.path(), "MARK").unwrap(), 1);
    }

    #[test]
    fn missing_marker_is_an_error() {
        let file = source_file("no markers here\n");
        let err = find_marker_line(file.path(), "CL_PAUSE_9").unwrap_err();
        assert!(matches!(err, RunnerError::MarkerNotFound { .. }));
        assert!(format!("{err}").contains("CL_PAUSE_9"));
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let err = find_marker_line(Path::new("/nonexistent/main.go"), "X").unwrap_err();
        assert!(matches!(err, RunnerError::Io(_)));
    }
}
