//! Splitting tool responses into output and severe diagnostics.

use drivecasa_core::config::{SEVERITY_MARKER, SeveritySection};

/// Lines produced by one or more executed commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Ordinary output lines, in order.
    pub output: Vec<String>,
    /// Lines carrying the severity marker, in order.
    pub errors: Vec<String>,
}

impl ExecutionResult {
    /// Append another result's lines after this one's.
    pub fn extend(&mut self, other: Self) {
        self.output.extend(other.output);
        self.errors.extend(other.errors);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Recognises severe diagnostics by a marker in one delimited field.
///
/// The tool's logger writes `date<TAB>PRIORITY<TAB>origin<TAB>message`, so the
/// default is field 1 split on tabs, matching `SEVERE` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityClassifier {
    delimiter: char,
    field: usize,
    marker: String,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new('\t', 1, SEVERITY_MARKER)
    }
}

impl From<&SeveritySection> for SeverityClassifier {
    fn from(section: &SeveritySection) -> Self {
        Self::new(section.delimiter, section.field, &section.marker)
    }
}

impl SeverityClassifier {
    #[must_use]
    pub fn new(delimiter: char, field: usize, marker: impl Into<String>) -> Self {
        Self {
            delimiter,
            field,
            marker: marker.into(),
        }
    }

    /// Whether the line's marker field equals the marker exactly.
    #[must_use]
    pub fn is_severe(&self, line: &str) -> bool {
        line.split(self.delimiter).nth(self.field) == Some(self.marker.as_str())
    }

    /// Sort lines into output and errors, keeping order within each.
    pub fn classify<'a, I>(&self, lines: I) -> ExecutionResult
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = ExecutionResult::default();
        for line in lines {
            if self.is_severe(line) {
                result.errors.push(line.to_string());
            } else {
                result.output.push(line.to_string());
            }
        }
        result
    }

    /// Classify the text the tool printed before its next prompt.
    ///
    /// The first line is the terminal's echo of the submitted statement and
    /// is discarded. `\r\n` and `\n` both end lines; a trailing partial line
    /// (usually empty) is kept only if it has content.
    #[must_use]
    pub fn classify_response(&self, response: &str) -> ExecutionResult {
        self.classify(response.lines().skip(1))
    }
}
