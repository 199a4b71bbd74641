//! Non-fatal conversion diagnostics
//!
//! Real-world CDF files routinely point at variables that do not exist or
//! whose shapes disagree. None of that aborts a conversion; each finding is
//! logged through `tracing` and kept in a [`Diagnostics`] report that ends up
//! on the resulting [`Dataset`](crate::dataset::Dataset).

use std::fmt;

/// What kind of inconsistency was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Both calendar and unix time conversions were requested
    ConflictingTimeConversion,
    /// A `DEPEND_*`, `LABL_PTR_*` or `DELTA_*_VAR` names a variable that is not in the catalog
    MissingReference,
    /// A referenced variable's declared size disagrees with the referencing axis
    ShapeMismatch,
    /// A referenced variable exists but holds no data
    EmptyReference,
    /// A label variable's element count disagrees with the coordinate it labels
    LabelSizeMismatch,
    /// Something the backend could not read and replaced with an empty value
    UnreadableValue,
    /// A variable could not be exported to the output sink
    ExportSkipped,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConflictingTimeConversion => "conflicting-time-conversion",
            Self::MissingReference => "missing-reference",
            Self::ShapeMismatch => "shape-mismatch",
            Self::EmptyReference => "empty-reference",
            Self::LabelSizeMismatch => "label-size-mismatch",
            Self::UnreadableValue => "unreadable-value",
            Self::ExportSkipped => "export-skipped",
        }
    }
}

/// A single non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Variable the finding is about, if any
    pub variable: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

/// Ordered collection of diagnostics produced during one conversion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding and log it as a warning.
    pub fn warn(
        &mut self,
        kind: DiagnosticKind,
        variable: Option<&str>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        tracing::warn!(kind = kind.as_str(), variable = variable.unwrap_or(""), "{}", message);
        self.entries.push(Diagnostic {
            kind,
            variable: variable.map(str::to_string),
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any diagnostic of `kind` was recorded.
    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.entries.iter().any(|d| d.kind == kind)
    }

    /// Diagnostics recorded against `variable`.
    pub fn for_variable<'a>(&'a self, variable: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.entries
            .iter()
            .filter(move |d| d.variable.as_deref() == Some(variable))
    }

    pub fn print(&self) {
        if self.entries.is_empty() {
            return;
        }
        println!("\n Diagnostics");
        println!("=============");
        for entry in &self.entries {
            println!("    ⚠ {}", entry);
        }
    }
}
