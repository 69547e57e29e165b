//! Leveled reporting of non-fatal conditions found while decoding.
//!
//! Nothing here halts a decode. Each admitted condition is kept on the
//! decoded [`Image`](crate::Image) and also forwarded to the `log` facade,
//! prefixed `zlib:` when it concerns the compressed image data and `png:`
//! otherwise.

use std::fmt;

/// How much the decoder reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DiagnosticsLevel {
    /// Report nothing.
    Silent,
    /// Report recovered problems only.
    #[default]
    Warnings,
    /// Also report informational notes, such as text metadata.
    Info,
}

impl DiagnosticsLevel {
    /// Whether a condition of `severity` is reported at this level.
    pub fn admits(self, severity: Severity) -> bool {
        match severity {
            Severity::Warning => self >= DiagnosticsLevel::Warnings,
            Severity::Info => self >= DiagnosticsLevel::Info,
        }
    }
}

/// Severity of a single [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Something was wrong but the decoder recovered.
    Warning,
    /// Informational note.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("note"),
        }
    }
}

/// One reported condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious it is.
    pub severity: Severity,
    /// Type tag of the chunk involved, if any.
    pub chunk: Option<[u8; 4]>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Chunk tag as text, if there is one.
    pub fn chunk_name(&self) -> Option<String> {
        self.chunk
            .map(|tag| String::from_utf8_lossy(&tag).into_owned())
    }

    fn log_prefix(&self) -> &'static str {
        match &self.chunk {
            Some(tag) if tag == b"IDAT" => "zlib",
            _ => "png",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk_name() {
            Some(name) => write!(f, "{} [{}]: {}", self.severity, name, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Collector for the diagnostics of one decode.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    level: DiagnosticsLevel,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty collector admitting conditions up to `level`.
    pub fn new(level: DiagnosticsLevel) -> Self {
        Self {
            level,
            entries: Vec::new(),
        }
    }

    /// The level this collector was created with.
    pub fn level(&self) -> DiagnosticsLevel {
        self.level
    }

    /// Record a warning.
    pub fn warn(&mut self, chunk: Option<[u8; 4]>, message: impl Into<String>) {
        self.push(Severity::Warning, chunk, message.into());
    }

    /// Record an informational note.
    pub fn info(&mut self, chunk: Option<[u8; 4]>, message: impl Into<String>) {
        self.push(Severity::Info, chunk, message.into());
    }

    fn push(&mut self, severity: Severity, chunk: Option<[u8; 4]>, message: String) {
        if !self.level.admits(severity) {
            return;
        }
        let diagnostic = Diagnostic {
            severity,
            chunk,
            message,
        };
        match severity {
            Severity::Warning => log::warn!("{}: {}", diagnostic.log_prefix(), diagnostic.message),
            Severity::Info => log::info!("{}: {}", diagnostic.log_prefix(), diagnostic.message),
        }
        self.entries.push(diagnostic);
    }

    /// Everything recorded so far, in order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Recorded warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the collector, returning its entries.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
