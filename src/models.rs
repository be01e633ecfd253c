use std::fmt;

pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const ABSTRACT_NOT_FOUND: &str = "Abstract not found";

const SEPARATOR_WIDTH: usize = 80;

/// A kinase name read from the input table. Never empty, compared by exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KinaseName(String);

impl KinaseName {
    /// Trims the raw cell text; returns `None` for blank cells.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KinaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRecord {
    pub title: String,
    pub abstract_text: String,
}

/// One output row: a kinase with the papers collected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinaseResult {
    pub kinase: KinaseName,
    /// Title of the first paper.
    pub title: String,
    /// All papers rendered by [`format_papers`].
    pub abstract_text: String,
}

impl KinaseResult {
    /// Returns `None` when no papers were collected.
    pub fn from_papers(kinase: KinaseName, papers: &[PaperRecord]) -> Option<Self> {
        let first = papers.first()?;
        Some(Self {
            kinase,
            title: first.title.clone(),
            abstract_text: format_papers(papers),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetadata {
    pub extraction_timestamp: String,
    pub user: String,
    pub total_kinases_processed: usize,
}

/// Ordered, append-only record of the kinase results of a run.
#[derive(Debug, Default, Clone)]
pub struct ResultLog {
    entries: Vec<KinaseResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: KinaseResult) {
        self.entries.push(result);
    }

    pub fn entries(&self) -> &[KinaseResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render papers as numbered blocks separated by an 80-character rule.
pub fn format_papers(papers: &[PaperRecord]) -> String {
    let rule = "-".repeat(SEPARATOR_WIDTH);
    let mut out = String::new();
    for (i, paper) in papers.iter().enumerate() {
        out.push_str(&format!("[Paper {}]\n", i + 1));
        out.push_str(&format!("Title: {}\n", paper.title));
        out.push_str(&format!("Abstract: {}\n", paper.abstract_text));
        out.push_str(&rule);
        out.push('\n');
    }
    out
}
