use std::{fmt, path::Path};

use crate::identifier::arxiv;

/// What we could work out about a document's identity. Every field is optional; consumers treat
/// a missing field as "try the next source".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    /// Full author names joined with `" and "`.
    pub author: Option<String>,
    pub arxiv_id: Option<String>,
    pub doi: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.arxiv_id.is_none() && self.doi.is_none()
    }

    /// Only an arXiv ID can be read from a file name, e.g. `1706.03762v5.pdf`.
    pub fn from_filename(path: &Path) -> Self {
        let arxiv_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .and_then(|stem| arxiv::find_in_name(&stem));
        Metadata {
            arxiv_id,
            ..Metadata::default()
        }
    }

    /// Combine the three extraction sources. Each field has its own priority order:
    ///
    /// | field      | first       | second      | third    |
    /// |------------|-------------|-------------|----------|
    /// | `title`    | text        | info dict   | filename |
    /// | `author`   | info dict   | text        | filename |
    /// | `arxiv_id` | text        | filename    | info dict|
    /// | `doi`      | info dict   | text        | filename |
    pub fn merge(text: &Metadata, info: &Metadata, filename: &Metadata) -> Metadata {
        fn first(candidates: [&Option<String>; 3]) -> Option<String> {
            candidates
                .into_iter()
                .find_map(|c| c.as_ref().filter(|s| !s.is_empty()))
                .cloned()
        }

        Metadata {
            title: first([&text.title, &info.title, &filename.title]),
            author: first([&info.author, &text.author, &filename.author]),
            arxiv_id: first([&text.arxiv_id, &filename.arxiv_id, &info.arxiv_id]),
            doi: first([&info.doi, &text.doi, &filename.doi]),
        }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        writeln!(f, "Title:    {}", show(&self.title))?;
        writeln!(f, "Author:   {}", show(&self.author))?;
        writeln!(f, "arXiv ID: {}", show(&self.arxiv_id))?;
        write!(f, "DOI:      {}", show(&self.doi))
    }
}
