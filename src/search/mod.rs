use std::{fmt, time::Duration};

use biblatex::{Bibliography, Entry};

use crate::{
    metadata::Metadata,
    resolver,
    text::{clean_string_for_key, clean_string_for_query},
};

pub mod arxiv;
pub mod crossref;
pub mod doi;

/// Separator between author names in every author string we produce.
pub const AUTHOR_SEPARATOR: &str = " and ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Crossref,
    Arxiv,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Crossref => f.write_str("Crossref"),
            Provider::Arxiv => f.write_str("arXiv"),
        }
    }
}

/// One candidate record returned by a provider.
pub trait SearchResult {
    fn title(&self) -> &str;
    /// Full names joined with `" and "`; empty when unknown.
    fn author(&self) -> &str;
    /// Empty when the record has no DOI.
    fn doi(&self) -> &str;
    fn provider(&self) -> Provider;
    /// The bibliography entry for this record. It is resolved on first use and cached; `force`
    /// resolves it again.
    fn get_entry(&mut self, force: bool) -> anyhow::Result<&Entry>;
}

impl fmt::Display for dyn SearchResult + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<&str> = [self.title(), self.author(), self.doi()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// What every search needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Results requested from each provider.
    pub limit: usize,
    /// Contact address for the Crossref polite pool.
    pub mailto: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            limit: 10,
            mailto: None,
        }
    }
}

impl SearchSettings {
    pub fn mailto(&self) -> Option<&str> {
        self.mailto.as_deref().filter(|m| !m.trim().is_empty())
    }
}

pub(crate) fn agent() -> ureq::Agent {
    let cfg = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(5)))
        .timeout_global(Some(Duration::from_secs(30)))
        .build();
    ureq::Agent::new_with_config(cfg)
}

pub(crate) fn user_agent(mailto: Option<&str>) -> String {
    let base = format!("pdflu/{}", env!("CARGO_PKG_VERSION"));
    match mailto {
        Some(mailto) => format!("{base} (mailto:{mailto})"),
        None => base,
    }
}

/// Order `results` by how many query tokens appear in their title or author. Ties keep their
/// input order.
pub fn rank_results(
    mut results: Vec<Box<dyn SearchResult>>,
    query: &str,
) -> Vec<Box<dyn SearchResult>> {
    let query = clean_string_for_query(query);
    let query_tokens: Vec<&str> = query.split_whitespace().collect();

    let score = |result: &dyn SearchResult| {
        let title = clean_string_for_query(result.title());
        let title_tokens: Vec<&str> = title.split_whitespace().collect();
        let author = clean_string_for_query(result.author());
        let author_tokens: Vec<&str> = author.split(AUTHOR_SEPARATOR).collect();
        query_tokens
            .iter()
            .filter(|t| title_tokens.contains(t) || author_tokens.contains(t))
            .count()
    };

    // `sort_by_cached_key` is stable.
    results.sort_by_cached_key(|r| std::cmp::Reverse(score(&**r)));
    results
}

/// The free-text query used for a document without usable identifiers.
pub fn metadata_query(metadata: &Metadata) -> String {
    let title = clean_string_for_query(metadata.title.as_deref().unwrap_or_default());
    let author = clean_string_for_query(metadata.author.as_deref().unwrap_or_default());
    [title, author]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search for the document described by `metadata`: by DOI, then by arXiv ID, then by a text
/// query built from title and author.
pub fn query_metadata(
    metadata: &Metadata,
    settings: &SearchSettings,
) -> Vec<Box<dyn SearchResult>> {
    if metadata.is_empty() {
        return Vec::new();
    }

    if let Some(doi) = metadata.doi.as_deref() {
        let results = boxed(crossref::query_doi(doi, settings.mailto()));
        if !results.is_empty() {
            return results;
        }
        log::info!("nothing found for DOI {doi}");
    }

    if let Some(id) = metadata.arxiv_id.as_deref() {
        let results = boxed(arxiv::query_id(id));
        if !results.is_empty() {
            return results;
        }
        log::info!("nothing found for arXiv ID {id}");
    }

    let query = metadata_query(metadata);
    if query.is_empty() {
        return Vec::new();
    }
    query_string(&query, settings)
}

/// Free-text search over both providers. Crossref results come first, so ranking ties favor them.
pub fn query_string(query: &str, settings: &SearchSettings) -> Vec<Box<dyn SearchResult>> {
    log::info!("searching for {query:?}");
    let crossref = boxed(crossref::query(query, settings.limit, settings.mailto()));
    let arxiv = boxed(arxiv::query(query, settings.limit));
    combine(crossref, arxiv, query, settings.limit)
}

/// Rank both providers' results together and keep the best `limit`.
pub fn combine(
    crossref: Vec<Box<dyn SearchResult>>,
    arxiv: Vec<Box<dyn SearchResult>>,
    query: &str,
    limit: usize,
) -> Vec<Box<dyn SearchResult>> {
    let mut results = crossref;
    results.extend(arxiv);
    let mut ranked = rank_results(results, query);
    ranked.truncate(limit);
    ranked
}

/// Look up a query that is itself a DOI or arXiv ID; other queries go to [`query_string`].
pub fn query_identifier(query: &str, settings: &SearchSettings) -> Vec<Box<dyn SearchResult>> {
    match resolver::lookup(query, settings) {
        Some(results) if !results.is_empty() => results,
        Some(_) => {
            log::info!("identifier lookup for {query:?} found nothing, searching as text");
            query_string(query, settings)
        }
        None => query_string(query, settings),
    }
}

fn boxed<R: SearchResult + 'static>(results: Vec<R>) -> Vec<Box<dyn SearchResult>> {
    results
        .into_iter()
        .map(|r| Box::new(r) as Box<dyn SearchResult>)
        .collect()
}

/// Key for an entry we build ourselves: first author's surname and first title word.
pub fn fallback_key(author: &str, title: &str) -> String {
    let surname = author
        .split(AUTHOR_SEPARATOR)
        .next()
        .and_then(|name| name.split_whitespace().last())
        .unwrap_or_default();
    let word = title.split_whitespace().next().unwrap_or_default();
    let key = clean_string_for_key(&format!("{surname}_{word}"));
    if key.trim_matches('_').is_empty() {
        "unknown".to_string()
    } else {
        key
    }
}

/// Build a `@misc` entry from plain fields without any network access. Empty values are left out.
pub(crate) fn synthesize_entry(key: &str, fields: &[(&str, &str)]) -> anyhow::Result<Entry> {
    let mut bib = format!("@misc{{{key},\n");
    for (name, value) in fields {
        // Unbalanced braces would end the field early, and a trailing backslash escapes the
        // closing one.
        let value: String = value.chars().filter(|c| !matches!(c, '{' | '}')).collect();
        let value = value.trim().trim_end_matches('\\').trim_end();
        if value.is_empty() {
            continue;
        }
        bib.push_str(&format!("    {name} = {{{value}}},\n"));
    }
    bib.push_str("}\n");
    parse_single_entry(&bib)
}

pub(crate) fn parse_single_entry(bib: &str) -> anyhow::Result<Entry> {
    let bib = Bibliography::parse(bib).map_err(|e| anyhow::anyhow!("invalid BibTeX: {e}"))?;
    bib.iter()
        .next()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("BibTeX contained no entry"))
}

/// Resolve an entry for a record: from doi.org when it has a DOI, otherwise (or when the fetch
/// fails) from its own fields.
pub(crate) fn resolve_entry(
    doi: &str,
    synthesize: impl FnOnce() -> anyhow::Result<Entry>,
) -> anyhow::Result<Entry> {
    if doi.is_empty() {
        return synthesize();
    }
    match doi::fetch_bibtex(doi) {
        Ok(entry) => Ok(entry),
        Err(err) => {
            log::warn!("could not fetch BibTeX for {doi}: {err:#}; building the entry locally");
            synthesize()
        }
    }
}
