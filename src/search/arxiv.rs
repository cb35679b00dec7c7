use anyhow::Context;
use biblatex::Entry;
use chrono::Datelike;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{
    AUTHOR_SEPARATOR, Provider, SearchResult, agent, fallback_key, resolve_entry,
    synthesize_entry, user_agent,
};

const API: &str = "https://export.arxiv.org/api/query";

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomEntry {
    /// Abstract page URL, e.g. `http://arxiv.org/abs/1706.03762v5`.
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub doi: Option<String>,
    pub published: Option<String>,
    pub primary_category: Option<String>,
}

impl AtomEntry {
    /// The versioned arXiv ID taken from the abstract URL.
    pub fn arxiv_id(&self) -> &str {
        self.id
            .split_once("/abs/")
            .map(|(_, id)| id)
            .unwrap_or_else(|| self.id.rsplit('/').next().unwrap_or_default())
    }

    fn year(&self) -> Option<i32> {
        let published = self.published.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(published)
            .map(|d| d.year())
            .ok()
    }
}

pub struct ArxivResult {
    raw: AtomEntry,
    author: String,
    entry: Option<Entry>,
}

impl ArxivResult {
    pub fn new(raw: AtomEntry) -> Self {
        let author = raw.authors.join(AUTHOR_SEPARATOR);
        ArxivResult {
            raw,
            author,
            entry: None,
        }
    }

    fn synthesize(&self) -> anyhow::Result<Entry> {
        let key = fallback_key(&self.author, self.title());
        let year = self.raw.year().map(|y| y.to_string()).unwrap_or_default();
        let eprint = self.raw.arxiv_id();
        let url = format!("https://arxiv.org/abs/{eprint}");
        synthesize_entry(
            &key,
            &[
                ("title", self.title()),
                ("author", self.author.as_str()),
                ("year", year.as_str()),
                ("eprinttype", "arXiv"),
                ("eprint", eprint),
                (
                    "eprintclass",
                    self.raw.primary_category.as_deref().unwrap_or_default(),
                ),
                ("url", url.as_str()),
            ],
        )
    }
}

impl SearchResult for ArxivResult {
    fn title(&self) -> &str {
        &self.raw.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn doi(&self) -> &str {
        self.raw.doi.as_deref().unwrap_or_default()
    }

    fn provider(&self) -> Provider {
        Provider::Arxiv
    }

    fn get_entry(&mut self, force: bool) -> anyhow::Result<&Entry> {
        if self.entry.is_none() || force {
            let entry = resolve_entry(self.doi(), || self.synthesize())?;
            self.entry = Some(entry);
        }
        self.entry
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("entry not resolved"))
    }
}

/// Free-text search over all fields.
pub fn query(query: &str, limit: usize) -> Vec<ArxivResult> {
    let params = [
        ("search_query", format!("all:{query}")),
        ("max_results", limit.to_string()),
    ];
    run(&params, "search")
}

/// Exact lookup by ID; zero or one result.
pub fn query_id(id: &str) -> Vec<ArxivResult> {
    let params = [
        ("id_list", id.to_string()),
        ("max_results", "1".to_string()),
    ];
    run(&params, "lookup")
}

fn run(params: &[(&str, String)], what: &str) -> Vec<ArxivResult> {
    let entries = fetch_atom(params).and_then(|xml| parse_atom(&xml));
    match entries {
        Ok(entries) => entries.into_iter().map(ArxivResult::new).collect(),
        Err(err) => {
            log::warn!("arXiv {what} failed: {err:#}");
            Vec::new()
        }
    }
}

fn fetch_atom(params: &[(&str, String)]) -> anyhow::Result<String> {
    let mut url = url::Url::parse(API)?;
    for (key, value) in params {
        url.query_pairs_mut().append_pair(key, value);
    }
    log::debug!("GET {url}");
    let body: String = agent()
        .get(url.as_str())
        .header("User-Agent", &user_agent(None))
        .call()
        .with_context(|| format!("failed Atom request {url}"))?
        .into_body()
        .read_to_string()
        .context("failed to read Atom response body")?;
    Ok(body)
}

/// Parse every entry of an Atom feed. Error entries, which arXiv returns for malformed IDs, are
/// dropped.
pub fn parse_atom(xml: &str) -> anyhow::Result<Vec<AtomEntry>> {
    // Text is split at entity references, so it is trimmed per element rather than per event.
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut in_author = false;
    let mut cur_text = String::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name();
                if is_local(name.as_ref(), "entry") {
                    current = Some(AtomEntry::default());
                } else if is_local(name.as_ref(), "author") {
                    in_author = true;
                } else if let Some(entry) = current.as_mut() {
                    read_attributes(entry, &e);
                }
                cur_text.clear();
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    read_attributes(entry, &e);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let name = name.as_ref();
                if is_local(name, "entry") {
                    if let Some(entry) = current.take()
                        && !entry.id.contains("/api/errors")
                    {
                        entries.push(entry);
                    }
                } else if is_local(name, "author") {
                    in_author = false;
                } else if let Some(entry) = current.as_mut() {
                    let text = cur_text.trim();
                    if is_local(name, "id") {
                        entry.id = text.to_string();
                    } else if is_local(name, "title") {
                        entry.title = normalize_ws(text);
                    } else if is_local(name, "published") && !text.is_empty() {
                        entry.published = Some(text.to_string());
                    } else if in_author && is_local(name, "name") && !text.is_empty() {
                        entry.authors.push(normalize_ws(text));
                    } else if is_local(name, "doi") && !text.is_empty() {
                        entry.doi.get_or_insert_with(|| text.to_string());
                    }
                }
                cur_text.clear();
            }
            Ok(Event::Text(t)) => {
                cur_text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Ok(Event::CData(t)) => {
                cur_text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Ok(Event::GeneralRef(r)) => match r.resolve_char_ref() {
                Ok(Some(c)) => cur_text.push(c),
                _ => match &*r {
                    b"amp" => cur_text.push('&'),
                    b"lt" => cur_text.push('<'),
                    b"gt" => cur_text.push('>'),
                    b"quot" => cur_text.push('"'),
                    b"apos" => cur_text.push('\''),
                    other => log::debug!("unknown entity &{};", String::from_utf8_lossy(other)),
                },
            },
            Err(e) => return Err(anyhow::anyhow!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

fn read_attributes(entry: &mut AtomEntry, e: &BytesStart<'_>) {
    if is_local(e.name().as_ref(), "primary_category")
        && let Some(term) = get_attr_value(e, b"term")
    {
        entry.primary_category = Some(term);
    }
}

/// Compare local name ignoring namespace prefixes.
fn is_local(name: &[u8], target: &str) -> bool {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..] == target.as_bytes(),
        None => name == target.as_bytes(),
    }
}

fn get_attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(a.value.as_ref()).to_string())
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
