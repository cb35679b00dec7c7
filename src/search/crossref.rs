use anyhow::Context;
use biblatex::Entry;
use serde::Deserialize;

use super::{
    AUTHOR_SEPARATOR, Provider, SearchResult, agent, fallback_key, resolve_entry,
    synthesize_entry, user_agent,
};

const API: &str = "https://api.crossref.org/works";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: T,
}

#[derive(Debug, Deserialize)]
struct WorkList {
    #[serde(default)]
    items: Vec<Work>,
}

/// The parts of a Crossref work record we use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Work {
    #[serde(rename = "DOI")]
    pub doi: String,
    pub title: Vec<String>,
    pub author: Vec<Contributor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Contributor {
    pub given: String,
    pub family: String,
}

impl Contributor {
    fn full_name(&self) -> String {
        [self.given.trim(), self.family.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct CrossrefResult {
    work: Work,
    author: String,
    entry: Option<Entry>,
}

impl CrossrefResult {
    pub fn new(work: Work) -> Self {
        let author = work
            .author
            .iter()
            .map(Contributor::full_name)
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(AUTHOR_SEPARATOR);
        CrossrefResult {
            work,
            author,
            entry: None,
        }
    }

    fn synthesize(&self) -> anyhow::Result<Entry> {
        let key = fallback_key(&self.author, self.title());
        synthesize_entry(&key, &[("title", self.title()), ("author", self.author.as_str())])
    }
}

impl SearchResult for CrossrefResult {
    fn title(&self) -> &str {
        self.work.title.first().map(String::as_str).unwrap_or_default()
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn doi(&self) -> &str {
        &self.work.doi
    }

    fn provider(&self) -> Provider {
        Provider::Crossref
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

/// Free-text search.
pub fn query(query: &str, limit: usize, mailto: Option<&str>) -> Vec<CrossrefResult> {
    match search_works(query, limit, mailto) {
        Ok(works) => works.into_iter().map(CrossrefResult::new).collect(),
        Err(err) => {
            log::warn!("Crossref search failed: {err:#}");
            Vec::new()
        }
    }
}

/// Exact lookup; zero or one result.
pub fn query_doi(doi: &str, mailto: Option<&str>) -> Vec<CrossrefResult> {
    match fetch_work(doi, mailto) {
        Ok(work) => vec![CrossrefResult::new(work)],
        Err(err) => {
            log::warn!("Crossref lookup of {doi} failed: {err:#}");
            Vec::new()
        }
    }
}

fn search_works(query: &str, limit: usize, mailto: Option<&str>) -> anyhow::Result<Vec<Work>> {
    let mut url = url::Url::parse(API)?;
    url.query_pairs_mut()
        .append_pair("query", query)
        .append_pair("rows", &limit.to_string());
    if let Some(mailto) = mailto {
        url.query_pairs_mut().append_pair("mailto", mailto);
    }
    let body = get(url.as_str(), mailto)?;
    let list: Envelope<WorkList> =
        serde_json::from_str(&body).context("unexpected Crossref search response")?;
    Ok(list.message.items)
}

fn fetch_work(doi: &str, mailto: Option<&str>) -> anyhow::Result<Work> {
    let mut url = url::Url::parse(API)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("cannot extend Crossref URL"))?
        .extend(doi.split('/'));
    if let Some(mailto) = mailto {
        url.query_pairs_mut().append_pair("mailto", mailto);
    }
    let body = get(url.as_str(), mailto)?;
    let work: Envelope<Work> =
        serde_json::from_str(&body).context("unexpected Crossref work response")?;
    Ok(work.message)
}

fn get(url: &str, mailto: Option<&str>) -> anyhow::Result<String> {
    log::debug!("GET {url}");
    agent()
        .get(url)
        .header("User-Agent", &user_agent(mailto))
        .call()
        .with_context(|| format!("request to {url} failed"))?
        .into_body()
        .read_to_string()
        .context("failed to read Crossref response body")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"{
        "status": "ok",
        "message-type": "work-list",
        "message": {
            "total-results": 2,
            "items": [
                {
                    "DOI": "10.5555/3295222.3295349",
                    "title": ["Attention is all you need"],
                    "author": [
                        {"given": "Ashish", "family": "Vaswani", "sequence": "first"},
                        {"family": "Shazeer"},
                        {"name": "Google Brain"}
                    ],
                    "type": "proceedings-article"
                },
                {"title": [], "publisher": "Nobody"}
            ]
        }
    }"#;

    fn items() -> Vec<CrossrefResult> {
        let list: Envelope<WorkList> = serde_json::from_str(SEARCH).expect("json");
        list.message.items.into_iter().map(CrossrefResult::new).collect()
    }

    #[test]
    fn reads_search_items() {
        let items = items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), "Attention is all you need");
        assert_eq!(items[0].author(), "Ashish Vaswani and Shazeer");
        assert_eq!(items[0].doi(), "10.5555/3295222.3295349");
        assert_eq!(items[0].provider(), Provider::Crossref);
    }

    #[test]
    fn missing_fields_are_empty() {
        let item = &items()[1];
        assert_eq!(item.title(), "");
        assert_eq!(item.author(), "");
        assert_eq!(item.doi(), "");
    }

    #[test]
    fn no_doi_gives_local_entry() {
        let mut item = CrossrefResult::new(Work {
            title: vec!["Attention Is All You Need".into()],
            author: vec![
                Contributor {
                    given: "Ashish".into(),
                    family: "Vaswani".into(),
                },
                Contributor {
                    given: "Noam".into(),
                    family: "Shazeer".into(),
                },
            ],
            ..Work::default()
        });
        let entry = item.get_entry(false).expect("entry");
        assert_eq!(entry.key, "vaswani_attention");
        assert_eq!(entry.entry_type.to_string(), "misc");
        // Cached on the second call.
        assert_eq!(item.get_entry(false).expect("entry").key, "vaswani_attention");
    }
}
