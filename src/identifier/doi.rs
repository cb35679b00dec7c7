use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;
use url::Url;

use crate::{
    identifier::Identifier,
    resolver::IdFamily,
    search::{self, SearchResult, SearchSettings},
};

/// Characters escaped when a DOI becomes a doi.org path. `/` is kept.
const DOI_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Markers stripped from user input, compared case-insensitively.
const INPUT_PREFIXES: [&str; 6] = [
    "doi:",
    "urn:doi:",
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
];

// Case-insensitive, based on Crossref guidance.
static DOI_ANYWHERE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b10\.\d{4,9}/[-._;()/:A-Z0-9]+\b").unwrap());
static DOI_EXACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:A-Z0-9]+$").unwrap());

/// First DOI anywhere in `text`.
pub fn find_in_text(text: &str) -> Option<String> {
    DOI_ANYWHERE_RE.find(text).map(|m| m.as_str().to_string())
}

/// A DOI typed by the user: bare, after `doi:`, or as a doi.org URL.
pub struct Doi<'a> {
    name: &'a str,
}

impl<'a> Doi<'a> {
    /// The DOI itself, `prefix/suffix`.
    pub fn as_str(&self) -> &'a str {
        self.name
    }

    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://doi.org/{}", utf8_percent_encode(self.name, DOI_PATH)))
    }
}

fn strip_input_prefix(s: &str) -> &str {
    for prefix in INPUT_PREFIXES {
        if s.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix)) {
            return s[prefix.len()..].trim_start();
        }
    }
    s
}

impl<'a> Identifier<'a> for Doi<'a> {
    fn parse(identifier: &'a str) -> Option<Box<Self>> {
        let s = strip_input_prefix(identifier.trim());
        let s = s.split(['?', '#']).next().unwrap_or(s);
        // Punctuation picked up when the DOI was copied out of a sentence.
        let s = s.trim_end_matches(['.', ',', ';', ':', ')', ']', '}', '"', '\'']);
        DOI_EXACT_RE
            .is_match(s)
            .then(|| Box::new(Doi { name: s }))
    }

    fn lookup(&self, settings: &SearchSettings) -> Vec<Box<dyn SearchResult>> {
        search::crossref::query_doi(self.as_str(), settings.mailto())
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn SearchResult>)
            .collect()
    }
}

impl IdFamily for Doi<'_> {
    type For<'a> = Doi<'a>;
}
