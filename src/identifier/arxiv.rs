use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    identifier::Identifier,
    resolver::IdFamily,
    search::{self, SearchResult, SearchSettings},
};

/// New-style ID following an `arXiv:` marker, as printed in paper margins and info dictionaries.
static NEW_TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"arXiv:\s?(\d{4}\.\d{4,5})").unwrap());
/// Legacy ID following an `arXiv:` marker (e.g. `arXiv:hep-th/9901001`).
static OLD_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"arXiv:\s?([A-Za-z-]+(?:\.[A-Za-z-]+)?/\d{7})").unwrap()
});
/// Bare new-style ID, for file names and URLs where no marker is present.
static NEW_BARE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4}\.\d{4,5})").unwrap());

/// First arXiv ID in free text. Only IDs introduced by `arXiv:` count; the new format is tried
/// before the legacy one.
pub fn find_in_text(text: &str) -> Option<String> {
    NEW_TEXT_RE
        .captures(text)
        .or_else(|| OLD_TEXT_RE.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First bare new-style arXiv ID in a file name or URL.
pub fn find_in_name(name: &str) -> Option<String> {
    NEW_BARE_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// An arXiv identifier or URL, normalised to its canonical ID and optional version.
pub struct Arxiv<'a> {
    /// Canonical arXiv ID without version (e.g., "1810.04805" or "astro-ph/0603274").
    canonical_id: &'a str,
    /// Optional explicit version number when present in the input (e.g., Some("2")).
    version: Option<&'a str>,
    legacy: bool,
}

impl<'a> Arxiv<'a> {
    pub fn canonical_id(&self) -> &'a str {
        self.canonical_id
    }

    pub fn version(&self) -> Option<&'a str> {
        self.version
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }
}

impl<'a> Identifier<'a> for Arxiv<'a> {
    fn parse(identifier: &'a str) -> Option<Box<Self>> {
        let mut s = identifier.trim();

        if let Some(rest) = s
            .strip_prefix("arXiv:")
            .or_else(|| s.strip_prefix("arxiv:"))
        {
            s = rest.trim_start();
        }

        // https://arxiv.org/abs/1810.04805v2, https://arxiv.org/pdf/1810.04805v2.pdf
        if let Some((host, path)) = s
            .strip_prefix("http://")
            .or_else(|| s.strip_prefix("https://"))
            .and_then(|rest| rest.split_once('/'))
        {
            let host = host.to_ascii_lowercase();
            if !host.ends_with("arxiv.org") {
                return None;
            }
            let mut path = path.split('?').next().unwrap_or(path);
            if let Some((base, _frag)) = path.split_once('#') {
                path = base;
            }
            if let Some(rest) = path.strip_prefix("abs/") {
                s = rest;
            } else if let Some(rest) = path.strip_prefix("pdf/") {
                s = rest.strip_suffix(".pdf").unwrap_or(rest);
            } else {
                return None;
            }
        }

        static NEWSTYLE_RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(?P<core>\d{4}\.[0-9]{4,5})(?:v(?P<v>\d+))?$").unwrap()
        });
        static LEGACY_RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(?P<core>[A-Za-z-]+(?:\.[A-Za-z-]+)?/[0-9]{7})(?:v(?P<v>\d+))?$").unwrap()
        });

        let s = s.trim_matches('/');
        let (caps, legacy) = match NEWSTYLE_RE.captures(s) {
            Some(c) => (c, false),
            None => (LEGACY_RE.captures(s)?, true),
        };
        Some(Box::new(Arxiv {
            canonical_id: caps.name("core")?.as_str(),
            version: caps.name("v").map(|m| m.as_str()),
            legacy,
        }))
    }

    fn lookup(&self, _settings: &SearchSettings) -> Vec<Box<dyn SearchResult>> {
        let id = match self.version() {
            Some(v) => format!("{}v{v}", self.canonical_id()),
            None => self.canonical_id().to_string(),
        };
        if self.is_legacy() {
            log::debug!("looking up legacy arXiv ID {id}");
        }
        search::arxiv::query_id(&id)
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn SearchResult>)
            .collect()
    }
}

impl IdFamily for Arxiv<'_> {
    type For<'a> = Arxiv<'a>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::Strategy;

    fn new_style_id() -> impl Strategy<Value = String> {
        ("[0-9]{4}", "[0-9]{4,5}").prop_map(|(a, b)| format!("{a}.{b}"))
    }

    #[test]
    fn finds_marked_id_in_free_text() {
        proptest::proptest!(|(id in new_style_id(), lead in "[A-Za-z ,;()]{0,20}", tail in "[A-Za-z ,;()\\[\\]]{0,20}")| {
            let text = format!("{lead}arXiv:{id}{tail}");
            proptest::prop_assert_eq!(find_in_text(&text), Some(id));
        })
    }

    #[test]
    fn free_text_requires_marker() {
        assert_eq!(find_in_text("published as 1810.04805 last year"), None);
        assert_eq!(
            find_in_text("arXiv:1810.04805v2 [cs.CL] 24 May 2019"),
            Some("1810.04805".to_string())
        );
    }

    #[test]
    fn free_text_legacy_id() {
        assert_eq!(
            find_in_text("arXiv:hep-th/9901001v1 4 Jan 1999"),
            Some("hep-th/9901001".to_string())
        );
        assert_eq!(
            find_in_text("arXiv:math.GT/0309136"),
            Some("math.GT/0309136".to_string())
        );
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(
            find_in_text("arXiv:2101.00001 and arXiv:2202.00002"),
            Some("2101.00001".to_string())
        );
    }

    #[test]
    fn bare_id_in_names() {
        assert_eq!(find_in_name("1706.03762v5"), Some("1706.03762".to_string()));
        assert_eq!(
            find_in_name("https://arxiv.org/abs/2303.08774"),
            Some("2303.08774".to_string())
        );
        assert_eq!(find_in_name("vaswani2017attention"), None);
    }

    #[test]
    fn parse_new_style_bare_and_version() {
        let a = <Arxiv<'_> as Identifier<'_>>::parse("1810.04805").unwrap();
        assert_eq!(a.canonical_id(), "1810.04805");
        assert!(a.version().is_none());

        let b = <Arxiv<'_> as Identifier<'_>>::parse("1810.04805v2").unwrap();
        assert_eq!(b.canonical_id(), "1810.04805");
        assert_eq!(b.version(), Some("2"));
    }

    #[test]
    fn parse_legacy_and_prefix_and_url() {
        let a = <Arxiv<'_> as Identifier<'_>>::parse("astro-ph/0603274v1").unwrap();
        assert_eq!(a.canonical_id(), "astro-ph/0603274");
        assert!(a.is_legacy());

        let b = <Arxiv<'_> as Identifier<'_>>::parse("arXiv:1810.04805v3").unwrap();
        assert_eq!(b.canonical_id(), "1810.04805");
        assert_eq!(b.version(), Some("3"));

        let c =
            <Arxiv<'_> as Identifier<'_>>::parse("https://arxiv.org/pdf/1810.04805v1.pdf").unwrap();
        assert_eq!(c.canonical_id(), "1810.04805");
    }

    #[test]
    fn parse_rejects_queries_and_other_hosts() {
        assert!(<Arxiv<'_> as Identifier<'_>>::parse("attention is all you need").is_none());
        assert!(<Arxiv<'_> as Identifier<'_>>::parse("https://example.com/abs/1810.04805").is_none());
    }
}
