use anyhow::Context;
use biblatex::Entry;

use super::{agent, parse_single_entry, user_agent};
use crate::identifier::{Identifier, doi::Doi};

/// BibTeX for a DOI through doi.org content negotiation.
pub fn fetch_bibtex(doi: &str) -> anyhow::Result<Entry> {
    let parsed =
        <Doi<'_> as Identifier<'_>>::parse(doi).with_context(|| format!("not a DOI: {doi}"))?;
    let url = parsed
        .to_url()
        .with_context(|| format!("no doi.org URL for {doi}"))?;
    log::debug!("GET {url} as BibTeX");

    let body: String = agent()
        .get(url.as_str())
        .header("Accept", "application/x-bibtex")
        .header("User-Agent", &user_agent(None))
        .call()
        .with_context(|| format!("content negotiation for {doi} failed"))?
        .into_body()
        .read_to_string()
        .context("failed to read BibTeX response body")?;

    parse_single_entry(&body).with_context(|| format!("doi.org returned unusable BibTeX for {doi}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_doi_without_network() {
        let err = fetch_bibtex("not a doi").expect_err("should fail");
        assert!(err.to_string().contains("not a DOI"));
    }

    #[test]
    fn parses_negotiated_bibtex() {
        // Shape of a doi.org `application/x-bibtex` response.
        let body = " @inproceedings{Vaswani_2017, title={Attention is all you need}, \
                    booktitle={Advances in Neural Information Processing Systems}, \
                    author={Vaswani, Ashish and Shazeer, Noam}, year={2017}, \
                    url={http://dx.doi.org/10.5555/3295222.3295349}, \
                    doi={10.5555/3295222.3295349} }";
        let entry = parse_single_entry(body).expect("entry");
        assert_eq!(entry.key, "Vaswani_2017");
        assert!(entry.fields.contains_key("booktitle"));
    }
}
