use crate::{
    identifier::{Identifier, arxiv::Arxiv, doi::Doi},
    search::{SearchResult, SearchSettings},
};

type ParserFn = for<'a> fn(&'a str) -> Option<Box<dyn Lookup + 'a>>;

/// List of parsers to iterate over.
///
/// NOTE: Ordering is important here, as it signifies priority. If two parsers are able to parse a
/// given identifier, the first one to show up in this list will be used.
static PARSERS: &[ParserFn] = &[erase::<Doi>(), erase::<Arxiv>()];

// Use GAT because we don't have higher-kinded types in Rust (sad)
pub trait IdFamily {
    type For<'a>: Identifier<'a>;
}

/// Object-safe view of an [`Identifier`], so parsers of different types can share one list.
pub trait Lookup {
    fn lookup(&self, settings: &SearchSettings) -> Vec<Box<dyn SearchResult>>;
}

impl<'a, T: Identifier<'a>> Lookup for T {
    fn lookup(&self, settings: &SearchSettings) -> Vec<Box<dyn SearchResult>> {
        Identifier::lookup(self, settings)
    }
}

/// Get the parser method of a given identifier `F` and erase its type to make the compiler happy.
const fn erase<F: IdFamily>() -> ParserFn {
    fn call<'a, G: IdFamily>(s: &'a str) -> Option<Box<dyn Lookup + 'a>> {
        <G::For<'a> as Identifier<'a>>::parse(s).map(|x| x as Box<dyn Lookup + 'a>)
    }

    let f: ParserFn = call::<F>;
    f
}

/// Guess what type `identifier` is.
pub fn parse<'a>(identifier: &'a str) -> Option<Box<dyn Lookup + 'a>> {
    PARSERS.iter().find_map(|f| f(identifier))
}

/// Look `identifier` up directly if it is a DOI or an arXiv ID. `None` means the input is not an
/// identifier and should be treated as a free-text query.
pub fn lookup(identifier: &str, settings: &SearchSettings) -> Option<Vec<Box<dyn SearchResult>>> {
    parse(identifier).map(|id| id.lookup(settings))
}
