use crate::search::{SearchResult, SearchSettings};

pub mod arxiv;
pub mod doi;

/// An identifier a user can type in place of a free-text query.
pub trait Identifier<'a>: Sized + 'a {
    fn parse(identifier: &'a str) -> Option<Box<Self>>;
    /// Look the identifier up directly; an empty list means nothing was found.
    fn lookup(&self, settings: &SearchSettings) -> Vec<Box<dyn SearchResult>>;
}
