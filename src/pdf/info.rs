use std::path::Path;

use lopdf::{Dictionary, Document, Object};

use super::{load, resolve};
use crate::{
    identifier::{arxiv, doi},
    metadata::Metadata,
};

/// Read title, author and identifiers from the PDF structure. A file that cannot be parsed
/// yields empty metadata.
pub fn parse_pdf_metadata(path: &Path) -> Metadata {
    match load(path) {
        Ok(doc) => metadata_from_document(&doc),
        Err(err) => {
            log::debug!("no document metadata for {}: {err:#}", path.display());
            Metadata::default()
        }
    }
}

pub fn metadata_from_document(doc: &Document) -> Metadata {
    let mut metadata = Metadata {
        arxiv_id: annotation_arxiv_id(doc),
        ..Metadata::default()
    };

    let Some(info) = info_dict(doc) else {
        return metadata;
    };

    metadata.title = dict_text(info, b"Title").filter(|s| !s.trim().is_empty());
    metadata.author = dict_text(info, b"Author").filter(|s| !s.trim().is_empty());

    for (key, value) in info.iter() {
        let Some(value) = object_text(value) else {
            continue;
        };
        if metadata.arxiv_id.is_none() {
            metadata.arxiv_id = arxiv::find_in_text(&value);
        }
        if metadata.doi.is_none() {
            metadata.doi = doi::find_in_text(&value);
        }
        log::trace!("info /{}: {value}", String::from_utf8_lossy(key));
    }
    metadata
}

fn info_dict(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info)?.as_dict().ok()
}

fn dict_text(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(object_text)
}

/// Decode a PDF string object: UTF-16BE when it carries a byte-order mark, otherwise the bytes
/// as UTF-8 with invalid sequences dropped.
fn object_text(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(
        String::from_utf8_lossy(bytes)
            .chars()
            .filter(|&c| c != char::REPLACEMENT_CHARACTER)
            .collect(),
    )
}

/// The first new-style arXiv ID found in the URI of a first-page link annotation. Annotations
/// that cannot be resolved are skipped.
fn annotation_arxiv_id(doc: &Document) -> Option<String> {
    let (_, page_id) = doc.get_pages().into_iter().next()?;
    let page = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    let annots = page.get(b"Annots").ok().and_then(|a| resolve(doc, a))?;
    let Ok(annots) = annots.as_array() else {
        log::debug!("first page /Annots is not an array");
        return None;
    };

    annots.iter().find_map(|annot| {
        let uri = annotation_uri(doc, annot);
        if uri.is_none() {
            log::trace!("skipping annotation without a URI: {annot:?}");
        }
        uri.and_then(|uri| arxiv::find_in_name(&uri))
    })
}

fn annotation_uri(doc: &Document, annot: &Object) -> Option<String> {
    let annot = resolve(doc, annot)?.as_dict().ok()?;
    let action = resolve(doc, annot.get(b"A").ok()?)?.as_dict().ok()?;
    let uri = resolve(doc, action.get(b"URI").ok()?)?;
    match uri {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::PdfBuilder;

    #[test]
    fn reads_title_author_and_identifiers() {
        let doc = PdfBuilder::new()
            .info("Title", "Attention Is All You Need")
            .info("Author", "Ashish Vaswani and Noam Shazeer")
            .info("Subject", "arXiv:1706.03762v5 [cs.CL]")
            .info("Keywords", "doi:10.48550/arXiv.1706.03762")
            .build();
        let m = metadata_from_document(&doc);
        assert_eq!(m.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(m.author.as_deref(), Some("Ashish Vaswani and Noam Shazeer"));
        assert_eq!(m.arxiv_id.as_deref(), Some("1706.03762"));
        assert_eq!(m.doi.as_deref(), Some("10.48550/arXiv.1706.03762"));
    }

    #[test]
    fn empty_title_is_ignored() {
        let doc = PdfBuilder::new().info("Title", "").info("Author", "  ").build();
        let m = metadata_from_document(&doc);
        assert!(m.is_empty());
    }

    #[test]
    fn utf16_info_strings() {
        let mut title = vec![0xFE, 0xFF];
        for unit in "Caf\u{e9} Networks".encode_utf16() {
            title.extend(unit.to_be_bytes());
        }
        let doc = PdfBuilder::new().info_bytes("Title", title).build();
        assert_eq!(
            metadata_from_document(&doc).title.as_deref(),
            Some("Caf\u{e9} Networks")
        );
    }

    #[test]
    fn annotation_id_beats_info_dict() {
        let doc = PdfBuilder::new()
            .info("Subject", "arXiv:2222.22222")
            .link("https://github.com/example/repo")
            .link("https://arxiv.org/abs/1810.04805")
            .build();
        assert_eq!(
            metadata_from_document(&doc).arxiv_id.as_deref(),
            Some("1810.04805")
        );
    }

    #[test]
    fn broken_annotations_are_skipped() {
        let doc = PdfBuilder::new()
            .raw_annotation(Object::Integer(7))
            .raw_annotation(Object::Reference((999, 0)))
            .link("https://arxiv.org/pdf/2303.08774")
            .build();
        assert_eq!(
            metadata_from_document(&doc).arxiv_id.as_deref(),
            Some("2303.08774")
        );
    }

    #[test]
    fn unparsable_file_gives_empty_metadata() {
        let file = tempfile::NamedTempFile::new().expect("tmp file");
        std::fs::write(file.path(), b"%PDF-1.4\nthis is not a pdf").expect("write");
        assert!(parse_pdf_metadata(file.path()).is_empty());
    }
}
