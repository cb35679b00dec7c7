use std::path::Path;

use anyhow::Context;
use lopdf::{Document, Object, Stream};
use serde::Deserialize;

use crate::metadata::Metadata;

pub mod font;
pub mod info;
pub mod layout;
pub mod text;

/// Limits for the text scan that guesses a title. Missing config keys keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanLimits {
    /// Pages to scan from the start of the document.
    pub max_pages: usize,
    /// Boxes with more lines than this are taken for body text.
    pub max_lines: usize,
    pub min_words: usize,
    pub max_words: usize,
    /// Upper bound on the length of the assembled title.
    pub max_chars: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        ScanLimits {
            max_pages: 2,
            max_lines: 4,
            min_words: 2,
            max_words: 30,
            max_chars: 200,
        }
    }
}

/// Run every extractor on `path` and merge the results field by field: the text of the first
/// pages ([`text`]), the document structure ([`info`]) and the file name.
pub fn parse_pdf(path: &Path, limits: &ScanLimits) -> Metadata {
    let filename = Metadata::from_filename(path);
    let info = info::parse_pdf_metadata(path);
    let text = text::parse_pdf_text(path, limits);
    log::debug!("metadata from text:\n{text}");
    log::debug!("metadata from document info:\n{info}");
    log::debug!("metadata from file name:\n{filename}");
    Metadata::merge(&text, &info, &filename)
}

/// The first `count` lines of text on the first page, for a quick look at the document.
pub fn first_lines(path: &Path, count: usize) -> anyhow::Result<Vec<String>> {
    let doc = load(path)?;
    Ok(layout::read_text_boxes(&doc, 1)
        .iter()
        .flat_map(|b| b.lines().iter().cloned())
        .take(count)
        .collect())
}

pub(crate) fn load(path: &Path) -> anyhow::Result<Document> {
    Document::load(path).with_context(|| format!("failed to parse PDF {}", path.display()))
}

/// Follow a reference to the object it points at. Dangling references give `None`.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Stream data with filters applied, or the raw bytes when they cannot be decoded.
pub(crate) fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use lopdf::{
        Dictionary, Document, Object, Stream,
        content::{Content, Operation},
        dictionary,
    };

    use super::*;

    /// Builds small in-memory PDFs for tests.
    #[derive(Default)]
    pub struct PdfBuilder {
        info: Vec<(String, Vec<u8>)>,
        pages: Vec<Vec<Operation>>,
        annots: Vec<Object>,
    }

    impl PdfBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn info(self, key: &str, value: &str) -> Self {
            self.info_bytes(key, value.as_bytes().to_vec())
        }

        pub fn info_bytes(mut self, key: &str, value: Vec<u8>) -> Self {
            self.info.push((key.to_string(), value));
            self
        }

        /// A page showing each `(text, size)` pair on its own line, top to bottom. Pairs are
        /// spaced so that every one lands in its own box.
        pub fn page(mut self, lines: &[(&str, i64)]) -> Self {
            let mut ops = vec![Operation::new("BT", vec![])];
            let mut y = 760;
            for (text, size) in lines {
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(*size)],
                ));
                ops.push(Operation::new(
                    "Tm",
                    vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        Object::Integer(72),
                        Object::Integer(y),
                    ],
                ));
                for (i, line) in text.split('\n').enumerate() {
                    if i > 0 {
                        ops.push(Operation::new(
                            "Td",
                            vec![Object::Integer(0), Object::Integer(-size)],
                        ));
                    }
                    ops.push(Operation::new("Tj", vec![Object::string_literal(line)]));
                }
                y -= 4 * size * (text.split('\n').count() as i64);
            }
            ops.push(Operation::new("ET", vec![]));
            self.pages.push(ops);
            self
        }

        pub fn link(self, uri: &str) -> Self {
            self.raw_annotation(Object::Dictionary(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "A" => dictionary! {
                    "S" => "URI",
                    "URI" => Object::string_literal(uri),
                },
            }))
        }

        pub fn raw_annotation(mut self, annot: Object) -> Self {
            self.annots.push(annot);
            self
        }

        pub fn build(self) -> Document {
            let mut doc = Document::with_version("1.5");
            let pages_id = doc.new_object_id();
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Times-Roman",
            });
            let resources_id = doc.add_object(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            });

            let mut pages = self.pages;
            if pages.is_empty() {
                pages.push(Vec::new());
            }
            let mut kids = Vec::new();
            for (i, ops) in pages.into_iter().enumerate() {
                let data = Content { operations: ops }.encode().expect("encode content");
                let content_id = doc.add_object(Stream::new(Dictionary::new(), data));
                let mut page = dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                };
                if i == 0 && !self.annots.is_empty() {
                    let annots = self
                        .annots
                        .iter()
                        .map(|a| match a {
                            Object::Dictionary(d) => Object::Reference(doc.add_object(d.clone())),
                            other => other.clone(),
                        })
                        .collect::<Vec<_>>();
                    page.set("Annots", Object::Array(annots));
                }
                kids.push(Object::Reference(doc.add_object(page)));
            }

            let count = kids.len() as i64;
            doc.objects.insert(
                pages_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Kids" => kids,
                    "Count" => count,
                    "Resources" => resources_id,
                    "MediaBox" => vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ],
                }),
            );
            let catalog_id = doc.add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            });
            doc.trailer.set("Root", catalog_id);

            if !self.info.is_empty() {
                let mut info = Dictionary::new();
                for (key, value) in self.info {
                    info.set(key, Object::String(value, lopdf::StringFormat::Literal));
                }
                let info_id = doc.add_object(info);
                doc.trailer.set("Info", info_id);
            }
            doc
        }

        /// Write the document into `dir` under `name`.
        pub fn save(self, dir: &Path, name: &str) -> PathBuf {
            let path = dir.join(name);
            let mut doc = self.build();
            doc.save(&path).expect("save pdf");
            path
        }
    }

    #[test]
    fn parse_pdf_merges_all_sources() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = PdfBuilder::new()
            .info("Title", "Untitled1")
            .info("Author", "Kaiming He and Xiangyu Zhang")
            .page(&[
                ("Deep Residual Learning\nfor Image Recognition", 17),
                ("Kaiming He Xiangyu Zhang", 11),
                ("Abstract", 10),
            ])
            .save(dir.path(), "1512.03385v1.pdf");

        let m = parse_pdf(&path, &ScanLimits::default());
        assert_eq!(
            m.title.as_deref(),
            Some("Deep Residual Learning for Image Recognition")
        );
        assert_eq!(m.author.as_deref(), Some("Kaiming He and Xiangyu Zhang"));
        assert_eq!(m.arxiv_id.as_deref(), Some("1512.03385"));
        assert_eq!(m.doi, None);
    }

    #[test]
    fn no_qualifying_text_falls_back_to_info_title() {
        let dir = tempfile::tempdir().expect("tmp dir");
        // Single words only, all below `min_words`.
        let path = PdfBuilder::new()
            .info("Title", "Informative Title")
            .page(&[("Header", 20), ("Body", 10)])
            .save(dir.path(), "paper.pdf");

        let m = parse_pdf(&path, &ScanLimits::default());
        assert_eq!(m.title.as_deref(), Some("Informative Title"));
    }

    #[test]
    fn first_lines_reads_first_page() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = PdfBuilder::new()
            .page(&[("A Title Here", 18), ("Some Author", 11), ("Abstract text", 10)])
            .page(&[("Second page", 10)])
            .save(dir.path(), "paper.pdf");

        let lines = first_lines(&path, 2).expect("lines");
        assert_eq!(lines, ["A Title Here", "Some Author"]);
    }

    #[test]
    fn resolve_follows_references() {
        let mut doc = Document::with_version("1.5");
        let id = doc.add_object(Object::Integer(42));
        let reference = Object::Reference(id);
        assert!(matches!(resolve(&doc, &reference), Some(Object::Integer(42))));
        assert!(resolve(&doc, &Object::Reference((77, 0))).is_none());
    }
}
