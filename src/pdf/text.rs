use std::path::Path;

use super::{ScanLimits, layout::TextBox, layout::read_text_boxes, load};
use crate::{
    identifier::{arxiv, doi},
    metadata::Metadata,
    text::clean_text,
};

/// Scan the first pages of `path` for a title and identifiers. Unreadable documents give empty
/// metadata.
pub fn parse_pdf_text(path: &Path, limits: &ScanLimits) -> Metadata {
    let doc = match load(path) {
        Ok(doc) => doc,
        Err(err) => {
            log::debug!("no text metadata for {}: {err:#}", path.display());
            return Metadata::default();
        }
    };
    let boxes = read_text_boxes(&doc, limits.max_pages);
    log::debug!("read {} text boxes from {}", boxes.len(), path.display());
    metadata_from_boxes(&boxes, limits)
}

pub fn metadata_from_boxes(boxes: &[TextBox], limits: &ScanLimits) -> Metadata {
    let mut metadata = Metadata::default();
    for b in boxes {
        let text = b.text();
        if metadata.arxiv_id.is_none() {
            metadata.arxiv_id = arxiv::find_in_text(&text);
        }
        if metadata.doi.is_none() {
            metadata.doi = doi::find_in_text(&text);
        }
    }
    metadata.title = build_title(boxes, limits);
    metadata
}

/// Concatenate the qualifying boxes set in the largest font. A box that would push the title
/// past `max_chars` is skipped and later ones are still tried.
pub fn build_title(boxes: &[TextBox], limits: &ScanLimits) -> Option<String> {
    let candidates: Vec<(String, i64)> = boxes
        .iter()
        .filter_map(|b| candidate(b, limits))
        .collect();
    let threshold = candidates.iter().map(|(_, size)| *size).max()?;

    let mut title = String::new();
    for (text, size) in &candidates {
        if *size < threshold {
            continue;
        }
        let extra = if title.is_empty() { 0 } else { 1 };
        if title.len() + extra + text.len() > limits.max_chars {
            log::trace!("title would overflow, skipping {text:?}");
            continue;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(text);
    }
    (!title.is_empty()).then_some(title)
}

fn candidate(b: &TextBox, limits: &ScanLimits) -> Option<(String, i64)> {
    // Many lines are a body paragraph. `text()` ends every line with a newline, so this is its
    // newline count.
    if b.line_count() > limits.max_lines {
        return None;
    }
    let text = b.text();
    let cleaned = clean_text(&text);
    let words = cleaned.matches(' ').count() + 1;
    if words < limits.min_words || words > limits.max_words {
        return None;
    }
    Some((cleaned, b.font_size()?))
}
