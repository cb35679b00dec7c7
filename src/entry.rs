use biblatex::{Chunk, Entry, Spanned};

/// Field order used when the configuration does not set one.
pub const DEFAULT_FIELD_ORDER: &[&str] = &[
    "title",
    "author",
    "month",
    "year",
    "booktitle",
    "journaltitle",
    "eventtitle",
    "journal",
    "publisher",
    "location",
    "series",
    "volume",
    "number",
    "pages",
    "numpages",
    "issn",
    "doi",
    "url",
    "groups",
    "keywords",
    "comment",
    "file",
];

/// Render `entry` with the fields named in `field_order` first, in that order, followed by the
/// rest alphabetically.
pub fn format_entry(entry: &Entry, field_order: &[String]) -> String {
    let mut out = format!("@{}{{{},\n", entry.entry_type, entry.key);

    let ordered = field_order
        .iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| entry.fields.contains_key(name));
    let mut names: Vec<String> = Vec::new();
    for name in ordered {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    // `fields` is a BTreeMap, so the remainder comes out sorted.
    names.extend(
        entry
            .fields
            .keys()
            .filter(|k| !names.contains(k))
            .cloned()
            .collect::<Vec<_>>(),
    );

    for name in &names {
        if let Some(chunks) = entry.fields.get(name) {
            out.push_str(&format!("    {name} = {{{}}},\n", render_chunks(chunks)));
        }
    }
    out.push('}');
    out
}

fn render_chunks(chunks: &[Spanned<Chunk>]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        match &chunk.v {
            Chunk::Normal(s) => out.push_str(&escape(s)),
            Chunk::Verbatim(s) => out.push_str(s),
            Chunk::Math(s) => {
                out.push('$');
                out.push_str(s);
                out.push('$');
            }
        }
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '&' | '%' | '$' | '#' | '_' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
