use std::path::{Path, PathBuf};

use lopdf::{
    Dictionary, Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};

/// Write a one-page PDF showing `lines` (text, font size) top to bottom, with optional document
/// info entries.
pub fn write_pdf(dir: &Path, name: &str, lines: &[(&str, i64)], info: &[(&str, &str)]) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut ops = vec![Operation::new("BT", vec![])];
    let mut y = 740;
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
        ops.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        y -= 4 * size;
    }
    ops.push(Operation::new("ET", vec![]));
    let data = Content { operations: ops }.encode().expect("encode content");
    let content_id = doc.add_object(Stream::new(Dictionary::new(), data));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
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

    if !info.is_empty() {
        let mut dict = Dictionary::new();
        for (key, value) in info {
            dict.set(*key, Object::string_literal(*value));
        }
        let info_id = doc.add_object(dict);
        doc.trailer.set("Info", info_id);
    }

    let path = dir.join(name);
    doc.save(&path).expect("save pdf");
    path
}
