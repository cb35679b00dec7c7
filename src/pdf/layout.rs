use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, content::Content};

use super::{font::FontDecoder, resolve};

/// Baselines closer than this fraction of the font size belong to the same line.
const SAME_LINE_RATIO: f32 = 0.5;
/// Lines whose baselines are further apart than this multiple of the font size start a new box.
const LINE_GAP_RATIO: f32 = 1.5;
/// Relative change in font size between two lines that starts a new box.
const SIZE_CHANGE_RATIO: f32 = 0.2;
/// `TJ` adjustments (thousandths of an em) at or below this are read as word spaces.
const TJ_SPACE_ADJUSTMENT: f32 = -200.0;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn mul(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// A contiguous block of lines on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBox {
    lines: Vec<String>,
    /// Font size of every non-whitespace character, in reading order.
    sizes: Vec<f32>,
}

impl TextBox {
    #[cfg(test)]
    pub fn new(lines: Vec<String>, sizes: Vec<f32>) -> Self {
        TextBox { lines, sizes }
    }

    /// A box whose characters all share one font size.
    #[cfg(test)]
    pub fn uniform(text: &str, size: f32) -> Self {
        let lines = text.lines().map(str::to_string).collect();
        let sizes = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|_| size)
            .collect();
        TextBox { lines, sizes }
    }

    /// The box text, every line terminated by a newline.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Size of the second character, skipping a possible drop cap; the first one if the box
    /// holds a single character.
    pub fn font_size(&self) -> Option<i64> {
        self.sizes
            .get(1)
            .or_else(|| self.sizes.first())
            .map(|s| s.trunc() as i64)
    }
}

#[derive(Debug, Default)]
struct Line {
    text: String,
    sizes: Vec<f32>,
    y: f32,
    height: f32,
}

impl Line {
    fn push_space(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(' ') {
            self.text.push(' ');
        }
    }
}

struct PageReader<'d> {
    doc: &'d Document,
    font_dicts: HashMap<Vec<u8>, &'d Dictionary>,
    decoders: HashMap<Vec<u8>, FontDecoder>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font: Vec<u8>,
    font_size: f32,
    leading: f32,
    /// Set by positioning operators; the next shown string on the same line gets a space.
    moved: bool,
    current: Option<Line>,
    lines: Vec<Line>,
}

impl<'d> PageReader<'d> {
    fn new(doc: &'d Document, font_dicts: HashMap<Vec<u8>, &'d Dictionary>) -> Self {
        PageReader {
            doc,
            font_dicts,
            decoders: HashMap::new(),
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            font: Vec::new(),
            font_size: 0.0,
            leading: 0.0,
            moved: false,
            current: None,
            lines: Vec::new(),
        }
    }

    fn run(mut self, content: &Content) -> Vec<Line> {
        for op in &content.operations {
            let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();
            match op.operator.as_str() {
                "q" => self.ctm_stack.push(self.ctm),
                "Q" => {
                    if let Some(m) = self.ctm_stack.pop() {
                        self.ctm = m;
                    }
                }
                "cm" if nums.len() == 6 => {
                    let m = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                    self.ctm = mul(&m, &self.ctm);
                }
                "BT" => {
                    self.tm = IDENTITY;
                    self.tlm = IDENTITY;
                    self.moved = true;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.font = name.clone();
                    }
                    if let Some(size) = op.operands.get(1).and_then(number) {
                        self.font_size = size;
                    }
                }
                "TL" if !nums.is_empty() => self.leading = nums[0],
                "Td" if nums.len() == 2 => self.move_line(nums[0], nums[1]),
                "TD" if nums.len() == 2 => {
                    self.leading = -nums[1];
                    self.move_line(nums[0], nums[1]);
                }
                "Tm" if nums.len() == 6 => {
                    self.tlm = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                    self.tm = self.tlm;
                    self.moved = true;
                }
                "T*" => self.move_line(0.0, -self.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(bytes);
                    }
                }
                "'" => {
                    self.move_line(0.0, -self.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(bytes);
                    }
                }
                "\"" => {
                    self.move_line(0.0, -self.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                        self.show(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes),
                                other => {
                                    if number(other).is_some_and(|n| n <= TJ_SPACE_ADJUSTMENT)
                                        && let Some(line) = self.current.as_mut()
                                    {
                                        line.push_space();
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        self.finish_line();
        self.lines
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = mul(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
        self.moved = true;
    }

    fn decoder(&mut self) -> &FontDecoder {
        let doc = self.doc;
        let dict = self.font_dicts.get(&self.font).copied();
        self.decoders
            .entry(self.font.clone())
            .or_insert_with(|| match dict {
                Some(d) => FontDecoder::from_dict(doc, d),
                None => FontDecoder::default(),
            })
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = self.decoder().decode(bytes);
        if text.is_empty() {
            return;
        }

        let rm = mul(&self.tm, &self.ctm);
        let scale = (rm[2] * rm[2] + rm[3] * rm[3]).sqrt();
        let size = (self.font_size * scale).abs();
        let y = rm[5];

        let same_line = self.current.as_ref().is_some_and(|line| {
            (line.y - y).abs() <= SAME_LINE_RATIO * line.height.max(size).max(1.0)
        });
        if !same_line {
            self.finish_line();
            self.current = Some(Line {
                y,
                ..Line::default()
            });
        }
        let moved = std::mem::take(&mut self.moved);
        let Some(line) = self.current.as_mut() else {
            return;
        };
        if same_line && moved {
            line.push_space();
        }
        for c in text.chars() {
            if c.is_whitespace() {
                line.push_space();
            } else {
                line.text.push(c);
                line.sizes.push(size);
            }
        }
        line.height = line.height.max(size);
    }

    fn finish_line(&mut self) {
        if let Some(mut line) = self.current.take() {
            let trimmed = line.text.trim_end().len();
            line.text.truncate(trimmed);
            if !line.sizes.is_empty() {
                self.lines.push(line);
            }
        }
    }
}

/// Fold consecutive lines into boxes.
fn group_lines(lines: Vec<Line>) -> Vec<TextBox> {
    let mut boxes = Vec::new();
    let mut current = TextBox::default();
    let mut prev: Option<(f32, f32)> = None;

    for line in lines {
        if let Some((prev_y, prev_h)) = prev {
            let h = prev_h.max(line.height).max(1.0);
            let gap = prev_y - line.y;
            let size_change = (prev_h - line.height).abs() / h;
            if gap > LINE_GAP_RATIO * h || gap < -SAME_LINE_RATIO * h || size_change > SIZE_CHANGE_RATIO {
                boxes.push(std::mem::take(&mut current));
            }
        }
        prev = Some((line.y, line.height));
        current.lines.push(line.text);
        current.sizes.extend(line.sizes);
    }
    if !current.lines.is_empty() {
        boxes.push(current);
    }
    boxes
}

/// Text boxes of the first `max_pages` pages, in document order. Pages whose content cannot be
/// decoded are skipped.
///
/// Only positioning and text-showing operators are interpreted. Glyph widths are not computed, so
/// line breaks come from changes of the baseline and boxes from the gaps between baselines.
pub fn read_text_boxes(doc: &Document, max_pages: usize) -> Vec<TextBox> {
    let mut boxes = Vec::new();
    for (page_no, page_id) in doc.get_pages().into_iter().take(max_pages) {
        let content = match doc.get_page_content(page_id).map(|data| Content::decode(&data)) {
            Ok(Ok(content)) => content,
            Ok(Err(err)) | Err(err) => {
                log::debug!("skipping page {page_no}: {err}");
                continue;
            }
        };
        let lines = PageReader::new(doc, page_fonts(doc, page_id)).run(&content);
        boxes.extend(group_lines(lines));
    }
    boxes
}

/// Font resources of a page, following inherited `Resources` up the page tree.
fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, &Dictionary> {
    let mut fonts = HashMap::new();
    let mut node = doc.get_object(page_id).and_then(Object::as_dict).ok();
    // Bounded walk; malformed trees can loop.
    for _ in 0..32 {
        let Some(dict) = node else { break };
        if let Some(font_dict) = dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve(doc, r))
            .and_then(|r| r.as_dict().ok())
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|f| resolve(doc, f))
            .and_then(|f| f.as_dict().ok())
        {
            for (name, value) in font_dict.iter() {
                if let Some(font) = resolve(doc, value).and_then(|f| f.as_dict().ok()) {
                    fonts.entry(name.clone()).or_insert(font);
                }
            }
            break;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| resolve(doc, p))
            .and_then(|p| p.as_dict().ok());
    }
    fonts
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
