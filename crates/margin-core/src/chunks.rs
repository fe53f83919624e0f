//! Splits a note into heading-scoped chunks for embedding and search.
//!
//! Lines are grouped into sections by markdown headings (ignoring anything
//! inside fenced code blocks), sections into blank-line separated paragraphs,
//! and paragraphs are greedily packed into chunks of at most `max_chars`
//! characters. A paragraph longer than the limit is hard-cut by character
//! count first.

/// Default maximum characters per chunk.
pub const DEFAULT_MAX_CHARS: usize = 1600;

/// Separator between titles in a heading breadcrumb.
pub const HEADING_SEPARATOR: &str = " / ";

/// Title recorded for a heading marker with no text.
const UNTITLED: &str = "Untitled";

/// A chunk of one note, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Breadcrumb of enclosing headings, e.g. `Projects / Margin`. Empty before the first heading.
    pub heading: String,
    /// Index of this chunk within the note (0, 1, 2, …).
    pub index: usize,
    /// Trimmed chunk text. Never empty.
    pub text: String,
}

/// Chunk a single note body. `max_chars == 0` disables the size limit.
pub fn chunk_note(body: &str, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for section in split_sections(body) {
        for text in pack_paragraphs(&section.paragraphs, max_chars) {
            chunks.push(Chunk {
                heading: section.heading.clone(),
                index: chunks.len(),
                text,
            });
        }
    }
    if chunks.is_empty() {
        let whole = body.trim();
        if !whole.is_empty() {
            chunks.push(Chunk {
                heading: String::new(),
                index: 0,
                text: whole.to_string(),
            });
        }
    }
    chunks
}

struct Section {
    heading: String,
    paragraphs: Vec<String>,
}

/// Open code fence: marker character and run length.
#[derive(Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
}

#[derive(Default)]
struct SectionBuilder {
    sections: Vec<Section>,
    heading: String,
    paragraphs: Vec<String>,
    lines: Vec<String>,
}

impl SectionBuilder {
    fn flush_paragraph(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        let text = self.lines.join("\n");
        self.lines.clear();
        let text = text.trim();
        if !text.is_empty() {
            self.paragraphs.push(text.to_string());
        }
    }

    fn flush_section(&mut self) {
        self.flush_paragraph();
        if self.paragraphs.is_empty() {
            return;
        }
        self.sections.push(Section {
            heading: self.heading.clone(),
            paragraphs: std::mem::take(&mut self.paragraphs),
        });
    }
}

fn split_sections(body: &str) -> Vec<Section> {
    let mut b = SectionBuilder::default();
    let mut stack: Vec<String> = Vec::new();
    let mut fence: Option<Fence> = None;

    for line in body.split('\n') {
        let trimmed = line.trim();
        if let Some(run) = fence_run(trimmed) {
            fence = match fence {
                None => Some(run),
                Some(open) if closes(open, run, trimmed) => None,
                still_open => still_open,
            };
            b.lines.push(line.to_string());
            continue;
        }
        if fence.is_none() {
            if let Some((level, title)) = parse_heading(trimmed) {
                b.flush_section();
                stack.truncate(level - 1);
                stack.push(title.to_string());
                b.heading = stack.join(HEADING_SEPARATOR);
                continue;
            }
        }
        if trimmed.is_empty() {
            b.flush_paragraph();
            continue;
        }
        b.lines.push(line.to_string());
    }
    b.flush_section();
    b.sections
}

/// Leading run of 3+ backticks or tildes.
fn fence_run(trimmed: &str) -> Option<Fence> {
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    (len >= 3).then_some(Fence { marker, len })
}

/// A closing fence uses the same marker, is at least as long, and has no info string.
fn closes(open: Fence, run: Fence, trimmed: &str) -> bool {
    run.marker == open.marker
        && run.len >= open.len
        && trimmed.chars().skip(run.len).all(char::is_whitespace)
}

/// `# Title` .. `###### Title`. Returns the level and title (`Untitled` if empty).
fn parse_heading(trimmed: &str) -> Option<(usize, &str)> {
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim();
    Some((level, if title.is_empty() { UNTITLED } else { title }))
}

/// Greedily packs paragraph fragments into chunks, joined by a blank line.
fn pack_paragraphs(paragraphs: &[String], max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;
    for paragraph in paragraphs {
        for part in split_by_limit(paragraph, max_chars) {
            let part_chars = part.chars().count();
            if buffer.is_empty() {
                buffer = part;
                buffer_chars = part_chars;
            } else if max_chars == 0 || buffer_chars + 2 + part_chars <= max_chars {
                buffer.push_str("\n\n");
                buffer.push_str(&part);
                buffer_chars += 2 + part_chars;
            } else {
                out.push(std::mem::replace(&mut buffer, part));
                buffer_chars = part_chars;
            }
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
    out
}

/// Hard cut every `max_chars` characters. Not word-aware.
fn split_by_limit(text: &str, max_chars: usize) -> Vec<String> {
    let mut remaining = text.trim();
    if remaining.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![remaining.to_string()];
    }
    let mut parts = Vec::new();
    while let Some((cut, _)) = remaining.char_indices().nth(max_chars) {
        parts.push(remaining[..cut].trim().to_string());
        remaining = remaining[cut..].trim();
    }
    if !remaining.is_empty() {
        parts.push(remaining.to_string());
    }
    parts
}
