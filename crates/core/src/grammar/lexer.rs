//! Line-level lexer for the OPERATOR_CMD protocol.
//!
//! Everything here is a plain character-class predicate over one line of
//! text. There is no regex engine involved, so the accepted grammar is
//! exactly what these functions say:
//!
//! - marker lines: the trimmed line equals `OPERATOR_CMD` or `END_OPERATOR_CMD`
//! - body lines: `key : value`, key in `[A-Za-z0-9_.-]+`, split on the first `:`

use operator_cmd_diagnostics::Span;

/// Token that opens a command block.
pub const START_MARKER: &str = "OPERATOR_CMD";
/// Token that closes a command block.
pub const END_MARKER: &str = "END_OPERATOR_CMD";

/// One of the two block markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `OPERATOR_CMD`
    Start,
    /// `END_OPERATOR_CMD`
    End,
}

impl Marker {
    /// The literal marker token.
    pub fn token(self) -> &'static str {
        match self {
            Marker::Start => START_MARKER,
            Marker::End => END_MARKER,
        }
    }
}

/// Classification of one physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// The trimmed line is exactly a marker.
    Marker(Marker),
    /// The line contains a marker token next to other text.
    MarkerNotAlone(Marker),
    /// Empty or whitespace-only.
    Blank,
    /// Anything else: prose outside a block, a body line inside one.
    Text,
}

/// A physical line borrowed from the scanned input.
///
/// `text` excludes the line terminator (`\n`, or `\r\n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Line content without its terminator.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
}

impl<'a> Line<'a> {
    /// Byte span of the line content.
    pub fn span(&self) -> Span {
        Span::new(self.start, self.start + self.text.len())
    }

    /// Classify this line.
    pub fn kind(&self) -> LineKind {
        classify(self.text)
    }
}

/// Iterator over the physical lines of an input buffer.
///
/// Splits on `\n` and strips one trailing `\r`. A final newline does not
/// produce an extra empty line.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    input: &'a str,
    pos: usize,
    number: usize,
}

/// Split `input` into physical lines with their byte offsets.
pub fn lines(input: &str) -> Lines<'_> {
    Lines {
        input,
        pos: 0,
        number: 0,
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Line<'a>> {
        if self.pos >= self.input.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.input[start..];
        let (raw, advance) = match rest.find('\n') {
            Some(nl) => (&rest[..nl], nl + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        self.number += 1;
        Some(Line {
            number: self.number,
            text: raw.strip_suffix('\r').unwrap_or(raw),
            start,
        })
    }
}

/// Classify a line of text.
///
/// `END_OPERATOR_CMD` contains `OPERATOR_CMD`, so the end marker is tested
/// first: a lone end marker is never a misplaced start marker.
pub fn classify(text: &str) -> LineKind {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed == END_MARKER {
        return LineKind::Marker(Marker::End);
    }
    if trimmed == START_MARKER {
        return LineKind::Marker(Marker::Start);
    }
    if text.contains(END_MARKER) {
        return LineKind::MarkerNotAlone(Marker::End);
    }
    if text.contains(START_MARKER) {
        return LineKind::MarkerNotAlone(Marker::Start);
    }
    LineKind::Text
}

/// Whether `b` may appear in a field key: `[A-Za-z0-9_.-]`.
pub fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

/// Whether `key` is a non-empty run of key characters.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(is_key_byte)
}

/// Split a body line into a trimmed `(key, value)` pair.
///
/// Returns `None` when the line has no `:` or the text before the first
/// `:` is not a valid key. The value may be empty.
pub fn split_key_value(text: &str) -> Option<(&str, &str)> {
    let (key, value) = text.split_once(':')?;
    let key = key.trim();
    is_valid_key(key).then(|| (key, value.trim()))
}

/// First non-ASCII character in `text`, with its character column (1-based).
pub fn first_non_ascii(text: &str) -> Option<(usize, char)> {
    text.chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii())
        .map(|(i, c)| (i + 1, c))
}

/// Shorten `text` for inclusion in a diagnostic detail.
pub(crate) fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_CHARS).collect();
    out.push_str("...");
    out
}
