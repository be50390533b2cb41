use std::fmt::{Display, Formatter};

use super::CANDIDATE_SCHEMAS;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    /// A `<schema>.` qualifier. `name` is the canonical lowercase schema, `raw` the text as written.
    Schema { name: String, raw: String },
}

/// SQL text split into plain text and schema qualifiers.
///
/// Only qualifiers naming one of the known schemas, at an identifier boundary and
/// followed by `.`, become schema segments. String literals, quoted identifiers and
/// comments are copied through untouched, so `'gold.x'` inside a literal is never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalQuery {
    segments: Vec<Segment>,
}

impl LogicalQuery {
    pub fn parse(sql: &str) -> Self {
        let b = sql.as_bytes();
        let mut segments = Vec::new();
        let mut text_start = 0usize;
        let mut i = 0usize;
        while i < b.len() {
            match b[i] {
                b'\'' => i = skip_quoted(b, i, b'\''),
                b'"' => i = skip_quoted(b, i, b'"'),
                b'-' if b.get(i + 1) == Some(&b'-') => i = skip_line_comment(b, i),
                b'/' if b.get(i + 1) == Some(&b'*') => i = skip_block_comment(b, i),
                c if is_ident_start(c) => {
                    let start = i;
                    while i < b.len() && is_ident_char(b[i]) { i += 1; }
                    let at_boundary = start == 0 || !(is_ident_char(b[start - 1]) || b[start - 1] == b'.');
                    if at_boundary && b.get(i) == Some(&b'.') {
                        let word = &sql[start..i];
                        if let Some(known) = CANDIDATE_SCHEMAS.iter().find(|s| s.eq_ignore_ascii_case(word)) {
                            if text_start < start {
                                segments.push(Segment::Text(sql[text_start..start].to_string()));
                            }
                            segments.push(Segment::Schema { name: known.to_string(), raw: word.to_string() });
                            text_start = i;
                        }
                    }
                }
                _ => i += 1,
            }
        }
        if text_start < b.len() {
            segments.push(Segment::Text(sql[text_start..].to_string()));
        }
        Self { segments }
    }

    /// True if any qualifier names `schema`.
    pub fn references(&self, schema: &str) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Schema { name, .. } if name.eq_ignore_ascii_case(schema)))
    }

    /// Distinct schemas referenced, in order of first appearance.
    pub fn schema_refs(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for s in &self.segments {
            if let Segment::Schema { name, .. } = s {
                if !out.contains(&name.as_str()) { out.push(name.as_str()); }
            }
        }
        out
    }

    /// Copy with every `from.` qualifier replaced by `to.`.
    pub fn rebind(&self, from: &str, to: &str) -> LogicalQuery {
        let segments = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Schema { name, .. } if name.eq_ignore_ascii_case(from) => {
                    Segment::Schema { name: to.to_ascii_lowercase(), raw: to.to_string() }
                }
                other => other.clone(),
            })
            .collect();
        LogicalQuery { segments }
    }

    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        for s in &self.segments {
            match s {
                Segment::Text(t) => out.push_str(t),
                Segment::Schema { raw, .. } => out.push_str(raw),
            }
        }
        out
    }
}

impl Display for LogicalQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.to_sql()) }
}

fn is_ident_start(c: u8) -> bool { c.is_ascii_alphabetic() || c == b'_' }

// Non-ASCII bytes count as identifier characters so accented names are never split.
fn is_ident_char(c: u8) -> bool { c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80 }

fn skip_quoted(b: &[u8], open: usize, q: u8) -> usize {
    let mut j = open + 1;
    while j < b.len() {
        if b[j] == q {
            // doubled quote is an escape
            if b.get(j + 1) == Some(&q) { j += 2; continue; }
            return j + 1;
        }
        j += 1;
    }
    b.len()
}

fn skip_line_comment(b: &[u8], start: usize) -> usize {
    match b[start..].iter().position(|&c| c == b'\n') {
        Some(off) => start + off + 1,
        None => b.len(),
    }
}

fn skip_block_comment(b: &[u8], start: usize) -> usize {
    let mut j = start + 2;
    while j + 1 < b.len() {
        if b[j] == b'*' && b[j + 1] == b'/' { return j + 2; }
        j += 1;
    }
    b.len()
}
