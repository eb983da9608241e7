//! @acp:module "Docstring Sections"
//! @acp:summary "Extract per-argument and return type text from Google-style docstrings"
//! @acp:domain docstring
//! @acp:layer parser
//!
//! Works on the docstring body (the text between the quotes). Every offset
//! produced here is a byte offset into that body.
//!
//! ```text
//! Args:
//!     name (Dict[str, int]): description
//!     *args (str): description
//!
//! Returns:
//!     Optional[engine.models.Product]: description
//! ```

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::DocstringConfig;
use crate::error::{DocsigError, Result};

static ARG_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*{0,2}[^\W\d]\w*").unwrap()
});

/// Malformed section content. `line` is 1-based within the docstring body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("docstring line {line}: {message}")]
pub struct DocstringError {
    pub line: usize,
    pub message: String,
}

/// Raw type text and where it sits in the docstring body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpan {
    pub text: String,
    pub range: Range<usize>,
}

/// @acp:summary "One documented argument"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgEntry {
    /// Name as written, including any `*`/`**` prefix.
    pub name: String,
    pub type_span: Option<TypeSpan>,
    /// Text to delete when the type is stripped from the docstring.
    strip: Option<Range<usize>>,
}

impl ArgEntry {
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches('*')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnsKind {
    Returns,
    Yields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnsEntry {
    pub kind: ReturnsKind,
    pub type_span: Option<TypeSpan>,
    strip: Option<Range<usize>>,
}

/// @acp:summary "The sections of one docstring that carry types"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocstringSections {
    /// `None` when the docstring has no Args section.
    pub args: Option<Vec<ArgEntry>>,
    pub returns: Option<ReturnsEntry>,
}

impl DocstringSections {
    /// Whether any argument or the return value has a type.
    pub fn has_types(&self) -> bool {
        let typed_arg = self
            .args
            .iter()
            .flatten()
            .any(|arg| arg.type_span.is_some());
        typed_arg
            || self
                .returns
                .as_ref()
                .is_some_and(|r| r.type_span.is_some())
    }

    /// @acp:summary "Remove the extracted type text from the docstring body"
    ///
    /// `name (type): desc` becomes `name: desc`. A Returns item left with no
    /// description removes the whole section and the blank lines before it.
    pub fn strip_types(&self, body: &str) -> String {
        let mut ranges: Vec<Range<usize>> = self
            .args
            .iter()
            .flatten()
            .filter_map(|arg| arg.strip.clone())
            .chain(self.returns.iter().filter_map(|r| r.strip.clone()))
            .collect();
        ranges.sort_by_key(|r| std::cmp::Reverse(r.start));

        let mut out = body.to_string();
        for range in ranges {
            out.replace_range(range, "");
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Args,
    Returns(ReturnsKind),
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    /// End of the line content, excluding `\r\n`.
    end: usize,
    /// Start of the following line (or the body length).
    next: usize,
    text: &'a str,
}

impl Line<'_> {
    fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start_matches([' ', '\t']).len()
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn split_lines(body: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for piece in body.split('\n') {
        let text = piece.strip_suffix('\r').unwrap_or(piece);
        let raw_end = start + piece.len();
        lines.push(Line {
            start,
            end: start + text.len(),
            next: (raw_end + 1).min(body.len()),
            text,
        });
        start = raw_end + 1;
    }
    lines
}

fn error(line_index: usize, message: impl Into<String>) -> DocstringError {
    DocstringError {
        line: line_index + 1,
        message: message.into(),
    }
}

/// @acp:summary "Section tokenizer for one configured docstring style"
#[derive(Debug, Clone)]
pub struct SectionTokenizer {
    header: Regex,
    args_sections: Vec<String>,
    returns_sections: Vec<String>,
    yields_sections: Vec<String>,
}

impl SectionTokenizer {
    pub fn new(config: &DocstringConfig) -> Result<Self> {
        let alternation = config
            .args_sections
            .iter()
            .chain(&config.returns_sections)
            .chain(&config.yields_sections)
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Err(DocsigError::Config("no docstring section names configured".to_string()));
        }

        let header = Regex::new(&format!(r"^[ \t]*({})[ \t]*:[ \t]*$", alternation))
            .map_err(|e| DocsigError::Config(format!("invalid docstring section name: {}", e)))?;

        Ok(Self {
            header,
            args_sections: config.args_sections.clone(),
            returns_sections: config.returns_sections.clone(),
            yields_sections: config.yields_sections.clone(),
        })
    }

    fn section_kind(&self, line: &str) -> Option<SectionKind> {
        let name = self.header.captures(line)?.get(1)?.as_str();
        if self.args_sections.iter().any(|s| s == name) {
            Some(SectionKind::Args)
        } else if self.returns_sections.iter().any(|s| s == name) {
            Some(SectionKind::Returns(ReturnsKind::Returns))
        } else if self.yields_sections.iter().any(|s| s == name) {
            Some(SectionKind::Returns(ReturnsKind::Yields))
        } else {
            None
        }
    }

    /// @acp:summary "Split a docstring body into its Args and Returns/Yields sections"
    pub fn tokenize(&self, body: &str) -> std::result::Result<DocstringSections, DocstringError> {
        let lines = split_lines(body);
        let mut sections = DocstringSections::default();

        let mut i = 0;
        while i < lines.len() {
            let Some(kind) = self.section_kind(lines[i].text) else {
                i += 1;
                continue;
            };

            let header = i;
            let header_indent = lines[header].indent();
            let mut last = header;
            for (j, line) in lines.iter().enumerate().skip(header + 1) {
                if line.is_blank() {
                    continue;
                }
                if line.indent() <= header_indent {
                    break;
                }
                last = j;
            }
            if last == header {
                return Err(error(header, format!("section `{}` has no items", lines[header].text.trim())));
            }

            let section = Section {
                body,
                lines: &lines,
                header,
                last,
            };
            match kind {
                SectionKind::Args if sections.args.is_none() => {
                    sections.args = Some(section.parse_args()?);
                }
                SectionKind::Returns(kind) if sections.returns.is_none() => {
                    sections.returns = Some(section.parse_returns(kind));
                }
                _ => debug!("Ignoring repeated section at docstring line {}", header + 1),
            }
            i = last + 1;
        }

        Ok(sections)
    }
}

/// Header line plus its indented body lines `header + 1 ..= last`.
struct Section<'a> {
    body: &'a str,
    lines: &'a [Line<'a>],
    header: usize,
    last: usize,
}

impl Section<'_> {
    fn first_item(&self) -> usize {
        (self.header + 1..=self.last)
            .find(|&k| !self.lines[k].is_blank())
            .unwrap_or(self.last)
    }

    fn end(&self) -> usize {
        self.lines[self.last].end
    }

    fn parse_args(&self) -> std::result::Result<Vec<ArgEntry>, DocstringError> {
        let item_indent = self.lines[self.first_item()].indent();
        let mut entries = Vec::new();
        // lines swallowed by a multi-line `(type)` start before this offset
        let mut consumed_until = 0;

        for k in self.header + 1..=self.last {
            let line = &self.lines[k];
            if line.is_blank() || line.start < consumed_until {
                continue;
            }
            let indent = line.indent();
            if indent > item_indent {
                continue;
            }
            if indent < item_indent {
                return Err(error(k, "inconsistent indentation in arguments section"));
            }

            let rest = &line.text[indent..];
            let name_match = ARG_NAME_PATTERN
                .find(rest)
                .ok_or_else(|| error(k, format!("expected an argument name, found `{}`", rest.trim())))?;
            let name = name_match.as_str().to_string();
            let name_end = line.start + indent + name_match.end();

            let after_name = &self.body[name_end..line.end];
            let open = name_end + (after_name.len() - after_name.trim_start_matches([' ', '\t']).len());

            let (type_span, strip) = if self.body[open..].starts_with('(') {
                let close = matching_paren(self.body, open, self.end())
                    .ok_or_else(|| error(k, format!("unclosed `(` in the type of `{}`", name)))?;
                consumed_until = close;
                let inner = open + 1..close;
                let span = TypeSpan {
                    text: self.body[inner.clone()].to_string(),
                    range: inner,
                };
                (Some(span), Some(name_end..close + 1))
            } else {
                (None, None)
            };

            entries.push(ArgEntry {
                name,
                type_span,
                strip,
            });
        }

        Ok(entries)
    }

    fn parse_returns(&self, kind: ReturnsKind) -> ReturnsEntry {
        let first = self.first_item();
        let line = &self.lines[first];
        let start = line.start + line.indent();
        let limit = self.end();

        let mut depth = 0i32;
        let mut stop = limit;
        let mut colon = false;
        for (offset, c) in self.body[start..limit].char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth -= 1,
                ':' if depth <= 0 => {
                    stop = start + offset;
                    colon = true;
                    break;
                }
                '\n' if depth <= 0 => {
                    stop = start + offset;
                    break;
                }
                _ => {}
            }
        }

        let candidate = self.body[start..stop].trim_end();
        if candidate.is_empty() || !looks_like_type(candidate) {
            return ReturnsEntry {
                kind,
                type_span: None,
                strip: None,
            };
        }
        let type_span = TypeSpan {
            text: candidate.to_string(),
            range: start..start + candidate.len(),
        };

        let mut after = if colon { stop + 1 } else { stop };
        while after < limit && matches!(self.body.as_bytes()[after], b' ' | b'\t') {
            after += 1;
        }
        let type_line = (first..=self.last)
            .find(|&k| self.lines[k].end >= after)
            .unwrap_or(self.last);
        let rest_of_line_empty = self.body[after..self.lines[type_line].end.max(after)]
            .trim()
            .is_empty();
        let more_description = (type_line + 1..=self.last).any(|k| !self.lines[k].is_blank());

        let strip = if !rest_of_line_empty {
            start..after
        } else if more_description {
            line.start..self.lines[type_line].next
        } else {
            self.whole_section_range()
        };

        ReturnsEntry {
            kind,
            type_span: Some(type_span),
            strip: Some(strip),
        }
    }

    /// Header through last body line, plus the blank lines above the header.
    fn whole_section_range(&self) -> Range<usize> {
        let mut top = self.header;
        while top > 0 && self.lines[top - 1].is_blank() {
            top -= 1;
        }
        let end = self.lines[self.last].next;
        let start = if end >= self.body.len() && top > 0 {
            // nothing follows: also drop the newline ending the previous line
            self.lines[top - 1].end
        } else {
            self.lines[top].start
        };
        start..end
    }
}

fn matching_paren(body: &str, open: usize, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in body[open..limit].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whitespace outside brackets is only allowed around `|`; anything else is
/// prose rather than a type.
fn looks_like_type(candidate: &str) -> bool {
    let mut depth = 0i32;
    let mut previous = None;
    let mut gap = false;
    for c in candidate.trim().chars() {
        if c.is_whitespace() {
            if depth == 0 {
                gap = true;
            }
            continue;
        }
        if gap && previous != Some('|') && c != '|' {
            return false;
        }
        gap = false;
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            _ => {}
        }
        previous = Some(c);
    }
    true
}
