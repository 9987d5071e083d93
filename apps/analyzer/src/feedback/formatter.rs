//! Feedback formatter: turns the raw feedback text returned by the analysis service
//! into an ordered sequence of render blocks.
//!
//! The classification is a set of priority-ordered heuristics, not a grammar:
//! 1. Paragraph groups are split on blank lines.
//! 2. A group whose first line contains a section keyword is a major section.
//! 3. Lines inside a major section are numbered → bulleted → sub-heading → plain,
//!    first match wins.
//! 4. Lines of any other group only get sub-heading detection.
//!
//! Pure and deterministic: recomputed on every render, nothing is cached.

use serde::Serialize;

/// Markup characters removed before any classification happens.
const EMPHASIS_CHARS: &[char] = &['*'];

/// A line-leading `*` followed by whitespace is a list marker, not emphasis.
/// It is rewritten to this glyph before emphasis is stripped.
const STAR_BULLET_REPLACEMENT: char = '•';

/// Case-sensitive substrings that mark a group header as a major section.
pub const SECTION_KEYWORDS: &[&str] = &[
    "Analysis",
    "Summary",
    "Recommendations",
    "Skills",
    "Experience",
    "Education",
    "Improvements",
    "Match",
    "Score",
    "Feedback",
    "Strengths",
    "Weaknesses",
];

/// Lines at or above this many characters are never sub-headings.
const SUB_HEADING_MAX_CHARS: usize = 100;

const NUMBER_SEPARATORS: &[char] = &['.', ')'];
const BULLET_GLYPHS: &[char] = &['-', '•', '–'];

/// One unit of formatted output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderBlock {
    /// A group whose header matched a section keyword.
    MajorSection { header: String, lines: Vec<Line> },
    /// Any other group, header line included.
    Generic { lines: Vec<Line> },
}

/// A classified line inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Line {
    SubHeading { label: String, content: String },
    Numbered { number: String, text: String },
    Bulleted { text: String },
    Plain { text: String },
}

impl RenderBlock {
    pub fn lines(&self) -> &[Line] {
        match self {
            RenderBlock::MajorSection { lines, .. } | RenderBlock::Generic { lines } => lines,
        }
    }

    /// Every piece of visible text in the block, in display order.
    #[cfg(test)]
    pub fn text_fragments(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let RenderBlock::MajorSection { header, .. } = self {
            out.push(header.as_str());
        }
        for line in self.lines() {
            match line {
                Line::SubHeading { label, content } => {
                    out.push(label.as_str());
                    out.push(content.as_str());
                }
                Line::Numbered { number, text } => {
                    out.push(number.as_str());
                    out.push(text.as_str());
                }
                Line::Bulleted { text } | Line::Plain { text } => out.push(text.as_str()),
            }
        }
        out
    }
}

/// Formats raw feedback text into render blocks.
pub fn format_feedback(raw: &str) -> Vec<RenderBlock> {
    let cleaned = strip_emphasis(raw);
    split_groups(&cleaned)
        .into_iter()
        .filter_map(|group| format_group(&group))
        .collect()
}

/// Removes emphasis markup characters. A `* item` list marker survives as `• item`.
pub fn strip_emphasis(raw: &str) -> String {
    raw.split_inclusive('\n')
        .map(|line| {
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];
            match body.strip_prefix('*') {
                Some(rest) if rest.starts_with(&[' ', '\t'][..]) => {
                    format!("{indent}{STAR_BULLET_REPLACEMENT}{}", drop_emphasis(rest))
                }
                _ => drop_emphasis(line),
            }
        })
        .collect()
}

fn drop_emphasis(text: &str) -> String {
    text.chars().filter(|c| !EMPHASIS_CHARS.contains(c)).collect()
}

/// True if the header contains any section keyword.
pub fn is_major_header(header: &str) -> bool {
    SECTION_KEYWORDS.iter().any(|kw| header.contains(kw))
}

/// Classifies a line inside a major section.
pub fn classify_line(line: &str) -> Line {
    let line = line.trim();
    if let Some((number, text)) = split_numbered(line) {
        return Line::Numbered {
            number: number.to_string(),
            text: text.to_string(),
        };
    }
    if let Some(text) = split_bullet(line) {
        return Line::Bulleted {
            text: text.to_string(),
        };
    }
    classify_sub_heading(line)
}

/// Classifies a line inside a generic block. List markers are left as plain text,
/// but a marked line is never promoted to a sub-heading.
pub fn classify_generic_line(line: &str) -> Line {
    let line = line.trim();
    if split_numbered(line).is_some() || split_bullet(line).is_some() {
        return Line::Plain {
            text: line.to_string(),
        };
    }
    classify_sub_heading(line)
}

fn classify_sub_heading(line: &str) -> Line {
    if line.chars().count() < SUB_HEADING_MAX_CHARS {
        if let Some((label, content)) = line.split_once(':') {
            return Line::SubHeading {
                label: label.trim().to_string(),
                content: content.trim().to_string(),
            };
        }
    }
    Line::Plain {
        text: line.to_string(),
    }
}

/// `"12. text"` or `"3) text"` → `("12", "text")`. The separator must be followed by
/// whitespace or end the line, so `"2.5 years"` stays a plain line.
fn split_numbered(line: &str) -> Option<(&str, &str)> {
    let digits_end = line
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    if digits_end == 0 {
        return None;
    }
    let rest = &line[digits_end..];
    let after_sep = rest.strip_prefix(NUMBER_SEPARATORS)?;
    if !after_sep.is_empty() && !after_sep.starts_with(char::is_whitespace) {
        return None;
    }
    Some((&line[..digits_end], after_sep.trim()))
}

fn split_bullet(line: &str) -> Option<&str> {
    line.strip_prefix(BULLET_GLYPHS).map(str::trim)
}

/// Splits text into groups of non-blank lines. Whitespace-only lines are boundaries.
fn split_groups(text: &str) -> Vec<Vec<&str>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn format_group(group: &[&str]) -> Option<RenderBlock> {
    let (first, rest) = group.split_first()?;
    let header = first.trim();
    if header.is_empty() {
        return None;
    }

    if is_major_header(header) {
        Some(RenderBlock::MajorSection {
            header: header.to_string(),
            lines: rest.iter().map(|l| classify_line(l)).collect(),
        })
    } else {
        Some(RenderBlock::Generic {
            lines: group.iter().map(|l| classify_generic_line(l)).collect(),
        })
    }
}
