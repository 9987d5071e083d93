//! Terminal rendering of formatted feedback.

use colored::Colorize;

use crate::feedback::formatter::{Line, RenderBlock};

const FEEDBACK_TITLE: &str = "AI Feedback:";

/// Renders blocks as terminal text, one blank line between blocks.
pub fn render_blocks(blocks: &[RenderBlock]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", FEEDBACK_TITLE.bold().blue()));

    for block in blocks {
        out.push('\n');
        let indent = match block {
            RenderBlock::MajorSection { header, .. } => {
                out.push_str(&format!("{}\n", header.bold().underline().blue()));
                "  "
            }
            RenderBlock::Generic { .. } => "",
        };
        for line in block.lines() {
            out.push_str(&format!("{indent}{}\n", render_line(line)));
        }
    }
    out
}

fn render_line(line: &Line) -> String {
    match line {
        Line::SubHeading { label, content } if content.is_empty() => {
            format!("{}", format!("{label}:").bold())
        }
        Line::SubHeading { label, content } => {
            format!("{} {}", format!("{label}:").bold(), content)
        }
        Line::Numbered { number, text } => format!("{} {}", format!("{number}.").cyan(), text),
        Line::Bulleted { text } => format!("{} {}", "•".green(), text),
        Line::Plain { text } => text.to_string(),
    }
}
