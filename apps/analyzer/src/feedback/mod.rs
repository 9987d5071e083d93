// Feedback presentation: raw text → render blocks → terminal output.

pub mod formatter;
pub mod render;
