use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const TERMINATORS: &[char] = &['.', '!', '?'];
const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];

/// What gets deleted when the writer stops for too long.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PenaltyMode {
    /// wipe the whole document
    #[default]
    All,
    /// remove the last paragraph
    Paragraph,
    /// remove the last sentence
    Sentence,
}

/// Returns `content` reduced according to `mode`. Never mutates the input.
pub fn apply_penalty(content: &str, mode: PenaltyMode) -> String {
    if content.is_empty() {
        return String::new();
    }
    match mode {
        PenaltyMode::All => String::new(),
        PenaltyMode::Paragraph => drop_last_paragraph(content),
        PenaltyMode::Sentence => drop_last_sentence(content),
    }
}

fn drop_last_sentence(content: &str) -> String {
    let text = content.trim_end();
    if !text.contains(TERMINATORS) {
        return drop_last_line(text);
    }

    // The final sentence either ends in a terminator run (plus closing quotes)
    // or is unfinished text trailing the last terminator.
    let without_closers = text.trim_end_matches(CLOSERS);
    let body = without_closers.trim_end_matches(TERMINATORS);
    let body = if body.len() == without_closers.len() {
        text
    } else {
        body
    };

    match body.rfind(TERMINATORS) {
        None => String::new(),
        Some(idx) => {
            // terminators are ASCII, so idx + 1 is a char boundary
            let rest = &text[idx + 1..];
            let trailing = rest
                .trim_start_matches(|c: char| TERMINATORS.contains(&c) || CLOSERS.contains(&c));
            text[..idx + 1 + rest.len() - trailing.len()].to_string()
        }
    }
}

fn drop_last_line(text: &str) -> String {
    match text.rfind('\n') {
        Some(idx) => text[..idx].to_string(),
        None => String::new(),
    }
}

/// Removes the last non-blank paragraph. Blank paragraphs (from leading or
/// trailing newline runs) are not counted, so `"P1\n\nP2\n\n"` keeps only
/// `"P1"`.
fn drop_last_paragraph(content: &str) -> String {
    let paragraphs: Vec<&str> = split_paragraphs(content)
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect();

    if paragraphs.len() <= 1 {
        return String::new();
    }
    paragraphs[..paragraphs.len() - 1].join("\n\n")
}

/// Splits on runs of two or more consecutive newlines.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut run_start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        if c == '\n' {
            run_start.get_or_insert(idx);
            continue;
        }
        if let Some(run) = run_start.take() {
            if idx - run >= 2 {
                parts.push(&text[start..run]);
                start = idx;
            }
        }
    }
    match run_start {
        Some(run) if text.len() - run >= 2 => parts.push(&text[start..run]),
        _ => parts.push(&text[start..]),
    }
    parts
}
