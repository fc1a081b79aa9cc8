//! Reply text helpers.

use rand::seq::SliceRandom;

use crate::ledger::Record;

/// Phrases slotted into "<name>, you <compliment>, ...".
pub const COMPLIMENTS: &[&str] = &[
    "absolute legend",
    "magnificent bean counter",
    "fiscal genius",
    "beautiful spreadsheet in human form",
    "budgeting wizard",
    "thrifty champion",
    "paragon of accountability",
    "shining star of solvency",
];

pub fn random_compliment() -> &'static str {
    COMPLIMENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("legend")
}

/// Format cents as a decimal with two places (`-1250` -> `-12.50`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub fn format_balance(cents: i64) -> String {
    format!("${}", format_cents(cents))
}

/// `YYYY-MM-DD <description> <amount>`
pub fn format_record_line(record: &Record) -> String {
    format!(
        "{} {} {}",
        record.created_at.format("%Y-%m-%d"),
        record.description,
        format_cents(record.amount_cents)
    )
}

pub fn format_record_list(records: &[Record]) -> String {
    records
        .iter()
        .map(format_record_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text on line boundaries into chunks of at most `limit` bytes.
///
/// A single line longer than `limit` is cut at the last char boundary that
/// fits. Text that already fits (including empty text) is returned as one
/// chunk.
pub fn split_text_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split('\n') {
        let mut rest = line;
        loop {
            let sep = usize::from(!chunk.is_empty());
            if chunk.len() + sep + rest.len() <= limit {
                if sep == 1 {
                    chunk.push('\n');
                }
                chunk.push_str(rest);
                break;
            }
            if !chunk.is_empty() {
                out.push(std::mem::take(&mut chunk));
                continue;
            }
            let cut = floor_char_boundary(rest, limit);
            out.push(rest[..cut].to_string());
            rest = &rest[cut..];
            if rest.is_empty() {
                break;
            }
        }
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    if i == 0 {
        // limit smaller than the first char; emit that char whole
        s.chars().next().map(char::len_utf8).unwrap_or(0)
    } else {
        i
    }
}
