// src/report/diff.rs
// =============================================================================
// Baseline diff.
//
// Both link lists are deduplicated, stripped of empty lines and sorted with
// natural ordering ("page2" before "page10"). Once both sides are sorted the
// same way, a single merge walk is enough to tell which lines were added,
// removed or kept, and the output order is fully determined by the inputs.
// =============================================================================

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use serde::{Deserialize, Serialize};

use super::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Removed,
    Unmodified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub text: String,
    pub status: DiffStatus,
}

impl DiffEntry {
    fn new(text: &str, status: DiffStatus) -> Self {
        DiffEntry {
            text: text.to_string(),
            status,
        }
    }
}

/// Natural ordering: runs of digits compare by numeric value, everything else
/// character by character. Strings that only differ in leading zeros fall
/// back to byte order, so the ordering is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut x = a.chars().peekable();
    let mut y = b.chars().peekable();
    loop {
        match (x.peek().copied(), y.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(c), Some(d)) if c.is_ascii_digit() && d.is_ascii_digit() => {
                let n = take_digits(&mut x);
                let m = take_digits(&mut y);
                let ord = cmp_numeric(&n, &m);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(c), Some(d)) => {
                if c != d {
                    return c.cmp(&d);
                }
                x.next();
                y.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Sorts links naturally, dropping empty entries and duplicates.
pub fn sort_links<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = lines
        .into_iter()
        .map(|s| s.as_ref().trim_end_matches('\r').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort_by(|a, b| natural_cmp(a, b));
    out.dedup();
    out
}

/// Classifies every line of the two lists, unmodified ones included.
pub fn classify<S: AsRef<str>>(baseline: &[S], current: &[S]) -> Vec<DiffEntry> {
    let old = sort_links(baseline);
    let new = sort_links(current);

    let mut entries = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        match natural_cmp(&old[i], &new[j]) {
            Ordering::Equal => {
                entries.push(DiffEntry::new(&new[j], DiffStatus::Unmodified));
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                entries.push(DiffEntry::new(&old[i], DiffStatus::Removed));
                i += 1;
            }
            Ordering::Greater => {
                entries.push(DiffEntry::new(&new[j], DiffStatus::Added));
                j += 1;
            }
        }
    }
    entries.extend(old[i..].iter().map(|s| DiffEntry::new(s, DiffStatus::Removed)));
    entries.extend(new[j..].iter().map(|s| DiffEntry::new(s, DiffStatus::Added)));
    entries
}

/// The diff as it goes into the report: only added and removed lines.
pub fn compare<S: AsRef<str>>(baseline: &[S], current: &[S]) -> Vec<DiffEntry> {
    classify(baseline, current)
        .into_iter()
        .filter(|e| e.status != DiffStatus::Unmodified && !e.text.is_empty())
        .collect()
}

/// Plain-text rendering: `- ` for removed, `+ ` for added, two spaces for kept.
pub fn to_text(entries: &[DiffEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let marker = match entry.status {
            DiffStatus::Removed => "- ",
            DiffStatus::Added => "+ ",
            DiffStatus::Unmodified => "  ",
        };
        out.push_str(marker);
        out.push_str(&entry.text);
        out.push('\n');
    }
    out
}

/// Two-column HTML table, removed lines on the left and added on the right.
/// Consecutive changes are paired up row by row.
pub fn to_table(entries: &[DiffEntry]) -> String {
    let mut html = String::from("<table class=\"diff\"><tbody>\n");
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();

    for entry in entries {
        match entry.status {
            DiffStatus::Removed => removed.push(&entry.text),
            DiffStatus::Added => added.push(&entry.text),
            DiffStatus::Unmodified => {
                flush_block(&mut html, &mut removed, &mut added);
                let text = escape_html(&entry.text);
                html.push_str(&format!(
                    "<tr><td class=\"diffUnmodified\">{0}</td><td class=\"diffUnmodified\">{0}</td></tr>\n",
                    text
                ));
            }
        }
    }
    flush_block(&mut html, &mut removed, &mut added);

    html.push_str("</tbody></table>\n");
    html
}

fn flush_block(html: &mut String, removed: &mut Vec<&str>, added: &mut Vec<&str>) {
    let rows = removed.len().max(added.len());
    for row in 0..rows {
        html.push_str("<tr>");
        html.push_str(&cell(removed.get(row).copied(), "diffDeleted"));
        html.push_str(&cell(added.get(row).copied(), "diffInserted"));
        html.push_str("</tr>\n");
    }
    removed.clear();
    added.clear();
}

fn cell(text: Option<&str>, class: &str) -> String {
    match text {
        Some(text) => format!("<td class=\"{}\"><span>{}</span></td>", class, escape_html(text)),
        None => "<td class=\"diffBlank\"></td>".to_string(),
    }
}
