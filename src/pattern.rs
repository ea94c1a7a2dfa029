//! Filename templates.
//!
//! A profile's `filenamePattern` holds one or more templates separated by `|`,
//! one per expected file category. Template tokens:
//!
//! | token | matches |
//! |---|---|
//! | `YYYY` | 4 digits, the year |
//! | `MM` / `DD` | 2 digits; the first occurrence is the month / day |
//! | `HH` `hh` `mm` `SS` `ss` | 2 digits |
//! | `*` | any run of characters |
//! | `{name}` / `<name>` | a non-empty run of characters |
//!
//! Everything else is literal. An empty pattern is a single catch-all category.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FileCategory {
    pub template: String,
    regex: Regex,
    has_date: bool,
}

impl FileCategory {
    pub fn matches(&self, filename: &str) -> bool {
        self.regex.is_match(basename(filename))
    }

    fn date_of(&self, filename: &str) -> Option<NaiveDate> {
        if !self.has_date {
            return None;
        }
        let caps = self.regex.captures(basename(filename))?;
        let year = caps.name("year")?.as_str().parse().ok()?;
        let month = caps.name("month")?.as_str().parse().ok()?;
        let day = caps.name("day")?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilenamePattern {
    categories: Vec<FileCategory>,
}

impl FilenamePattern {
    pub fn compile(pattern: &str) -> Self {
        let categories = pattern
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter_map(|template| match Regex::new(&template_to_regex(template)) {
                Ok(regex) => Some(FileCategory {
                    template: template.to_string(),
                    has_date: regex.capture_names().flatten().any(|n| n == "year")
                        && regex.capture_names().flatten().any(|n| n == "month")
                        && regex.capture_names().flatten().any(|n| n == "day"),
                    regex,
                }),
                Err(e) => {
                    warn!(template, error = %e, "Ignoring unusable filename template");
                    None
                }
            })
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &[FileCategory] {
        &self.categories
    }

    pub fn is_catch_all(&self) -> bool {
        self.categories.is_empty()
    }

    /// Date embedded in `filename`, read through the first dated template that
    /// matches, falling back to the first plausible `YYYYMMDD`-like run.
    pub fn embedded_date(&self, filename: &str) -> Option<NaiveDate> {
        self.categories
            .iter()
            .filter(|c| c.matches(filename))
            .find_map(|c| c.date_of(filename))
            .or_else(|| scan_date(basename(filename)))
    }
}

fn basename(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

fn template_to_regex(template: &str) -> String {
    let mut out = String::from("^");
    let mut named = NamedGroups::default();
    let mut rest = template;

    while let Some(c) = rest.chars().next() {
        if c.is_ascii_alphabetic() {
            let end = rest
                .find(|ch: char| !ch.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            let (word, tail) = rest.split_at(end);
            match date_tokens(word) {
                Some(tokens) => {
                    for token in tokens {
                        out.push_str(&named.pattern_for(token));
                    }
                }
                None => out.push_str(&regex::escape(word)),
            }
            rest = tail;
        } else if c == '*' {
            out.push_str(".*");
            rest = &rest[1..];
        } else if let Some((tail, true)) = placeholder(rest) {
            out.push_str(".+?");
            rest = tail;
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
            rest = &rest[c.len_utf8()..];
        }
    }

    out.push('$');
    out
}

const DATE_TOKENS: [&str; 8] = ["YYYY", "MM", "DD", "HH", "hh", "mm", "SS", "ss"];

/// Splits a letter run into date/time tokens. `None` when the run is plain text
/// (so `SUMMARY` stays literal).
fn date_tokens(word: &str) -> Option<Vec<&'static str>> {
    let mut tokens = Vec::new();
    let mut rest = word;
    while !rest.is_empty() {
        let token = DATE_TOKENS.iter().find(|t| rest.starts_with(**t))?;
        tokens.push(*token);
        rest = &rest[token.len()..];
    }
    Some(tokens)
}

#[derive(Default)]
struct NamedGroups {
    year: bool,
    month: bool,
    day: bool,
}

impl NamedGroups {
    fn pattern_for(&mut self, token: &str) -> String {
        let (flag, name, width) = match token {
            "YYYY" => (&mut self.year, "year", 4),
            "MM" => (&mut self.month, "month", 2),
            "DD" => (&mut self.day, "day", 2),
            _ => return r"\d{2}".to_string(),
        };
        if *flag {
            format!(r"\d{{{}}}", width)
        } else {
            *flag = true;
            format!(r"(?P<{}>\d{{{}}})", name, width)
        }
    }
}

/// Strips a leading `{...}` or `<...>` placeholder.
fn placeholder(rest: &str) -> Option<(&str, bool)> {
    let close = match rest.chars().next()? {
        '{' => '}',
        '<' => '>',
        _ => return None,
    };
    let end = rest.find(close)?;
    Some((&rest[end + close.len_utf8()..], end > 1))
}

fn scan_date(name: &str) -> Option<NaiveDate> {
    static DATE_RUN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DATE_RUN
        .get_or_init(|| {
            Regex::new(r"(?:^|[^0-9])((?:19|20)\d{2})[-_]?(\d{2})[-_]?(\d{2})(?:[^0-9]|$)").ok()
        })
        .as_ref()?;
    re.captures_iter(name).find_map(|caps| {
        NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )
    })
}
