use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MEDIA_EXTS: [&str; 10] = [
    "mp4", "mkv", "avi", "mov", "webm", "m4v", "wmv", "flv", "ts", "m2ts",
];

static PAREN_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<title>.+?)\s*\((?P<year>\d{4})\)").expect("paren year pattern is valid")
});

static BRACKET_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<title>.+?)\s*\[(?P<year>\d{4})\]").expect("bracket year pattern is valid")
});

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[[^\]]*\]|\([^)]*\)|\b\d{3,4}p\b").expect("noise pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static EXTRA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])(sample|trailer|teaser)(?:[^a-z]|$)")
        .expect("extra pattern is valid")
});

static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(20\d{2}-\d{2}-\d{2})\s*(\d{2}:\d{2}(?::\d{2})?)")
        .expect("datetime pattern is valid")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"20\d{2}-\d{2}-\d{2}").expect("date pattern is valid"));

static APACHE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}-[A-Za-z]{3}-20\d{2}").expect("apache date pattern is valid")
});

static BARE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b20\d{2}\b").expect("year pattern is valid"));

/// Title and year recovered from a file or directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub title: String,
    pub year: Option<i32>,
}

pub fn is_media(name: &str) -> bool {
    media_ext(name).is_some()
}

fn media_ext(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    MEDIA_EXTS
        .iter()
        .copied()
        .find(|known| ext.eq_ignore_ascii_case(known))
}

/// Samples and trailers shipped next to the main feature.
pub fn is_extra(name: &str) -> bool {
    EXTRA.is_match(strip_media_ext(name))
}

/// Drop a trailing media extension, if any.
pub fn strip_media_ext(name: &str) -> &str {
    match media_ext(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

/// Parse `name` into a title and optional year.
///
/// Tried in order, first match wins:
/// 1. `Title (Year)`
/// 2. `Title [Year]`
/// 3. release style such as `The.Matrix.1999.1080p.BluRay`
/// 4. the name with tags, parentheses and resolution markers removed
///
/// Returns `None` when nothing usable is left of the title.
pub fn parse_title_year(name: &str) -> Option<ParsedName> {
    let base = strip_media_ext(name.trim().trim_end_matches('/'));

    for re in [&*PAREN_YEAR, &*BRACKET_YEAR] {
        if let Some(caps) = re.captures(base) {
            let title = tidy(&caps["title"]);
            if !title.is_empty() {
                return Some(ParsedName {
                    title,
                    year: caps["year"].parse().ok(),
                });
            }
        }
    }

    if let Some(parsed) = parse_release_style(base) {
        return Some(parsed);
    }

    let title = tidy(&NOISE.replace_all(base, " "));
    (!title.is_empty()).then_some(ParsedName { title, year: None })
}

fn parse_release_style(base: &str) -> Option<ParsedName> {
    if !base.contains(['.', '_']) {
        return None;
    }
    let tokens: Vec<&str> = base
        .split(['.', '_', ' '])
        .filter(|t| !t.is_empty())
        .collect();

    // The first token can itself be a number ("2001.A.Space.Odyssey.1968").
    let pos = tokens.iter().skip(1).position(|t| release_year(t).is_some())? + 1;
    let title = tidy(&tokens[..pos].join(" "));
    if title.is_empty() {
        return None;
    }
    Some(ParsedName {
        title,
        year: release_year(tokens[pos]),
    })
}

fn release_year(token: &str) -> Option<i32> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok().filter(|y| (1900..=2099).contains(y))
}

/// Normalize separators and whitespace in a title fragment.
fn tidy(raw: &str) -> String {
    let spaced = if raw.contains(' ') {
        raw.replace('_', " ")
    } else {
        raw.replace(['.', '_'], " ")
    };
    WHITESPACE
        .replace_all(&spaced, " ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '.' | ','))
        .to_string()
}

/// Strip bracketed tags, parentheses and resolution markers for an API query.
pub fn clean_title_for_search(raw: &str) -> String {
    WHITESPACE
        .replace_all(&NOISE.replace_all(raw, " "), " ")
        .trim()
        .to_string()
}

/// Best-effort modification time from a listing row's text.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DD`, `DD-Mon-YYYY`, and as a last
/// resort a bare year (January 1st).
pub fn extract_last_modified(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_DATETIME.captures(raw) {
        let stamp = format!("{} {}", &caps[1], &caps[2]);
        let parsed = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M"));
        if let Ok(dt) = parsed {
            return Some(dt.and_utc());
        }
    }

    if let Some(m) = ISO_DATE.find(raw) {
        if let Ok(d) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    if let Some(m) = APACHE_DATE.find(raw) {
        if let Ok(d) = NaiveDate::parse_from_str(m.as_str(), "%d-%b-%Y") {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    let year: i32 = BARE_YEAR.find(raw)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
