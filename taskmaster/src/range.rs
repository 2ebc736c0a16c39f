//! Range expansion for target tokens.
//!
//! A token such as `host[01:20]` expands to `host01` .. `host20`. Bounds keep
//! the zero padding of whichever bound was written with more digits. Tokens
//! that are quoted, carry no bracket, or do not parse as a range are returned
//! verbatim as a single target.

use std::sync::OnceLock;

use regex::Regex;

/// `<base>[<start>:<stop>:<step>]<suffix>`, every field optional.
fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^\[\]]*)\[([^\[\]]*)\]([^\[\]]*)$").unwrap())
}

/// Parsed bracket body of a range token.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RangeSpec<'a> {
    base: &'a str,
    suffix: &'a str,
    start: u64,
    stop: u64,
    step: usize,
    width: usize,
}

impl<'a> RangeSpec<'a> {
    fn parse(token: &'a str) -> Option<Self> {
        let caps = range_pattern().captures(token)?;
        let base = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        let suffix = caps.get(3).map_or("", |m| m.as_str());

        let fields: Vec<&str> = body.split(':').collect();
        // A lone bound is a stop bound, as in `host[4]`.
        let (start_text, stop_text, step_text) = match fields.as_slice() {
            [stop] => ("", *stop, ""),
            [start, stop] => (*start, *stop, ""),
            [start, stop, step] => (*start, *stop, *step),
            _ => return None,
        };

        let start = parse_bound(start_text)?;
        let stop = parse_bound(stop_text)?;
        let step = usize::try_from(parse_bound(step_text)?).ok()?;
        if step == 0 {
            return None;
        }

        Some(Self {
            base,
            suffix,
            start,
            stop,
            step,
            width: start_text.len().max(stop_text.len()),
        })
    }

    fn render(&self, inclusive: bool) -> Vec<String> {
        let stop = if inclusive {
            self.stop.saturating_add(1)
        } else {
            self.stop
        };
        (self.start..stop)
            .step_by(self.step)
            .map(|i| format!("{}{:0width$}{}", self.base, i, self.suffix, width = self.width))
            .collect()
    }
}

/// Missing bounds default to 1.
fn parse_bound(text: &str) -> Option<u64> {
    if text.is_empty() {
        return Some(1);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Expand a token with an inclusive upper bound.
pub fn expand(token: &str) -> Vec<String> {
    expand_range(token, true)
}

/// Expand a token into an ordered list of target names.
///
/// With `inclusive` set, `stop` is part of the range.
pub fn expand_range(token: &str, inclusive: bool) -> Vec<String> {
    if token.starts_with('"') || !token.contains('[') {
        return vec![token.trim_matches('"').to_string()];
    }

    match RangeSpec::parse(token) {
        Some(spec) => spec.render(inclusive),
        None => vec![token.to_string()],
    }
}
