//! Text repairs applied to plan output that is almost, but not quite, JSON.
//!
//! Every pass tracks string-literal state so braces, brackets and commas
//! inside string values are never touched.

/// Tracks whether the scanner is inside a JSON string literal.
#[derive(Debug, Default, Clone, Copy)]
struct LiteralState {
    in_string: bool,
    escaped: bool,
}

impl LiteralState {
    /// Feeds one character. Returns true if the character belongs to a string
    /// literal body (the closing quote included, the opening quote excluded).
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return true;
        }
        if c == '"' {
            self.in_string = true;
        }
        false
    }
}

fn starts_structured(text: &str) -> bool {
    text.trim_start().starts_with(['{', '['])
}

/// True if `text` does not open with an object or array token and needs
/// extraction before it can parse.
pub fn needs_extraction(text: &str) -> bool {
    !starts_structured(text)
}

/// Returns every balanced `{...}` / `[...]` span in order of its opening
/// token. A span that never closes runs to the end of the text.
///
/// One pass with a stack of open spans. String literals are tracked only
/// inside a span, so quotes in surrounding prose cannot hide a payload.
pub fn balanced_candidates(text: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, Option<usize>)> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut literal = LiteralState::default();

    for (i, c) in text.char_indices() {
        if open.is_empty() {
            if matches!(c, '{' | '[') {
                literal = LiteralState::default();
                open.push(spans.len());
                spans.push((i, None));
            }
            continue;
        }
        if literal.feed(c) || c == '"' {
            continue;
        }
        match c {
            '{' | '[' => {
                open.push(spans.len());
                spans.push((i, None));
            }
            '}' | ']' => {
                if let Some(idx) = open.pop() {
                    spans[idx].1 = Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    spans
        .into_iter()
        .map(|(start, end)| &text[start..end.unwrap_or(text.len())])
        .collect()
}

const PLAN_MARKERS: [&str; 2] = ["\"steps\"", "\"tool\""];

/// First balanced structure in `text`. Spans that mention plan fields win
/// over earlier spans (bracketed prose such as `[note]` before the payload).
pub fn extract_balanced(text: &str) -> Option<&str> {
    let candidates = balanced_candidates(text);
    let first = candidates.first().copied()?;

    // (start, end) of every marker occurrence, sorted by start
    let mut markers: Vec<(usize, usize)> = PLAN_MARKERS
        .iter()
        .flat_map(|m| text.match_indices(m).map(|(at, hit)| (at, at + hit.len())))
        .collect();
    markers.sort_unstable();

    // earliest marker end among markers starting at or after index i
    let mut min_end = vec![usize::MAX; markers.len() + 1];
    for i in (0..markers.len()).rev() {
        min_end[i] = min_end[i + 1].min(markers[i].1);
    }

    let base = text.as_ptr() as usize;
    candidates
        .into_iter()
        .find(|span| {
            let start = span.as_ptr() as usize - base;
            let i = markers.partition_point(|&(at, _)| at < start);
            min_end[i] <= start + span.len()
        })
        .or(Some(first))
}

/// Truncates trailing garbage around the outermost structure.
///
/// A close token that would drive its counter negative is cut together with
/// everything after it; once every counter returns to zero the text ends
/// right after the token that closed it.
pub fn repair_balance(text: &str) -> String {
    let mut braces: i64 = 0;
    let mut brackets: i64 = 0;
    let mut started = false;
    let mut literal = LiteralState::default();

    for (i, c) in text.char_indices() {
        if literal.feed(c) || c == '"' {
            continue;
        }
        match c {
            '{' => {
                braces += 1;
                started = true;
            }
            '[' => {
                brackets += 1;
                started = true;
            }
            '}' => {
                if braces == 0 {
                    return text[..i].to_string();
                }
                braces -= 1;
            }
            ']' => {
                if brackets == 0 {
                    return text[..i].to_string();
                }
                brackets -= 1;
            }
            _ => continue,
        }
        if started && braces == 0 && brackets == 0 {
            return text[..i + c.len_utf8()].to_string();
        }
    }

    text.to_string()
}

/// Drops non-printable control characters (whitespace excepted) and commas
/// that directly precede a closing brace or bracket.
pub fn strip_control_and_trailing_commas(text: &str) -> String {
    let cleaned: Vec<char> = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut literal = LiteralState::default();

    for (idx, &c) in cleaned.iter().enumerate() {
        if literal.feed(c) {
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = cleaned[idx + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// Escapes raw newline, carriage-return and tab characters inside string
/// literals into their two-character forms.
pub fn escape_controls_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut literal = LiteralState::default();

    for c in text.chars() {
        let inside = literal.in_string;
        literal.feed(c);
        if inside {
            match c {
                '\n' => {
                    out.push_str("\\n");
                    continue;
                }
                '\r' => {
                    out.push_str("\\r");
                    continue;
                }
                '\t' => {
                    out.push_str("\\t");
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }

    out
}
