//! Shell-style wildcard matching for `~` rule conditions.
//!
//! Semantics follow classic `fnmatch` without path awareness: `*` matches any
//! run of characters including `/`, `?` matches exactly one character, and
//! `[seq]` / `[!seq]` match one character in / not in a set (ranges `a-z`
//! allowed, a leading `]` is literal). An unterminated `[` is a literal.
//! Matching is case-insensitive.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyRun,
    Class { negated: bool, items: Vec<(char, char)> },
}

/// A compiled, case-insensitive glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    tokens: Vec<Token>,
}

impl Glob {
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
        let mut tokens = Vec::new();
        let mut i = 0usize;
        while let Some(&c) = chars.get(i) {
            i = i.saturating_add(1);
            match c {
                '*' => {
                    if tokens.last() != Some(&Token::AnyRun) {
                        tokens.push(Token::AnyRun);
                    }
                }
                '?' => tokens.push(Token::AnyOne),
                '[' => match parse_class(&chars, i) {
                    Some((token, next)) => {
                        tokens.push(token);
                        i = next;
                    }
                    None => tokens.push(Token::Literal('[')),
                },
                other => tokens.push(Token::Literal(other)),
            }
        }
        Self { tokens }
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
        match_tokens(&self.tokens, &text)
    }
}

/// Parse a `[...]` class whose body starts at `start` (just past the `[`).
///
/// Returns the token and the index just past the closing `]`, or `None` if
/// the class is unterminated.
fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start;
    let negated = chars.get(i) == Some(&'!');
    if negated {
        i = i.saturating_add(1);
    }
    let mut items = Vec::new();
    let mut first = true;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && !first {
            return Some((Token::Class { negated, items }, i.saturating_add(1)));
        }
        first = false;
        let after = i.saturating_add(1);
        match (chars.get(after), chars.get(after.saturating_add(1))) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                items.push((c, hi));
                i = after.saturating_add(2);
            }
            _ => {
                items.push((c, c));
                i = after;
            }
        }
    }
}

fn token_accepts(token: &Token, c: char) -> bool {
    match token {
        Token::Literal(l) => *l == c,
        Token::AnyOne => true,
        Token::AnyRun => false,
        Token::Class { negated, items } => {
            let hit = items.iter().any(|&(lo, hi)| lo <= c && c <= hi);
            hit != *negated
        }
    }
}

/// Iterative wildcard match with single-star backtracking.
fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
    let (mut t, mut s) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while s < text.len() {
        match tokens.get(t) {
            Some(Token::AnyRun) => {
                star = Some((t, s));
                t = t.saturating_add(1);
            }
            Some(token) if text.get(s).is_some_and(|&c| token_accepts(token, c)) => {
                t = t.saturating_add(1);
                s = s.saturating_add(1);
            }
            _ => match star {
                Some((star_t, star_s)) => {
                    let resume = star_s.saturating_add(1);
                    star = Some((star_t, resume));
                    t = star_t.saturating_add(1);
                    s = resume;
                }
                None => return false,
            },
        }
    }
    tokens
        .get(t..)
        .is_some_and(|rest| rest.iter().all(|tok| *tok == Token::AnyRun))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, text: &str) -> bool {
        Glob::new(pattern).matches(text)
    }

    #[test]
    fn star_matches_across_separators() {
        assert!(m("*.mp3", "/iPod_Control/Music/F00/a.mp3"));
        assert!(m("/recycled/*", "/recycled/old/b.mp3"));
        assert!(!m("/recycled/*", "/music/recycled/b.mp3"));
    }

    #[test]
    fn matching_ignores_case() {
        assert!(m("*.MP3", "/song.mp3"));
        assert!(m("*.mp3", "/SONG.MP3"));
        assert!(m("/Recycled/*", "/RECYCLED/x.wav"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(m("*.m4?", "/a.m4a"));
        assert!(m("*.m4?", "/a.m4b"));
        assert!(!m("*.m4?", "/a.m4"));
        assert!(m("*.book.???", "/chapter.book.mp3"));
        assert!(!m("*.book.???", "/chapter.book.mp"));
    }

    #[test]
    fn classes_and_negation() {
        assert!(m("/[abc]*", "/banana.mp3"));
        assert!(!m("/[abc]*", "/dog.mp3"));
        assert!(m("/[!abc]*", "/dog.mp3"));
        assert!(m("/track[0-9].mp3", "/track7.mp3"));
        assert!(!m("/track[0-9].mp3", "/trackx.mp3"));
        assert!(m("[]]", "]"));
    }

    #[test]
    fn unterminated_class_is_literal() {
        assert!(m("/a[b", "/a[b"));
        assert!(!m("/a[b", "/ab"));
    }

    #[test]
    fn empty_pattern_only_matches_empty() {
        assert!(m("", ""));
        assert!(!m("", "x"));
        assert!(m("*", ""));
    }

    #[test]
    fn backtracking_finds_late_match() {
        assert!(m("*a*b", "xaxxab"));
        assert!(!m("*a*b", "xaxxa"));
    }
}
