//! Glob matching (shared, §4.15)
//!
//! Patterns are segmented on `/`. `*` matches within a single segment, `**`
//! matches zero or more segments, `?` matches one character, `{a,b}`
//! expands alternatives, and a leading `!` negates the whole pattern.
//! Compiled once into a small matcher (mirroring the teacher's pattern of
//! pre-compiling indexes like `VectorIndex`/`InvertedIndex` rather than
//! re-parsing per call), then matched many times against candidate topic
//! paths by [`crate::index::topic::TopicCatalog`].

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    segments: Vec<SegmentPattern>,
    negated: bool,
}

#[derive(Debug, Clone)]
enum SegmentPattern {
    /// `**` — matches zero or more path segments.
    DoubleStar,
    /// A single segment made of literal runs, `*`, `?`, and alternation.
    Single(Vec<SegmentToken>),
}

#[derive(Debug, Clone)]
enum SegmentToken {
    Literal(String),
    Star,
    Question,
    /// `{a,b,c}` — matches if any alternative matches at this position.
    Alternatives(Vec<String>),
}

impl GlobPattern {
    /// Compile a pattern string. Never fails: an unparseable fragment is
    /// treated as a literal, matching the teacher's preference for
    /// structured-but-permissive parsing over rejecting caller input.
    pub fn compile(pattern: &str) -> Self {
        let (negated, body) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };

        let segments = body
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|seg| {
                if seg == "**" {
                    SegmentPattern::DoubleStar
                } else {
                    SegmentPattern::Single(compile_segment(seg))
                }
            })
            .collect();

        Self { segments, negated }
    }

    /// Whether this pattern is a negation (`!`-prefixed).
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Match `candidate` (a `/`-separated path) against this pattern.
    /// Negation is the caller's concern (see [`matches_any`]); this method
    /// reports whether the non-negated body matches.
    pub fn matches(&self, candidate: &str) -> bool {
        let parts: Vec<&str> = candidate.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

fn compile_segment(seg: &str) -> Vec<SegmentToken> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = seg.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                flush_literal(&mut literal, &mut tokens);
                tokens.push(SegmentToken::Star);
                i += 1;
            }
            '?' => {
                flush_literal(&mut literal, &mut tokens);
                tokens.push(SegmentToken::Question);
                i += 1;
            }
            '{' => {
                if let Some(end) = chars[i..].iter().position(|&c| c == '}') {
                    flush_literal(&mut literal, &mut tokens);
                    let alts: Vec<String> = chars[i + 1..i + end]
                        .iter()
                        .collect::<String>()
                        .split(',')
                        .map(|s| s.to_string())
                        .collect();
                    tokens.push(SegmentToken::Alternatives(alts));
                    i += end + 1;
                } else {
                    literal.push('{');
                    i += 1;
                }
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush_literal(&mut literal, &mut tokens);
    tokens
}

fn flush_literal(literal: &mut String, tokens: &mut Vec<SegmentToken>) {
    if !literal.is_empty() {
        tokens.push(SegmentToken::Literal(std::mem::take(literal)));
    }
}

fn match_segments(pattern: &[SegmentPattern], candidate: &[&str]) -> bool {
    match pattern.first() {
        None => candidate.is_empty(),
        Some(SegmentPattern::DoubleStar) => {
            let rest = &pattern[1..];
            // ** matches zero or more segments: try every split point.
            (0..=candidate.len()).any(|i| match_segments(rest, &candidate[i..]))
        }
        Some(SegmentPattern::Single(tokens)) => {
            let Some((first, rest_candidate)) = candidate.split_first() else {
                return false;
            };
            match_single_segment(tokens, first) && match_segments(&pattern[1..], rest_candidate)
        }
    }
}

fn match_single_segment(tokens: &[SegmentToken], text: &str) -> bool {
    match_tokens(tokens, &text.chars().collect::<Vec<_>>())
}

fn match_tokens(tokens: &[SegmentToken], text: &[char]) -> bool {
    match tokens.first() {
        None => text.is_empty(),
        Some(SegmentToken::Literal(lit)) => {
            let lit_chars: Vec<char> = lit.chars().collect();
            text.len() >= lit_chars.len()
                && text[..lit_chars.len()] == lit_chars[..]
                && match_tokens(&tokens[1..], &text[lit_chars.len()..])
        }
        Some(SegmentToken::Question) => {
            !text.is_empty() && match_tokens(&tokens[1..], &text[1..])
        }
        Some(SegmentToken::Star) => {
            (0..=text.len()).any(|i| match_tokens(&tokens[1..], &text[i..]))
        }
        Some(SegmentToken::Alternatives(alts)) => alts.iter().any(|alt| {
            let alt_chars: Vec<char> = alt.chars().collect();
            text.len() >= alt_chars.len()
                && text[..alt_chars.len()] == alt_chars[..]
                && match_tokens(&tokens[1..], &text[alt_chars.len()..])
        }),
    }
}

/// Match `candidate` against a set of patterns: it matches if at least one
/// non-negated pattern matches and no negated pattern matches.
pub fn matches_any(patterns: &[GlobPattern], candidate: &str) -> bool {
    let mut matched = false;
    for p in patterns {
        if p.matches(candidate) {
            if p.is_negated() {
                return false;
            }
            matched = true;
        }
    }
    matched
}
