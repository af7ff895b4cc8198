//! OSC address pattern matching: `?`, `*`, character classes
//! `[abc]`/`[a-z]`/`[!abc]`, and brace alternatives `{foo,bar}`.
//! `/` is always a literal path separator and is never matched by `?`/`*`.

/// Whether `address` (a concrete, incoming message address) matches
/// `pattern` (a registered method's address pattern).
pub fn matches(pattern: &str, address: &str) -> bool {
    match_chars(
        &pattern.chars().collect::<Vec<_>>(),
        &address.chars().collect::<Vec<_>>(),
    )
}

fn match_chars(pattern: &[char], addr: &[char]) -> bool {
    match_at(pattern, 0, addr, 0)
}

fn match_at(pattern: &[char], mut pi: usize, addr: &[char], mut ai: usize) -> bool {
    loop {
        if pi == pattern.len() {
            return ai == addr.len();
        }
        match pattern[pi] {
            '?' => {
                if ai >= addr.len() || addr[ai] == '/' {
                    return false;
                }
                pi += 1;
                ai += 1;
            }
            '*' => {
                // Greedy with backtracking: try consuming the longest run
                // first, then shrink until the remainder matches.
                let mut run_end = ai;
                while run_end < addr.len() && addr[run_end] != '/' {
                    run_end += 1;
                }
                for consumed in (0..=(run_end - ai)).rev() {
                    if match_at(pattern, pi + 1, addr, ai + consumed) {
                        return true;
                    }
                }
                return false;
            }
            '[' => {
                let Some((class_end, negate, members)) = parse_class(pattern, pi) else {
                    return false;
                };
                if ai >= addr.len() {
                    return false;
                }
                let c = addr[ai];
                let hit = class_contains(&members, c);
                if hit == negate {
                    return false;
                }
                pi = class_end + 1;
                ai += 1;
            }
            '{' => {
                let Some((brace_end, alternatives)) = parse_braces(pattern, pi) else {
                    return false;
                };
                for alt in &alternatives {
                    let mut candidate = alt.clone();
                    candidate.extend_from_slice(&pattern[brace_end + 1..]);
                    if match_at(&candidate, 0, addr, ai) {
                        return true;
                    }
                }
                return false;
            }
            lit => {
                if ai >= addr.len() || addr[ai] != lit {
                    return false;
                }
                pi += 1;
                ai += 1;
            }
        }
    }
}

enum ClassMember {
    Char(char),
    Range(char, char),
}

fn class_contains(members: &[ClassMember], c: char) -> bool {
    members.iter().any(|m| match m {
        ClassMember::Char(x) => *x == c,
        ClassMember::Range(lo, hi) => *lo <= c && c <= *hi,
    })
}

/// Parses `[...]` starting at `pattern[start] == '['`. Returns the index
/// of the closing `]`, whether the class is negated (`[!...]`), and the
/// parsed members.
fn parse_class(pattern: &[char], start: usize) -> Option<(usize, bool, Vec<ClassMember>)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'!');
    if negate {
        i += 1;
    }
    let mut members = Vec::new();
    let content_start = i;
    while i < pattern.len() && pattern[i] != ']' {
        i += 1;
    }
    if i >= pattern.len() {
        return None;
    }
    let content = &pattern[content_start..i];
    let mut j = 0;
    while j < content.len() {
        if j + 2 < content.len() && content[j + 1] == '-' {
            members.push(ClassMember::Range(content[j], content[j + 2]));
            j += 3;
        } else {
            members.push(ClassMember::Char(content[j]));
            j += 1;
        }
    }
    Some((i, negate, members))
}

/// Parses `{a,b,c}` starting at `pattern[start] == '{'`. Returns the index
/// of the closing `}` and each alternative as its own char vector.
fn parse_braces(pattern: &[char], start: usize) -> Option<(usize, Vec<Vec<char>>)> {
    let mut i = start + 1;
    let content_start = i;
    while i < pattern.len() && pattern[i] != '}' {
        i += 1;
    }
    if i >= pattern.len() {
        return None;
    }
    let content: String = pattern[content_start..i].iter().collect();
    let alternatives = content
        .split(',')
        .map(|s| s.chars().collect::<Vec<_>>())
        .collect();
    Some((i, alternatives))
}
