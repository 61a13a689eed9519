//! SQL `LIKE` pattern matching for backends without a SQL engine.
//!
//! `%` matches any run of characters (including none), `_` matches exactly
//! one character, and `\` makes the next character literal.

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyMany,
}

/// A compiled `LIKE` pattern.
#[derive(Clone, Debug)]
pub struct LikePattern {
    tokens: Vec<Token>,
}

impl LikePattern {
    pub fn new(pattern: &str) -> Self {
        let mut tokens = Vec::new();
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            let token = match ch {
                '%' => Token::AnyMany,
                '_' => Token::AnyOne,
                '\\' => Token::Literal(chars.next().unwrap_or('\\')),
                other => Token::Literal(other),
            };
            // Consecutive `%` collapse into one.
            if token == Token::AnyMany && tokens.last() == Some(&Token::AnyMany) {
                continue;
            }
            tokens.push(token);
        }
        Self { tokens }
    }

    /// Returns `true` if the whole of `text` matches the pattern.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut t, mut p) = (0, 0);
        // Position after the most recent `%`, and the text index it resumes at.
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::AnyMany) => {
                    backtrack = Some((p + 1, t));
                    p += 1;
                }
                Some(Token::AnyOne) => {
                    p += 1;
                    t += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((resume_p, resume_t)) => {
                        p = resume_p;
                        t = resume_t + 1;
                        backtrack = Some((resume_p, resume_t + 1));
                    }
                    None => return false,
                },
            }
        }

        self.tokens[p..].iter().all(|tok| *tok == Token::AnyMany)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_matches_everything() {
        let p = LikePattern::new("%");
        assert!(p.matches(""));
        assert!(p.matches("team/1"));
    }

    #[test]
    fn prefix_patterns() {
        let p = LikePattern::new("team/%");
        assert!(p.matches("team/1"));
        assert!(p.matches("team/"));
        assert!(p.matches("team/a/b"));
        assert!(!p.matches("teams/1"));
        assert!(!p.matches("team"));
    }

    #[test]
    fn exact_without_wildcards() {
        let p = LikePattern::new("a/b");
        assert!(p.matches("a/b"));
        assert!(!p.matches("a/bc"));
    }

    #[test]
    fn underscore_matches_one() {
        let p = LikePattern::new("team/_");
        assert!(p.matches("team/1"));
        assert!(!p.matches("team/12"));
        assert!(!p.matches("team/"));
    }

    #[test]
    fn infix_and_suffix() {
        let p = LikePattern::new("%/fall2024/%.json");
        assert!(p.matches("cs3660/fall2024/attendance.json"));
        assert!(!p.matches("cs3660/spring2025/attendance.json"));
        assert!(LikePattern::new("%a%a%").matches("banana"));
        assert!(!LikePattern::new("%x%").matches("banana"));
    }

    #[test]
    fn escapes_are_literal() {
        let p = LikePattern::new("100\\%");
        assert!(p.matches("100%"));
        assert!(!p.matches("1000"));
        assert!(LikePattern::new("a\\_b").matches("a_b"));
        assert!(!LikePattern::new("a\\_b").matches("axb"));
    }
}
