//! Rule construction for the tokenizer.
//!
//! A rule pairs a prefix test with a caller-defined token kind. Tests come
//! in three shapes — literal strings, anchored regex patterns, and
//! predicate functions — and every shape is normalized at registration
//! time into a single uniform operation: given an input string, report the
//! byte length of the matched prefix or report no match. The scan loop
//! only ever sees the normalized form, so the original shape is never
//! inspected while tokenizing.
//!
//! All matching is anchored at offset 0 of whatever string the engine
//! passes in; a rule can never match mid-string.
//!
//! # Zero-length matches
//!
//! A rule that matched zero bytes could never advance the scan, so
//! zero-length matches are excluded on both ends: the empty literal and
//! patterns that can match the empty string are rejected at registration,
//! and any zero-length match that slips through at scan time (predicates,
//! boundary assertions like `\b`) is treated as no match.

use regex::Regex;

use super::tokenizer::TokenizerError;

/// Pattern source for runs of whitespace.
pub const WHITESPACE_PATTERN: &str = r"\s+";

/// Pattern source for unsigned integer literals.
pub const INTEGER_PATTERN: &str = r"[0-9]+";

/// Pattern source for decimal number literals (`12`, `3.14`).
pub const NUMBER_PATTERN: &str = r"[0-9]+(?:\.[0-9]+)?";

/// Pattern source for C-style identifiers.
pub const IDENTIFIER_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_]*";

/// Pattern source for double-quoted string literals with backslash escapes.
pub const STRING_PATTERN: &str = r#""(?:[^"\\]|\\.)*""#;

/// A prefix predicate: returns the byte length of the matched prefix, or
/// `None` for no match.
///
/// The returned length must be non-zero, within bounds, and on a char
/// boundary of the input; anything else is treated as no match.
pub type PredicateFn = Box<dyn Fn(&str) -> Option<usize>>;

/// The matching half of a rule, as supplied by the caller.
///
/// Compiled once at registration into a uniform prefix test; see
/// [`Tokenizer::add_rule`](super::Tokenizer::add_rule).
pub enum RuleTest {
    /// Matches iff the input starts with the literal; consumes exactly
    /// the literal.
    Literal(String),
    /// Regex source, compiled anchored at offset 0; consumes whatever
    /// the regex engine reports.
    Pattern(String),
    /// Arbitrary prefix test. The caller owns the anchoring contract;
    /// the engine slices the reported length off the front itself, so a
    /// predicate cannot hand back a non-prefix.
    Predicate(PredicateFn),
}

impl RuleTest {
    /// A literal-string test.
    pub fn literal(literal: impl Into<String>) -> Self {
        RuleTest::Literal(literal.into())
    }

    /// An anchored-pattern test from a regex source string.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        RuleTest::Pattern(pattern.into())
    }

    /// A predicate test returning the matched prefix length in bytes.
    pub fn predicate(test: impl Fn(&str) -> Option<usize> + 'static) -> Self {
        RuleTest::Predicate(Box::new(test))
    }
}

impl std::fmt::Debug for RuleTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleTest::Literal(literal) => f.debug_tuple("Literal").field(literal).finish(),
            RuleTest::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            RuleTest::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// An uncompiled rule entry for [`Tokenizer::with_rules`] and
/// [`Tokenizer::add_rules`](super::Tokenizer::add_rules).
///
/// [`Tokenizer::with_rules`]: super::Tokenizer::with_rules
#[derive(Debug)]
pub struct RuleDef {
    /// The prefix test.
    pub test: RuleTest,
    /// Caller-defined label stamped on emitted tokens.
    pub kind: String,
    /// Whether tokens of this kind are withheld from the token callback.
    pub ignored: bool,
}

impl RuleDef {
    /// A rule whose tokens are delivered normally.
    pub fn new(test: RuleTest, kind: impl Into<String>) -> Self {
        Self {
            test,
            kind: kind.into(),
            ignored: false,
        }
    }

    /// Mark this rule's kind as ignored: it still matches and consumes
    /// input, but its tokens are not delivered.
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// A registered rule: compiled test plus token kind. Owned by the
/// tokenizer's rule table and immutable once registered.
pub(crate) struct Rule {
    pub(crate) matcher: Matcher,
    pub(crate) kind: String,
}

/// Normalized form of a [`RuleTest`], dispatched with a plain `match` in
/// the scan loop.
pub(crate) enum Matcher {
    Literal(String),
    Pattern(Regex),
    Predicate(PredicateFn),
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Literal(literal) => f.debug_tuple("Literal").field(literal).finish(),
            Matcher::Pattern(regex) => f.debug_tuple("Pattern").field(regex).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Matcher {
    /// Compile a test spec, validating it up front. Fails before any
    /// tokenization can observe the rule.
    pub(crate) fn build(test: RuleTest) -> Result<Self, TokenizerError> {
        match test {
            RuleTest::Literal(literal) => {
                if literal.is_empty() {
                    return Err(TokenizerError::UnsupportedTest {
                        reason: "literal must not be empty".to_string(),
                    });
                }
                Ok(Matcher::Literal(literal))
            }
            RuleTest::Pattern(pattern) => {
                let anchored = format!("^(?:{pattern})");
                let regex =
                    Regex::new(&anchored).map_err(|source| TokenizerError::InvalidPattern {
                        pattern: pattern.clone(),
                        source: Box::new(source),
                    })?;
                if regex.is_match("") {
                    return Err(TokenizerError::UnsupportedTest {
                        reason: format!("pattern {pattern:?} can match the empty string"),
                    });
                }
                Ok(Matcher::Pattern(regex))
            }
            RuleTest::Predicate(test) => Ok(Matcher::Predicate(test)),
        }
    }

    /// Byte length of the prefix this rule consumes from `input`, if any.
    pub(crate) fn matched_len(&self, input: &str) -> Option<usize> {
        match self {
            Matcher::Literal(literal) => input.starts_with(literal.as_str()).then_some(literal.len()),
            Matcher::Pattern(regex) => regex.find(input).map(|m| m.end()).filter(|&len| len > 0),
            Matcher::Predicate(test) => test(input)
                .filter(|&len| len > 0 && len <= input.len() && input.is_char_boundary(len)),
        }
    }
}
