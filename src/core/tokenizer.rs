//! Incremental tokenizer engine.
//!
//! [`Tokenizer`] turns a stream of text chunks into typed tokens using an
//! ordered rule table. Chunks may be cut anywhere — mid-token, mid-char
//! sequence of a literal — because whenever a match could still grow past
//! the end of the available input, the engine holds the input back in an
//! internal buffer and waits for the next chunk. Calling
//! [`Tokenizer::flush`] (or `tokenize` with `force_final`) asserts that no
//! more input is coming and resolves whatever is held.
//!
//! Per call, the decision procedure is:
//!
//! 1. Prepend the carry-over buffer to the new chunk.
//! 2. Scan the rule table in registration order for the first match.
//! 3. No rule matches: hold everything (more input may complete a token),
//!    or fail if the caller asserted end of input.
//! 4. The match consumes all available input: hold it (the token may not
//!    be complete yet), or, at end of input, emit it and fire the flush
//!    callback.
//! 5. The match is a strict prefix: the token cannot grow, so emit it and
//!    continue scanning the remainder.
//!
//! Step 4 is the interesting one: at a chunk boundary, a full-length
//! match is indistinguishable from a truncated prefix of a longer token
//! (`"123"` may become `"1234"`). The engine defers judgment until more
//! input disambiguates it or the caller forces finality.

use std::mem;

use log::{debug, trace};
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::rule::{Matcher, Rule, RuleDef, RuleTest};

/// Characters of offending input shown in [`TokenizerError::Unmatched`]
/// messages. The full input stays on the error value.
const UNMATCHED_PREVIEW_CHARS: usize = 16;

/// Errors from rule registration and forced-final tokenization.
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// The rule's test can never make progress: an empty literal, or a
    /// pattern that can match the empty string.
    #[error("unsupported rule test: {reason}")]
    UnsupportedTest { reason: String },

    /// A pattern rule failed to compile.
    #[error("invalid rule pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    /// No rule matched the remaining input and the caller asserted that
    /// no more input is coming.
    #[error("cannot tokenize remaining input starting with {:?}", input_preview(.input))]
    Unmatched {
        /// The full unconsumed input at the point of failure.
        input: String,
    },
}

fn input_preview(input: &str) -> &str {
    match input.char_indices().nth(UNMATCHED_PREVIEW_CHARS) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}

/// A matched token: the rule's kind and the consumed prefix.
///
/// Handed to the token callback per match; the engine does not retain it.
/// `value` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Caller-defined label of the rule that matched.
    pub kind: String,
    /// The matched prefix of the input.
    pub value: String,
}

type TokenCallback = Box<dyn FnMut(Token)>;
type FlushCallback = Box<dyn FnMut()>;

/// Streaming rule-based tokenizer.
///
/// Owns the ordered rule table, the ignored-kind set, the carry-over
/// buffer, and the two emission callbacks. The buffer is the only state
/// that persists across [`tokenize`](Self::tokenize) calls: it is always
/// either empty or the whole unconsumed tail of the input seen so far,
/// never a partially consumed token.
///
/// The engine is synchronous and single-threaded; a call runs to
/// completion before returning, and concurrent calls on one instance are
/// not supported.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use streamlex::{RuleDef, RuleTest, Tokenizer};
///
/// # fn main() -> Result<(), streamlex::TokenizerError> {
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// let mut tokenizer = Tokenizer::with_rules([
///     RuleDef::new(RuleTest::pattern("[0-9]+"), "NUM"),
///     RuleDef::new(RuleTest::literal(" "), "SPACE").ignore(),
/// ])?
/// .on_token(move |token| sink.borrow_mut().push(token));
///
/// tokenizer.tokenize("12", false)?;   // held back: "12" could still grow
/// tokenizer.tokenize("3 45", false)?; // "123" and the space resolve
/// tokenizer.flush()?;                 // "45" is final
///
/// let values: Vec<_> = seen.borrow().iter().map(|t| t.value.clone()).collect();
/// assert_eq!(values, ["123", "45"]);
/// # Ok(())
/// # }
/// ```
pub struct Tokenizer {
    rules: Vec<Rule>,
    ignored: FxHashMap<String, bool>,
    buffer: String,
    consumed: usize,
    on_token: TokenCallback,
    on_flush: FlushCallback,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("rule_count", &self.rules.len())
            .field("ignored", &self.ignored)
            .field("buffer", &self.buffer)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a tokenizer with no rules and no-op callbacks.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            ignored: FxHashMap::default(),
            buffer: String::new(),
            consumed: 0,
            on_token: Box::new(|_| {}),
            on_flush: Box::new(|| {}),
        }
    }

    /// Create a tokenizer from an initial ordered rule list.
    pub fn with_rules(defs: impl IntoIterator<Item = RuleDef>) -> Result<Self, TokenizerError> {
        let mut tokenizer = Self::new();
        tokenizer.add_rules(defs)?;
        Ok(tokenizer)
    }

    /// Set the token-emission callback.
    ///
    /// Invoked once per emitted token, synchronously, left to right
    /// through the input. Tokens of an ignored kind are not delivered.
    pub fn on_token(mut self, callback: impl FnMut(Token) + 'static) -> Self {
        self.on_token = Box::new(callback);
        self
    }

    /// Set the end-of-round callback.
    ///
    /// Invoked exactly once per call that resolves a forced-final
    /// full-length match — the "no further tokens this round" signal.
    pub fn on_flush(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_flush = Box::new(callback);
        self
    }

    /// Append a rule to the table and record its ignored flag.
    ///
    /// Rules are tried in registration order and the first match wins,
    /// regardless of match length; order rules from most to least
    /// specific. The test is validated here, before any tokenization can
    /// observe it.
    pub fn add_rule(
        &mut self,
        test: RuleTest,
        kind: impl Into<String>,
        ignored: bool,
    ) -> Result<(), TokenizerError> {
        let matcher = Matcher::build(test)?;
        let kind = kind.into();
        self.ignored.insert(kind.clone(), ignored);
        self.rules.push(Rule { matcher, kind });
        Ok(())
    }

    /// Append every rule in `defs`, preserving their order.
    ///
    /// The whole batch is compiled before the table is touched, so a bad
    /// entry leaves the table unchanged.
    pub fn add_rules(&mut self, defs: impl IntoIterator<Item = RuleDef>) -> Result<(), TokenizerError> {
        let mut compiled = Vec::new();
        for def in defs {
            compiled.push((Matcher::build(def.test)?, def.kind, def.ignored));
        }
        for (matcher, kind, ignored) in compiled {
            self.ignored.insert(kind.clone(), ignored);
            self.rules.push(Rule { matcher, kind });
        }
        Ok(())
    }

    /// Set the ignored flag for a kind, independent of rule registration.
    ///
    /// Ignored kinds still match and consume input; their tokens are just
    /// not delivered to the token callback. Registering a rule for the
    /// same kind later overwrites the flag.
    pub fn set_ignored(&mut self, kind: impl Into<String>, ignored: bool) {
        self.ignored.insert(kind.into(), ignored);
    }

    /// Whether tokens of `kind` are withheld from the token callback.
    pub fn is_ignored(&self, kind: &str) -> bool {
        self.ignored.get(kind).copied().unwrap_or(false)
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether unconsumed input is buffered from previous calls.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// The unconsumed input carried over from previous calls.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Discard any buffered input without emitting.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Total bytes consumed as tokens since construction (ignored kinds
    /// included).
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Feed a chunk of input, emitting zero or more tokens.
    ///
    /// With `force_final` false, input that matches nothing — or whose
    /// match reaches the end of the available input and could therefore
    /// still grow — is buffered for the next call. With `force_final`
    /// true there is no next call: a full-length match is emitted
    /// followed by the flush callback, and unmatched input is an error.
    ///
    /// # Errors
    ///
    /// [`TokenizerError::Unmatched`] when `force_final` is true and no
    /// rule matches the remaining input. Tokens found earlier in the same
    /// call have already been emitted; the unmatched tail is carried by
    /// the error and the buffer is left empty, so the engine expects
    /// fresh input afterwards.
    pub fn tokenize(&mut self, chunk: &str, force_final: bool) -> Result<&mut Self, TokenizerError> {
        let mut input = mem::take(&mut self.buffer);
        input.push_str(chunk);

        loop {
            if input.is_empty() {
                return Ok(self);
            }

            let Some((index, len)) = self.match_first(&input) else {
                if force_final {
                    return Err(TokenizerError::Unmatched { input });
                }
                debug!("no rule matched; holding {} byte(s) for more input", input.len());
                self.buffer = input;
                return Ok(self);
            };

            if len == input.len() {
                if force_final {
                    // End of input: the full-length match is final.
                    self.emit(index, input);
                    (self.on_flush)();
                    return Ok(self);
                }
                // The match could still grow once the next chunk arrives.
                debug!("match consumed all {len} available byte(s); holding");
                self.buffer = input;
                return Ok(self);
            }

            // More input follows the match, so the token cannot grow.
            let rest = input.split_off(len);
            self.emit(index, input);
            input = rest;
        }
    }

    /// Force resolution of any buffered input.
    ///
    /// Equivalent to `tokenize("", true)`: emits a final token for a
    /// buffered full-length match, fails on buffered unmatched input, and
    /// is a no-op when nothing is buffered.
    pub fn flush(&mut self) -> Result<&mut Self, TokenizerError> {
        self.tokenize("", true)
    }

    /// First rule in registration order matching a prefix of `input`,
    /// with the matched length in bytes.
    fn match_first(&self, input: &str) -> Option<(usize, usize)> {
        self.rules
            .iter()
            .enumerate()
            .find_map(|(index, rule)| rule.matcher.matched_len(input).map(|len| (index, len)))
    }

    fn emit(&mut self, index: usize, value: String) {
        self.consumed += value.len();
        let kind = &self.rules[index].kind;
        trace!("emit {kind} ({} byte(s))", value.len());
        if self.ignored.get(kind).copied().unwrap_or(false) {
            return;
        }
        let token = Token {
            kind: kind.clone(),
            value,
        };
        (self.on_token)(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn make_tokenizer(defs: Vec<RuleDef>) -> (Tokenizer, Rc<RefCell<Vec<Token>>>, Rc<Cell<usize>>) {
        let tokens = Rc::new(RefCell::new(Vec::new()));
        let flushes = Rc::new(Cell::new(0));
        let token_sink = Rc::clone(&tokens);
        let flush_sink = Rc::clone(&flushes);
        let tokenizer = Tokenizer::with_rules(defs)
            .unwrap()
            .on_token(move |token| token_sink.borrow_mut().push(token))
            .on_flush(move || flush_sink.set(flush_sink.get() + 1));
        (tokenizer, tokens, flushes)
    }

    fn number_rules() -> Vec<RuleDef> {
        vec![
            RuleDef::new(RuleTest::pattern("[0-9]+"), "NUM"),
            RuleDef::new(RuleTest::literal(" "), "SPACE"),
        ]
    }

    fn tok(kind: &str, value: &str) -> Token {
        Token {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_strict_prefix_emits_immediately() {
        let (mut tokenizer, tokens, flushes) = make_tokenizer(number_rules());
        tokenizer.tokenize("12 34", false).unwrap();
        assert_eq!(*tokens.borrow(), vec![tok("NUM", "12"), tok("SPACE", " ")]);
        assert_eq!(tokenizer.pending(), "34");
        assert_eq!(flushes.get(), 0);
    }

    #[test]
    fn test_full_length_match_is_held() {
        let (mut tokenizer, tokens, _) = make_tokenizer(number_rules());
        tokenizer.tokenize("123", false).unwrap();
        assert!(tokens.borrow().is_empty());
        assert!(tokenizer.has_pending());
        assert_eq!(tokenizer.pending(), "123");
    }

    #[test]
    fn test_force_final_resolves_and_flushes() {
        let (mut tokenizer, tokens, flushes) = make_tokenizer(number_rules());
        tokenizer.tokenize("12 34", true).unwrap();
        assert_eq!(
            *tokens.borrow(),
            vec![tok("NUM", "12"), tok("SPACE", " "), tok("NUM", "34")]
        );
        assert_eq!(flushes.get(), 1);
        assert!(!tokenizer.has_pending());
    }

    #[test]
    fn test_empty_input_is_a_noop() {
        let (mut tokenizer, tokens, flushes) = make_tokenizer(number_rules());
        tokenizer.tokenize("", false).unwrap();
        tokenizer.flush().unwrap();
        assert!(tokens.borrow().is_empty());
        assert_eq!(flushes.get(), 0);
    }

    #[test]
    fn test_unmatched_final_input_errors() {
        let (mut tokenizer, tokens, _) = make_tokenizer(number_rules());
        let err = tokenizer.tokenize("12x", true).unwrap_err();
        // The leading number was already emitted before the failure.
        assert_eq!(*tokens.borrow(), vec![tok("NUM", "12")]);
        match err {
            TokenizerError::Unmatched { input } => assert_eq!(input, "x"),
            other => panic!("expected Unmatched, got {other:?}"),
        }
        assert!(!tokenizer.has_pending());
    }

    #[test]
    fn test_ignored_kind_consumes_without_delivery() {
        let (mut tokenizer, tokens, _) = make_tokenizer(vec![
            RuleDef::new(RuleTest::pattern("[0-9]+"), "NUM"),
            RuleDef::new(RuleTest::literal(" "), "SPACE").ignore(),
        ]);
        tokenizer.tokenize("1 2 3", true).unwrap();
        assert_eq!(
            *tokens.borrow(),
            vec![tok("NUM", "1"), tok("NUM", "2"), tok("NUM", "3")]
        );
        assert_eq!(tokenizer.consumed(), 5);
    }

    #[test]
    fn test_default_callbacks_are_noops() {
        let mut tokenizer = Tokenizer::with_rules(number_rules()).unwrap();
        tokenizer.tokenize("12 34", true).unwrap();
        assert_eq!(tokenizer.consumed(), 5);
    }

    #[test]
    fn test_calls_chain() {
        let (mut tokenizer, tokens, _) = make_tokenizer(number_rules());
        tokenizer
            .tokenize("1", false)
            .unwrap()
            .tokenize("2", false)
            .unwrap()
            .flush()
            .unwrap();
        assert_eq!(*tokens.borrow(), vec![tok("NUM", "12")]);
    }

    #[test]
    fn test_reset_discards_pending() {
        let (mut tokenizer, tokens, flushes) = make_tokenizer(number_rules());
        tokenizer.tokenize("123", false).unwrap();
        tokenizer.reset();
        assert!(!tokenizer.has_pending());
        tokenizer.flush().unwrap();
        assert!(tokens.borrow().is_empty());
        assert_eq!(flushes.get(), 0);
    }

    #[test]
    fn test_unmatched_preview_is_bounded() {
        let (mut tokenizer, _, _) = make_tokenizer(number_rules());
        let long = "@".repeat(40);
        let err = tokenizer.tokenize(&long, true).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&"@".repeat(16)));
        assert!(!message.contains(&"@".repeat(17)));
        // The full input is still on the error.
        match err {
            TokenizerError::Unmatched { input } => assert_eq!(input, long),
            other => panic!("expected Unmatched, got {other:?}"),
        }
    }
}
