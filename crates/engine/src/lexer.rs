//! Hand-written lexer over a template source.
//!
//! The lexer is a small state machine over delimiter contexts: plain text,
//! expression bodies (`{{ … }}`), statement bodies (`{% … %}`), line
//! statements (`## …` up to end of line) and comments (`{# … #}`). Openers
//! and closers are configurable and each has a whitespace-trim variant
//! (opener suffixed with `-`, closer prefixed with `-`). Tokens are produced
//! one at a time and borrow their text from the source.

use crate::config::LexerConfig;
use crate::error::SourceLocation;
use crate::token::{Token, TokenKind};
use crate::utils::source_location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    ExpressionStart,
    ExpressionStartForceLstrip,
    ExpressionBody,
    LineStart,
    LineBody,
    StatementStart,
    StatementStartForceLstrip,
    StatementBody,
    CommentStart,
    CommentStartForceLstrip,
    CommentBody,
}

/// Decides whether a `-` inside a body starts a signed number or is the
/// subtraction operator, based on the class of the previously emitted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MinusState {
    Operator,
    Number,
}

#[derive(Debug)]
pub struct LexerState<'src> {
    input: &'src str,
    tok_start: usize,
    pos: usize,
    state: State,
    minus_state: MinusState,
}

impl<'src> LexerState<'src> {
    pub fn input(&self) -> &'src str {
        self.input
    }
}

pub struct Lexer {
    config: LexerConfig,
    open_chars: Vec<u8>,
}

impl Lexer {
    pub fn new(config: &LexerConfig) -> Self {
        let mut open_chars = Vec::new();
        let openers = [
            &config.line_statement,
            &config.statement_open,
            &config.statement_open_force_lstrip,
            &config.expression_open,
            &config.expression_open_force_lstrip,
            &config.comment_open,
            &config.comment_open_force_lstrip,
        ];
        for opener in openers {
            if let Some(first) = opener.as_bytes().first()
                && !open_chars.contains(first)
            {
                open_chars.push(*first);
            }
        }
        Lexer {
            config: config.clone(),
            open_chars,
        }
    }

    pub fn config(&self) -> &LexerConfig {
        &self.config
    }

    /// Starts scanning `input`. A leading UTF-8 byte order mark is skipped.
    pub fn start<'src>(&self, input: &'src str) -> LexerState<'src> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        LexerState {
            input,
            tok_start: 0,
            pos: 0,
            state: State::Text,
            minus_state: MinusState::Number,
        }
    }

    pub fn current_position(&self, state: &LexerState<'_>) -> SourceLocation {
        source_location(state.input, state.tok_start)
    }

    pub fn scan<'src>(&self, st: &mut LexerState<'src>) -> Token<'src> {
        st.tok_start = st.pos;
        if st.tok_start >= st.input.len() {
            return make_token(st, TokenKind::Eof);
        }

        match st.state {
            State::Text => self.scan_text(st),
            State::ExpressionStart => self.open_token(
                st,
                State::ExpressionBody,
                self.config.expression_open.len(),
                TokenKind::ExpressionOpen,
            ),
            State::ExpressionStartForceLstrip => self.open_token(
                st,
                State::ExpressionBody,
                self.config.expression_open_force_lstrip.len(),
                TokenKind::ExpressionOpen,
            ),
            State::LineStart => self.open_token(
                st,
                State::LineBody,
                self.config.line_statement.len(),
                TokenKind::LineStatementOpen,
            ),
            State::StatementStart => self.open_token(
                st,
                State::StatementBody,
                self.config.statement_open.len(),
                TokenKind::StatementOpen,
            ),
            State::StatementStartForceLstrip => self.open_token(
                st,
                State::StatementBody,
                self.config.statement_open_force_lstrip.len(),
                TokenKind::StatementOpen,
            ),
            State::CommentStart => self.open_token(
                st,
                State::CommentBody,
                self.config.comment_open.len(),
                TokenKind::CommentOpen,
            ),
            State::CommentStartForceLstrip => self.open_token(
                st,
                State::CommentBody,
                self.config.comment_open_force_lstrip.len(),
                TokenKind::CommentOpen,
            ),
            State::ExpressionBody => self.scan_body(
                st,
                &self.config.expression_close,
                TokenKind::ExpressionClose,
                Some(&self.config.expression_close_force_rstrip),
            ),
            State::LineBody => self.scan_body(st, "\n", TokenKind::LineStatementClose, None),
            State::StatementBody => self.scan_body(
                st,
                &self.config.statement_close,
                TokenKind::StatementClose,
                Some(&self.config.statement_close_force_rstrip),
            ),
            State::CommentBody => self.scan_comment(st),
        }
    }

    fn scan_text<'src>(&self, st: &mut LexerState<'src>) -> Token<'src> {
        st.tok_start = st.pos;
        loop {
            if st.tok_start >= st.input.len() {
                return make_token(st, TokenKind::Eof);
            }
            // fast-scan to the first byte that can begin an opener
            let Some(open_start) = st.input.as_bytes()[st.pos..]
                .iter()
                .position(|b| self.open_chars.contains(b))
            else {
                st.pos = st.input.len();
                return make_token(st, TokenKind::Text);
            };
            st.pos += open_start;

            let open_str = &st.input[st.pos..];
            let mut must_lstrip = false;
            if open_str.starts_with(&self.config.expression_open) {
                if open_str.starts_with(&self.config.expression_open_force_lstrip) {
                    st.state = State::ExpressionStartForceLstrip;
                    must_lstrip = true;
                } else {
                    st.state = State::ExpressionStart;
                }
            } else if open_str.starts_with(&self.config.statement_open) {
                if open_str.starts_with(&self.config.statement_open_force_lstrip) {
                    st.state = State::StatementStartForceLstrip;
                    must_lstrip = true;
                } else {
                    st.state = State::StatementStart;
                }
            } else if open_str.starts_with(&self.config.comment_open) {
                if open_str.starts_with(&self.config.comment_open_force_lstrip) {
                    st.state = State::CommentStartForceLstrip;
                    must_lstrip = true;
                } else {
                    st.state = State::CommentStart;
                }
            } else if (st.pos == 0 || st.input.as_bytes()[st.pos - 1] == b'\n')
                && open_str.starts_with(&self.config.line_statement)
            {
                st.state = State::LineStart;
            } else {
                // wasn't actually an opening sequence
                st.pos += 1;
                continue;
            }

            let mut text = &st.input[st.tok_start..st.pos];
            if must_lstrip {
                text = text.trim_end_matches([' ', '\t', '\n', '\r']);
            }
            if text.is_empty() {
                // don't generate an empty text token
                return self.scan(st);
            }
            return Token::new(TokenKind::Text, text, st.tok_start);
        }
    }

    fn open_token<'src>(
        &self,
        st: &mut LexerState<'src>,
        newstate: State,
        length: usize,
        kind: TokenKind,
    ) -> Token<'src> {
        st.tok_start = st.pos;
        st.state = newstate;
        st.pos += length;
        // inside a fresh body a minus starts a signed number
        st.minus_state = MinusState::Number;
        make_token(st, kind)
    }

    fn scan_body<'src>(
        &self,
        st: &mut LexerState<'src>,
        close: &str,
        close_kind: TokenKind,
        close_rstrip: Option<&str>,
    ) -> Token<'src> {
        loop {
            if st.tok_start >= st.input.len() {
                return make_token(st, TokenKind::Eof);
            }
            let ch = st.input.as_bytes()[st.tok_start];
            // skip insignificant whitespace (\n may be a close, checked below)
            if ch == b' ' || ch == b'\t' || ch == b'\r' {
                st.tok_start += 1;
                continue;
            }

            let rest = &st.input[st.tok_start..];
            if let Some(rstrip_close) = close_rstrip
                && rest.starts_with(rstrip_close)
            {
                st.state = State::Text;
                st.pos = st.tok_start + rstrip_close.len();
                let token = make_token(st, close_kind);
                rstrip(st);
                return token;
            }
            if rest.starts_with(close) {
                st.state = State::Text;
                st.pos = st.tok_start + close.len();
                return make_token(st, close_kind);
            }
            if ch == b'\n' {
                st.tok_start += 1;
                continue;
            }
            break;
        }

        let ch = st.input.as_bytes()[st.tok_start];
        st.pos = st.tok_start + 1;
        if ch.is_ascii_alphabetic() || ch == b'.' {
            st.minus_state = MinusState::Operator;
            return scan_id(st);
        }

        let current_minus_state = st.minus_state;
        st.minus_state = MinusState::Number;

        match ch {
            b'+' => make_token(st, TokenKind::Plus),
            b'-' => {
                if current_minus_state == MinusState::Operator {
                    make_token(st, TokenKind::Minus)
                } else {
                    scan_number(st)
                }
            }
            b'*' => make_token(st, TokenKind::Times),
            b'/' => make_token(st, TokenKind::Slash),
            b'^' => make_token(st, TokenKind::Power),
            b'%' => make_token(st, TokenKind::Percent),
            b',' => make_token(st, TokenKind::Comma),
            b':' => make_token(st, TokenKind::Colon),
            b'(' => make_token(st, TokenKind::LeftParen),
            b')' => {
                st.minus_state = MinusState::Operator;
                make_token(st, TokenKind::RightParen)
            }
            b'[' => make_token(st, TokenKind::LeftBracket),
            b']' => {
                st.minus_state = MinusState::Operator;
                make_token(st, TokenKind::RightBracket)
            }
            b'{' => make_token(st, TokenKind::LeftBrace),
            b'}' => {
                st.minus_state = MinusState::Operator;
                make_token(st, TokenKind::RightBrace)
            }
            b'>' => {
                if st.input.as_bytes().get(st.pos) == Some(&b'=') {
                    st.pos += 1;
                    make_token(st, TokenKind::GreaterEqual)
                } else {
                    make_token(st, TokenKind::GreaterThan)
                }
            }
            b'<' => {
                if st.input.as_bytes().get(st.pos) == Some(&b'=') {
                    st.pos += 1;
                    make_token(st, TokenKind::LessEqual)
                } else {
                    make_token(st, TokenKind::LessThan)
                }
            }
            b'=' => {
                if st.input.as_bytes().get(st.pos) == Some(&b'=') {
                    st.pos += 1;
                    make_token(st, TokenKind::Equal)
                } else {
                    make_token(st, TokenKind::Unknown)
                }
            }
            b'!' => {
                if st.input.as_bytes().get(st.pos) == Some(&b'=') {
                    st.pos += 1;
                    make_token(st, TokenKind::NotEqual)
                } else {
                    make_token(st, TokenKind::Unknown)
                }
            }
            b'"' => scan_string(st),
            b'0'..=b'9' => {
                st.minus_state = MinusState::Operator;
                scan_number(st)
            }
            b'_' | b'@' | b'$' => {
                st.minus_state = MinusState::Operator;
                scan_id(st)
            }
            _ => {
                // unrepresentable byte; consume a whole character so the
                // token slices at a UTF-8 boundary
                if let Some(c) = st.input[st.tok_start..].chars().next() {
                    st.pos = st.tok_start + c.len_utf8();
                }
                make_token(st, TokenKind::Unknown)
            }
        }
    }

    fn scan_comment<'src>(&self, st: &mut LexerState<'src>) -> Token<'src> {
        st.tok_start = st.pos;
        if st.tok_start >= st.input.len() {
            return make_token(st, TokenKind::Eof);
        }
        let Some(end) = st.input[st.pos..].find(&self.config.comment_close) else {
            st.pos = st.input.len();
            return make_token(st, TokenKind::Eof);
        };

        // the trim variant overlaps the close by one byte
        let must_rstrip = st.pos + end > 0
            && st.input[st.pos + end - 1..].starts_with(&self.config.comment_close_force_rstrip);

        // the whole comment body is carried by the close token
        st.state = State::Text;
        st.pos += end + self.config.comment_close.len();
        let token = make_token(st, TokenKind::CommentClose);
        if must_rstrip {
            rstrip(st);
        }
        token
    }
}

fn make_token<'src>(st: &LexerState<'src>, kind: TokenKind) -> Token<'src> {
    let start = st.tok_start.min(st.input.len());
    let end = st.pos.clamp(start, st.input.len());
    Token::new(kind, &st.input[start..end], st.tok_start)
}

fn rstrip(st: &mut LexerState<'_>) {
    while st.pos < st.input.len()
        && matches!(st.input.as_bytes()[st.pos], b' ' | b'\t' | b'\n' | b'\r')
    {
        st.pos += 1;
    }
}

fn scan_id<'src>(st: &mut LexerState<'src>) -> Token<'src> {
    while st.pos < st.input.len() {
        let ch = st.input.as_bytes()[st.pos];
        if !ch.is_ascii_alphanumeric() && !matches!(ch, b'.' | b'/' | b'_' | b'-') {
            break;
        }
        st.pos += 1;
    }
    make_token(st, TokenKind::Id)
}

fn scan_number<'src>(st: &mut LexerState<'src>) -> Token<'src> {
    while st.pos < st.input.len() {
        let ch = st.input.as_bytes()[st.pos];
        let after_exponent = st.pos > 0 && matches!(st.input.as_bytes()[st.pos - 1], b'e' | b'E');
        // be very permissive here; errors surface when the literal is parsed
        if !(ch.is_ascii_digit()
            || ch == b'.'
            || ch == b'e'
            || ch == b'E'
            || ((ch == b'+' || ch == b'-') && after_exponent))
        {
            break;
        }
        st.pos += 1;
    }
    make_token(st, TokenKind::Number)
}

fn scan_string<'src>(st: &mut LexerState<'src>) -> Token<'src> {
    let quote = st.input.as_bytes()[st.tok_start];
    let mut escape = false;
    while st.pos < st.input.len() {
        let ch = st.input.as_bytes()[st.pos];
        st.pos += 1;
        if ch == b'\\' {
            escape = !escape;
        } else if !escape && ch == quote {
            break;
        } else {
            escape = false;
        }
    }
    make_token(st, TokenKind::String)
}
