//! Tokenizer for Go `text/template` sources.
//!
//! Text outside `{{ ... }}` becomes [`Token::Text`]; inside an action the
//! usual template lexemes are produced. Whitespace inside actions is kept as
//! [`Token::Space`] because adjacency matters: `.Values.a` is one field chain
//! while `.Values .a` is two operands.

use std::fmt;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_TRIM: &str = "{{- ";
const RIGHT_TRIM_MARK: &str = "-}}";
const COMMENT_OPEN: &str = "/*";
const COMMENT_CLOSE: &str = "*/";

/// Control keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `if`
    If,
    /// `else`
    Else,
    /// `end`
    End,
    /// `range`
    Range,
    /// `with`
    With,
    /// `define`
    Define,
    /// `template`
    Template,
    /// `block`
    Block,
    /// `break`
    Break,
    /// `continue`
    Continue,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "if" => Self::If,
            "else" => Self::Else,
            "end" => Self::End,
            "range" => Self::Range,
            "with" => Self::With,
            "define" => Self::Define,
            "template" => Self::Template,
            "block" => Self::Block,
            "break" => Self::Break,
            "continue" => Self::Continue,
            _ => return None,
        })
    }
}

/// A lexeme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text between actions
    Text(String),
    /// `{{`
    LeftDelim,
    /// `}}`
    RightDelim,
    /// `/* ... */` inside an action
    Comment,
    /// Whitespace run inside an action
    Space,
    /// `.name`
    Field(String),
    /// `$` or `$name`
    Variable(String),
    /// Bare `.`
    Dot,
    /// Function name
    Identifier(String),
    /// Control keyword
    Keyword(Keyword),
    /// Quoted or raw string, unquoted
    String(String),
    /// Character constant, as written
    Char(String),
    /// Numeric literal, as written
    Number(String),
    /// `true` / `false`
    Bool(bool),
    /// `nil`
    Nil,
    /// `|`
    Pipe,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    /// `,`
    Comma,
    /// End of input
    Eof,
}

/// A tokenizing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// 1-based line of the failure
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    /// Trim leading whitespace of the next text token (after `-}}`)
    trim_next_text: bool,
}

/// Tokenize a template.
///
/// # Errors
///
/// Unterminated actions, strings, comments and raw strings, and characters that
/// cannot start a lexeme.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        src,
        pos: 0,
        tokens: Vec::new(),
        trim_next_text: false,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn line(&self) -> usize {
        self.src[..self.pos].matches('\n').count() + 1
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push_text(&mut self, text: &str) {
        let text = if std::mem::take(&mut self.trim_next_text) {
            text.trim_start()
        } else {
            text
        };
        if !text.is_empty() {
            self.tokens.push(Token::Text(text.to_string()));
        }
    }

    fn run(&mut self) -> Result<(), LexError> {
        loop {
            let Some(offset) = self.rest().find(LEFT_DELIM) else {
                let text = self.rest().to_string();
                self.push_text(&text);
                self.pos = self.src.len();
                self.tokens.push(Token::Eof);
                return Ok(());
            };

            let mut text = self.rest()[..offset].to_string();
            self.pos += offset;
            let trim_left = self.rest().starts_with(LEFT_TRIM)
                || self.rest().starts_with("{{-\t")
                || self.rest().starts_with("{{-\n")
                || self.rest().starts_with("{{-\r");
            if trim_left {
                text = text.trim_end().to_string();
            }
            self.push_text(&text);
            self.pos += if trim_left { LEFT_TRIM.len() } else { LEFT_DELIM.len() };
            self.tokens.push(Token::LeftDelim);
            self.inside_action()?;
        }
    }

    /// Lex one action, up to and including its right delimiter.
    fn inside_action(&mut self) -> Result<(), LexError> {
        let mut paren_depth = 0usize;
        loop {
            let rest = self.rest();
            if rest.starts_with(RIGHT_DELIM) {
                self.pos += RIGHT_DELIM.len();
                return self.close_action(false, paren_depth);
            }
            if rest.starts_with(COMMENT_OPEN) {
                let Some(end) = rest.find(COMMENT_CLOSE) else {
                    return Err(self.error("unclosed comment"));
                };
                self.pos += end + COMMENT_CLOSE.len();
                self.tokens.push(Token::Comment);
                continue;
            }

            let Some(c) = self.peek() else {
                return Err(self.error("unclosed action"));
            };
            match c {
                c if c.is_whitespace() => {
                    let rest = self.rest();
                    let run = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
                    // Whitespace directly before "-}}" belongs to the trim marker.
                    if rest[run..].starts_with(RIGHT_TRIM_MARK) {
                        self.pos += run + RIGHT_TRIM_MARK.len();
                        return self.close_action(true, paren_depth);
                    }
                    self.pos += run;
                    self.tokens.push(Token::Space);
                }
                '|' => self.single(Token::Pipe),
                '(' => {
                    paren_depth += 1;
                    self.single(Token::LeftParen);
                }
                ')' => {
                    if paren_depth == 0 {
                        return Err(self.error("unexpected right paren"));
                    }
                    paren_depth -= 1;
                    self.single(Token::RightParen);
                }
                ',' => self.single(Token::Comma),
                '=' => self.single(Token::Assign),
                ':' => {
                    if !self.rest().starts_with(":=") {
                        return Err(self.error("expected :="));
                    }
                    self.pos += 2;
                    self.tokens.push(Token::Declare);
                }
                '"' => self.quoted()?,
                '`' => self.raw_quoted()?,
                '\'' => self.char_constant()?,
                '$' => {
                    self.bump();
                    let name = self.identifier();
                    self.tokens.push(Token::Variable(format!("${name}")));
                }
                '.' => {
                    self.bump();
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.pos -= 1;
                        self.number()?;
                    } else if self.peek().is_some_and(is_ident_char) {
                        let name = self.identifier();
                        self.tokens.push(Token::Field(name));
                    } else {
                        self.tokens.push(Token::Dot);
                    }
                }
                '+' | '-' | '0'..='9' => self.number()?,
                c if is_ident_char(c) => {
                    let ident = self.identifier();
                    let token = match ident.as_str() {
                        "true" => Token::Bool(true),
                        "false" => Token::Bool(false),
                        "nil" => Token::Nil,
                        other => Keyword::from_ident(other)
                            .map_or_else(|| Token::Identifier(ident.clone()), Token::Keyword),
                    };
                    self.tokens.push(token);
                }
                other => {
                    return Err(self.error(format!("unrecognized character in action: {other:?}")));
                }
            }
        }
    }

    fn close_action(&mut self, trim: bool, paren_depth: usize) -> Result<(), LexError> {
        if paren_depth > 0 {
            return Err(self.error("unclosed left paren"));
        }
        if self.tokens.last() == Some(&Token::Space) {
            self.tokens.pop();
        }
        self.tokens.push(Token::RightDelim);
        self.trim_next_text = trim;
        Ok(())
    }

    fn single(&mut self, token: Token) {
        self.bump();
        self.tokens.push(token);
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn number(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.bump();
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        {
            // A sign only continues a number inside an exponent.
            if matches!(self.peek(), Some('+' | '-'))
                && !self.src[start..self.pos].ends_with(['e', 'E', 'p', 'P'])
            {
                break;
            }
            self.bump();
        }
        let literal = &self.src[start..self.pos];
        if !literal.chars().any(|c| c.is_ascii_digit()) {
            return Err(self.error(format!("bad number syntax: {literal:?}")));
        }
        self.tokens.push(Token::Number(literal.to_string()));
        Ok(())
    }

    fn quoted(&mut self) -> Result<(), LexError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated quoted string")),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(c @ ('"' | '\\')) => value.push(c),
                    Some(c) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(c) => value.push(c),
            }
        }
        self.tokens.push(Token::String(value));
        Ok(())
    }

    fn raw_quoted(&mut self) -> Result<(), LexError> {
        self.bump();
        let Some(end) = self.rest().find('`') else {
            return Err(self.error("unterminated raw quoted string"));
        };
        let value = self.rest()[..end].to_string();
        self.pos += end + 1;
        self.tokens.push(Token::String(value));
        Ok(())
    }

    fn char_constant(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated character constant")),
                Some('\\') => {
                    self.bump();
                }
                Some('\'') => break,
                Some(_) => {}
            }
        }
        self.tokens.push(Token::Char(self.src[start..self.pos].to_string()));
        Ok(())
    }
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}
