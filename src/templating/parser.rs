//! Recursive-descent parser producing a small syntax tree of a Go template.
//!
//! The tree keeps exactly what reference analysis needs: pipelines with their
//! declarations, commands and operands, and the control structures that change
//! what `.` refers to. `{{ else if ... }}` and `{{ else with ... }}` are
//! represented as an else branch holding a single nested node, sharing the
//! enclosing `{{ end }}`.

use std::fmt;

use super::lexer::{Keyword, Token, tokenize};

/// An operand of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `.a.b` relative to dot
    Field(Vec<String>),
    /// `$x.a.b` (`$` alone is the root)
    Variable {
        /// Variable name including `$`
        name: String,
        /// Field chain after the variable
        fields: Vec<String>,
    },
    /// `(pipeline).a.b`
    Chain {
        /// The parenthesized pipeline
        pipeline: Pipeline,
        /// Field chain after the closing paren
        fields: Vec<String>,
    },
    /// Bare `.`
    Dot,
    /// Function name
    Identifier(String),
    /// String literal
    String(String),
    /// Numeric literal
    Number(String),
    /// Character constant
    Char(String),
    /// Boolean literal
    Bool(bool),
    /// `nil`
    Nil,
}

/// One command of a pipeline: a function call or a single operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Operands, function name first when it is a call
    pub args: Vec<Operand>,
}

/// `$x := cmd | cmd`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    /// Declared or assigned variables
    pub decl: Vec<String>,
    /// Commands separated by `|`
    pub commands: Vec<Command>,
}

/// Body and else-branch of `if`, `with` and `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Condition or ranged/with pipeline
    pub pipeline: Pipeline,
    /// Nodes run when the pipeline is non-empty
    pub body: Vec<Node>,
    /// Nodes of the `else` branch
    pub else_body: Option<Vec<Node>>,
}

/// A template syntax tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text
    Text(String),
    /// `{{ pipeline }}`
    Action(Pipeline),
    /// `{{/* ... */}}`
    Comment,
    /// `{{ if }}`
    If(Branch),
    /// `{{ with }}`
    With(Branch),
    /// `{{ range }}`
    Range(Branch),
    /// `{{ define "name" }}`
    Define {
        /// Template name
        name: String,
        /// Template body
        body: Vec<Node>,
    },
    /// `{{ template "name" pipeline }}`
    Template {
        /// Template name
        name: String,
        /// Argument
        pipeline: Option<Pipeline>,
    },
    /// `{{ block "name" pipeline }}`
    Block {
        /// Template name
        name: String,
        /// Argument
        pipeline: Pipeline,
        /// Default body
        body: Vec<Node>,
    },
    /// `{{ break }}`
    Break,
    /// `{{ continue }}`
    Continue,
}

/// A parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

fn error<T>(message: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError {
        message: message.into(),
    })
}

/// How a list of nodes ended.
enum Terminator {
    Eof,
    End,
    Else(Option<(Keyword, Pipeline)>),
}

/// What a single action turned out to be.
enum ActionItem {
    Node(Node),
    End,
    Else(Option<(Keyword, Pipeline)>),
}

/// Parse a template into its top-level nodes.
///
/// # Errors
///
/// Lexing errors, unbalanced `end`/`else`, malformed pipelines, and `break` or
/// `continue` outside `range`.
pub fn parse(src: &str) -> Result<Vec<Node>, ParseError> {
    let tokens = tokenize(src).map_err(|e| ParseError {
        message: e.to_string(),
    })?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        range_depth: 0,
    };
    let (nodes, terminator) = parser.list()?;
    match terminator {
        Terminator::Eof => Ok(nodes),
        Terminator::End => error("unexpected {{end}}"),
        Terminator::Else(_) => error("unexpected {{else}}"),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    range_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn skip_space(&mut self) {
        while self.peek() == &Token::Space {
            self.pos += 1;
        }
    }

    fn peek_non_space(&mut self) -> &Token {
        self.skip_space();
        self.peek()
    }

    fn expect_right_delim(&mut self, context: &str) -> Result<(), ParseError> {
        match self.next_non_space() {
            Token::RightDelim => Ok(()),
            other => error(format!("unexpected {other:?} in {context}")),
        }
    }

    fn next_non_space(&mut self) -> Token {
        self.skip_space();
        self.next()
    }

    fn list(&mut self) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();
        loop {
            match self.next() {
                Token::Eof => return Ok((nodes, Terminator::Eof)),
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::LeftDelim => match self.action()? {
                    ActionItem::Node(node) => nodes.push(node),
                    ActionItem::End => return Ok((nodes, Terminator::End)),
                    ActionItem::Else(chain) => return Ok((nodes, Terminator::Else(chain))),
                },
                other => return error(format!("unexpected {other:?} outside action")),
            }
        }
    }

    fn action(&mut self) -> Result<ActionItem, ParseError> {
        match self.peek_non_space().clone() {
            Token::Comment => {
                self.next();
                self.expect_right_delim("comment")?;
                Ok(ActionItem::Node(Node::Comment))
            }
            Token::Keyword(keyword) => {
                self.next();
                self.keyword(keyword)
            }
            _ => {
                let pipeline = self.pipeline(true, &Token::RightDelim)?;
                Ok(ActionItem::Node(Node::Action(pipeline)))
            }
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Result<ActionItem, ParseError> {
        match keyword {
            Keyword::End => {
                self.expect_right_delim("end")?;
                Ok(ActionItem::End)
            }
            Keyword::Else => match self.peek_non_space() {
                Token::Keyword(k @ (Keyword::If | Keyword::With)) => {
                    let k = *k;
                    self.next();
                    let pipeline = self.pipeline(true, &Token::RightDelim)?;
                    Ok(ActionItem::Else(Some((k, pipeline))))
                }
                _ => {
                    self.expect_right_delim("else")?;
                    Ok(ActionItem::Else(None))
                }
            },
            Keyword::If | Keyword::With | Keyword::Range => {
                let pipeline = self.pipeline(true, &Token::RightDelim)?;
                self.branch(keyword, pipeline).map(ActionItem::Node)
            }
            Keyword::Define => {
                let name = self.template_name("define")?;
                self.expect_right_delim("define")?;
                let body = self.body_until_end("define")?;
                Ok(ActionItem::Node(Node::Define { name, body }))
            }
            Keyword::Template => {
                let name = self.template_name("template")?;
                let pipeline = if self.peek_non_space() == &Token::RightDelim {
                    self.next();
                    None
                } else {
                    Some(self.pipeline(false, &Token::RightDelim)?)
                };
                Ok(ActionItem::Node(Node::Template { name, pipeline }))
            }
            Keyword::Block => {
                let name = self.template_name("block")?;
                let pipeline = self.pipeline(false, &Token::RightDelim)?;
                let body = self.body_until_end("block")?;
                Ok(ActionItem::Node(Node::Block { name, pipeline, body }))
            }
            Keyword::Break | Keyword::Continue => {
                if self.range_depth == 0 {
                    let name = keyword_name(keyword);
                    return error(format!("{{{{{name}}}}} outside {{{{range}}}}"));
                }
                self.expect_right_delim(keyword_name(keyword))?;
                Ok(ActionItem::Node(if keyword == Keyword::Break {
                    Node::Break
                } else {
                    Node::Continue
                }))
            }
        }
    }

    fn body_until_end(&mut self, context: &str) -> Result<Vec<Node>, ParseError> {
        match self.list()? {
            (body, Terminator::End) => Ok(body),
            (_, Terminator::Else(_)) => error(format!("unexpected {{{{else}}}} in {context}")),
            (_, Terminator::Eof) => error(format!("unexpected EOF in {context}")),
        }
    }

    fn branch(&mut self, keyword: Keyword, pipeline: Pipeline) -> Result<Node, ParseError> {
        let context = keyword_name(keyword);
        if keyword == Keyword::Range {
            self.range_depth += 1;
        }
        let body = self.list();
        if keyword == Keyword::Range {
            self.range_depth -= 1;
        }

        let (body, terminator) = body?;
        let else_body = match terminator {
            Terminator::End => None,
            Terminator::Eof => return error(format!("unexpected EOF in {context}")),
            Terminator::Else(None) => Some(self.body_until_end(context)?),
            Terminator::Else(Some((nested, nested_pipeline))) => {
                Some(vec![self.branch(nested, nested_pipeline)?])
            }
        };
        Ok(make_branch(keyword, pipeline, body, else_body))
    }

    fn template_name(&mut self, context: &str) -> Result<String, ParseError> {
        match self.next_non_space() {
            Token::String(name) => Ok(name),
            other => error(format!("expected template name in {context}, found {other:?}")),
        }
    }

    /// Parse a pipeline up to and including `end` (`}}` or `)`).
    fn pipeline(&mut self, allow_decl: bool, end: &Token) -> Result<Pipeline, ParseError> {
        let mut pipeline = Pipeline::default();
        if allow_decl {
            pipeline.decl = self.declarations();
        }

        loop {
            let command = self.command(end)?;
            pipeline.commands.push(command);
            match self.next_non_space() {
                Token::Pipe => {}
                token if &token == end => break,
                other => return error(format!("unexpected {other:?} in pipeline")),
            }
        }
        Ok(pipeline)
    }

    /// `$x :=`, `$k, $v :=` or `$x =`; restores position when absent.
    fn declarations(&mut self) -> Vec<String> {
        let start = self.pos;
        let mut names = Vec::new();
        loop {
            let Token::Variable(name) = self.peek_non_space().clone() else {
                break;
            };
            self.next();
            names.push(name);
            match self.peek_non_space() {
                Token::Comma => {
                    self.next();
                }
                Token::Declare | Token::Assign => {
                    self.next();
                    return names;
                }
                _ => break,
            }
        }
        self.pos = start;
        Vec::new()
    }

    fn command(&mut self, end: &Token) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        loop {
            let token = self.peek_non_space().clone();
            if token == Token::Pipe || &token == end {
                break;
            }
            args.push(self.operand()?);
        }
        if args.is_empty() {
            return error("missing value for command");
        }
        Ok(Command { args })
    }

    fn fields(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let Token::Field(name) = self.peek() {
            fields.push(name.clone());
            self.pos += 1;
        }
        fields
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        Ok(match self.next() {
            Token::Field(first) => {
                let mut fields = vec![first];
                fields.extend(self.fields());
                Operand::Field(fields)
            }
            Token::Variable(name) => {
                let fields = self.fields();
                Operand::Variable { name, fields }
            }
            Token::LeftParen => {
                let pipeline = self.pipeline(true, &Token::RightParen)?;
                let fields = self.fields();
                Operand::Chain { pipeline, fields }
            }
            Token::Dot => Operand::Dot,
            Token::Identifier(name) => Operand::Identifier(name),
            Token::String(s) => Operand::String(s),
            Token::Number(n) => Operand::Number(n),
            Token::Char(c) => Operand::Char(c),
            Token::Bool(b) => Operand::Bool(b),
            Token::Nil => Operand::Nil,
            other => return error(format!("unexpected {other:?} in operand")),
        })
    }
}

const fn keyword_name(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::If => "if",
        Keyword::Else => "else",
        Keyword::End => "end",
        Keyword::Range => "range",
        Keyword::With => "with",
        Keyword::Define => "define",
        Keyword::Template => "template",
        Keyword::Block => "block",
        Keyword::Break => "break",
        Keyword::Continue => "continue",
    }
}

fn make_branch(
    keyword: Keyword,
    pipeline: Pipeline,
    body: Vec<Node>,
    else_body: Option<Vec<Node>>,
) -> Node {
    let branch = Branch {
        pipeline,
        body,
        else_body,
    };
    match keyword {
        Keyword::With => Node::With(branch),
        Keyword::Range => Node::Range(branch),
        _ => Node::If(branch),
    }
}
