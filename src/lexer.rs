//! Tokenizer for the PHP subset accepted by [`crate::parser`].
use crate::error::ParseError;

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Possibly namespaced name; the lexeme keeps any `\` separators.
    Identifier,
    /// `$name` without the sigil.
    Variable(String),
    StringLiteral(String),
    /// Double-quoted string with `$var` / `{$expr}` parts, kept as raw text.
    InterpolatedString(String),
    NumberLiteral(f64),
    DocComment(String),
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    /// `#[`, opens an attribute group.
    AttributeOpen,
    Comma,
    Semicolon,
    Colon,
    DoubleColon,
    Question,
    DoubleQuestion,
    Arrow,         // ->
    NullsafeArrow, // ?->
    FatArrow,      // =>
    Ellipsis,
    Dot,
    Equal,
    /// `+=`, `.=`, `??=` and friends.
    CompoundAssign,
    DoubleEqual,
    TripleEqual,
    BangEqual,
    BangDoubleEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AmpersandAmpersand,
    PipePipe,
    Ampersand,
    Pipe,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    At,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Namespace,
    Use,
    As,
    Class,
    Interface,
    Trait,
    Abstract,
    Final,
    Readonly,
    Extends,
    Implements,
    Function,
    Fn,
    Public,
    Protected,
    Private,
    Static,
    Const,
    Var,
    Return,
    If,
    ElseIf,
    Else,
    Foreach,
    New,
    Instanceof,
    And,
    Or,
    Declare,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        let keyword = match ident.to_ascii_lowercase().as_str() {
            "namespace" => Keyword::Namespace,
            "use" => Keyword::Use,
            "as" => Keyword::As,
            "class" => Keyword::Class,
            "interface" => Keyword::Interface,
            "trait" => Keyword::Trait,
            "abstract" => Keyword::Abstract,
            "final" => Keyword::Final,
            "readonly" => Keyword::Readonly,
            "extends" => Keyword::Extends,
            "implements" => Keyword::Implements,
            "function" => Keyword::Function,
            "fn" => Keyword::Fn,
            "public" => Keyword::Public,
            "protected" => Keyword::Protected,
            "private" => Keyword::Private,
            "static" => Keyword::Static,
            "const" => Keyword::Const,
            "var" => Keyword::Var,
            "return" => Keyword::Return,
            "if" => Keyword::If,
            "elseif" => Keyword::ElseIf,
            "else" => Keyword::Else,
            "foreach" => Keyword::Foreach,
            "new" => Keyword::New,
            "instanceof" => Keyword::Instanceof,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "declare" => Keyword::Declare,
            _ => return None,
        };
        Some(keyword)
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        self.skip_open_tag();

        while let Some(ch) = self.peek_char() {
            let (line, column) = (self.line, self.column);
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance_char();
                }
                '/' if self.peek_next_char() == Some('/') => self.skip_line_comment(),
                '#' if self.peek_next_char() == Some('[') => {
                    self.advance_char();
                    self.advance_char();
                    tokens.push(Token::new(TokenKind::AttributeOpen, "#[".into(), line, column));
                }
                '#' => self.skip_line_comment(),
                '/' if self.peek_next_char() == Some('*') => {
                    if let Some(doc) = self.block_comment(line, column)? {
                        tokens.push(doc);
                    }
                }
                '?' if self.remaining().starts_with("?>") => {
                    // closing tag: anything after it is inline HTML we do not model
                    self.position = self.input.len();
                }
                '$' => tokens.push(self.variable(line, column)?),
                '\'' => tokens.push(self.single_quoted(line, column)?),
                '"' => tokens.push(self.double_quoted(line, column)?),
                c if c.is_ascii_digit() => tokens.push(self.number(line, column)?),
                c if is_ident_start(c) || c == '\\' => tokens.push(self.identifier(line, column)),
                _ => tokens.push(self.symbol(line, column)?),
            }
        }

        tokens.push(Token::new(TokenKind::Eof, String::new(), self.line, self.column));
        Ok(tokens)
    }

    fn skip_open_tag(&mut self) {
        let trimmed = self.input.trim_start();
        let offset = self.input.len() - trimmed.len();
        if trimmed.starts_with("<?php") {
            for _ in 0..offset + "<?php".len() {
                self.advance_char();
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    /// Consumes a `/* */` comment; `/** */` comments come back as tokens.
    fn block_comment(&mut self, line: usize, column: usize) -> Result<Option<Token>, ParseError> {
        let start = self.position;
        let is_doc = self.remaining().starts_with("/**") && !self.remaining().starts_with("/**/");
        self.advance_char();
        self.advance_char();
        loop {
            match self.peek_char() {
                None => return Err(ParseError::new("unterminated comment", line, column)),
                Some('*') if self.peek_next_char() == Some('/') => {
                    self.advance_char();
                    self.advance_char();
                    break;
                }
                Some(_) => {
                    self.advance_char();
                }
            }
        }
        if !is_doc {
            return Ok(None);
        }
        let text = self.input[start..self.position].to_string();
        Ok(Some(Token::new(TokenKind::DocComment(text.clone()), text, line, column)))
    }

    fn variable(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        self.advance_char();
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if !is_ident_char(ch) {
                break;
            }
            self.advance_char();
        }
        if start == self.position {
            return Err(ParseError::new("expected variable name after '$'", line, column));
        }
        let name = self.input[start..self.position].to_string();
        Ok(Token::new(TokenKind::Variable(name.clone()), format!("${name}"), line, column))
    }

    fn single_quoted(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        let start = self.position;
        self.advance_char();
        let mut value = String::new();
        loop {
            match self.advance_char() {
                None => return Err(ParseError::new("unterminated string literal", line, column)),
                Some('\'') => break,
                Some('\\') => match self.peek_char() {
                    Some(c @ ('\'' | '\\')) => {
                        self.advance_char();
                        value.push(c);
                    }
                    _ => value.push('\\'),
                },
                Some(c) => value.push(c),
            }
        }
        let lexeme = self.input[start..self.position].to_string();
        Ok(Token::new(TokenKind::StringLiteral(value), lexeme, line, column))
    }

    /// Interpolation is not evaluated; a string with an unescaped `$name`,
    /// `${` or `{$` comes back as [`TokenKind::InterpolatedString`].
    fn double_quoted(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        let start = self.position;
        self.advance_char();
        let mut value = String::new();
        let mut interpolated = false;
        loop {
            match self.advance_char() {
                None => return Err(ParseError::new("unterminated string literal", line, column)),
                Some('"') => break,
                Some('$') if self.peek_char().is_some_and(|c| is_ident_start(c) || c == '{') => {
                    interpolated = true;
                    value.push('$');
                }
                Some('{') if self.peek_char() == Some('$') => {
                    interpolated = true;
                    value.push('{');
                }
                Some('\\') => match self.advance_char() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(c @ ('"' | '\\' | '$')) => value.push(c),
                    Some(c) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => return Err(ParseError::new("unterminated string literal", line, column)),
                },
                Some(c) => value.push(c),
            }
        }
        let lexeme = self.input[start..self.position].to_string();
        let kind = if interpolated {
            TokenKind::InterpolatedString(value)
        } else {
            TokenKind::StringLiteral(value)
        };
        Ok(Token::new(kind, lexeme, line, column))
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        let start = self.position;
        let mut seen_dot = false;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || ch == '_' {
                self.advance_char();
            } else if ch == '.' && !seen_dot && self.peek_next_char().is_some_and(|c| c.is_ascii_digit()) {
                seen_dot = true;
                self.advance_char();
            } else {
                break;
            }
        }
        let lexeme = &self.input[start..self.position];
        let value = lexeme
            .replace('_', "")
            .parse::<f64>()
            .map_err(|_| ParseError::new(format!("invalid number literal '{lexeme}'"), line, column))?;
        Ok(Token::new(TokenKind::NumberLiteral(value), lexeme.to_string(), line, column))
    }

    fn identifier(&mut self, line: usize, column: usize) -> Token {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if is_ident_char(ch) || ch == '\\' {
                self.advance_char();
            } else {
                break;
            }
        }
        let lexeme = self.input[start..self.position].to_string();
        let kind = if lexeme.contains('\\') {
            TokenKind::Identifier
        } else {
            Keyword::from_ident(&lexeme).map_or(TokenKind::Identifier, TokenKind::Keyword)
        };
        Token::new(kind, lexeme, line, column)
    }

    fn symbol(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        const SYMBOLS: &[(&str, TokenKind)] = &[
            ("??=", TokenKind::CompoundAssign),
            ("?->", TokenKind::NullsafeArrow),
            ("===", TokenKind::TripleEqual),
            ("!==", TokenKind::BangDoubleEqual),
            ("...", TokenKind::Ellipsis),
            ("->", TokenKind::Arrow),
            ("=>", TokenKind::FatArrow),
            ("::", TokenKind::DoubleColon),
            ("??", TokenKind::DoubleQuestion),
            ("==", TokenKind::DoubleEqual),
            ("!=", TokenKind::BangEqual),
            ("<>", TokenKind::BangEqual),
            ("<=", TokenKind::LessEqual),
            (">=", TokenKind::GreaterEqual),
            ("&&", TokenKind::AmpersandAmpersand),
            ("||", TokenKind::PipePipe),
            (".=", TokenKind::CompoundAssign),
            ("+=", TokenKind::CompoundAssign),
            ("-=", TokenKind::CompoundAssign),
            ("*=", TokenKind::CompoundAssign),
            ("/=", TokenKind::CompoundAssign),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            (",", TokenKind::Comma),
            (";", TokenKind::Semicolon),
            (":", TokenKind::Colon),
            ("?", TokenKind::Question),
            (".", TokenKind::Dot),
            ("=", TokenKind::Equal),
            ("<", TokenKind::Less),
            (">", TokenKind::Greater),
            ("&", TokenKind::Ampersand),
            ("|", TokenKind::Pipe),
            ("!", TokenKind::Bang),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("@", TokenKind::At),
        ];

        for (text, kind) in SYMBOLS {
            if self.remaining().starts_with(text) {
                for _ in 0..text.len() {
                    self.advance_char();
                }
                return Ok(Token::new(kind.clone(), text.to_string(), line, column));
            }
        }

        let ch = self.peek_char().unwrap_or_default();
        Err(ParseError::new(format!("unexpected character '{ch}'"), line, column))
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut chars = self.remaining().chars();
        chars.next();
        chars.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
