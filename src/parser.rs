//! Recursive-descent parser producing [`SourceUnit`]s.
//!
//! Covers declarations (namespace, imports, classes and their methods) in
//! full and statements/expressions to the extent transformer methods use
//! them. Control flow the inference engine never looks into (`while`,
//! `for`, `try`, `switch`) is parsed only far enough to keep nested
//! `return`s visible.
use ordered_float::OrderedFloat;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

type PResult<T> = Result<T, ParseError>;

/// Tokenize and parse a whole source file.
pub fn parse(source: &str) -> PResult<SourceUnit> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

/// Parse a lone expression, e.g. a snippet from a config or a test.
pub fn parse_expr(source: &str) -> PResult<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_expression()
}

#[derive(Copy, Clone, PartialEq, PartialOrd)]
enum Precedence {
    Lowest = 0,
    Assignment,
    Ternary,
    Coalesce,
    Or,
    And,
    Equality,
    Comparison,
    Concat,
    Term,
    Factor,
    Instanceof,
    Unary,
}

impl Precedence {
    fn of(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Equal | TokenKind::CompoundAssign => Some(Precedence::Assignment),
            TokenKind::Question => Some(Precedence::Ternary),
            TokenKind::DoubleQuestion => Some(Precedence::Coalesce),
            TokenKind::PipePipe | TokenKind::Keyword(Keyword::Or) => Some(Precedence::Or),
            TokenKind::AmpersandAmpersand | TokenKind::Keyword(Keyword::And) => Some(Precedence::And),
            TokenKind::DoubleEqual
            | TokenKind::TripleEqual
            | TokenKind::BangEqual
            | TokenKind::BangDoubleEqual => Some(Precedence::Equality),
            TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => {
                Some(Precedence::Comparison)
            }
            TokenKind::Dot => Some(Precedence::Concat),
            TokenKind::Plus | TokenKind::Minus => Some(Precedence::Term),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(Precedence::Factor),
            TokenKind::Keyword(Keyword::Instanceof) => Some(Precedence::Instanceof),
            _ => None,
        }
    }
}

const CAST_TYPES: &[&str] = &["int", "integer", "float", "double", "string", "bool", "boolean", "array", "object"];

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> PResult<SourceUnit> {
        let mut unit = SourceUnit::default();
        let mut pending_doc: Option<String> = None;
        let mut braced_namespace = false;

        while !self.is_at_end() {
            match self.peek_kind().clone() {
                TokenKind::DocComment(text) => {
                    self.advance();
                    pending_doc = Some(text);
                    continue;
                }
                TokenKind::AttributeOpen => {
                    self.skip_attribute()?;
                    continue;
                }
                TokenKind::Keyword(Keyword::Namespace) => {
                    braced_namespace = self.parse_namespace(&mut unit)?;
                }
                TokenKind::Keyword(Keyword::Use) => {
                    let uses = self.parse_use()?;
                    unit.uses.extend(uses);
                }
                TokenKind::Keyword(Keyword::Declare) => {
                    self.advance();
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                    self.expect_token(TokenKind::Semicolon, "expected ';' after declare")?;
                }
                TokenKind::Keyword(
                    Keyword::Abstract
                    | Keyword::Final
                    | Keyword::Readonly
                    | Keyword::Class
                    | Keyword::Interface
                    | Keyword::Trait,
                ) => {
                    let class = self.parse_class(pending_doc.take())?;
                    unit.classes.push(class);
                }
                TokenKind::Keyword(Keyword::Function)
                    if matches!(self.peek_kind_at(1), Some(TokenKind::Identifier)) =>
                {
                    // free function declarations carry no transformer
                    self.parse_method()?;
                }
                TokenKind::Keyword(Keyword::Const) => self.skip_until_semicolon()?,
                TokenKind::RBrace if braced_namespace => {
                    self.advance();
                    braced_namespace = false;
                }
                TokenKind::Semicolon => {
                    self.advance();
                }
                _ => {
                    // free-standing code outside classes is irrelevant to us
                    self.parse_statement()?;
                }
            }
            pending_doc = None;
        }

        Ok(unit)
    }

    // ———————————————————————————————— declarations ———————————————————————————————

    /// Returns true for the braced `namespace X { ... }` form.
    fn parse_namespace(&mut self, unit: &mut SourceUnit) -> PResult<bool> {
        self.advance();
        if self.check(&TokenKind::Identifier) {
            let name = self.advance().lexeme.clone();
            unit.namespace = Some(Name::new(name));
        }
        if self.check(&TokenKind::LBrace) {
            self.advance();
            return Ok(true);
        }
        self.expect_token(TokenKind::Semicolon, "expected ';' after namespace declaration")?;
        Ok(false)
    }

    fn parse_use(&mut self) -> PResult<Vec<UseDecl>> {
        self.advance();
        // `use function foo;` and `use const BAR;` do not import types
        if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Function | Keyword::Const)) {
            self.skip_until_semicolon()?;
            return Ok(Vec::new());
        }

        let mut uses = Vec::new();
        loop {
            let name = self.expect_identifier("expected imported name")?;
            if name.ends_with('\\') && self.check(&TokenKind::LBrace) {
                // group use: `use App\Models\{User, Post as Article};`
                self.advance();
                while !self.check(&TokenKind::RBrace) {
                    let member = self.expect_identifier("expected name in group use")?;
                    let alias = self.parse_use_alias()?;
                    uses.push(UseDecl { name: Name::new(format!("{name}{member}")), alias });
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect_token(TokenKind::RBrace, "expected '}' closing group use")?;
            } else {
                let alias = self.parse_use_alias()?;
                uses.push(UseDecl { name: Name::new(name), alias });
            }
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect_token(TokenKind::Semicolon, "expected ';' after use declaration")?;
        Ok(uses)
    }

    fn parse_use_alias(&mut self) -> PResult<Option<String>> {
        if !self.check_keyword(Keyword::As) {
            return Ok(None);
        }
        self.advance();
        Ok(Some(self.expect_identifier("expected alias after 'as'")?))
    }

    fn parse_class(&mut self, doc_comment: Option<String>) -> PResult<ClassDecl> {
        while matches!(
            self.peek_kind(),
            TokenKind::Keyword(Keyword::Abstract | Keyword::Final | Keyword::Readonly)
        ) {
            self.advance();
        }
        if !matches!(
            self.peek_kind(),
            TokenKind::Keyword(Keyword::Class | Keyword::Interface | Keyword::Trait)
        ) {
            return Err(self.error_here("expected 'class', 'interface' or 'trait'"));
        }
        self.advance();
        let name = self.expect_identifier("expected class name")?;

        let mut extends = None;
        let mut implements = Vec::new();
        if self.check_keyword(Keyword::Extends) {
            self.advance();
            extends = Some(Name::new(self.expect_identifier("expected parent class name")?));
            // interfaces may extend several parents
            while self.check(&TokenKind::Comma) {
                self.advance();
                implements.push(Name::new(self.expect_identifier("expected interface name")?));
            }
        }
        if self.check_keyword(Keyword::Implements) {
            self.advance();
            loop {
                implements.push(Name::new(self.expect_identifier("expected interface name")?));
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        self.expect_token(TokenKind::LBrace, "expected '{' to open class body")?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(self.error_here("unterminated class body"));
            }
            match self.peek_kind() {
                TokenKind::DocComment(_) | TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::AttributeOpen => self.skip_attribute()?,
                TokenKind::Keyword(Keyword::Use) => self.skip_trait_use()?,
                TokenKind::Keyword(
                    Keyword::Public
                    | Keyword::Protected
                    | Keyword::Private
                    | Keyword::Static
                    | Keyword::Abstract
                    | Keyword::Final
                    | Keyword::Readonly
                    | Keyword::Var,
                ) => {
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Const) => self.skip_until_semicolon()?,
                TokenKind::Keyword(Keyword::Function) => methods.push(self.parse_method()?),
                // typed or untyped property declaration
                _ => self.skip_until_semicolon()?,
            }
        }
        self.advance();

        Ok(ClassDecl {
            name,
            doc_comment,
            extends,
            implements,
            methods,
        })
    }

    fn skip_trait_use(&mut self) -> PResult<()> {
        self.advance();
        while !matches!(self.peek_kind(), TokenKind::Semicolon | TokenKind::LBrace) {
            if self.is_at_end() {
                return Err(self.error_here("unterminated trait use"));
            }
            self.advance();
        }
        if self.check(&TokenKind::LBrace) {
            return self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
        }
        self.advance();
        Ok(())
    }

    fn parse_method(&mut self) -> PResult<Method> {
        self.advance();
        if self.check(&TokenKind::Ampersand) {
            self.advance();
        }
        let name = self.expect_member_name("expected method name")?;
        let params = self.parse_parameters()?;
        self.skip_return_type()?;

        let body = if self.check(&TokenKind::Semicolon) {
            self.advance();
            None
        } else {
            Some(self.parse_block()?)
        };
        Ok(Method { name, params, body })
    }

    /// Parameter names only; types, defaults and attributes are skipped.
    fn parse_parameters(&mut self) -> PResult<Vec<String>> {
        self.expect_token(TokenKind::LParen, "expected '(' to open parameter list")?;
        let mut params = Vec::new();
        let mut depth = 1usize;
        loop {
            let token = self.advance().clone();
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::AttributeOpen => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Variable(name) if depth == 1 => params.push(name),
                TokenKind::Eof => {
                    return Err(ParseError::new("unterminated parameter list", token.line, token.column));
                }
                _ => {}
            }
        }
        Ok(params)
    }

    fn skip_return_type(&mut self) -> PResult<()> {
        if !self.check(&TokenKind::Colon) {
            return Ok(());
        }
        while !matches!(
            self.peek_kind(),
            TokenKind::LBrace | TokenKind::Semicolon | TokenKind::FatArrow
        ) {
            if self.is_at_end() {
                return Err(self.error_here("unterminated return type"));
            }
            self.advance();
        }
        Ok(())
    }

    // ———————————————————————————————— statements ————————————————————————————————

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_token(TokenKind::LBrace, "expected '{'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(self.error_here("unterminated block"));
            }
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
        }
        self.advance();
        Ok(statements)
    }

    /// A braced block or a single statement (`if ($x) return 1;`).
    fn parse_body(&mut self) -> PResult<Vec<Stmt>> {
        if self.check(&TokenKind::LBrace) {
            return self.parse_block();
        }
        Ok(self.parse_statement()?.into_iter().collect())
    }

    fn parse_statement(&mut self) -> PResult<Option<Stmt>> {
        match self.peek_kind() {
            TokenKind::Semicolon | TokenKind::DocComment(_) => {
                self.advance();
                Ok(None)
            }
            TokenKind::LBrace => Ok(Some(Stmt::Block(self.parse_block()?))),
            TokenKind::Keyword(Keyword::Return) => self.parse_return().map(Some),
            TokenKind::Keyword(Keyword::If) => self.parse_if().map(Some),
            TokenKind::Keyword(Keyword::Foreach) => self.parse_foreach().map(Some),
            TokenKind::Identifier => match self.peek().lexeme.to_ascii_lowercase().as_str() {
                "while" | "for" => self.parse_loop().map(Some),
                "try" => self.parse_try().map(Some),
                "switch" => {
                    self.advance();
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)?;
                    Ok(Some(Stmt::Block(Vec::new())))
                }
                "echo" | "throw" if !matches!(self.peek_kind_at(1), Some(TokenKind::LParen)) => {
                    self.advance();
                    self.parse_expression_statement().map(Some)
                }
                _ => self.parse_expression_statement().map(Some),
            },
            _ => self.parse_expression_statement().map(Some),
        }
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        self.advance();
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(Stmt::Return(None));
        }
        let value = self.parse_expression()?;
        self.expect_statement_end("expected ';' after return value")?;
        Ok(Stmt::Return(Some(value)))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.advance();
        let cond = self.parse_condition()?;
        let then = self.parse_body()?;

        let mut else_ifs = Vec::new();
        let mut otherwise = None;
        loop {
            if self.check_keyword(Keyword::ElseIf) {
                self.advance();
                let cond = self.parse_condition()?;
                else_ifs.push((cond, self.parse_body()?));
            } else if self.check_keyword(Keyword::Else) {
                self.advance();
                otherwise = Some(self.parse_body()?);
                break;
            } else {
                break;
            }
        }

        Ok(Stmt::If {
            cond,
            then,
            else_ifs,
            otherwise,
        })
    }

    fn parse_condition(&mut self) -> PResult<Expr> {
        self.expect_token(TokenKind::LParen, "expected '(' before condition")?;
        let cond = self.parse_expression()?;
        self.expect_token(TokenKind::RParen, "expected ')' after condition")?;
        Ok(cond)
    }

    fn parse_foreach(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect_token(TokenKind::LParen, "expected '(' after foreach")?;
        let subject = self.parse_expression()?;
        if !self.check_keyword(Keyword::As) {
            return Err(self.error_here("expected 'as' in foreach"));
        }
        self.advance();
        let first = self.parse_foreach_target()?;
        let (key, value) = if self.check(&TokenKind::FatArrow) {
            self.advance();
            (Some(first), self.parse_foreach_target()?)
        } else {
            (None, first)
        };
        self.expect_token(TokenKind::RParen, "expected ')' after foreach header")?;
        let body = self.parse_body()?;
        Ok(Stmt::Foreach {
            subject,
            key,
            value,
            body,
        })
    }

    fn parse_foreach_target(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Ampersand) {
            self.advance();
        }
        self.parse_expression()
    }

    fn parse_loop(&mut self) -> PResult<Stmt> {
        self.advance();
        self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
        Ok(Stmt::Block(self.parse_body()?))
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        self.advance();
        let mut blocks = vec![Stmt::Block(self.parse_block()?)];
        loop {
            let lexeme = self.peek().lexeme.to_ascii_lowercase();
            if self.check(&TokenKind::Identifier) && lexeme == "catch" {
                self.advance();
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
                blocks.push(Stmt::Block(self.parse_block()?));
            } else if self.check(&TokenKind::Identifier) && lexeme == "finally" {
                self.advance();
                blocks.push(Stmt::Block(self.parse_block()?));
            } else {
                break;
            }
        }
        Ok(Stmt::Block(blocks))
    }

    fn parse_expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.parse_expression()?;
        self.expect_statement_end("expected ';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    /// `;`, or nothing before a closing brace or end of input (`?>` drops the `;`).
    fn expect_statement_end(&mut self, message: &str) -> PResult<()> {
        match self.peek_kind() {
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.error_here(message)),
        }
    }

    // ———————————————————————————————— expressions ———————————————————————————————

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_expression_prec(Precedence::Lowest)
    }

    fn parse_expression_prec(&mut self, min: Precedence) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let kind = self.peek_kind().clone();
            let Some(prec) = Precedence::of(&kind) else {
                break;
            };
            let right_assoc = matches!(prec, Precedence::Assignment | Precedence::Coalesce);
            if prec < min || (prec == min && !right_assoc) {
                break;
            }
            self.advance();

            lhs = match kind {
                TokenKind::Equal | TokenKind::CompoundAssign => {
                    // `$a = &$b` binds by reference; the value shape is the same
                    if self.check(&TokenKind::Ampersand) {
                        self.advance();
                    }
                    let value = self.parse_expression_prec(Precedence::Lowest)?;
                    Expr::Assign {
                        target: Box::new(lhs),
                        value: Box::new(value),
                    }
                }
                TokenKind::Question => {
                    let then = if self.check(&TokenKind::Colon) {
                        None
                    } else {
                        Some(Box::new(self.parse_expression_prec(Precedence::Lowest)?))
                    };
                    self.expect_token(TokenKind::Colon, "expected ':' in ternary expression")?;
                    let otherwise = self.parse_expression_prec(Precedence::Ternary)?;
                    Expr::Ternary {
                        cond: Box::new(lhs),
                        then,
                        otherwise: Box::new(otherwise),
                    }
                }
                TokenKind::DoubleQuestion => {
                    let rhs = self.parse_expression_prec(Precedence::Coalesce)?;
                    Expr::Binary {
                        op: BinaryOp::Coalesce,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }
                }
                other => {
                    let op = binary_operator_from_token(&other)
                        .ok_or_else(|| self.error_here("unsupported binary operator"))?;
                    let rhs = self.parse_expression_prec(prec)?;
                    Expr::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }
                }
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek_kind() {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_expression_prec(Precedence::Unary)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_expression_prec(Precedence::Unary)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Plus | TokenKind::At => {
                self.advance();
                self.parse_expression_prec(Precedence::Unary)
            }
            TokenKind::LParen if self.is_cast() => {
                self.advance();
                self.advance();
                self.advance();
                self.parse_expression_prec(Precedence::Unary)
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn is_cast(&self) -> bool {
        let Some(TokenKind::Identifier) = self.peek_kind_at(1) else {
            return false;
        };
        let Some(TokenKind::RParen) = self.peek_kind_at(2) else {
            return false;
        };
        let ident = self.tokens[self.current + 1].lexeme.to_ascii_lowercase();
        CAST_TYPES.contains(&ident.as_str())
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> PResult<Expr> {
        loop {
            match self.peek_kind() {
                TokenKind::Arrow | TokenKind::NullsafeArrow => {
                    let nullsafe = self.check(&TokenKind::NullsafeArrow);
                    self.advance();
                    let member = self.expect_member_name("expected property or method name")?;
                    if self.check(&TokenKind::LParen) {
                        let args = self.parse_arguments()?;
                        expr = Expr::MethodCall {
                            target: Box::new(expr),
                            method: member,
                            args,
                            nullsafe,
                        };
                    } else {
                        expr = Expr::PropertyFetch {
                            target: Box::new(expr),
                            property: member,
                            nullsafe,
                        };
                    }
                }
                TokenKind::DoubleColon => {
                    let Expr::ConstFetch(class) = expr else {
                        return Err(self.error_here("'::' is only supported after a class name"));
                    };
                    self.advance();
                    let member = self.expect_member_name("expected member name after '::'")?;
                    if self.check(&TokenKind::LParen) {
                        let args = self.parse_arguments()?;
                        expr = Expr::StaticCall {
                            class,
                            method: member,
                            args,
                        };
                    } else {
                        expr = Expr::ClassConst {
                            class,
                            constant: member,
                        };
                    }
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = if self.check(&TokenKind::RBracket) {
                        None
                    } else {
                        Some(Box::new(self.parse_expression()?))
                    };
                    self.expect_token(TokenKind::RBracket, "expected ']' after index")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::StringLiteral(value) => {
                self.advance();
                Ok(Expr::String(value))
            }
            TokenKind::InterpolatedString(value) => {
                self.advance();
                Ok(Expr::Interpolated(value))
            }
            TokenKind::NumberLiteral(value) => {
                self.advance();
                Ok(Expr::Number(OrderedFloat(value)))
            }
            TokenKind::Variable(name) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_array_items(TokenKind::RBracket)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_token(TokenKind::RParen, "expected ')' after expression")?;
                Ok(inner)
            }
            TokenKind::Keyword(Keyword::New) => self.parse_new(),
            TokenKind::Keyword(Keyword::Fn) => self.parse_arrow_fn(),
            TokenKind::Keyword(Keyword::Function) => self.parse_closure(),
            TokenKind::Keyword(Keyword::Static) => {
                self.advance();
                match self.peek_kind() {
                    TokenKind::Keyword(Keyword::Fn) => self.parse_arrow_fn(),
                    TokenKind::Keyword(Keyword::Function) => self.parse_closure(),
                    _ => Ok(Expr::ConstFetch(Name::new("static"))),
                }
            }
            TokenKind::Identifier => {
                self.advance();
                let lower = token.lexeme.to_ascii_lowercase();
                match lower.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    "null" => Ok(Expr::Null),
                    "array" if self.check(&TokenKind::LParen) => {
                        self.advance();
                        self.parse_array_items(TokenKind::RParen)
                    }
                    _ => Ok(Expr::ConstFetch(Name::new(token.lexeme))),
                }
            }
            _ => Err(ParseError::new(
                format!("unexpected token '{}'", token.lexeme),
                token.line,
                token.column,
            )),
        }
    }

    /// Items of `[...]` or `array(...)`; the opening delimiter is already consumed.
    fn parse_array_items(&mut self, close: TokenKind) -> PResult<Expr> {
        let mut items = Vec::new();
        while !self.check(&close) {
            if self.check(&TokenKind::Comma) {
                // skipped slot in list destructuring: `[, $b]`
                self.advance();
                continue;
            }
            items.push(self.parse_array_item()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect_token(close, "expected end of array literal")?;
        Ok(Expr::Array(items))
    }

    fn parse_array_item(&mut self) -> PResult<ArrayItem> {
        if self.check(&TokenKind::Ellipsis) {
            self.advance();
            let value = self.parse_expression()?;
            return Ok(ArrayItem { key: None, value, unpack: true });
        }
        if self.check(&TokenKind::Ampersand) {
            self.advance();
        }
        let first = self.parse_expression()?;
        if !self.check(&TokenKind::FatArrow) {
            return Ok(ArrayItem { key: None, value: first, unpack: false });
        }
        self.advance();
        if self.check(&TokenKind::Ampersand) {
            self.advance();
        }
        let value = self.parse_expression()?;
        Ok(ArrayItem { key: Some(first), value, unpack: false })
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect_token(TokenKind::LParen, "expected '('")?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::Ellipsis) {
                self.advance();
                // first-class callable syntax: `strlen(...)`
                if self.check(&TokenKind::RParen) {
                    break;
                }
            }
            // named argument: `name: value`
            if self.check(&TokenKind::Identifier) && matches!(self.peek_kind_at(1), Some(TokenKind::Colon)) {
                self.advance();
                self.advance();
            }
            args.push(self.parse_expression()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect_token(TokenKind::RParen, "expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        self.advance();
        let class = match self.peek_kind() {
            TokenKind::Identifier => Name::new(self.advance().lexeme.clone()),
            TokenKind::Keyword(Keyword::Static) => {
                self.advance();
                Name::new("static")
            }
            TokenKind::Keyword(Keyword::Class) => {
                return Err(self.error_here("anonymous classes are not supported"));
            }
            _ => return Err(self.error_here("expected class name after 'new'")),
        };
        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New { class, args })
    }

    fn parse_arrow_fn(&mut self) -> PResult<Expr> {
        self.advance();
        if self.check(&TokenKind::Ampersand) {
            self.advance();
        }
        let params = self.parse_parameters()?;
        self.skip_return_type()?;
        self.expect_token(TokenKind::FatArrow, "expected '=>' in arrow function")?;
        let body = self.parse_expression()?;
        Ok(Expr::ArrowFn {
            params,
            body: Box::new(body),
        })
    }

    fn parse_closure(&mut self) -> PResult<Expr> {
        self.advance();
        if self.check(&TokenKind::Ampersand) {
            self.advance();
        }
        let params = self.parse_parameters()?;
        if self.check_keyword(Keyword::Use) {
            self.advance();
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen)?;
        }
        self.skip_return_type()?;
        let body = self.parse_block()?;
        Ok(Expr::Closure { params, body })
    }

    // ———————————————————————————————— helpers ————————————————————————————————————

    fn skip_attribute(&mut self) -> PResult<()> {
        let start = self.advance().clone();
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance().kind {
                TokenKind::LBracket | TokenKind::AttributeOpen => depth += 1,
                TokenKind::RBracket => depth -= 1,
                TokenKind::Eof => {
                    return Err(ParseError::new("unterminated attribute", start.line, start.column));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Skips a balanced `open ... close` group starting at the current token.
    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) -> PResult<()> {
        if !self.check(&open) {
            return Err(self.error_here("expected opening delimiter"));
        }
        let start = self.advance().clone();
        let mut depth = 1usize;
        while depth > 0 {
            let kind = self.advance().kind.clone();
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth -= 1;
            } else if kind == TokenKind::Eof {
                return Err(ParseError::new("unbalanced delimiters", start.line, start.column));
            }
        }
        Ok(())
    }

    /// Skips to and past the next `;` outside any nesting.
    fn skip_until_semicolon(&mut self) -> PResult<()> {
        let start = self.peek().clone();
        let mut depth = 0usize;
        loop {
            match self.advance().kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace | TokenKind::AttributeOpen => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                }
                TokenKind::Semicolon if depth == 0 => return Ok(()),
                TokenKind::Eof => {
                    return Err(ParseError::new("expected ';'", start.line, start.column));
                }
                _ => {}
            }
        }
    }

    fn expect_token(&mut self, expected: TokenKind, message: &str) -> PResult<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> PResult<String> {
        if self.check(&TokenKind::Identifier) {
            Ok(self.advance().lexeme.clone())
        } else {
            Err(self.error_here(message))
        }
    }

    /// Member names may collide with keywords (`$this->class`, `Foo::new()`).
    fn expect_member_name(&mut self, message: &str) -> PResult<String> {
        match self.peek_kind() {
            TokenKind::Identifier | TokenKind::Keyword(_) => Ok(self.advance().lexeme.clone()),
            TokenKind::Variable(name) => {
                let name = format!("${name}");
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        ParseError::new(format!("{message}, found {found}"), token.line, token.column)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }
}

fn binary_operator_from_token(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::PipePipe | TokenKind::Keyword(Keyword::Or) => BinaryOp::Or,
        TokenKind::AmpersandAmpersand | TokenKind::Keyword(Keyword::And) => BinaryOp::And,
        TokenKind::DoubleEqual => BinaryOp::Equal,
        TokenKind::BangEqual => BinaryOp::NotEqual,
        TokenKind::TripleEqual => BinaryOp::Identical,
        TokenKind::BangDoubleEqual => BinaryOp::NotIdentical,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::Dot => BinaryOp::Concat,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Keyword(Keyword::Instanceof) => BinaryOp::Instanceof,
        _ => return None,
    };
    Some(op)
}
