//! Syntax tree for the PHP subset that transformer classes are written in.
//!
//! Only what the parser needs to hand the inference engine: namespace,
//! imports, classes, method bodies and the expression forms that show up in
//! `toArray` implementations. Everything here is immutable once parsed.

use ordered_float::OrderedFloat;

// ————————————————————————————————————————————————————————————————————————————
// NAMES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// `User`
    Unqualified,
    /// `Models\User`
    Qualified,
    /// `\App\Models\User`
    FullyQualified,
}

/// A (possibly namespaced) type or function name as written in source.
///
/// `text` never carries the leading `\`; that is recorded in `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub text: String,
    pub kind: NameKind,
}

impl Name {
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        if text.starts_with('\\') {
            return Self { text: text[1..].to_string(), kind: NameKind::FullyQualified };
        }
        let kind = if text.contains('\\') { NameKind::Qualified } else { NameKind::Unqualified };
        Self { text, kind }
    }

    /// Last namespace segment (`App\Models\User` → `User`).
    pub fn last_segment(&self) -> &str {
        base_name(&self.text)
    }

    /// First namespace segment (`Models\User` → `Models`).
    pub fn first_segment(&self) -> &str {
        self.text.split('\\').next().unwrap_or(&self.text)
    }
}

/// Short name of a fully-qualified type name.
pub fn base_name(fq_name: &str) -> &str {
    fq_name.rsplit('\\').next().unwrap_or(fq_name)
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct SourceUnit {
    pub namespace: Option<Name>,
    pub uses: Vec<UseDecl>,
    pub classes: Vec<ClassDecl>,
}

/// `use App\Models\User as Account;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseDecl {
    pub name: Name,
    pub alias: Option<String>,
}

impl UseDecl {
    /// The short name this import binds in the unit.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.name.last_segment())
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub doc_comment: Option<String>,
    pub extends: Option<Name>,
    pub implements: Vec<Name>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub params: Vec<String>,
    /// `None` for abstract and interface methods.
    pub body: Option<Vec<Stmt>>,
}

// ————————————————————————————————————————————————————————————————————————————
// STATEMENTS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return(Option<Expr>),
    Expr(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        else_ifs: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    Foreach {
        subject: Expr,
        key: Option<Expr>,
        value: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
}

// ————————————————————————————————————————————————————————————————————————————
// EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    String(String),
    /// `"x_$id"`: raw text, never a literal key or value.
    Interpolated(String),
    Number(OrderedFloat<f64>),
    Bool(bool),
    Null,
    /// `$name`, stored without the sigil.
    Variable(String),
    Array(Vec<ArrayItem>),
    PropertyFetch {
        target: Box<Expr>,
        property: String,
        nullsafe: bool,
    },
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        nullsafe: bool,
    },
    StaticCall {
        class: Name,
        method: String,
        args: Vec<Expr>,
    },
    ClassConst {
        class: Name,
        constant: String,
    },
    /// Function call or invocation of a callable expression.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Bare name in expression position (`PHP_EOL`, `null`-like constants).
    ConstFetch(Name),
    New {
        class: Name,
        args: Vec<Expr>,
    },
    /// `fn ($x) => expr`
    ArrowFn {
        params: Vec<String>,
        body: Box<Expr>,
    },
    /// `function ($x) use ($y) { ... }`
    Closure {
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    Index {
        target: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `cond ? then : otherwise`; `then` is absent for the short `?:` form.
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    /// `...$rest`
    pub unpack: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Coalesce,
    Or,
    And,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl Expr {
    /// The literal text of a string-literal expression.
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_variable(&self, name: &str) -> bool {
        matches!(self, Expr::Variable(v) if v == name)
    }
}
