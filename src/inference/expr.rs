// Per-entry classification of the values inside a returned array literal.

use crate::ast::{Expr, Name, NameKind};
use crate::inference::{Inferer, TypeDescriptor};
use crate::locate::find_return;
use crate::names::NameContext;

/// What one array-entry value contributes to the enclosing structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified<'e> {
    /// A single field for the entry's own key.
    Field { ty: TypeDescriptor, required: bool },
    /// Splice the fields of `nested` into the enclosing structure.
    /// `conditional` forces every spliced field optional.
    Expand { nested: &'e Expr, conditional: bool },
}

impl Classified<'_> {
    fn field(ty: TypeDescriptor, required: bool) -> Self {
        Classified::Field { ty, required }
    }
}

impl Inferer<'_> {
    /// Classify one value; `None` means the entry is not understood and is
    /// left out.
    pub fn classify<'e>(&mut self, expr: &'e Expr, names: &NameContext) -> Option<Classified<'e>> {
        match expr {
            Expr::String(_) => Some(Classified::field(TypeDescriptor::StringLiteral, true)),
            Expr::PropertyFetch { .. } if self.is_instance_property(expr) => {
                Some(Classified::field(TypeDescriptor::ScalarUnknown, true))
            }
            Expr::New { class, args } => {
                let required = !args.first().is_some_and(|arg| self.is_conditional_value(arg));
                let ty = self.classify_new(class, names);
                Some(Classified::field(ty, required))
            }
            Expr::Array(_) => {
                let nested = self.infer(expr, names)?;
                if nested.fields.iter().all(|f| f.key.is_none()) {
                    tracing::trace!("nested array without literal keys skipped");
                    return None;
                }
                Some(Classified::field(TypeDescriptor::InlineObject(nested.fields), true))
            }
            Expr::MethodCall { target, method, args, .. } if target.is_variable(&self.config.instance_var) => {
                self.classify_idiom(method, args, names)
            }
            _ => {
                tracing::trace!(?expr, "entry value not recognized");
                None
            }
        }
    }

    fn classify_idiom<'e>(&mut self, method: &str, args: &'e [Expr], names: &NameContext) -> Option<Classified<'e>> {
        if self.config.is_conditional_field(method) {
            let value = unwrap_callable(args.get(1)?)?;
            return match self.classify(value, names)? {
                Classified::Field { ty, .. } => Some(Classified::field(ty, false)),
                Classified::Expand { nested, .. } => Some(Classified::Expand { nested, conditional: true }),
            };
        }
        if self.config.is_merge(method) {
            let nested = unwrap_callable(args.first()?)?;
            return Some(Classified::Expand { nested, conditional: false });
        }
        if self.config.is_conditional_merge(method) {
            let nested = unwrap_callable(args.get(1)?)?;
            return Some(Classified::Expand { nested, conditional: true });
        }
        tracing::trace!(method, "instance call not recognized");
        None
    }

    /// `new T(...)`: a reference to T's schema when T is a known transformer
    /// whose method we can read, else an unknown scalar. `self` and `static`
    /// name the transformer whose array is being read.
    fn classify_new(&mut self, class: &Name, names: &NameContext) -> TypeDescriptor {
        let source = self.source;
        let fq = match self.enclosing_class(class) {
            Some(fq) => fq,
            None => names.resolve_name(class, source),
        };
        if !source.type_exists(&fq) {
            tracing::debug!(class = %class.text, resolved = %fq, "nested type not found");
            return TypeDescriptor::ScalarUnknown;
        }
        match self.infer_type(&fq) {
            Some(reference) => TypeDescriptor::SchemaReference(reference.name().to_string()),
            None => TypeDescriptor::ScalarUnknown,
        }
    }

    fn enclosing_class(&self, class: &Name) -> Option<String> {
        let is_self = class.kind == NameKind::Unqualified
            && (class.text.eq_ignore_ascii_case("self") || class.text.eq_ignore_ascii_case("static"));
        if !is_self {
            return None;
        }
        self.enclosing.last().cloned()
    }

    /// `$this->x` or `$this->x->y`.
    fn is_instance_property(&self, expr: &Expr) -> bool {
        let this = self.config.instance_var.as_str();
        match expr {
            Expr::PropertyFetch { target, .. } => match target.as_ref() {
                Expr::Variable(_) => target.is_variable(this),
                Expr::PropertyFetch { target, .. } => target.is_variable(this),
                _ => false,
            },
            _ => false,
        }
    }

    /// `$this->whenLoaded(...)` and friends.
    fn is_conditional_value(&self, expr: &Expr) -> bool {
        match expr {
            Expr::MethodCall { target, method, .. } => {
                target.is_variable(&self.config.instance_var) && self.config.is_conditional_value(method)
            }
            _ => false,
        }
    }
}

// `fn () => v` and `function () { return v; }` stand for `v`.
fn unwrap_callable(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::ArrowFn { body, .. } => Some(body),
        Expr::Closure { body, .. } => find_return(body),
        other => Some(other),
    }
}
