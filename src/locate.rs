//! Finding the target method and its return expression.
use crate::ast::{ClassDecl, Expr, Method, Stmt};

/// First method named `name` (case-insensitive, like the source language).
pub fn find_method<'a>(class: &'a ClassDecl, name: &str) -> Option<&'a Method> {
    class.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Value of the first `return` reached in a pre-order, depth-first walk.
///
/// A bare `return;` is still the first return: the result is `None` and no
/// later return is considered.
pub fn find_return(body: &[Stmt]) -> Option<&Expr> {
    first_return(body)?.as_ref()
}

fn first_return(body: &[Stmt]) -> Option<&Option<Expr>> {
    body.iter().find_map(return_in)
}

fn return_in(stmt: &Stmt) -> Option<&Option<Expr>> {
    match stmt {
        Stmt::Return(value) => Some(value),
        Stmt::Expr(_) => None,
        Stmt::If { then, else_ifs, otherwise, .. } => first_return(then)
            .or_else(|| else_ifs.iter().find_map(|(_, body)| first_return(body)))
            .or_else(|| otherwise.as_deref().and_then(first_return)),
        Stmt::Foreach { body, .. } | Stmt::Block(body) => first_return(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn body_of(src: &str) -> Vec<Stmt> {
        let unit = parse(src).unwrap();
        let method = find_method(&unit.classes[0], "toArray").unwrap();
        method.body.clone().unwrap()
    }

    #[test]
    fn method_lookup_ignores_case() {
        let unit = parse("<?php class A { function other() {} function TOARRAY() {} }").unwrap();
        assert_eq!(find_method(&unit.classes[0], "toArray").unwrap().name, "TOARRAY");
        assert!(find_method(&unit.classes[0], "missing").is_none());
    }

    #[test]
    fn first_return_in_preorder_wins() {
        let body = body_of(
            "<?php class A { function toArray() { if ($x) { return 'early'; } return ['late' => 1]; } }",
        );
        assert_eq!(find_return(&body), Some(&Expr::String("early".into())));
    }

    #[test]
    fn else_branches_are_searched_in_order() {
        let body = body_of(
            "<?php class A { function toArray() { if ($a) { $x = 1; } elseif ($b) { return 'b'; } else { return 'c'; } } }",
        );
        assert_eq!(find_return(&body), Some(&Expr::String("b".into())));
    }

    #[test]
    fn no_return_and_bare_return() {
        assert!(find_return(&body_of("<?php class A { function toArray() { $x = 1; } }")).is_none());
        assert!(find_return(&body_of("<?php class A { function toArray() { return; return []; } }")).is_none());
    }
}
