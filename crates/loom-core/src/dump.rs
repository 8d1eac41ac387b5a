//! S-expression AST dumper, used by tests and by `loom-cli --dump-ast`.
//!
//! A bare grouping `(e)` is transparent here — it recurses straight into
//! `inner` with no wrapping node of its own, matching the worked example
//! `1 + 2 * (3 / 4)` dumping as `(+ 1 (* 2 (/ 3 4)))` with no trace of the
//! parentheses. `Call` does get its own wrapper, head `paren`, since a call is
//! itself a parenthesized construct (`fs[0]()` dumps as `(paren (bracket fs 0))`).

use crate::ast::{Ast, AssignOpKind, BinOpKind, ExpKind};
use crate::ids::ExpId;
use crate::lexer::Token;

fn bin_head(op: BinOpKind) -> &'static str {
    match op {
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Mul => "*",
        BinOpKind::Div => "/",
        BinOpKind::Mod => "%",
        BinOpKind::Eq => "==",
        BinOpKind::Ne => "!=",
        BinOpKind::Lt => "<",
        BinOpKind::Le => "<=",
        BinOpKind::Gt => ">",
        BinOpKind::Ge => ">=",
    }
}

fn assign_head(op: AssignOpKind) -> &'static str {
    match op {
        AssignOpKind::Set => "=",
        AssignOpKind::Add => "+=",
        AssignOpKind::Sub => "-=",
        AssignOpKind::Mul => "*=",
        AssignOpKind::Div => "/=",
        AssignOpKind::Mod => "%=",
    }
}

struct Dumper<'a> {
    ast: &'a Ast,
    toks: &'a [Token],
    src: &'a str,
}

impl<'a> Dumper<'a> {
    fn tok_text(&self, tok: crate::ids::TokId) -> &'a str {
        let r = self.toks[tok.index()].range;
        &self.src[r.l as usize..r.r as usize]
    }

    fn dump(&self, id: ExpId, out: &mut String) {
        let exp = self.ast.get(id);
        match &exp.kind {
            ExpKind::Err { .. } => out.push_str("(err)"),
            ExpKind::Int { value } => out.push_str(&value.to_string()),
            ExpKind::Str { .. } => out.push_str(self.tok_text(exp.tok)),
            ExpKind::Ident => out.push_str(self.tok_text(exp.tok)),
            ExpKind::Paren { inner } => self.dump(*inner, out),
            ExpKind::Bracket { callee, index } => {
                out.push_str("(bracket ");
                self.dump(*callee, out);
                out.push(' ');
                self.dump(*index, out);
                out.push(')');
            }
            ExpKind::Call { callee, args } => {
                out.push_str("(paren ");
                self.dump(*callee, out);
                for item in self.ast.subexp_range(*args) {
                    out.push(' ');
                    self.dump(item.exp, out);
                }
                out.push(')');
            }
            ExpKind::ArrayLit { elems } => {
                out.push_str("(array");
                for item in self.ast.subexp_range(*elems) {
                    out.push(' ');
                    self.dump(item.exp, out);
                }
                out.push(')');
            }
            ExpKind::Semi { first, second } => {
                out.push_str("(; ");
                self.dump(*first, out);
                out.push(' ');
                self.dump(*second, out);
                out.push(')');
            }
            ExpKind::Let { init } => {
                out.push_str("(let ");
                self.dump(*init, out);
                out.push(')');
            }
            ExpKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push_str("(if ");
                self.dump(*cond, out);
                out.push(' ');
                self.dump(*then_branch, out);
                out.push(' ');
                self.dump(*else_branch, out);
                out.push(')');
            }
            ExpKind::While { cond, body } => {
                out.push_str("(while ");
                self.dump(*cond, out);
                out.push(' ');
                self.dump(*body, out);
                out.push(')');
            }
            ExpKind::Break => out.push_str("break"),
            ExpKind::Return { value } => {
                out.push_str("(return ");
                self.dump(*value, out);
                out.push(')');
            }
            ExpKind::Fun { params, body } => {
                out.push_str("(fun (");
                for (i, item) in self.ast.subexp_range(*params).iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.dump(item.exp, out);
                }
                out.push_str(") ");
                self.dump(*body, out);
                out.push(')');
            }
            ExpKind::Assign { op, target, value } => {
                out.push('(');
                out.push_str(assign_head(*op));
                out.push(' ');
                self.dump(*target, out);
                out.push(' ');
                self.dump(*value, out);
                out.push(')');
            }
            ExpKind::BinOp { op, lhs, rhs } => {
                out.push('(');
                out.push_str(bin_head(*op));
                out.push(' ');
                self.dump(*lhs, out);
                out.push(' ');
                self.dump(*rhs, out);
                out.push(')');
            }
        }
    }
}

/// Dumps `root` as a parenthesized prefix s-expression.
#[must_use]
pub fn dump(ast: &Ast, root: ExpId, toks: &[Token], src: &str) -> String {
    let d = Dumper { ast, toks, src };
    let mut out = String::new();
    d.dump(root, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn parse_dump(src: &str) -> String {
        let toks = tokenize(src);
        let (ast, root, _diags) = parse(src, &toks);
        let ExpKind::Semi { first, .. } = ast.get(root).kind.clone() else {
            panic!("program root is always a Semi node");
        };
        dump(&ast, first, &toks, src)
    }

    #[test]
    fn precedence_example() {
        assert_eq!(parse_dump("1 + 2 * (3 / 4)"), "(+ 1 (* 2 (/ 3 4)))");
    }

    #[test]
    fn call_on_index_shares_paren_head() {
        assert_eq!(parse_dump("fs[0]()"), "(paren (bracket fs 0))");
    }

    #[test]
    fn let_with_call_and_negated_comparison() {
        assert_eq!(parse_dump("let x = fs[0]() < -1"), "(let (< (paren (bracket fs 0)) (- 0 1)))");
    }

    #[test]
    fn if_else_if_chain() {
        assert_eq!(
            parse_dump("if (p1) { q1 } else if (p2) { q2 } else { if (p3) {} }"),
            "(if p1 (; q1 0) (if p2 (; q2 0) (; (if p3 (; 0 0) 0) 0)))"
        );
    }

    #[test]
    fn string_literal_round_trips_quoted() {
        assert_eq!(parse_dump("\"hi\""), "\"hi\"");
    }
}
