// effect.rs — Effect traces: statements as ordered read/write records.
//
// `stmts_effs` walks IR in program order and produces a nested trace of
// primitive effects. Control structure is preserved: conditionals become
// two guarded sub-traces, loops a loop-wrapped guarded sub-trace, calls
// splice in the callee's cached trace behind bindings of its formals.
// After each statement an environment-binding effect records that
// statement's contribution to the dataflow summary, so later effects in
// the trace are interpreted under updated config and window aliases.
//
// Loop traces are prefixed by the loop's own (fixed-point-collapsed)
// summary: only loop-invariant facts may be assumed inside the body.
//
// Preconditions: IR is well-typed.
// Postconditions: trace order equals program order.
// Failure modes: none beyond malformed-IR panics from lifting.
// Side effects: reads/populates the session's effect-trace cache.

use std::fmt;
use std::slice;

use crate::dataflow::{self, lift_term};
use crate::env::AEnv;
use crate::ir::{Expr, ExprKind, Stmt, StmtKind, WAccess};
use crate::pred::{self, Term};
use crate::session::Session;
use crate::sym::Sym;
use crate::window::Point;

#[derive(Debug, Clone, PartialEq)]
pub enum Eff {
    /// Effects that occur only when the condition may hold.
    Guard(Term, Vec<Eff>),
    /// Effects repeated for every value of the bound iterate.
    Loop { iter: Sym, body: Vec<Eff> },
    /// Dataflow bindings in scope for the rest of the trace.
    BindEnv(AEnv),
    GlobalRead(Sym),
    GlobalWrite(Sym),
    Read(Point),
    Write(Point),
    Reduce(Point),
    Alloc { name: Sym, ndim: usize },
}

// ── Extraction ──────────────────────────────────────────────────────────────

/// Effects of evaluating an expression. Control-value reads are not
/// effects; configuration reads and buffer-element reads are.
pub fn expr_effs(e: &Expr) -> Vec<Eff> {
    let mut out = Vec::new();
    expr_into(e, &mut out);
    out
}

fn expr_into(e: &Expr, out: &mut Vec<Eff>) {
    match &e.kind {
        ExprKind::Read { name, idx } => {
            for i in idx {
                expr_into(i, out);
            }
            if e.ty.is_numeric() {
                out.push(Eff::Read(Point {
                    buf: name.clone(),
                    coords: idx.iter().map(lift_term).collect(),
                }));
            }
        }
        ExprKind::Const(_) | ExprKind::StrideExpr { .. } => {}
        ExprKind::USub(arg) => expr_into(arg, out),
        ExprKind::BinOp { lhs, rhs, .. } => {
            expr_into(lhs, out);
            expr_into(rhs, out);
        }
        ExprKind::Window { idx, .. } => {
            for w in idx {
                match w {
                    WAccess::Point(p) => expr_into(p, out),
                    WAccess::Interval { lo, hi } => {
                        expr_into(lo, out);
                        expr_into(hi, out);
                    }
                }
            }
        }
        ExprKind::ReadConfig { field } => out.push(Eff::GlobalRead(field.clone())),
    }
}

/// Effects of a statement sequence, in program order.
pub fn stmts_effs(stmts: &[Stmt], sess: &Session) -> Vec<Eff> {
    let mut out = Vec::new();
    for s in stmts {
        stmt_into(s, sess, &mut out);
    }
    out
}

fn stmt_into(s: &Stmt, sess: &Session, out: &mut Vec<Eff>) {
    match &s.kind {
        StmtKind::Assign { name, idx, rhs } | StmtKind::Reduce { name, idx, rhs } => {
            for i in idx {
                expr_into(i, out);
            }
            expr_into(rhs, out);
            let pt = Point {
                buf: name.clone(),
                coords: idx.iter().map(lift_term).collect(),
            };
            out.push(match s.kind {
                StmtKind::Assign { .. } => Eff::Write(pt),
                _ => Eff::Reduce(pt),
            });
        }
        StmtKind::WriteConfig { field, rhs } => {
            expr_into(rhs, out);
            out.push(Eff::GlobalWrite(field.clone()));
            push_env(s, sess, out);
        }
        StmtKind::If { cond, body, orelse } => {
            expr_into(cond, out);
            let c = lift_term(cond);
            out.push(Eff::Guard(pred::maybe(c.clone()), stmts_effs(body, sess)));
            out.push(Eff::Guard(
                pred::maybe(pred::not(c)),
                stmts_effs(orelse, sess),
            ));
            push_env(s, sess, out);
        }
        StmtKind::For { iter, hi, body } => {
            expr_into(hi, out);
            // the loop's collapsed summary: only invariant facts reach
            // the body (and everything after the loop)
            push_env(s, sess, out);
            let bounds = pred::and(
                pred::le(pred::int(0), pred::ivar(iter.clone())),
                pred::lt(pred::ivar(iter.clone()), lift_term(hi)),
            );
            out.push(Eff::Loop {
                iter: iter.clone(),
                body: vec![Eff::Guard(pred::maybe(bounds), stmts_effs(body, sess))],
            });
        }
        StmtKind::Call { proc, args } => {
            for a in args {
                expr_into(a, out);
            }
            let simple = sess.simple_proc(proc);
            out.push(Eff::BindEnv(dataflow::call_bindings(args, &simple.args)));
            out.extend(sess.proc_effects(&simple).iter().cloned());
        }
        StmtKind::Alloc { name, ty } => {
            for d in ty.shape() {
                expr_into(d, out);
            }
            out.push(Eff::Alloc {
                name: name.clone(),
                ndim: ty.shape().len(),
            });
            push_env(s, sess, out);
        }
        StmtKind::WindowStmt { rhs, .. } => {
            expr_into(rhs, out);
            push_env(s, sess, out);
        }
        StmtKind::Free { .. } | StmtKind::Pass => {}
    }
}

fn push_env(s: &Stmt, sess: &Session, out: &mut Vec<Eff>) {
    let env = dataflow::summarize(slice::from_ref(s), sess);
    if !env.is_empty() {
        out.push(Eff::BindEnv(env));
    }
}

impl fmt::Display for Eff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(f: &mut fmt::Formatter<'_>, effs: &[Eff]) -> fmt::Result {
            write!(f, "{{ ")?;
            for (i, e) in effs.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                write!(f, "{e}")?;
            }
            write!(f, " }}")
        }
        fn pt(f: &mut fmt::Formatter<'_>, p: &Point) -> fmt::Result {
            write!(f, "{}[", p.buf)?;
            for (i, c) in p.coords.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, "]")
        }
        match self {
            Eff::Guard(c, body) => {
                write!(f, "guard ({c}) ")?;
                seq(f, body)
            }
            Eff::Loop { iter, body } => {
                write!(f, "loop {iter} ")?;
                seq(f, body)
            }
            Eff::BindEnv(env) => write!(f, "bind {env}"),
            Eff::GlobalRead(s) => write!(f, "rd @{s}"),
            Eff::GlobalWrite(s) => write!(f, "wr @{s}"),
            Eff::Read(p) => {
                write!(f, "rd ")?;
                pt(f, p)
            }
            Eff::Write(p) => {
                write!(f, "wr ")?;
                pt(f, p)
            }
            Eff::Reduce(p) => {
                write!(f, "red ")?;
                pt(f, p)
            }
            Eff::Alloc { name, ndim } => write!(f, "alloc {name}({ndim})"),
        }
    }
}
