// dataflow.rs — Dataflow summaries: from statements to binding environments.
//
// `summarize` folds a statement sequence into an `AEnv` capturing what is
// known about control state after the sequence runs: configuration-field
// values, window aliases, and allocation views. Numeric buffer contents
// are never tracked; a numeric value lifts to the undefined term.
//
// Branch joins freshen each arm's environment (`bind_to_copies`) and
// rebind every touched name to a select over the lifted condition. Loops
// keep a name's value only when the body provably leaves it fixed for
// every in-bounds iterate; otherwise the name becomes undefined. Calls
// splice in the callee's cached summary behind bindings of its formals.
//
// Preconditions: IR is well-typed; call arity matches formal lists.
// Postconditions: the result's exported names are exactly the
//   configuration fields the sequence may write.
// Failure modes: contract-violation panics on malformed IR.
// Side effects: reads/populates the session's summary cache.

use crate::env::AEnv;
use crate::ir::{BinOp, Expr, ExprKind, FnArg, Lit, Stmt, StmtKind, Type, WAccess};
use crate::pred::{self, Term};
use crate::session::Session;
use crate::sym::Sym;
use crate::window::{Win, WinCoord};

// ── Lifting IR expressions into terms ───────────────────────────────────────

/// Lift a control-value expression into a symbolic term. Numeric data
/// (buffer reads, float constants, windows) lifts to the undefined value.
pub fn lift_term(e: &Expr) -> Term {
    match &e.kind {
        ExprKind::Read { name, idx }
            if e.ty.is_indexable() || e.ty.is_stridable() || e.ty == Type::Bool =>
        {
            assert!(idx.is_empty(), "indexed control read (malformed IR)");
            pred::var(name.clone(), e.ty.clone())
        }
        ExprKind::Const(Lit::Int(v)) => pred::int(*v),
        ExprKind::Const(Lit::Bool(b)) => pred::boolean(*b),
        ExprKind::USub(arg) if e.ty.is_indexable() => pred::usub(lift_term(arg)),
        ExprKind::BinOp { op, lhs, rhs } if e.ty.is_indexable() || e.ty == Type::Bool => {
            let l = lift_term(lhs);
            let r = lift_term(rhs);
            match op {
                BinOp::Add => pred::add(l, r),
                BinOp::Sub => pred::sub(l, r),
                BinOp::Mul => pred::mul(l, r),
                BinOp::Div => pred::div(l, r),
                BinOp::Mod => pred::modulo(l, r),
                BinOp::Lt => pred::lt(l, r),
                BinOp::Le => pred::le(l, r),
                BinOp::Gt => pred::lt(r, l),
                BinOp::Ge => pred::le(r, l),
                BinOp::Eq => pred::eq(l, r),
                BinOp::And => pred::and(l, r),
                BinOp::Or => pred::or(l, r),
            }
        }
        ExprKind::StrideExpr { name, dim } => pred::stride(name.clone(), *dim),
        ExprKind::ReadConfig { field } => pred::var(field.clone(), e.ty.clone()),
        _ => pred::unknown(e.ty.clone()),
    }
}

/// Lift a buffer-valued expression into a window over its base buffer.
pub fn lift_win(e: &Expr) -> Win {
    match &e.kind {
        ExprKind::Read { name, idx } => {
            assert!(
                idx.is_empty(),
                "windowed actual must be a bare buffer or window expression"
            );
            Win::passthrough(name)
        }
        ExprKind::Window { name, idx } => {
            let coords = idx
                .iter()
                .map(|w| match w {
                    WAccess::Point(p) => WinCoord::Pt(lift_term(p)),
                    WAccess::Interval { lo, .. } => WinCoord::Iv(lift_term(lo)),
                })
                .collect();
            let strides = (0..idx.len())
                .map(|i| pred::stride(name.clone(), i))
                .collect();
            Win {
                buf: name.clone(),
                coords,
                strides,
            }
        }
        other => panic!("cannot take a window of {other:?}"),
    }
}

// ── Call-site bindings ──────────────────────────────────────────────────────

/// Bind a callee's formals to the actuals at a call site: buffer formals
/// become window bindings, control formals become plain term bindings.
pub fn call_bindings(args: &[Expr], formals: &[FnArg]) -> AEnv {
    assert_eq!(args.len(), formals.len(), "call arity mismatch (malformed IR)");
    let mut env = AEnv::empty();
    for (a, f) in args.iter().zip(formals) {
        let bd = if f.ty.is_numeric() {
            AEnv::bind_window(f.name.clone(), lift_win(a))
        } else {
            AEnv::bind(f.name.clone(), lift_term(a))
        };
        env = env.compose(bd);
    }
    env
}

// ── Summaries ───────────────────────────────────────────────────────────────

/// The binding environment left behind by a statement sequence.
pub fn summarize(stmts: &[Stmt], sess: &Session) -> AEnv {
    let mut env = AEnv::empty();
    for s in stmts {
        env = env.compose(stmt_env(s, sess));
    }
    env
}

fn stmt_env(s: &Stmt, sess: &Session) -> AEnv {
    match &s.kind {
        StmtKind::Assign { .. }
        | StmtKind::Reduce { .. }
        | StmtKind::Free { .. }
        | StmtKind::Pass => AEnv::empty(),

        StmtKind::WriteConfig { field, rhs } => {
            AEnv::bind_exported(field.clone(), lift_term(rhs))
        }

        StmtKind::WindowStmt { lhs, rhs } => AEnv::bind_window(lhs.clone(), lift_win(rhs)),

        StmtKind::Alloc { name, ty } => {
            AEnv::bind_window(name.clone(), Win::alloc(name, ty.shape()))
        }

        StmtKind::If { cond, body, orelse } => {
            let benv = summarize(body, sess);
            let oenv = summarize(orelse, sess);
            let names = union_names(&benv, &oenv);
            if names.is_empty() {
                return AEnv::empty();
            }
            let (bmap, bcopies) = benv.bind_to_copies();
            let (omap, ocopies) = oenv.bind_to_copies();
            let c = Sym::fresh("if_cond");
            let pairs = names
                .into_iter()
                .map(|(n, ty)| {
                    let tb = copy_or_old(&bmap, &n, &ty);
                    let fb = copy_or_old(&omap, &n, &ty);
                    let sel = pred::select(pred::var(c.clone(), Type::Bool), tb, fb);
                    (n, sel)
                })
                .collect();
            AEnv::bind(c, lift_term(cond))
                .compose(bcopies)
                .compose(ocopies)
                .compose(AEnv::par_bind(pairs, true))
        }

        StmtKind::For { iter, hi, body } => {
            let benv = summarize(body, sess);
            let names = benv.names_types();
            if names.is_empty() {
                return AEnv::empty();
            }
            let (bmap, copies) = benv.bind_to_copies();
            let bounds = pred::and(
                pred::le(pred::int(0), pred::ivar(iter.clone())),
                pred::lt(pred::ivar(iter.clone()), lift_term(hi)),
            );
            let pairs = names
                .into_iter()
                .map(|(n, ty)| {
                    let body_val = copy_or_old(&bmap, &n, &ty);
                    let old = pred::var(n.clone(), ty.clone());
                    // keep the old value only when every in-bounds
                    // iteration provably leaves it unchanged
                    let fixed = pred::forall(
                        iter.clone(),
                        pred::implies(
                            pred::maybe(bounds.clone()),
                            pred::eq(body_val, old.clone()),
                        ),
                    );
                    let sel = pred::select(fixed, old, pred::unknown(ty));
                    (n, sel)
                })
                .collect();
            copies.compose(AEnv::par_bind(pairs, true))
        }

        StmtKind::Call { proc, args } => {
            let simple = sess.simple_proc(proc);
            let callenv = call_bindings(args, &simple.args);
            callenv.compose(sess.proc_summary(&simple))
        }
    }
}

/// Names touched by either branch, first-touch order, body arm first.
fn union_names(a: &AEnv, b: &AEnv) -> Vec<(Sym, Type)> {
    let mut names = a.names_types();
    for (n, ty) in b.names_types() {
        if !names.iter().any(|(m, _)| *m == n) {
            names.push((n, ty));
        }
    }
    names
}

/// The arm's freshened copy of `n`, or the incoming value when the arm
/// never touched it.
fn copy_or_old(map: &[(Sym, Term)], n: &Sym, ty: &Type) -> Term {
    map.iter()
        .find(|(m, _)| m == n)
        .map(|(_, t)| t.clone())
        .unwrap_or_else(|| pred::var(n.clone(), ty.clone()))
}
