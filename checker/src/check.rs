// check.rs — Commutativity predicates and the legality checkers.
//
// `commutes` states, over the derived location sets of two effect traces,
// that their relative execution order cannot change observable results:
// neither trace writes anything the other touches, and neither reduces
// into anything the other reads. `alloc_commutes` adds that neither trace
// allocates a buffer the other touches. Every emptiness query is wrapped
// in a definedness check, so an undefined sub-term fails the predicate
// rather than passing it.
//
// The two checkers share one shape: locate the focus, push a solver
// scope, assume the control predicate may hold, derive per-trace effects,
// verify the commutativity condition under the pre-focus environment,
// pop. Anything but a proof is a legality failure; unknown and disproved
// are treated identically (fail closed), and a failure is never retried.
//
// Preconditions: the focused statements belong to the procedure;
//   `check_reorder_loops` requires a perfectly nested loop pair.
// Postconditions: the solver scope is balanced on every path.
// Failure modes: `LegalityError` on unproved legality; contract-violation
//   panic on malformed requests.
// Side effects: solver scope push/pop; session caches.

use std::collections::HashMap;
use std::slice;

use crate::context::Context;
use crate::dataflow::lift_term;
use crate::derive::{basic_locsets, SetCode};
use crate::diag::LegalityError;
use crate::effect::{self, Eff};
use crate::ir::{self, Expr, Proc, Stmt, StmtKind, Type};
use crate::locset;
use crate::pred::{self, Term};
use crate::session::Session;
use crate::solve::{Solver, Verdict};
use crate::sym::Sym;

/// The effects of `a` and `b` may be executed in either order.
pub fn commutes(a: &[Eff], b: &[Eff]) -> Term {
    let sa = basic_locsets(a);
    let sb = basic_locsets(b);
    pred::and_all([
        disjoint(sa.set(SetCode::Writes), sb.set(SetCode::All)),
        disjoint(sb.set(SetCode::Writes), sa.set(SetCode::All)),
        disjoint(sa.set(SetCode::Reduce), sb.set(SetCode::Reads)),
        disjoint(sb.set(SetCode::Reduce), sa.set(SetCode::Reads)),
    ])
}

/// Neither trace allocates a buffer the other touches.
pub fn alloc_commutes(a: &[Eff], b: &[Eff]) -> Term {
    let sa = basic_locsets(a);
    let sb = basic_locsets(b);
    pred::and(
        disjoint(sa.set(SetCode::Alloc), sb.set(SetCode::All)),
        disjoint(sb.set(SetCode::Alloc), sa.set(SetCode::All)),
    )
}

fn disjoint(a: locset::LocSet, b: locset::LocSet) -> Term {
    pred::definitely(locset::isct(a, b).is_empty())
}

/// Certify that two adjacent statements can swap places.
pub fn check_reorder_stmts(
    sess: &Session,
    slv: &mut dyn Solver,
    directive: &str,
    proc: &Proc,
    s1: &Stmt,
    s2: &Stmt,
) -> Result<(), LegalityError> {
    let ctx = Context::new(proc, &[s1.id, s2.id]);
    let ctrl = ctx.control_predicate(sess);
    let env = ctx.pre_env(sess);
    let e1 = effect::stmts_effs(slice::from_ref(s1), sess);
    let e2 = effect::stmts_effs(slice::from_ref(s2), sess);
    let cond = pred::and(commutes(&e1, &e2), alloc_commutes(&e1, &e2));

    slv.push();
    // reachability is existence-qualified: an unreachable focus must not
    // spuriously certify, and an unknown reachability must not block
    slv.assume(pred::maybe(ctrl));
    let verdict = slv.verify(&env.apply(cond.clone()));
    slv.pop();

    match verdict {
        Verdict::Proved => Ok(()),
        _ => Err(LegalityError::new(
            directive,
            "cannot reorder the two statements: their effects may not commute",
        )
        .with_span("first statement", s1.span)
        .with_span("second statement", s2.span)
        .with_detail("unproved condition", cond)),
    }
}

/// Certify that a perfectly nested loop pair can be interchanged.
pub fn check_reorder_loops(
    sess: &Session,
    slv: &mut dyn Solver,
    directive: &str,
    proc: &Proc,
    outer: &Stmt,
) -> Result<(), LegalityError> {
    let StmtKind::For {
        iter: x,
        hi: hi_x,
        body: outer_body,
    } = &outer.kind
    else {
        panic!("loop interchange requires a for loop");
    };
    let [inner] = outer_body.as_slice() else {
        panic!("loop interchange requires a perfectly nested loop pair");
    };
    let StmtKind::For {
        iter: y,
        hi: hi_y,
        body: inner_body,
    } = &inner.kind
    else {
        panic!("loop interchange requires a perfectly nested loop pair");
    };

    let ctx = Context::new(proc, &[outer.id]);
    let ctrl = ctx.control_predicate(sess);
    let env = ctx.pre_env(sess);

    let n = lift_term(hi_x);
    let m = lift_term(hi_y);
    let e_body = effect::stmts_effs(inner_body, sess);
    // after interchange each bound is evaluated under the other loop's
    // iterate, so the reads of both bounds must commute with the body
    let mut e_bounds = effect::expr_effs(hi_x);
    e_bounds.extend(effect::expr_effs(hi_y));

    // a primed copy of the body standing for a second iteration pair
    let x2 = x.copy();
    let y2 = y.copy();
    let mut map = HashMap::new();
    map.insert(
        x.clone(),
        Expr::read(x2.clone(), Type::Index, ir::synth_span()),
    );
    map.insert(
        y.clone(),
        Expr::read(y2.clone(), Type::Index, ir::synth_span()),
    );
    let primed = ir::subst_stmts(inner_body, &map);
    let e_primed = effect::stmts_effs(&primed, sess);

    let in_bds = |v: &Sym, hi: &Term| {
        pred::and(
            pred::le(pred::int(0), pred::ivar(v.clone())),
            pred::lt(pred::ivar(v.clone()), hi.clone()),
        )
    };
    let bounds_ok = pred::and(in_bds(x, &n), in_bds(y, &m));

    let cond_bounds = pred::forall_all(
        [x.clone(), y.clone()],
        pred::implies(
            pred::maybe(bounds_ok.clone()),
            pred::and(
                commutes(&e_bounds, &e_body),
                alloc_commutes(&e_bounds, &e_body),
            ),
        ),
    );
    // iteration pairs swapped by the interchange: the primed pair runs
    // earlier in the new order (x < x2, y2 < y)
    let pair_bds = pred::and_all([
        bounds_ok,
        in_bds(&x2, &n),
        in_bds(&y2, &m),
        pred::lt(pred::ivar(x.clone()), pred::ivar(x2.clone())),
        pred::lt(pred::ivar(y2.clone()), pred::ivar(y.clone())),
    ]);
    let cond_pairs = pred::forall_all(
        [x.clone(), y.clone(), x2, y2],
        pred::implies(
            pred::maybe(pair_bds),
            pred::and(
                commutes(&e_body, &e_primed),
                alloc_commutes(&e_body, &e_primed),
            ),
        ),
    );
    let cond = pred::and(cond_bounds, cond_pairs);

    slv.push();
    slv.assume(pred::maybe(ctrl));
    let verdict = slv.verify(&env.apply(cond.clone()));
    slv.pop();

    match verdict {
        Verdict::Proved => Ok(()),
        _ => Err(LegalityError::new(
            directive,
            "cannot interchange the loop pair: iterations may conflict",
        )
        .with_span("outer loop", outer.span)
        .with_span("inner loop", inner.span)
        .with_detail("unproved condition", cond)),
    }
}
