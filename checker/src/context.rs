// context.rs — Context of a focused statement block inside a procedure.
//
// The legality checkers reason about a contiguous sub-sequence of
// statements (the focus) in place: what must hold for control to reach
// it, which dataflow facts are in scope before it, and what runs after
// it. `Context` locates the focus by statement identity and derives:
//
//   control_predicate — procedure preconditions conjoined with the
//     branch conditions and loop-bound facts along the path, each level
//     wrapped in the summary of its preceding siblings;
//   pre_env — the composed summaries of everything before the focus at
//     every nesting level on the path;
//   post_effects — the trace of everything after the focus, where each
//     enclosing loop contributes its remaining iterations as a shifted
//     companion loop (iterate substituted with `new + (old + 1)`).
//
// Preconditions: the focus ids name a contiguous run actually present in
//   the procedure (anywhere in its nesting); panics otherwise.
// Postconditions: the procedure is never mutated; shifted copies carry
//   fresh statement ids.
// Failure modes: contract-violation panic when the focus is absent.
// Side effects: fresh symbols for shifted iterates.

use std::collections::HashMap;
use std::slice;

use crate::dataflow::{self, lift_term};
use crate::effect::{self, Eff};
use crate::env::AEnv;
use crate::ir::{self, Expr, Proc, Stmt, StmtId, StmtKind, Type};
use crate::pred::{self, Term};
use crate::session::Session;
use crate::sym::Sym;

pub struct Context<'p> {
    proc: &'p Proc,
    ids: Vec<StmtId>,
}

fn loop_bounds(iter: &Sym, hi: &Expr) -> Term {
    pred::and(
        pred::le(pred::int(0), pred::ivar(iter.clone())),
        pred::lt(pred::ivar(iter.clone()), lift_term(hi)),
    )
}

impl<'p> Context<'p> {
    pub fn new(proc: &'p Proc, focus: &[StmtId]) -> Context<'p> {
        assert!(!focus.is_empty(), "empty focus");
        Context {
            proc,
            ids: focus.to_vec(),
        }
    }

    fn focus_at(&self, stmts: &[Stmt]) -> Option<usize> {
        if stmts.len() < self.ids.len() {
            return None;
        }
        stmts
            .windows(self.ids.len())
            .position(|w| w.iter().zip(&self.ids).all(|(s, id)| s.id == *id))
    }

    /// Preconditions of the procedure plus the path condition to the
    /// focus, with each level's predicate interpreted under the summary
    /// of the siblings preceding it.
    pub fn control_predicate(&self, sess: &Session) -> Term {
        let path = self
            .ctrl_stmts(&self.proc.body, sess)
            .unwrap_or_else(|| panic!("focused statements not found in {}", self.proc.name));
        let preds = pred::and_all(self.proc.preds.iter().map(lift_term));
        pred::and(preds, path)
    }

    fn ctrl_stmts(&self, stmts: &[Stmt], sess: &Session) -> Option<Term> {
        if self.focus_at(stmts).is_some() {
            return Some(pred::tt());
        }
        for (i, s) in stmts.iter().enumerate() {
            let inner = match &s.kind {
                StmtKind::If { cond, body, orelse } => {
                    let c = lift_term(cond);
                    self.ctrl_stmts(body, sess)
                        .map(|p| pred::and(pred::maybe(c.clone()), p))
                        .or_else(|| {
                            self.ctrl_stmts(orelse, sess)
                                .map(|p| pred::and(pred::maybe(pred::not(c.clone())), p))
                        })
                }
                StmtKind::For { iter, hi, body } => {
                    self.ctrl_stmts(body, sess).map(|p| {
                        // the inner predicate holds under what earlier
                        // iterations may have left behind
                        let g = self.loop_pre_env(iter, body, sess);
                        pred::and(pred::maybe(loop_bounds(iter, hi)), g.apply(p))
                    })
                }
                _ => None,
            };
            if let Some(p) = inner {
                let env = dataflow::summarize(&stmts[..i], sess);
                return Some(env.apply(p));
            }
        }
        None
    }

    /// Summaries of everything before the focus, composed across every
    /// nesting level on the path to it.
    pub fn pre_env(&self, sess: &Session) -> AEnv {
        self.pre_stmts(&self.proc.body, sess)
            .unwrap_or_else(|| panic!("focused statements not found in {}", self.proc.name))
    }

    fn pre_stmts(&self, stmts: &[Stmt], sess: &Session) -> Option<AEnv> {
        if let Some(i) = self.focus_at(stmts) {
            return Some(dataflow::summarize(&stmts[..i], sess));
        }
        for (i, s) in stmts.iter().enumerate() {
            let inner = match &s.kind {
                StmtKind::If { body, orelse, .. } => self
                    .pre_stmts(body, sess)
                    .or_else(|| self.pre_stmts(orelse, sess)),
                StmtKind::For { iter, body, .. } => self
                    .pre_stmts(body, sess)
                    .map(|e| self.loop_pre_env(iter, body, sess).compose(e)),
                _ => None,
            };
            if let Some(e) = inner {
                return Some(dataflow::summarize(&stmts[..i], sess).compose(e));
            }
        }
        None
    }

    /// What the iterations before the current one may have left behind:
    /// each name the body touches keeps its incoming value only when
    /// every earlier iteration provably leaves it fixed.
    fn loop_pre_env(&self, iter: &Sym, body: &[Stmt], sess: &Session) -> AEnv {
        let prev = iter.copy();
        let mut map = HashMap::new();
        map.insert(
            iter.clone(),
            Expr::read(prev.clone(), Type::Index, ir::synth_span()),
        );
        let benv = dataflow::summarize(&ir::subst_stmts(body, &map), sess);
        let names = benv.names_types();
        if names.is_empty() {
            return AEnv::empty();
        }
        let (bmap, copies) = benv.bind_to_copies();
        let bounds = pred::and(
            pred::le(pred::int(0), pred::ivar(prev.clone())),
            pred::lt(pred::ivar(prev.clone()), pred::ivar(iter.clone())),
        );
        let pairs = names
            .into_iter()
            .map(|(n, ty)| {
                let body_val = bmap
                    .iter()
                    .find(|(m, _)| *m == n)
                    .map(|(_, t)| t.clone())
                    .unwrap_or_else(|| pred::var(n.clone(), ty.clone()));
                let old = pred::var(n.clone(), ty.clone());
                let fixed = pred::forall(
                    prev.clone(),
                    pred::implies(
                        pred::maybe(bounds.clone()),
                        pred::eq(body_val, old.clone()),
                    ),
                );
                (n, pred::select(fixed, old, pred::unknown(ty)))
            })
            .collect();
        copies.compose(AEnv::par_bind(pairs, true))
    }

    /// Effect trace of everything after the focus. Each enclosing loop
    /// contributes its remaining iterations as a shifted companion loop.
    pub fn post_effects(&self, sess: &Session) -> Vec<Eff> {
        self.post_stmts(&self.proc.body, sess)
            .unwrap_or_else(|| panic!("focused statements not found in {}", self.proc.name))
    }

    fn post_stmts(&self, stmts: &[Stmt], sess: &Session) -> Option<Vec<Eff>> {
        if let Some(i) = self.focus_at(stmts) {
            return Some(effect::stmts_effs(&stmts[i + self.ids.len()..], sess));
        }
        for (i, s) in stmts.iter().enumerate() {
            let inner = match &s.kind {
                StmtKind::If { cond, body, orelse } => {
                    let c = lift_term(cond);
                    self.post_stmts(body, sess)
                        .map(|effs| vec![Eff::Guard(pred::maybe(c.clone()), effs)])
                        .or_else(|| {
                            self.post_stmts(orelse, sess).map(|effs| {
                                vec![Eff::Guard(pred::maybe(pred::not(c.clone())), effs)]
                            })
                        })
                }
                StmtKind::For { iter, hi, body } => {
                    self.post_stmts(body, sess).map(|mut effs| {
                        effs.extend(self.shifted_remainder(iter, hi, body, sess));
                        effs
                    })
                }
                _ => None,
            };
            if let Some(mut effs) = inner {
                let env = dataflow::summarize(slice::from_ref(s), sess);
                if !env.is_empty() {
                    effs.push(Eff::BindEnv(env));
                }
                effs.extend(effect::stmts_effs(&stmts[i + 1..], sess));
                return Some(effs);
            }
        }
        None
    }

    /// The iterations of a loop that still run after the current one:
    /// the body with `iter` replaced by `shift + (iter + 1)`, looped over
    /// the fresh shift iterate while it stays within the original bound.
    fn shifted_remainder(
        &self,
        iter: &Sym,
        hi: &Expr,
        body: &[Stmt],
        sess: &Session,
    ) -> Vec<Eff> {
        let shift = iter.copy();
        let s = ir::synth_span();
        let shifted_iter = Expr::bin(
            ir::BinOp::Add,
            Expr::read(shift.clone(), Type::Index, s),
            Expr::bin(
                ir::BinOp::Add,
                Expr::read(iter.clone(), Type::Index, s),
                Expr::int(1, Type::Index, s),
                Type::Index,
                s,
            ),
            Type::Index,
            s,
        );
        let mut map = HashMap::new();
        map.insert(iter.clone(), shifted_iter);
        let shifted_body = ir::subst_stmts(body, &map);

        let pos = pred::add(
            pred::ivar(shift.clone()),
            pred::add(pred::ivar(iter.clone()), pred::int(1)),
        );
        let bounds = pred::and(
            pred::le(pred::int(0), pred::ivar(shift.clone())),
            pred::lt(pos, lift_term(hi)),
        );
        vec![Eff::Loop {
            iter: shift,
            body: vec![Eff::Guard(
                pred::maybe(bounds),
                effect::stmts_effs(&shifted_body, sess),
            )],
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{basic_locsets, SetCode};
    use crate::ir::{synth_span, ExprKind, Lit};
    use crate::solve::{FiniteModelSolver, Solver, Verdict};
    use crate::window::Point;

    fn assign_at(buf: &Sym, idx: Expr) -> Stmt {
        Stmt::new(
            StmtKind::Assign {
                name: buf.clone(),
                idx: vec![idx],
                rhs: Expr::float(0.0, synth_span()),
            },
            synth_span(),
        )
    }

    #[test]
    fn control_predicate_carries_loop_bounds() {
        let x = Sym::fresh("x");
        let i = Sym::fresh("i");
        let n = Sym::fresh("n");
        let s = synth_span();
        let target = assign_at(&x, Expr::read(i.clone(), Type::Index, s));
        let target_id = target.id;
        let proc = Proc {
            name: "k".to_string(),
            args: vec![],
            preds: vec![],
            body: vec![Stmt::new(
                StmtKind::For {
                    iter: i.clone(),
                    hi: Expr::read(n.clone(), Type::Size, s),
                    body: vec![target],
                },
                s,
            )],
        };
        let sess = Session::new();
        let ctrl = Context::new(&proc, &[target_id]).control_predicate(&sess);

        let mut slv = FiniteModelSolver::new();
        slv.push();
        slv.assume(ctrl);
        // inside the loop the iterate is strictly below the bound
        let goal = pred::lt(pred::ivar(i), pred::var(n, Type::Size));
        assert_eq!(slv.verify(&goal), Verdict::Proved);
    }

    #[test]
    fn pre_env_sees_earlier_config_writes() {
        let field = Sym::fresh("ctx_flag");
        let s = synth_span();
        let x = Sym::fresh("x");
        let target = assign_at(&x, Expr::int(0, Type::Index, s));
        let target_id = target.id;
        let proc = Proc {
            name: "k".to_string(),
            args: vec![],
            preds: vec![],
            body: vec![
                Stmt::new(
                    StmtKind::WriteConfig {
                        field: field.clone(),
                        rhs: Expr::new(ExprKind::Const(Lit::Bool(true)), Type::Bool, s),
                    },
                    s,
                ),
                target,
            ],
        };
        let sess = Session::new();
        let env = Context::new(&proc, &[target_id]).pre_env(&sess);
        let goal = pred::definitely(env.apply(pred::var(field, Type::Bool)));
        assert_eq!(FiniteModelSolver::new().verify(&goal), Verdict::Proved);
    }

    #[test]
    fn pre_env_accounts_for_earlier_iterations() {
        // flag := true; for i in 0..n { x[0] = 0  <- focus; flag := false }
        // inside the loop the flag is no longer provably true: an earlier
        // iteration may have cleared it
        let field = Sym::fresh("ctx_flag");
        let x = Sym::fresh("x");
        let i = Sym::fresh("i");
        let n = Sym::fresh("n");
        let s = synth_span();
        let set_true = Stmt::new(
            StmtKind::WriteConfig {
                field: field.clone(),
                rhs: Expr::new(ExprKind::Const(Lit::Bool(true)), Type::Bool, s),
            },
            s,
        );
        let clear = Stmt::new(
            StmtKind::WriteConfig {
                field: field.clone(),
                rhs: Expr::new(ExprKind::Const(Lit::Bool(false)), Type::Bool, s),
            },
            s,
        );
        let target = assign_at(&x, Expr::int(0, Type::Index, s));
        let target_id = target.id;
        let proc = Proc {
            name: "k".to_string(),
            args: vec![],
            preds: vec![],
            body: vec![
                set_true,
                Stmt::new(
                    StmtKind::For {
                        iter: i,
                        hi: Expr::read(n, Type::Size, s),
                        body: vec![target, clear],
                    },
                    s,
                ),
            ],
        };
        let sess = Session::new();
        let env = Context::new(&proc, &[target_id]).pre_env(&sess);
        let goal = pred::definitely(env.apply(pred::var(field, Type::Bool)));
        assert_eq!(FiniteModelSolver::new().verify(&goal), Verdict::Disproved);
    }

    #[test]
    fn control_predicate_accounts_for_earlier_iterations() {
        // flag := false; for i in 0..n { if flag { x[0] = 0  <- focus };
        // flag := true } — iterations past the first can reach the focus
        // even though the flag starts out false
        let field = Sym::fresh("ctx_flag");
        let x = Sym::fresh("x");
        let i = Sym::fresh("i");
        let n = Sym::fresh("n");
        let s = synth_span();
        let write_flag = |v: bool| {
            Stmt::new(
                StmtKind::WriteConfig {
                    field: field.clone(),
                    rhs: Expr::new(ExprKind::Const(Lit::Bool(v)), Type::Bool, s),
                },
                s,
            )
        };
        let target = assign_at(&x, Expr::int(0, Type::Index, s));
        let target_id = target.id;
        let guarded = Stmt::new(
            StmtKind::If {
                cond: Expr::new(
                    ExprKind::ReadConfig {
                        field: field.clone(),
                    },
                    Type::Bool,
                    s,
                ),
                body: vec![target],
                orelse: vec![],
            },
            s,
        );
        let proc = Proc {
            name: "k".to_string(),
            args: vec![],
            preds: vec![],
            body: vec![
                write_flag(false),
                Stmt::new(
                    StmtKind::For {
                        iter: i,
                        hi: Expr::read(n, Type::Size, s),
                        body: vec![guarded, write_flag(true)],
                    },
                    s,
                ),
            ],
        };
        let sess = Session::new();
        let ctrl = Context::new(&proc, &[target_id]).control_predicate(&sess);

        // models reaching the focus exist, so an absurd goal is refutable;
        // a stale pre-loop flag value would make the focus look dead and
        // certify vacuously
        let mut slv = FiniteModelSolver::new();
        slv.push();
        slv.assume(pred::maybe(ctrl));
        assert_eq!(slv.verify(&pred::ff()), Verdict::Disproved);
    }

    #[test]
    fn post_effects_cover_remaining_iterations() {
        // for i in 0..n { x[i] = 0 } focused on the assignment: the
        // remaining iterations write x[shift + i + 1]
        let x = Sym::fresh("x");
        let i = Sym::fresh("i");
        let n = Sym::fresh("n");
        let s = synth_span();
        let target = assign_at(&x, Expr::read(i.clone(), Type::Index, s));
        let target_id = target.id;
        let proc = Proc {
            name: "k".to_string(),
            args: vec![],
            preds: vec![],
            body: vec![Stmt::new(
                StmtKind::For {
                    iter: i.clone(),
                    hi: Expr::read(n.clone(), Type::Size, s),
                    body: vec![target],
                },
                s,
            )],
        };
        let sess = Session::new();
        let effs = Context::new(&proc, &[target_id]).post_effects(&sess);
        let writes = basic_locsets(&effs).set(SetCode::Writes);

        // with i = 0 and n = 2 the remainder writes exactly x[1]
        let mut slv = FiniteModelSolver::new();
        slv.push();
        slv.assume(pred::eq(pred::ivar(i.clone()), pred::int(0)));
        slv.assume(pred::eq(pred::var(n, Type::Size), pred::int(2)));
        let hit = writes.is_elem(&Point {
            buf: x.clone(),
            coords: vec![pred::int(1)],
        });
        assert_eq!(slv.verify(&pred::definitely(hit)), Verdict::Proved);
        let miss = writes.is_elem(&Point {
            buf: x,
            coords: vec![pred::int(0)],
        });
        assert_eq!(slv.verify(&pred::definitely(miss)), Verdict::Disproved);
    }
}
