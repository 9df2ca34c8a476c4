// env.rs — Analysis environments: deferred symbolic let-bindings.
//
// An `AEnv` is an ordered list of bindings capturing dataflow facts
// (configuration values, window aliases) valid at a program point. It is a
// function from terms to terms: applying it wraps the argument in the
// corresponding nested let / let-tuple / let-stride bindings, innermost
// binding last in definition order so earlier definitions remain visible
// to later ones. Environments compose left-to-right; composition merges
// adjacent plain-binding runs for compactness, which must not change the
// meaning of `apply`.
//
// Preconditions: tuple bindings pair a name list with a tuple-typed term
//   of matching arity.
// Postconditions: `apply` never captures caller variables (freshening via
//   `bind_to_copies` is the caller's tool for scope joins).
// Failure modes: arity-mismatch panics on malformed tuple bindings.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ir::Type;
use crate::pred::{self, Term};
use crate::sym::Sym;
use crate::window::Win;

/// Window-alias map: bound alias name → view of the underlying buffer.
pub type WinMap = HashMap<Sym, Win>;

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Parallel list of name ↦ term bindings (scoped sequentially).
    List { names: Vec<Sym>, rhs: Vec<Term> },
    /// Destructuring of a tuple-typed term.
    Tuple { names: Vec<Sym>, rhs: Term },
    /// A window alias.
    Win { name: Sym, rhs: Win },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AEnv {
    bindings: Vec<Binding>,
    /// Names reported by `names_types` (the "touched" set used in joins).
    exported: HashSet<Sym>,
}

impl AEnv {
    pub fn empty() -> AEnv {
        AEnv::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// A single name ↦ term binding.
    pub fn bind(name: Sym, rhs: Term) -> AEnv {
        AEnv {
            bindings: vec![Binding::List {
                names: vec![name],
                rhs: vec![rhs],
            }],
            exported: HashSet::new(),
        }
    }

    /// Like `bind`, but the name is reported by `names_types`.
    pub fn bind_exported(name: Sym, rhs: Term) -> AEnv {
        let mut env = AEnv::bind(name.clone(), rhs);
        env.exported.insert(name);
        env
    }

    pub fn bind_window(name: Sym, rhs: Win) -> AEnv {
        AEnv {
            bindings: vec![Binding::Win { name, rhs }],
            exported: HashSet::new(),
        }
    }

    /// Tuple-destructuring binding of `names` against a tuple-typed term.
    pub fn bind_tuple(names: Vec<Sym>, rhs: Term, exported: bool) -> AEnv {
        match &rhs.ty {
            Type::Tuple(tys) => assert_eq!(
                names.len(),
                tys.len(),
                "tuple binding arity mismatch"
            ),
            other => panic!("tuple binding against non-tuple type {other:?}"),
        }
        let exported_set = if exported {
            names.iter().cloned().collect()
        } else {
            HashSet::new()
        };
        AEnv {
            bindings: vec![Binding::Tuple { names, rhs }],
            exported: exported_set,
        }
    }

    /// Parallel binding of independent name ↦ term pairs through a tuple.
    pub fn par_bind(pairs: Vec<(Sym, Term)>, exported: bool) -> AEnv {
        if pairs.is_empty() {
            return AEnv::empty();
        }
        let (names, rhs): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        AEnv::bind_tuple(names, pred::tuple(rhs), exported)
    }

    /// Left-to-right composition. Adjacent plain-binding runs merge.
    pub fn compose(mut self, mut other: AEnv) -> AEnv {
        self.exported.extend(other.exported.drain());
        let mergeable = matches!(
            (self.bindings.last(), other.bindings.first()),
            (Some(Binding::List { .. }), Some(Binding::List { .. }))
        );
        if mergeable {
            let Binding::List { names: rn, rhs: rr } = other.bindings.remove(0) else {
                unreachable!("checked above")
            };
            let Some(Binding::List { names, rhs }) = self.bindings.last_mut() else {
                unreachable!("checked above")
            };
            names.extend(rn);
            rhs.extend(rr);
        }
        self.bindings.extend(other.bindings);
        self
    }

    pub fn join(envs: impl IntoIterator<Item = AEnv>) -> AEnv {
        envs.into_iter().fold(AEnv::empty(), AEnv::compose)
    }

    /// Wrap a term in this environment's bindings, folding from the last
    /// binding to the first so the earliest definition is outermost.
    pub fn apply(&self, term: Term) -> Term {
        self.bindings.iter().rev().fold(term, |res, bd| match bd {
            Binding::List { names, rhs } => {
                pred::let_bind(names.clone(), rhs.clone(), res)
            }
            Binding::Tuple { names, rhs } => {
                pred::let_tuple(names.clone(), rhs.clone(), res)
            }
            Binding::Win { name, rhs } => {
                pred::let_stride(name.clone(), rhs.strides.clone(), res)
            }
        })
    }

    /// Push the environment's window bindings through an existing alias
    /// map, composing with any pre-existing view of the aliased buffer.
    pub fn translate_windows(&self, win_map: &WinMap) -> WinMap {
        let mut out = win_map.clone();
        for bd in &self.bindings {
            if let Binding::Win { name, rhs } = bd {
                let win = match out.get(&rhs.buf) {
                    Some(pre) => pre.compose(rhs),
                    None => rhs.clone(),
                };
                out.insert(name.clone(), win);
            }
        }
        out
    }

    /// Declared name → type pairs for exported plain/tuple bindings, in
    /// definition order. Window bindings contribute no named values.
    pub fn names_types(&self) -> Vec<(Sym, Type)> {
        let mut out: Vec<(Sym, Type)> = Vec::new();
        let mut upsert = |n: &Sym, ty: Type| {
            if let Some(slot) = out.iter_mut().find(|(m, _)| m == n) {
                slot.1 = ty;
            } else {
                out.push((n.clone(), ty));
            }
        };
        for bd in &self.bindings {
            match bd {
                Binding::List { names, rhs } => {
                    for (n, r) in names.iter().zip(rhs) {
                        if self.exported.contains(n) {
                            upsert(n, r.ty.clone());
                        }
                    }
                }
                Binding::Tuple { names, rhs } => {
                    let Type::Tuple(tys) = &rhs.ty else {
                        unreachable!("checked at construction")
                    };
                    for (n, ty) in names.iter().zip(tys) {
                        if self.exported.contains(n) {
                            upsert(n, ty.clone());
                        }
                    }
                }
                Binding::Win { .. } => {}
            }
        }
        out
    }

    /// Close over this environment for a scope join: returns (a) a map
    /// from each exported name to a fresh copy variable and (b) a new
    /// environment binding those copies to the names' values under this
    /// environment. Window bindings are dropped — the copies pack up a
    /// scoping level.
    pub fn bind_to_copies(&self) -> (Vec<(Sym, Term)>, AEnv) {
        let nmtyps = self.names_types();
        let orig_vars: Vec<Term> = nmtyps
            .iter()
            .map(|(n, ty)| pred::var(n.clone(), ty.clone()))
            .collect();
        let copies: Vec<Sym> = nmtyps.iter().map(|(n, _)| n.copy()).collect();
        let varmap: Vec<(Sym, Term)> = nmtyps
            .iter()
            .zip(&copies)
            .map(|((n, ty), c)| (n.clone(), pred::var(c.clone(), ty.clone())))
            .collect();

        let body = self.apply(pred::tuple(orig_vars));
        let new_env = AEnv::bind_tuple(copies, body, false);
        (varmap, new_env)
    }
}

impl fmt::Display for AEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bd in &self.bindings {
            match bd {
                Binding::List { names, rhs } => {
                    for (n, r) in names.iter().zip(rhs) {
                        write!(f, "[{n} ↦ {r}]")?;
                    }
                }
                Binding::Tuple { names, rhs } => {
                    write!(f, "[")?;
                    for (i, n) in names.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{n}")?;
                    }
                    write!(f, " ↦ {rhs}]")?;
                }
                Binding::Win { name, rhs } => write!(f, "[{name} ↦ {rhs}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pred::{add, eq, int, ivar, var, TermKind};

    #[test]
    fn compose_merges_adjacent_lists() {
        let x = Sym::fresh("x");
        let y = Sym::fresh("y");
        let env = AEnv::bind(x, int(1)).compose(AEnv::bind(y, int(2)));
        assert_eq!(env.bindings.len(), 1);
        match &env.bindings[0] {
            Binding::List { names, .. } => assert_eq!(names.len(), 2),
            other => panic!("expected merged list, got {other:?}"),
        }
    }

    #[test]
    fn apply_nests_earliest_binding_outermost() {
        // [x ↦ 1][y ↦ x+1] applied to (y == 2) must evaluate true:
        // x's definition has to be visible to y's.
        let x = Sym::fresh("x");
        let y = Sym::fresh("y");
        let env = AEnv::bind(x.clone(), int(1))
            .compose(AEnv::bind(y.clone(), add(ivar(x), int(1))));
        let wrapped = env.apply(eq(ivar(y), int(2)));

        use crate::solve::{FiniteModelSolver, Solver, Verdict};
        let mut slv = FiniteModelSolver::new();
        assert_eq!(slv.verify(&wrapped), Verdict::Proved);
    }

    #[test]
    fn apply_distributes_over_compose() {
        let x = Sym::fresh("x");
        let y = Sym::fresh("y");
        let a = AEnv::bind(x.clone(), int(3));
        let b = AEnv::bind(y.clone(), add(ivar(x.clone()), int(1)));
        let body = eq(ivar(y), add(ivar(x), int(1)));
        let lhs = a.clone().compose(b.clone()).apply(body.clone());
        let rhs = a.apply(b.apply(body));

        use crate::solve::{FiniteModelSolver, Solver, Verdict};
        let mut slv = FiniteModelSolver::new();
        assert_eq!(slv.verify(&lhs), Verdict::Proved);
        assert_eq!(slv.verify(&rhs), Verdict::Proved);
    }

    #[test]
    fn names_types_reports_exported_only() {
        let x = Sym::fresh("x");
        let y = Sym::fresh("y");
        let env = AEnv::bind_exported(x.clone(), int(1))
            .compose(AEnv::bind(y, int(2)));
        let nts = env.names_types();
        assert_eq!(nts.len(), 1);
        assert_eq!(nts[0].0, x);
        assert_eq!(nts[0].1, Type::Index);
    }

    #[test]
    fn bind_to_copies_freshens() {
        let x = Sym::fresh("x");
        let env = AEnv::bind_exported(x.clone(), int(7));
        let (varmap, copy_env) = env.bind_to_copies();
        assert_eq!(varmap.len(), 1);
        assert_eq!(varmap[0].0, x);
        let TermKind::Var(copy) = &varmap[0].1.kind else {
            panic!("copy map must hold variables")
        };
        assert_ne!(*copy, x);

        // the copy is bound to the original's value
        let body = eq(var(copy.clone(), Type::Index), int(7));
        let wrapped = copy_env.apply(body);
        use crate::solve::{FiniteModelSolver, Solver, Verdict};
        let mut slv = FiniteModelSolver::new();
        assert_eq!(slv.verify(&wrapped), Verdict::Proved);
    }

    #[test]
    fn translate_windows_composes_aliases() {
        use crate::pred::int;
        use crate::window::{Point, WinCoord};
        let base = Sym::fresh("base");
        let v1 = Sym::fresh("v1");
        let v2 = Sym::fresh("v2");
        let w1 = Win {
            buf: base.clone(),
            coords: vec![WinCoord::Iv(int(10))],
            strides: vec![int(1)],
        };
        let mut map = WinMap::new();
        map.insert(v1.clone(), w1);

        // v2 is a window of v1 at offset +5
        let w2 = Win {
            buf: v1,
            coords: vec![WinCoord::Iv(int(5))],
            strides: vec![int(1)],
        };
        let env = AEnv::bind_window(v2.clone(), w2);
        let out = env.translate_windows(&map);

        let pt = Point {
            buf: v2.clone(),
            coords: vec![int(0)],
        };
        let resolved = out[&v2].apply(&pt);
        assert_eq!(resolved.buf, base);
        assert_eq!(resolved.coords, vec![int(15)]);
    }
}
