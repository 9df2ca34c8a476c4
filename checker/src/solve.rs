// solve.rs — Decision-procedure boundary and the shipped finite-model checker.
//
// The legality checkers talk to an external prover through the `Solver`
// trait: push/pop assumption scopes, assume a predicate, ask whether a
// predicate is valid. Anything other than `Proved` fails closed.
//
// `FiniteModelSolver` is the bundled implementation: a bounded-domain
// validity checker. It enumerates small integer models for the free atoms
// of the query (variables and unbound stride atoms), evaluates terms under
// Kleene three-valued logic (`Unk` is the undefined value), and bounds
// quantifiers over the same domain. The domain is the configured base
// range extended with every integer literal of the query and its
// off-by-one neighbors, so a constant coordinate outside the base range
// still has a witness. It answers `Unknown` when the query exceeds its
// atom or model budget.
//
// Preconditions: queries are boolean-typed terms.
// Postconditions: `Proved` means the goal evaluated definitely-true in
//   every admissible model of the seeded domain.
// Failure modes: `Unknown` on budget exhaustion or undefined evaluation.
// Side effects: none beyond internal assumption frames.

use std::collections::HashMap;

use crate::ir::Type;
use crate::pred::{TOp, Term, TermKind};
use crate::sym::Sym;

// ── Boundary ────────────────────────────────────────────────────────────────

/// Outcome of a validity query. The checkers treat `Disproved` and
/// `Unknown` identically (fail closed); the distinction is kept at the
/// boundary for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proved,
    Disproved,
    Unknown,
}

pub trait Solver {
    fn push(&mut self);
    fn pop(&mut self);
    fn assume(&mut self, p: Term);
    fn verify(&mut self, goal: &Term) -> Verdict;
}

// ── Finite-model checker ────────────────────────────────────────────────────

pub struct FiniteModelSolver {
    frames: Vec<Vec<Term>>,
    lo: i64,
    hi: i64,
    max_atoms: usize,
}

/// Key for a free atom of a query: a variable or an unbound stride slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AtomKey {
    Var(u32),
    Stride(u32, usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Val {
    Int(i64),
    Bool(bool),
    Tuple(Vec<Val>),
    Unknown,
}

impl Default for FiniteModelSolver {
    fn default() -> Self {
        FiniteModelSolver::new()
    }
}

impl FiniteModelSolver {
    pub fn new() -> FiniteModelSolver {
        FiniteModelSolver::with_domain(-1, 2)
    }

    /// A checker whose base model range for integer atoms is `lo..=hi`;
    /// per query the range is extended to cover the query's literals.
    pub fn with_domain(lo: i64, hi: i64) -> FiniteModelSolver {
        assert!(lo <= hi);
        FiniteModelSolver {
            frames: vec![Vec::new()],
            lo,
            hi,
            max_atoms: 8,
        }
    }

    fn assumptions(&self) -> impl Iterator<Item = &Term> {
        self.frames.iter().flatten()
    }

    /// The base range extended to cover every integer literal of the
    /// query, each with its off-by-one neighbors so strict bounds around
    /// a literal still see a witness.
    fn seed_domain(&self, consts: &[i64]) -> Vec<i64> {
        let mut dom: Vec<i64> = (self.lo..=self.hi).collect();
        for &c in consts {
            dom.extend([c.saturating_sub(1), c, c.saturating_add(1)]);
        }
        dom.sort_unstable();
        dom.dedup();
        dom
    }
}

const MAX_MODELS: u64 = 1 << 20;

impl Solver for FiniteModelSolver {
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) {
        assert!(self.frames.len() > 1, "solver pop without matching push");
        self.frames.pop();
    }

    fn assume(&mut self, p: Term) {
        self.frames
            .last_mut()
            .expect("solver has a base frame")
            .push(p);
    }

    fn verify(&mut self, goal: &Term) -> Verdict {
        let mut atoms = AtomSet::default();
        for a in self.assumptions() {
            atoms.collect(a, &mut Bound::default());
        }
        atoms.collect(goal, &mut Bound::default());
        if atoms.keys.len() > self.max_atoms {
            return Verdict::Unknown;
        }
        let dom = self.seed_domain(&atoms.consts);
        let mut models: u64 = 1;
        for (_, is_bool) in &atoms.keys {
            let w = if *is_bool { 2 } else { dom.len() as u64 };
            models = models.saturating_mul(w);
        }
        if models > MAX_MODELS {
            return Verdict::Unknown;
        }

        let assumptions: Vec<Term> = self.assumptions().cloned().collect();
        let mut env = HashMap::new();
        let mut saw_unknown = false;
        let mut stack: Vec<usize> = vec![0; atoms.keys.len()];
        // odometer enumeration over all atom assignments
        loop {
            for (slot, (key, is_bool)) in stack.iter().zip(&atoms.keys) {
                let val = if *is_bool {
                    Val::Bool(*slot == 1)
                } else {
                    Val::Int(dom[*slot])
                };
                env.insert(*key, val);
            }

            let admissible = assumptions
                .iter()
                .all(|a| eval(a, &mut env, &dom) != Val::Bool(false));
            if admissible {
                match eval(goal, &mut env, &dom) {
                    Val::Bool(true) => {}
                    Val::Bool(false) => return Verdict::Disproved,
                    _ => saw_unknown = true,
                }
            }

            // advance odometer
            let mut i = 0;
            loop {
                if i == stack.len() {
                    return if saw_unknown {
                        Verdict::Unknown
                    } else {
                        Verdict::Proved
                    };
                }
                let width = if atoms.keys[i].1 { 2 } else { dom.len() };
                stack[i] += 1;
                if stack[i] < width {
                    break;
                }
                stack[i] = 0;
                i += 1;
            }
        }
    }
}

// ── Free-atom collection ────────────────────────────────────────────────────

#[derive(Default)]
struct Bound {
    vars: Vec<Sym>,
    strides: Vec<(Sym, usize)>,
}

#[derive(Default)]
struct AtomSet {
    keys: Vec<(AtomKey, bool)>,
    seen: HashMap<AtomKey, ()>,
    consts: Vec<i64>,
}

impl AtomSet {
    fn add(&mut self, key: AtomKey, is_bool: bool) {
        if self.seen.insert(key, ()).is_none() {
            self.keys.push((key, is_bool));
        }
    }

    fn collect(&mut self, t: &Term, bound: &mut Bound) {
        match &t.kind {
            TermKind::Var(s) => {
                if !bound.vars.contains(s) {
                    self.add(AtomKey::Var(s.id()), t.ty == Type::Bool);
                }
            }
            TermKind::Int(v) => self.consts.push(*v),
            TermKind::Bool(_) | TermKind::Unk => {}
            TermKind::USub(a)
            | TermKind::Not(a)
            | TermKind::Definitely(a)
            | TermKind::Maybe(a) => self.collect(a, bound),
            TermKind::Bin { lhs, rhs, .. } => {
                self.collect(lhs, bound);
                self.collect(rhs, bound);
            }
            TermKind::Select {
                cond,
                on_true,
                on_false,
            } => {
                self.collect(cond, bound);
                self.collect(on_true, bound);
                self.collect(on_false, bound);
            }
            TermKind::Stride { buf, dim } => {
                if !bound.strides.contains(&(buf.clone(), *dim)) {
                    self.add(AtomKey::Stride(buf.id(), *dim), false);
                }
            }
            TermKind::ForAll { name, body } | TermKind::Exists { name, body } => {
                bound.vars.push(name.clone());
                self.collect(body, bound);
                bound.vars.pop();
            }
            TermKind::Let { names, rhs, body } => {
                // sequential scoping: rhs[k] sees names[..k]
                let base = bound.vars.len();
                for (n, r) in names.iter().zip(rhs) {
                    self.collect(r, bound);
                    bound.vars.push(n.clone());
                }
                self.collect(body, bound);
                bound.vars.truncate(base);
            }
            TermKind::LetTuple { names, rhs, body } => {
                self.collect(rhs, bound);
                let base = bound.vars.len();
                bound.vars.extend(names.iter().cloned());
                self.collect(body, bound);
                bound.vars.truncate(base);
            }
            TermKind::LetStride { buf, strides, body } => {
                for s in strides {
                    self.collect(s, bound);
                }
                let base = bound.strides.len();
                for dim in 0..strides.len() {
                    bound.strides.push((buf.clone(), dim));
                }
                self.collect(body, bound);
                bound.strides.truncate(base);
            }
            TermKind::Tuple(es) => {
                for e in es {
                    self.collect(e, bound);
                }
            }
        }
    }
}

// ── Evaluation ──────────────────────────────────────────────────────────────

fn eval(t: &Term, env: &mut HashMap<AtomKey, Val>, dom: &[i64]) -> Val {
    match &t.kind {
        TermKind::Var(s) => env
            .get(&AtomKey::Var(s.id()))
            .cloned()
            .unwrap_or(Val::Unknown),
        TermKind::Int(v) => Val::Int(*v),
        TermKind::Bool(b) => Val::Bool(*b),
        TermKind::Unk => Val::Unknown,
        TermKind::USub(a) => match eval(a, env, dom) {
            Val::Int(v) => Val::Int(-v),
            _ => Val::Unknown,
        },
        TermKind::Not(a) => match eval(a, env, dom) {
            Val::Bool(b) => Val::Bool(!b),
            _ => Val::Unknown,
        },
        TermKind::Bin { op, lhs, rhs } => {
            let l = eval(lhs, env, dom);
            // short-circuit dominators of three-valued logic
            match op {
                TOp::And if l == Val::Bool(false) => return Val::Bool(false),
                TOp::Or if l == Val::Bool(true) => return Val::Bool(true),
                TOp::Implies if l == Val::Bool(false) => return Val::Bool(true),
                _ => {}
            }
            let r = eval(rhs, env, dom);
            eval_bin(*op, l, r)
        }
        TermKind::Select {
            cond,
            on_true,
            on_false,
        } => match eval(cond, env, dom) {
            Val::Bool(true) => eval(on_true, env, dom),
            Val::Bool(false) => eval(on_false, env, dom),
            _ => Val::Unknown,
        },
        TermKind::Stride { buf, dim } => env
            .get(&AtomKey::Stride(buf.id(), *dim))
            .cloned()
            .unwrap_or(Val::Unknown),
        TermKind::ForAll { name, body } => {
            let key = AtomKey::Var(name.id());
            let saved = env.remove(&key);
            let mut unknown = false;
            let mut result = Val::Bool(true);
            for &v in dom {
                env.insert(key, Val::Int(v));
                match eval(body, env, dom) {
                    Val::Bool(true) => {}
                    Val::Bool(false) => {
                        result = Val::Bool(false);
                        break;
                    }
                    _ => unknown = true,
                }
            }
            restore(env, key, saved);
            if result == Val::Bool(true) && unknown {
                Val::Unknown
            } else {
                result
            }
        }
        TermKind::Exists { name, body } => {
            let key = AtomKey::Var(name.id());
            let saved = env.remove(&key);
            let mut unknown = false;
            let mut result = Val::Bool(false);
            for &v in dom {
                env.insert(key, Val::Int(v));
                match eval(body, env, dom) {
                    Val::Bool(false) => {}
                    Val::Bool(true) => {
                        result = Val::Bool(true);
                        break;
                    }
                    _ => unknown = true,
                }
            }
            restore(env, key, saved);
            if result == Val::Bool(false) && unknown {
                Val::Unknown
            } else {
                result
            }
        }
        TermKind::Definitely(a) => Val::Bool(eval(a, env, dom) == Val::Bool(true)),
        TermKind::Maybe(a) => Val::Bool(eval(a, env, dom) != Val::Bool(false)),
        TermKind::Let { names, rhs, body } => {
            let mut saved = Vec::with_capacity(names.len());
            for (n, r) in names.iter().zip(rhs) {
                let v = eval(r, env, dom);
                let key = AtomKey::Var(n.id());
                saved.push((key, env.insert(key, v)));
            }
            let out = eval(body, env, dom);
            for (key, old) in saved.into_iter().rev() {
                restore(env, key, old);
            }
            out
        }
        TermKind::LetTuple { names, rhs, body } => {
            let vals = match eval(rhs, env, dom) {
                Val::Tuple(vs) => vs,
                _ => vec![Val::Unknown; names.len()],
            };
            assert_eq!(names.len(), vals.len(), "tuple binding arity mismatch");
            let mut saved = Vec::with_capacity(names.len());
            for (n, v) in names.iter().zip(vals) {
                let key = AtomKey::Var(n.id());
                saved.push((key, env.insert(key, v)));
            }
            let out = eval(body, env, dom);
            for (key, old) in saved.into_iter().rev() {
                restore(env, key, old);
            }
            out
        }
        TermKind::LetStride { buf, strides, body } => {
            let mut saved = Vec::with_capacity(strides.len());
            for (dim, s) in strides.iter().enumerate() {
                let v = eval(s, env, dom);
                let key = AtomKey::Stride(buf.id(), dim);
                saved.push((key, env.insert(key, v)));
            }
            let out = eval(body, env, dom);
            for (key, old) in saved.into_iter().rev() {
                restore(env, key, old);
            }
            out
        }
        TermKind::Tuple(es) => Val::Tuple(es.iter().map(|e| eval(e, env, dom)).collect()),
    }
}

fn restore(env: &mut HashMap<AtomKey, Val>, key: AtomKey, old: Option<Val>) {
    match old {
        Some(v) => {
            env.insert(key, v);
        }
        None => {
            env.remove(&key);
        }
    }
}

fn eval_bin(op: TOp, l: Val, r: Val) -> Val {
    use TOp::*;
    match op {
        And => match (l, r) {
            (Val::Bool(false), _) | (_, Val::Bool(false)) => Val::Bool(false),
            (Val::Bool(true), Val::Bool(true)) => Val::Bool(true),
            _ => Val::Unknown,
        },
        Or => match (l, r) {
            (Val::Bool(true), _) | (_, Val::Bool(true)) => Val::Bool(true),
            (Val::Bool(false), Val::Bool(false)) => Val::Bool(false),
            _ => Val::Unknown,
        },
        Implies => match (l, r) {
            (Val::Bool(false), _) | (_, Val::Bool(true)) => Val::Bool(true),
            (Val::Bool(true), Val::Bool(false)) => Val::Bool(false),
            _ => Val::Unknown,
        },
        Eq => match (l, r) {
            (Val::Int(a), Val::Int(b)) => Val::Bool(a == b),
            (Val::Bool(a), Val::Bool(b)) => Val::Bool(a == b),
            (Val::Tuple(a), Val::Tuple(b)) => {
                if a.contains(&Val::Unknown) || b.contains(&Val::Unknown) {
                    Val::Unknown
                } else {
                    Val::Bool(a == b)
                }
            }
            _ => Val::Unknown,
        },
        Add | Sub | Mul | Div | Mod => match (l, r) {
            (Val::Int(a), Val::Int(b)) => match op {
                Add => Val::Int(a + b),
                Sub => Val::Int(a - b),
                Mul => Val::Int(a * b),
                Div if b != 0 => Val::Int(a.div_euclid(b)),
                Mod if b != 0 => Val::Int(a.rem_euclid(b)),
                _ => Val::Unknown,
            },
            _ => Val::Unknown,
        },
        Lt | Le | Gt | Ge => match (l, r) {
            (Val::Int(a), Val::Int(b)) => Val::Bool(match op {
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                _ => a >= b,
            }),
            _ => Val::Unknown,
        },
    }
}
