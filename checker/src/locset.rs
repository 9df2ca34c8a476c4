// locset.rs — Symbolic location sets and their decision procedures.
//
// A `LocSet` is a possibly infinite set of index points built from
// singleton points, whole buffers, the boolean set algebra, existential
// big-unions (loop aggregation), guards, environment bindings, and a
// scoped hide-allocation marker that keeps locally allocated buffers from
// leaking into outward-facing sets.
//
// Two decision procedures reduce sets to terms: `is_elem` builds the
// membership predicate of a concrete point, threading window-alias
// resolution and allocation masking through the structure; `is_empty`
// collects every buffer the set can mention and states, per buffer, that
// no point of it is a member.
//
// Smart constructors normalize the empty set away eagerly so derived
// formulas stay small.
//
// Preconditions: points supplied to `is_elem` use base buffer names from
//   the scope the set was derived in.
// Postconditions: constructors are pure; decision procedures build terms
//   without consulting a solver.
// Failure modes: window-arity panics surface from the windowing algebra.
// Side effects: `is_empty` mints fresh coordinate symbols.

use std::fmt;

use crate::env::{AEnv, WinMap};
use crate::pred::{self, Term};
use crate::sym::Sym;
use crate::window::Point;

#[derive(Debug, Clone, PartialEq)]
pub enum LocSet {
    Empty,
    Pt(Point),
    WholeBuf { buf: Sym, ndim: usize },
    Union(Box<LocSet>, Box<LocSet>),
    Isct(Box<LocSet>, Box<LocSet>),
    Diff(Box<LocSet>, Box<LocSet>),
    /// Existential aggregation over all integer values of `name`.
    BigUnion { name: Sym, body: Box<LocSet> },
    Filter { pred: Term, body: Box<LocSet> },
    LetEnv { env: AEnv, body: Box<LocSet> },
    HideAlloc { name: Sym, body: Box<LocSet> },
}

// ── Smart constructors ──────────────────────────────────────────────────────

pub fn empty() -> LocSet {
    LocSet::Empty
}

pub fn point(pt: Point) -> LocSet {
    LocSet::Pt(pt)
}

pub fn whole(buf: Sym, ndim: usize) -> LocSet {
    LocSet::WholeBuf { buf, ndim }
}

pub fn union(a: LocSet, b: LocSet) -> LocSet {
    match (a, b) {
        (LocSet::Empty, s) | (s, LocSet::Empty) => s,
        (a, b) => LocSet::Union(Box::new(a), Box::new(b)),
    }
}

pub fn isct(a: LocSet, b: LocSet) -> LocSet {
    match (a, b) {
        (LocSet::Empty, _) | (_, LocSet::Empty) => LocSet::Empty,
        (a, b) => LocSet::Isct(Box::new(a), Box::new(b)),
    }
}

pub fn diff(a: LocSet, b: LocSet) -> LocSet {
    match (a, b) {
        (LocSet::Empty, _) => LocSet::Empty,
        (a, LocSet::Empty) => a,
        (a, b) => LocSet::Diff(Box::new(a), Box::new(b)),
    }
}

pub fn big_union(name: Sym, body: LocSet) -> LocSet {
    match body {
        LocSet::Empty => LocSet::Empty,
        body => LocSet::BigUnion {
            name,
            body: Box::new(body),
        },
    }
}

pub fn filter(pred: Term, body: LocSet) -> LocSet {
    match body {
        LocSet::Empty => LocSet::Empty,
        body if pred.is_true() => body,
        body => LocSet::Filter {
            pred,
            body: Box::new(body),
        },
    }
}

pub fn let_env(env: AEnv, body: LocSet) -> LocSet {
    match body {
        LocSet::Empty => LocSet::Empty,
        body if env.is_empty() => body,
        body => LocSet::LetEnv {
            env,
            body: Box::new(body),
        },
    }
}

pub fn hide_alloc(name: Sym, body: LocSet) -> LocSet {
    match body {
        LocSet::Empty => LocSet::Empty,
        body => LocSet::HideAlloc {
            name,
            body: Box::new(body),
        },
    }
}

// ── Decision procedures ─────────────────────────────────────────────────────

fn resolve(pt: &Point, wins: &WinMap) -> Point {
    match wins.get(&pt.buf) {
        Some(w) => w.apply(pt),
        None => pt.clone(),
    }
}

fn exists_all(names: impl IntoIterator<Item = Sym>, body: Term) -> Term {
    let mut names: Vec<Sym> = names.into_iter().collect();
    names.reverse();
    names.into_iter().fold(body, |b, n| pred::exists(n, b))
}

impl LocSet {
    /// The membership predicate of `pt` in this set.
    pub fn is_elem(&self, pt: &Point) -> Term {
        self.elem(pt, &WinMap::new(), &mut Vec::new())
    }

    fn elem(&self, pt: &Point, wins: &WinMap, hidden: &mut Vec<Sym>) -> Term {
        match self {
            LocSet::Empty => pred::ff(),
            LocSet::Pt(q) => {
                let q = resolve(q, wins);
                let p = resolve(pt, wins);
                if hidden.contains(&q.buf)
                    || q.buf != p.buf
                    || q.coords.len() != p.coords.len()
                {
                    return pred::ff();
                }
                pred::and_all(
                    q.coords
                        .into_iter()
                        .zip(p.coords)
                        .map(|(a, b)| pred::eq(a, b)),
                )
            }
            LocSet::WholeBuf { buf, .. } => {
                let p = resolve(pt, wins);
                match wins.get(buf) {
                    None => {
                        if !hidden.contains(buf) && p.buf == *buf {
                            pred::tt()
                        } else {
                            pred::ff()
                        }
                    }
                    // the alias denotes the image of its window
                    Some(w) => {
                        if hidden.contains(&w.buf) || w.buf != p.buf {
                            return pred::ff();
                        }
                        if w.is_passthrough() {
                            return pred::tt();
                        }
                        let zs: Vec<Sym> =
                            (0..w.nslots()).map(|_| Sym::fresh("z")).collect();
                        let img = w.apply(&Point {
                            buf: w.buf.clone(),
                            coords: zs.iter().map(|z| pred::ivar(z.clone())).collect(),
                        });
                        if img.coords.len() != p.coords.len() {
                            return pred::ff();
                        }
                        let eqs = pred::and_all(
                            img.coords
                                .into_iter()
                                .zip(p.coords)
                                .map(|(a, b)| pred::eq(a, b)),
                        );
                        exists_all(zs, eqs)
                    }
                }
            }
            LocSet::Union(a, b) => {
                pred::or(a.elem(pt, wins, hidden), b.elem(pt, wins, hidden))
            }
            LocSet::Isct(a, b) => {
                pred::and(a.elem(pt, wins, hidden), b.elem(pt, wins, hidden))
            }
            LocSet::Diff(a, b) => pred::and(
                a.elem(pt, wins, hidden),
                pred::not(b.elem(pt, wins, hidden)),
            ),
            LocSet::BigUnion { name, body } => {
                pred::exists(name.clone(), body.elem(pt, wins, hidden))
            }
            LocSet::Filter { pred: p, body } => {
                pred::and(p.clone(), body.elem(pt, wins, hidden))
            }
            LocSet::LetEnv { env, body } => {
                let wins = env.translate_windows(wins);
                env.apply(body.elem(pt, &wins, hidden))
            }
            LocSet::HideAlloc { name, body } => {
                hidden.push(name.clone());
                let out = body.elem(pt, wins, hidden);
                hidden.pop();
                out
            }
        }
    }

    /// A term stating that no point of any buffer is a member.
    pub fn is_empty(&self) -> Term {
        let mut bufs: Vec<(Sym, usize)> = Vec::new();
        self.collect_bufs(&WinMap::new(), &mut bufs);
        pred::and_all(bufs.into_iter().map(|(buf, rank)| {
            let zs: Vec<Sym> = (0..rank).map(|_| Sym::fresh("z")).collect();
            let pt = Point {
                buf,
                coords: zs.iter().map(|z| pred::ivar(z.clone())).collect(),
            };
            pred::forall_all(zs, pred::not(self.is_elem(&pt)))
        }))
    }

    fn collect_bufs(&self, wins: &WinMap, out: &mut Vec<(Sym, usize)>) {
        let push = |buf: Sym, rank: usize, out: &mut Vec<(Sym, usize)>| {
            if !out.contains(&(buf.clone(), rank)) {
                out.push((buf, rank));
            }
        };
        match self {
            LocSet::Empty => {}
            LocSet::Pt(q) => {
                let q = resolve(q, wins);
                push(q.buf, q.coords.len(), out);
            }
            LocSet::WholeBuf { buf, ndim } => match wins.get(buf) {
                None => push(buf.clone(), *ndim, out),
                Some(w) if w.is_passthrough() => push(w.buf.clone(), *ndim, out),
                Some(w) => push(w.buf.clone(), w.coords.len(), out),
            },
            LocSet::Union(a, b) | LocSet::Isct(a, b) | LocSet::Diff(a, b) => {
                a.collect_bufs(wins, out);
                b.collect_bufs(wins, out);
            }
            LocSet::BigUnion { body, .. }
            | LocSet::Filter { body, .. }
            | LocSet::HideAlloc { body, .. } => body.collect_bufs(wins, out),
            LocSet::LetEnv { env, body } => {
                let wins = env.translate_windows(wins);
                body.collect_bufs(&wins, out);
            }
        }
    }
}

impl fmt::Display for LocSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocSet::Empty => write!(f, "∅"),
            LocSet::Pt(p) => {
                write!(f, "{{{}[", p.buf)?;
                for (i, c) in p.coords.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "]}}")
            }
            LocSet::WholeBuf { buf, ndim } => write!(f, "all({buf}:{ndim})"),
            LocSet::Union(a, b) => write!(f, "({a} ∪ {b})"),
            LocSet::Isct(a, b) => write!(f, "({a} ∩ {b})"),
            LocSet::Diff(a, b) => write!(f, "({a} − {b})"),
            LocSet::BigUnion { name, body } => write!(f, "⋃ {name}. {body}"),
            LocSet::Filter { pred, body } => write!(f, "{{{body} | {pred}}}"),
            LocSet::LetEnv { env, body } => write!(f, "let {env} in {body}"),
            LocSet::HideAlloc { name, body } => write!(f, "hide {name}. {body}"),
        }
    }
}
