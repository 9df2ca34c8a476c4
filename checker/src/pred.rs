// pred.rs — Symbolic term/predicate algebra for the legality analysis.
//
// `Term` is the formula language everything above the IR is expressed in:
// membership predicates, dataflow summaries, commutativity conditions.
// Terms are pure values; the smart constructors fold trivial boolean and
// integer cases eagerly so that formulas built from degenerate location
// sets stay small.
//
// Preconditions: constructor arguments are well-typed per their operator.
// Postconditions: constructed terms are structurally valid.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ir::Type;
use crate::sym::Sym;

// ── Terms ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    And,
    Or,
    Implies,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Var(Sym),
    Int(i64),
    Bool(bool),
    /// An unknown/undefined value (top). Evaluates to "undefined" in the
    /// three-valued semantics; see `Definitely` / `Maybe`.
    Unk,
    USub(Box<Term>),
    Not(Box<Term>),
    Bin { op: TOp, lhs: Box<Term>, rhs: Box<Term> },
    Select { cond: Box<Term>, on_true: Box<Term>, on_false: Box<Term> },
    /// The dim-th stride of a buffer, as an opaque atom unless bound by an
    /// enclosing `LetStride`.
    Stride { buf: Sym, dim: usize },
    ForAll { name: Sym, body: Box<Term> },
    Exists { name: Sym, body: Box<Term> },
    /// True iff the argument is defined and true.
    Definitely(Box<Term>),
    /// True iff the argument is not definitely false.
    Maybe(Box<Term>),
    /// Parallel let: `names[k]` bound to `rhs[k]` in `body`.
    Let { names: Vec<Sym>, rhs: Vec<Term>, body: Box<Term> },
    /// Tuple-destructuring let: `names` bound to the components of `rhs`.
    LetTuple { names: Vec<Sym>, rhs: Box<Term>, body: Box<Term> },
    /// Binds the stride atoms of `buf` to concrete terms within `body`.
    LetStride { buf: Sym, strides: Vec<Term>, body: Box<Term> },
    Tuple(Vec<Term>),
}

impl Term {
    pub fn new(kind: TermKind, ty: Type) -> Term {
        Term { kind, ty }
    }

    pub fn is_true(&self) -> bool {
        matches!(self.kind, TermKind::Bool(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self.kind, TermKind::Bool(false))
    }
}

// ── Smart constructors ──────────────────────────────────────────────────────

pub fn var(name: Sym, ty: Type) -> Term {
    Term::new(TermKind::Var(name), ty)
}

/// An index-typed variable (the common case for loop iterates and coords).
pub fn ivar(name: Sym) -> Term {
    var(name, Type::Index)
}

pub fn int(v: i64) -> Term {
    Term::new(TermKind::Int(v), Type::Index)
}

pub fn boolean(v: bool) -> Term {
    Term::new(TermKind::Bool(v), Type::Bool)
}

pub fn tt() -> Term {
    boolean(true)
}

pub fn ff() -> Term {
    boolean(false)
}

pub fn unknown(ty: Type) -> Term {
    Term::new(TermKind::Unk, ty)
}

pub fn stride(buf: Sym, dim: usize) -> Term {
    Term::new(TermKind::Stride { buf, dim }, Type::Stride)
}

fn bin(op: TOp, lhs: Term, rhs: Term, ty: Type) -> Term {
    Term::new(
        TermKind::Bin {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

pub fn add(lhs: Term, rhs: Term) -> Term {
    match (&lhs.kind, &rhs.kind) {
        (TermKind::Int(0), _) => rhs,
        (_, TermKind::Int(0)) => lhs,
        (TermKind::Int(a), TermKind::Int(b)) => int(a + b),
        _ => {
            let ty = lhs.ty.clone();
            bin(TOp::Add, lhs, rhs, ty)
        }
    }
}

pub fn sub(lhs: Term, rhs: Term) -> Term {
    match (&lhs.kind, &rhs.kind) {
        (_, TermKind::Int(0)) => lhs,
        (TermKind::Int(a), TermKind::Int(b)) => int(a - b),
        _ => {
            let ty = lhs.ty.clone();
            bin(TOp::Sub, lhs, rhs, ty)
        }
    }
}

pub fn mul(lhs: Term, rhs: Term) -> Term {
    match (&lhs.kind, &rhs.kind) {
        (TermKind::Int(a), TermKind::Int(b)) => int(a * b),
        _ => {
            let ty = lhs.ty.clone();
            bin(TOp::Mul, lhs, rhs, ty)
        }
    }
}

pub fn div(lhs: Term, rhs: Term) -> Term {
    // no folding: division by zero must stay symbolic
    let ty = lhs.ty.clone();
    bin(TOp::Div, lhs, rhs, ty)
}

pub fn modulo(lhs: Term, rhs: Term) -> Term {
    let ty = lhs.ty.clone();
    bin(TOp::Mod, lhs, rhs, ty)
}

pub fn usub(arg: Term) -> Term {
    match arg.kind {
        TermKind::Int(v) => int(-v),
        _ => {
            let ty = arg.ty.clone();
            Term::new(TermKind::USub(Box::new(arg)), ty)
        }
    }
}

pub fn eq(lhs: Term, rhs: Term) -> Term {
    match (&lhs.kind, &rhs.kind) {
        (TermKind::Int(a), TermKind::Int(b)) => boolean(a == b),
        _ => bin(TOp::Eq, lhs, rhs, Type::Bool),
    }
}

pub fn le(lhs: Term, rhs: Term) -> Term {
    match (&lhs.kind, &rhs.kind) {
        (TermKind::Int(a), TermKind::Int(b)) => boolean(a <= b),
        _ => bin(TOp::Le, lhs, rhs, Type::Bool),
    }
}

pub fn lt(lhs: Term, rhs: Term) -> Term {
    match (&lhs.kind, &rhs.kind) {
        (TermKind::Int(a), TermKind::Int(b)) => boolean(a < b),
        _ => bin(TOp::Lt, lhs, rhs, Type::Bool),
    }
}

pub fn and(lhs: Term, rhs: Term) -> Term {
    if lhs.is_true() || rhs.is_false() {
        rhs
    } else if rhs.is_true() || lhs.is_false() {
        lhs
    } else {
        bin(TOp::And, lhs, rhs, Type::Bool)
    }
}

pub fn and_all(terms: impl IntoIterator<Item = Term>) -> Term {
    terms.into_iter().fold(tt(), and)
}

pub fn or(lhs: Term, rhs: Term) -> Term {
    if lhs.is_false() || rhs.is_true() {
        rhs
    } else if rhs.is_false() || lhs.is_true() {
        lhs
    } else {
        bin(TOp::Or, lhs, rhs, Type::Bool)
    }
}

pub fn not(arg: Term) -> Term {
    match arg.kind {
        TermKind::Bool(b) => boolean(!b),
        TermKind::Not(inner) => *inner,
        _ => Term::new(TermKind::Not(Box::new(arg)), Type::Bool),
    }
}

pub fn implies(lhs: Term, rhs: Term) -> Term {
    if lhs.is_false() || rhs.is_true() {
        tt()
    } else if lhs.is_true() {
        rhs
    } else {
        bin(TOp::Implies, lhs, rhs, Type::Bool)
    }
}

pub fn select(cond: Term, on_true: Term, on_false: Term) -> Term {
    let ty = on_true.ty.clone();
    Term::new(
        TermKind::Select {
            cond: Box::new(cond),
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        },
        ty,
    )
}

pub fn forall(name: Sym, body: Term) -> Term {
    if body.is_true() {
        body
    } else {
        Term::new(
            TermKind::ForAll {
                name,
                body: Box::new(body),
            },
            Type::Bool,
        )
    }
}

pub fn forall_all(names: impl IntoIterator<Item = Sym>, body: Term) -> Term {
    let names: Vec<_> = names.into_iter().collect();
    names.into_iter().rev().fold(body, |b, n| forall(n, b))
}

pub fn exists(name: Sym, body: Term) -> Term {
    if body.is_false() {
        body
    } else {
        Term::new(
            TermKind::Exists {
                name,
                body: Box::new(body),
            },
            Type::Bool,
        )
    }
}

pub fn definitely(arg: Term) -> Term {
    match arg.kind {
        TermKind::Bool(_) => arg,
        _ => Term::new(TermKind::Definitely(Box::new(arg)), Type::Bool),
    }
}

pub fn maybe(arg: Term) -> Term {
    match arg.kind {
        TermKind::Bool(_) => arg,
        _ => Term::new(TermKind::Maybe(Box::new(arg)), Type::Bool),
    }
}

pub fn let_bind(names: Vec<Sym>, rhs: Vec<Term>, body: Term) -> Term {
    debug_assert_eq!(names.len(), rhs.len());
    let ty = body.ty.clone();
    Term::new(
        TermKind::Let {
            names,
            rhs,
            body: Box::new(body),
        },
        ty,
    )
}

pub fn let_tuple(names: Vec<Sym>, rhs: Term, body: Term) -> Term {
    let ty = body.ty.clone();
    Term::new(
        TermKind::LetTuple {
            names,
            rhs: Box::new(rhs),
            body: Box::new(body),
        },
        ty,
    )
}

pub fn let_stride(buf: Sym, strides: Vec<Term>, body: Term) -> Term {
    let ty = body.ty.clone();
    Term::new(
        TermKind::LetStride {
            buf,
            strides,
            body: Box::new(body),
        },
        ty,
    )
}

pub fn tuple(elems: Vec<Term>) -> Term {
    let ty = Type::Tuple(elems.iter().map(|e| e.ty.clone()).collect());
    Term::new(TermKind::Tuple(elems), ty)
}

// ── Pretty printing ─────────────────────────────────────────────────────────

impl fmt::Display for TOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TOp::Add => "+",
            TOp::Sub => "-",
            TOp::Mul => "*",
            TOp::Div => "/",
            TOp::Mod => "%",
            TOp::Lt => "<",
            TOp::Le => "<=",
            TOp::Gt => ">",
            TOp::Ge => ">=",
            TOp::Eq => "==",
            TOp::And => "and",
            TOp::Or => "or",
            TOp::Implies => "==>",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Var(s) => write!(f, "{s}"),
            TermKind::Int(v) => write!(f, "{v}"),
            TermKind::Bool(b) => write!(f, "{b}"),
            TermKind::Unk => write!(f, "unk"),
            TermKind::USub(a) => write!(f, "-{a}"),
            TermKind::Not(a) => write!(f, "not {a}"),
            TermKind::Bin { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            TermKind::Select {
                cond,
                on_true,
                on_false,
            } => write!(f, "({cond} ? {on_true} : {on_false})"),
            TermKind::Stride { buf, dim } => write!(f, "stride({buf},{dim})"),
            TermKind::ForAll { name, body } => write!(f, "(∀{name}.{body})"),
            TermKind::Exists { name, body } => write!(f, "(∃{name}.{body})"),
            TermKind::Definitely(a) => write!(f, "def({a})"),
            TermKind::Maybe(a) => write!(f, "may({a})"),
            TermKind::Let { names, rhs, body } => {
                write!(f, "(let ")?;
                for (n, r) in names.iter().zip(rhs) {
                    write!(f, "[{n} ↦ {r}]")?;
                }
                write!(f, " in {body})")
            }
            TermKind::LetTuple { names, rhs, body } => {
                write!(f, "(let (")?;
                for (i, n) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{n}")?;
                }
                write!(f, ") ↦ {rhs} in {body})")
            }
            TermKind::LetStride { buf, strides, body } => {
                write!(f, "(letstride {buf} ↦ (")?;
                for (i, s) in strides.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, ") in {body})")
            }
            TermKind::Tuple(es) => {
                write!(f, "(")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
        }
    }
}
