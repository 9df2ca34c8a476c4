// ir.rs — Loop-nested tensor-program IR consumed by the legality core.
//
// An immutable, already type-checked statement/expression tree. The core
// only reads this tree; the one "mutation" it performs is building fresh
// substituted copies (with fresh statement ids) for shifted/primed loop
// bodies. Every statement carries a stable `StmtId` so a focused
// sub-sequence can be located by identity rather than by pointer.
//
// Preconditions: produced by an earlier (external) parse/type-check phase;
//   expression types are consistent with their construct.
// Postconditions: none (data-only module plus pure copy helpers).
// Failure modes: none.
// Side effects: `StmtId::fresh` bumps a process-wide counter.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use chumsky::span::SimpleSpan;

use crate::sym::Sym;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// Build a span from a byte range.
pub fn span(range: Range<usize>) -> Span {
    chumsky::span::Span::new((), range)
}

/// A span for synthesized nodes with no source counterpart.
pub fn synth_span() -> Span {
    span(0..0)
}

/// Render a span for diagnostics.
pub fn span_str(s: Span) -> String {
    format!("{}..{}", s.start, s.end)
}

// ── Types ───────────────────────────────────────────────────────────────────

/// IR value types. `Tuple` and `Unknown` never appear in source programs;
/// they exist for the symbolic terms the analysis builds on top of the IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Bool,
    Int,
    Index,
    Size,
    Stride,
    /// Scalar numeric data (the element type of tensors).
    Num,
    /// A tensor with symbolic extents.
    Tensor { dims: Vec<Expr> },
    Tuple(Vec<Type>),
    Unknown,
}

impl Type {
    /// Numeric data held in buffers (scalars and tensors).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Num | Type::Tensor { .. })
    }

    /// Control values usable in index arithmetic.
    pub fn is_indexable(&self) -> bool {
        matches!(self, Type::Int | Type::Index | Type::Size)
    }

    pub fn is_stridable(&self) -> bool {
        matches!(self, Type::Stride)
    }

    /// Extent expressions of this type: empty for scalars.
    pub fn shape(&self) -> &[Expr] {
        match self {
            Type::Tensor { dims } => dims,
            _ => &[],
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lit {
    Int(i64),
    Bool(bool),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
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
}

/// One coordinate of a window expression: either a fixed point or an
/// interval selecting a sub-range of the dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum WAccess {
    Point(Expr),
    Interval { lo: Expr, hi: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Scalar or tensor read. `idx` is empty for non-tensor reads.
    Read { name: Sym, idx: Vec<Expr> },
    Const(Lit),
    USub(Box<Expr>),
    BinOp { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// A window (slice) of a buffer: `name[w0, w1, ...]`.
    Window { name: Sym, idx: Vec<WAccess> },
    /// `stride(name, dim)` query.
    StrideExpr { name: Sym, dim: usize },
    /// Read of a scalar configuration global.
    ReadConfig { field: Sym },
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Expr {
        Expr { kind, ty, span }
    }

    /// A bare variable read (no indices).
    pub fn read(name: Sym, ty: Type, span: Span) -> Expr {
        Expr::new(ExprKind::Read { name, idx: vec![] }, ty, span)
    }

    /// A tensor element read.
    pub fn idx_read(name: Sym, idx: Vec<Expr>, span: Span) -> Expr {
        Expr::new(ExprKind::Read { name, idx }, Type::Num, span)
    }

    pub fn int(v: i64, ty: Type, span: Span) -> Expr {
        Expr::new(ExprKind::Const(Lit::Int(v)), ty, span)
    }

    pub fn float(v: f64, span: Span) -> Expr {
        Expr::new(ExprKind::Const(Lit::Float(v)), Type::Num, span)
    }

    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr, ty: Type, span: Span) -> Expr {
        Expr::new(
            ExprKind::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        )
    }
}

// ── Statements ──────────────────────────────────────────────────────────────

/// Stable identifier for a statement node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

static NEXT_STMT_ID: AtomicU32 = AtomicU32::new(0);

impl StmtId {
    pub fn fresh() -> StmtId {
        StmtId(NEXT_STMT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: StmtId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Assign { name: Sym, idx: Vec<Expr>, rhs: Expr },
    Reduce { name: Sym, idx: Vec<Expr>, rhs: Expr },
    /// Write of a scalar configuration global.
    WriteConfig { field: Sym, rhs: Expr },
    If { cond: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
    /// Bounded counting loop: `for iter in 0..hi`.
    For { iter: Sym, hi: Expr, body: Vec<Stmt> },
    Call { proc: Rc<Proc>, args: Vec<Expr> },
    Alloc { name: Sym, ty: Type },
    Free { name: Sym },
    Pass,
    /// `lhs = name[w0, w1, ...]` — binds a window alias.
    WindowStmt { lhs: Sym, rhs: Expr },
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            id: StmtId::fresh(),
            kind,
            span,
        }
    }
}

// ── Procedures ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FnArg {
    pub name: Sym,
    pub ty: Type,
}

/// A procedure: formal arguments, assumed preconditions, body.
#[derive(Debug, Clone)]
pub struct Proc {
    pub name: String,
    pub args: Vec<FnArg>,
    /// Boolean predicates the caller guarantees on entry.
    pub preds: Vec<Expr>,
    pub body: Vec<Stmt>,
}

// ── Configuration globals ───────────────────────────────────────────────────

/// A named configuration object whose fields are modeled as global symbols.
/// Field lookup is by name; each field owns a stable `Sym` shared by every
/// read/write site referencing it.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    fields: Vec<(Sym, Type)>,
}

impl Config {
    pub fn new(name: &str, fields: &[(&str, Type)]) -> Config {
        Config {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(f, ty)| (Sym::fresh(&format!("{name}_{f}")), ty.clone()))
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> (Sym, Type) {
        let full = format!("{}_{}", self.name, name);
        self.fields
            .iter()
            .find(|(s, _)| s.name() == full)
            .map(|(s, ty)| (s.clone(), ty.clone()))
            .unwrap_or_else(|| panic!("config {} has no field {name}", self.name))
    }
}

// ── Substitution ────────────────────────────────────────────────────────────

/// Replace bare reads of mapped symbols with the mapped expressions.
/// Used to build shifted/primed loop bodies. Copies receive fresh `StmtId`s
/// so they never collide with the statements they were derived from.
pub fn subst_stmts(stmts: &[Stmt], map: &HashMap<Sym, Expr>) -> Vec<Stmt> {
    stmts.iter().map(|s| subst_stmt(s, map)).collect()
}

fn subst_stmt(s: &Stmt, map: &HashMap<Sym, Expr>) -> Stmt {
    let kind = match &s.kind {
        StmtKind::Assign { name, idx, rhs } => StmtKind::Assign {
            name: name.clone(),
            idx: idx.iter().map(|e| subst_expr(e, map)).collect(),
            rhs: subst_expr(rhs, map),
        },
        StmtKind::Reduce { name, idx, rhs } => StmtKind::Reduce {
            name: name.clone(),
            idx: idx.iter().map(|e| subst_expr(e, map)).collect(),
            rhs: subst_expr(rhs, map),
        },
        StmtKind::WriteConfig { field, rhs } => StmtKind::WriteConfig {
            field: field.clone(),
            rhs: subst_expr(rhs, map),
        },
        StmtKind::If { cond, body, orelse } => StmtKind::If {
            cond: subst_expr(cond, map),
            body: subst_stmts(body, map),
            orelse: subst_stmts(orelse, map),
        },
        StmtKind::For { iter, hi, body } => StmtKind::For {
            iter: iter.clone(),
            hi: subst_expr(hi, map),
            body: subst_stmts(body, map),
        },
        StmtKind::Call { proc, args } => StmtKind::Call {
            proc: Rc::clone(proc),
            args: args.iter().map(|e| subst_expr(e, map)).collect(),
        },
        StmtKind::Alloc { name, ty } => StmtKind::Alloc {
            name: name.clone(),
            ty: subst_type(ty, map),
        },
        StmtKind::Free { name } => StmtKind::Free { name: name.clone() },
        StmtKind::Pass => StmtKind::Pass,
        StmtKind::WindowStmt { lhs, rhs } => StmtKind::WindowStmt {
            lhs: lhs.clone(),
            rhs: subst_expr(rhs, map),
        },
    };
    Stmt::new(kind, s.span)
}

pub fn subst_expr(e: &Expr, map: &HashMap<Sym, Expr>) -> Expr {
    let kind = match &e.kind {
        ExprKind::Read { name, idx } => {
            if idx.is_empty() {
                if let Some(repl) = map.get(name) {
                    return repl.clone();
                }
            }
            ExprKind::Read {
                name: name.clone(),
                idx: idx.iter().map(|i| subst_expr(i, map)).collect(),
            }
        }
        ExprKind::Const(l) => ExprKind::Const(*l),
        ExprKind::USub(arg) => ExprKind::USub(Box::new(subst_expr(arg, map))),
        ExprKind::BinOp { op, lhs, rhs } => ExprKind::BinOp {
            op: *op,
            lhs: Box::new(subst_expr(lhs, map)),
            rhs: Box::new(subst_expr(rhs, map)),
        },
        ExprKind::Window { name, idx } => ExprKind::Window {
            name: name.clone(),
            idx: idx
                .iter()
                .map(|w| match w {
                    WAccess::Point(p) => WAccess::Point(subst_expr(p, map)),
                    WAccess::Interval { lo, hi } => WAccess::Interval {
                        lo: subst_expr(lo, map),
                        hi: subst_expr(hi, map),
                    },
                })
                .collect(),
        },
        ExprKind::StrideExpr { name, dim } => ExprKind::StrideExpr {
            name: name.clone(),
            dim: *dim,
        },
        ExprKind::ReadConfig { field } => ExprKind::ReadConfig {
            field: field.clone(),
        },
    };
    Expr::new(kind, subst_type(&e.ty, map), e.span)
}

fn subst_type(ty: &Type, map: &HashMap<Sym, Expr>) -> Type {
    match ty {
        Type::Tensor { dims } => Type::Tensor {
            dims: dims.iter().map(|d| subst_expr(d, map)).collect(),
        },
        other => other.clone(),
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subst_replaces_bare_reads_only() {
        let i = Sym::fresh("i");
        let buf = Sym::fresh("x");
        let body = vec![Stmt::new(
            StmtKind::Assign {
                name: buf.clone(),
                idx: vec![Expr::read(i.clone(), Type::Index, synth_span())],
                rhs: Expr::float(1.0, synth_span()),
            },
            synth_span(),
        )];
        let j = Sym::fresh("j");
        let mut map = HashMap::new();
        map.insert(i.clone(), Expr::read(j.clone(), Type::Index, synth_span()));
        let out = subst_stmts(&body, &map);
        match &out[0].kind {
            StmtKind::Assign { idx, .. } => match &idx[0].kind {
                ExprKind::Read { name, .. } => assert_eq!(*name, j),
                other => panic!("unexpected index: {other:?}"),
            },
            other => panic!("unexpected stmt: {other:?}"),
        }
        // substituted copies get fresh identity
        assert_ne!(out[0].id, body[0].id);
    }
}
