// alpha.rs — Procedure identity: alpha-renaming and content fingerprints.
//
// Two call sites naming structurally identical procedures must memoize to
// the same cache entry. The fingerprint hashes a canonical encoding of the
// procedure in which symbols are numbered in encounter order, so any two
// alpha-equivalent procedures collide by construction. Configuration
// globals are the exception: they are free names with program-wide
// identity, so their raw ids are hashed as well.
//
// `rename` produces the alpha-renamed normal form: every binder (formal
// argument, loop iterate, allocation, window alias) replaced by a fresh
// copy, with fresh statement ids throughout.
//
// Preconditions: the procedure is well-formed IR.
// Postconditions: `fingerprint(p) == fingerprint(rename(p))`.
// Failure modes: none.
// Side effects: `rename` mints fresh symbols and statement ids.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::ir::{Expr, ExprKind, FnArg, Lit, Proc, Stmt, StmtKind, Type, WAccess};
use crate::sym::Sym;

/// Content hash of a procedure's alpha-renamed form.
pub type Fingerprint = [u8; 32];

pub fn fingerprint(proc: &Proc) -> Fingerprint {
    let mut enc = Encoder::default();
    for a in &proc.args {
        enc.tag(0x01);
        enc.sym(&a.name);
        enc.ty(&a.ty);
    }
    for p in &proc.preds {
        enc.tag(0x02);
        enc.expr(p);
    }
    for s in &proc.body {
        enc.stmt(s);
    }
    enc.hasher.finalize().into()
}

#[derive(Default)]
struct Encoder {
    hasher: Sha256,
    indices: HashMap<Sym, u32>,
}

impl Encoder {
    fn tag(&mut self, b: u8) {
        self.hasher.update([b]);
    }

    fn num(&mut self, v: i64) {
        self.hasher.update(v.to_le_bytes());
    }

    fn sym(&mut self, s: &Sym) {
        let next = self.indices.len() as u32;
        let idx = *self.indices.entry(s.clone()).or_insert(next);
        self.hasher.update(idx.to_le_bytes());
    }

    /// Configuration globals hash by identity, not encounter order.
    fn global(&mut self, s: &Sym) {
        self.hasher.update(s.id().to_le_bytes());
    }

    fn ty(&mut self, ty: &Type) {
        match ty {
            Type::Bool => self.tag(0x10),
            Type::Int => self.tag(0x11),
            Type::Index => self.tag(0x12),
            Type::Size => self.tag(0x13),
            Type::Stride => self.tag(0x14),
            Type::Num => self.tag(0x15),
            Type::Tensor { dims } => {
                self.tag(0x16);
                self.num(dims.len() as i64);
                for d in dims {
                    self.expr(d);
                }
            }
            Type::Tuple(tys) => {
                self.tag(0x17);
                self.num(tys.len() as i64);
                for t in tys {
                    self.ty(t);
                }
            }
            Type::Unknown => self.tag(0x18),
        }
    }

    fn expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Read { name, idx } => {
                self.tag(0x20);
                self.sym(name);
                self.num(idx.len() as i64);
                for i in idx {
                    self.expr(i);
                }
            }
            ExprKind::Const(Lit::Int(v)) => {
                self.tag(0x21);
                self.num(*v);
            }
            ExprKind::Const(Lit::Bool(b)) => {
                self.tag(0x22);
                self.tag(*b as u8);
            }
            ExprKind::Const(Lit::Float(v)) => {
                self.tag(0x23);
                self.hasher.update(v.to_le_bytes());
            }
            ExprKind::USub(arg) => {
                self.tag(0x24);
                self.expr(arg);
            }
            ExprKind::BinOp { op, lhs, rhs } => {
                self.tag(0x25);
                self.tag(*op as u8);
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Window { name, idx } => {
                self.tag(0x26);
                self.sym(name);
                for w in idx {
                    match w {
                        WAccess::Point(p) => {
                            self.tag(0x27);
                            self.expr(p);
                        }
                        WAccess::Interval { lo, hi } => {
                            self.tag(0x28);
                            self.expr(lo);
                            self.expr(hi);
                        }
                    }
                }
            }
            ExprKind::StrideExpr { name, dim } => {
                self.tag(0x29);
                self.sym(name);
                self.num(*dim as i64);
            }
            ExprKind::ReadConfig { field } => {
                self.tag(0x2a);
                self.global(field);
            }
        }
        self.ty(&e.ty);
    }

    fn stmt(&mut self, s: &Stmt) {
        match &s.kind {
            StmtKind::Assign { name, idx, rhs } => {
                self.tag(0x30);
                self.sym(name);
                for i in idx {
                    self.expr(i);
                }
                self.expr(rhs);
            }
            StmtKind::Reduce { name, idx, rhs } => {
                self.tag(0x31);
                self.sym(name);
                for i in idx {
                    self.expr(i);
                }
                self.expr(rhs);
            }
            StmtKind::WriteConfig { field, rhs } => {
                self.tag(0x32);
                self.global(field);
                self.expr(rhs);
            }
            StmtKind::If { cond, body, orelse } => {
                self.tag(0x33);
                self.expr(cond);
                self.num(body.len() as i64);
                for b in body {
                    self.stmt(b);
                }
                self.num(orelse.len() as i64);
                for b in orelse {
                    self.stmt(b);
                }
            }
            StmtKind::For { iter, hi, body } => {
                self.tag(0x34);
                self.sym(iter);
                self.expr(hi);
                self.num(body.len() as i64);
                for b in body {
                    self.stmt(b);
                }
            }
            StmtKind::Call { proc, args } => {
                self.tag(0x35);
                self.hasher.update(fingerprint(proc));
                for a in args {
                    self.expr(a);
                }
            }
            StmtKind::Alloc { name, ty } => {
                self.tag(0x36);
                self.sym(name);
                self.ty(ty);
            }
            StmtKind::Free { name } => {
                self.tag(0x37);
                self.sym(name);
            }
            StmtKind::Pass => self.tag(0x38),
            StmtKind::WindowStmt { lhs, rhs } => {
                self.tag(0x39);
                self.sym(lhs);
                self.expr(rhs);
            }
        }
    }
}

// ── Renaming ────────────────────────────────────────────────────────────────

/// The alpha-renamed normal form: all binders replaced by fresh copies.
pub fn rename(proc: &Proc) -> Proc {
    let mut r = Renamer::default();
    // bind every formal before touching the arg types: an earlier arg's
    // tensor extents may read a later formal
    let fresh: Vec<Sym> = proc.args.iter().map(|a| r.bind(&a.name)).collect();
    let args = proc
        .args
        .iter()
        .zip(fresh)
        .map(|(a, name)| FnArg {
            name,
            ty: r.ty(&a.ty),
        })
        .collect();
    let preds = proc.preds.iter().map(|p| r.expr(p)).collect();
    let body = r.stmts(&proc.body);
    Proc {
        name: proc.name.clone(),
        args,
        preds,
        body,
    }
}

#[derive(Default)]
struct Renamer {
    map: HashMap<Sym, Sym>,
}

impl Renamer {
    fn bind(&mut self, s: &Sym) -> Sym {
        let fresh = s.copy();
        self.map.insert(s.clone(), fresh.clone());
        fresh
    }

    fn lookup(&self, s: &Sym) -> Sym {
        self.map.get(s).cloned().unwrap_or_else(|| s.clone())
    }

    fn ty(&mut self, ty: &Type) -> Type {
        match ty {
            Type::Tensor { dims } => Type::Tensor {
                dims: dims.iter().map(|d| self.expr(d)).collect(),
            },
            other => other.clone(),
        }
    }

    fn expr(&mut self, e: &Expr) -> Expr {
        let kind = match &e.kind {
            ExprKind::Read { name, idx } => ExprKind::Read {
                name: self.lookup(name),
                idx: idx.iter().map(|i| self.expr(i)).collect(),
            },
            ExprKind::Const(l) => ExprKind::Const(*l),
            ExprKind::USub(arg) => ExprKind::USub(Box::new(self.expr(arg))),
            ExprKind::BinOp { op, lhs, rhs } => ExprKind::BinOp {
                op: *op,
                lhs: Box::new(self.expr(lhs)),
                rhs: Box::new(self.expr(rhs)),
            },
            ExprKind::Window { name, idx } => ExprKind::Window {
                name: self.lookup(name),
                idx: idx
                    .iter()
                    .map(|w| match w {
                        WAccess::Point(p) => WAccess::Point(self.expr(p)),
                        WAccess::Interval { lo, hi } => WAccess::Interval {
                            lo: self.expr(lo),
                            hi: self.expr(hi),
                        },
                    })
                    .collect(),
            },
            ExprKind::StrideExpr { name, dim } => ExprKind::StrideExpr {
                name: self.lookup(name),
                dim: *dim,
            },
            ExprKind::ReadConfig { field } => ExprKind::ReadConfig {
                field: field.clone(),
            },
        };
        Expr::new(kind, self.ty(&e.ty), e.span)
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, s: &Stmt) -> Stmt {
        let kind = match &s.kind {
            StmtKind::Assign { name, idx, rhs } => StmtKind::Assign {
                name: self.lookup(name),
                idx: idx.iter().map(|i| self.expr(i)).collect(),
                rhs: self.expr(rhs),
            },
            StmtKind::Reduce { name, idx, rhs } => StmtKind::Reduce {
                name: self.lookup(name),
                idx: idx.iter().map(|i| self.expr(i)).collect(),
                rhs: self.expr(rhs),
            },
            StmtKind::WriteConfig { field, rhs } => StmtKind::WriteConfig {
                field: field.clone(),
                rhs: self.expr(rhs),
            },
            StmtKind::If { cond, body, orelse } => StmtKind::If {
                cond: self.expr(cond),
                body: self.stmts(body),
                orelse: self.stmts(orelse),
            },
            StmtKind::For { iter, hi, body } => {
                let hi = self.expr(hi);
                let iter = self.bind(iter);
                StmtKind::For {
                    iter,
                    hi,
                    body: self.stmts(body),
                }
            }
            StmtKind::Call { proc, args } => StmtKind::Call {
                proc: std::rc::Rc::clone(proc),
                args: args.iter().map(|a| self.expr(a)).collect(),
            },
            StmtKind::Alloc { name, ty } => {
                let ty = self.ty(ty);
                StmtKind::Alloc {
                    name: self.bind(name),
                    ty,
                }
            }
            StmtKind::Free { name } => StmtKind::Free {
                name: self.lookup(name),
            },
            StmtKind::Pass => StmtKind::Pass,
            StmtKind::WindowStmt { lhs, rhs } => {
                let rhs = self.expr(rhs);
                StmtKind::WindowStmt {
                    lhs: self.bind(lhs),
                    rhs,
                }
            }
        };
        Stmt::new(kind, s.span)
    }
}
