// window.rs — Symbolic windows (buffer views) and index points.
//
// A `Win` describes a possibly-partial view of a buffer: per-dimension
// coordinates that are either pinned to a point or left open at a symbolic
// offset, plus a per-dimension stride. Windows compose, and apply to index
// points, by offset addition at the open slots.
//
// A `Win` with no coordinates is the rank-polymorphic identity view used
// when a buffer is passed to a callee by bare name: it renames the buffer
// and forwards coordinates unchanged.
//
// Preconditions: slot/coordinate counts match on compose/apply (asserted —
//   a mismatch is malformed IR from an earlier phase, fatal).
// Postconditions: pure value construction only.
// Failure modes: contract-violation panics on slot mismatch.
// Side effects: none.

use std::fmt;

use crate::ir::{Expr, ExprKind, Lit};
use crate::pred::{self, Term};
use crate::sym::Sym;

/// A single scalar memory cell: buffer plus symbolic coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub buf: Sym,
    pub coords: Vec<Term>,
}

/// One dimension of a window: pinned to a point, or an open interval
/// anchored at a symbolic offset.
#[derive(Debug, Clone, PartialEq)]
pub enum WinCoord {
    Pt(Term),
    Iv(Term),
}

impl WinCoord {
    pub fn is_pt(&self) -> bool {
        matches!(self, WinCoord::Pt(_))
    }

    pub fn val(&self) -> &Term {
        match self {
            WinCoord::Pt(v) | WinCoord::Iv(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Win {
    pub buf: Sym,
    pub coords: Vec<WinCoord>,
    pub strides: Vec<Term>,
}

impl Win {
    /// The identity view over a freshly allocated buffer. Strides follow a
    /// row-major layout and are folded to constants for every dimension
    /// whose trailing extents are all compile-time constants.
    pub fn alloc(name: &Sym, sizes: &[Expr]) -> Win {
        let coords = sizes.iter().map(|_| WinCoord::Iv(pred::int(0))).collect();
        let mut strides: Vec<Term> = (0..sizes.len())
            .map(|i| pred::stride(name.clone(), i))
            .collect();

        if let Some(last) = strides.last_mut() {
            *last = pred::int(1);
            let mut sprod: i64 = 1;
            for i in (0..sizes.len() - 1).rev() {
                match sizes[i + 1].kind {
                    ExprKind::Const(Lit::Int(v)) => {
                        sprod *= v;
                        strides[i] = pred::int(sprod);
                    }
                    _ => break,
                }
            }
        }

        Win {
            buf: name.clone(),
            coords,
            strides,
        }
    }

    /// A rank-polymorphic identity view renaming `name`.
    pub fn passthrough(name: &Sym) -> Win {
        Win {
            buf: name.clone(),
            coords: vec![],
            strides: vec![],
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of open (interval) slots.
    pub fn nslots(&self) -> usize {
        self.coords.iter().filter(|c| !c.is_pt()).count()
    }

    /// Compose: apply `inner` to the open slots of `self`. The result
    /// views `self`'s buffer with inner offsets added at open slots and
    /// `inner`'s point/interval shape. `inner`'s buffer name is ignored.
    pub fn compose(&self, inner: &Win) -> Win {
        if inner.is_passthrough() {
            return self.clone();
        }
        if self.is_passthrough() {
            return Win {
                buf: self.buf.clone(),
                coords: inner.coords.clone(),
                strides: inner.strides.clone(),
            };
        }
        assert_eq!(
            self.nslots(),
            inner.coords.len(),
            "window compose: open-slot count mismatch (malformed IR)"
        );
        let mut ri = inner.coords.iter();
        let coords = self
            .coords
            .iter()
            .map(|lc| match lc {
                WinCoord::Pt(v) => WinCoord::Pt(v.clone()),
                WinCoord::Iv(off) => {
                    let rc = ri.next().expect("slot count checked above");
                    let sum = pred::add(rc.val().clone(), off.clone());
                    if rc.is_pt() {
                        WinCoord::Pt(sum)
                    } else {
                        WinCoord::Iv(sum)
                    }
                }
            })
            .collect();
        Win {
            buf: self.buf.clone(),
            coords,
            strides: self.strides.clone(),
        }
    }

    /// Apply the window to a point, adding offsets at each open slot.
    pub fn apply(&self, pt: &Point) -> Point {
        if self.is_passthrough() {
            return Point {
                buf: self.buf.clone(),
                coords: pt.coords.clone(),
            };
        }
        assert_eq!(
            self.nslots(),
            pt.coords.len(),
            "window apply: open-slot/coordinate count mismatch (malformed IR)"
        );
        let mut pi = pt.coords.iter();
        let coords = self
            .coords
            .iter()
            .map(|wc| match wc {
                WinCoord::Pt(v) => v.clone(),
                WinCoord::Iv(off) => {
                    let c = pi.next().expect("slot count checked above");
                    pred::add(off.clone(), c.clone())
                }
            })
            .collect();
        Point {
            buf: self.buf.clone(),
            coords,
        }
    }

    /// Stride of the `dim`-th open dimension.
    pub fn stride(&self, dim: usize) -> &Term {
        self.coords
            .iter()
            .zip(&self.strides)
            .filter(|(c, _)| !c.is_pt())
            .map(|(_, s)| s)
            .nth(dim)
            .unwrap_or_else(|| panic!("window has no open dimension {dim}"))
    }
}

impl fmt::Display for Win {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.buf)?;
        for c in &self.coords {
            match c {
                WinCoord::Pt(v) => write!(f, ",={v}")?,
                WinCoord::Iv(v) => write!(f, ",+{v}")?,
            }
        }
        write!(f, ")")
    }
}
