// derive.rs — Reducing effect traces to location sets.
//
// `basic_locsets` folds an effect trace backward (right to left), so that
// prepending an earlier effect can kill reads the suffix exposed: a write
// at a point removes that point from the exposed-read set. Guards filter
// their body's sets by the guard condition; loops big-union them over the
// iterate; allocations hide the allocated name from everything the suffix
// computed; environment effects wrap every running set in a let binding
// (substitution stays symbolic and deferred).
//
// The six basic accumulators keep global scalars and buffer cells apart.
// `SetCode` selects either a basic set or one of the derived unions the
// commutativity predicates are stated over.
//
// Preconditions: none.
// Postconditions: pure; the trace is not consumed.
// Failure modes: none.
// Side effects: none.

use crate::effect::Eff;
use crate::locset::{
    self, big_union, diff, filter, hide_alloc, let_env, point, union, whole, LocSet,
};
use crate::sym::Sym;
use crate::window::Point;

/// Selector for one of the derived location sets of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCode {
    ReadG,
    ReadH,
    WriteG,
    WriteH,
    /// All exposed reads, global and buffer.
    Reads,
    /// All writes, global and buffer.
    Writes,
    /// Reduces not masked by a write of the same trace.
    Reduce,
    Modify,
    ReadWrite,
    All,
    Alloc,
}

/// The six basic location sets of an effect trace.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSets {
    pub read_g: LocSet,
    pub read_h: LocSet,
    pub write_g: LocSet,
    pub write_h: LocSet,
    pub pre_reduce: LocSet,
    pub alloc: LocSet,
}

impl EffectSets {
    pub fn empty() -> EffectSets {
        EffectSets {
            read_g: LocSet::Empty,
            read_h: LocSet::Empty,
            write_g: LocSet::Empty,
            write_h: LocSet::Empty,
            pre_reduce: LocSet::Empty,
            alloc: LocSet::Empty,
        }
    }

    pub fn set(&self, code: SetCode) -> LocSet {
        match code {
            SetCode::ReadG => self.read_g.clone(),
            SetCode::ReadH => self.read_h.clone(),
            SetCode::WriteG => self.write_g.clone(),
            SetCode::WriteH => self.write_h.clone(),
            SetCode::Reads => union(self.read_g.clone(), self.read_h.clone()),
            SetCode::Writes => union(self.write_g.clone(), self.write_h.clone()),
            SetCode::Reduce => diff(self.pre_reduce.clone(), self.write_h.clone()),
            SetCode::Modify => union(self.set(SetCode::Writes), self.pre_reduce.clone()),
            SetCode::ReadWrite => {
                union(self.set(SetCode::Reads), self.set(SetCode::Writes))
            }
            SetCode::All => {
                union(self.set(SetCode::ReadWrite), self.pre_reduce.clone())
            }
            SetCode::Alloc => self.alloc.clone(),
        }
    }

    fn map(self, f: impl Fn(LocSet) -> LocSet) -> EffectSets {
        EffectSets {
            read_g: f(self.read_g),
            read_h: f(self.read_h),
            write_g: f(self.write_g),
            write_h: f(self.write_h),
            pre_reduce: f(self.pre_reduce),
            alloc: f(self.alloc),
        }
    }
}

pub fn basic_locsets(effs: &[Eff]) -> EffectSets {
    effs.iter()
        .rev()
        .fold(EffectSets::empty(), |suffix, e| prepend(e, suffix))
}

fn gpt(g: &Sym) -> LocSet {
    point(Point {
        buf: g.clone(),
        coords: vec![],
    })
}

fn prepend(e: &Eff, s: EffectSets) -> EffectSets {
    match e {
        Eff::Read(p) => EffectSets {
            read_h: union(point(p.clone()), s.read_h),
            ..s
        },
        Eff::Write(p) => EffectSets {
            // this write kills any exposed read of the suffix at p
            read_h: diff(s.read_h, point(p.clone())),
            write_h: union(point(p.clone()), s.write_h),
            ..s
        },
        Eff::Reduce(p) => EffectSets {
            pre_reduce: union(point(p.clone()), s.pre_reduce),
            ..s
        },
        Eff::GlobalRead(g) => EffectSets {
            read_g: union(gpt(g), s.read_g),
            ..s
        },
        Eff::GlobalWrite(g) => EffectSets {
            read_g: diff(s.read_g, gpt(g)),
            write_g: union(gpt(g), s.write_g),
            ..s
        },
        Eff::Alloc { name, ndim } => {
            let hidden = s.map(|ls| hide_alloc(name.clone(), ls));
            EffectSets {
                alloc: union(whole(name.clone(), *ndim), hidden.alloc),
                ..hidden
            }
        }
        Eff::BindEnv(env) => s.map(|ls| let_env(env.clone(), ls)),
        Eff::Guard(c, body) => {
            let b = basic_locsets(body).map(|ls| filter(c.clone(), ls));
            merge(b, s)
        }
        Eff::Loop { iter, body } => {
            let b = basic_locsets(body).map(|ls| big_union(iter.clone(), ls));
            merge(b, s)
        }
    }
}

/// Merge a nested scope's sets with the suffix sets following it: the
/// scope's writes kill the suffix's exposed reads, everything else
/// accumulates by union.
fn merge(b: EffectSets, outer: EffectSets) -> EffectSets {
    EffectSets {
        read_g: union(b.read_g, diff(outer.read_g, b.write_g.clone())),
        read_h: union(b.read_h, diff(outer.read_h, b.write_h.clone())),
        write_g: union(b.write_g, outer.write_g),
        write_h: union(b.write_h, outer.write_h),
        pre_reduce: union(b.pre_reduce, outer.pre_reduce),
        alloc: union(b.alloc, outer.alloc),
    }
}
