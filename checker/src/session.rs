// session.rs — Per-run analysis session: memoized procedure facts.
//
// Summaries and effect traces of callee procedures are expensive to
// recompute at every call site, and the same procedure is typically called
// many times across one scheduling run. The session caches three facts
// keyed by the alpha-invariant fingerprint of the procedure: the
// alpha-renamed normal form itself, its dataflow summary, and its effect
// trace. Alpha-equivalent procedures therefore share cache entries even
// when they were constructed independently.
//
// Preconditions: `proc_summary` / `proc_effects` take the normal form
//   produced by `simple_proc` (summaries are stated over its symbols).
// Postconditions: repeated queries for alpha-equivalent procedures hit the
//   cache; `summaries_built` / `traces_built` count misses only.
// Failure modes: unbounded recursion on (ill-formed) self-recursive
//   procedures, as in any call-string-insensitive summary analysis.
// Side effects: interior-mutable caches only.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::alpha::{self, Fingerprint};
use crate::dataflow;
use crate::effect::{self, Eff};
use crate::env::AEnv;
use crate::ir::Proc;

#[derive(Default)]
pub struct Session {
    simple: RefCell<HashMap<Fingerprint, Rc<Proc>>>,
    summaries: RefCell<HashMap<Fingerprint, AEnv>>,
    effects: RefCell<HashMap<Fingerprint, Rc<Vec<Eff>>>>,
    summaries_built: Cell<usize>,
    traces_built: Cell<usize>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// The cached alpha-renamed normal form of a procedure.
    pub fn simple_proc(&self, proc: &Rc<Proc>) -> Rc<Proc> {
        let fp = alpha::fingerprint(proc);
        if let Some(hit) = self.simple.borrow().get(&fp) {
            return Rc::clone(hit);
        }
        let renamed = Rc::new(alpha::rename(proc));
        self.simple
            .borrow_mut()
            .insert(fp, Rc::clone(&renamed));
        renamed
    }

    /// The dataflow summary of a normal-form procedure's body.
    pub fn proc_summary(&self, proc: &Rc<Proc>) -> AEnv {
        let fp = alpha::fingerprint(proc);
        if let Some(hit) = self.summaries.borrow().get(&fp) {
            return hit.clone();
        }
        self.summaries_built.set(self.summaries_built.get() + 1);
        let env = dataflow::summarize(&proc.body, self);
        self.summaries.borrow_mut().insert(fp, env.clone());
        env
    }

    /// The effect trace of a normal-form procedure's body.
    pub fn proc_effects(&self, proc: &Rc<Proc>) -> Rc<Vec<Eff>> {
        let fp = alpha::fingerprint(proc);
        if let Some(hit) = self.effects.borrow().get(&fp) {
            return Rc::clone(hit);
        }
        self.traces_built.set(self.traces_built.get() + 1);
        let effs = Rc::new(effect::stmts_effs(&proc.body, self));
        self.effects.borrow_mut().insert(fp, Rc::clone(&effs));
        effs
    }

    /// Number of summaries computed (cache misses).
    pub fn summaries_built(&self) -> usize {
        self.summaries_built.get()
    }

    /// Number of effect traces computed (cache misses).
    pub fn traces_built(&self) -> usize {
        self.traces_built.get()
    }
}
