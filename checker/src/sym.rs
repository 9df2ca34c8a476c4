// sym.rs — Unique symbols for buffers, iteration variables, and globals.
//
// A `Sym` pairs a display name with a process-unique id. Identity (equality,
// hashing, ordering) is by id only; the name exists for diagnostics and
// pretty-printing. `copy()` mints a fresh id with the same name, which is
// how capture-avoiding freshening works throughout the analysis.
//
// Preconditions: none.
// Postconditions: two calls to `fresh`/`copy` never return equal symbols.
// Failure modes: none.
// Side effects: bumps a process-wide id counter.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// A named symbol with process-unique identity.
#[derive(Clone)]
pub struct Sym {
    name: Rc<str>,
    id: u32,
}

impl Sym {
    /// Mint a new symbol with the given display name.
    pub fn fresh(name: &str) -> Sym {
        Sym {
            name: Rc::from(name),
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A fresh symbol sharing this one's display name but with new identity.
    pub fn copy(&self) -> Sym {
        Sym {
            name: Rc::clone(&self.name),
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl PartialEq for Sym {
    fn eq(&self, other: &Sym) -> bool {
        self.id == other.id
    }
}

impl Eq for Sym {}

impl PartialOrd for Sym {
    fn partial_cmp(&self, other: &Sym) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sym {
    fn cmp(&self, other: &Sym) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for Sym {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}
