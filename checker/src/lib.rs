// tpc — tensor-program legality checker
//
// Library root. The legality-verification core of a scheduling-directed
// tensor-program compiler: decides whether reordering two statements or
// interchanging two nested loops preserves program semantics.

pub mod alpha;
pub mod check;
pub mod context;
pub mod dataflow;
pub mod derive;
pub mod diag;
pub mod effect;
pub mod env;
pub mod ir;
pub mod locset;
pub mod pred;
pub mod session;
pub mod solve;
pub mod sym;
pub mod window;
