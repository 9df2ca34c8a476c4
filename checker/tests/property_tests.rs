// Property-based tests for the symbolic algebra invariants.
//
// Three categories:
// 1. Window composition is associative under application to points
// 2. Environment application distributes over composition
// 3. Set membership agrees with a concrete reference enumeration
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;

use tpc::env::AEnv;
use tpc::locset::{self, LocSet};
use tpc::pred;
use tpc::solve::{FiniteModelSolver, Solver, Verdict};
use tpc::sym::Sym;
use tpc::window::{Point, Win, WinCoord};

// ── Test helpers ────────────────────────────────────────────────────────────

fn offset_win(buf: &Sym, off: i64) -> Win {
    Win {
        buf: buf.clone(),
        coords: vec![WinCoord::Iv(pred::int(off))],
        strides: vec![pred::int(1)],
    }
}

fn const_point(buf: &Sym, c: i64) -> Point {
    Point {
        buf: buf.clone(),
        coords: vec![pred::int(c)],
    }
}

fn const_set(buf: &Sym, cs: &[i64]) -> LocSet {
    cs.iter().fold(locset::empty(), |s, c| {
        locset::union(s, locset::point(const_point(buf, *c)))
    })
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn window_composition_associates_under_application(
        a in -50i64..50,
        b in -50i64..50,
        c in -50i64..50,
        p in -50i64..50,
    ) {
        let buf = Sym::fresh("buf");
        let (wa, wb, wc) = (
            offset_win(&buf, a),
            offset_win(&buf, b),
            offset_win(&buf, c),
        );
        let pt = const_point(&buf, p);
        let left = wa.compose(&wb).compose(&wc).apply(&pt);
        let right = wa.compose(&wb.compose(&wc)).apply(&pt);
        // constant offsets fold, so structural equality is decisive
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(&left.coords, &vec![pred::int(a + b + c + p)]);
    }

    #[test]
    fn environment_apply_distributes_over_compose(
        a in -20i64..20,
        b in -20i64..20,
    ) {
        let x = Sym::fresh("x");
        let y = Sym::fresh("y");
        let ea = AEnv::bind(x.clone(), pred::int(a));
        let eb = AEnv::bind(y.clone(), pred::add(pred::ivar(x), pred::int(b)));
        let goal = pred::eq(pred::ivar(y), pred::int(a + b));

        let joint = ea.clone().compose(eb.clone()).apply(goal.clone());
        let nested = ea.apply(eb.apply(goal));
        let mut slv = FiniteModelSolver::new();
        prop_assert_eq!(slv.verify(&joint), Verdict::Proved);
        prop_assert_eq!(slv.verify(&nested), Verdict::Proved);
    }

    #[test]
    fn membership_agrees_with_reference_enumeration(
        xs in prop::collection::vec(-8i64..8, 0..6),
        ys in prop::collection::vec(-8i64..8, 0..6),
        q in -8i64..8,
    ) {
        let buf = Sym::fresh("buf");
        let a = const_set(&buf, &xs);
        let b = const_set(&buf, &ys);
        let cases = [
            (locset::union(a.clone(), b.clone()), xs.contains(&q) || ys.contains(&q)),
            (locset::isct(a.clone(), b.clone()), xs.contains(&q) && ys.contains(&q)),
            (locset::diff(a, b), xs.contains(&q) && !ys.contains(&q)),
        ];
        let qpt = const_point(&buf, q);
        for (set, expect) in cases {
            // constant coordinates fold the membership predicate down to
            // a boolean literal
            let t = set.is_elem(&qpt);
            prop_assert_eq!(t.is_true(), expect);
            prop_assert_eq!(t.is_false(), !expect);
        }
    }
}
