// Snapshot tests: lock the pretty-printed analysis artifacts to detect
// unintended rendering changes.
//
// Effect traces, derived location sets, binding environments, and the
// legality-error rendering all have stable Display grammars the
// diagnostics lean on. Snapshots are inline; run `cargo insta review`
// after intentional output changes to update baselines.

use tpc::context::Context;
use tpc::dataflow;
use tpc::derive::{basic_locsets, SetCode};
use tpc::diag::LegalityError;
use tpc::effect;
use tpc::ir::{span, synth_span, Expr, ExprKind, Lit, Proc, Stmt, StmtKind, Type};
use tpc::session::Session;
use tpc::sym::Sym;

// ── Test helpers ────────────────────────────────────────────────────────────

fn assign(buf: &Sym, idx: Expr, rhs: Expr) -> Stmt {
    Stmt::new(
        StmtKind::Assign {
            name: buf.clone(),
            idx: vec![idx],
            rhs,
        },
        synth_span(),
    )
}

fn counting_loop(iter: &Sym, hi: &Sym, body: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::For {
            iter: iter.clone(),
            hi: Expr::read(hi.clone(), Type::Size, synth_span()),
            body,
        },
        synth_span(),
    )
}

fn trace_str(stmts: &[Stmt]) -> String {
    let sess = Session::new();
    effect::stmts_effs(stmts, &sess)
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Effect traces ───────────────────────────────────────────────────────────

#[test]
fn trace_of_assignment_reads_then_writes() {
    let x = Sym::fresh("x");
    let y = Sym::fresh("y");
    let i = Sym::fresh("i");
    let s = synth_span();
    let ie = Expr::read(i, Type::Index, s);
    let rhs = Expr::bin(
        tpc::ir::BinOp::Add,
        Expr::idx_read(y, vec![ie.clone()], s),
        Expr::float(1.0, s),
        Type::Num,
        s,
    );
    insta::assert_snapshot!(trace_str(&[assign(&x, ie, rhs)]), @r"
    rd y[i]
    wr x[i]
    ");
}

#[test]
fn trace_of_conditional_guards_both_arms() {
    let x = Sym::fresh("x");
    let b = Sym::fresh("b");
    let s = synth_span();
    let stmt = Stmt::new(
        StmtKind::If {
            cond: Expr::read(b, Type::Bool, s),
            body: vec![assign(&x, Expr::int(0, Type::Index, s), Expr::float(1.0, s))],
            orelse: vec![],
        },
        s,
    );
    insta::assert_snapshot!(trace_str(&[stmt]), @r"
    guard (may(b)) { wr x[0] }
    guard (may(not b)) {  }
    ");
}

#[test]
fn trace_of_loop_wraps_bounds_guard() {
    let x = Sym::fresh("x");
    let i = Sym::fresh("i");
    let n = Sym::fresh("n");
    let s = synth_span();
    let body = vec![assign(
        &x,
        Expr::read(i.clone(), Type::Index, s),
        Expr::float(0.0, s),
    )];
    let lp = counting_loop(&i, &n, body);
    insta::assert_snapshot!(
        trace_str(&[lp]),
        @"loop i { guard (may(((0 <= i) and (i < n)))) { wr x[i] } }"
    );
}

// ── Derived sets and environments ───────────────────────────────────────────

#[test]
fn write_set_of_loop_aggregates_over_iterate() {
    let x = Sym::fresh("x");
    let i = Sym::fresh("i");
    let n = Sym::fresh("n");
    let s = synth_span();
    let body = vec![assign(
        &x,
        Expr::read(i.clone(), Type::Index, s),
        Expr::float(0.0, s),
    )];
    let lp = counting_loop(&i, &n, body);
    let sess = Session::new();
    let writes = basic_locsets(&effect::stmts_effs(&[lp], &sess)).set(SetCode::Writes);
    insta::assert_snapshot!(
        writes.to_string(),
        @"⋃ i. {{x[i]} | may(((0 <= i) and (i < n)))}"
    );
}

#[test]
fn environment_of_config_write() {
    let field = Sym::fresh("ctx_flag");
    let s = synth_span();
    let stmt = Stmt::new(
        StmtKind::WriteConfig {
            field,
            rhs: Expr::new(ExprKind::Const(Lit::Bool(true)), Type::Bool, s),
        },
        s,
    );
    let sess = Session::new();
    let env = dataflow::summarize(&[stmt], &sess);
    insta::assert_snapshot!(env.to_string(), @"[ctx_flag ↦ true]");
}

#[test]
fn control_predicate_of_loop_body_focus() {
    let x = Sym::fresh("x");
    let i = Sym::fresh("i");
    let n = Sym::fresh("n");
    let s = synth_span();
    let target = assign(&x, Expr::read(i.clone(), Type::Index, s), Expr::float(0.0, s));
    let target_id = target.id;
    let proc = Proc {
        name: "k".to_string(),
        args: vec![],
        preds: vec![],
        body: vec![counting_loop(&i, &n, vec![target])],
    };
    let sess = Session::new();
    let ctrl = Context::new(&proc, &[target_id]).control_predicate(&sess);
    insta::assert_snapshot!(ctrl.to_string(), @"may(((0 <= i) and (i < n)))");
}

// ── Diagnostics ─────────────────────────────────────────────────────────────

#[test]
fn legality_error_rendering() {
    let err = LegalityError::new(
        "reorder_loops",
        "cannot interchange the loop pair: iterations may conflict",
    )
    .with_span("outer loop", span(10..42))
    .with_span("inner loop", span(18..40))
    .with_detail("write set", "{a[i,j]}");
    insta::assert_snapshot!(err.to_string(), @r"
    Reorder Loops: cannot interchange the loop pair: iterations may conflict
      at outer loop: 10..42
      at inner loop: 18..40
      write set:
        {a[i,j]}
    ");
}
