// End-to-end legality scenarios for the two checker entry points.
//
// Programs are built directly as IR (the parser/type-checker is an
// external collaborator) and discharged against the bundled
// finite-model solver.

use std::rc::Rc;

use tpc::check::{check_reorder_loops, check_reorder_stmts};
use tpc::ir::{span, BinOp, Expr, ExprKind, FnArg, Lit, Proc, Stmt, StmtKind, Type, WAccess};
use tpc::session::Session;
use tpc::solve::FiniteModelSolver;
use tpc::sym::Sym;

// ── IR builders ─────────────────────────────────────────────────────────────

fn sp(at: usize) -> tpc::ir::Span {
    span(at..at + 1)
}

fn ix(name: &Sym) -> Expr {
    Expr::read(name.clone(), Type::Index, sp(0))
}

fn size(name: &Sym) -> Expr {
    Expr::read(name.clone(), Type::Size, sp(0))
}

fn tensor(extents: &[&Sym]) -> Type {
    Type::Tensor {
        dims: extents.iter().map(|e| size(e)).collect(),
    }
}

fn assign(buf: &Sym, idx: Vec<Expr>, rhs: Expr, at: usize) -> Stmt {
    Stmt::new(
        StmtKind::Assign {
            name: buf.clone(),
            idx,
            rhs,
        },
        sp(at),
    )
}

fn for_loop(iter: &Sym, hi: Expr, body: Vec<Stmt>, at: usize) -> Stmt {
    Stmt::new(
        StmtKind::For {
            iter: iter.clone(),
            hi,
            body,
        },
        sp(at),
    )
}

fn proc(args: Vec<FnArg>, body: Vec<Stmt>) -> Proc {
    Proc {
        name: "kernel".to_string(),
        args,
        preds: vec![],
        body,
    }
}

fn arg(name: &Sym, ty: Type) -> FnArg {
    FnArg {
        name: name.clone(),
        ty,
    }
}

// ── Statement reordering ────────────────────────────────────────────────────

#[test]
fn reorder_disjoint_buffer_writes_succeeds() {
    let (x, y) = (Sym::fresh("x"), Sym::fresh("y"));
    let (i, j, n) = (Sym::fresh("i"), Sym::fresh("j"), Sym::fresh("n"));
    let p = proc(
        vec![
            arg(&x, tensor(&[&n])),
            arg(&y, tensor(&[&n])),
            arg(&i, Type::Index),
            arg(&j, Type::Index),
            arg(&n, Type::Size),
        ],
        vec![
            assign(&x, vec![ix(&i)], Expr::float(1.0, sp(10)), 10),
            assign(&y, vec![ix(&j)], Expr::float(2.0, sp(20)), 20),
        ],
    );
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    let out = check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[0], &p.body[1]);
    assert!(out.is_ok(), "unexpected failure: {}", out.unwrap_err());
}

#[test]
fn reorder_same_cell_writes_fails() {
    let x = Sym::fresh("x");
    let (i, n) = (Sym::fresh("i"), Sym::fresh("n"));
    let p = proc(
        vec![
            arg(&x, tensor(&[&n])),
            arg(&i, Type::Index),
            arg(&n, Type::Size),
        ],
        vec![
            assign(&x, vec![ix(&i)], Expr::float(1.0, sp(10)), 10),
            assign(&x, vec![ix(&i)], Expr::float(2.0, sp(20)), 20),
        ],
    );
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    let err = check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[0], &p.body[1])
        .unwrap_err();
    assert_eq!(err.directive, "reorder");
    assert!(err.to_string().starts_with("Reorder: cannot reorder"));
    assert_eq!(err.to_json()["directive"], "reorder");
}

#[test]
fn reorder_same_distant_cell_writes_fails() {
    // both statements write x[10]; the conflicting coordinate lies outside
    // the solver's base model range
    let x = Sym::fresh("x");
    let n = Sym::fresh("n");
    let cell = |at| vec![Expr::int(10, Type::Index, sp(at))];
    let p = proc(
        vec![arg(&x, tensor(&[&n])), arg(&n, Type::Size)],
        vec![
            assign(&x, cell(10), Expr::float(1.0, sp(10)), 10),
            assign(&x, cell(20), Expr::float(2.0, sp(20)), 20),
        ],
    );
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    assert!(
        check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[0], &p.body[1]).is_err()
    );
}

#[test]
fn reorder_window_alias_config_read_against_config_write_fails() {
    // w = x[@ctx_off] reads the config field the second statement writes
    let x = Sym::fresh("x");
    let w = Sym::fresh("w");
    let n = Sym::fresh("n");
    let off = Sym::fresh("ctx_off");
    let win = Stmt::new(
        StmtKind::WindowStmt {
            lhs: w.clone(),
            rhs: Expr::new(
                ExprKind::Window {
                    name: x.clone(),
                    idx: vec![WAccess::Point(Expr::new(
                        ExprKind::ReadConfig { field: off.clone() },
                        Type::Index,
                        sp(1),
                    ))],
                },
                Type::Tensor { dims: vec![] },
                sp(1),
            ),
        },
        sp(1),
    );
    let bump = Stmt::new(
        StmtKind::WriteConfig {
            field: off.clone(),
            rhs: Expr::int(1, Type::Index, sp(2)),
        },
        sp(2),
    );
    let p = proc(
        vec![arg(&x, tensor(&[&n])), arg(&n, Type::Size)],
        vec![win, bump],
    );
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    assert!(
        check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[0], &p.body[1]).is_err()
    );
}

#[test]
fn reorder_config_write_against_config_read_fails() {
    let (g1, g2) = (Sym::fresh("ctx_mode"), Sym::fresh("ctx_copy"));
    let s1 = Stmt::new(
        StmtKind::WriteConfig {
            field: g1.clone(),
            rhs: Expr::new(ExprKind::Const(Lit::Bool(true)), Type::Bool, sp(1)),
        },
        sp(1),
    );
    let s2 = Stmt::new(
        StmtKind::WriteConfig {
            field: g2.clone(),
            rhs: Expr::new(ExprKind::ReadConfig { field: g1.clone() }, Type::Bool, sp(2)),
        },
        sp(2),
    );
    let p = proc(vec![], vec![s1, s2]);
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    assert!(
        check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[0], &p.body[1]).is_err()
    );
}

// ── Loop interchange ────────────────────────────────────────────────────────

fn nested_loop_proc(body_of_inner: impl FnOnce(&Sym, &Sym, &Sym) -> Vec<Stmt>) -> Proc {
    let a = Sym::fresh("a");
    let (i, j) = (Sym::fresh("i"), Sym::fresh("j"));
    let (n, m) = (Sym::fresh("n"), Sym::fresh("m"));
    let inner = for_loop(&j, size(&m), body_of_inner(&a, &i, &j), 2);
    let outer = for_loop(&i, size(&n), vec![inner], 1);
    proc(
        vec![
            arg(&a, tensor(&[&n, &m])),
            arg(&n, Type::Size),
            arg(&m, Type::Size),
        ],
        vec![outer],
    )
}

#[test]
fn interchange_elementwise_writes_succeeds() {
    let p = nested_loop_proc(|a, i, j| {
        vec![assign(a, vec![ix(i), ix(j)], Expr::float(0.0, sp(3)), 3)]
    });
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    let out = check_reorder_loops(&sess, &mut slv, "reorder_loops", &p, &p.body[0]);
    assert!(out.is_ok(), "unexpected failure: {}", out.unwrap_err());
}

#[test]
fn interchange_shared_cell_accumulation_fails() {
    // every iteration rewrites a[0,0] from its previous value
    let p = nested_loop_proc(|a, _i, _j| {
        let zero = |at| Expr::int(0, Type::Index, sp(at));
        let rhs = Expr::bin(
            BinOp::Add,
            Expr::idx_read(a.clone(), vec![zero(4), zero(4)], sp(4)),
            Expr::float(1.0, sp(4)),
            Type::Num,
            sp(4),
        );
        vec![assign(a, vec![zero(3), zero(3)], rhs, 3)]
    });
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    let err =
        check_reorder_loops(&sess, &mut slv, "reorder_loops", &p, &p.body[0]).unwrap_err();
    assert!(err.to_string().starts_with("Reorder Loops: cannot interchange"));
}

#[test]
fn interchange_bound_config_read_against_body_write_fails() {
    // the outer bound reads @ctx_len and the first outer iteration writes
    // it, so after interchange the bound is evaluated under a clobbered
    // value
    let (i, j) = (Sym::fresh("i"), Sym::fresh("j"));
    let m = Sym::fresh("m");
    let len = Sym::fresh("ctx_len");
    let first_iter = Expr::bin(
        BinOp::Eq,
        ix(&i),
        Expr::int(0, Type::Index, sp(3)),
        Type::Bool,
        sp(3),
    );
    let set_len = Stmt::new(
        StmtKind::WriteConfig {
            field: len.clone(),
            rhs: Expr::int(1, Type::Size, sp(4)),
        },
        sp(4),
    );
    let guarded = Stmt::new(
        StmtKind::If {
            cond: first_iter,
            body: vec![set_len],
            orelse: vec![],
        },
        sp(3),
    );
    let inner = for_loop(&j, size(&m), vec![guarded], 2);
    let hi_x = Expr::new(ExprKind::ReadConfig { field: len }, Type::Size, sp(1));
    let outer = for_loop(&i, hi_x, vec![inner], 1);
    let p = proc(vec![arg(&m, Type::Size)], vec![outer]);
    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    let err =
        check_reorder_loops(&sess, &mut slv, "reorder_loops", &p, &p.body[0]).unwrap_err();
    assert!(err.to_string().starts_with("Reorder Loops"));
}

// ── Caching ─────────────────────────────────────────────────────────────────

#[test]
fn repeated_checks_reuse_callee_caches() {
    // two calls to the same callee on distinct buffers, with the focus
    // placed so one call lands in the pre-focus prefix (summary) and one
    // inside the focus (effect trace)
    let b = Sym::fresh("b");
    let k = Sym::fresh("k");
    let callee = Rc::new(Proc {
        name: "clear".to_string(),
        args: vec![arg(&b, tensor(&[&k])), arg(&k, Type::Size)],
        preds: vec![],
        body: vec![assign(
            &b,
            vec![Expr::int(0, Type::Index, sp(5))],
            Expr::float(0.0, sp(5)),
            5,
        )],
    });
    let (x, y, z, n) = (
        Sym::fresh("x"),
        Sym::fresh("y"),
        Sym::fresh("z"),
        Sym::fresh("n"),
    );
    let call = |buf: &Sym, at: usize| {
        Stmt::new(
            StmtKind::Call {
                proc: Rc::clone(&callee),
                args: vec![
                    Expr::read(buf.clone(), tensor(&[&n]), sp(at)),
                    size(&n),
                ],
            },
            sp(at),
        )
    };
    let p = proc(
        vec![
            arg(&x, tensor(&[&n])),
            arg(&y, tensor(&[&n])),
            arg(&z, tensor(&[&n])),
            arg(&n, Type::Size),
        ],
        vec![
            call(&x, 10),
            assign(&z, vec![Expr::int(0, Type::Index, sp(15))], Expr::float(1.0, sp(15)), 15),
            call(&y, 20),
        ],
    );

    let sess = Session::new();
    let mut slv = FiniteModelSolver::new();
    let first = check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[1], &p.body[2]);
    let second = check_reorder_stmts(&sess, &mut slv, "reorder", &p, &p.body[1], &p.body[2]);
    assert!(first.is_ok(), "unexpected failure: {}", first.unwrap_err());
    assert!(second.is_ok());
    // one callee, analyzed once across both checks
    assert_eq!(sess.traces_built(), 1);
    assert_eq!(sess.summaries_built(), 1);
}
