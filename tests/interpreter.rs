mod common;

#[cfg(test)]
mod interpreter_tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use rox::environment::Environment;
    use rox::error::RuntimeFault;
    use rox::token::{Identifier, SourceLocation};
    use rox::value::{format_number, Value};

    use crate::common::{output_of, run};

    fn fault_of(source: &str) -> RuntimeFault {
        let (_, report) = run(source);

        assert!(report.errors.is_empty(), "static errors: {:?}", report.errors);
        report.fault.expect("expected a runtime fault")
    }

    fn loc(line: usize, column: usize) -> SourceLocation {
        SourceLocation::new(Rc::from("test.lox"), line, column)
    }

    // ── arithmetic and comparison ───────────────────────────────────────

    #[test]
    fn test_precedence_and_division() {
        assert_eq!(
            output_of("print 2 + 3 * 4; print (2 + 3) * 4; print 4 / -2; print 7 / 2;"),
            "14\n20\n-2\n3.5\n"
        );
    }

    #[test]
    fn test_epsilon_equality() {
        assert_eq!(
            output_of("print 0.1 + 0.2 == 0.3; print 1 == 1.00001; print 1 == 1.1;"),
            "true\ntrue\nfalse\n"
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            output_of("print 1 < 2; print 2 <= 2; print 3 > 4; print 4 >= 5;"),
            "true\ntrue\nfalse\nfalse\n"
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(output_of("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn test_zero_division_fault() {
        let fault = fault_of("print 4 / 0;");

        assert!(matches!(fault, RuntimeFault::ZeroDivide { .. }), "{:?}", fault);
        assert_eq!(fault.to_string(), "<script>:1:9: Zero division is not allowed.");
    }

    #[test]
    fn test_nil_equality() {
        assert_eq!(
            output_of("print nil == nil; print nil != nil; print nil == false; print nil == 0;"),
            "true\nfalse\nfalse\nfalse\n"
        );
    }

    #[test]
    fn test_nil_arithmetic_is_a_cast_fault() {
        let fault = fault_of("nil + 1;");
        assert!(matches!(fault, RuntimeFault::Cast { .. }), "{:?}", fault);
        assert_eq!(fault.location().column, 1);

        let fault = fault_of("1 - nil;");
        assert!(matches!(fault, RuntimeFault::Cast { .. }), "{:?}", fault);
        assert_eq!(fault.location().column, 5);
        assert_eq!(
            fault.to_string(),
            "<script>:1:5: Could not perform cast of `nil` to double"
        );
    }

    #[test]
    fn test_mixed_addition_points_at_bad_operand() {
        let fault = fault_of("\"a\" + 1;");

        assert_eq!(fault.location().column, 7);
        assert_eq!(
            fault.to_string(),
            "<script>:1:7: Both operands of addition should be either numbers or strings."
        );
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(
            output_of("print -(3); print !nil; print !0; print !\"\";"),
            "-3\ntrue\nfalse\nfalse\n"
        );
        assert!(matches!(fault_of("print -\"x\";"), RuntimeFault::Cast { .. }));
    }

    // ── variables and scope ─────────────────────────────────────────────

    #[test]
    fn test_variable_lifecycle() {
        assert_eq!(output_of("var a = 10; a = 11; print a;"), "11\n");
        assert_eq!(output_of("var a; print a;"), "nil\n");
    }

    #[test]
    fn test_undefined_variable() {
        let fault = fault_of("print b;");
        assert!(
            matches!(&fault, RuntimeFault::UndefinedVariable { name, .. } if name == "b"),
            "{:?}",
            fault
        );

        assert!(matches!(
            fault_of("b = 1;"),
            RuntimeFault::UndefinedVariable { .. }
        ));
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        assert_eq!(
            output_of("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_assignment_reaches_enclosing_scope() {
        assert_eq!(output_of("var a = 1; { a = 5; } print a;"), "5\n");
    }

    #[test]
    fn test_closure_binds_at_resolution() {
        let source = r#"
            var a = "global";
            {
                fun showA() { print a; }
                showA();
                var a = "block";
                showA();
            }
        "#;

        assert_eq!(output_of(source), "global\nglobal\n");
    }

    #[test]
    fn test_closure_captures_by_reference() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var counter = makeCounter();
            counter();
            counter();
            print counter();
        "#;

        assert_eq!(output_of(source), "3\n");
    }

    #[test]
    fn test_closure_sees_later_mutation() {
        let source = r#"
            var x = "before";
            fun show() { print x; }
            x = "after";
            show();
        "#;

        assert_eq!(output_of(source), "after\n");
    }

    // ── control flow ────────────────────────────────────────────────────

    #[test]
    fn test_for_loop_prints_zero_to_nine() {
        let expected: String = (0..10).map(|i| format!("{}\n", i)).collect();

        assert_eq!(output_of("for (var i = 0; i < 10; i = i + 1) print i;"), expected);
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            output_of("if (1 > 2) print \"yes\"; else print \"no\"; if (nil) print \"never\";"),
            "no\n"
        );
    }

    #[test]
    fn test_break_exits_nearest_loop_only() {
        let source = r#"
            for (var i = 0; i < 3; i = i + 1) {
                var j = 0;
                while (true) {
                    if (j == 2) break;
                    j = j + 1;
                }
                print i * 10 + j;
            }
        "#;

        assert_eq!(output_of(source), "2\n12\n22\n");
    }

    #[test]
    fn test_break_outside_loop_is_a_fault() {
        assert!(matches!(
            fault_of("break;"),
            RuntimeFault::BreakOutsideLoop { .. }
        ));
    }

    #[test]
    fn test_break_does_not_cross_function_boundary() {
        let source = "fun f() { break; } while (true) { f(); }";

        assert!(matches!(
            fault_of(source),
            RuntimeFault::BreakOutsideLoop { .. }
        ));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(
            output_of("print false and (1 / 0); print true or (1 / 0);"),
            "false\ntrue\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(
            output_of("print nil or \"x\"; print 1 and 2; print nil and 1; print 0 or 1;"),
            "x\n2\nnil\n0\n"
        );
    }

    #[test]
    fn test_sequence_yields_last() {
        assert_eq!(output_of("var a; print (a = 1, a + 1, a + 2);"), "3\n");
    }

    // ── functions ───────────────────────────────────────────────────────

    #[test]
    fn test_recursion() {
        let source = r#"
            fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
            print fib(10);
        "#;

        assert_eq!(output_of(source), "55\n");
    }

    #[test]
    fn test_return_without_value_is_nil() {
        assert_eq!(output_of("fun f() { return; } print f();"), "nil\n");
        assert_eq!(output_of("fun g() {} print g();"), "nil\n");
    }

    #[test]
    fn test_return_unwinds_loops() {
        let source = r#"
            fun first() {
                for (var i = 0; i < 10; i = i + 1) {
                    if (i == 4) return i;
                }
                return -1;
            }
            print first();
        "#;

        assert_eq!(output_of(source), "4\n");
    }

    #[test]
    fn test_callable_display_forms() {
        assert_eq!(
            output_of("fun add(a, b) { return a + b; } print add; print clock; print fun () {};"),
            "<fn add>\n<native fn clock>\n<fn lambda>\n"
        );
    }

    #[test]
    fn test_clock_returns_seconds() {
        assert_eq!(output_of("print clock() > 1000000000;"), "true\n");
    }

    #[test]
    fn test_arity_mismatch() {
        let fault = fault_of("fun f(a) {} f(1, 2);");

        assert!(
            matches!(fault, RuntimeFault::Arity { expected: 1, got: 2, .. }),
            "{:?}",
            fault
        );
        assert!(fault.to_string().ends_with("Expected 1 arguments but got 2."));
    }

    #[test]
    fn test_calling_a_non_callable() {
        let fault = fault_of("\"str\"();");

        assert!(matches!(fault, RuntimeFault::Type { .. }));
        assert!(fault.to_string().ends_with("Can only call functions and classes."));
    }

    #[test]
    fn test_immediately_invoked_lambda() {
        assert_eq!(
            output_of("fun (name) { print \"Hello \" + name; }(\"Michael\");"),
            "Hello Michael\n"
        );
    }

    #[test]
    fn test_lambda_counter() {
        let source = r#"
            var counter = fun () {
                var n = 0;
                return fun () { n = n + 1; return n; };
            }();
            for (var i = 0; i < 9; i = i + 1) counter();
            print counter();
        "#;

        assert_eq!(output_of(source), "10\n");
    }

    #[test]
    fn test_lambda_as_argument() {
        let source = r#"
            fun twice(f, x) { return f(f(x)); }
            print twice(fun (v) { return v * 3; }, 2);
        "#;

        assert_eq!(output_of(source), "18\n");
    }

    // ── classes ─────────────────────────────────────────────────────────

    #[test]
    fn test_method_sets_field_through_this() {
        let source = r#"
            class C { method() { this.a = 10; } }
            var o = C();
            o.method();
            print o.a;
            print o;
            print C;
        "#;

        assert_eq!(output_of(source), "10\nC instance\n<class C>\n");
    }

    #[test]
    fn test_initializer_arguments_and_arity() {
        let source = r#"
            class P {
                init(x, y) { this.x = x; this.y = y; }
                sum() { return this.x + this.y; }
            }
            print P(1, 2).sum();
        "#;
        assert_eq!(output_of(source), "3\n");

        let fault = fault_of("class P { init(x, y) {} } P(1);");
        assert!(matches!(fault, RuntimeFault::Arity { expected: 2, got: 1, .. }));

        let fault = fault_of("class Q {} Q(1);");
        assert!(matches!(fault, RuntimeFault::Arity { expected: 0, got: 1, .. }));
    }

    #[test]
    fn test_initializer_always_yields_instance() {
        let source = r#"
            class A { init() { this.v = 1; return; } }
            var a = A();
            print a.init();
            print a.init() == a;
        "#;

        assert_eq!(output_of(source), "A instance\ntrue\n");
    }

    #[test]
    fn test_bound_method_remembers_receiver() {
        let source = r#"
            class A { init(v) { this.v = v; } get() { return this.v; } }
            var m = A(7).get;
            print m();
        "#;

        assert_eq!(output_of(source), "7\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = r#"
            class A { name() { return "method"; } }
            var a = A();
            a.name = "field";
            print a.name;
        "#;

        assert_eq!(output_of(source), "field\n");
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = r#"
            class A {
                greet() { return "A"; }
                hi() { print "hi from A"; }
            }
            class B < A {
                greet() { return "B+" + super.greet(); }
            }
            var b = B();
            print b.greet();
            b.hi();
        "#;

        assert_eq!(output_of(source), "B+A\nhi from A\n");
    }

    #[test]
    fn test_super_lookup_starts_at_superclass() {
        let source = r#"
            class A { m() { return "A.m"; } }
            class B < A { m() { return "B.m"; } test() { return super.m(); } }
            class C < B {}
            print C().test();
        "#;

        assert_eq!(output_of(source), "A.m\n");
    }

    #[test]
    fn test_inherited_initializer() {
        let source = r#"
            class A { init(n) { this.n = n; } }
            class B < A {}
            print B(4).n;
        "#;

        assert_eq!(output_of(source), "4\n");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let fault = fault_of("var NotClass = 1; class B < NotClass {}");

        assert!(matches!(fault, RuntimeFault::Type { .. }), "{:?}", fault);
    }

    #[test]
    fn test_undefined_property() {
        let fault = fault_of("class A {} print A().missing;");

        assert!(
            matches!(&fault, RuntimeFault::UndefinedField { name, .. } if name == "missing"),
            "{:?}",
            fault
        );
    }

    #[test]
    fn test_property_access_on_non_instance() {
        let fault = fault_of("var x = 1; print x.y;");
        assert!(fault.to_string().ends_with("Only instances have properties."));

        let fault = fault_of("var x = 1; x.y = 2;");
        assert!(fault.to_string().ends_with("Only instances have fields."));
    }

    // ── fault propagation ───────────────────────────────────────────────

    #[test]
    fn test_first_fault_halts_the_run() {
        let (out, report) = run("print 1; print nil + 1; print 2;");

        assert_eq!(out, "1\n");
        assert!(matches!(report.fault, Some(RuntimeFault::Cast { .. })));
    }

    #[test]
    fn test_fault_inside_call_restores_scope() {
        let source = r#"
            var a = "outer";
            fun boom() { var a = "inner"; return nil + 1; }
        "#;
        let (mut lox, out) = crate::common::lox_with(rox::LoxConfig::default());

        assert!(lox.run(source).is_ok());
        assert!(lox.run("boom();").fault.is_some());
        assert!(lox.run("print a;").is_ok());
        assert_eq!(out.text(), "outer\n");
    }

    // ── environment ─────────────────────────────────────────────────────

    #[test]
    fn test_environment_chain_lookup_and_assign() {
        let globals = Environment::new(false).shared();
        let a = Identifier::new("a", loc(1, 1));
        globals
            .borrow_mut()
            .define(&a, Value::Number(1.0))
            .expect("define");

        let inner = Environment::with_enclosing(Rc::clone(&globals)).shared();
        assert_eq!(inner.borrow().get(&a), Ok(Value::Number(1.0)));

        inner
            .borrow_mut()
            .assign(&a, Value::Number(2.0))
            .expect("assign");
        assert_eq!(globals.borrow().get(&a), Ok(Value::Number(2.0)));

        let missing = Identifier::new("missing", loc(2, 1));
        assert!(matches!(
            inner.borrow().get(&missing),
            Err(RuntimeFault::UndefinedVariable { .. })
        ));
        assert!(matches!(
            inner.borrow_mut().assign(&missing, Value::Nil),
            Err(RuntimeFault::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_environment_redefinition_toggle() {
        let a = Identifier::new("a", loc(1, 1));

        let mut strict = Environment::new(false);
        strict.define(&a, Value::Nil).expect("first define");
        assert!(matches!(
            strict.define(&a, Value::Nil),
            Err(RuntimeFault::Redefinition { .. })
        ));

        let mut relaxed = Environment::new(true);
        relaxed.define(&a, Value::Nil).expect("first define");
        relaxed
            .define(&a, Value::Bool(true))
            .expect("redefinition allowed");
        assert_eq!(relaxed.get(&a), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_environment_distance_access() {
        let root = Environment::new(false).shared();
        root.borrow_mut().insert("x", Value::from("root"));
        let middle = Environment::with_enclosing(Rc::clone(&root)).shared();
        let leaf = Environment::with_enclosing(Rc::clone(&middle)).shared();

        assert_eq!(
            Environment::get_at(&leaf, 2, "x", &loc(1, 1)),
            Ok(Value::from("root"))
        );

        Environment::assign_at(&leaf, 2, "x", Value::from("changed"), &loc(1, 1))
            .expect("assign_at");
        assert_eq!(
            Environment::get_at(&root, 0, "x", &loc(1, 1)),
            Ok(Value::from("changed"))
        );

        // wrong distance or missing ancestor is an internal inconsistency
        assert!(matches!(
            Environment::get_at(&leaf, 1, "x", &loc(1, 1)),
            Err(RuntimeFault::Internal { .. })
        ));
        assert!(matches!(
            Environment::get_at(&leaf, 5, "x", &loc(1, 1)),
            Err(RuntimeFault::Internal { .. })
        ));
    }

    // ── values ──────────────────────────────────────────────────────────

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
    }
}
