#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{Expr, Stmt};
    use rox::error::{LoxError, Warning};
    use rox::parser::parse;
    use rox::resolver::resolve;
    use rox::scanner::scan;

    fn parsed(source: &str) -> Vec<Stmt> {
        let (tokens, _) = scan(source, "test.lox");
        let (statements, errors) = parse(&tokens);

        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        statements.expect("statements")
    }

    fn check(source: &str) -> (Vec<LoxError>, Vec<Warning>) {
        resolve(&parsed(source), false)
    }

    fn error_messages(source: &str) -> Vec<String> {
        check(source)
            .0
            .iter()
            .map(|e| e.message().to_string())
            .collect()
    }

    #[test]
    fn test_clean_program_has_no_diagnostics() {
        let (errors, warnings) = check(
            "var a = 1; fun f(x) { var y = x + a; return y; } class C { m() { return this; } }",
        );

        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_local_depths_are_recorded_inline() {
        let statements = parsed("{ var a = 1; { print a; } }");
        let (errors, _) = resolve(&statements, false);
        assert!(errors.is_empty());

        let Stmt::Block { statements: outer, .. } = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Block { statements: inner, .. } = &outer[1] else {
            panic!("expected inner block");
        };
        let Stmt::Print {
            expr: Expr::Variable { depth, .. },
            ..
        } = &inner[0]
        else {
            panic!("expected print of a variable");
        };

        assert_eq!(depth.get(), Some(1));
    }

    #[test]
    fn test_globals_stay_unresolved() {
        let statements = parsed("var g = 1; print g;");
        resolve(&statements, false);

        let Stmt::Print {
            expr: Expr::Variable { depth, .. },
            ..
        } = &statements[1]
        else {
            panic!("expected print of a variable");
        };

        assert_eq!(depth.get(), None);
    }

    #[test]
    fn test_parameters_share_the_body_scope() {
        let statements = parsed("fun f(p) { print p; }");
        resolve(&statements, false);

        let Stmt::Function(decl) = &statements[0] else {
            panic!("expected function");
        };
        let Stmt::Print {
            expr: Expr::Variable { depth, .. },
            ..
        } = &decl.body[0]
        else {
            panic!("expected print of a variable");
        };

        assert_eq!(depth.get(), Some(0));
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            error_messages("{ var a = 1; { var a = a; } }"),
            vec!["Cannot read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_duplicate_local() {
        assert_eq!(
            error_messages("{ var a = 1; var a = 2; print a; }"),
            vec!["Variable with this name already declared in this scope."]
        );
    }

    #[test]
    fn test_duplicate_parameter() {
        assert_eq!(
            error_messages("fun f(a, a) {}"),
            vec!["Variable with this name already declared in this scope."]
        );
    }

    #[test]
    fn test_duplicate_global_depends_on_redefinition() {
        let statements = parsed("var a = 1;\nvar a = 2;");

        let (errors, _) = resolve(&statements, false);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location().line, 2);
        assert_eq!(
            errors[0].message(),
            "Variable 'a' is already declared at test.lox:1:5."
        );

        let (errors, _) = resolve(&statements, true);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_top_level_return() {
        assert_eq!(
            error_messages("return 1;"),
            vec!["Cannot return from top-level code."]
        );
    }

    #[test]
    fn test_value_return_in_initializer() {
        assert_eq!(
            error_messages("class A { init() { return 1; } }"),
            vec!["Cannot return a value from an initializer."]
        );

        // a bare return is fine
        assert!(error_messages("class A { init() { return; } }").is_empty());
    }

    #[test]
    fn test_this_outside_class() {
        assert_eq!(
            error_messages("print this;"),
            vec!["Cannot use 'this' outside of a class."]
        );
        assert_eq!(
            error_messages("fun f() { return this; }"),
            vec!["Cannot use 'this' outside of a class."]
        );
    }

    #[test]
    fn test_super_misuse() {
        assert_eq!(
            error_messages("fun f() { super.m(); }"),
            vec!["Cannot use 'super' outside of a class."]
        );
        assert_eq!(
            error_messages("class A { m() { super.m(); } }"),
            vec!["Cannot use 'super' in a class with no superclass."]
        );
        assert!(error_messages("class A {} class B < A { m() { super.m(); } }").is_empty());
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_eq!(
            error_messages("class Oops < Oops {}"),
            vec!["A class cannot inherit from itself."]
        );
    }

    #[test]
    fn test_errors_are_collected_not_fail_fast() {
        let (errors, _) = check("return 1;\nprint this;\nclass X < X {}");

        assert_eq!(errors.len(), 3);
        let lines: Vec<usize> = errors.iter().map(|e| e.location().line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_unused_local_warning() {
        let (errors, warnings) = check("fun f(unused_param) { var used = 1; var idle = 2; print used; }");

        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Local variable 'idle' is never read.");
        assert_eq!(
            warnings[0].to_string(),
            "test.lox:1:41: Warning: Local variable 'idle' is never read."
        );
    }

    #[test]
    fn test_unused_warnings_are_ordered_by_position() {
        let (_, warnings) = check("{\n var b = 1;\n var a = 2;\n}");

        let lines: Vec<usize> = warnings.iter().map(|w| w.location.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }
}
