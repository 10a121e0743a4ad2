#[cfg(test)]
mod parser_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{Expr, Stmt};
    use rox::ast_printer::AstPrinter;
    use rox::error::LoxError;
    use rox::parser::{parse, parse_expression};
    use rox::scanner::scan;

    fn expr(source: &str) -> Expr {
        let (tokens, errors) = scan(source, "test.lox");
        assert!(errors.is_empty(), "scan errors: {:?}", errors);

        parse_expression(&tokens).unwrap_or_else(|e| panic!("parse failed: {}", e))
    }

    fn print_expr(source: &str) -> String {
        AstPrinter::print(&expr(source))
    }

    fn expr_error(source: &str) -> LoxError {
        let (tokens, _) = scan(source, "test.lox");

        match parse_expression(&tokens) {
            Ok(e) => panic!("expected an error, parsed {}", AstPrinter::print(&e)),
            Err(e) => e,
        }
    }

    fn program(source: &str) -> Vec<Stmt> {
        let (tokens, _) = scan(source, "test.lox");
        let (statements, errors) = parse(&tokens);

        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        statements.expect("statements")
    }

    fn print_program(source: &str) -> Vec<String> {
        program(source).iter().map(AstPrinter::print_stmt).collect()
    }

    #[test]
    fn test_factor_binds_tighter_than_term() {
        assert_eq!(print_expr("1 + 3 * 4"), "(+ 1 (* 3 4))");
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        assert_eq!(print_expr("(2 + 3) * 4"), "(* (group (+ 2 3)) 4)");
    }

    #[test]
    fn test_binary_levels_are_left_associative() {
        assert_eq!(print_expr("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(print_expr("8 / 4 / 2"), "(/ (/ 8 4) 2)");
    }

    #[test]
    fn test_unary_is_right_associative() {
        assert_eq!(print_expr("!!true"), "(! (! true))");
        assert_eq!(print_expr("-1 - -2"), "(- (- 1) (- 2))");
    }

    #[test]
    fn test_comparison_below_equality() {
        assert_eq!(print_expr("1 < 2 == true"), "(== (< 1 2) true)");
        assert_eq!(print_expr("1 >= 2 != nil"), "(!= (>= 1 2) nil)");
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(print_expr("a or b and c"), "(or a (and b c))");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(print_expr("a = b = 1"), "(= a (= b 1))");
    }

    #[test]
    fn test_sequence_is_lowest() {
        assert_eq!(print_expr("a = 1, b = 2, 3"), "(sequence (= a 1) (= b 2) 3)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(print_expr("2.5"), "2.5");
        assert_eq!(print_expr("10"), "10");
        assert_eq!(print_expr("\"text\""), "text");
        assert_eq!(print_expr("nil"), "nil");
    }

    #[test]
    fn test_call_and_property_chain() {
        assert_eq!(
            print_expr("obj.method(1, 2).field"),
            "(. (call (. obj method) 1 2) field)"
        );
    }

    #[test]
    fn test_call_arguments_are_not_sequences() {
        assert_eq!(print_expr("f(a, (b, c))"), "(call f a (group (sequence b c)))");
    }

    #[test]
    fn test_property_assignment_becomes_set() {
        assert_eq!(print_expr("obj.x = 5"), "(= (. obj x) 5)");
    }

    #[test]
    fn test_this_and_super() {
        assert_eq!(print_expr("this.x"), "(. this x)");
        assert_eq!(print_expr("super.greet()"), "(call (super greet))");
    }

    #[test]
    fn test_lambda_literal() {
        assert_eq!(
            print_expr("fun (a, b) { return a; }"),
            "(lambda (a b) (return a))"
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = expr_error("1 = 2");

        assert!(matches!(err, LoxError::Parse { .. }));
        assert_eq!(err.message(), "at '=': Invalid assignment target.");
    }

    #[test]
    fn test_missing_operand_at_end() {
        assert_eq!(expr_error("1 +").message(), "at end: Expected expression.");
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        assert_eq!(
            expr_error("1 2").message(),
            "at '2': Expected end of expression."
        );
    }

    #[test]
    fn test_for_loop_is_desugared() {
        assert_eq!(
            print_program("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"]
        );
    }

    #[test]
    fn test_for_without_clauses_loops_forever() {
        assert_eq!(
            print_program("for (;;) break;"),
            vec!["(while true (break))"]
        );
    }

    #[test]
    fn test_class_with_superclass() {
        assert_eq!(
            print_program("class B < A { init(x) { this.x = x; } }"),
            vec!["(class B < A (method init (x) (; (= (. this x) x))))"]
        );
    }

    #[test]
    fn test_function_declaration_and_if_else() {
        assert_eq!(
            print_program("fun f(n) { if (n) return 1; else return 2; }"),
            vec!["(fun f (n) (if n (return 1) (return 2)))"]
        );
    }

    #[test]
    fn test_immediately_invoked_lambda_statement() {
        let statements = program("fun (name) { print \"Hello \" + name; }(\"Michael\");");

        assert_eq!(statements.len(), 1);
        assert!(matches!(
            &statements[0],
            Stmt::Expression(Expr::Call { callee, .. }) if matches!(**callee, Expr::Lambda(_))
        ));
        assert_eq!(
            AstPrinter::print_stmt(&statements[0]),
            "(; (call (lambda (name) (print (+ Hello  name))) Michael))"
        );
    }

    #[test]
    fn test_recovery_reports_every_bad_declaration() {
        let (tokens, _) = scan("var = 1;\nprint ;\nvar ok = 2;\n", "test.lox");
        let (statements, errors) = parse(&tokens);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].location().line, 1);
        assert_eq!(errors[0].message(), "at '=': Expected variable name.");
        assert_eq!(errors[1].location().line, 2);
        assert_eq!(errors[1].message(), "at ';': Expected expression.");

        let recovered: Vec<String> = statements
            .expect("the last declaration survives")
            .iter()
            .map(AstPrinter::print_stmt)
            .collect();
        assert_eq!(recovered, vec!["(var ok 2)"]);
    }

    #[test]
    fn test_nothing_recovered_yields_no_program() {
        let (tokens, _) = scan("print ;\nvar = 1;", "test.lox");
        let (statements, errors) = parse(&tokens);

        assert!(statements.is_none());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_error_display_carries_location() {
        let err = expr_error("(1");

        assert_eq!(
            err.to_string(),
            "test.lox:1:3: Error: at end: Expected ')' after expression."
        );
    }

    #[test]
    fn test_empty_program() {
        assert!(program("").is_empty());
        assert!(program("// nothing here").is_empty());
    }
}
