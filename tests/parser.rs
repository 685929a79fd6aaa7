#[cfg(test)]
mod parser_tests {
    use lox::ast::{Binding, Expr, Stmt};
    use lox::ast_printer::AstPrinter;
    use lox::error::LoxError;
    use lox::parser::MAX_NESTING;
    use lox::session::parse_program;

    fn print_program(source: &str) -> Vec<String> {
        let program = parse_program(source).expect("program should parse");
        program.iter().map(AstPrinter::print_stmt).collect()
    }

    fn errors_of(source: &str) -> Vec<String> {
        match parse_program(source) {
            Ok(_) => panic!("expected syntax errors in {:?}", source),
            Err(e) => e.into_diagnostics().iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_precedence_climb() {
        assert_eq!(
            print_program("1 + 2 * 3 - -4 / 5;"),
            vec!["(; (- (+ 1.0 (* 2.0 3.0)) (/ (- 4.0) 5.0)))"]
        );
        assert_eq!(
            print_program("!a == b < c or d and e;"),
            vec!["(; (or (== (! a) (< b c)) (and d e)))"]
        );
    }

    #[test]
    fn test_binary_levels_are_left_associative() {
        assert_eq!(print_program("1 - 2 - 3;"), vec!["(; (- (- 1.0 2.0) 3.0))"]);
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(print_program("a = b = c;"), vec!["(; (= a (= b c)))"]);
        assert_eq!(
            print_program("point.x = 1;"),
            vec!["(; (= (. point x) 1.0))"]
        );
    }

    #[test]
    fn test_calls_and_property_access_chain() {
        assert_eq!(
            print_program("a.b(1, \"two\").c();"),
            vec!["(; (call (. (call (. a b) 1.0 two) c)))"]
        );
    }

    #[test]
    fn test_for_loop_desugars_to_while() {
        assert_eq!(
            print_program("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"]
        );
        assert_eq!(
            print_program("for (;;) print 1;"),
            vec!["(while true (print 1.0))"]
        );
    }

    #[test]
    fn test_declarations() {
        assert_eq!(
            print_program(
                "class B < A { init(x) { this.x = x; } m() { return super.m(); } }\n\
                 fun f(a, b) { if (a) return; else { var c; } }"
            ),
            vec![
                "(class B < A (fun init (x) (; (= (. this x) x))) (fun m () (return (call (super m)))))",
                "(fun f (a b) (if a (return) (block (var c))))",
            ]
        );
    }

    #[test]
    fn test_variables_start_unresolved() {
        let program = parse_program("print a;").expect("program should parse");

        match &program[0] {
            Stmt::Print(Expr::Variable { binding, .. }) => {
                assert_eq!(binding.get(), Binding::Global)
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            errors_of("1 = 2;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        assert_eq!(
            errors_of("a + b = c;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn test_two_independent_errors_reported_in_one_pass() {
        let errors = errors_of("var = 1;\nprint 1;\nvar x = ;\nprint 2;");

        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 3] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn test_error_inside_block_recovers_at_statement_boundary() {
        let errors = errors_of("{\n  print ;\n  print 1;\n}\nprint (;");

        assert_eq!(
            errors,
            vec![
                "[line 2] Error at ';': Expect expression.",
                "[line 5] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn test_error_at_end_of_input() {
        assert_eq!(
            errors_of("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn test_lexical_and_syntax_errors_are_reported_together() {
        assert_eq!(
            errors_of("print @;"),
            vec![
                "[line 1] Error: Unexpected character: @",
                "[line 1] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn test_argument_cap() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let errors = errors_of(&source);
        assert_eq!(
            errors,
            vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
        );

        let ok: Vec<String> = (0..255).map(|i| i.to_string()).collect();
        assert!(parse_program(&format!("f({});", ok.join(", "))).is_ok());
    }

    #[test]
    fn test_parameter_cap() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        assert_eq!(
            errors_of(&source),
            vec!["[line 1] Error at 'p255': Can't have more than 255 parameters."]
        );
    }

    #[test]
    fn test_nesting_depth_is_capped() {
        let too_deep = MAX_NESTING + 100;
        let source = format!("print {}1{};\nprint 2;", "(".repeat(too_deep), ")".repeat(too_deep));

        let errors = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(move || errors_of(&source))
            .expect("spawn test thread")
            .join()
            .expect("test thread panicked");

        assert_eq!(errors, vec!["[line 1] Error at '(': Too much nesting."]);

        let shallow = format!("print {}1{};", "(".repeat(50), ")".repeat(50));
        assert!(parse_program(&shallow).is_ok());
    }

    #[test]
    fn test_static_errors_exit_with_65() {
        let err: LoxError = parse_program("var;").unwrap_err();
        assert_eq!(err.exit_code(), 65);
        assert_eq!(err.count(), 1);
    }
}
