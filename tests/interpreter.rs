#[cfg(test)]
mod interpreter_tests {
    use lox::error::{LoxError, EXIT_RUNTIME};
    use lox::interpreter::{Interpreter, MAX_CALL_DEPTH};
    use lox::resolver::Resolver;
    use lox::session::{parse_program, Session};

    fn run(source: &str) -> (String, Result<(), LoxError>) {
        let mut session = Session::with_output(Vec::new());
        let result = session.run(source);
        let output = String::from_utf8(session.into_output()).expect("utf-8 output");
        (output, result)
    }

    /// Deep Lox recursion needs more native stack than the default test thread.
    fn with_large_stack<T, F>(f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(f)
            .expect("spawn test thread")
            .join()
            .expect("test thread panicked")
    }

    fn output_of(source: &str) -> String {
        let (output, result) = run(source);
        if let Err(e) = result {
            panic!("unexpected error: {}\noutput so far: {:?}", e, output);
        }
        output
    }

    fn runtime_error_of(source: &str) -> String {
        let (_, result) = run(source);
        let err = result.expect_err("expected a runtime error");
        assert_eq!(err.exit_code(), EXIT_RUNTIME);
        err.to_string()
    }

    #[test]
    fn test_arithmetic_follows_ieee() {
        assert_eq!(
            output_of(
                "print 1 + 2 * 3;\n\
                 print 10 / 4;\n\
                 print 1 / 0;\n\
                 print -1 / 0;\n\
                 print 0 / 0 == 0 / 0;\n\
                 print -0;\n\
                 print 0.1 + 0.2;"
            ),
            "7\n2.5\nInfinity\n-Infinity\nfalse\n-0\n0.30000000000000004\n"
        );
    }

    #[test]
    fn test_equality_and_truthiness() {
        assert_eq!(
            output_of(
                "print nil == false;\n\
                 print 1 == 1;\n\
                 print \"a\" == \"a\";\n\
                 print nil == nil;\n\
                 print 1 != \"1\";\n\
                 print !0;\n\
                 if (0) print \"zero\";\n\
                 if (\"\") print \"empty\";\n\
                 if (nil) print \"nil\"; else print \"else\";"
            ),
            "false\ntrue\ntrue\ntrue\ntrue\nfalse\nzero\nempty\nelse\n"
        );
    }

    #[test]
    fn test_logical_operators_short_circuit_and_return_operands() {
        assert_eq!(
            output_of("print nil or \"default\";\nprint false and boom;\nprint 1 and 2;"),
            "default\nfalse\n2\n"
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(output_of("var s = \"lo\"; print \"hel\" + s + \"x\";"), "hellox\n");
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(
            runtime_error_of("print 1 + \"a\";"),
            "Operands must be two numbers or two strings.\n[line 1]"
        );
        assert_eq!(
            runtime_error_of("print -\"x\";"),
            "Operand must be a number.\n[line 1]"
        );
        assert_eq!(
            runtime_error_of("print \"a\" <\n\"b\";"),
            "Operands must be numbers.\n[line 1]"
        );
    }

    #[test]
    fn test_runtime_error_keeps_earlier_output() {
        let (output, result) = run("print 1;\nprint nope;\nprint 3;");

        assert_eq!(output, "1\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Undefined variable 'nope'.\n[line 2]"
        );
    }

    #[test]
    fn test_assigning_an_undeclared_global_fails() {
        assert_eq!(
            runtime_error_of("missing = 1;"),
            "Undefined variable 'missing'.\n[line 1]"
        );
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            output_of(
                "for (var i = 0; i < 3; i = i + 1) print i;\n\
                 var n = 0; while (n < 2) { n = n + 1; print n; }"
            ),
            "0\n1\n2\n1\n2\n"
        );
    }

    #[test]
    fn test_recursion() {
        let source = "fun fib(n) {\n  if (n < 2) return n;\n  return fib(n - 1) + fib(n - 2);\n}\nprint fib(20);";

        assert_eq!(output_of(source), "6765\n");
    }

    #[test]
    fn test_return_unwinds_out_of_loops() {
        let source = r#"
            fun first(limit) {
              for (var i = 0; i < limit; i = i + 1) {
                while (true) {
                  if (i == 3) return i;
                  i = i + 1;
                }
              }
              return "none";
            }
            print first(10);
            print first(0);
        "#;

        assert_eq!(output_of(source), "3\nnone\n");
    }

    #[test]
    fn test_closures_keep_independent_state() {
        let source = r#"
            fun makeCounter() {
              var i = 0;
              fun count() {
                i = i + 1;
                return i;
              }
              return count;
            }

            var a = makeCounter();
            var b = makeCounter();
            print a();
            print a();
            print b();
        "#;

        assert_eq!(output_of(source), "1\n2\n1\n");
    }

    #[test]
    fn test_callable_values_print() {
        assert_eq!(
            output_of("fun f() {}\nprint f;\nprint clock;\nprint f();"),
            "<fn f>\n<native fn>\nnil\n"
        );
    }

    #[test]
    fn test_call_errors() {
        assert_eq!(
            runtime_error_of("fun f(a, b) {}\nf(1);"),
            "Expected 2 arguments but got 1.\n[line 2]"
        );
        assert_eq!(
            runtime_error_of("class A {}\nA(1);"),
            "Expected 0 arguments but got 1.\n[line 2]"
        );
        assert_eq!(
            runtime_error_of("\"str\"();"),
            "Can only call functions and classes.\n[line 1]"
        );
    }

    #[test]
    fn test_class_arity_comes_from_init() {
        assert_eq!(
            runtime_error_of("class A { init(a, b) {} }\nA(1);"),
            "Expected 2 arguments but got 1.\n[line 2]"
        );
        assert_eq!(
            runtime_error_of("class A { init(a) {} }\nclass B < A {}\nB();"),
            "Expected 1 arguments but got 0.\n[line 3]"
        );
        assert_eq!(
            output_of("class A { init(a) { this.a = a; } }\nclass B < A {}\nprint B(7).a;"),
            "7\n"
        );
    }

    #[test]
    fn test_unbounded_recursion_is_a_runtime_error() {
        let (message, code) = with_large_stack(|| {
            let (_, result) = run("fun f(n) { return f(n + 1); }\nf(0);");
            let err = result.expect_err("expected a stack overflow");
            (err.to_string(), err.exit_code())
        });

        assert_eq!(message, "Stack overflow.\n[line 1]");
        assert_eq!(code, EXIT_RUNTIME);
    }

    #[test]
    fn test_session_survives_stack_overflow() {
        let output = with_large_stack(|| {
            let mut session = Session::with_output(Vec::new());

            assert!(session.run("fun f() { f(); }\nf();").is_err());

            // down(n) nests n + 1 calls.
            let source = format!(
                "fun down(n) {{ if (n == 0) return \"bottom\"; return down(n - 1); }}\nprint down({});",
                MAX_CALL_DEPTH - 1
            );
            session.run(&source).expect("recursion below the limit succeeds");

            String::from_utf8(session.into_output()).expect("utf-8 output")
        });

        assert_eq!(output, "bottom\n");
    }

    #[test]
    fn test_classes_fields_and_methods() {
        let source = r#"
            class Point {
              init(x, y) {
                this.x = x;
                this.y = y;
              }

              sum() { return this.x + this.y; }
            }

            var p = Point(1, 2);
            print p.sum();
            print p;
            print Point;

            var m = p.sum;
            p.x = 10;
            print m();
        "#;

        assert_eq!(output_of(source), "3\nPoint instance\nPoint\n12\n");
    }

    #[test]
    fn test_initializer_always_returns_the_instance() {
        let source = r#"
            class A {
              init() {
                this.v = 1;
                return;
              }
            }

            var a = A();
            print a.init() == a;
            print a.v;
        "#;

        assert_eq!(output_of(source), "true\n1\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = "class A { m() { return \"method\"; } }\nvar a = A();\nprint a.m();\na.m = \"field\";\nprint a.m;";

        assert_eq!(output_of(source), "method\nfield\n");
    }

    #[test]
    fn test_property_errors() {
        assert_eq!(
            runtime_error_of("class A {}\nA().missing;"),
            "Undefined property 'missing'.\n[line 2]"
        );
        assert_eq!(
            runtime_error_of("var s = \"s\";\nprint s.len;"),
            "Only instances have properties.\n[line 2]"
        );
        assert_eq!(
            runtime_error_of("var n = 1;\nn.x = 2;"),
            "Only instances have fields.\n[line 2]"
        );
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = r#"
            class A {
              say() { print "A"; }
              who() { return this.name; }
            }

            class B < A {
              test() { super.say(); }
              say() { print "B"; }
            }

            class C < B {
              say() { print "C"; }
            }

            var c = C();
            c.name = "c";
            c.test();
            c.say();
            print c.who();
        "#;

        assert_eq!(output_of(source), "A\nC\nc\n");
    }

    #[test]
    fn test_super_initializer_chain() {
        let source = r#"
            class Base {
              init(n) { this.n = n; }
            }

            class Derived < Base {
              init(n) {
                super.init(n * 2);
                this.extra = true;
              }
            }

            var d = Derived(4);
            print d.n;
            print d.extra;
        "#;

        assert_eq!(output_of(source), "8\ntrue\n");
    }

    #[test]
    fn test_local_class_sees_enclosing_locals() {
        let source = r#"
            {
              var greeting = "hi";
              class Greeter {
                greet() { return greeting + " from " + Greeter().name(); }
                name() { return "greeter"; }
              }
              print Greeter().greet();
            }
        "#;

        assert_eq!(output_of(source), "hi from greeter\n");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        assert_eq!(
            runtime_error_of("var NotClass = 1;\nclass A < NotClass {}"),
            "Superclass must be a class.\n[line 2]"
        );
    }

    #[test]
    fn test_session_recovers_after_runtime_error() {
        let mut session = Session::with_output(Vec::new());

        assert!(session.run("{ var x = 1; print x; print nothing; }").is_err());
        session.run("var y = 2;\nprint y;").expect("top-level declarations still work");

        assert!(session.interpreter().globals().names().any(|name| name == "y"));

        let output = String::from_utf8(session.into_output()).expect("utf-8 output");
        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn test_interpreter_runs_resolved_programs() {
        let program = parse_program("var greeting = \"hello\";\nprint greeting;").expect("parses");
        Resolver::new().resolve(&program).expect("resolves");

        let mut interpreter = Interpreter::with_output(Vec::new());
        interpreter.interpret(&program).expect("runs");

        assert_eq!(interpreter.output().as_slice(), b"hello\n");
    }
}
