#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::compile;
    use crate::error::CompileError;
    use crate::eval::{self, EvalError, Evaluator};
    use crate::lexer::{self, TokenKind};
    use crate::parse;
    use std::io::Cursor;
    use yap_bytecode::Type;
    use yap_vm::{Vm, VmError};

    fn run_vm(source: &str) -> Vec<String> {
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(std::io::empty()));
        vm.run().expect("runtime error");
        vm.into_output()
    }

    fn run_eval(source: &str) -> Vec<String> {
        let program = parse(source).expect("parse failed");
        let mut ev = Evaluator::with_input(Box::new(std::io::empty()));
        ev.run(&program).expect("eval error");
        ev.into_output()
    }

    // Both execution paths must print the same lines for any
    // input-free program.
    fn run_source(source: &str) -> Vec<String> {
        let vm_out = run_vm(source);
        let eval_out = run_eval(source);
        assert_eq!(vm_out, eval_out, "vm and evaluator disagree");
        vm_out
    }

    // --- Lexer ---

    #[test]
    fn test_lex_keywords_and_sentinels() {
        let tokens = lexer::lex("def yeet yap spill nocap cap").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Def,
                TokenKind::Yeet,
                TokenKind::Yap,
                TokenKind::Spill,
                TokenKind::Nocap,
                TokenKind::Cap,
            ]
        );
    }

    #[test]
    fn test_lex_comment_skipped() {
        let tokens = lexer::lex("1 # the rest is noise\n2").unwrap();
        let ints: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::IntLit(_)))
            .collect();
        assert_eq!(ints.len(), 2);
    }

    #[test]
    fn test_lex_tilde_operators() {
        let tokens = lexer::lex("~~ ~ //").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::TildeTilde, TokenKind::Tilde, TokenKind::SlashSlash]
        );
    }

    #[test]
    fn test_lex_string_literal() {
        let tokens = lexer::lex(r#""hello world""#).unwrap();
        assert!(tokens
            .iter()
            .any(|t| matches!(&t.kind, TokenKind::StringLit(s) if s == "hello world")));
    }

    #[test]
    fn test_lex_tracks_lines() {
        let tokens = lexer::lex("1\n\n2").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_lex_error_reports_line() {
        match lexer::lex("1\n@") {
            Err(CompileError::Lexer { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected lexer error, got {other:?}"),
        }
    }

    // --- Parser ---

    #[test]
    fn test_parse_declaration() {
        let program = parse("int x = 5;").unwrap();
        match &program.stmts[0] {
            Stmt::Declaration { ty, name, value } => {
                assert_eq!(*ty, Type::Int);
                assert_eq!(name, "x");
                assert!(matches!(value, Some(Expr::Int(5))));
            }
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_function() {
        let program = parse("def add(int a, int b) -> int { yeet a + b; }").unwrap();
        match &program.stmts[0] {
            Stmt::Function(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.ret, Type::Int);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_yeet_without_semicolon() {
        let program = parse("def f() -> int { yeet 1 }").unwrap();
        match &program.stmts[0] {
            Stmt::Function(f) => {
                assert!(matches!(f.body[0], Stmt::Return(Some(Expr::Int(1)))));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unary_tilde_desugars_to_mul() {
        let program = parse("int x = ~5;").unwrap();
        match &program.stmts[0] {
            Stmt::Declaration { value: Some(Expr::Binary { op, left, .. }), .. } => {
                assert_eq!(*op, BinOp::Mul);
                assert!(matches!(**left, Expr::Int(-1)));
            }
            other => panic!("expected desugared multiply, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_struct_def() {
        let program = parse("struct Point { int x; int y; }").unwrap();
        match &program.stmts[0] {
            Stmt::StructDef { name, fields } => {
                assert_eq!(name, "Point");
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected struct def, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_semicolon() {
        assert!(matches!(
            parse("int x = 5"),
            Err(CompileError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_missing_paren() {
        assert!(matches!(
            parse("yap(1;"),
            Err(CompileError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_invalid_assignment_target() {
        assert!(matches!(
            parse("1 + 2 = 3;"),
            Err(CompileError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_unknown_method() {
        assert!(parse("int x = [1].reverse();").is_err());
    }

    // --- Typechecker ---

    #[test]
    fn test_typeck_condition_must_be_bool() {
        assert!(matches!(
            compile("if (1 + 1) { yap(1); }"),
            Err(CompileError::Type(_))
        ));
    }

    #[test]
    fn test_typeck_undefined_variable() {
        assert!(matches!(
            compile("yap(ghost);"),
            Err(CompileError::Name(_))
        ));
    }

    #[test]
    fn test_typeck_arity_mismatch() {
        let source = "def f(int a) -> int { yeet a; } yap(f(1, 2));";
        assert!(compile(source).is_err());
    }

    #[test]
    fn test_typeck_string_plus_int_rejected() {
        assert!(matches!(
            compile(r#"yap("a" + 1);"#),
            Err(CompileError::Type(_))
        ));
    }

    #[test]
    fn test_typeck_break_outside_loop() {
        assert!(compile("break;").is_err());
    }

    // --- Codegen ---

    #[test]
    fn test_codegen_registers_function() {
        let program = compile("def one() -> int { yeet 1; }").unwrap();
        let sig = program.functions.get("one").expect("missing signature");
        assert_eq!(sig.entry, "one");
        assert!(sig.params.is_empty());
        assert_eq!(sig.ret, Type::Int);
        assert!(program.disassemble().contains("one:"));
    }

    // --- Language semantics, both execution paths ---

    #[test]
    fn test_print_joins_without_separator() {
        assert_eq!(run_source(r#"yap(1, " and ", 2);"#), vec!["1 and 2"]);
    }

    #[test]
    fn test_exponent_binds_tighter_than_add() {
        assert_eq!(run_source("yap(2 + 3 ^ 2);"), vec!["11"]);
    }

    #[test]
    fn test_exponent_right_associative() {
        assert_eq!(run_source("yap(2 ^ 3 ^ 2);"), vec!["512"]);
    }

    #[test]
    fn test_division_results() {
        assert_eq!(run_source("yap(10 / 2);"), vec!["5"]);
        assert_eq!(run_source("yap(10 / 4);"), vec!["2.5"]);
        assert_eq!(run_source("yap(~7 // 2);"), vec!["~4"]);
        assert_eq!(run_source("yap(~7 % 2);"), vec!["1"]);
    }

    #[test]
    fn test_float_keeps_fractional_part() {
        assert_eq!(run_source("yap(4 / 2.0);"), vec!["2.0"]);
    }

    #[test]
    fn test_truth_sentinels() {
        assert_eq!(run_source("yap(nocap and cap);"), vec!["cap"]);
        assert_eq!(run_source("yap(nocap or cap);"), vec!["nocap"]);
        assert_eq!(run_source("yap(not cap);"), vec!["nocap"]);
        assert_eq!(run_source("yap(1 < 2);"), vec!["nocap"]);
    }

    #[test]
    fn test_string_comparison_lexicographic() {
        assert_eq!(run_source(r#"yap("apple" < "banana");"#), vec!["nocap"]);
    }

    #[test]
    fn test_short_circuit_and_skips_right() {
        let source = r#"
def loud() -> bool {
    yap("called");
    yeet nocap;
}
yap(cap and loud());
"#;
        assert_eq!(run_source(source), vec!["cap"]);
    }

    #[test]
    fn test_short_circuit_or_skips_right() {
        let source = r#"
def loud() -> bool {
    yap("called");
    yeet cap;
}
yap(nocap or loud());
"#;
        assert_eq!(run_source(source), vec!["nocap"]);
    }

    #[test]
    fn test_unary_tilde_negates() {
        assert_eq!(run_source("yap(~5);"), vec!["~5"]);
        assert_eq!(run_source("int a = 3; yap(~a + 1);"), vec!["~2"]);
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(run_source("yap(6 & 3);"), vec!["2"]);
        assert_eq!(run_source("yap(6 | 3);"), vec!["7"]);
        assert_eq!(run_source("yap(~~0);"), vec!["~1"]);
    }

    #[test]
    fn test_if_elif_else() {
        let source = r#"
int n = 5;
if (n < 0) {
    yap("neg");
} elif (n == 0) {
    yap("zero");
} else {
    yap("pos");
}
"#;
        assert_eq!(run_source(source), vec!["pos"]);
    }

    #[test]
    fn test_while_loop() {
        let source = r#"
int total = 0;
int i = 1;
while (i <= 4) {
    total = total + i;
    i = i + 1;
}
yap(total);
"#;
        assert_eq!(run_source(source), vec!["10"]);
    }

    #[test]
    fn test_for_loop() {
        let source = "for (int i = 0; i < 3; i = i + 1) { yap(i); }";
        assert_eq!(run_source(source), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_break_stops_loop() {
        let source = r#"
for (int i = 0; i < 10; i = i + 1) {
    if (i == 2) {
        break;
    }
    yap(i);
}
"#;
        assert_eq!(run_source(source), vec!["0", "1"]);
    }

    #[test]
    fn test_continue_still_steps() {
        let source = r#"
for (int i = 0; i < 4; i = i + 1) {
    if (i % 2 == 0) {
        continue;
    }
    yap(i);
}
"#;
        assert_eq!(run_source(source), vec!["1", "3"]);
    }

    #[test]
    fn test_nested_loop_break_targets_innermost() {
        let source = r#"
for (int i = 0; i < 2; i = i + 1) {
    for (int j = 0; j < 10; j = j + 1) {
        if (j == 1) {
            break;
        }
        yap(i, ":", j);
    }
}
"#;
        assert_eq!(run_source(source), vec!["0:0", "1:0"]);
    }

    #[test]
    fn test_array_lifecycle() {
        let source = r#"
int[] a = [1, 2, 3];
a.append(4);
a[1] = 10;
a.delete(0);
yap(a);
yap(a.len());
"#;
        assert_eq!(run_source(source), vec!["[10, 3, 4]", "3"]);
    }

    #[test]
    fn test_array_alias_shares_storage() {
        let source = r#"
int[] a = [1, 2];
int[] b = a;
b[0] = 9;
yap(a);
"#;
        assert_eq!(run_source(source), vec!["[9, 2]"]);
    }

    #[test]
    fn test_block_declaration_persists_in_frame() {
        // Declarations inside a block live for the rest of the frame,
        // matching the flat slot model: the inner `x` wins
        let source = r#"
int x = 1;
if (nocap) {
    int x = 2;
}
yap(x);
"#;
        assert_eq!(run_source(source), vec!["2"]);
    }

    #[test]
    fn test_loop_body_declaration_each_iteration() {
        let source = r#"
for (int i = 0; i < 3; i = i + 1) {
    int y = i * 10;
    yap(y);
}
"#;
        assert_eq!(run_source(source), vec!["0", "10", "20"]);
    }

    #[test]
    fn test_large_int_equality_stays_exact() {
        let source = "yap(9007199254740993 == 9007199254740992);";
        assert_eq!(run_source(source), vec!["cap"]);
    }

    #[test]
    fn test_array_passed_to_function_mutates_in_place() {
        let source = r#"
def bump(int[] xs) -> void {
    xs[0] = 100;
}
int[] a = [1, 2];
bump(a);
yap(a);
"#;
        assert_eq!(run_source(source), vec!["[100, 2]"]);
    }

    #[test]
    fn test_string_index() {
        assert_eq!(run_source(r#"string s = "yap"; yap(s[1]);"#), vec!["a"]);
    }

    #[test]
    fn test_stack_is_lifo() {
        let source = r#"
stack<int> s;
s.push(1);
s.push(2);
yap(s.pop());
yap(s.pop());
"#;
        assert_eq!(run_source(source), vec!["2", "1"]);
    }

    #[test]
    fn test_queue_is_fifo() {
        let source = r#"
queue<int> q;
q.push(1);
q.push(2);
yap(q.pop());
yap(q.pop());
"#;
        assert_eq!(run_source(source), vec!["1", "2"]);
    }

    #[test]
    fn test_hashmap_operations() {
        let source = r#"
hashmap<string, int> m;
m["a"] = 1;
m["b"] = 2;
yap(m);
yap(m["a"]);
m.delete("a");
yap(m.len());
"#;
        assert_eq!(run_source(source), vec!["{a: 1, b: 2}", "1", "1"]);
    }

    #[test]
    fn test_fibonacci() {
        let source = r#"
def fib(int n) -> int {
    if (n < 2) {
        yeet n;
    }
    yeet fib(n - 1) + fib(n - 2);
}
yap(fib(8));
"#;
        assert_eq!(run_source(source), vec!["21"]);
    }

    #[test]
    fn test_nested_function_definition() {
        let source = r#"
def twice(int n) -> int {
    def double(int k) -> int {
        yeet k * 2;
    }
    yeet double(n);
}
yap(twice(4));
"#;
        assert_eq!(run_source(source), vec!["8"]);
    }

    #[test]
    fn test_function_body_sees_only_parameters() {
        let source = r#"
int hidden = 7;
def f() -> int {
    yeet hidden;
}
yap(f());
"#;
        assert!(matches!(compile(source), Err(CompileError::Name(_))));
    }

    #[test]
    fn test_void_function_implicit_return() {
        let source = r#"
def greet() -> void {
    yap("hi");
}
greet();
"#;
        assert_eq!(run_source(source), vec!["hi"]);
    }

    #[test]
    fn test_recursion_limit() {
        let source = "def f() -> void { f(); } f();";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program.clone(), Box::new(std::io::empty()));
        assert!(matches!(vm.run(), Err(VmError::RecursionLimit(1000))));

        let ast = parse(source).unwrap();
        let mut ev = Evaluator::with_input(Box::new(std::io::empty()));
        assert!(matches!(ev.run(&ast), Err(EvalError::RecursionLimit(1000))));
    }

    #[test]
    fn test_pop_from_empty_stack_faults() {
        let source = "stack<int> s; yap(s.pop());";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(std::io::empty()));
        assert!(matches!(vm.run(), Err(VmError::ContainerUnderflow("stack"))));

        let ast = parse(source).unwrap();
        let mut ev = Evaluator::with_input(Box::new(std::io::empty()));
        assert!(matches!(
            ev.run(&ast),
            Err(EvalError::ContainerUnderflow("stack"))
        ));
    }

    #[test]
    fn test_index_out_of_bounds_faults() {
        let source = "int[] a = [1]; yap(a[5]);";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(std::io::empty()));
        assert!(matches!(
            vm.run(),
            Err(VmError::IndexOutOfBounds { index: 5, len: 1 })
        ));
    }

    #[test]
    fn test_division_by_zero_faults() {
        let source = "yap(1 / 0);";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(std::io::empty()));
        assert!(matches!(vm.run(), Err(VmError::DivisionByZero)));
    }

    #[test]
    fn test_spill_coerces_to_declared_type() {
        let source = "int x = spill(); yap(x + 1);";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(Cursor::new("41\n")));
        vm.run().expect("runtime error");
        assert_eq!(vm.output(), ["42"]);

        let ast = parse(source).unwrap();
        let mut ev = Evaluator::with_input(Box::new(Cursor::new("41\n")));
        ev.run(&ast).expect("eval error");
        assert_eq!(ev.output(), ["42"]);
    }

    #[test]
    fn test_spill_bool_sentinels() {
        let source = "bool b = spill(); yap(not b);";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(Cursor::new("cap\n")));
        vm.run().expect("runtime error");
        assert_eq!(vm.output(), ["nocap"]);
    }

    #[test]
    fn test_spill_bad_int_faults() {
        let source = "int x = spill(); yap(x);";
        let program = compile(source).expect("compilation failed");
        let mut vm = Vm::with_input(program, Box::new(Cursor::new("banana\n")));
        assert!(matches!(vm.run(), Err(VmError::Input(_))));
    }

    #[test]
    fn test_negative_literals_render_with_tilde() {
        assert_eq!(run_source(r#"yap(0 - 3, " ", 1.5 - 2.0);"#), vec!["~3 ~0.5"]);
    }

    #[test]
    fn test_comment_only_lines_ignored() {
        let source = "# leading comment\nyap(1); # trailing\n# closing";
        assert_eq!(run_source(source), vec!["1"]);
    }

    #[test]
    fn test_evaluator_reference_run_helper() {
        let program = parse("yap(2 + 2);").unwrap();
        let out = eval::run(&program).unwrap();
        assert_eq!(out, vec!["4"]);
    }

    #[test]
    fn test_paren_grouping() {
        assert_eq!(run_source("yap((2 + 3) ^ 2);"), vec!["25"]);
    }

    #[test]
    fn test_equality_speaks_the_sentinels() {
        assert_eq!(run_source("yap(nocap == nocap);"), vec!["nocap"]);
        assert_eq!(run_source("yap(1 == 2);"), vec!["cap"]);
    }
}
