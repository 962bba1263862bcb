#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn test_truth_display() {
        assert_eq!(format!("{}", Truth::Nocap), "nocap");
        assert_eq!(format!("{}", Truth::Cap), "cap");
        assert_eq!(Truth::from_bool(true), Truth::Nocap);
        assert_eq!(Truth::from_bool(false), Truth::Cap);
        assert_eq!(Truth::Nocap.negate(), Truth::Cap);
    }

    #[test]
    fn test_int_rendering() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Int(0)), "0");
        assert_eq!(format!("{}", Value::Int(-7)), "~7");
        assert_eq!(format!("{}", Value::Int(i64::MIN)), format!("~{}", i64::MIN.unsigned_abs()));
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(format!("{}", Value::Float(2.0)), "2.0");
        assert_eq!(format!("{}", Value::Float(2.5)), "2.5");
        assert_eq!(format!("{}", Value::Float(-0.5)), "~0.5");
        assert_eq!(format!("{}", Value::Float(-3.0)), "~3.0");
    }

    #[test]
    fn test_string_and_void_rendering() {
        assert_eq!(format!("{}", Value::Str("hi".into())), "hi");
        assert_eq!(format!("{}", Value::Void), "void");
        assert_eq!(format!("{}", Value::Bool(Truth::Nocap)), "nocap");
    }

    #[test]
    fn test_array_rendering() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(-2), Value::Str("x".into())]);
        assert_eq!(format!("{arr}"), "[1, ~2, x]");
        assert_eq!(format!("{}", Value::array(vec![])), "[]");
    }

    #[test]
    fn test_map_rendering() {
        let map = Value::new_map();
        if let Value::Map(m) = &map {
            m.borrow_mut().insert(MapKey::Int(1), Value::Str("one".into()));
            m.borrow_mut().insert(MapKey::Str("b".into()), Value::Float(2.0));
        }
        assert_eq!(format!("{map}"), "{1: one, b: 2.0}");
    }

    #[test]
    fn test_array_shares_storage() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::Array(cells) = &a {
            cells.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(format!("{b}"), "[1, 2]");
    }

    #[test]
    fn test_type_display() {
        assert_eq!(format!("{}", Type::Int), "int");
        assert_eq!(format!("{}", Type::Array(Box::new(Type::Float))), "float[]");
        assert_eq!(format!("{}", Type::Stack(Box::new(Type::Int))), "stack<int>");
        assert_eq!(format!("{}", Type::Queue(Box::new(Type::Str))), "queue<string>");
        assert_eq!(
            format!("{}", Type::Map(Box::new(Type::Str), Box::new(Type::Int))),
            "hashmap<string, int>"
        );
    }

    #[test]
    fn test_large_int_equality_is_exact() {
        // Past 2^53 an f64 detour would collapse adjacent ints
        let a = Value::Int((1 << 53) + 1);
        let b = Value::Int(1 << 53);
        assert!(!ops::equals(&a, &b));
        assert!(ops::equals(&a, &Value::Int((1 << 53) + 1)));
        // Genuinely mixed pairs still compare numerically
        assert!(ops::equals(&Value::Int(2), &Value::Float(2.0)));
        assert!(!ops::equals(&Value::Float(2.5), &Value::Int(2)));
    }

    #[test]
    fn test_disassemble_format() {
        let mut program = Program::new();
        program.code = vec![
            Op::Push(Value::Int(3)),
            Op::Store(0),
            Op::Label("L0".into()),
            Op::Load(0),
            Op::Jz("L1".into()),
            Op::Label("L1".into()),
            Op::Exit,
        ];
        let text = program.disassemble();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0: PUSH 3");
        assert_eq!(lines[1], "1: STORE 0");
        assert_eq!(lines[2], "L0:");
        assert_eq!(lines[3], "3: LOAD 0");
        assert_eq!(lines[4], "4: JZ L1");
        assert_eq!(lines[5], "L1:");
        assert_eq!(lines[6], "6: EXIT");
    }

    #[test]
    fn test_push_string_disassembles_quoted() {
        let mut program = Program::new();
        program.code = vec![Op::Push(Value::Str("hi there".into()))];
        assert_eq!(program.disassemble().trim_end(), "0: PUSH \"hi there\"");
    }

    #[test]
    fn test_program_json_roundtrip() {
        let mut program = Program::new();
        program.code = vec![
            Op::Jmp("end_f".into()),
            Op::Label("f".into()),
            Op::Load(0),
            Op::Push(Value::Int(1)),
            Op::Add,
            Op::Ret,
            Op::Label("end_f".into()),
            Op::Push(Value::Int(41)),
            Op::Call("f".into()),
            Op::Print,
            Op::Flush,
            Op::Exit,
        ];
        program.functions.insert(
            "f".into(),
            FuncSig { entry: "f".into(), params: vec![Type::Int], ret: Type::Int },
        );

        let json = program.to_json().unwrap();
        let restored = Program::from_json(&json).unwrap();
        assert_eq!(program, restored);
    }
}
