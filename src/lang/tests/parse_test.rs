use super::*;

fn expr(s: &str) -> Expression {
    parse_expression(&line(s)).unwrap()
}

/// Expression shape without source locations.
fn show(e: &Expression) -> String {
    match e {
        Expression::Integer(_, n) => n.to_string(),
        Expression::Long(_, n) => format!("{}L", n),
        Expression::Real(_, r) => r.to_string(),
        Expression::String(_, s) => format!("{:?}", s),
        Expression::Boolean(_, b) => b.to_string(),
        Expression::Name(_, n) => n.clone(),
        Expression::Member(_, t, f) => format!("{}.{}", show(t), f),
        Expression::Call(_, n, args) => {
            let args: Vec<String> = args.iter().map(show).collect();
            format!("{}({})", n, args.join(","))
        }
        Expression::Unary(_, op, e) => format!("({}{})", op, show(e)),
        Expression::Binary(_, op, l, r) => format!("({} {} {})", show(l), op, show(r)),
    }
}

#[test]
fn test_precedence() {
    assert_eq!(show(&expr("1 + 2 * 3")), "(1 + (2 * 3))");
    assert_eq!(show(&expr("1 - 2 - 3")), "((1 - 2) - 3)");
    assert_eq!(show(&expr("(1 + 2) * 3")), "((1 + 2) * 3)");
    assert_eq!(show(&expr("a < b = c > d")), "((a < b) = (c > d))");
    assert_eq!(show(&expr("NOT a AND b")), "((NOT a) AND b)");
    assert_eq!(show(&expr("x SHL 1 + 1")), "(x SHL (1 + 1))");
    assert_eq!(show(&expr("- - x")), "(-(-x))");
    assert_eq!(show(&expr("a - -1")), "(a - (-1))");
}

#[test]
fn test_operands() {
    assert_eq!(show(&expr("p.q.r")), "p.q.r");
    assert_eq!(show(&expr("f(1, g(2), \"s\")")), "f(1,g(2),\"s\")");
    assert_eq!(show(&expr("f()")), "f()");
    assert_eq!(show(&expr("3000000000")), "3000000000L");
    assert_eq!(show(&expr("0b1111")), "15");
    assert_eq!(show(&expr(&format!("0b{}", "1".repeat(31)))), "2147483647");
    assert_eq!(show(&expr(&format!("0b1{}", "0".repeat(31)))), "2147483648L");
    assert_eq!(show(&expr(&format!("0b1{}", "0".repeat(40)))), "1099511627776L");
    assert_eq!(show(&expr("TRUE OR FALSE")), "(true OR false)");
}

#[test]
fn test_bad_expressions() {
    assert_eq!(parse_expression(&line("1 +")).unwrap_err().code(), ErrorCode::ExpectedExpression);
    assert_eq!(parse_expression(&line("1 2")).unwrap_err().code(), ErrorCode::UnexpectedSequence);
    assert_eq!(parse_expression(&line("a.")).unwrap_err().code(), ErrorCode::ExpectedFieldName);
    assert_eq!(parse_expression(&line("f(1,)")).unwrap_err().code(), ErrorCode::ExpectedExpression);
}

#[test]
fn test_program() {
    let p = program(
        "CONST\n\
         \tN = 10\n\
         END CONST\n\
         TYPE Point\n\
         \tx AS INTEGER\n\
         \ty AS INTEGER\n\
         END TYPE\n\
         CODE Browser, Server\n\
         \tDECLARE FUNCTION print(POINTER TO CONST STRING)\n\
         END CODE\n\
         MODULE B Server\n\
         \tDATA INPUT\n\
         \t\tv AS INTEGER\n\
         \tEND DATA\n\
         END MODULE\n\
         MODULE A Browser\n\
         \tDATA OUTPUT\n\
         \t\tv AS INTEGER\n\
         \tEND DATA\n\
         \tFUNCTION MAIN()\n\
         \t\tv = N\n\
         \tEND FUNCTION\n\
         END MODULE\n\
         TRANSMISSION\n\
         \tA.v TO B.v\n\
         END TRANSMISSION\n",
    )
    .unwrap();
    assert_eq!(p.constants.len(), 1);
    assert_eq!(p.structs[0].fields.len(), 2);
    assert_eq!(p.libraries[0].executors, ["Browser", "Server"]);
    let names: Vec<&str> = p.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
    assert_eq!(p.modules[0].data_sets[0].prefix, DataPrefix::Output);
    assert_eq!(p.modules[0].code_blocks[0].functions[0].name(), "MAIN");
    assert_eq!(p.channels[0].source, ("A".to_string(), "v".to_string()));
    assert_eq!(p.channels[0].destination, ("B".to_string(), "v".to_string()));
}

#[test]
fn test_statements() {
    let p = program(
        "CODE\n\
         FUNCTION f(n AS INTEGER) AS INTEGER\n\
         \tVAR total = 0 AS INTEGER\n\
         \tFOR i = 1 TO n STEP 2\n\
         \t\ttotal = total + i\n\
         \tNEXT i\n\
         \tIF total > 10 THEN\n\
         \t\ttotal = 10\n\
         \tELSE IF total < 0 THEN\n\
         \t\ttotal = 0\n\
         \tELSE\n\
         \t\tg()\n\
         \tEND IF\n\
         \tDO\n\
         \t\ttotal = total - 1\n\
         \tLOOP UNTIL total < 5\n\
         \tRETURN total\n\
         END FUNCTION\n\
         END CODE\n",
    )
    .unwrap();
    let body = match &p.libraries[0].functions[0] {
        Function::User(f) => &f.body,
        other => panic!("{:?}", other),
    };
    assert_eq!(body.len(), 5);
    assert!(matches!(&body[0], Statement::Var(_, name, Some(DataType::Integer), Some(_)) if name == "total"));
    match &body[1] {
        Statement::For(_, f) => {
            assert!(f.step.is_some());
            assert_eq!(f.body.len(), 1);
        }
        other => panic!("{:?}", other),
    }
    match &body[2] {
        Statement::If(_, branches, otherwise) => {
            assert_eq!(branches.len(), 2);
            assert!(matches!(otherwise.as_deref(), Some([Statement::Call(..)])));
        }
        other => panic!("{:?}", other),
    }
    match &body[3] {
        Statement::Do(_, Some(condition), _) => {
            assert!(condition.post);
            assert!(condition.negative);
        }
        other => panic!("{:?}", other),
    }
    assert!(matches!(&body[4], Statement::Return(_, Some(_))));
}

#[test]
fn test_errors() {
    let e = program("CODE\nFUNCTION f()\nx = 1\n").unwrap_err();
    assert_eq!(e.code(), ErrorCode::UnexpectedEndOfFile);
    assert_eq!(e.fragment().map(|f| f.line), Some(2));

    let e = program("CODE\nFUNCTION f()\nFOR i = 1 TO 2\nNEXT j\nEND FUNCTION\nEND CODE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::CounterDoesNotMatch);

    let e = program("CODE\nFUNCTION f()\nIF TRUE\nEND IF\nEND FUNCTION\nEND CODE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::ExpectedThenKeyword);

    let e = program("MODULE A\nEND MODULE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::ExpectedModuleExecutor);

    let e = program("MODULE A X\nEND MODULE\nMODULE A Y\nEND MODULE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::ModuleAlreadyExists);

    let e = program("MODULE A X\nDATA\nEND DATA\nDATA PRIVATE\nEND DATA\nEND MODULE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::DuplicateDataSet);

    let e = program("CODE\nFUNCTION f()\nEND FUNCTION\nFUNCTION f()\nEND FUNCTION\nEND CODE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::FunctionAlreadyExists);

    let e = program("CODE\nFUNCTION f()\nVAR x\nEND FUNCTION\nEND CODE").unwrap_err();
    assert_eq!(e.code(), ErrorCode::ExpectedAsKeyword);
}
