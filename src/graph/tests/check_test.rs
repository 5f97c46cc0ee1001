use super::*;
use crate::mach::Fixed;

fn in_function(body: &str) -> String {
    format!(
        "CODE\n\
         DECLARE FUNCTION show(POINTER TO CONST STRING)\n\
         DECLARE FUNCTION bump(POINTER TO INTEGER)\n\
         FUNCTION one() AS INTEGER\n\
         RETURN 1\n\
         END FUNCTION\n\
         FUNCTION nothing()\n\
         END FUNCTION\n\
         FUNCTION f(i AS INTEGER, s AS STRING OF 4)\n\
         {}\n\
         END FUNCTION\n\
         END CODE\n",
        body
    )
}

fn body_error(body: &str) -> ErrorCode {
    failure(&in_function(body))
}

#[test]
fn test_statement_errors() {
    assert_eq!(body_error("IF i THEN\nEND IF"), ErrorCode::ConditionMustBeBoolean);
    assert_eq!(body_error("DO WHILE 1\nLOOP"), ErrorCode::ConditionMustBeBoolean);
    assert_eq!(body_error("FOR b = TRUE TO FALSE\nNEXT"), ErrorCode::CounterMustBeNumeric);
    assert_eq!(body_error("VAR b AS BYTE = 300"), ErrorCode::UnexpectedSequence);
    assert_eq!(body_error("VAR b = 300 AS BYTE"), ErrorCode::IncompatibleTypes);
    assert_eq!(body_error("VAR t AS STRING"), ErrorCode::VariableCanNotBeAbstract);
    assert_eq!(body_error("VAR i = 2 AS INTEGER"), ErrorCode::DuplicateVariable);
    assert_eq!(body_error("VAR x = 1\nVAR x = 2"), ErrorCode::DuplicateVariable);
    assert_eq!(body_error("RETURN 1"), ErrorCode::UnexpectedReturnValue);
    assert_eq!(body_error("one() = 2"), ErrorCode::ExpressionIsNotAssignable);
    assert_eq!(body_error("x = nothing()"), ErrorCode::FunctionDoesNotReturnValue);
    assert_eq!(body_error("x = y"), ErrorCode::CannotResolveSymbol);
    assert_eq!(body_error("g()"), ErrorCode::CannotResolveSymbol);
    assert_eq!(body_error("one(1)"), ErrorCode::InvalidNumberOfArguments);
    assert_eq!(
        failure("CODE\nFUNCTION f() AS INTEGER\nRETURN\nEND FUNCTION\nEND CODE"),
        ErrorCode::ReturnValueExpected
    );
}

#[test]
fn test_expression_errors() {
    assert_eq!(body_error("x = i MOD 1.5"), ErrorCode::OperatorNotApplicable);
    assert_eq!(body_error("x = TRUE + 1"), ErrorCode::OperatorNotApplicable);
    assert_eq!(body_error("x = s SHL 1"), ErrorCode::OperatorNotApplicable);
    assert_eq!(body_error("x = -TRUE"), ErrorCode::OperatorNotApplicable);
    assert_eq!(body_error("x = TRUE < FALSE"), ErrorCode::OperatorNotApplicable);
    assert_eq!(body_error("x = i.y"), ErrorCode::NotAStructure);
    assert_eq!(body_error("i = 1.5"), ErrorCode::IncompatibleTypes);
    assert_eq!(body_error("i = s"), ErrorCode::IncompatibleTypes);
}

#[test]
fn test_pointer_arguments() {
    analysed(&in_function("show(s)\nshow(\"lit\")\nbump(i)\nshow(s + \"!\")"));
    assert_eq!(body_error("bump(5)"), ErrorCode::IncompatibleArgumentType);
    assert_eq!(body_error("bump(s)"), ErrorCode::IncompatibleArgumentType);

    let graph = analysed(&in_function("show(s + \"!\")\nbump(i)"));
    let pointers: Vec<Option<i32>> = graph
        .walk(graph.root())
        .into_iter()
        .filter_map(|id| match graph.kind(id) {
            NodeKind::Pointer { temp, .. } => Some(*temp),
            _ => None,
        })
        .collect();
    assert_eq!(pointers, [Some(-18), None]);
}

#[test]
fn test_coercion() {
    let graph = analysed(&in_function(
        "VAR r = 1 AS REAL\n\
         VAR l AS LONG\n\
         l = i\n\
         VAR t = \"abcdef\" AS STRING OF 3\n\
         VAR u = s + i AS STRING OF 20",
    ));
    let value = |name: &str| match graph.kind(var(&graph, name)) {
        NodeKind::Var { value: Some(value), .. } => *value,
        other => panic!("{:?}", other),
    };
    assert_eq!(graph.kind(value("r")), &NodeKind::Literal(Variant::Real(Fixed::from_int(1))));
    assert_eq!(graph.kind(value("t")), &NodeKind::Literal(Variant::String("abc".to_string())));
    let assign = find(&graph, |k| matches!(k, NodeKind::Assign { .. }));
    match graph.kind(assign) {
        NodeKind::Assign { value, .. } => {
            assert!(matches!(graph.kind(*value), NodeKind::Cast { .. }));
            assert_eq!(graph.ty(*value), Some(Types::LONG));
        }
        other => panic!("{:?}", other),
    }
    let concat = value("u");
    let ty = graph.ty(concat).and_then(|t| graph.types.string_length(t));
    assert!(matches!(graph.kind(concat), NodeKind::Cast { .. }));
    assert_eq!(ty, Some(20));
}

#[test]
fn test_folding_replaces_operands() {
    let graph = analysed(&in_function("VAR x = 2 + 3 * 4 AS INTEGER\nVAR b = 100 + 27 AS BYTE"));
    let value = |name: &str| match graph.kind(var(&graph, name)) {
        NodeKind::Var { value: Some(value), .. } => *value,
        other => panic!("{:?}", other),
    };
    match graph.kind(value("x")) {
        NodeKind::Binary { left, right, .. } => {
            assert_eq!(graph.kind(*left), &NodeKind::Literal(Variant::Integral(2)));
            assert_eq!(graph.kind(*right), &NodeKind::Literal(Variant::Integral(12)));
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(graph.kind(value("b")), &NodeKind::Literal(Variant::Integral(127)));
}

#[test]
fn test_declaration_errors() {
    assert_eq!(
        failure("MODULE A X\nDATA\nv AS Point\nEND DATA\nEND MODULE"),
        ErrorCode::UnknownType
    );
    assert_eq!(
        failure("MODULE A X\nDATA\nv AS STRING\nEND DATA\nEND MODULE"),
        ErrorCode::FieldCanNotBeAbstract
    );
    assert_eq!(
        failure("TYPE P\nv AS CONST INTEGER\nEND TYPE"),
        ErrorCode::FieldCanNotBeConstant
    );
    assert_eq!(
        failure("TYPE P\nq AS Q\nEND TYPE\nTYPE Q\np AS P\nEND TYPE"),
        ErrorCode::RecursiveDefinition
    );
    assert_eq!(failure("CONST\nA = B\nB = A\nEND CONST"), ErrorCode::RecursiveDefinition);
    assert_eq!(failure("CONST\nA = 1\nA = 2\nEND CONST"), ErrorCode::DuplicateConstant);
    assert_eq!(
        failure("CODE\nFUNCTION f(a AS STRING)\nEND FUNCTION\nEND CODE"),
        ErrorCode::ArgumentCanNotBeAbstract
    );
    assert_eq!(
        failure("CODE\nFUNCTION f() AS CONST INTEGER\nEND FUNCTION\nEND CODE"),
        ErrorCode::ReturnTypeCanNotBeConstant
    );
    assert_eq!(
        failure("CODE\nDECLARE FUNCTION n(INTEGER, STRING)\nEND CODE"),
        ErrorCode::ArgumentCanNotBeAbstract
    );
    assert_eq!(
        failure("CODE\nDECLARE FUNCTION n(CONST LONG)\nEND CODE"),
        ErrorCode::ArgumentCanNotBeConstant
    );
}

#[test]
fn test_library_visibility() {
    let source = "CODE Server\n\
         FUNCTION g()\n\
         END FUNCTION\n\
         END CODE\n\
         MODULE A Browser\n\
         FUNCTION MAIN()\n\
         g()\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(failure(source), ErrorCode::CannotResolveSymbol);
    let graph = analysed(&source.replace("MODULE A Browser", "MODULE A Server"));
    match graph.kind(graph.modules()[0]) {
        NodeKind::Module { reachable, .. } => assert_eq!(reachable.len(), 2),
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_channels() {
    let modules = "MODULE A X\n\
         DATA OUTPUT\n\
         out AS INTEGER\n\
         wide AS LONG\n\
         END DATA\n\
         END MODULE\n\
         MODULE B Y\n\
         DATA INPUT\n\
         in AS INTEGER\n\
         END DATA\n\
         END MODULE\n";
    let channel = |line: &str| format!("{}TRANSMISSION\n{}\nEND TRANSMISSION\n", modules, line);
    let graph = analysed(&channel("A.out TO B.in"));
    assert!(matches!(
        graph.kind(graph.channels()[0]),
        NodeKind::Channel { fields: Some(_), .. }
    ));
    assert_eq!(failure(&channel("A.wide TO B.in")), ErrorCode::NonTransferableTypes);
    assert_eq!(failure(&channel("C.out TO B.in")), ErrorCode::UnknownModule);
    assert_eq!(failure(&channel("A.in TO B.in")), ErrorCode::UnknownOutputField);
    assert_eq!(failure(&channel("A.out TO B.out")), ErrorCode::UnknownInputField);
    assert_eq!(
        failure(&channel("A.out TO B.in\nA.out TO B.in")),
        ErrorCode::DuplicateChannel
    );
}
