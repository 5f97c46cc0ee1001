use super::*;
use crate::lang::{ErrorCode, MemoryLoader};

mod check_test;

fn analysed(source: &str) -> Graph {
    match load(&MemoryLoader::new().with("test.bas", source), "test.bas") {
        Ok(graph) => graph,
        Err(e) => panic!("{}", e),
    }
}

fn failure(source: &str) -> ErrorCode {
    match load(&MemoryLoader::new().with("test.bas", source), "test.bas") {
        Ok(_) => panic!("analysis succeeded"),
        Err(e) => e.code(),
    }
}

fn find<F: Fn(&NodeKind) -> bool>(graph: &Graph, matches: F) -> NodeId {
    match graph.walk(graph.root()).into_iter().find(|id| matches(graph.kind(*id))) {
        Some(id) => id,
        None => panic!("no such node"),
    }
}

fn var(graph: &Graph, name: &str) -> NodeId {
    find(graph, |k| matches!(k, NodeKind::Var { name: n, .. } if n == name))
}

fn function(graph: &Graph, name: &str) -> NodeId {
    find(graph, |k| matches!(k, NodeKind::Function { name: n, .. } if n == name))
}

fn offset(graph: &Graph, id: NodeId) -> i32 {
    match graph.kind(id) {
        NodeKind::Var { offset, .. } | NodeKind::Argument { offset, .. } | NodeKind::Field { offset, .. } => *offset,
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_data_layout() {
    let graph = analysed(
        "MODULE A Browser\n\
         DATA\n\
         a AS INTEGER\n\
         b AS STRING OF 3\n\
         END DATA\n\
         DATA OUTPUT\n\
         c AS BYTE\n\
         END DATA\n\
         END MODULE\n",
    );
    let module = graph.modules()[0];
    let fields = graph.data_fields(module, None);
    let offsets: Vec<i32> = fields.iter().map(|f| offset(&graph, *f)).collect();
    assert_eq!(offsets, [0, 4, 18]);
    match graph.kind(module) {
        NodeKind::Module { data_size, .. } => assert_eq!(*data_size, 19),
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_frame() {
    let graph = analysed(
        "CODE\n\
         FUNCTION f(a AS INTEGER, b AS LONG) AS INTEGER\n\
         VAR x AS LONG\n\
         y = a\n\
         RETURN y\n\
         END FUNCTION\n\
         END CODE\n",
    );
    let f = function(&graph, "f");
    assert_eq!(
        graph.frame(f),
        Frame {
            locals: 12,
            arguments: 12,
            result: 20,
        }
    );
    let arguments: Vec<i32> = graph.children(f)[..2].iter().map(|a| offset(&graph, *a)).collect();
    assert_eq!(arguments, [8, 12]);
    let y = var(&graph, "y");
    assert_eq!(graph.ty(y), Some(Types::INTEGER));
    assert_eq!(offset(&graph, y), -4);
    assert_eq!(offset(&graph, var(&graph, "x")), -12);
}

#[test]
fn test_for_temporaries() {
    let graph = analysed(
        "CODE\n\
         FUNCTION f()\n\
         FOR i = 1 TO 10\n\
         NEXT\n\
         END FUNCTION\n\
         END CODE\n",
    );
    let i = var(&graph, "i");
    assert_eq!(offset(&graph, i), -4);
    let r#for = find(&graph, |k| matches!(k, NodeKind::For { .. }));
    match graph.kind(r#for) {
        NodeKind::For { temps, .. } => assert_eq!(*temps, [-8, -12, -13]),
        other => panic!("{:?}", other),
    }
    assert_eq!(graph.frame(function(&graph, "f")).locals, 13);
}

#[test]
fn test_string_lengths() {
    let graph = analysed(
        "CONST\n\
         L = 4\n\
         END CONST\n\
         CODE\n\
         FUNCTION f()\n\
         VAR s AS STRING OF L * 2\n\
         END FUNCTION\n\
         END CODE\n",
    );
    let s = var(&graph, "s");
    assert_eq!(graph.ty(s).and_then(|t| graph.types.string_length(t)), Some(8));
    assert_eq!(failure("CODE\nFUNCTION f()\nVAR s AS STRING OF 0\nEND FUNCTION\nEND CODE"), ErrorCode::InvalidStringLength);
}

#[test]
fn test_source_round_trip_reanalyses() {
    let source = "CONST\n\
         N = 3\n\
         END CONST\n\
         CODE\n\
         FUNCTION twice(x AS REAL) AS REAL\n\
         RETURN x * 2\n\
         END FUNCTION\n\
         END CODE\n\
         MODULE M Browser\n\
         DATA OUTPUT\n\
         total AS REAL\n\
         END DATA\n\
         FUNCTION MAIN()\n\
         FOR i = 1 TO N\n\
         total = total + twice(i)\n\
         NEXT i\n\
         END FUNCTION\n\
         END MODULE\n";
    let first = to_source_code(&analysed(source));
    let second = to_source_code(&analysed(&first));
    assert_eq!(first, second);
    assert!(first.contains("RETURN x * 2.0"));
}

#[test]
fn test_offsets_are_deterministic() {
    let source = "TYPE Pair\n\
         a AS BYTE\n\
         b AS STRING OF 2\n\
         END TYPE\n\
         CODE\n\
         FUNCTION f(p AS Pair, n AS LONG) AS REAL\n\
         VAR s AS STRING OF 5\n\
         total = 0.5\n\
         FOR i = 1 TO 10\n\
         total = total + i\n\
         NEXT\n\
         RETURN total\n\
         END FUNCTION\n\
         END CODE\n\
         MODULE M Browser\n\
         DATA\n\
         x AS Pair\n\
         y AS SHORT\n\
         END DATA\n\
         END MODULE\n";
    let layout = |graph: &Graph| -> Vec<(NodeId, i32)> {
        graph
            .walk(graph.root())
            .into_iter()
            .filter(|id| {
                matches!(
                    graph.kind(*id),
                    NodeKind::Var { .. } | NodeKind::Argument { .. } | NodeKind::Field { .. }
                )
            })
            .map(|id| (id, offset(graph, id)))
            .collect()
    };
    let (first, second) = (analysed(source), analysed(source));
    assert_eq!(layout(&first), layout(&second));
    let f = |graph: &Graph| graph.frame(function(graph, "f"));
    assert_eq!(f(&first), f(&second));
    assert_eq!(offset(&first, var(&first, "s")), offset(&second, var(&second, "s")));
}

#[test]
fn test_string_records() {
    let graph = analysed(
        "TYPE Inner\n\
         n AS INTEGER\n\
         label AS STRING OF 2\n\
         END TYPE\n\
         TYPE Outer\n\
         flag AS BOOLEAN\n\
         inner AS Inner\n\
         name AS STRING OF 3\n\
         END TYPE\n\
         CODE\n\
         FUNCTION f()\n\
         VAR o AS Outer\n\
         VAR s AS STRING OF 4\n\
         VAR n AS LONG\n\
         END FUNCTION\n\
         END CODE\n",
    );
    let strings = |name: &str| graph.strings(graph.ty(var(&graph, name)).unwrap());
    assert_eq!(strings("o"), [(5, 2), (17, 3)]);
    assert_eq!(strings("s"), [(0, 4)]);
    assert!(strings("n").is_empty());
}
