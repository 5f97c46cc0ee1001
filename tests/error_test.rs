use ant::lang::MemoryLoader;
use ant::mach::compile;

fn error(source: &str) -> String {
    match compile(&MemoryLoader::new().with("bad.bas", source), "bad.bas") {
        Ok(_) => panic!("compiled"),
        Err(e) => e.to_string(),
    }
}

#[test]
fn test_syntax_errors() {
    assert_eq!(error("CODE\nFUNCTION f()\nx = 1 #\n"), "UNKNOWN CHARACTER IN bad.bas:3 (6..7); #");
    assert_eq!(error("MODULE M\nEND MODULE"), "EXPECTED MODULE EXECUTOR IN bad.bas:1 (8..8)");
    assert!(error("CODE\nFUNCTION f()\nIF TRUE THEN\n").starts_with("UNEXPECTED END OF FILE IN bad.bas:3"));
}

#[test]
fn test_semantic_errors() {
    assert_eq!(
        error("CODE\nFUNCTION f()\nVAR b = 300 AS BYTE\nEND FUNCTION\nEND CODE"),
        "INCOMPATIBLE TYPES IN bad.bas:3 (8..11); INTEGER TO BYTE"
    );
    assert_eq!(
        error("CODE\nFUNCTION f()\nx = y\nEND FUNCTION\nEND CODE"),
        "CANNOT RESOLVE SYMBOL IN bad.bas:3 (4..5); y"
    );
    assert_eq!(
        error("MODULE M Browser\nDATA\nv AS Vector\nEND DATA\nEND MODULE"),
        "UNKNOWN TYPE IN bad.bas:3 (5..11); Vector"
    );
}
