mod common;
use ant::lang::{ErrorCode, FileLoader};
use ant::mach::compile;
use common::*;
use std::fs;

#[test]
fn test_imports_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("prelude.bas"), PRELUDE).unwrap();
    fs::write(
        dir.path().join("lib.bas"),
        "IMPORT \"prelude.bas\"\n\
         CODE\n\
         FUNCTION greet(name AS STRING OF 8)\n\
         print(\"Hello, \" + name)\n\
         END FUNCTION\n\
         END CODE\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.bas"),
        "IMPORT \"prelude.bas\"\n\
         IMPORT \"lib.bas\"\n\
         MODULE Main Browser\n\
         FUNCTION MAIN()\n\
         greet(\"ants\")\n\
         END FUNCTION\n\
         END MODULE\n",
    )
    .unwrap();
    let program = compile(&FileLoader::new(dir.path()), "main.bas").unwrap();
    assert_eq!(exec_n(&program, 100), "Hello, ants\n");
}

#[test]
fn test_missing_import() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.bas"), "' header\nIMPORT \"gone.bas\"\n").unwrap();
    let e = compile(&FileLoader::new(dir.path()), "main.bas").unwrap_err();
    assert_eq!(e.code(), ErrorCode::ImportNotFound);
    assert!(e.to_string().starts_with("IMPORT NOT FOUND IN main.bas:2"));
}
