mod common;
use common::*;

#[test]
fn test_hello() {
    let source = "MODULE Hello Browser\n\
         FUNCTION MAIN()\n\
         print(\"Hello, World!\")\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "Hello, World!\n");
}

#[test]
fn test_numbers_print_as_text() {
    let source = "MODULE M Browser\n\
         FUNCTION MAIN()\n\
         VAR r = 2.5 AS REAL\n\
         print(\"\" + 42)\n\
         print(\"\" + -7 * 3)\n\
         print(\"r=\" + r * 3)\n\
         print(\"\" + (1 < 2))\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "42\n-21\nr=7.5\nTRUE\n");
}

#[test]
fn test_library_functions_and_constants() {
    let source = "CONST\n\
         LIMIT = 5\n\
         GREETING = \"Hi \" AS STRING OF 3\n\
         END CONST\n\
         CODE\n\
         FUNCTION factorial(n AS INTEGER) AS LONG\n\
         IF n <= 1 THEN\n\
         RETURN 1\n\
         END IF\n\
         RETURN n * factorial(n - 1)\n\
         END FUNCTION\n\
         END CODE\n\
         MODULE M Browser\n\
         FUNCTION MAIN()\n\
         FOR i = 1 TO LIMIT\n\
         print(GREETING + factorial(i))\n\
         NEXT\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "Hi 1\nHi 2\nHi 6\nHi 24\nHi 120\n");
}

#[test]
fn test_structures() {
    let source = "TYPE Point\n\
         x AS INTEGER\n\
         y AS INTEGER\n\
         END TYPE\n\
         TYPE Segment\n\
         a AS Point\n\
         b AS Point\n\
         END TYPE\n\
         MODULE M Browser\n\
         FUNCTION MAIN()\n\
         VAR s AS Segment\n\
         s.a.x = 1\n\
         s.b.x = 4\n\
         s.b.y = s.a.x + 3\n\
         print(\"\" + (s.b.x - s.a.x) + \",\" + (s.b.y - s.a.y))\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "3,4\n");
}

#[test]
fn test_string_arguments() {
    let source = "CODE\n\
         FUNCTION shout(s AS STRING OF 8) AS STRING OF 10\n\
         RETURN s + \"!!\"\n\
         END FUNCTION\n\
         END CODE\n\
         MODULE M Browser\n\
         FUNCTION MAIN()\n\
         VAR word = \"hey\" AS STRING OF 8\n\
         print(shout(word))\n\
         print(shout(\"truncated text\"))\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "hey!!\ntruncate!!\n");
}

#[test]
fn test_executors_scope_libraries() {
    let source = "CODE Browser\n\
         FUNCTION where() AS STRING OF 10\n\
         RETURN \"browser\"\n\
         END FUNCTION\n\
         END CODE\n\
         CODE Server\n\
         FUNCTION where() AS STRING OF 10\n\
         RETURN \"server\"\n\
         END FUNCTION\n\
         END CODE\n\
         MODULE Front Browser\n\
         FUNCTION MAIN()\n\
         print(where())\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "browser\n");
    let back = source.replace("MODULE Front Browser", "MODULE Back Server");
    assert_eq!(exec(&back), "server\n");
}

#[test]
fn test_channels() {
    let source = "MODULE Counter Server\n\
         DATA OUTPUT\n\
         count AS INTEGER\n\
         END DATA\n\
         FUNCTION MAIN()\n\
         FOR i = 1 TO 3\n\
         count = i\n\
         wait = 0\n\
         DO WHILE wait < 20\n\
         wait = wait + 1\n\
         LOOP\n\
         NEXT\n\
         END FUNCTION\n\
         END MODULE\n\
         MODULE Display Browser\n\
         DATA INPUT\n\
         seen AS INTEGER\n\
         END DATA\n\
         FUNCTION MAIN()\n\
         last = 0\n\
         DO UNTIL last = 3\n\
         IF seen <> last THEN\n\
         last = seen\n\
         print(\"seen \" + last)\n\
         END IF\n\
         LOOP\n\
         END FUNCTION\n\
         END MODULE\n\
         TRANSMISSION\n\
         Counter.count TO Display.seen\n\
         END TRANSMISSION\n";
    assert_eq!(exec(source), "seen 1\nseen 2\nseen 3\n");
}

#[test]
fn test_standard_natives() {
    let source = "CODE\n\
         DECLARE FUNCTION random(INTEGER) AS INTEGER\n\
         DECLARE FUNCTION ticks() AS LONG\n\
         END CODE\n\
         MODULE M Browser\n\
         FUNCTION MAIN()\n\
         ok = TRUE\n\
         FOR i = 1 TO 50\n\
         r = random(6)\n\
         ok = ok AND (r >= 0) AND (r < 6)\n\
         NEXT\n\
         print(\"\" + ok)\n\
         print(\"\" + (ticks() > 0))\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "TRUE\nTRUE\n");
}

#[test]
fn test_runtime_fault() {
    let source = "MODULE M Browser\n\
         FUNCTION MAIN()\n\
         zero = 0\n\
         print(\"before\")\n\
         print(\"\" + 1 / zero)\n\
         print(\"after\")\n\
         END FUNCTION\n\
         END MODULE\n";
    assert_eq!(exec(source), "before\nDIVISION_BY_ZERO IN M\n");
}

#[test]
fn test_modules_run_interleaved() {
    let source = "MODULE A Browser\n\
         FUNCTION MAIN()\n\
         FOR i = 1 TO 2\n\
         print(\"A\" + i)\n\
         NEXT\n\
         END FUNCTION\n\
         END MODULE\n\
         MODULE B Browser\n\
         FUNCTION MAIN()\n\
         FOR i = 1 TO 2\n\
         print(\"B\" + i)\n\
         NEXT\n\
         END FUNCTION\n\
         END MODULE\n";
    let output = exec_n(&program(source), 25);
    let mut lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(output.find("A1") < output.find("A2"));
    assert!(output.find("B1") < output.find("B2"));
    lines.sort_unstable();
    assert_eq!(lines, ["A1", "A2", "B1", "B2"]);
}
