use super::*;

fn sum(body: &str) -> i64 {
    let source = functions(&format!(
        "FUNCTION f() AS INTEGER\n\
         total = 0\n\
         {}\n\
         RETURN total\n\
         END FUNCTION",
        body
    ));
    let (event, result) = call(&source, "f", &[]);
    assert_eq!(event, Event::Stopped);
    integer(&result)
}

#[test]
fn test_counts_up_to_the_end_inclusive() {
    assert_eq!(sum("FOR i = 1 TO 10\ntotal = total + i\nNEXT i"), 55);
}

#[test]
fn test_negative_step() {
    assert_eq!(sum("FOR i = 10 TO 1 STEP -2\ntotal = total + i\nNEXT"), 30);
}

#[test]
fn test_empty_range_skips_the_body() {
    assert_eq!(sum("FOR i = 5 TO 1\ntotal = total + 1\nNEXT"), 0);
    assert_eq!(sum("FOR i = 1 TO 5 STEP -1\ntotal = total + 1\nNEXT"), 0);
}

#[test]
fn test_counter_after_the_loop() {
    assert_eq!(sum("FOR i = 1 TO 3\nNEXT\ntotal = i"), 4);
}

#[test]
fn test_nested_loops() {
    assert_eq!(
        sum("FOR i = 1 TO 3\nFOR j = 1 TO 3\ntotal = total + i * j\nNEXT j\nNEXT i"),
        36
    );
}

#[test]
fn test_end_is_evaluated_once() {
    assert_eq!(sum("n = 3\nFOR i = 1 TO n\nn = 10\ntotal = total + 1\nNEXT"), 3);
}

#[test]
fn test_real_counter() {
    assert_eq!(sum("FOR r = 0.0 TO 2.0 STEP 0.5\ntotal = total + 1\nNEXT r"), 5);
}
