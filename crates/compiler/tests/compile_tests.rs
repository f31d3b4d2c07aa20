//! Compile-level coverage of the seed scenarios (§8) and the error-recovery
//! policy (§4.2 "Error reporting and synchronization", §7).

use ember_compiler::{compile, disassemble_chunk, CompilerConfig};
use ember_core::{Heap, ObjKind};

fn compile_ok(source: &str) -> ember_core::ObjectRef {
    let mut heap = Heap::new();
    compile(source.as_bytes(), &mut heap, CompilerConfig::default())
        .unwrap_or_else(|e| panic!("expected compile success, got errors:\n{e}"))
}

fn compile_err(source: &str) -> String {
    let mut heap = Heap::new();
    match compile(source.as_bytes(), &mut heap, CompilerConfig::default()) {
        Ok(_) => panic!("expected compile error for: {source}"),
        Err(e) => e.to_string(),
    }
}

#[test]
fn arithmetic_seed_scenario_compiles() {
    let function = compile_ok("print -((1.2 + 3.4) / 5.6);");
    assert_eq!(function.kind(), ObjKind::Function);
    let dump = disassemble_chunk(&function.as_function().chunk, "script");
    assert!(dump.contains("Print"));
    assert!(dump.contains("Negate"));
    assert!(dump.contains("Divide"));
}

#[test]
fn closures_seed_scenario_compiles_and_emits_upvalues() {
    let source = r#"
        fun makeCounter(){ var c = 0; fun incr(){ c = c + 1; return c; } return incr; }
        var a = makeCounter(); print a(); print a(); var b = makeCounter(); print b(); print a();
    "#;
    let function = compile_ok(source);
    let dump = disassemble_chunk(&function.as_function().chunk, "script");
    // The outer script body should emit the CLOSURE for makeCounter.
    assert!(dump.contains("Closure"));
}

#[test]
fn inheritance_and_super_seed_scenario_compiles() {
    let source = r#"
        class A { speak(){ print "A"; } }
        class B < A { speak(){ super.speak(); print "B"; } }
        B().speak();
    "#;
    compile_ok(source);
}

#[test]
fn initializer_seed_scenario_compiles() {
    let source = r#"
        class P { init(x){ this.x = x; } }
        print P(7).x;
    "#;
    compile_ok(source);
}

#[test]
fn string_concat_and_equality_seed_scenario_compiles() {
    compile_ok(r#"var s = "foo" + "bar"; print s == "foobar";"#);
}

#[test]
fn runtime_error_seed_scenario_still_compiles() {
    // §8's runtime-error scenario is a type error caught at run time, not
    // compile time -- it must compile cleanly.
    compile_ok(r#"fun f(){ return 1 + "x"; } f();"#);
}

#[test]
fn returning_a_value_from_top_level_is_a_compile_error() {
    let message = compile_err("return 1;");
    assert!(message.contains("Can't return from top-level code."));
}

#[test]
fn returning_a_value_from_an_initializer_is_a_compile_error() {
    let message = compile_err("class C { init(){ return 1; } }");
    assert!(message.contains("Can't return a value from an initializer."));
}

#[test]
fn this_outside_a_class_is_a_compile_error() {
    let message = compile_err("print this;");
    assert!(message.contains("Can't use 'this' outside of a class."));
}

#[test]
fn super_outside_a_class_is_a_compile_error() {
    let message = compile_err("super.foo();");
    assert!(message.contains("Can't use 'super' outside of a class."));
}

#[test]
fn super_without_a_superclass_is_a_compile_error() {
    let message = compile_err("class A { m(){ super.m(); } }");
    assert!(message.contains("Can't use 'super' in a class with no superclass."));
}

#[test]
fn class_inheriting_from_itself_is_a_compile_error() {
    let message = compile_err("class A < A {}");
    assert!(message.contains("A class can't inherit from itself."));
}

#[test]
fn reading_a_local_in_its_own_initializer_is_a_compile_error() {
    let message = compile_err("{ var a = a; }");
    assert!(message.contains("Can't read local variable in its own initializer."));
}

#[test]
fn redeclaring_a_local_in_the_same_scope_is_a_compile_error() {
    let message = compile_err("{ var a = 1; var a = 2; }");
    assert!(message.contains("Already a variable with this name in this scope."));
}

#[test]
fn invalid_assignment_target_is_a_compile_error() {
    let message = compile_err("1 + 2 = 3;");
    assert!(message.contains("Invalid assignment target."));
}

#[test]
fn panic_mode_recovers_at_the_next_statement_boundary() {
    // Two independent errors on two statements should both surface, proving
    // synchronize() resumed parsing after the first one rather than
    // cascading or bailing out entirely.
    let mut heap = Heap::new();
    let source = "print ;\nprint ;\n";
    let result = compile(source.as_bytes(), &mut heap, CompilerConfig::default());
    let errors = result.expect_err("both statements are malformed").0;
    assert_eq!(errors.len(), 2);
}

#[test]
fn for_loop_desugars_like_the_manual_expansion() {
    let desugared = compile_ok("for (var i = 0; i < 3; i = i + 1) print i;");
    let manual = compile_ok("{ var i = 0; while (i < 3) { print i; i = i + 1; } }");
    assert_eq!(desugared.as_function().chunk.code.len(), manual.as_function().chunk.code.len());
}
