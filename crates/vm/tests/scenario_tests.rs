//! End-to-end compile-then-run coverage of the seed scenarios (§8) and the
//! runtime-error taxonomy (§7). `run_capturing` redirects `print` output
//! into an in-memory buffer via `Vm::with_stdout` so these tests can assert
//! on a program's literal stdout, not just whether it ran without a fault.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use ember_vm::{InterpretError, RuntimeError, Vm, VmConfig};

fn run(source: &str) -> Result<(), InterpretError> {
    let mut vm = Vm::new(VmConfig::default());
    vm.interpret(source.as_bytes())
}

/// A `Write` sink cheap to clone, so one clone can be handed to the `Vm`
/// while another is kept around to read the bytes back once the run ends.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run_with_config(source: &str, config: VmConfig) -> String {
    let buffer = SharedBuffer::default();
    let mut vm = Vm::with_stdout(config, Box::new(buffer.clone()));
    vm.interpret(source.as_bytes()).expect("scenario should run without error");
    String::from_utf8(buffer.0.borrow().clone()).expect("print only ever emits UTF-8 in these scenarios")
}

fn run_capturing(source: &str) -> String {
    run_with_config(source, VmConfig::default())
}

#[test]
fn arithmetic_seed_scenario_prints_the_exact_literal_value() {
    let output = run_capturing("print -((1.2 + 3.4) / 5.6);");
    assert_eq!(output, "-0.821428571428571\n");
}

#[test]
fn closures_seed_scenario_prints_the_exact_counter_sequence() {
    let source = r#"
        fun makeCounter(){ var c = 0; fun incr(){ c = c + 1; return c; } return incr; }
        var a = makeCounter(); print a(); print a(); var b = makeCounter(); print b(); print a();
    "#;
    assert_eq!(run_capturing(source), "1\n2\n1\n3\n");
}

#[test]
fn inheritance_and_super_seed_scenario_prints_parent_then_child() {
    let source = r#"
        class A { speak(){ print "A"; } }
        class B < A { speak(){ super.speak(); print "B"; } }
        B().speak();
    "#;
    assert_eq!(run_capturing(source), "A\nB\n");
}

#[test]
fn initializer_seed_scenario_prints_the_field_set_by_init() {
    let source = r#"
        class P { init(x){ this.x = x; } }
        print P(7).x;
    "#;
    assert_eq!(run_capturing(source), "7\n");
}

#[test]
fn string_concat_and_equality_seed_scenario_prints_true() {
    let output = run_capturing(r#"var s = "foo" + "bar"; print s == "foobar";"#);
    assert_eq!(output, "true\n");
}

#[test]
fn runtime_error_seed_scenario_produces_a_two_frame_traceback() {
    let err = run(r#"fun f(){ return 1 + "x"; } f();"#).expect_err("adding a number and a string should fault");
    let fault = match err {
        InterpretError::Runtime(fault) => fault,
        InterpretError::Compile(errors) => panic!("expected a runtime fault, got compile errors: {errors}"),
    };
    assert_eq!(fault.error, RuntimeError::AddOperandsInvalid);
    assert_eq!(fault.trace.len(), 2);
    assert_eq!(fault.trace[0].label, "f()");
    assert_eq!(fault.trace[1].label, "script");

    let rendered = fault.to_string();
    assert!(rendered.starts_with("Operands must be two numbers or two strings.\n"));
    assert!(rendered.contains("in f()"));
    assert!(rendered.contains("in script"));
}

#[test]
fn undefined_global_is_a_runtime_error() {
    let err = run("print nope;").unwrap_err();
    match err {
        InterpretError::Runtime(fault) => {
            assert_eq!(fault.error, RuntimeError::UndefinedVariable("nope".to_string()));
        }
        InterpretError::Compile(errors) => panic!("expected a runtime fault, got compile errors: {errors}"),
    }
}

#[test]
fn calling_with_the_wrong_arity_is_a_runtime_error() {
    let err = run("fun f(a, b){ return a + b; } f(1);").unwrap_err();
    match err {
        InterpretError::Runtime(fault) => {
            assert_eq!(fault.error, RuntimeError::ArityMismatch { expected: 2, got: 1 });
        }
        InterpretError::Compile(errors) => panic!("expected a runtime fault, got compile errors: {errors}"),
    }
}

#[test]
fn unbounded_recursion_overflows_the_call_stack() {
    let err = run("fun recurse(){ return recurse(); } recurse();").unwrap_err();
    match err {
        InterpretError::Runtime(fault) => {
            assert_eq!(fault.error, RuntimeError::StackOverflow);
        }
        InterpretError::Compile(errors) => panic!("expected a runtime fault, got compile errors: {errors}"),
    }
}

#[test]
fn super_method_lookup_miss_is_distinguished_from_a_plain_one() {
    let err = run("class A {} class B < A { m(){ super.missing(); } } B().m();").unwrap_err();
    match err {
        InterpretError::Runtime(fault) => {
            assert_eq!(fault.error, RuntimeError::UndefinedSuperMethod("missing".to_string()));
        }
        InterpretError::Compile(errors) => panic!("expected a runtime fault, got compile errors: {errors}"),
    }
}

#[test]
fn stress_gc_produces_byte_identical_output_to_a_non_stress_run() {
    let source = r#"
        var s = "";
        for (var i = 0; i < 50; i = i + 1) { s = s + "x"; }
        print s;
    "#;
    let mut stress_config = VmConfig::default();
    stress_config.stress_gc = true;

    let normal_output = run_with_config(source, VmConfig::default());
    let stress_output = run_with_config(source, stress_config);
    assert_eq!(normal_output, stress_output, "forcing a collection at every allocation must not change output");
}
