//! Runs generated classes on a small interpreter for the JVM subset the
//! compiler emits, so programs can be checked end to end without a JVM.
mod machine;
mod natives;

use classfile::ClassImage;

use crate::{CompileOptions, compile_source};
use machine::{Fault, Machine, Object, Value};

pub(crate) struct Outcome {
    pub output: String,
    /// `class: message` of an exception that escaped `main`.
    pub uncaught: Option<String>,
}

/// Compile `src` and run its `main`, feeding `input` to standard input.
pub(crate) fn run(src: &str, input: &[&str]) -> Outcome {
    let bytes = compile_source(src, &CompileOptions::default()).unwrap_or_else(|e| panic!("{e}"));
    let image = ClassImage::parse(&bytes).expect("generated class parses");
    let mut machine = Machine::new(image, input);
    let uncaught = match machine.invoke("main", vec![Value::Null]) {
        Ok(_) => None,
        Err(Fault::Throw(exception)) => Some(describe(exception)),
        Err(Fault::Halt(reason)) => {
            panic!("halted: {reason}\noutput so far: {:?}", machine.output)
        }
    };
    Outcome {
        output: machine.output,
        uncaught,
    }
}

fn describe(exception: Value) -> String {
    let Value::Ref(object) = exception else {
        return format!("{exception:?}");
    };
    match &*object.borrow() {
        Object::Throwable { class, message } => {
            format!("{class}: {}", message.as_deref().unwrap_or_default())
        }
        other => format!("{other:?}"),
    }
}

/// Output of a program that must not leak an exception.
pub(crate) fn output(src: &str) -> String {
    output_with_input(src, &[])
}

pub(crate) fn output_with_input(src: &str, input: &[&str]) -> String {
    let outcome = run(src, input);
    assert_eq!(outcome.uncaught, None, "output: {:?}", outcome.output);
    outcome.output
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn hello() {
        assert_eq!(output("10 PRINT \"HELLO\"\n"), "HELLO\n");
        assert_eq!(output(""), "");
    }

    #[test]
    fn numbers_print_with_sign_space() {
        assert_eq!(output("10 PRINT 5; -3; 1/4\n"), " 5 -3  0.25 \n");
        assert_eq!(output("10 PRINT 1E10\n"), " 1.0E10 \n");
    }

    #[test]
    fn print_separators() {
        assert_eq!(output("10 PRINT \"A\", \"B\"\n"), format!("A{}B\n", " ".repeat(13)));
        assert_eq!(output("10 PRINT \"A\";\n20 PRINT \"B\"\n"), "AB\n");
    }

    #[test]
    fn for_loops_count_both_ways() {
        assert_eq!(
            output("10 FOR I = 1 TO 3\n20 PRINT I;\n30 NEXT I\n40 PRINT\n"),
            " 1  2  3 \n"
        );
        assert_eq!(
            output("10 FOR I = 3 TO 1 STEP -1 : PRINT I; : NEXT\n"),
            " 3  2  1 "
        );
        assert_eq!(
            output("10 FOR I = 1 TO 2 : FOR J = 1 TO 2\n20 PRINT I * 10 + J;\n30 NEXT J, I\n"),
            " 11  12  21  22 "
        );
    }

    #[test]
    fn for_closed_inside_if_leaves_outer_loop_to_bare_next() {
        let src = "10 FOR J = 1 TO 2\n20 IF 1 THEN FOR I = 1 TO 2 : NEXT I\n\
                   25 PRINT J;\n30 NEXT\n40 PRINT\n";
        assert_eq!(output(src), " 1  2 \n");
    }

    #[test]
    fn next_inside_if_keeps_its_loop_open() {
        let src = "10 FOR I = 1 TO 3\n20 PRINT I;\n30 IF I < 3 THEN NEXT I\n40 PRINT \"END\"\n";
        assert_eq!(output(src), " 1  2  3 END\n");
    }

    #[test]
    fn for_body_runs_once_even_when_already_past() {
        assert_eq!(output("10 FOR I = 5 TO 1 : PRINT I; : NEXT\n"), " 5 ");
    }

    #[test]
    fn while_loops() {
        assert_eq!(
            output("10 I = 0\n20 WHILE I < 3\n30 I = I + 1\n40 WEND\n50 PRINT I\n"),
            " 3 \n"
        );
    }

    #[test]
    fn division_by_zero_reports_and_continues() {
        assert_eq!(
            output("10 PRINT 5 / 0\n20 PRINT -5 / 0\n"),
            "Division by zero\n Infinity \nDivision by zero\n-Infinity \n"
        );
        assert_eq!(output("10 PRINT 0 / 0\n"), "Division by zero\n Infinity \n");
        assert_eq!(output("10 PRINT 7 \\ 2; 7 MOD 3; 2 ^ 10\n"), " 3  1  1024 \n");
    }

    #[test]
    fn truth_values_are_minus_one_and_zero() {
        assert_eq!(
            output("10 PRINT 1 < 2; 2 < 1; NOT 0; 5 AND 3; 5 OR 3\n"),
            "-1  0 -1  1  7 \n"
        );
    }

    #[test]
    fn if_then_else() {
        let src = "10 X = 0\n20 IF X THEN PRINT \"T\" ELSE PRINT \"F\"\n30 IF X = 0 THEN 50\n40 PRINT \"SKIPPED\"\n50 END\n";
        assert_eq!(output(src), "F\n");
    }

    #[test]
    fn goto_both_directions() {
        let src = "10 GOTO 40\n20 PRINT \"B\"\n30 END\n40 PRINT \"A\"\n50 GOTO 20\n";
        assert_eq!(output(src), "A\nB\n");
    }

    #[test]
    fn on_goto_picks_by_selector() {
        let program = |n: i32| {
            format!(
                "10 N = {n}\n20 ON N GOTO 100, 200, 300\n30 PRINT \"NONE\"\n40 END\n\
                 100 PRINT \"A\"\n110 END\n200 PRINT \"B\"\n210 END\n300 PRINT \"C\"\n"
            )
        };
        assert_eq!(output(&program(2)), "B\n");
        assert_eq!(output(&program(0)), "NONE\n");
        assert_eq!(output(&program(4)), "NONE\n");
    }

    #[test]
    fn gosub_returns_to_each_call_site() {
        let src = "10 GOSUB 100\n20 PRINT \"BACK\"\n30 GOSUB 100\n40 END\n\
                   100 PRINT \"SUB\"\n110 RETURN\n";
        assert_eq!(output(src), "SUB\nBACK\nSUB\n");
        let on = "10 ON 2 GOSUB 100, 200\n20 PRINT \"DONE\"\n30 END\n\
                  100 PRINT \"ONE\"\n110 RETURN\n200 PRINT \"TWO\"\n210 RETURN\n";
        assert_eq!(output(on), "TWO\nDONE\n");
    }

    #[test]
    fn runtime_errors_are_reported() {
        assert_eq!(output("10 PRINT \"X\";\n20 RETURN\n"), "X\nRETURN without GOSUB\n");
        assert_eq!(
            output("10 DIM A(5)\n20 A(6) = 1\n30 PRINT \"NOT HERE\"\n"),
            "Subscript out of range\n"
        );
        assert_eq!(output("10 PRINT ASC(\"\")\n"), "Illegal function call\n");
    }

    #[test]
    fn arrays_default_to_eleven_elements() {
        assert_eq!(output("10 A(10) = 3\n20 PRINT A(10)\n"), " 3 \n");
        assert_eq!(
            output("10 DIM B$(2, 3)\n20 B$(2, 3) = \"Z\"\n30 PRINT B$(2, 3); B$(0, 0); \"!\"\n"),
            "Z!\n"
        );
    }

    #[test]
    fn data_read_and_restore() {
        let src = "10 READ A, B$\n20 PRINT A; B$\n30 RESTORE\n40 READ C\n50 PRINT C\n\
                   60 DATA 7, \"HELLO\"\n";
        assert_eq!(output(src), " 7 HELLO\n 7 \n");
        assert_eq!(output("10 READ A\n20 READ B\n30 DATA 1\n"), "Out of DATA\n");
    }

    #[test]
    fn string_functions() {
        let src = "10 A$ = \"HELLO WORLD\"\n\
                   20 PRINT MID$(A$, 7, 5); LEFT$(A$, 2); RIGHT$(A$, 3)\n\
                   30 PRINT INSTR(A$, \"WORLD\")\n\
                   40 PRINT LEN(A$); STR$(42); VAL(\"3.5\")\n";
        assert_eq!(output(src), "WORLDHERLD\n 7 \n 11  42 3.5 \n");
    }

    #[test]
    fn string_operators() {
        let src = "10 A$ = \"AB\" + \"CD\"\n20 IF A$ = \"ABCD\" THEN PRINT \"EQ\"\n\
                   30 IF \"A\" < \"B\" THEN PRINT \"LT\"\n";
        assert_eq!(output(src), "EQ\nLT\n");
    }

    #[test]
    fn swap_and_stop() {
        assert_eq!(output("10 A = 1 : B = 2\n20 SWAP A, B\n30 PRINT A; B\n"), " 2  1 \n");
        assert_eq!(
            output("10 PRINT \"A\"\n20 STOP\n30 PRINT \"B\"\n"),
            "A\nBreak in 20\n"
        );
    }

    #[test]
    fn user_functions() {
        let src = "10 DEF FNS(X) = X * X\n20 DEF FNG$(A$) = A$ + \"!\"\n\
                   30 PRINT FNS(3); FNG$(\"HI\")\n";
        assert_eq!(output(src), " 9 HI!\n");
    }

    #[test]
    fn input_reads_fields() {
        let src = "10 INPUT \"NAME\"; N$\n20 INPUT A, B\n30 PRINT N$; A + B\n";
        assert_eq!(output_with_input(src, &["BOB", "1, 2"]), "NAME? ? BOB 3 \n");
    }

    #[test]
    fn input_asks_again_on_wrong_field_count() {
        let src = "10 INPUT A, B\n20 PRINT A + B\n";
        assert_eq!(
            output_with_input(src, &["1", "1,2"]),
            "? ?Redo from start\n?  3 \n"
        );
        assert_eq!(output_with_input(src, &[]), "? \nInput past end\n");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn integer_sums_print_exactly(a in -1000i32..1000, b in -1000i32..1000) {
            let sum = a + b;
            let expected = if sum < 0 { format!("{sum} \n") } else { format!(" {sum} \n") };
            prop_assert_eq!(output(&format!("10 PRINT ({a}) + ({b})\n")), expected);
        }

        #[test]
        fn for_loop_sums_match(n in 1i32..40) {
            let src = format!("10 FOR I = 1 TO {n} : S = S + I : NEXT\n20 PRINT S\n");
            prop_assert_eq!(output(&src), format!(" {} \n", n * (n + 1) / 2));
        }
    }
}
