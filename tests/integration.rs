use alanc::compile;

fn assemble(source: &str) -> String {
    let class = compile(source.as_bytes()).expect("program was rejected");
    let mut buffer = Vec::new();
    class.emit(&mut buffer).expect("emit failed");
    String::from_utf8(buffer).expect("non-UTF-8 listing")
}

fn diagnostic(source: &str) -> String {
    let error = compile(source.as_bytes()).expect_err("program was accepted");
    format!("{}: {}", error.position(), error.val())
}

#[test]
fn empty_program_emits_an_empty_main() {
    let asm = assemble("source P begin relax end");

    assert!(asm.contains(".class public P"));
    assert!(asm.contains(".super java/lang/Object"));
    assert!(asm.contains(".method public static main([Ljava/lang/String;)V"));
    assert!(asm.contains("\treturn"));
    assert!(asm.contains(".end method"));
}

#[test]
fn arithmetic_respects_precedence() {
    let asm = assemble("source P begin integer x; x := 2 + 3 * 4 end");

    // El producto se emite antes que la suma
    let imul = asm.find("imul").expect("missing imul");
    let iadd = asm.find("iadd").expect("missing iadd");
    assert!(imul < iadd);

    assert!(asm.contains("ldc 2"));
    assert!(asm.contains("ldc 3"));
    assert!(asm.contains("ldc 4"));
    assert!(asm.contains("istore 1"));

    // main termina con un retorno
    let main = asm.split(".method").nth(1).expect("missing main");
    let body: Vec<&str> = main
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('.'))
        .collect();
    assert_eq!(body.last(), Some(&"return"));
}

#[test]
fn functions_compile_to_static_methods() {
    let asm = assemble(
        "source P
         function f(integer a) to integer begin leave a + 1 end
         begin relax end",
    );

    assert!(asm.contains(".method public static f(I)I"));
    assert!(asm.contains("iload 0"));
    assert!(asm.contains("ldc 1"));
    assert!(asm.contains("iadd"));
    assert!(asm.contains("ireturn"));
}

#[test]
fn missing_leave_in_a_function_is_an_error() {
    let message = diagnostic(
        "source P
         function f(integer a) to integer begin put a end
         begin relax end",
    );
    assert!(message.contains("function 'f' must leave a value"));
}

#[test]
fn calls_push_arguments_left_to_right() {
    let asm = assemble(
        "source P
         function sum(integer a, integer b) to integer begin leave a + b end
         begin put sum(3, 4) end",
    );

    assert!(asm.contains(".method public static sum(II)I"));
    assert!(asm.contains("invokestatic P/sum(II)I"));

    let first = asm.rfind("ldc 3").expect("missing first argument");
    let second = asm.rfind("ldc 4").expect("missing second argument");
    assert!(first < second);
}

#[test]
fn procedure_calls_invoke_void_methods() {
    let asm = assemble(
        "source P
         function greet() begin put \"hola\" end
         begin call greet() end",
    );

    assert!(asm.contains(".method public static greet()V"));
    assert!(asm.contains("invokestatic P/greet()V"));
}

#[test]
fn while_loops_jump_back_to_their_head() {
    let asm = assemble(
        "source P begin
            integer i;
            i := 0;
            while i < 10 do i := i + 1 end
         end",
    );

    assert!(asm.contains("if_icmplt"));
    assert!(asm.contains("if_icmpeq"));
    assert!(asm.contains("goto"));
}

#[test]
fn if_elsif_else_chains_compile() {
    let asm = assemble(
        "source P begin
            integer x;
            x := 5;
            if x < 0 then put \"neg\"
            elsif x = 0 then put \"zero\"
            else put \"pos\"
            end
         end",
    );

    assert!(asm.contains("if_icmplt"));
    assert!(asm.contains("if_icmpeq"));
    assert!(asm.contains("ldc \"pos\""));
}

#[test]
fn output_prints_per_operand_type() {
    let asm = assemble("source P begin put \"x = \" . 42 . \"\\n\" . true end");

    assert!(asm.contains("getstatic java/lang/System/out Ljava/io/PrintStream;"));
    assert!(asm.contains("ldc \"x = \""));
    assert!(asm.contains("ldc \"\\n\""));
    assert!(asm.contains("invokevirtual java/io/PrintStream/print(Ljava/lang/String;)V"));
    assert!(asm.contains("invokevirtual java/io/PrintStream/print(I)V"));
    assert!(asm.contains("invokevirtual java/io/PrintStream/print(Z)V"));
}

#[test]
fn input_reads_through_a_class_scanner() {
    let asm = assemble("source P begin integer x; get x; put x end");

    assert!(asm.contains(".field private static $in Ljava/util/Scanner;"));
    assert!(asm.contains(".method static <clinit>()V"));
    assert!(asm.contains("getstatic P/$in Ljava/util/Scanner;"));
    assert!(asm.contains("invokevirtual java/util/Scanner/nextInt()I"));
}

#[test]
fn arrays_allocate_index_and_store() {
    let asm = assemble(
        "source P begin
            integer array a;
            a := array 10;
            a[3] := 7;
            put a[3]
         end",
    );

    assert!(asm.contains("newarray int"));
    assert!(asm.contains("astore 1"));
    assert!(asm.contains("aload 1"));
    assert!(asm.contains("iastore"));
    assert!(asm.contains("iaload"));
}

#[test]
fn boolean_arrays_use_byte_element_access() {
    let asm = assemble(
        "source P begin
            boolean array flags;
            flags := array 8;
            flags[0] := true;
            put flags[0]
         end",
    );

    assert!(asm.contains("newarray boolean"));
    assert!(asm.contains("bastore"));
    assert!(asm.contains("baload"));
}

#[test]
fn incompatible_assignment_reports_both_types() {
    let message = diagnostic("source P begin boolean b; b := 1 end");
    assert!(message.contains("incompatible types (expected boolean, found integer)"));
    assert!(message.starts_with("1:"));
}

#[test]
fn nested_comments_are_transparent() {
    let plain = assemble("source P begin relax end");
    let commented = assemble("source P { outer { inner } still-outer } begin relax end");
    assert_eq!(plain, commented);
}

#[test]
fn long_string_literals_compile() {
    let long = "y".repeat(1025);
    let asm = assemble(&format!("source P begin put \"{}\" end", long));
    assert!(asm.contains(&long));
}

#[test]
fn numeric_overflow_is_a_lexical_error() {
    let message = diagnostic("source P begin integer x; x := 2147483648 end");
    assert!(message.contains("number too large"));
}

#[test]
fn syntax_errors_name_the_expected_construct() {
    let message = diagnostic("source P begin integer x; x := end");
    assert!(message.contains("expected array allocation or expression, but found `end`"));

    let message = diagnostic("source P begin put end end");
    assert!(message.contains("expected expression or string, but found `end`"));

    let message = diagnostic("source P begin if relax then relax end end");
    assert!(message.contains("expected factor, but found `relax`"));
}

#[test]
fn diagnostics_carry_line_and_column() {
    let message = diagnostic("source P begin\n  integer x;\n  x := y\nend");
    assert_eq!(message, "3:8: unknown identifier 'y'");
}

#[test]
fn missing_source_header_is_a_syntax_error() {
    let message = diagnostic("begin relax end");
    assert!(message.contains("expected `source`, but found `begin`"));
}
