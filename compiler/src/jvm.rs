//! Java platform classes and members the generated code relies on.
use classfile::MemberRef;

pub const STRING: &str = "java/lang/String";
pub const EXCEPTION: &str = "java/lang/Exception";
pub const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
pub const INDEX_OUT_OF_BOUNDS: &str = "java/lang/ArrayIndexOutOfBoundsException";
pub const NEGATIVE_ARRAY_SIZE: &str = "java/lang/NegativeArraySizeException";
pub const NUMBER_FORMAT: &str = "java/lang/NumberFormatException";
pub const BUFFERED_READER: &str = "java/io/BufferedReader";
pub const INPUT_STREAM_READER: &str = "java/io/InputStreamReader";

const PRINT_STREAM: &str = "java/io/PrintStream";

pub fn system_out() -> MemberRef {
    MemberRef::new("java/lang/System", "out", "Ljava/io/PrintStream;")
}

pub fn system_in() -> MemberRef {
    MemberRef::new("java/lang/System", "in", "Ljava/io/InputStream;")
}

pub fn arraycopy() -> MemberRef {
    MemberRef::new(
        "java/lang/System",
        "arraycopy",
        "(Ljava/lang/Object;ILjava/lang/Object;II)V",
    )
}

pub fn print_chars() -> MemberRef {
    MemberRef::new(PRINT_STREAM, "print", "([C)V")
}

pub fn print_char() -> MemberRef {
    MemberRef::new(PRINT_STREAM, "print", "(C)V")
}

pub fn flush() -> MemberRef {
    MemberRef::new(PRINT_STREAM, "flush", "()V")
}

/// A static method of `java/lang/Math`.
pub fn math(name: &str, descriptor: &str) -> MemberRef {
    MemberRef::new("java/lang/Math", name, descriptor)
}

pub fn round() -> MemberRef {
    math("round", "(F)I")
}

pub fn to_char_array() -> MemberRef {
    MemberRef::new(STRING, "toCharArray", "()[C")
}

pub fn string_from_chars() -> MemberRef {
    MemberRef::new(STRING, "<init>", "([C)V")
}

pub fn trim() -> MemberRef {
    MemberRef::new(STRING, "trim", "()Ljava/lang/String;")
}

pub fn parse_float() -> MemberRef {
    MemberRef::new("java/lang/Float", "parseFloat", "(Ljava/lang/String;)F")
}

pub fn float_to_string() -> MemberRef {
    MemberRef::new("java/lang/Float", "toString", "(F)Ljava/lang/String;")
}

pub fn int_to_string() -> MemberRef {
    MemberRef::new("java/lang/Integer", "toString", "(I)Ljava/lang/String;")
}

pub fn get_message() -> MemberRef {
    MemberRef::new("java/lang/Throwable", "getMessage", "()Ljava/lang/String;")
}

pub fn runtime_exception_init() -> MemberRef {
    MemberRef::new(RUNTIME_EXCEPTION, "<init>", "(Ljava/lang/String;)V")
}

pub fn input_stream_reader_init() -> MemberRef {
    MemberRef::new(INPUT_STREAM_READER, "<init>", "(Ljava/io/InputStream;)V")
}

pub fn buffered_reader_init() -> MemberRef {
    MemberRef::new(BUFFERED_READER, "<init>", "(Ljava/io/Reader;)V")
}

pub fn read_line() -> MemberRef {
    MemberRef::new(BUFFERED_READER, "readLine", "()Ljava/lang/String;")
}
