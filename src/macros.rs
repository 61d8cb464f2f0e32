macro_rules! emit {
    ($output:expr, $($format:tt)*) => {{
        write!($output, "\t")?;
        writeln!($output, $($format)*)
    }};
}
