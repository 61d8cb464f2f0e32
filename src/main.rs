use anyhow::Context;
use clap::{crate_version, Arg, Command};

use alanc::{error, jasmin::Assembler};

use std::{env, fs::File, path::PathBuf};

fn main() -> anyhow::Result<()> {
    let args = Command::new("alanc")
        .version(crate_version!())
        .about("ALAN-2022 compiler")
        .arg(
            Arg::new("source")
                .value_name("FILE")
                .required(true)
                .help("Source file to compile"),
        )
        .get_matches();

    let source_path = args
        .get_one::<String>("source")
        .expect("main.rs allowed a missing source argument");

    // El ensamblador debe estar disponible antes de compilar
    let jasmin_jar =
        env::var("JASMIN_JAR").context("JASMIN_JAR environment variable not set")?;

    let source = std::fs::read(source_path)
        .with_context(|| format!("file '{}' could not be opened", source_path))?;

    let class = match alanc::compile(&source) {
        Ok(class) => class,
        Err(compile_error) => error::report(source_path, &compile_error),
    };

    let listing = PathBuf::from(format!("{}.j", class.class()));
    let mut output = File::create(&listing)
        .with_context(|| format!("failed to open for writing: {}", listing.display()))?;

    class
        .emit(&mut output)
        .with_context(|| format!("failed to emit to file: {}", listing.display()))?;

    let assembler =
        Assembler::spawn(&jasmin_jar, &listing).context("failed to start the assembler")?;

    assembler
        .finish()
        .with_context(|| format!("failed to generate class file for: {}", listing.display()))?;

    Ok(())
}
