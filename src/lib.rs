//! Compilador de programa completo para el lenguaje ALAN-2022.
//!
//! La compilación es un solo paso sobre la unidad fuente: el analizador
//! sintáctico consume tokens del escáner, comprueba tipos en línea
//! consultando la tabla de símbolos y dirige al emisor, que acumula el
//! listado de la clase JVM resultante. El listado se escribe a un
//! archivo `.j` que un ensamblador externo traduce a un `.class`.

#[macro_use]
mod macros;

mod hashtable;

pub mod codegen;
pub mod error;
pub mod jasmin;
pub mod lex;
pub mod parse;
pub mod source;
pub mod symbol;

pub use error::CompileError;

use codegen::Assembly;
use source::{Located, Reader};

/// Compila una unidad fuente completa a su clase JVM.
pub fn compile(source: &[u8]) -> Result<Assembly, Located<CompileError>> {
    let scanner = lex::Scanner::new(Reader::new(source));
    let parser = parse::Parser::new(scanner)?;
    Ok(parser.parse_source()?)
}
