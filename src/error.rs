//! Superficie uniforme de diagnósticos.
//!
//! Toda falla de compilación es fatal y se reporta una única vez con
//! la posición donde ocurrió, en la forma `<archivo>:<línea>:<columna>:
//! <mensaje>`. No existen advertencias.

use crate::{lex::LexerError, parse::ParserError, source::Located};

use std::process;
use thiserror::Error;

/// Cualquier diagnóstico fatal de las fases de compilación.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Lexical(#[from] LexerError),

    #[error(transparent)]
    Parse(#[from] ParserError),
}

impl From<Located<LexerError>> for Located<CompileError> {
    fn from(error: Located<LexerError>) -> Self {
        error.map(CompileError::from)
    }
}

impl From<Located<ParserError>> for Located<CompileError> {
    fn from(error: Located<ParserError>) -> Self {
        error.map(CompileError::from)
    }
}

/// Reporta un diagnóstico sobre la salida de error y termina el
/// proceso con un código distinto de cero.
pub fn report(file: &str, error: &Located<CompileError>) -> ! {
    eprintln!("{}:{}: {}", file, error.position(), error.val());
    process::exit(1);
}
