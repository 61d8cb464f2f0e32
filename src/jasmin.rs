//! Invocación del ensamblador externo.
//!
//! El listado `.j` emitido se traduce a un archivo de clase ejecutable
//! con el ensamblador Jasmin, cuya ubicación indica la variable de
//! entorno `JASMIN_JAR`.

use std::{
    path::Path,
    process::{Child, Command, ExitStatus},
};

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("assembler exited with status code {0:?}")]
    Failed(ExitStatus),
}

/// Proceso hijo ejecutando al ensamblador.
pub struct Assembler(Child);

impl Assembler {
    /// Lanza el ensamblador sobre un listado ya escrito a disco.
    pub fn spawn<J, L>(jar: &J, listing: &L) -> Result<Assembler, AssemblerError>
    where
        J: AsRef<Path>,
        L: AsRef<Path>,
    {
        Command::new("java")
            .arg("-jar")
            .arg(jar.as_ref())
            .arg(listing.as_ref())
            .spawn()
            .map(Assembler)
            .map_err(AssemblerError::Io)
    }

    /// Espera la terminación del ensamblador.
    pub fn finish(mut self) -> Result<(), AssemblerError> {
        let status = self.0.wait().map_err(AssemblerError::Io)?;
        if status.success() {
            Ok(())
        } else {
            Err(AssemblerError::Failed(status))
        }
    }
}
