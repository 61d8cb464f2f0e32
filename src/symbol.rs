//! Tipos de valores y tabla de símbolos.
//!
//! # Ámbitos
//! La tabla es una pila de ámbitos: el ámbito global vive durante toda
//! la compilación y cada subrutina abre uno nuevo encima al analizarse.
//! La búsqueda consulta primero el ámbito actual; de no encontrar,
//! continúa hacia afuera pero solo retorna coincidencias invocables.
//! Esta regla hace visibles las funciones y procedimientos globales
//! dentro de una subrutina sin exponer las variables de `main`.
//!
//! # Ownership
//! La tabla es dueña exclusiva de las propiedades insertadas y las
//! libera al cerrarse el ámbito que las contiene.

use crate::hashtable::HashTab;
use std::fmt::{self, Display};
use std::iter;

/// Clase base de un valor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Base {
    Integer,
    Boolean,

    /// Ausencia de valor, la "clase de retorno" de un procedimiento.
    None,
}

/// El tipo de una entidad del programa.
///
/// Un tipo es el producto de una clase base, un bit de arreglo y un
/// marcador de invocable. Una función tiene clase base distinta de
/// [`Base::None`]; un procedimiento la tiene igual.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ValType {
    base: Base,
    array: bool,
    callable: bool,
}

impl ValType {
    /// El escalar `integer`.
    pub const INTEGER: ValType = ValType::scalar(Base::Integer);

    /// El escalar `boolean`.
    pub const BOOLEAN: ValType = ValType::scalar(Base::Boolean);

    /// Ausencia de valor.
    pub const NONE: ValType = ValType::scalar(Base::None);

    /// Construye un tipo escalar.
    pub const fn scalar(base: Base) -> ValType {
        ValType {
            base,
            array: false,
            callable: false,
        }
    }

    /// Construye un tipo de arreglo unidimensional.
    pub const fn array(base: Base) -> ValType {
        ValType {
            base,
            array: true,
            callable: false,
        }
    }

    /// Marca un tipo de retorno como invocable.
    pub const fn callable(returns: ValType) -> ValType {
        ValType {
            callable: true,
            ..returns
        }
    }

    pub fn base(self) -> Base {
        self.base
    }

    pub fn is_callable(self) -> bool {
        self.callable
    }

    pub fn is_function(self) -> bool {
        self.callable && self.base != Base::None
    }

    pub fn is_procedure(self) -> bool {
        self.callable && self.base == Base::None
    }

    pub fn is_array(self) -> bool {
        self.array
    }

    pub fn is_scalar(self) -> bool {
        !self.array && !self.callable && self.base != Base::None
    }

    /// Tipo de los elementos de un arreglo.
    pub fn elem(self) -> ValType {
        ValType {
            array: false,
            ..self
        }
    }

    /// Tipo de retorno de un invocable.
    pub fn return_type(self) -> ValType {
        ValType {
            callable: false,
            ..self
        }
    }
}

impl Display for ValType {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.callable {
            return fmt.write_str(if self.base == Base::None {
                "procedure"
            } else {
                "function"
            });
        }

        let base = match self.base {
            Base::Integer => "integer",
            Base::Boolean => "boolean",
            Base::None => "none",
        };

        if self.array {
            write!(fmt, "{} array", base)
        } else {
            fmt.write_str(base)
        }
    }
}

/// Propiedades de un identificador en un ámbito.
#[derive(Debug, Clone)]
pub struct IdProp {
    typ: ValType,
    offset: u32,
    params: Vec<ValType>,
}

impl IdProp {
    /// Propiedades de una variable con su ranura de local asignada.
    pub fn variable(typ: ValType, offset: u32) -> Self {
        IdProp {
            typ,
            offset,
            params: Vec::new(),
        }
    }

    /// Propiedades de una función o procedimiento.
    pub fn callable(returns: ValType, params: Vec<ValType>) -> Self {
        IdProp {
            typ: ValType::callable(returns),
            offset: 1,
            params,
        }
    }

    pub fn typ(&self) -> ValType {
        self.typ
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Tipos de los parámetros declarados, en orden.
    pub fn params(&self) -> &[ValType] {
        &self.params
    }
}

/// Un ámbito: sus nombres y la ranura más alta asignada en él.
struct Scope {
    table: HashTab<IdProp>,
    max_offset: u32,
}

impl Scope {
    fn new() -> Self {
        Scope {
            table: HashTab::new(),
            max_offset: 0,
        }
    }
}

/// Tabla de símbolos de la unidad en compilación.
pub struct SymbolTable {
    global: Scope,
    subroutines: Vec<Scope>,
}

impl SymbolTable {
    /// Crea una tabla con solo el ámbito global.
    pub fn new() -> Self {
        SymbolTable {
            global: Scope::new(),
            subroutines: Vec::new(),
        }
    }

    /// Inserta en el ámbito actual.
    ///
    /// Falla si el nombre ya existe en el ámbito actual; los ámbitos
    /// exteriores no se consultan.
    pub fn insert(&mut self, name: &str, prop: IdProp) -> bool {
        let scope = self.subroutines.last_mut().unwrap_or(&mut self.global);
        if scope.table.search(name).is_some() {
            return false;
        }

        scope.max_offset = scope.max_offset.max(prop.offset());
        scope.table.insert(name.to_owned(), prop);
        true
    }

    /// Registra un invocable en el ámbito actual y abre su ámbito.
    pub fn open_subroutine(&mut self, name: &str, prop: IdProp) -> bool {
        if !self.insert(name, prop) {
            return false;
        }

        self.subroutines.push(Scope::new());
        true
    }

    /// Descarta el ámbito de la subrutina y todas sus entradas.
    pub fn close_subroutine(&mut self) {
        self.subroutines.pop();
    }

    /// Busca un nombre visible desde el ámbito actual.
    pub fn find(&self, name: &str) -> Option<&IdProp> {
        let Some((inner, rest)) = self.subroutines.split_last() else {
            return self.global.table.search(name);
        };

        if let Some(prop) = inner.table.search(name) {
            return Some(prop);
        }

        // Hacia afuera solo se filtran funciones y procedimientos
        for scope in rest.iter().rev().chain(iter::once(&self.global)) {
            if let Some(prop) = scope.table.search(name) {
                return prop.typ().is_callable().then_some(prop);
            }
        }

        None
    }

    /// Ranura más alta asignada en el ámbito actual, más uno.
    pub fn current_locals_width(&self) -> u32 {
        let scope = self.subroutines.last().unwrap_or(&self.global);
        scope.max_offset + 1
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_predicates() {
        assert!(ValType::INTEGER.is_scalar());
        assert!(!ValType::NONE.is_scalar());

        let ints = ValType::array(Base::Integer);
        assert!(ints.is_array());
        assert_eq!(ints.elem(), ValType::INTEGER);

        let function = ValType::callable(ValType::BOOLEAN);
        assert!(function.is_callable() && function.is_function());
        assert_eq!(function.return_type(), ValType::BOOLEAN);

        let procedure = ValType::callable(ValType::NONE);
        assert!(procedure.is_procedure() && !procedure.is_function());
    }

    #[test]
    fn type_display_matches_diagnostics() {
        assert_eq!(ValType::INTEGER.to_string(), "integer");
        assert_eq!(ValType::array(Base::Boolean).to_string(), "boolean array");
        assert_eq!(ValType::callable(ValType::NONE).to_string(), "procedure");
    }

    #[test]
    fn duplicate_insertion_in_scope_fails() {
        let mut symbols = SymbolTable::new();
        assert!(symbols.insert("x", IdProp::variable(ValType::INTEGER, 1)));
        assert!(!symbols.insert("x", IdProp::variable(ValType::BOOLEAN, 2)));
    }

    #[test]
    fn inner_scope_shadows_and_leaks_only_callables() {
        let mut symbols = SymbolTable::new();
        symbols.insert("x", IdProp::variable(ValType::INTEGER, 1));
        symbols.insert(
            "f",
            IdProp::callable(ValType::INTEGER, vec![ValType::INTEGER]),
        );

        assert!(symbols.open_subroutine("g", IdProp::callable(ValType::NONE, Vec::new())));
        symbols.insert("x", IdProp::variable(ValType::BOOLEAN, 0));

        // La variable interna oculta a la global
        let inner = symbols.find("x").expect("inner x");
        assert_eq!(inner.typ(), ValType::BOOLEAN);

        // Los invocables globales se filtran hacia adentro
        assert!(symbols.find("f").is_some());
        assert!(symbols.find("g").is_some());

        // Una variable solo global no es visible
        symbols.close_subroutine();
        symbols.insert("y", IdProp::variable(ValType::INTEGER, 2));
        symbols.open_subroutine("h", IdProp::callable(ValType::NONE, Vec::new()));
        assert!(symbols.find("y").is_none());

        // Al cerrar, el estado exterior reaparece intacto
        symbols.close_subroutine();
        assert_eq!(symbols.find("x").expect("global x").typ(), ValType::INTEGER);
        assert!(symbols.find("y").is_some());
    }

    #[test]
    fn duplicate_subroutine_name_fails() {
        let mut symbols = SymbolTable::new();
        assert!(symbols.open_subroutine("f", IdProp::callable(ValType::NONE, Vec::new())));
        symbols.close_subroutine();
        assert!(!symbols.open_subroutine("f", IdProp::callable(ValType::NONE, Vec::new())));
    }

    #[test]
    fn locals_width_tracks_the_highest_offset() {
        let mut symbols = SymbolTable::new();
        symbols.open_subroutine("f", IdProp::callable(ValType::NONE, Vec::new()));
        assert_eq!(symbols.current_locals_width(), 1);

        symbols.insert("a", IdProp::variable(ValType::INTEGER, 0));
        symbols.insert("b", IdProp::variable(ValType::INTEGER, 1));
        assert_eq!(symbols.current_locals_width(), 2);
    }
}
