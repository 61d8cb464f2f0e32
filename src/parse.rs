//! Análisis sintáctico, comprobación de tipos y dirección de la emisión.
//!
//! # Descenso recursivo
//! El analizador implementa una rutina por cada no terminal de la
//! gramática, dirigida por un único token de lookahead. Cada rutina
//! consume exactamente su producción y deja un token de lookahead
//! vigente al retornar. Las reglas de tipos se comprueban en línea
//! durante el reconocimiento, y el código se emite en el mismo paso:
//! no se construye un árbol de sintaxis.
//!
//! # Estado compartido
//! Todo el estado mutable de la compilación (lookahead, tabla de
//! símbolos, emisor, tipo de retorno vigente) viaja en el [`Parser`]
//! en vez de variables globales, lo cual permite ejercitar las rutinas
//! individualmente.
//!
//! # Errores
//! No hay recuperación: el primer diagnóstico sintáctico o semántico
//! termina la compilación a través del canal único de [`Parse`].

use crate::{
    codegen::{self, Assembly, Cond, ElemKind, Instruction, Label, PrintKind, ReadKind},
    lex::{Keyword, LexerError, Scanner, Token},
    source::{Located, Position},
    symbol::{Base, IdProp, SymbolTable, ValType},
};

use thiserror::Error;

pub type Parse<T> = Result<T, Located<ParserError>>;

/// Error de análisis sintáctico o semántico.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    /// Error del escáner, emergiendo a través del analizador.
    #[error(transparent)]
    Lexical(#[from] LexerError),

    /// El lookahead no coincide con la producción en curso.
    #[error("expected {expected}, but found {found}")]
    Expected { expected: String, found: Token },

    #[error("multiple definition of '{0}'")]
    MultipleDefinition(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("'{0}' is not a variable")]
    NotAVariable(String),

    #[error("'{0}' is not an array")]
    NotAnArray(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("'{0}' is not a procedure")]
    NotAProcedure(String),

    #[error("scalar value expected, but found {0}")]
    ScalarExpected(ValType),

    #[error("too few arguments for call to '{0}'")]
    TooFewArguments(String),

    #[error("too many arguments for call to '{0}'")]
    TooManyArguments(String),

    #[error("incompatible types (expected {expected}, found {found})")]
    IncompatibleTypes { expected: ValType, found: ValType },

    #[error("illegal array operation")]
    IllegalArrayOperation,

    #[error("a procedure may not leave a value")]
    LeaveWithValue,

    #[error("function '{0}' must leave a value")]
    MissingLeave(String),
}

impl From<Located<LexerError>> for Located<ParserError> {
    fn from(error: Located<LexerError>) -> Self {
        error.map(ParserError::from)
    }
}

/// Contexto de compilación de una unidad.
///
/// El analizador es dueño del escáner, del token de lookahead, de la
/// tabla de símbolos y del emisor durante toda la compilación.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    token: Located<Token>,
    symbols: SymbolTable,
    gen: Assembly,
    return_type: Option<ValType>,
    subroutine: String,
    leaves: bool,
}

impl<'a> Parser<'a> {
    /// Crea el contexto y carga el primer token de lookahead.
    pub fn new(mut scanner: Scanner<'a>) -> Parse<Self> {
        let token = scanner.next_token()?;

        Ok(Parser {
            scanner,
            token,
            symbols: SymbolTable::new(),
            gen: Assembly::new(),
            return_type: None,
            subroutine: String::new(),
            leaves: false,
        })
    }

    /// source = "source" id {funcdef} body
    ///
    /// Reconoce la unidad completa y retorna la clase emitida.
    pub fn parse_source(mut self) -> Parse<Assembly> {
        self.expect(Token::Keyword(Keyword::Source))?;
        let class = self.expect_id()?;
        self.gen.set_class(class.val());

        while *self.token.val() == Token::Keyword(Keyword::Function) {
            self.parse_funcdef()?;
        }

        // El cuerpo de nivel superior es la subrutina implícita `main`;
        // su ranura 0 la ocupa el arreglo de argumentos de la JVM
        let prop = IdProp::callable(ValType::NONE, Vec::new());
        if !self.symbols.open_subroutine("main", prop) {
            let error = ParserError::MultipleDefinition(String::from("main"));
            return Err(Located::at(error, self.token.position()));
        }

        self.gen
            .begin_subroutine("main", String::from("([Ljava/lang/String;)V"), 1);
        self.return_type = None;
        self.subroutine = String::from("main");

        self.parse_body()?;
        self.gen.push(Instruction::Return);

        let width = self.symbols.current_locals_width();
        self.symbols.close_subroutine();
        self.gen.end_subroutine(width + 1);

        self.expect(Token::Eof)?;
        Ok(self.gen)
    }

    /// funcdef = "function" id "(" [type id {"," type id}] ")" ["to" type] body
    fn parse_funcdef(&mut self) -> Parse<()> {
        self.expect(Token::Keyword(Keyword::Function))?;
        let (name_pos, name) = self.expect_id()?.split();
        self.expect(Token::OpenParen)?;

        let mut params = Vec::new();
        if is_type(self.token.val()) {
            loop {
                let typ = self.parse_type()?;
                let id = self.expect_id()?;
                params.push((id, typ));

                if *self.token.val() == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::CloseParen)?;

        let returns = if *self.token.val() == Token::Keyword(Keyword::To) {
            self.advance()?;
            Some(self.parse_type()?)
        } else {
            None
        };

        let param_types: Vec<ValType> = params.iter().map(|&(_, typ)| typ).collect();
        let return_type = returns.unwrap_or(ValType::NONE);
        let descriptor = codegen::method_descriptor(&param_types, return_type);

        let prop = IdProp::callable(return_type, param_types);
        if !self.symbols.open_subroutine(&name, prop) {
            return Err(Located::at(ParserError::MultipleDefinition(name), name_pos));
        }

        self.gen
            .begin_subroutine(&name, descriptor, params.len() as u32);

        // Los parámetros ocupan las primeras ranuras, en orden
        for (offset, (id, typ)) in params.into_iter().enumerate() {
            let (pos, id) = id.split();
            if !self.symbols.insert(&id, IdProp::variable(typ, offset as u32)) {
                return Err(Located::at(ParserError::MultipleDefinition(id), pos));
            }
        }

        self.return_type = returns;
        self.subroutine = name.clone();
        self.leaves = false;

        self.parse_body()?;

        match returns {
            None => self.gen.push(Instruction::Return),

            Some(returns) => {
                if !self.leaves {
                    return Err(Located::at(ParserError::MissingLeave(name), name_pos));
                }

                // Respaldo por si el control alcanza el final del cuerpo
                self.gen.push(Instruction::Ldc(0));
                if returns.is_array() {
                    self.gen
                        .push(Instruction::NewArray(elem_kind(returns.base())));
                    self.gen.push(Instruction::AReturn);
                } else {
                    self.gen.push(Instruction::IReturn);
                }
            }
        }

        let width = self.symbols.current_locals_width();
        self.symbols.close_subroutine();
        self.gen.end_subroutine(width + 1);
        self.return_type = None;

        Ok(())
    }

    /// body = "begin" {vardef} statements "end"
    fn parse_body(&mut self) -> Parse<()> {
        self.expect(Token::Keyword(Keyword::Begin))?;

        while is_type(self.token.val()) {
            self.parse_vardef()?;
        }

        self.parse_statements()?;
        self.expect(Token::Keyword(Keyword::End))?;
        Ok(())
    }

    /// type = ("boolean" | "integer") ["array"]
    fn parse_type(&mut self) -> Parse<ValType> {
        let base = match self.token.val() {
            Token::Keyword(Keyword::Boolean) => Base::Boolean,
            Token::Keyword(Keyword::Integer) => Base::Integer,
            _ => return Err(self.expected("type")),
        };
        self.advance()?;

        if *self.token.val() == Token::Keyword(Keyword::Array) {
            self.advance()?;
            Ok(ValType::array(base))
        } else {
            Ok(ValType::scalar(base))
        }
    }

    /// vardef = type id {"," id} ";"
    fn parse_vardef(&mut self) -> Parse<()> {
        let typ = self.parse_type()?;

        loop {
            let (pos, id) = self.expect_id()?.split();
            let offset = self.gen.alloc_local();
            if !self.symbols.insert(&id, IdProp::variable(typ, offset)) {
                return Err(Located::at(ParserError::MultipleDefinition(id), pos));
            }

            if *self.token.val() == Token::Comma {
                self.advance()?;
            } else {
                break;
            }
        }

        self.expect(Token::Semicolon)?;
        Ok(())
    }

    /// statements = "relax" | statement {";" statement}
    fn parse_statements(&mut self) -> Parse<()> {
        if *self.token.val() == Token::Keyword(Keyword::Relax) {
            self.advance()?;
            return Ok(());
        }

        self.parse_statement()?;
        while *self.token.val() == Token::Semicolon {
            self.advance()?;
            self.parse_statement()?;
        }

        Ok(())
    }

    /// statement = assign | call | if | input | leave | output | while
    fn parse_statement(&mut self) -> Parse<()> {
        match self.token.val() {
            Token::Id(_) => self.parse_assign(),
            Token::Keyword(Keyword::Call) => self.parse_call(),
            Token::Keyword(Keyword::If) => self.parse_if(),
            Token::Keyword(Keyword::Get) => self.parse_input(),
            Token::Keyword(Keyword::Leave) => self.parse_leave(),
            Token::Keyword(Keyword::Put) => self.parse_output(),
            Token::Keyword(Keyword::While) => self.parse_while(),
            _ => Err(self.expected("statement")),
        }
    }

    /// assign = id ["[" simple "]"] ":=" (expr | "array" simple)
    fn parse_assign(&mut self) -> Parse<()> {
        let id = self.expect_id()?;
        let prop = self.find(&id)?;
        if prop.typ().is_callable() {
            let error = ParserError::NotAVariable(id.val().clone());
            return Err(Located::at(error, id.position()));
        }

        if *self.token.val() == Token::OpenBracket {
            // Asignación a un elemento: referencia, índice, valor
            if !prop.typ().is_array() {
                let error = ParserError::NotAnArray(id.val().clone());
                return Err(Located::at(error, id.position()));
            }

            self.gen.push(Instruction::ALoad(prop.offset()));
            self.parse_subscript()?;
            self.expect(Token::Gets)?;

            if *self.token.val() == Token::Keyword(Keyword::Array) {
                let error = ParserError::IllegalArrayOperation;
                return Err(Located::at(error, self.token.position()));
            }

            if !starts_expr(self.token.val()) {
                return Err(self.expected("array allocation or expression"));
            }

            let pos = self.token.position();
            let typ = self.parse_expr()?;
            Self::check_types(typ, prop.typ().elem(), pos)?;
            self.gen.push(elem_store(prop.typ().base()));
        } else {
            self.expect(Token::Gets)?;

            if *self.token.val() == Token::Keyword(Keyword::Array) {
                // Asignación de un arreglo nuevo de la longitud dada
                if !prop.typ().is_array() {
                    let error = ParserError::NotAnArray(id.val().clone());
                    return Err(Located::at(error, id.position()));
                }

                self.advance()?;
                let pos = self.token.position();
                let typ = self.parse_simple()?;
                Self::check_types(typ, ValType::INTEGER, pos)?;

                self.gen
                    .push(Instruction::NewArray(elem_kind(prop.typ().base())));
                self.gen.push(Instruction::AStore(prop.offset()));
            } else if starts_expr(self.token.val()) {
                let pos = self.token.position();
                let typ = self.parse_expr()?;
                Self::check_types(typ, prop.typ(), pos)?;

                if prop.typ().is_array() {
                    self.gen.push(Instruction::AStore(prop.offset()));
                } else {
                    self.gen.push(Instruction::IStore(prop.offset()));
                }
            } else {
                return Err(self.expected("array allocation or expression"));
            }
        }

        Ok(())
    }

    /// call = "call" id "(" [expr {"," expr}] ")"
    fn parse_call(&mut self) -> Parse<()> {
        self.expect(Token::Keyword(Keyword::Call))?;
        let id = self.expect_id()?;
        let prop = self.find(&id)?;

        if !prop.typ().is_procedure() {
            let error = ParserError::NotAProcedure(id.val().clone());
            return Err(Located::at(error, id.position()));
        }

        self.parse_arguments(&id, &prop)?;
        self.gen.push(Instruction::InvokeStatic {
            name: id.val().clone(),
            descriptor: codegen::method_descriptor(prop.params(), prop.typ().return_type()),
            args: prop.params().len() as u32,
            returns: false,
        });

        Ok(())
    }

    /// if = "if" expr "then" statements {"elsif" expr "then" statements}
    ///      ["else" statements] "end"
    fn parse_if(&mut self) -> Parse<()> {
        let end = self.gen.new_label();

        self.expect(Token::Keyword(Keyword::If))?;
        let mut next = self.parse_condition()?;
        self.expect(Token::Keyword(Keyword::Then))?;
        self.parse_statements()?;

        while *self.token.val() == Token::Keyword(Keyword::Elsif) {
            self.gen.push(Instruction::Goto(end));
            self.gen.push(Instruction::SetLabel(next));

            self.advance()?;
            next = self.parse_condition()?;
            self.expect(Token::Keyword(Keyword::Then))?;
            self.parse_statements()?;
        }

        if *self.token.val() == Token::Keyword(Keyword::Else) {
            self.gen.push(Instruction::Goto(end));
            self.gen.push(Instruction::SetLabel(next));

            self.advance()?;
            self.parse_statements()?;
        } else {
            self.gen.push(Instruction::SetLabel(next));
        }

        self.expect(Token::Keyword(Keyword::End))?;
        self.gen.push(Instruction::SetLabel(end));
        Ok(())
    }

    /// input = "get" id ["[" simple "]"]
    fn parse_input(&mut self) -> Parse<()> {
        self.expect(Token::Keyword(Keyword::Get))?;
        let id = self.expect_id()?;
        let prop = self.find(&id)?;

        if prop.typ().is_callable() {
            let error = ParserError::NotAVariable(id.val().clone());
            return Err(Located::at(error, id.position()));
        }

        if *self.token.val() == Token::OpenBracket {
            if !prop.typ().is_array() {
                let error = ParserError::NotAnArray(id.val().clone());
                return Err(Located::at(error, id.position()));
            }

            self.gen.push(Instruction::ALoad(prop.offset()));
            self.parse_subscript()?;
            self.gen.push(Instruction::GetIn);
            self.gen.push(Instruction::Read(read_kind(prop.typ().base())));
            self.gen.push(elem_store(prop.typ().base()));
        } else {
            if prop.typ().is_array() {
                let error = ParserError::ScalarExpected(prop.typ());
                return Err(Located::at(error, id.position()));
            }

            self.gen.push(Instruction::GetIn);
            self.gen.push(Instruction::Read(read_kind(prop.typ().base())));
            self.gen.push(Instruction::IStore(prop.offset()));
        }

        Ok(())
    }

    /// leave = "leave" [expr]
    fn parse_leave(&mut self) -> Parse<()> {
        let pos = self.expect(Token::Keyword(Keyword::Leave))?;

        if starts_expr(self.token.val()) {
            let Some(returns) = self.return_type else {
                return Err(Located::at(ParserError::LeaveWithValue, pos));
            };

            let pos = self.token.position();
            let typ = self.parse_expr()?;
            Self::check_types(typ, returns, pos)?;
            self.leaves = true;

            self.gen.push(if returns.is_array() {
                Instruction::AReturn
            } else {
                Instruction::IReturn
            });
        } else {
            if self.return_type.is_some() {
                let error = ParserError::MissingLeave(self.subroutine.clone());
                return Err(Located::at(error, pos));
            }

            self.gen.push(Instruction::Return);
        }

        Ok(())
    }

    /// output = "put" (string | expr) {"." (string | expr)}
    fn parse_output(&mut self) -> Parse<()> {
        self.expect(Token::Keyword(Keyword::Put))?;
        self.parse_put_operand()?;

        while *self.token.val() == Token::Concatenate {
            self.advance()?;
            self.parse_put_operand()?;
        }

        Ok(())
    }

    /// Una cadena o expresión escalar de `put`.
    ///
    /// El receptor de la impresión debe apilarse antes que el operando.
    fn parse_put_operand(&mut self) -> Parse<()> {
        if let Token::Str(_) = self.token.val() {
            self.gen.push(Instruction::GetOut);

            let string = match self.advance()?.into_inner() {
                Token::Str(string) => string,
                _ => unreachable!(),
            };

            let index = self.gen.intern_string(string);
            self.gen.push(Instruction::LdcString(index));
            self.gen.push(Instruction::Print(PrintKind::Str));
            Ok(())
        } else if starts_expr(self.token.val()) {
            self.gen.push(Instruction::GetOut);

            let pos = self.token.position();
            let typ = self.parse_expr()?;
            if !typ.is_scalar() {
                return Err(Located::at(ParserError::ScalarExpected(typ), pos));
            }

            self.gen.push(Instruction::Print(print_kind(typ.base())));
            Ok(())
        } else {
            Err(self.expected("expression or string"))
        }
    }

    /// while = "while" expr "do" statements "end"
    fn parse_while(&mut self) -> Parse<()> {
        self.expect(Token::Keyword(Keyword::While))?;

        let head = self.gen.new_label();
        self.gen.push(Instruction::SetLabel(head));
        let exit = self.parse_condition()?;

        self.expect(Token::Keyword(Keyword::Do))?;
        self.parse_statements()?;
        self.expect(Token::Keyword(Keyword::End))?;

        self.gen.push(Instruction::Goto(head));
        self.gen.push(Instruction::SetLabel(exit));
        Ok(())
    }

    /// expr = simple [relop simple]
    ///
    /// Retorna el tipo del valor que queda en la pila de operandos.
    fn parse_expr(&mut self) -> Parse<ValType> {
        let pos = self.token.position();
        let left = self.parse_simple()?;

        // (condición, ¿es igualdad?)
        let relop = match self.token.val() {
            Token::Equal => (Cond::Eq, true),
            Token::NotEqual => (Cond::Ne, true),
            Token::Less => (Cond::Lt, false),
            Token::LessEqual => (Cond::Le, false),
            Token::Greater => (Cond::Gt, false),
            Token::GreaterEqual => (Cond::Ge, false),
            _ => return Ok(left),
        };

        let (cond, equality) = relop;
        if equality {
            // La igualdad admite ambos escalares, pero del mismo tipo
            if !left.is_scalar() {
                return Err(Located::at(ParserError::ScalarExpected(left), pos));
            }
        } else {
            Self::check_types(left, ValType::INTEGER, pos)?;
        }

        self.advance()?;
        let pos = self.token.position();
        let right = self.parse_simple()?;
        let expected = if equality { left } else { ValType::INTEGER };
        Self::check_types(right, expected, pos)?;

        self.materialize(cond);
        Ok(ValType::BOOLEAN)
    }

    /// simple = ["-"] term {addop term}
    fn parse_simple(&mut self) -> Parse<ValType> {
        let negate = *self.token.val() == Token::Minus;
        if negate {
            self.advance()?;
        }

        let pos = self.token.position();
        let mut typ = self.parse_term()?;

        if negate {
            Self::check_types(typ, ValType::INTEGER, pos)?;
            self.gen.push(Instruction::Ineg);
        }

        loop {
            let (op, expected) = match self.token.val() {
                Token::Plus => (Instruction::Iadd, ValType::INTEGER),
                Token::Minus => (Instruction::Isub, ValType::INTEGER),
                Token::Keyword(Keyword::Or) => (Instruction::Ior, ValType::BOOLEAN),
                _ => break,
            };

            Self::check_types(typ, expected, pos)?;
            self.advance()?;

            let rpos = self.token.position();
            let right = self.parse_term()?;
            Self::check_types(right, expected, rpos)?;

            self.gen.push(op);
            typ = expected;
        }

        Ok(typ)
    }

    /// term = factor {mulop factor}
    fn parse_term(&mut self) -> Parse<ValType> {
        let pos = self.token.position();
        let mut typ = self.parse_factor()?;

        loop {
            let (op, expected) = match self.token.val() {
                Token::Times => (Instruction::Imul, ValType::INTEGER),
                Token::Divide => (Instruction::Idiv, ValType::INTEGER),
                Token::Keyword(Keyword::Remainder) => (Instruction::Irem, ValType::INTEGER),
                Token::Keyword(Keyword::And) => (Instruction::Iand, ValType::BOOLEAN),
                _ => break,
            };

            Self::check_types(typ, expected, pos)?;
            self.advance()?;

            let rpos = self.token.position();
            let right = self.parse_factor()?;
            Self::check_types(right, expected, rpos)?;

            self.gen.push(op);
            typ = expected;
        }

        Ok(typ)
    }

    /// factor = id ["[" simple "]" | "(" [expr {"," expr}] ")"] | number
    ///        | "(" expr ")" | "not" factor | "true" | "false"
    fn parse_factor(&mut self) -> Parse<ValType> {
        match self.token.val() {
            Token::Id(_) => {
                let id = self.expect_id()?;
                let prop = self.find(&id)?;

                if *self.token.val() == Token::OpenBracket {
                    if prop.typ().is_callable() {
                        let error = ParserError::NotAVariable(id.val().clone());
                        return Err(Located::at(error, id.position()));
                    }

                    if !prop.typ().is_array() {
                        let error = ParserError::NotAnArray(id.val().clone());
                        return Err(Located::at(error, id.position()));
                    }

                    self.gen.push(Instruction::ALoad(prop.offset()));
                    self.parse_subscript()?;
                    self.gen.push(elem_load(prop.typ().base()));
                    Ok(prop.typ().elem())
                } else if *self.token.val() == Token::OpenParen {
                    // Solo una función puede aparecer en una expresión
                    if !prop.typ().is_function() {
                        let error = ParserError::NotAFunction(id.val().clone());
                        return Err(Located::at(error, id.position()));
                    }

                    self.parse_arguments(&id, &prop)?;
                    self.gen.push(Instruction::InvokeStatic {
                        name: id.val().clone(),
                        descriptor: codegen::method_descriptor(
                            prop.params(),
                            prop.typ().return_type(),
                        ),
                        args: prop.params().len() as u32,
                        returns: true,
                    });

                    Ok(prop.typ().return_type())
                } else {
                    if prop.typ().is_callable() {
                        let error = ParserError::NotAVariable(id.val().clone());
                        return Err(Located::at(error, id.position()));
                    }

                    if prop.typ().is_array() {
                        self.gen.push(Instruction::ALoad(prop.offset()));
                    } else {
                        self.gen.push(Instruction::ILoad(prop.offset()));
                    }

                    Ok(prop.typ())
                }
            }

            Token::Number(number) => {
                let number = *number;
                self.advance()?;
                self.gen.push(Instruction::Ldc(number));
                Ok(ValType::INTEGER)
            }

            Token::OpenParen => {
                self.advance()?;
                let typ = self.parse_expr()?;
                self.expect(Token::CloseParen)?;
                Ok(typ)
            }

            Token::Keyword(Keyword::Not) => {
                self.advance()?;
                let pos = self.token.position();
                let typ = self.parse_factor()?;
                Self::check_types(typ, ValType::BOOLEAN, pos)?;

                // `not x` equivale a `x = false`
                self.gen.push(Instruction::Ldc(0));
                self.materialize(Cond::Eq);
                Ok(ValType::BOOLEAN)
            }

            Token::Keyword(Keyword::True) => {
                self.advance()?;
                self.gen.push(Instruction::Ldc(1));
                Ok(ValType::BOOLEAN)
            }

            Token::Keyword(Keyword::False) => {
                self.advance()?;
                self.gen.push(Instruction::Ldc(0));
                Ok(ValType::BOOLEAN)
            }

            _ => Err(self.expected("factor")),
        }
    }

    /// Subíndice `"[" simple "]"` de tipo entero.
    fn parse_subscript(&mut self) -> Parse<()> {
        self.expect(Token::OpenBracket)?;
        let pos = self.token.position();
        let typ = self.parse_simple()?;
        Self::check_types(typ, ValType::INTEGER, pos)?;
        self.expect(Token::CloseBracket)?;
        Ok(())
    }

    /// Lista de argumentos de una invocación, comprobando la aridad y
    /// el tipo de cada argumento contra los parámetros declarados.
    fn parse_arguments(&mut self, id: &Located<String>, prop: &IdProp) -> Parse<()> {
        self.expect(Token::OpenParen)?;

        let mut count = 0;
        if starts_expr(self.token.val()) {
            loop {
                let pos = self.token.position();
                let typ = self.parse_expr()?;

                match prop.params().get(count) {
                    Some(&param) => Self::check_types(typ, param, pos)?,
                    None => {
                        let error = ParserError::TooManyArguments(id.val().clone());
                        return Err(Located::at(error, pos));
                    }
                }

                count += 1;
                if *self.token.val() == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }

        if count < prop.params().len() {
            let error = ParserError::TooFewArguments(id.val().clone());
            return Err(Located::at(error, self.token.position()));
        }

        self.expect(Token::CloseParen)?;
        Ok(())
    }

    /// Evalúa una condición booleana y emite el salto que se toma
    /// cuando resulta falsa. Retorna la etiqueta de ese salto.
    fn parse_condition(&mut self) -> Parse<Label> {
        let pos = self.token.position();
        let typ = self.parse_expr()?;
        Self::check_types(typ, ValType::BOOLEAN, pos)?;

        let on_false = self.gen.new_label();
        self.gen.push(Instruction::Ldc(0));
        self.gen.push(Instruction::IfIcmp(Cond::Eq, on_false));
        Ok(on_false)
    }

    /// Materializa un booleano a partir de la comparación de los dos
    /// enteros en la cima de la pila.
    fn materialize(&mut self, cond: Cond) {
        let when_true = self.gen.new_label();
        let done = self.gen.new_label();

        self.gen.push(Instruction::IfIcmp(cond, when_true));
        self.gen.push(Instruction::Ldc(0));
        self.gen.push(Instruction::Goto(done));
        self.gen.push(Instruction::SetLabel(when_true));
        self.gen.push(Instruction::Ldc(1));
        self.gen.push(Instruction::SetLabel(done));
    }

    /// Consume el lookahead y carga el siguiente, retornando el anterior.
    fn advance(&mut self) -> Parse<Located<Token>> {
        let next = self.scanner.next_token()?;
        Ok(std::mem::replace(&mut self.token, next))
    }

    /// Consume el token indicado o falla con su posición.
    fn expect(&mut self, token: Token) -> Parse<Position> {
        if *self.token.val() == token {
            Ok(self.advance()?.position())
        } else {
            Err(self.expected(&token.to_string()))
        }
    }

    /// Consume un identificador, reteniendo su lexema y posición.
    fn expect_id(&mut self) -> Parse<Located<String>> {
        if let Token::Id(id) = self.token.val() {
            let id = id.clone();
            let pos = self.token.position();
            self.advance()?;
            Ok(Located::at(id, pos))
        } else {
            Err(self.expected("an identifier"))
        }
    }

    /// Resuelve un identificador visible o falla como desconocido.
    fn find(&self, id: &Located<String>) -> Parse<IdProp> {
        match self.symbols.find(id.val()) {
            Some(prop) => Ok(prop.clone()),
            None => {
                let error = ParserError::UnknownIdentifier(id.val().clone());
                Err(Located::at(error, id.position()))
            }
        }
    }

    /// Falla si un tipo encontrado no es exactamente el esperado.
    fn check_types(found: ValType, expected: ValType, pos: Position) -> Parse<()> {
        if found == expected {
            Ok(())
        } else {
            let error = ParserError::IncompatibleTypes { expected, found };
            Err(Located::at(error, pos))
        }
    }

    fn expected(&self, what: &str) -> Located<ParserError> {
        let error = ParserError::Expected {
            expected: what.to_owned(),
            found: self.token.val().clone(),
        };

        Located::at(error, self.token.position())
    }
}

/// ¿Puede el token iniciar un factor?
fn starts_factor(token: &Token) -> bool {
    matches!(
        token,
        Token::Id(_)
            | Token::Number(_)
            | Token::OpenParen
            | Token::Keyword(Keyword::Not | Keyword::True | Keyword::False)
    )
}

/// ¿Puede el token iniciar una expresión?
fn starts_expr(token: &Token) -> bool {
    *token == Token::Minus || starts_factor(token)
}

/// ¿Es el token el inicio de un tipo?
fn is_type(token: &Token) -> bool {
    matches!(token, Token::Keyword(Keyword::Boolean | Keyword::Integer))
}

fn elem_kind(base: Base) -> ElemKind {
    match base {
        Base::Boolean => ElemKind::Boolean,
        _ => ElemKind::Int,
    }
}

fn elem_load(base: Base) -> Instruction {
    match base {
        Base::Boolean => Instruction::Baload,
        _ => Instruction::Iaload,
    }
}

fn elem_store(base: Base) -> Instruction {
    match base {
        Base::Boolean => Instruction::Bastore,
        _ => Instruction::Iastore,
    }
}

fn print_kind(base: Base) -> PrintKind {
    match base {
        Base::Boolean => PrintKind::Bool,
        _ => PrintKind::Int,
    }
}

fn read_kind(base: Base) -> ReadKind {
    match base {
        Base::Boolean => ReadKind::Bool,
        _ => ReadKind::Int,
    }
}
