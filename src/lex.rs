//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`Reader`]
//! (flujo de bytes) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido está asociado a la posición de su primer carácter en el
//! código fuente original, lo cual permite rastrear errores tanto en los
//! mismos como en constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Este escáner no produce lexemas para casos donde no son necesarios.
//! Operadores, puntuación y palabras reservadas se identifican por el
//! hecho de lo que son y no incluyen lexemas. Los identificadores sí
//! incluyen su lexema original; las constantes numéricas y de cadena se
//! resuelven a sus valores en vez de preservar sus lexemas.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores tienen un límite de longitud.
//! - Los comentarios `{ … }` pueden anidarse.
//! - Solo se acepta ASCII imprimible fuera de literales de cadena, más
//!   espacio, tabulador, retorno de carro y salto de línea.
//! - Las cadenas admiten únicamente los escapes `\n`, `\t`, `\"` y `\\`.
//!
//! # Errores
//! Todo error léxico es fatal: el escáner no intenta resincronizarse y
//! la compilación termina con el primer diagnóstico.

use crate::source::{Located, Reader};
use std::fmt::{self, Display};

use thiserror::Error;

/// Longitud máxima de un identificador.
const MAX_ID_LENGTH: usize = 72;

/// Capacidad inicial del búfer de literales de cadena.
const INITIAL_STRING_LEN: usize = 1024;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Byte que no puede comenzar ningún token.
    #[error("illegal character {0:?} (ASCII #{1})")]
    IllegalChar(char, u8),

    /// Un identificador excede la longitud máxima.
    #[error("identifier too long")]
    IdentifierTooLong,

    /// Una constante numérica no cabe en un entero con signo de 32 bits.
    #[error("number too large")]
    NumberTooLarge,

    /// La entrada terminó antes de la comilla de cierre.
    #[error("string not closed")]
    StringNotClosed,

    /// Secuencia de escape desconocida dentro de una cadena.
    #[error("illegal escape code '\\{0}' in string")]
    IllegalEscape(char),

    /// Byte fuera del rango imprimible dentro de una cadena.
    #[error("non-printable character (ASCII #{0}) in string")]
    NonPrintable(u8),

    /// La entrada terminó dentro de un comentario.
    #[error("comment not closed")]
    CommentNotClosed,
}

pub type Scan<T> = Result<T, Located<LexerError>>;

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica del programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(String),

    /// Palabra reservada.
    Keyword(Keyword),

    /// Literal de entero.
    Number(i32),

    /// Literal de cadena, ya sin escapes.
    Str(String),

    /// `:=`
    Gets,

    /// `=`
    Equal,

    /// `<>`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Divide,

    /// `,`
    Comma,

    /// `.`
    Concatenate,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,

    /// Fin de la entrada.
    Eof,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "`{}`", keyword),
            Number(number) => write!(fmt, "number `{}`", number),
            Str(_) => fmt.write_str("a string"),
            Gets => fmt.write_str("`:=`"),
            Equal => fmt.write_str("`=`"),
            NotEqual => fmt.write_str("`<>`"),
            Less => fmt.write_str("`<`"),
            LessEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterEqual => fmt.write_str("`>=`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Divide => fmt.write_str("`/`"),
            Comma => fmt.write_str("`,`"),
            Concatenate => fmt.write_str("`.`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenBracket => fmt.write_str("`[`"),
            CloseBracket => fmt.write_str("`]`"),
            Eof => fmt.write_str("end-of-file"),
        }
    }
}

/// Una palabra reservada.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    Array,
    Begin,
    Boolean,
    Call,
    Do,
    Else,
    Elsif,
    End,
    False,
    Function,
    Get,
    If,
    Integer,
    Leave,
    Not,
    Or,
    Put,
    Relax,
    Remainder,
    Source,
    Then,
    To,
    True,
    While,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;

        let string = match self {
            And => "and",
            Array => "array",
            Begin => "begin",
            Boolean => "boolean",
            Call => "call",
            Do => "do",
            Else => "else",
            Elsif => "elsif",
            End => "end",
            False => "false",
            Function => "function",
            Get => "get",
            If => "if",
            Integer => "integer",
            Leave => "leave",
            Not => "not",
            Or => "or",
            Put => "put",
            Relax => "relax",
            Remainder => "rem",
            Source => "source",
            Then => "then",
            To => "to",
            True => "true",
            While => "while",
        };

        fmt.write_str(string)
    }
}

/// Palabras reservadas, ordenadas por lexema para búsqueda binaria.
const RESERVED: &[(&str, Keyword)] = &[
    ("and", Keyword::And),
    ("array", Keyword::Array),
    ("begin", Keyword::Begin),
    ("boolean", Keyword::Boolean),
    ("call", Keyword::Call),
    ("do", Keyword::Do),
    ("else", Keyword::Else),
    ("elsif", Keyword::Elsif),
    ("end", Keyword::End),
    ("false", Keyword::False),
    ("function", Keyword::Function),
    ("get", Keyword::Get),
    ("if", Keyword::If),
    ("integer", Keyword::Integer),
    ("leave", Keyword::Leave),
    ("not", Keyword::Not),
    ("or", Keyword::Or),
    ("put", Keyword::Put),
    ("relax", Keyword::Relax),
    ("rem", Keyword::Remainder),
    ("source", Keyword::Source),
    ("then", Keyword::Then),
    ("to", Keyword::To),
    ("true", Keyword::True),
    ("while", Keyword::While),
];

/// Escáner sobre una unidad de compilación.
///
/// Cada llamada a [`Scanner::next_token`] consume espacios en blanco y
/// comentarios y retorna exactamente un token. Al agotarse la entrada
/// retorna [`Token::Eof`] indefinidamente.
pub struct Scanner<'a> {
    reader: Reader<'a>,
}

impl<'a> Scanner<'a> {
    /// Crea un escáner al inicio del flujo.
    pub fn new(reader: Reader<'a>) -> Self {
        Scanner { reader }
    }

    /// Obtiene el siguiente token de la entrada.
    pub fn next_token(&mut self) -> Scan<Located<Token>> {
        self.skip_blanks()?;

        let start = self.reader.position();
        let Some(byte) = self.reader.peek() else {
            return Ok(Located::at(Token::Eof, start));
        };

        let token = match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.word()?,
            b'0'..=b'9' => self.number()?,
            b'"' => self.string()?,
            _ => self.punctuation(byte)?,
        };

        Ok(Located::at(token, start))
    }

    /// Descarta espacios en blanco y comentarios entre tokens.
    fn skip_blanks(&mut self) -> Scan<()> {
        loop {
            match self.reader.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.reader.advance(),
                Some(b'{') => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Descarta un comentario, incluyendo los anidados en él.
    ///
    /// Un comentario sin terminar se reporta en la posición de la
    /// llave de apertura más externa.
    fn skip_comment(&mut self) -> Scan<()> {
        let start = self.reader.position();
        self.reader.advance();

        let mut depth = 1;
        while depth > 0 {
            match self.reader.peek() {
                None => return Err(Located::at(LexerError::CommentNotClosed, start)),
                Some(b'{') => depth += 1,
                Some(b'}') => depth -= 1,
                Some(_) => (),
            }

            self.reader.advance();
        }

        Ok(())
    }

    /// Término que puede ser un identificador o una palabra reservada.
    fn word(&mut self) -> Scan<Token> {
        let start = self.reader.position();

        let mut lexeme = String::new();
        while let Some(byte) = self.reader.peek() {
            if !byte.is_ascii_alphanumeric() && byte != b'_' {
                break;
            }

            if lexeme.len() == MAX_ID_LENGTH {
                return Err(Located::at(LexerError::IdentifierTooLong, start));
            }

            lexeme.push(byte as char);
            self.reader.advance();
        }

        let token = match RESERVED.binary_search_by_key(&lexeme.as_str(), |&(word, _)| word) {
            Ok(index) => Token::Keyword(RESERVED[index].1),
            Err(_) => Token::Id(lexeme),
        };

        Ok(token)
    }

    /// Acumulación dígito por dígito de una constante entera.
    fn number(&mut self) -> Scan<Token> {
        let start = self.reader.position();

        let mut value: i32 = 0;
        while let Some(byte) = self.reader.peek() {
            if !byte.is_ascii_digit() {
                break;
            }

            let digit = i32::from(byte - b'0');
            value = value
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit))
                .ok_or_else(|| Located::at(LexerError::NumberTooLarge, start))?;

            self.reader.advance();
        }

        Ok(Token::Number(value))
    }

    /// Literal de cadena, resolviendo escapes.
    fn string(&mut self) -> Scan<Token> {
        let start = self.reader.position();
        self.reader.advance();

        let mut string = String::with_capacity(INITIAL_STRING_LEN);
        loop {
            match self.reader.peek() {
                None => return Err(Located::at(LexerError::StringNotClosed, start)),

                Some(b'"') => {
                    self.reader.advance();
                    break;
                }

                Some(b'\\') => {
                    let escape = self.reader.position();
                    self.reader.advance();

                    match self.reader.peek() {
                        Some(b'n') => string.push('\n'),
                        Some(b't') => string.push('\t'),
                        Some(b'"') => string.push('"'),
                        Some(b'\\') => string.push('\\'),
                        Some(byte) => {
                            let error = LexerError::IllegalEscape(byte as char);
                            return Err(Located::at(error, escape));
                        }

                        None => return Err(Located::at(LexerError::StringNotClosed, start)),
                    }

                    self.reader.advance();
                }

                // Solo ASCII imprimible puede formar parte de una cadena
                Some(byte) if !(0x20..0x7f).contains(&byte) => {
                    let error = LexerError::NonPrintable(byte);
                    return Err(Located::at(error, self.reader.position()));
                }

                Some(byte) => {
                    string.push(byte as char);
                    self.reader.advance();
                }
            }
        }

        Ok(Token::Str(string))
    }

    /// Operadores y puntuación, incluyendo los de dos caracteres.
    fn punctuation(&mut self, byte: u8) -> Scan<Token> {
        let start = self.reader.position();
        self.reader.advance();

        let token = match byte {
            b'=' => Token::Equal,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Times,
            b'/' => Token::Divide,
            b',' => Token::Comma,
            b'.' => Token::Concatenate,
            b';' => Token::Semicolon,
            b'(' => Token::OpenParen,
            b')' => Token::CloseParen,
            b'[' => Token::OpenBracket,
            b']' => Token::CloseBracket,

            b'<' => match self.reader.peek() {
                Some(b'=') => {
                    self.reader.advance();
                    Token::LessEqual
                }

                Some(b'>') => {
                    self.reader.advance();
                    Token::NotEqual
                }

                _ => Token::Less,
            },

            b'>' => match self.reader.peek() {
                Some(b'=') => {
                    self.reader.advance();
                    Token::GreaterEqual
                }

                _ => Token::Greater,
            },

            // `:` solo es válido como inicio de `:=`
            b':' => match self.reader.peek() {
                Some(b'=') => {
                    self.reader.advance();
                    Token::Gets
                }

                _ => return Err(Located::at(LexerError::IllegalChar(':', b':'), start)),
            },

            _ => {
                let error = LexerError::IllegalChar(byte as char, byte);
                return Err(Located::at(error, start));
            }
        };

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(Reader::new(source.as_bytes()));
        let mut tokens = Vec::new();

        loop {
            let token = scanner.next_token().expect("lexical error").into_inner();
            let done = token == Token::Eof;
            tokens.push(token);

            if done {
                break;
            }
        }

        tokens
    }

    fn scan_error(source: &str) -> Located<LexerError> {
        let mut scanner = Scanner::new(Reader::new(source.as_bytes()));
        loop {
            match scanner.next_token() {
                Ok(token) if *token.val() == Token::Eof => panic!("no lexical error"),
                Ok(_) => (),
                Err(error) => return error,
            }
        }
    }

    #[test]
    fn reserved_words_and_identifiers() {
        assert_eq!(
            scan("begin relax end"),
            vec![
                Token::Keyword(Keyword::Begin),
                Token::Keyword(Keyword::Relax),
                Token::Keyword(Keyword::End),
                Token::Eof,
            ]
        );

        // Prefijos y variaciones de palabras reservadas son identificadores
        assert_eq!(
            scan("ends Begin _if rem"),
            vec![
                Token::Id(String::from("ends")),
                Token::Id(String::from("Begin")),
                Token::Id(String::from("_if")),
                Token::Keyword(Keyword::Remainder),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn multi_character_operators() {
        assert_eq!(
            scan("x := a <= b <> c >= d"),
            vec![
                Token::Id(String::from("x")),
                Token::Gets,
                Token::Id(String::from("a")),
                Token::LessEqual,
                Token::Id(String::from("b")),
                Token::NotEqual,
                Token::Id(String::from("c")),
                Token::GreaterEqual,
                Token::Id(String::from("d")),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn token_positions_point_at_first_character() {
        let mut scanner = Scanner::new(Reader::new(b"if x\n  <= 10"));

        let token = scanner.next_token().unwrap();
        assert_eq!((token.position().line(), token.position().col()), (1, 1));

        let token = scanner.next_token().unwrap();
        assert_eq!(*token.val(), Token::Id(String::from("x")));
        assert_eq!((token.position().line(), token.position().col()), (1, 4));

        let token = scanner.next_token().unwrap();
        assert_eq!(*token.val(), Token::LessEqual);
        assert_eq!((token.position().line(), token.position().col()), (2, 3));

        let token = scanner.next_token().unwrap();
        assert_eq!(*token.val(), Token::Number(10));
        assert_eq!((token.position().line(), token.position().col()), (2, 6));
    }

    #[test]
    fn nested_comments_are_skipped() {
        assert_eq!(
            scan("put { outer { inner } still-outer } 1"),
            vec![Token::Keyword(Keyword::Put), Token::Number(1), Token::Eof]
        );
    }

    #[test]
    fn unterminated_comment_reports_outermost_brace() {
        let error = scan_error("x { a { b }");
        assert!(matches!(error.val(), LexerError::CommentNotClosed));
        assert_eq!((error.position().line(), error.position().col()), (1, 3));
    }

    #[test]
    fn number_overflow_is_fatal() {
        assert_eq!(scan("2147483647"), vec![Token::Number(i32::MAX), Token::Eof]);

        let error = scan_error("2147483648");
        assert!(matches!(error.val(), LexerError::NumberTooLarge));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let tokens = scan(r#""a\tb\nc\"d\\e""#);
        assert_eq!(tokens[0], Token::Str(String::from("a\tb\nc\"d\\e")));
    }

    #[test]
    fn bad_string_contents_are_fatal() {
        assert!(matches!(
            scan_error(r#""a\qb""#).val(),
            LexerError::IllegalEscape('q')
        ));

        assert!(matches!(
            scan_error("\"abc\ndef\"").val(),
            LexerError::NonPrintable(b'\n')
        ));

        assert!(matches!(
            scan_error("\"abc").val(),
            LexerError::StringNotClosed
        ));
    }

    #[test]
    fn long_strings_grow_past_initial_buffer() {
        let long = "x".repeat(INITIAL_STRING_LEN + 1);
        let tokens = scan(&format!("\"{}\"", long));
        assert_eq!(tokens[0], Token::Str(long));
    }

    #[test]
    fn identifier_length_limit() {
        let just_fits = "a".repeat(MAX_ID_LENGTH);
        assert_eq!(scan(&just_fits)[0], Token::Id(just_fits));

        let too_long = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(
            scan_error(&too_long).val(),
            LexerError::IdentifierTooLong
        ));
    }

    #[test]
    fn stray_characters_are_fatal() {
        for source in ["}", "!", "#", "$", "%", "&", "@", "|", "~", "`", "\u{00e9}"] {
            assert!(matches!(
                scan_error(source).val(),
                LexerError::IllegalChar(..)
            ));
        }

        // `:` sin `=` inmediato también es ilegal
        assert!(matches!(
            scan_error("x : = 1").val(),
            LexerError::IllegalChar(':', _)
        ));
    }

    #[test]
    fn eof_repeats_indefinitely() {
        let mut scanner = Scanner::new(Reader::new(b"relax"));
        scanner.next_token().unwrap();

        for _ in 0..3 {
            assert_eq!(*scanner.next_token().unwrap().val(), Token::Eof);
        }
    }
}
