//! Emisión de código para la máquina virtual de Java.
//!
//! # Listado
//! La salida del compilador es un listado textual en el formato que
//! acepta el ensamblador Jasmin. Cada subrutina del programa fuente se
//! traduce a un método estático; el cuerpo de nivel superior se emite
//! como `main`. Las instrucciones se acumulan por subrutina y el método
//! terminado se anexa al búfer de la clase al cerrarse.
//!
//! # Etiquetas
//! El control de flujo se realiza a través de etiquetas y saltos. Las
//! etiquetas existen por el hecho de identificarse numéricamente y se
//! toman de un contador monótono de toda la clase, por lo cual nunca
//! colisionan entre esquemas de control anidados.
//!
//! # Constantes de cadena
//! Las cadenas de `put` se internan en un pool por orden de aparición;
//! el listado re-escapa sus contenidos al momento de escribirse.

use crate::symbol::{Base, ValType};

use std::io::{self, Write};

/// Las etiquetas están constituidas por identificadores numéricos
/// únicos dentro de la clase.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Label(pub u32);

/// Condición de una comparación entera de dos operandos.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cond {
    fn mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "if_icmpeq",
            Cond::Ne => "if_icmpne",
            Cond::Lt => "if_icmplt",
            Cond::Le => "if_icmple",
            Cond::Gt => "if_icmpgt",
            Cond::Ge => "if_icmpge",
        }
    }
}

/// Clase de elemento de un arreglo recién asignado.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElemKind {
    Int,
    Boolean,
}

impl ElemKind {
    fn keyword(self) -> &'static str {
        match self {
            ElemKind::Int => "int",
            ElemKind::Boolean => "boolean",
        }
    }
}

/// Descriptor del argumento de una primitiva de impresión.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrintKind {
    Int,
    Bool,
    Str,
}

impl PrintKind {
    fn descriptor(self) -> &'static str {
        match self {
            PrintKind::Int => "I",
            PrintKind::Bool => "Z",
            PrintKind::Str => "Ljava/lang/String;",
        }
    }
}

/// Primitiva de lectura desde la entrada estándar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadKind {
    Int,
    Bool,
}

impl ReadKind {
    fn method(self) -> &'static str {
        match self {
            ReadKind::Int => "nextInt()I",
            ReadKind::Bool => "nextBoolean()Z",
        }
    }
}

/// Una instrucción del listado de una subrutina.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Establecer la ubicación de una etiqueta al punto donde ocurre
    /// esta instrucción en la secuencia del método.
    SetLabel(Label),

    /// Saltar incondicionalmente a una etiqueta.
    Goto(Label),

    /// Comparar los dos enteros en la cima de la pila y saltar si la
    /// condición se cumple.
    IfIcmp(Cond, Label),

    /// Apilar una constante entera.
    Ldc(i32),

    /// Apilar una cadena del pool de constantes.
    LdcString(usize),

    /// Apilar el entero de una ranura local.
    ILoad(u32),

    /// Guardar la cima de la pila en una ranura local.
    IStore(u32),

    /// Apilar la referencia de arreglo de una ranura local.
    ALoad(u32),

    /// Guardar la referencia en la cima de la pila en una ranura local.
    AStore(u32),

    Iadd,
    Isub,
    Imul,
    Idiv,
    Irem,
    Ineg,
    Ior,
    Iand,

    /// Cargar un elemento de un arreglo de enteros.
    Iaload,

    /// Guardar un elemento en un arreglo de enteros.
    Iastore,

    /// Cargar un elemento de un arreglo de booleanos.
    Baload,

    /// Guardar un elemento en un arreglo de booleanos.
    Bastore,

    /// Asignar un arreglo cuya longitud está en la cima de la pila.
    NewArray(ElemKind),

    /// Retornar de un procedimiento.
    Return,

    /// Retornar el entero o booleano en la cima de la pila.
    IReturn,

    /// Retornar la referencia de arreglo en la cima de la pila.
    AReturn,

    /// Invocar un método estático de la clase en emisión. Los
    /// argumentos ya deben estar apilados de izquierda a derecha.
    InvokeStatic {
        name: String,
        descriptor: String,
        args: u32,
        returns: bool,
    },

    /// Apilar el flujo de salida estándar, receptor de una impresión.
    GetOut,

    /// Imprimir la cima de la pila sobre el receptor apilado antes.
    Print(PrintKind),

    /// Apilar el lector de la entrada estándar de la clase.
    GetIn,

    /// Leer un valor del lector apilado antes.
    Read(ReadKind),
}

impl Instruction {
    /// Efecto sobre la pila de operandos: `(desapilados, apilados)`.
    fn stack_effect(&self) -> (u32, u32) {
        use Instruction::*;

        match self {
            SetLabel(_) | Goto(_) | Return => (0, 0),
            IfIcmp(..) => (2, 0),
            Ldc(_) | LdcString(_) | ILoad(_) | ALoad(_) | GetOut | GetIn => (0, 1),
            IStore(_) | AStore(_) | IReturn | AReturn => (1, 0),
            Iadd | Isub | Imul | Idiv | Irem | Ior | Iand | Iaload | Baload => (2, 1),
            Ineg | NewArray(_) | Read(_) => (1, 1),
            Iastore | Bastore => (3, 0),
            Print(_) => (2, 0),
            InvokeStatic { args, returns, .. } => (*args, u32::from(*returns)),
        }
    }
}

/// Descriptor JVM de un tipo del lenguaje fuente.
pub fn field_descriptor(typ: ValType) -> &'static str {
    match (typ.base(), typ.is_array()) {
        (Base::Integer, false) => "I",
        (Base::Integer, true) => "[I",
        (Base::Boolean, false) => "Z",
        (Base::Boolean, true) => "[Z",
        (Base::None, _) => "V",
    }
}

/// Descriptor JVM de un método a partir de su firma declarada.
pub fn method_descriptor(params: &[ValType], returns: ValType) -> String {
    let mut descriptor = String::from("(");
    for &param in params {
        descriptor.push_str(field_descriptor(param));
    }

    descriptor.push(')');
    descriptor.push_str(field_descriptor(returns));
    descriptor
}

/// Un método estático terminado o en construcción.
#[derive(Debug)]
struct Method {
    name: String,
    descriptor: String,
    code: Vec<Instruction>,
    next_local: u32,
    max_locals: u32,
}

impl Method {
    /// Cota superior del tamaño de la pila de operandos.
    ///
    /// La suma en curso nunca decrece en las uniones de saltos, por lo
    /// cual el máximo observado nunca queda por debajo del real.
    fn max_stack(&self) -> u32 {
        let mut depth: u32 = 0;
        let mut max = 1;

        for instruction in &self.code {
            let (pops, pushes) = instruction.stack_effect();
            depth = depth.saturating_sub(pops) + pushes;
            max = max.max(depth);
        }

        max
    }
}

/// La clase en emisión.
///
/// Acumula el nombre de clase, el pool de cadenas, el contador de
/// etiquetas y los métodos ya finalizados; [`Assembly::emit`] escribe
/// el listado completo al terminar la compilación.
#[derive(Debug, Default)]
pub struct Assembly {
    class: String,
    pool: Vec<String>,
    done: Vec<Method>,
    current: Option<Method>,
    labels: u32,
    uses_input: bool,
}

impl Assembly {
    pub fn new() -> Self {
        Assembly::default()
    }

    /// Establece el nombre de la clase, tomado del encabezado `source`.
    pub fn set_class(&mut self, name: &str) {
        self.class = name.to_owned();
    }

    /// Nombre de la clase en emisión.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Comienza un método estático nuevo.
    ///
    /// El contador de ranuras locales inicia en el número de
    /// parámetros, ya que estos ocupan las primeras ranuras.
    pub fn begin_subroutine(&mut self, name: &str, descriptor: String, params: u32) {
        self.current = Some(Method {
            name: name.to_owned(),
            descriptor,
            code: Vec::new(),
            next_local: params,
            max_locals: 0,
        });
    }

    /// Anexa una instrucción a la subrutina abierta.
    pub fn push(&mut self, instruction: Instruction) {
        if let Instruction::GetIn = instruction {
            self.uses_input = true;
        }

        self.method().code.push(instruction);
    }

    /// Reserva la siguiente ranura local libre.
    pub fn alloc_local(&mut self) -> u32 {
        let method = self.method();
        let local = method.next_local;
        method.next_local += 1;
        local
    }

    /// Produce una etiqueta fresca.
    pub fn new_label(&mut self) -> Label {
        self.labels += 1;
        Label(self.labels)
    }

    /// Interna una cadena en el pool y retorna su índice.
    pub fn intern_string(&mut self, string: String) -> usize {
        self.pool.push(string);
        self.pool.len() - 1
    }

    /// Finaliza la subrutina abierta y la anexa al búfer de la clase.
    pub fn end_subroutine(&mut self, max_locals: u32) {
        let mut method = self.current.take().expect("no subroutine is open");
        method.max_locals = max_locals.max(method.next_local);
        self.done.push(method);
    }

    fn method(&mut self) -> &mut Method {
        self.current.as_mut().expect("no subroutine is open")
    }

    /// Escribe el listado completo de la clase.
    pub fn emit<W: Write>(&self, output: &mut W) -> io::Result<()> {
        writeln!(output, ".class public {}", self.class)?;
        writeln!(output, ".super java/lang/Object")?;

        if self.uses_input {
            self.emit_input_support(output)?;
        }

        for method in &self.done {
            self.emit_method(output, method)?;
        }

        Ok(())
    }

    /// Campo lector de entrada y su inicializador de clase.
    fn emit_input_support<W: Write>(&self, output: &mut W) -> io::Result<()> {
        writeln!(output)?;
        writeln!(output, ".field private static $in Ljava/util/Scanner;")?;

        writeln!(output)?;
        writeln!(output, ".method static <clinit>()V")?;
        emit!(output, ".limit stack 3")?;
        emit!(output, ".limit locals 1")?;
        emit!(output, "new java/util/Scanner")?;
        emit!(output, "dup")?;
        emit!(output, "getstatic java/lang/System/in Ljava/io/InputStream;")?;
        emit!(
            output,
            "invokespecial java/util/Scanner/<init>(Ljava/io/InputStream;)V"
        )?;
        emit!(output, "putstatic {}/$in Ljava/util/Scanner;", self.class)?;
        emit!(output, "return")?;
        writeln!(output, ".end method")
    }

    fn emit_method<W: Write>(&self, output: &mut W, method: &Method) -> io::Result<()> {
        writeln!(output)?;
        writeln!(
            output,
            ".method public static {}{}",
            method.name, method.descriptor
        )?;
        emit!(output, ".limit stack {}", method.max_stack())?;
        emit!(output, ".limit locals {}", method.max_locals)?;

        for instruction in &method.code {
            self.emit_instruction(output, instruction)?;
        }

        writeln!(output, ".end method")
    }

    fn emit_instruction<W: Write>(&self, output: &mut W, instruction: &Instruction) -> io::Result<()> {
        use Instruction::*;

        match instruction {
            SetLabel(Label(label)) => emit!(output, "L{}:", label),
            Goto(Label(label)) => emit!(output, "goto L{}", label),
            IfIcmp(cond, Label(label)) => emit!(output, "{} L{}", cond.mnemonic(), label),

            Ldc(value) => emit!(output, "ldc {}", value),
            LdcString(index) => emit!(output, "ldc \"{}\"", escape(&self.pool[*index])),

            ILoad(local) => emit!(output, "iload {}", local),
            IStore(local) => emit!(output, "istore {}", local),
            ALoad(local) => emit!(output, "aload {}", local),
            AStore(local) => emit!(output, "astore {}", local),

            Iadd => emit!(output, "iadd"),
            Isub => emit!(output, "isub"),
            Imul => emit!(output, "imul"),
            Idiv => emit!(output, "idiv"),
            Irem => emit!(output, "irem"),
            Ineg => emit!(output, "ineg"),
            Ior => emit!(output, "ior"),
            Iand => emit!(output, "iand"),

            Iaload => emit!(output, "iaload"),
            Iastore => emit!(output, "iastore"),
            Baload => emit!(output, "baload"),
            Bastore => emit!(output, "bastore"),

            NewArray(kind) => emit!(output, "newarray {}", kind.keyword()),

            Return => emit!(output, "return"),
            IReturn => emit!(output, "ireturn"),
            AReturn => emit!(output, "areturn"),

            InvokeStatic {
                name, descriptor, ..
            } => emit!(output, "invokestatic {}/{}{}", self.class, name, descriptor),

            GetOut => emit!(
                output,
                "getstatic java/lang/System/out Ljava/io/PrintStream;"
            ),
            Print(kind) => emit!(
                output,
                "invokevirtual java/io/PrintStream/print({})V",
                kind.descriptor()
            ),

            GetIn => emit!(output, "getstatic {}/$in Ljava/util/Scanner;", self.class),
            Read(kind) => emit!(output, "invokevirtual java/util/Scanner/{}", kind.method()),
        }
    }
}

/// Re-escapa una cadena ya decodificada para el listado.
fn escape(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }

    escaped
}
