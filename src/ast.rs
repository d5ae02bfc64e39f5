//! Abstract Syntax Tree for `.usbd` descriptions.
//!
//! The language is deliberately uniform: every statement is a keyword, a list of
//! literals, and either a `;` or a braced body. Meaning is assigned by
//! [`crate::compile`].

/// Root of a parsed description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub keyword: String,
    pub args: Vec<Literal>,
    /// `Some` for `{ … }` blocks (possibly empty), `None` for `;` statements.
    pub body: Option<Vec<Statement>>,
    /// 1-based source line of the keyword.
    pub line: usize,
}

impl Statement {
    pub fn is_block(&self) -> bool {
        self.body.is_some()
    }

    pub fn children(&self) -> &[Statement] {
        self.body.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Hex(u64),
    String(String),
    Ident(String),
}

impl Literal {
    /// Numeric value of an `Int` or `Hex` literal.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            Literal::Hex(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Literal::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Hex(n) => write!(f, "0x{:X}", n),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Ident(s) => f.write_str(s),
        }
    }
}
