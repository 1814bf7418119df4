// This module implements the symbol table shared by every stage of flexc. Symbols are declared
// while walking the program's declarations, in source order, and each carries its declared
// type, its current runtime value and its memory slot. Memory layout is a one-shot step: the
// table is created in the `Declaring` phase, where `declare` is available, and
// `compute_offsets` consumes it to produce a `Finalized` table whose symbols all own a unique,
// consecutive doubleword offset in declaration order. The phase marker makes it impossible to
// generate code against a table whose layout has not been computed, or to declare a variable
// after the layout has been fixed. Runtime values use the tagged `Value` variant so the flex
// type's number/character switch is matched exhaustively by every consumer.

//! Symbol table with a typed layout phase.

use std::fmt;
use std::marker::PhantomData;

use hashbrown::HashMap;
use thiserror::Error;

use super::ast::VarType;

/// Maximum number of symbols a program may declare.
pub const MAX_SYMBOLS: usize = 999;

/// Bytes reserved for every variable: one doubleword.
pub const SLOT_SIZE: u32 = 8;

/// Phase marker: declarations are still being collected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Declaring;

/// Phase marker: offsets have been computed exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Finalized;

/// Runtime value of a variable or temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Number(i64),
    Character(u8),
}

impl Value {
    /// Build a value from an arithmetic result and its character flag.
    pub fn from_raw(raw: i64, is_char: bool) -> Self {
        if is_char {
            Value::Character(raw as u8)
        } else {
            Value::Number(raw)
        }
    }

    /// Numeric view used by arithmetic; characters contribute their code point.
    pub fn as_number(self) -> i64 {
        match self {
            Value::Number(n) => n,
            Value::Character(c) => i64::from(c),
        }
    }

    pub fn is_char(self) -> bool {
        matches!(self, Value::Character(_))
    }
}

/// Characters display as the Latin-1 code point of their byte. Program output
/// does not go through this impl; the interpreter writes the raw byte.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Character(c) => write!(f, "{}", *c as char),
        }
    }
}

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub var_type: VarType,
    value: Option<Value>,
    offset: Option<u32>,
}

impl Symbol {
    fn new(name: &str, var_type: VarType) -> Self {
        let value = match var_type {
            VarType::Number => Some(Value::Number(0)),
            VarType::Character => Some(Value::Character(0)),
            // A flex variable has no runtime type until it is first assigned.
            VarType::Flex => None,
        };
        Self {
            name: name.to_string(),
            var_type,
            value,
            offset: None,
        }
    }

    /// Current value; an unassigned flex variable reads as the number zero.
    pub fn value(&self) -> Value {
        self.value.unwrap_or(Value::Number(0))
    }

    /// Runtime type tag: the declared type for `nmbr`/`chr`, the stored tag for `flex`.
    pub fn runtime_type(&self) -> Option<VarType> {
        match self.var_type {
            VarType::Number | VarType::Character => Some(self.var_type),
            VarType::Flex => self.value.map(|v| match v {
                Value::Number(_) => VarType::Number,
                Value::Character(_) => VarType::Character,
            }),
        }
    }

    /// Store a value, converting it to the declared type.
    ///
    /// `nmbr` keeps the numeric view, `chr` keeps the low byte, and `flex`
    /// adopts whatever tag the value carries.
    pub fn store(&mut self, value: Value) {
        self.value = Some(match self.var_type {
            VarType::Number => Value::Number(value.as_number()),
            VarType::Character => Value::Character(value.as_number() as u8),
            VarType::Flex => value,
        });
    }

    /// Memory offset, present once the table is finalized.
    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    /// Storage size in bytes.
    pub fn size(&self) -> u32 {
        SLOT_SIZE
    }
}

/// Errors raised at the symbol table boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Redeclaration of '{name}'")]
    Redeclaration { name: String },

    #[error("Symbol table full, cannot declare '{name}'")]
    TableFull { name: String },
}

/// Symbol table parameterized by its layout phase.
#[derive(Debug, Clone)]
pub struct SymbolTable<P = Declaring> {
    symbols: Vec<Symbol>,
    index: HashMap<String, usize>,
    _phase: PhantomData<P>,
}

impl SymbolTable<Declaring> {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            index: HashMap::new(),
            _phase: PhantomData,
        }
    }

    /// Declare a new variable.
    pub fn declare(&mut self, name: &str, var_type: VarType) -> Result<&mut Symbol, SymbolError> {
        if self.index.contains_key(name) {
            return Err(SymbolError::Redeclaration {
                name: name.to_string(),
            });
        }
        if self.symbols.len() >= MAX_SYMBOLS {
            return Err(SymbolError::TableFull {
                name: name.to_string(),
            });
        }

        let idx = self.symbols.len();
        self.symbols.push(Symbol::new(name, var_type));
        self.index.insert(name.to_string(), idx);
        Ok(&mut self.symbols[idx])
    }

    /// Lay variables out consecutively in declaration order.
    ///
    /// Consuming `self` is what guarantees this runs exactly once.
    pub fn compute_offsets(mut self) -> SymbolTable<Finalized> {
        let mut next = 0u32;
        for symbol in &mut self.symbols {
            symbol.offset = Some(next);
            next += symbol.size();
        }
        log::debug!(
            "laid out {} symbols in {} bytes",
            self.symbols.len(),
            next
        );

        SymbolTable {
            symbols: self.symbols,
            index: self.index,
            _phase: PhantomData,
        }
    }
}

impl Default for SymbolTable<Declaring> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> SymbolTable<P> {
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&idx| &self.symbols[idx])
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        match self.index.get(name) {
            Some(&idx) => Some(&mut self.symbols[idx]),
            None => None,
        }
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolTable<Finalized> {
    /// Memory offset of a variable.
    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.lookup(name).and_then(Symbol::offset)
    }

    /// Total bytes occupied by all variables.
    pub fn data_size(&self) -> u32 {
        self.symbols.iter().map(Symbol::size).sum()
    }
}
