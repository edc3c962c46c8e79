//! Grammar types.

use crate::{
    report::Reporter,
    util::{display_fn, Map, Set},
};
use std::fmt;

/// Reserved spelling of the end-of-input terminal.
///
/// It terminates the augmented start production and may never be declared
/// as a head.
pub const EOI_TOKEN: &str = "eof";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolID {
    raw: u16,
}

impl SymbolID {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u16,
}

impl ProductionID {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug, Clone)]
pub struct Production {
    pub left: SymbolID,
    pub right: Vec<SymbolID>,
}

impl Production {
    // `"LHS := R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} := ", g.symbol_name(self.left))?;
            for (i, symbol) in self.right.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                f.write_str(g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// A set of symbols backed by a bit set.
#[derive(Debug, Default, Clone)]
pub struct SymbolIDSet {
    inner: bit_set::BitSet,
}

impl SymbolIDSet {
    pub fn contains(&self, id: SymbolID) -> bool {
        self.inner.contains(id.into_raw().into())
    }
    pub fn insert(&mut self, id: SymbolID) -> bool {
        self.inner.insert(id.into_raw().into())
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.inner
            .iter()
            .map(|raw| raw.try_into().map(SymbolID::from_raw).unwrap())
    }
}

impl FromIterator<SymbolID> for SymbolIDSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = SymbolID>,
    {
        Self {
            inner: iter.into_iter().map(|s| s.into_raw().into()).collect(),
        }
    }
}

/// The grammar definition used to derive the parser tables.
///
/// Immutable once built; the interning order of `symbols` is the numbering
/// contract shared by the table columns and the emitted identifiers.
#[derive(Debug)]
pub struct Grammar {
    symbols: Set<String>,
    productions: Vec<Production>,
    by_head: Map<SymbolID, Vec<ProductionID>>,
    terminals: SymbolIDSet,
    start: SymbolID,
    eoi: SymbolID,
}

impl Grammar {
    /// Parse a line-oriented grammar specification.
    ///
    /// Blank lines and lines starting with `#` in the first column are
    /// ignored. A line with no leading whitespace declares a new head;
    /// each following whitespace-led line is one production body, tokens
    /// separated by ASCII whitespace. Indented lines before the first head
    /// declaration are reported through `reporter` and skipped.
    pub fn parse(
        source: &str,
        start: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<Self, GrammarError> {
        let mut def = GrammarDef::new(start);
        for (lineno, line) in source.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            if !line.starts_with(|c: char| c.is_ascii_whitespace()) {
                def.head(line.trim())?;
                continue;
            }
            if !def.has_head() {
                reporter.orphan_line(lineno + 1, line.trim_end());
                continue;
            }
            def.production(line.split_ascii_whitespace())?;
        }
        def.end()
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(start: &str, f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef::new(start);
        f(&mut def)?;
        def.end()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// All referenced symbols in interning order, which is also the column
    /// order of the table and the emitted numbering.
    pub fn symbols(&self) -> impl Iterator<Item = SymbolID> + '_ {
        (0..self.symbols.len() as u16).map(SymbolID::from_raw)
    }

    pub fn symbol_name(&self, id: SymbolID) -> &str {
        &self.symbols[id.into_raw() as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolID> {
        self.symbols
            .get_index_of(name)
            .map(|i| SymbolID::from_raw(i as u16))
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[id.into_raw() as usize]
    }

    /// All productions in declaration order.
    pub fn productions(&self) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.productions
            .iter()
            .enumerate()
            .map(|(i, p)| (ProductionID::from_raw(i as u16), p))
    }

    /// Productions owned by `head`, in declaration order. Empty for
    /// terminals and for heads declared without a body.
    pub fn productions_of(&self, head: SymbolID) -> &[ProductionID] {
        self.by_head.get(&head).map(|ids| &ids[..]).unwrap_or(&[])
    }

    /// Declared heads, in declaration order.
    pub fn heads(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.by_head.keys().copied()
    }

    pub fn is_nonterminal(&self, id: SymbolID) -> bool {
        self.by_head.contains_key(&id)
    }

    pub fn is_terminal(&self, id: SymbolID) -> bool {
        self.terminals.contains(id)
    }

    pub fn terminals(&self) -> &SymbolIDSet {
        &self.terminals
    }

    pub fn start(&self) -> SymbolID {
        self.start
    }

    /// The reserved end-of-input terminal. Always interned, even when the
    /// grammar text never references it.
    pub fn eoi(&self) -> SymbolID {
        self.eoi
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for id in self.symbols() {
            if self.is_terminal(id) {
                writeln!(f, "{}", self.symbol_name(id))?;
            }
        }

        writeln!(f, "\n## nonterminals:")?;
        for id in self.heads() {
            write!(f, "{}", self.symbol_name(id))?;
            if id == self.start {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## productions:")?;
        for (_, production) in self.productions() {
            writeln!(f, "{}", production.display(self))?;
        }

        Ok(())
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    symbols: Set<String>,
    productions: Vec<Production>,
    by_head: Map<SymbolID, Vec<ProductionID>>,
    current: Option<SymbolID>,
    start: String,
}

impl GrammarDef {
    fn new(start: &str) -> Self {
        Self {
            symbols: Set::default(),
            productions: Vec::new(),
            by_head: Map::default(),
            current: None,
            start: start.to_owned(),
        }
    }

    fn intern(&mut self, name: &str) -> SymbolID {
        let (index, _) = self.symbols.insert_full(name.to_owned());
        SymbolID::from_raw(index as u16)
    }

    /// Declare a new head symbol. Subsequent productions belong to it.
    /// Re-declaring a head reopens it instead of discarding its earlier
    /// productions.
    pub fn head(&mut self, name: &str) -> Result<SymbolID, GrammarError> {
        if name == EOI_TOKEN {
            return Err(GrammarError::ReservedHead);
        }
        let id = self.intern(name);
        self.by_head.entry(id).or_default();
        self.current = Some(id);
        Ok(id)
    }

    pub fn has_head(&self) -> bool {
        self.current.is_some()
    }

    /// Add one production body for the current head.
    pub fn production<'a, I>(&mut self, body: I) -> Result<ProductionID, GrammarError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let left = self.current.ok_or_else(|| GrammarError::Other {
            msg: "no head declared for production".into(),
        })?;
        let right = body.into_iter().map(|tok| self.intern(tok)).collect();
        let id = ProductionID::from_raw(self.productions.len() as u16);
        self.productions.push(Production { left, right });
        self.by_head[&left].push(id);
        Ok(id)
    }

    fn end(mut self) -> Result<Grammar, GrammarError> {
        let start = match self.symbols.get_index_of(self.start.as_str()) {
            Some(index) if self.by_head.contains_key(&SymbolID::from_raw(index as u16)) => {
                SymbolID::from_raw(index as u16)
            }
            _ => {
                return Err(GrammarError::MissingStartSymbol {
                    name: self.start.clone(),
                })
            }
        };

        // eoi always occupies a table column, referenced or not
        let eoi = self.intern(EOI_TOKEN);

        let terminals = (0..self.symbols.len() as u16)
            .map(SymbolID::from_raw)
            .filter(|id| !self.by_head.contains_key(id))
            .collect();

        Ok(Grammar {
            symbols: self.symbols,
            productions: self.productions,
            by_head: self.by_head,
            terminals,
            start,
            eoi,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("the start symbol `{name}' is not declared as a head")]
    MissingStartSymbol { name: String },

    #[error("`eof' is reserved for the end of input and cannot be declared as a head")]
    ReservedHead,

    #[error("{msg}")]
    Other { msg: String },
}
