//! Serialization of the finished table into a Rust source artifact.

use crate::{
    automaton::StateID,
    grammar::{Grammar, SymbolID},
    table::{Action, ParseTable},
};
use std::fmt;

/// Renders the symbol numbering, per-production metadata and the action
/// table as a self-contained Rust module.
///
/// Construction validates the identifier mapping up front so that nothing
/// is emitted for a grammar containing unmappable symbols.
#[derive(Debug)]
pub struct Codegen<'g> {
    grammar: &'g Grammar,
    table: &'g ParseTable,
    variants: Vec<String>,
}

impl<'g> Codegen<'g> {
    pub fn new(grammar: &'g Grammar, table: &'g ParseTable) -> Result<Self, EmitError> {
        let mut variants = Vec::with_capacity(grammar.symbol_count());
        for id in grammar.symbols() {
            let name = grammar.symbol_name(id);
            let variant = variant_name(name).ok_or_else(|| EmitError::UnmappedSymbol {
                symbol: name.to_owned(),
            })?;
            if let Some(position) = variants.iter().position(|v| *v == variant) {
                return Err(EmitError::DuplicateSymbolName {
                    first: grammar
                        .symbol_name(SymbolID::from_raw(position as u16))
                        .to_owned(),
                    second: name.to_owned(),
                    ident: variant,
                });
            }
            variants.push(variant);
        }
        Ok(Self {
            grammar,
            table,
            variants,
        })
    }

    fn variant(&self, id: SymbolID) -> &str {
        &self.variants[id.into_raw() as usize]
    }
}

impl fmt::Display for Codegen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.grammar;
        let stats = self.table.statistics(g);

        f.write_str("// generated by lrtab -- do not edit\n\n")?;

        writeln!(f, "pub const ROW_COUNT: usize = {};", stats.rows)?;
        writeln!(f, "pub const COLUMN_COUNT: usize = {};", stats.columns)?;
        writeln!(f, "pub const MAX_REDUCE_LEN: usize = {};", stats.max_reduce_len)?;

        f.write_str(
            "\n#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n\
             #[repr(u16)]\n\
             pub enum Symbol {\n",
        )?;
        for id in g.symbols() {
            writeln!(f, "    {} = {},", self.variant(id), id.into_raw())?;
        }
        f.write_str("}\n")?;

        f.write_str("\npub const SYMBOL_NAMES: [&str; COLUMN_COUNT] = [\n")?;
        for id in g.symbols() {
            writeln!(f, "    {:?},", g.symbol_name(id))?;
        }
        f.write_str("];\n")?;

        f.write_str(
            "\n#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n\
             pub enum Action {\n\
             \x20   Shift(u32),\n\
             \x20   Goto(u32),\n\
             \x20   Reduce(Symbol, &'static [Symbol]),\n\
             \x20   Accept,\n\
             }\n",
        )?;

        f.write_str(
            "\npub static TABLE: [[&[Action]; COLUMN_COUNT]; ROW_COUNT] = [\n",
        )?;
        for row in 0..stats.rows {
            f.write_str("    [\n")?;
            for cell in self.table.row(StateID::from_raw(row as u32)) {
                if cell.is_empty() {
                    f.write_str("        &[],\n")?;
                    continue;
                }
                f.write_str("        &[")?;
                for (i, action) in cell.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match action {
                        Action::Shift(to) => write!(f, "Action::Shift({})", to.into_raw())?,
                        Action::Goto(to) => write!(f, "Action::Goto({})", to.into_raw())?,
                        Action::Reduce(p) => {
                            let production = g.production(*p);
                            write!(f, "Action::Reduce(Symbol::{}, &[", self.variant(production.left))?;
                            for (j, sym) in production.right.iter().enumerate() {
                                if j > 0 {
                                    f.write_str(", ")?;
                                }
                                write!(f, "Symbol::{}", self.variant(*sym))?;
                            }
                            f.write_str("])")?;
                        }
                        Action::Accept => f.write_str("Action::Accept")?,
                    }
                }
                f.write_str("],\n")?;
            }
            f.write_str("    ],\n")?;
        }
        f.write_str("];\n")?;

        Ok(())
    }
}

/// Map a grammar token to the emitted enum variant name: a fixed table for
/// the punctuation spellings, upper-casing for identifier-shaped tokens.
fn variant_name(token: &str) -> Option<String> {
    let mapped = match token {
        "(" => "LEFT_PAREN",
        ")" => "RIGHT_PAREN",
        "{" => "LEFT_BRACE",
        "}" => "RIGHT_BRACE",
        "[" => "LEFT_BRACKET",
        "]" => "RIGHT_BRACKET",
        "*" => "STAR",
        "+" => "PLUS",
        "-" => "MINUS",
        "/" => "DIV",
        "," => "COMMA",
        ";" => "SEMICOLON",
        "<" => "LESS_THAN",
        ">" => "GREATER_THAN",
        "<=" => "LESS_EQUALS",
        ">=" => "GREATER_EQUALS",
        "=" => "SINGLE_EQUALS",
        "==" => "DOUBLE_EQUALS",
        "!=" => "NOT_EQUALS",
        "eof" => "END_OF_FILE",
        _ => {
            if !verify_ident(token) {
                return None;
            }
            return Some(token.to_uppercase());
        }
    };
    Some(mapped.to_owned())
}

fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(first) => first,
        None => return false,
    };
    if !(first == '_' || unicode_ident::is_xid_start(first)) {
        return false;
    }
    chars.all(unicode_ident::is_xid_continue)
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("no identifier mapping for symbol `{symbol}'")]
    UnmappedSymbol { symbol: String },

    #[error("symbols `{first}' and `{second}' both map to identifier `{ident}'")]
    DuplicateSymbolName {
        first: String,
        second: String,
        ident: String,
    },
}
