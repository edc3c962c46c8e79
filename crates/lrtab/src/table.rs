//! Conversion of the finished automaton into the per-(state, symbol)
//! action table.

use crate::{
    automaton::{Automaton, StateID},
    grammar::{Grammar, ProductionID, SymbolID},
    util::display_fn,
};
use std::fmt;

/// One decision the runtime parser can take in a state on a symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consume the terminal and transition to the specified state.
    Shift(StateID),

    /// Transition on a non-terminal produced by a preceding reduction.
    Goto(StateID),

    /// Replace the specified production's body with its head.
    Reduce(ProductionID),

    /// The whole start production has been recognized in front of the end
    /// of input.
    Accept,
}

/// Two-dimensional action table indexed `[state][symbol position]`.
///
/// The column order is the grammar's symbol interning order, which is also
/// the numbering the emitter assigns to the symbols; there is exactly one
/// source of that order. A cell holding more than one action is an
/// unresolved shift/reduce or reduce/reduce conflict, forwarded as data.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseTable {
    symbols: Vec<SymbolID>,
    cells: Vec<Vec<Vec<Action>>>,
}

impl ParseTable {
    pub fn build(g: &Grammar, automaton: &Automaton) -> Self {
        let symbols: Vec<SymbolID> = g.symbols().collect();

        let mut cells = Vec::with_capacity(automaton.states.len());
        for state in &automaton.states {
            let mut row: Vec<Vec<Action>> = vec![Vec::new(); symbols.len()];

            for (&sym, &target) in &state.successors {
                let cell = &mut row[sym.into_raw() as usize];
                if g.is_terminal(sym) {
                    cell.push(Action::Shift(target));
                } else {
                    cell.push(Action::Goto(target));
                }

                if sym == g.eoi() {
                    // accept on items whose dot immediately precedes the
                    // trailing end-of-input symbol
                    for (_, item) in state.items.iter() {
                        let right = &g.production(item.production).right;
                        if right.last() == Some(&g.eoi())
                            && item.dot as usize == right.len() - 1
                        {
                            cell.push(Action::Accept);
                        }
                    }
                }
            }

            // completed items reduce in every terminal column, without any
            // lookahead filtering
            for (_, item) in state.items.iter() {
                let right = &g.production(item.production).right;
                if item.dot as usize != right.len() {
                    continue;
                }
                for &sym in &symbols {
                    if g.is_terminal(sym) {
                        row[sym.into_raw() as usize].push(Action::Reduce(item.production));
                    }
                }
            }

            cells.push(row);
        }

        Self { symbols, cells }
    }

    /// The column order, equal to the grammar's symbol numbering.
    pub fn symbols(&self) -> &[SymbolID] {
        &self.symbols
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn columns(&self) -> usize {
        self.symbols.len()
    }

    pub fn cell(&self, state: StateID, symbol: SymbolID) -> &[Action] {
        &self.cells[state.into_raw() as usize][symbol.into_raw() as usize]
    }

    pub fn row(&self, state: StateID) -> &[Vec<Action>] {
        &self.cells[state.into_raw() as usize]
    }

    /// Derived counts, for reporting and for consumers with fixed-capacity
    /// rule storage.
    pub fn statistics(&self, g: &Grammar) -> Statistics {
        let mut filled = 0;
        let mut max_reduce_len = 0;
        let mut conflicts = 0;
        for row in &self.cells {
            for cell in row {
                if !cell.is_empty() {
                    filled += 1;
                }
                if cell.len() > 1 {
                    conflicts += 1;
                }
                for action in cell {
                    if let Action::Reduce(production) = action {
                        max_reduce_len =
                            max_reduce_len.max(g.production(*production).right.len());
                    }
                }
            }
        }
        Statistics {
            rows: self.rows(),
            columns: self.columns(),
            filled,
            conflicts,
            max_reduce_len,
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (index, row) in self.cells.iter().enumerate() {
                if index > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", StateID::from_raw(index as u32))?;
                for (&sym, cell) in self.symbols.iter().zip(row) {
                    if cell.is_empty() {
                        continue;
                    }
                    write!(f, "- {} =>", g.symbol_name(sym))?;
                    for (i, action) in cell.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        match action {
                            Action::Shift(to) => write!(f, " shift({:?})", to)?,
                            Action::Goto(to) => write!(f, " goto({:?})", to)?,
                            Action::Reduce(p) => {
                                write!(f, " reduce({})", g.production(*p).display(g))?
                            }
                            Action::Accept => f.write_str(" accept")?,
                        }
                    }
                    writeln!(f)?;
                }
            }
            Ok(())
        })
    }
}

/// Reporting-only counts derived from a finished table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub rows: usize,
    pub columns: usize,
    pub filled: usize,
    pub conflicts: usize,
    pub max_reduce_len: usize,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} states x {} symbols, {} non-empty cells ({} conflicted), longest reduced body: {}",
            self.rows, self.columns, self.filled, self.conflicts, self.max_reduce_len
        )
    }
}
