//! Construction of the shift/reduce automaton: item sets, closure and the
//! goto-graph fixpoint with state deduplication.

use crate::{
    grammar::{Grammar, ProductionID, SymbolID},
    report::Reporter,
    util::{display_fn, Map},
};
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u32);

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

impl StateID {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u32 {
        self.0
    }
}

/// A production with a dot position marking the recognized prefix length.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub production: ProductionID,
    pub dot: u16,
}

impl Item {
    fn advanced(self) -> Self {
        Self {
            dot: self.dot + 1,
            ..self
        }
    }

    /// The element of the dotted sequence at `pos`, where `None` is the dot
    /// itself. The sequence is one element longer than the production body.
    fn dotted_at(self, right: &[SymbolID], pos: usize) -> Option<SymbolID> {
        let dot = self.dot as usize;
        if pos == dot {
            None
        } else if pos < dot {
            Some(right[pos])
        } else {
            Some(right[pos - 1])
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let production = g.production(self.production);
            write!(f, "{} -> [ ", g.symbol_name(production.left))?;
            for (i, r) in production.right.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                if i == self.dot as usize {
                    f.write_str(". ")?;
                }
                f.write_str(g.symbol_name(*r))?;
            }
            if production.right.len() == self.dot as usize {
                write!(f, " .")?;
            }
            write!(f, " ]")
        })
    }
}

/// Position-by-position comparison of two dotted sequences, truncated to the
/// length of the shorter one. Items of different lengths can therefore
/// compare equal.
fn dotted_prefix_eq(g: &Grammar, a: Item, b: Item) -> bool {
    let ra = &g.production(a.production).right;
    let rb = &g.production(b.production).right;
    let len = (ra.len() + 1).min(rb.len() + 1);
    (0..len).all(|pos| a.dotted_at(ra, pos) == b.dotted_at(rb, pos))
}

/// A set of items, grouped by the head symbol they were introduced for.
///
/// The grouping is an indexing aid carried through closure and goto; state
/// deduplication compares group against group.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    groups: Map<SymbolID, Vec<Item>>,
}

impl ItemSet {
    /// Insert `item` into the group keyed by `head` unless an exactly equal
    /// item is already present in that group.
    pub fn insert(&mut self, head: SymbolID, item: Item) -> bool {
        let group = self.groups.entry(head).or_default();
        if group.contains(&item) {
            return false;
        }
        group.push(item);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|group| group.is_empty())
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(|group| group.len()).sum()
    }

    /// All items with their group key, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolID, Item)> + '_ {
        self.groups
            .iter()
            .flat_map(|(head, group)| group.iter().map(move |item| (*head, *item)))
    }

    /// Fixpoint expansion: whenever the dot immediately precedes a
    /// non-terminal, that non-terminal's productions join the set at dot
    /// position zero. Full passes repeat until one adds nothing, so the
    /// output order is deterministic for a fixed input order.
    pub fn close(&mut self, g: &Grammar) {
        let mut changed = true;
        while changed {
            changed = false;

            let mut added = Vec::new();
            for (_, item) in self.iter() {
                let right = &g.production(item.production).right;
                let next = match right.get(item.dot as usize) {
                    Some(&next) if g.is_nonterminal(next) => next,
                    _ => continue,
                };
                for &production in g.productions_of(next) {
                    added.push((next, Item { production, dot: 0 }));
                }
            }

            for (head, item) in added {
                changed |= self.insert(head, item);
            }
        }
    }
}

/// Relaxed comparison used for state deduplication.
///
/// Every group of `left` must be present in `right`, and every item of a
/// `left` group must have some item in the matching `right` group whose
/// dotted sequence agrees with it up to the shorter length. Groups present
/// only in `right` are not inspected, so the relation is asymmetric; both
/// the truncation and the asymmetry are deliberate and affect which states
/// merge, and therefore the state numbering.
fn compare_item_sets(g: &Grammar, left: &ItemSet, right: &ItemSet) -> bool {
    for (head, group) in &left.groups {
        let other = match right.groups.get(head) {
            Some(other) => other,
            None => return false,
        };
        for &item in group {
            if !other.iter().any(|&o| dotted_prefix_eq(g, item, o)) {
                return false;
            }
        }
    }
    true
}

/// Automaton node: closed item set, outgoing transitions and predecessor
/// edges (for traceability only).
#[derive(Debug, Clone)]
pub struct State {
    pub items: ItemSet,
    pub successors: Map<SymbolID, StateID>,
    pub predecessors: Vec<StateID>,
    expanded: bool,
}

impl State {
    fn new(items: ItemSet, predecessors: Vec<StateID>) -> Self {
        Self {
            items,
            successors: Map::default(),
            predecessors,
            expanded: false,
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            writeln!(f, "## items:")?;
            for (_, item) in self.items.iter() {
                writeln!(f, "- {}", item.display(g))?;
            }
            if !self.successors.is_empty() {
                writeln!(f, "## successors:")?;
                for (sym, to) in &self.successors {
                    writeln!(f, "- {} => {:?}", g.symbol_name(*sym), to)?;
                }
            }
            if !self.predecessors.is_empty() {
                writeln!(f, "## predecessors:")?;
                for from in &self.predecessors {
                    writeln!(f, "- {:?}", from)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct Automaton {
    pub states: Vec<State>,
}

impl Automaton {
    pub fn state(&self, id: StateID) -> &State {
        &self.states[id.into_raw() as usize]
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (index, state) in self.states.iter().enumerate() {
                writeln!(f, "#### State {:?}", StateID::from_raw(index as u32))?;
                write!(f, "{}", state.display(g))?;
            }
            Ok(())
        })
    }
}

/// Construction limits.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on the state count. Ambiguous or deeply nested grammars
    /// can blow the goto graph up; exceeding the bound aborts with
    /// [`BuildError::ResourceExhausted`] instead of looping.
    pub max_states: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_states: 10_000 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("state count exceeded the configured limit of {limit}")]
    ResourceExhausted { limit: usize },
}

/// Build the canonical collection of states for `g`.
///
/// State 0 is seeded from the closure of the start head's productions at
/// dot position zero. Each pass expands every state created before the
/// pass began; the loop ends when a full pass allocates no new state.
pub fn construct(
    g: &Grammar,
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<Automaton, BuildError> {
    let mut seed = ItemSet::default();
    for &production in g.productions_of(g.start()) {
        seed.insert(g.start(), Item { production, dot: 0 });
    }
    seed.close(g);

    let mut states = vec![State::new(seed, Vec::new())];

    let mut pass = 0;
    loop {
        let mut changed = false;
        let snapshot = states.len();
        for current in 0..snapshot {
            if states[current].expanded {
                continue;
            }
            states[current].expanded = true;
            let from = StateID::from_raw(current as u32);

            // group the advanced items by the symbol after the dot,
            // keeping each item's head group; completed items drop out
            let mut transitions: Map<SymbolID, ItemSet> = Map::default();
            for (head, item) in states[current].items.iter() {
                let right = &g.production(item.production).right;
                let sym = match right.get(item.dot as usize) {
                    Some(&sym) => sym,
                    None => continue,
                };
                transitions.entry(sym).or_default().insert(head, item.advanced());
            }

            for (sym, advanced) in transitions {
                let mut candidate = advanced;
                candidate.close(g);

                // linear scan over every existing state, in creation order,
                // under the relaxed comparison
                let found = states
                    .iter()
                    .position(|state| compare_item_sets(g, &state.items, &candidate));

                let next = match found {
                    Some(index) => {
                        states[index].predecessors.push(from);
                        index
                    }
                    None => {
                        if states.len() >= config.max_states {
                            return Err(BuildError::ResourceExhausted {
                                limit: config.max_states,
                            });
                        }
                        let index = states.len();
                        tracing::trace!(
                            "state {} allocated from {:?} on `{}'",
                            index,
                            from,
                            g.symbol_name(sym)
                        );
                        states.push(State::new(candidate, vec![from]));
                        changed = true;
                        index
                    }
                };
                states[current]
                    .successors
                    .insert(sym, StateID::from_raw(next as u32));
            }
        }

        pass += 1;
        reporter.pass_completed(pass, states.len());
        if !changed {
            break;
        }
    }

    Ok(Automaton { states })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullReporter;

    fn grammar(source: &str) -> Grammar {
        Grammar::parse(source, "program", &mut NullReporter).unwrap()
    }

    fn build(g: &Grammar) -> Automaton {
        construct(g, &Config::default(), &mut NullReporter).unwrap()
    }

    fn item(g: &Grammar, head: &str, nth: usize, dot: u16) -> (SymbolID, Item) {
        let head = g.lookup(head).unwrap();
        let production = g.productions_of(head)[nth];
        (head, Item { production, dot })
    }

    #[test]
    fn closure_is_idempotent() {
        let g = grammar(
            "\
program
    sum eof
sum
    sum + sum
    int
",
        );
        let mut set = ItemSet::default();
        let (head, seed) = item(&g, "program", 0, 0);
        set.insert(head, seed);
        set.close(&g);
        let once: Vec<_> = set.iter().collect();
        set.close(&g);
        let twice: Vec<_> = set.iter().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn closure_expands_along_nonterminal_edges() {
        let g = grammar(
            "\
program
    sum eof
sum
    sum + sum
    int
",
        );
        let mut set = ItemSet::default();
        let (head, seed) = item(&g, "program", 0, 0);
        set.insert(head, seed);
        set.close(&g);

        let expected = [
            item(&g, "program", 0, 0),
            item(&g, "sum", 0, 0),
            item(&g, "sum", 1, 0),
        ];
        let got: Vec<_> = set.iter().collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn chain_grammar_has_one_state_per_depth() {
        let g = grammar("program\n    a b c\n");
        let automaton = build(&g);
        assert_eq!(automaton.states.len(), 4);

        // the completed item appears only in the last state
        for (index, state) in automaton.states.iter().enumerate() {
            let completed = state.items.iter().any(|(_, item)| {
                item.dot as usize == g.production(item.production).right.len()
            });
            assert_eq!(completed, index == 3, "state {}", index);
        }
    }

    #[test]
    fn start_state_of_sum_grammar() {
        let g = grammar(
            "\
program
    sum
sum
    sum + sum
    int
",
        );
        let automaton = build(&g);
        let expected = [
            item(&g, "program", 0, 0),
            item(&g, "sum", 0, 0),
            item(&g, "sum", 1, 0),
        ];
        let got: Vec<_> = automaton.states[0].items.iter().collect();
        assert_eq!(got, expected);

        // shifting `int` reaches a state whose single item is `sum -> int .`
        let int = g.lookup("int").unwrap();
        let target = automaton.states[0].successors[&int];
        let state = automaton.state(target);
        assert_eq!(state.items.len(), 1);
        let (_, only) = state.items.iter().next().unwrap();
        assert_eq!(only, item(&g, "sum", 1, 1).1);
    }

    #[test]
    fn goto_resolution_is_deterministic() {
        let source = "\
program
    stmts eof
stmts
    stmts stmt
    stmt
stmt
    int ;
    ( stmts )
";
        let g1 = grammar(source);
        let g2 = grammar(source);
        let a = build(&g1);
        let b = build(&g2);

        assert_eq!(a.states.len(), b.states.len());
        for (x, y) in a.states.iter().zip(&b.states) {
            let xs: Vec<_> = x.successors.iter().map(|(s, t)| (*s, *t)).collect();
            let ys: Vec<_> = y.successors.iter().map(|(s, t)| (*s, *t)).collect();
            assert_eq!(xs, ys);
        }
    }

    #[test]
    fn every_reachable_state_is_expanded_once() {
        let g = grammar(
            "\
program
    sum eof
sum
    sum + sum
    int
",
        );
        let automaton = build(&g);
        assert!(automaton.states.iter().all(|state| state.expanded));

        for state in &automaton.states {
            for (_, target) in &state.successors {
                assert!((target.into_raw() as usize) < automaton.states.len());
            }
        }
    }

    #[test]
    fn state_zero_has_no_predecessors() {
        let g = grammar("program\n    int eof\n");
        let automaton = build(&g);
        assert!(automaton.states[0].predecessors.is_empty());
    }

    #[test]
    fn dotted_comparison_truncates_to_shorter_item() {
        let g = grammar(
            "\
program
    a b
    a b c
",
        );
        let (_, short) = item(&g, "program", 0, 1); // a . b
        let (_, long) = item(&g, "program", 1, 1); // a . b c
        assert!(dotted_prefix_eq(&g, short, long));
        assert!(dotted_prefix_eq(&g, long, short));

        let (_, moved) = item(&g, "program", 1, 2); // a b . c
        assert!(!dotted_prefix_eq(&g, short, moved));
    }

    #[test]
    fn item_set_comparison_is_asymmetric() {
        let g = grammar(
            "\
program
    sum eof
sum
    int
",
        );
        let mut small = ItemSet::default();
        let (head, seed) = item(&g, "sum", 0, 0);
        small.insert(head, seed);

        let mut large = small.clone();
        let (head, other) = item(&g, "program", 0, 0);
        large.insert(head, other);

        // every group of `small` is covered by `large`, not the reverse
        assert!(compare_item_sets(&g, &small, &large));
        assert!(!compare_item_sets(&g, &large, &small));
    }

    #[test]
    fn state_limit_is_enforced() {
        let g = grammar(
            "\
program
    sum eof
sum
    sum + sum
    int
",
        );
        let config = Config { max_states: 2 };
        let err = construct(&g, &config, &mut NullReporter).unwrap_err();
        assert!(matches!(err, BuildError::ResourceExhausted { limit: 2 }));
    }
}
