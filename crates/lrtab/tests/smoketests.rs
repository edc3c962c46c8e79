use lrtab::{
    automaton::{construct, Config},
    codegen::Codegen,
    grammar::Grammar,
    report::NullReporter,
    table::{Action, ParseTable},
};

const TOY_LANGUAGE: &str = "\
# statement-oriented toy language
program
    stmts eof

stmts
    stmts stmt
    stmt

stmt
    expr ;

expr
    sum

sum
    sum + term
    sum - term
    term

term
    term * factor
    term / factor
    factor

factor
    ( expr )
    int
    float
";

fn generate(source: &str) -> (Grammar, ParseTable) {
    let grammar = Grammar::parse(source, "program", &mut NullReporter).unwrap();
    let automaton = construct(&grammar, &Config::default(), &mut NullReporter).unwrap();
    let table = ParseTable::build(&grammar, &automaton);
    (grammar, table)
}

#[test]
fn toy_language_end_to_end() {
    let grammar = Grammar::parse(TOY_LANGUAGE, "program", &mut NullReporter).unwrap();
    let automaton = construct(&grammar, &Config::default(), &mut NullReporter).unwrap();

    assert!(automaton.states[0].predecessors.is_empty());
    assert!(!automaton.states[0].successors.is_empty());

    let table = ParseTable::build(&grammar, &automaton);
    assert_eq!(table.rows(), automaton.states.len());
    assert_eq!(table.columns(), grammar.symbol_count());

    // accept lives in the end-of-input column only
    for row in 0..table.rows() {
        let id = lrtab::automaton::StateID::from_raw(row as u32);
        for &sym in table.symbols() {
            if table
                .cell(id, sym)
                .iter()
                .any(|action| matches!(action, Action::Accept))
            {
                assert_eq!(sym, grammar.eoi());
            }
        }
    }

    // every completed state reduces on every terminal of the row
    let stats = table.statistics(&grammar);
    assert!(stats.filled > 0);
    assert_eq!(stats.max_reduce_len, 3);

    let generated = Codegen::new(&grammar, &table).unwrap().to_string();
    assert!(generated.contains("pub enum Symbol {"));
    assert!(generated.contains(&format!("pub const ROW_COUNT: usize = {};", table.rows())));
}

#[test]
fn repeated_runs_emit_identical_artifacts() {
    let (g1, t1) = generate(TOY_LANGUAGE);
    let (g2, t2) = generate(TOY_LANGUAGE);

    let first: Vec<&str> = g1.symbols().map(|id| g1.symbol_name(id)).collect();
    let second: Vec<&str> = g2.symbols().map(|id| g2.symbol_name(id)).collect();
    assert_eq!(first, second);
    assert_eq!(t1, t2);

    let a1 = Codegen::new(&g1, &t1).unwrap().to_string();
    let a2 = Codegen::new(&g2, &t2).unwrap().to_string();
    assert_eq!(a1, a2);
}

#[test]
fn ambiguous_grammar_surfaces_conflicts() {
    let (g, table) = generate(
        "\
program
    sum eof
sum
    sum + sum
    int
",
    );
    let stats = table.statistics(&g);
    assert!(stats.conflicts > 0, "expected at least one conflicted cell");
}
