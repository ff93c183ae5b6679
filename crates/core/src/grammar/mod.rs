/// Re-exports from the diagnostics crate.
pub mod diag;
/// Field map built from a block body, with primitive coercion.
pub mod fields;
/// Line splitter and character-class predicates for markers and `key: value`.
pub mod lexer;
/// Block scanner: marker discipline, size ceilings, and block acceptance.
pub mod scanner;
