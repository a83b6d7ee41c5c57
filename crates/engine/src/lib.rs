pub mod cell;
pub mod dep_graph;
pub mod formula;
pub mod recalc;
pub mod spreadsheet;
