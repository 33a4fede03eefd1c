//! `stdin`/`stdout` I/O types (§4.7 "Built-in types"). Thin adapters over
//! [`crate::io::csv`]: the line format is identical to a `file` directive,
//! the only difference is which stream the bytes come from.

use crate::error::IoError;
use crate::io::csv::{self, CsvOptions};
use crate::symbol_table::SymbolTable;
use crate::value::{Kind, RamDomain};
use std::io::{self, BufReader};

pub fn read_stdin(
    kinds: &[Kind],
    options: &CsvOptions,
    symbols: &SymbolTable,
) -> Result<Vec<Box<[RamDomain]>>, IoError> {
    csv::read_tuples(BufReader::new(io::stdin()), "<stdin>", kinds, options, symbols)
}

pub fn write_stdout(
    tuples: &[Box<[RamDomain]>],
    kinds: &[Kind],
    options: &CsvOptions,
    attribute_names: Option<&[String]>,
    symbols: &SymbolTable,
) -> Result<(), IoError> {
    csv::write_tuples(io::stdout().lock(), tuples, kinds, options, attribute_names, symbols)
}
