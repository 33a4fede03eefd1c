//! Fact-file format: one tuple per line, fields separated by a configurable
//! delimiter (default tab), optional header line, optional trailing `\r`
//! stripped (§6 "Fact file format").
//!
//! A load/save pair that parses fields against the relation's declared
//! attribute [`Kind`]s instead of sniffing types from content, and writes
//! through the symbol table rather than `Display`-ing raw strings.

use crate::error::IoError;
use crate::symbol_table::SymbolTable;
use crate::value::{Kind, RamDomain, Word};
use std::io::{BufRead, Write};

/// Options carried by a `file` I/O directive map (§6 "Directives map").
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: char,
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: '\t',
            has_header: false,
        }
    }
}

/// Reads every non-header line of `reader` into a tuple, in declared-column
/// order. A malformed row is reported with its 1-based line number rather
/// than aborting the whole load; the caller (§7 kind (c)) decides whether a
/// single bad row fails the relation or the relation is left empty.
pub fn read_tuples<R: BufRead>(
    reader: R,
    file: &str,
    kinds: &[Kind],
    options: &CsvOptions,
    symbols: &SymbolTable,
) -> Result<Vec<Box<[RamDomain]>>, IoError> {
    let mut tuples = Vec::new();
    let mut lines = reader.lines();
    if options.has_header {
        lines.next();
    }
    for (offset, line) in lines.enumerate() {
        let row = offset + usize::from(options.has_header) + 1;
        let mut line = line?;
        if line.ends_with('\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(options.delimiter).collect();
        if fields.len() != kinds.len() {
            return Err(IoError::MalformedRow {
                file: file.to_string(),
                row,
                expected: kinds.len(),
                got: fields.len(),
            });
        }
        let mut tuple = Vec::with_capacity(kinds.len());
        for (field, kind) in fields.iter().zip(kinds) {
            tuple.push(parse_field(field, *kind, file, row, symbols)?);
        }
        tuples.push(tuple.into_boxed_slice());
    }
    Ok(tuples)
}

fn parse_field(
    field: &str,
    kind: Kind,
    file: &str,
    row: usize,
    symbols: &SymbolTable,
) -> Result<RamDomain, IoError> {
    let malformed = |_| IoError::MalformedRow {
        file: file.to_string(),
        row,
        expected: 1,
        got: 0,
    };
    let word = match kind {
        Kind::Signed => Word::from_signed(field.parse::<i64>().map_err(malformed)?),
        Kind::Unsigned => Word::from_unsigned(field.parse::<u64>().map_err(malformed)?),
        Kind::Float => Word::from_float(field.parse::<f64>().map_err(malformed)?),
        Kind::Symbol => Word::from_symbol(symbols.lookup(field)),
        Kind::Record => {
            return Err(IoError::MalformedRow {
                file: file.to_string(),
                row,
                expected: 1,
                got: 0,
            })
        }
    };
    Ok(word.0)
}

/// Writes `tuples` to `writer` in declared-column order, one line per
/// tuple, no trailing delimiter, no header (output relations never carry
/// `headers=true` in practice, but the option is still honored).
pub fn write_tuples<W: Write>(
    mut writer: W,
    tuples: &[Box<[RamDomain]>],
    kinds: &[Kind],
    options: &CsvOptions,
    attribute_names: Option<&[String]>,
    symbols: &SymbolTable,
) -> Result<(), IoError> {
    if options.has_header {
        if let Some(names) = attribute_names {
            let header = names.join(&options.delimiter.to_string());
            writeln!(writer, "{header}")?;
        }
    }
    for tuple in tuples {
        let mut fields = Vec::with_capacity(tuple.len());
        for (&value, &kind) in tuple.iter().zip(kinds) {
            fields.push(format_field(value, kind, symbols));
        }
        let row = fields.join(&options.delimiter.to_string());
        writeln!(writer, "{row}")?;
    }
    Ok(())
}

fn format_field(value: RamDomain, kind: Kind, symbols: &SymbolTable) -> String {
    let word = Word(value);
    match kind {
        Kind::Signed => word.as_signed().to_string(),
        Kind::Unsigned => word.as_unsigned().to_string(),
        Kind::Float => format_float(word.as_float()),
        Kind::Symbol => symbols.resolve(word.as_symbol()).to_string(),
        Kind::Record => word.as_record().to_string(),
    }
}

fn format_float(v: f64) -> String {
    if v == v.trunc() && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_tab_delimited_facts() {
        let symbols = SymbolTable::new();
        let kinds = [Kind::Signed, Kind::Signed];
        let data = "1\t2\n2\t3\n";
        let tuples =
            read_tuples(Cursor::new(data), "e.facts", &kinds, &CsvOptions::default(), &symbols)
                .unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(&*tuples[0], &[1, 2]);
    }

    #[test]
    fn skips_header_when_configured() {
        let symbols = SymbolTable::new();
        let kinds = [Kind::Signed];
        let options = CsvOptions { delimiter: '\t', has_header: true };
        let data = "col0\n1\n2\n";
        let tuples = read_tuples(Cursor::new(data), "x.facts", &kinds, &options, &symbols).unwrap();
        assert_eq!(tuples.len(), 2);
    }

    #[test]
    fn strips_trailing_carriage_return() {
        let symbols = SymbolTable::new();
        let kinds = [Kind::Signed];
        let data = "1\r\n2\r\n";
        let tuples =
            read_tuples(Cursor::new(data), "x.facts", &kinds, &CsvOptions::default(), &symbols)
                .unwrap();
        assert_eq!(&*tuples[0], &[1]);
    }

    #[test]
    fn malformed_row_reports_line_number() {
        let symbols = SymbolTable::new();
        let kinds = [Kind::Signed, Kind::Signed];
        let data = "1\t2\n3\n";
        let err =
            read_tuples(Cursor::new(data), "e.facts", &kinds, &CsvOptions::default(), &symbols)
                .unwrap_err();
        match err {
            IoError::MalformedRow { row, .. } => assert_eq!(row, 2),
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn symbol_fields_roundtrip_through_the_table() {
        let symbols = SymbolTable::new();
        let kinds = [Kind::Symbol];
        let data = "alice\nbob\n";
        let tuples =
            read_tuples(Cursor::new(data), "x.facts", &kinds, &CsvOptions::default(), &symbols)
                .unwrap();
        let mut out = Vec::new();
        write_tuples(&mut out, &tuples, &kinds, &CsvOptions::default(), None, &symbols).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "alice\nbob\n");
    }
}
