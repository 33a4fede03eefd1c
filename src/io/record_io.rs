//! Intermediate persistence for the symbol and record tables (§6
//! "Intermediate record files"). Used when a directive set requests
//! `intermediate` I/O alongside a relation's own fact file, so a second run
//! can rehydrate the same symbol/record indices rather than re-interning
//! from scratch.

use crate::error::IoError;
use crate::record_table::RecordTable;
use crate::symbol_table::SymbolTable;
use crate::value::RamDomain;
use std::io::{BufRead, Write};

/// Writes one line per interned symbol: `symbol TAB index`, preceded by a
/// line holding the total count.
pub fn write_symbol_table<W: Write>(mut writer: W, symbols: &SymbolTable) -> Result<(), IoError> {
    let entries = symbols.entries();
    writeln!(writer, "{}", entries.len())?;
    for (idx, symbol) in entries {
        writeln!(writer, "{symbol}\t{idx}")?;
    }
    Ok(())
}

/// Reads a symbol-table file back, interning every symbol at its recorded
/// index. Since [`SymbolTable::lookup`] assigns indices in insertion order,
/// the file must be replayed in its original (ascending-index) order for
/// the rehydrated table to match; we verify that rather than silently
/// producing a differently-indexed table.
pub fn read_symbol_table<R: BufRead>(
    reader: R,
    file: &str,
    symbols: &SymbolTable,
) -> Result<(), IoError> {
    let mut lines = reader.lines();
    if lines.next().is_none() {
        return Ok(());
    }
    for (offset, line) in lines.enumerate() {
        let row = offset + 2;
        let line = line?;
        let (symbol, index) = line.rsplit_once('\t').ok_or_else(|| IoError::MalformedRow {
            file: file.to_string(),
            row,
            expected: 2,
            got: 1,
        })?;
        let index: u32 = index.parse().map_err(|_| IoError::MalformedRow {
            file: file.to_string(),
            row,
            expected: 2,
            got: 1,
        })?;
        let assigned = symbols.lookup(symbol);
        if assigned != index {
            return Err(IoError::MalformedRow {
                file: file.to_string(),
                row,
                expected: index as usize,
                got: assigned as usize,
            });
        }
    }
    Ok(())
}

/// Writes one line per packed record: `arity TAB recordIndex TAB field0 TAB
/// field1 …`. Index 0 (nil) is never packed by [`RecordTable::pack`], so it
/// never appears here.
pub fn write_record_table<W: Write>(mut writer: W, records: &[(u32, Box<[RamDomain]>)]) -> Result<(), IoError> {
    for (idx, fields) in records {
        let rendered = fields.iter().map(ToString::to_string).collect::<Vec<_>>().join("\t");
        writeln!(writer, "{}\t{idx}\t{rendered}", fields.len())?;
    }
    Ok(())
}

/// Reads a record file back, repacking every row into `records` so its
/// index is preserved.
pub fn read_record_table<R: BufRead>(
    reader: R,
    file: &str,
    records: &RecordTable,
) -> Result<(), IoError> {
    for (offset, line) in reader.lines().enumerate() {
        let row = offset + 1;
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split('\t');
        let malformed = || IoError::MalformedRow {
            file: file.to_string(),
            row,
            expected: 2,
            got: 0,
        };
        let arity: usize = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
        let expected_index: u32 = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
        let fields: Vec<RamDomain> = parts
            .map(|f| f.parse::<RamDomain>())
            .collect::<Result<_, _>>()
            .map_err(|_| malformed())?;
        if fields.len() != arity {
            return Err(IoError::MalformedRow { file: file.to_string(), row, expected: arity, got: fields.len() });
        }
        let packed = records.pack(&fields, arity);
        if packed != expected_index {
            return Err(IoError::MalformedRow {
                file: file.to_string(),
                row,
                expected: expected_index as usize,
                got: packed as usize,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn symbol_table_roundtrips() {
        let symbols = SymbolTable::new();
        symbols.lookup("alice");
        symbols.lookup("bob");
        let mut buf = Vec::new();
        write_symbol_table(&mut buf, &symbols).unwrap();

        let rehydrated = SymbolTable::new();
        read_symbol_table(Cursor::new(buf), "symtab", &rehydrated).unwrap();
        assert_eq!(rehydrated.lookup("alice"), symbols.lookup("alice"));
        assert_eq!(rehydrated.lookup("bob"), symbols.lookup("bob"));
    }

    #[test]
    fn record_table_roundtrips() {
        let records = RecordTable::new();
        let idx = records.pack(&[1, 2, 3], 3);
        let mut buf = Vec::new();
        write_record_table(&mut buf, &[(idx, Box::from([1, 2, 3]))]).unwrap();

        let rehydrated = RecordTable::new();
        read_record_table(Cursor::new(buf), "records", &rehydrated).unwrap();
        assert_eq!(rehydrated.unpack(idx, 3).as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn malformed_record_row_is_reported() {
        let records = RecordTable::new();
        let err = read_record_table(Cursor::new("not-a-number\t0\n"), "records", &records).unwrap_err();
        assert!(matches!(err, IoError::MalformedRow { .. }));
    }
}
