//! # I/O subsystem (§4.7)
//!
//! A small registry mapping "IO type" strings (from the `IO` key of a
//! directive map, see [`crate::parser`]) to the `file`/`stdin`/`stdout`
//! readers and writers below, driven entirely by directive strings parsed
//! out of the source program so `.input`/`.output` statements resolve their
//! backend at load time rather than at a call site.
//!
//! Record/symbol-table persistence ([`record_io`]) is orthogonal to the
//! per-relation fact format and is only invoked when a directive requests
//! it (`intermediate=true`).

pub mod csv;
pub mod record_io;
pub mod std_stream;

use crate::error::IoError;
use crate::record_table::RecordTable;
use crate::symbol_table::SymbolTable;
use crate::value::{Kind, RamDomain};
use csv::CsvOptions;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// The IO type a directive map resolves to. `file` is the default when the
/// `IO` key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoKind {
    File,
    Stdin,
    Stdout,
    Sqlite,
}

fn resolve_kind(directives: &BTreeMap<String, String>) -> Result<IoKind, IoError> {
    match directives.get("IO").map(String::as_str).unwrap_or("file") {
        "file" => Ok(IoKind::File),
        "stdin" => Ok(IoKind::Stdin),
        "stdout" => Ok(IoKind::Stdout),
        "sqlite" => Ok(IoKind::Sqlite),
        other => Err(IoError::UnknownIoType(other.to_string())),
    }
}

fn csv_options(directives: &BTreeMap<String, String>) -> CsvOptions {
    let delimiter = directives
        .get("delimiter")
        .and_then(|d| d.chars().next())
        .unwrap_or('\t');
    let has_header = directives.get("headers").map(String::as_str) == Some("true");
    CsvOptions { delimiter, has_header }
}

fn attribute_names(directives: &BTreeMap<String, String>) -> Option<Vec<String>> {
    directives
        .get("attributeNames")
        .map(|names| names.split(',').map(str::trim).map(str::to_string).collect())
}

fn fact_file_path(relation: &str, directives: &BTreeMap<String, String>, dir: &Path) -> PathBuf {
    match directives.get("filename") {
        Some(name) => {
            let candidate = Path::new(name);
            if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                dir.join(candidate)
            }
        }
        None => dir.join(format!("{relation}.facts")),
    }
}

/// Loads one relation's tuples per its `input`/`intermediate` directive.
/// §7 kind (c): a malformed row or missing file is the caller's to decide
/// whether to propagate or to log and leave the relation empty.
pub fn read_relation(
    relation: &str,
    kinds: &[Kind],
    directives: &BTreeMap<String, String>,
    fact_dir: &Path,
    symbols: &SymbolTable,
    records: &RecordTable,
) -> Result<Vec<Box<[RamDomain]>>, IoError> {
    let options = csv_options(directives);
    let tuples = match resolve_kind(directives)? {
        IoKind::File => {
            let path = fact_file_path(relation, directives, fact_dir);
            let file = File::open(&path)?;
            csv::read_tuples(
                BufReader::new(file),
                &path.display().to_string(),
                kinds,
                &options,
                symbols,
            )?
        }
        IoKind::Stdin => std_stream::read_stdin(kinds, &options, symbols)?,
        IoKind::Stdout => {
            return Err(IoError::MissingDirective("filename".to_string(), "stdout is write-only".to_string()))
        }
        IoKind::Sqlite => return Err(sqlite_unavailable()),
    };
    if let Some(symtab_path) = directives.get("symtabfilename") {
        let file = File::open(symtab_path)?;
        record_io::read_symbol_table(BufReader::new(file), symtab_path, symbols)?;
    }
    let _ = records;
    Ok(tuples)
}

/// Writes one relation's tuples per its `output`/`printsize` directive. §7
/// kind (d): any error here is fatal and propagated to the caller.
pub fn write_relation(
    relation: &str,
    tuples: &[Box<[RamDomain]>],
    kinds: &[Kind],
    directives: &BTreeMap<String, String>,
    output_dir: &Path,
    symbols: &SymbolTable,
) -> Result<(), IoError> {
    let options = csv_options(directives);
    let names = attribute_names(directives);
    let names_ref = names.as_deref();
    match resolve_kind(directives)? {
        IoKind::File => {
            let path = fact_file_path(relation, directives, output_dir);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(&path)?;
            csv::write_tuples(file, tuples, kinds, &options, names_ref, symbols)?;
        }
        IoKind::Stdout => std_stream::write_stdout(tuples, kinds, &options, names_ref, symbols)?,
        IoKind::Stdin => {
            return Err(IoError::MissingDirective("filename".to_string(), "stdin is read-only".to_string()))
        }
        IoKind::Sqlite => return Err(sqlite_unavailable()),
    }
    if let Some(symtab_path) = directives.get("symtabfilename") {
        let file = File::create(symtab_path)?;
        record_io::write_symbol_table(file, symbols)?;
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn sqlite_unavailable() -> IoError {
    IoError::UnknownIoType("sqlite".to_string())
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_unavailable() -> IoError {
    IoError::SqliteDisabled
}

/// Computes the fact-file path a directive set would resolve to, without
/// performing any I/O. Exposed for diagnostics and tests.
pub fn resolve_fact_path(relation: &str, directives: &BTreeMap<String, String>, dir: &Path) -> PathBuf {
    fact_file_path(relation, directives, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn directives(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn unknown_io_type_is_rejected() {
        let dir = tempdir().unwrap();
        let symbols = SymbolTable::new();
        let records = RecordTable::new();
        let dirs = directives(&[("IO", "carrier-pigeon")]);
        let err = read_relation("e", &[Kind::Signed], &dirs, dir.path(), &symbols, &records).unwrap_err();
        assert!(matches!(err, IoError::UnknownIoType(_)));
    }

    #[test]
    fn default_fact_path_uses_relation_name() {
        let dirs = BTreeMap::new();
        let path = resolve_fact_path("edge", &dirs, Path::new("/tmp/facts"));
        assert_eq!(path, Path::new("/tmp/facts/edge.facts"));
    }

    #[test]
    fn round_trips_through_a_real_file() {
        let dir = tempdir().unwrap();
        let symbols = SymbolTable::new();
        let records = RecordTable::new();
        let path = dir.path().join("e.facts");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "1\t2").unwrap();
        writeln!(file, "2\t3").unwrap();
        drop(file);

        let dirs = BTreeMap::new();
        let tuples =
            read_relation("e", &[Kind::Signed, Kind::Signed], &dirs, dir.path(), &symbols, &records)
                .unwrap();
        assert_eq!(tuples.len(), 2);

        let out_dir = tempdir().unwrap();
        write_relation("e", &tuples, &[Kind::Signed, Kind::Signed], &dirs, out_dir.path(), &symbols)
            .unwrap();
        let written = std::fs::read_to_string(out_dir.path().join("e.facts")).unwrap();
        assert_eq!(written, "1\t2\n2\t3\n");
    }
}
