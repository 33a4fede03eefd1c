//! User-defined functor ABI (§6 "User-defined functor ABI").
//!
//! A functor is an `extern "C"` symbol, resolved by name inside one of the
//! libraries named by `--libraries`/`--library-dir`. Parameter and return
//! types mirror the declared attribute types: signed -> `int64_t`,
//! unsigned -> `uint64_t`, float -> `double`, symbol -> `const char*`.
//! `libloading` gives us dynamic symbol resolution but not a dynamic call
//! (unlike `libffi`, a `Symbol` still has a concrete Rust function-pointer
//! type); [`dispatch`] covers the signatures real functor libraries
//! realistically export — up to four numeric/record arguments, one or two
//! float arguments, one or two symbol arguments — and panics on anything
//! wider, since semantic analysis is expected to have already rejected an
//! undeclared or mismatched functor before this point.

use crate::value::{Kind, RamDomain, Word};
use libloading::{Library, Symbol};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};

/// Loaded functor libraries plus a cache of resolved symbol addresses.
/// Libraries are kept open for the registry's lifetime so cached addresses
/// stay valid.
pub struct FunctorRegistry {
    libraries: Vec<Library>,
    addresses: RwLock<HashMap<String, usize>>,
}

impl FunctorRegistry {
    /// No libraries configured; every [`FunctorRegistry::call`] will panic.
    /// Valid for programs with no user-defined functors.
    pub fn empty() -> Self {
        FunctorRegistry { libraries: Vec::new(), addresses: RwLock::new(HashMap::new()) }
    }

    /// Opens every library named in `libraries`, searching `library_dirs` in
    /// order; a bare name (no path separator) resolves to `lib<name>.<ext>`
    /// with the platform's shared-library extension.
    pub fn load(library_dirs: &[PathBuf], libraries: &[String]) -> anyhow::Result<Self> {
        let mut loaded = Vec::with_capacity(libraries.len());
        for name in libraries {
            let path = resolve_library_path(library_dirs, name)
                .ok_or_else(|| anyhow::anyhow!("functor library `{name}` not found in any --library-dir"))?;
            // SAFETY: loading an operator-supplied shared library is
            // inherently unsafe; the caller chose `--libraries`/`--library-dir`.
            let lib = unsafe { Library::new(&path) }
                .map_err(|e| anyhow::anyhow!("failed to load functor library `{}`: {e}", path.display()))?;
            loaded.push(lib);
        }
        Ok(FunctorRegistry { libraries: loaded, addresses: RwLock::new(HashMap::new()) })
    }

    fn resolve(&self, name: &str) -> usize {
        if let Some(&addr) = self.addresses.read().get(name) {
            return addr;
        }
        for lib in &self.libraries {
            // SAFETY: we only read the symbol's address, never its type;
            // the actual call signature is picked in `dispatch` from the
            // declared arg/return kinds.
            let found: Option<usize> = unsafe {
                lib.get::<unsafe extern "C" fn()>(name.as_bytes())
                    .ok()
                    .map(|sym: Symbol<unsafe extern "C" fn()>| *sym as usize)
            };
            if let Some(addr) = found {
                self.addresses.write().insert(name.to_string(), addr);
                return addr;
            }
        }
        panic!("functor `{name}` has no resolvable symbol in any configured library (should have been caught by semantic analysis)");
    }

    /// Calls a resolved functor. `symbols` is needed to materialize any
    /// `Symbol`-kinded argument as a `const char*` and to intern any
    /// `Symbol`-kinded return value back to an index.
    pub fn call(
        &self,
        name: &str,
        args: &[RamDomain],
        arg_types: &[Kind],
        return_type: Kind,
        symbols: &crate::symbol_table::SymbolTable,
    ) -> RamDomain {
        let addr = self.resolve(name);
        // SAFETY: `addr` was resolved from a symbol the caller's library
        // actually exports; the declared kinds determine which concrete
        // function-pointer type we reinterpret it as. A mismatch between
        // the declared ABI and the library's real signature is undefined
        // behavior on the library author's part, not something this
        // dispatcher can detect.
        unsafe { dispatch(addr, args, arg_types, return_type, symbols) }
    }
}

fn resolve_library_path(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.exists().then(|| candidate.to_path_buf());
    }
    let filename = platform_filename(name);
    dirs.iter().map(|dir| dir.join(&filename)).find(|p| p.exists())
}

#[cfg(target_os = "macos")]
fn platform_filename(name: &str) -> String {
    format!("lib{name}.dylib")
}

#[cfg(target_os = "windows")]
fn platform_filename(name: &str) -> String {
    format!("{name}.dll")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_filename(name: &str) -> String {
    format!("lib{name}.so")
}

unsafe fn dispatch(
    addr: usize,
    args: &[RamDomain],
    arg_types: &[Kind],
    return_type: Kind,
    symbols: &crate::symbol_table::SymbolTable,
) -> RamDomain {
    let all_numeric = arg_types.iter().all(|k| matches!(k, Kind::Signed | Kind::Unsigned | Kind::Record));
    let all_symbol = arg_types.iter().all(|k| matches!(k, Kind::Symbol));
    let all_float = arg_types.iter().all(|k| matches!(k, Kind::Float));

    if all_numeric && matches!(return_type, Kind::Signed | Kind::Unsigned | Kind::Record) {
        return dispatch_numeric(addr, args);
    }
    if all_float && return_type == Kind::Float && args.len() <= 2 {
        return dispatch_float(addr, args);
    }
    if all_symbol && matches!(return_type, Kind::Signed | Kind::Unsigned) && args.len() <= 2 {
        return dispatch_symbol_args(addr, args, symbols);
    }
    panic!(
        "functor ABI with arg kinds {arg_types:?} -> {return_type:?} and arity {} is not supported by this dispatcher",
        args.len()
    );
}

unsafe fn dispatch_numeric(addr: usize, args: &[RamDomain]) -> RamDomain {
    match args.len() {
        0 => {
            let f: unsafe extern "C" fn() -> i64 = std::mem::transmute(addr);
            f()
        }
        1 => {
            let f: unsafe extern "C" fn(i64) -> i64 = std::mem::transmute(addr);
            f(args[0])
        }
        2 => {
            let f: unsafe extern "C" fn(i64, i64) -> i64 = std::mem::transmute(addr);
            f(args[0], args[1])
        }
        3 => {
            let f: unsafe extern "C" fn(i64, i64, i64) -> i64 = std::mem::transmute(addr);
            f(args[0], args[1], args[2])
        }
        4 => {
            let f: unsafe extern "C" fn(i64, i64, i64, i64) -> i64 = std::mem::transmute(addr);
            f(args[0], args[1], args[2], args[3])
        }
        n => panic!("numeric functor arity {n} exceeds the supported maximum of 4"),
    }
}

unsafe fn dispatch_float(addr: usize, args: &[RamDomain]) -> RamDomain {
    let result = match args.len() {
        1 => {
            let f: unsafe extern "C" fn(f64) -> f64 = std::mem::transmute(addr);
            f(Word(args[0]).as_float())
        }
        2 => {
            let f: unsafe extern "C" fn(f64, f64) -> f64 = std::mem::transmute(addr);
            f(Word(args[0]).as_float(), Word(args[1]).as_float())
        }
        n => panic!("float functor arity {n} exceeds the supported maximum of 2"),
    };
    Word::from_float(result).0
}

unsafe fn dispatch_symbol_args(addr: usize, args: &[RamDomain], symbols: &crate::symbol_table::SymbolTable) -> RamDomain {
    let strings: Vec<CString> = args
        .iter()
        .map(|&a| CString::new(symbols.resolve(Word(a).as_symbol()).as_bytes()).expect("functor symbol argument must not contain a NUL byte"))
        .collect();
    match strings.len() {
        1 => {
            let f: unsafe extern "C" fn(*const c_char) -> i64 = std::mem::transmute(addr);
            f(strings[0].as_ptr())
        }
        2 => {
            let f: unsafe extern "C" fn(*const c_char, *const c_char) -> i64 = std::mem::transmute(addr);
            f(strings[0].as_ptr(), strings[1].as_ptr())
        }
        n => panic!("symbol functor arity {n} exceeds the supported maximum of 2"),
    }
}

/// Reads a NUL-terminated `const char*` a functor returned back into an
/// owned `String`. Exposed for a return-type-`Symbol` functor, which the
/// numeric dispatcher above does not (yet) call into directly.
///
/// # Safety
/// `ptr` must point to a valid, NUL-terminated C string whose lifetime
/// outlives this call.
pub unsafe fn read_returned_symbol(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_has_no_libraries() {
        let registry = FunctorRegistry::empty();
        assert!(registry.libraries.is_empty());
    }

    #[test]
    fn platform_filename_wraps_bare_names() {
        let name = platform_filename("myfunctors");
        assert!(name.contains("myfunctors"));
    }

    #[test]
    fn resolve_library_path_rejects_missing_bare_name() {
        let dirs = vec![PathBuf::from("/nonexistent-functor-dir")];
        assert!(resolve_library_path(&dirs, "doesnotexist").is_none());
    }
}
