/*!
A global dictionary of interned strings. Provides an abstraction API for any interner library.

*/

use std::sync::Mutex;

use lazy_static::lazy_static;
use string_interner::{
  StringInterner,
  symbol::SymbolU32
};

pub type InternedString = SymbolU32;

lazy_static! {
  static ref STRING_INTERNER: Mutex<StringInterner> = Mutex::new(StringInterner::default());
}


pub fn interned(string: &str) -> InternedString {
  STRING_INTERNER.lock().unwrap().get_or_intern(string)
}


pub fn interned_static(string: &'static str) -> InternedString {
  STRING_INTERNER.lock().unwrap().get_or_intern_static(string)
}


pub fn get_interned(string: &str) -> Option<InternedString> {
  STRING_INTERNER.lock().unwrap().get(string)
}

/// Resolves an interned string to an owned copy of its text. Interned strings never leave the
/// interner, so resolution only fails for a symbol that was never produced by `interned`.
pub fn resolve_str(symbol: InternedString) -> String {
  STRING_INTERNER.lock()
                 .unwrap()
                 .resolve(symbol)
                 .map(str::to_owned)
                 .unwrap_or_default()
}

pub fn resolve_str_checked(symbol: InternedString) -> Option<String> {
  STRING_INTERNER.lock().unwrap().resolve(symbol).map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip() {
    let symbol = interned("Orderless");
    assert_eq!(symbol, interned_static("Orderless"));
    assert_eq!(resolve_str(symbol), "Orderless");
    assert_eq!(get_interned("Orderless"), Some(symbol));
  }
}
