/*!

Primitive expression node types.

An `Atom` is either a leaf (symbol, string, or number) or an M-expression, an
`SExpression` whose zeroth part is the head and whose remaining parts are the
elements. The S-expression node also carries the evaluation cache consulted by
the rewrite engine; the cache never participates in equality or hashing.

*/

use std::{
  cell::RefCell,
  rc::Rc
};
use std::hash::{Hash, Hasher};

use strum_macros::{
  EnumDiscriminants,
  IntoStaticStr
};
use rug::{
  Integer as BigInteger,
  Float as BigFloat,
  Rational as BigRational,
};


use crate::{
  cache::EvalCache,
  interner::{
    InternedString,
    resolve_str,
    interned_static
  },
  format::{
    Formattable,
    ExpressionFormatter,
    DisplayForm,
    display_formattable_impl
  },
};

#[derive(Clone, PartialEq, Debug, IntoStaticStr, EnumDiscriminants)]
#[strum_discriminants(name(AtomKind))]
pub enum Atom {
  String(InternedString),
  Integer(BigInteger),
  Rational(BigRational),
  Real(BigFloat),
  Symbol(InternedString),
  SExpression(Rc<SCell>)
}

/// The node type backing `Atom::SExpression`: the parts vector (`parts[0]` is the head) together
/// with the evaluation cache the rewrite engine consults before re-walking the expression.
#[derive(Debug)]
pub struct SCell {
  pub parts: Vec<Atom>,
  pub(crate) cache: RefCell<EvalCache>,
}

impl SCell {
  pub fn new(parts: Vec<Atom>) -> SCell {
    SCell {
      parts,
      cache: RefCell::new(EvalCache::new())
    }
  }
}

// The cache is a memo, not part of the value.
impl PartialEq for SCell {
  fn eq(&self, other: &Self) -> bool {
    self.parts == other.parts
  }
}


impl Atom {
  pub fn head(&self) -> Atom {
    match self {
      Atom::SExpression(cell) => {
        match cell.parts.first() {
          Some(expression) => expression.clone(),
          None => headless_s_expression(),
        }
      }

      atom => {
        Symbol::from_static_str(atom.into())
      }
    }
  }

  /// Reports the `AtomKind` of `self`.
  pub fn kind(&self) -> AtomKind {
    self.into()
  }

  /// Reports the `AtomKind` of the head.
  pub fn head_kind(&self) -> AtomKind {
    match self {
      Atom::SExpression(cell) => {
        cell.parts[0].kind()
      }

      _atom => {
        // The head of any leaf is a symbol.
        AtomKind::Symbol
      }
    }
  }

  /// Gives the symbol (as an `InternedString`) under which the properties of this
  /// expression would be stored in the symbol table.
  pub fn name(&self) -> Option<InternedString> {
    match self {
      Atom::SExpression(_) => {
        match self.head() {
          Atom::Symbol(name) => Some(name),
          _                  => None
        }
      },
      Atom::Symbol(name) => Some(*name),
      _                  => None
    }
  }

  /// The symbol under which rewrite rules for this expression are looked up: the name of the
  /// symbol at the bottom of the chain of heads. For `f[x][y]` this is `f`, the symbol whose
  /// sub-values apply.
  pub fn lookup_name(&self) -> Option<InternedString> {
    match self {
      Atom::Symbol(name)      => Some(*name),
      Atom::SExpression(cell) => cell.parts[0].lookup_name(),
      _                       => None
    }
  }

  /// Returns the number of elements of the expression. Only S-expressions can have nonzero
  /// length; the head is not counted.
  pub fn len(&self) -> usize {
    match self {
      Atom::SExpression(cell) => cell.parts.len() - 1,
      _                       => 0
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Structural identity, the `SameQ` of the object language. Stricter than `==` for reals:
  /// two reals are the same only if they are bit-identical, so `0.0` and `-0.0` differ and a
  /// `NaN` is the same as itself. Atoms of distinct numeric types are never the same.
  #[allow(non_snake_case)]
  pub fn sameQ(&self, other: &Atom) -> bool {
    match (self, other) {
      (Atom::Symbol(s),      Atom::Symbol(t))      => s == t,
      (Atom::String(s),      Atom::String(t))      => s == t,
      (Atom::Integer(v),     Atom::Integer(u))     => v == u,
      (Atom::Rational(v),    Atom::Rational(u))    => v == u,
      (Atom::Real(v),        Atom::Real(u))        => v.as_ord() == u.as_ord(),
      (Atom::SExpression(f), Atom::SExpression(g)) => {
        f.parts.len() == g.parts.len()
            && f.parts.iter().zip(g.parts.iter()).all(|(a, b)| a.sameQ(b))
      }
      _ => false
    }
  }

  /// Checks whether `self` is an S-expression with head `Symbol(head_name)` and, if `length` is
  /// given, exactly `length` elements.
  pub fn has_form(&self, head_name: &'static str, length: Option<usize>) -> bool {
    match self {
      Atom::SExpression(cell) => {
        cell.parts[0] == Symbol::from_static_str(head_name)
            && length.map_or(true, |n| cell.parts.len() == n + 1)
      }
      _ => false
    }
  }

  /// A deep copy: every S-expression node is rebuilt with a fresh (empty) evaluation cache.
  /// Leaves are cheap clones.
  pub fn copy(&self) -> Atom {
    match self {
      Atom::SExpression(cell) => {
        let parts = cell.parts.iter().map(Atom::copy).collect();
        Atom::SExpression(Rc::new(SCell::new(parts)))
      }
      atom => atom.clone()
    }
  }

  // region Pattern matching utilities

  /// Is `atom` the symbol `True`
  pub fn is_true(&self) -> bool {
    *self == Atom::Symbol(interned_static("True"))
  }

  /// If `self` has the form `Sequence[a, b, …]`, returns a vector of only the elements `a, b, …`.
  pub fn is_sequence(&self) -> Option<Vec<Atom>> {
    if let Atom::SExpression(cell) = self {
      if cell.parts[0] == Symbol::from_static_str("Sequence") {
        return Some(cell.parts[1..].to_vec());
      }
    }
    None
  }

  pub(crate) fn is_any_variable_kind(&self) -> bool {
    self.check_variable_pattern("Blank").is_some()
        || self.check_variable_pattern("BlankSequence").is_some()
        || self.check_variable_pattern("BlankNullSequence").is_some()
  }

  /// Checks if `self` has the form `Pattern[□, Blank[□]]` (equiv. `□_□`).
  /// Returns the name if `self` is a `Blank`.
  pub fn is_variable(&self) -> Option<InternedString> {
    self.check_variable_pattern("Blank")
  }

  /// Checks if `self` has the form `Pattern[□, BlankSequence[□]]` (equiv. `□__□`).
  /// Returns the name if `self` is a `BlankSequence`.
  pub fn is_sequence_variable(&self) -> Option<InternedString> {
    self.check_variable_pattern("BlankSequence")
  }

  /// Checks if `self` has the form `Pattern[□, BlankNullSequence[□]]` (equiv. `□___□`).
  /// Returns the name if `self` is a `BlankNullSequence`.
  pub fn is_null_sequence_variable(&self) -> Option<InternedString> {
    self.check_variable_pattern("BlankNullSequence")
  }

  /// Auxiliary function for `is_*_variable` functions. (Do not use for validation.)
  fn check_variable_pattern(&self, symbol: &'static str) -> Option<InternedString> {
    if let Atom::SExpression(cell) = self {
      if cell.parts.len() > 2
          && cell.parts[0] == Symbol::from_static_str("Pattern")
          && cell.parts[2].head() == Symbol::from_static_str(symbol)
      {
        return cell.parts[1].name();
      }
    }
    None
  }

  pub fn is_number(&self) -> bool {
    match self {
      Atom::Integer(_)
      | Atom::Rational(_)
      | Atom::Real(_) => true,
      _ => false,
    }
  }

  // endregion
}


impl Eq for Atom {}

/**
  If two expressions just happen to have the same representation, a string and a symbol, we still want their hashes
  to differ. So we hash a type-specific prefix before hashing the data. We use the same prefix as Cory's expreduce
  for compatibility. I believe Cory chose his prefixes at random. We do the same.

  ```text
    real      : [195, 244, 76 , 249, 227, 115, 88 , 251]
    rational  : [90 , 82 , 214, 51 , 52 , 7  , 7  , 33]
  s-expression: [72 , 5  , 244, 86 , 5  , 210, 69 , 30]
    integer   : [242, 99 , 84 , 113, 102, 46 , 118, 94]
    string    : [102, 206, 57 , 172, 207, 100, 198, 133]
    symbol    : [107, 10 , 247, 23 , 33 , 221, 163, 156]
  ```

*/
impl Hash for Atom {
  fn hash<H: Hasher>(&self, hasher: &mut H) {
    match self {
      Atom::String(v) => {
        hasher.write(&[102, 206, 57 , 172, 207, 100, 198, 133]);
        v.hash(hasher);
      }

      Atom::Integer(v) => {
        hasher.write(&[242, 99, 84, 113, 102, 46, 118, 94]);
        v.hash(hasher)
      }

      Atom::Rational(v) => {
        hasher.write(&[90, 82, 214, 51, 52, 7, 7, 33]);
        v.hash(hasher)
      }

      Atom::Real(v) => {
        hasher.write(&[195, 244, 76 , 249, 227, 115, 88 , 251]);
        v.as_ord().hash(hasher);
      }

      Atom::Symbol(v) => {
        hasher.write(&[107, 10 , 247, 23 , 33 , 221, 163, 156]);
        v.hash(hasher);
      }

      Atom::SExpression(cell) => {
        hasher.write(&[72 , 5  , 244, 86 , 5  , 210, 69 , 30]);
        for part in cell.parts.iter() {
          part.hash(hasher);
        }
      }

    }
  }
}

impl Formattable for Atom {
  fn format(&self, formatter: &ExpressionFormatter) -> String {
    match self {
      Atom::String(v) => {
        format!("\"{}\"", resolve_str(*v))
      }
      Atom::Integer(v) => {
        format!("{}", v)
      }
      Atom::Rational(v) => {
        format!("{}/{}", v.numer(), v.denom())
      }
      Atom::Real(v) => {
        format!("{}", v)
      }
      Atom::Symbol(v) => {
        resolve_str(*v)
      }
      Atom::SExpression(cell) => {
        if let Some(name) = self.is_variable() {
          match formatter.form {
            DisplayForm::Matcher => format!("‹{}›", resolve_str(name)),
            _                    => format!("{}_", resolve_str(name)),
          }
        } else if let Some(name) = self.is_sequence_variable() {
          match formatter.form {
            DisplayForm::Matcher => format!("«{}»", resolve_str(name)),
            _                    => format!("{}__", resolve_str(name)),
          }
        } else if let Some(name) = self.is_null_sequence_variable() {
          match formatter.form {
            DisplayForm::Matcher => format!("«{}»", resolve_str(name)),
            _                    => format!("{}___", resolve_str(name)),
          }
        } else {
          // A "normal" function
          let mut part_iter = cell.parts.iter();
          let head = match part_iter.next() {
            Some(head) => head,
            None       => headless_s_expression(),
          };
          format!(
            "{}[{}]",
            head.format(formatter),
            part_iter.map(|c| c.format(formatter))
                     .collect::<Vec<_>>()
                     .join(", ")
          )
        }
      }
    }
  }
}

display_formattable_impl!(Atom);


/// A critical error state.
fn headless_s_expression() -> ! {
  unreachable!("Encountered an S-expression without a head, which is impossible. This is a bug.")
}


/// There are a variety of common tasks that apply only to a specific variant of `Atom`. Instead of packing them all
/// into `Atom`'s impl, we put them into free functions in a module named after the variant. The functions that remain
/// in `Atom`'s impl are those that could reasonably be called on any `Atom` variant.
#[allow(non_snake_case)]
pub(crate) mod Symbol {
  use crate::atom::Atom;
  use crate::interner::{
    interned,
    interned_static
  };

  /// We often have a need to create an expression for some standard built-in or stdlib symbol.
  pub(crate) fn from_static_str(name: &'static str) -> Atom {
    Atom::Symbol(interned_static(name))
  }

  /// Create a symbol from a `&str`.
  pub(crate) fn from_str(name: &str) -> Atom {
    Atom::Symbol(interned(name))
  }

}

#[allow(non_snake_case)]
pub(crate) mod SExpression {
  use std::rc::Rc;
  use super::*;
  use crate::interner::InternedString;

  // region Convenience construction functions
  // Using these functions decreases the probability of an incorrectly constructed expression.

  /// Creates a new `Atom::SExpression` having head `head` and elements `elements`.
  pub(crate) fn new(head: Atom, mut elements: Vec<Atom>) -> Atom {
    let mut parts = Vec::with_capacity(elements.len() + 1);
    parts.push(head);
    parts.append(&mut elements);
    Atom::SExpression(Rc::new(SCell::new(parts)))
  }

  /// Creates a new `Atom::SExpression` from a complete parts vector, `parts[0]` being the head.
  pub(crate) fn from_parts(parts: Vec<Atom>) -> Atom {
    Atom::SExpression(Rc::new(SCell::new(parts)))
  }

  /// Creates an `Atom::SExpression` whose elements are a permutation of `original`'s. The new
  /// node inherits `original`'s cache, adjusted by `EvalCache::reordered`, keeping the symbol
  /// set without a rebuild.
  pub(crate) fn reordered(original: &Atom, head: Atom, mut elements: Vec<Atom>) -> Atom {
    let cache = match original {
      Atom::SExpression(cell) => cell.cache.borrow().reordered(),
      _                       => EvalCache::new(),
    };
    let mut parts = Vec::with_capacity(elements.len() + 1);
    parts.push(head);
    parts.append(&mut elements);
    Atom::SExpression(Rc::new(SCell { parts, cache: RefCell::new(cache) }))
  }

  /// We often have a need to create an expression for some standard built-in or stdlib symbol.
  pub(crate) fn with_str_head(head_str: &'static str) -> Atom {
    from_parts(vec![Symbol::from_static_str(head_str)])
  }

  /// We often have a need to create an expression for some standard built-in or stdlib symbol.
  pub(crate) fn with_symbolic_head(head: InternedString) -> Atom {
    from_parts(vec![Atom::Symbol(head)])
  }

  /// Creates an empty `Sequence[]`.
  pub(crate) fn empty_sequence() -> Atom {
    with_str_head("Sequence")
  }

  /// Creates a `Sequence[…]` with the provided elements.
  pub(crate) fn sequence(elements: Vec<Atom>) -> Atom {
    new(Symbol::from_static_str("Sequence"), elements)
  }

  /// Creates a `List[…]` with the provided elements.
  pub(crate) fn list(elements: Vec<Atom>) -> Atom {
    new(Symbol::from_static_str("List"), elements)
  }

  /// Creates a variable, i.e. an expression of the form `Pattern[name, Blank[]]` (`name_`).
  /// The provided `name` is turned into a symbol.
  pub(crate) fn variable(name: &'static str) -> Atom {
    make_variable(name, "Blank")
  }

  /// Creates a sequence variable, i.e. an expression of the form `Pattern[name, BlankSequence[]]`
  /// (`name__`). The provided `name` is turned into a symbol.
  pub(crate) fn sequence_variable(name: &'static str) -> Atom {
    make_variable(name, "BlankSequence")
  }

  /// Creates a null sequence variable, i.e. an expression of the form
  /// `Pattern[name, BlankNullSequence[]]` (`name___`). The provided `name` is turned into a symbol.
  pub(crate) fn null_sequence_variable(name: &'static str) -> Atom {
    make_variable(name, "BlankNullSequence")
  }

  fn make_variable(name: &'static str, var_kind: &'static str) -> Atom {
    from_parts(vec![
      Symbol::from_static_str("Pattern"),
      Symbol::from_static_str(name),
      with_str_head(var_kind)
    ])
  }

  // endregion

  /// An S-expression just wraps a parts vector, and we have to destructure in almost every
  /// operation on S-expressions. This function panics if `expression` is not an `Atom::SExpression`.
  pub(crate) fn parts(expression: &Atom) -> &[Atom] {
    if let Atom::SExpression(cell) = expression {
      cell.parts.as_slice()
    } else {
      unreachable!("Tried to destructure a non-S-expression `Atom`.");
    }
  }

  /// The elements of the S-expression, i.e. every part but the head.
  /// Panics if `expression` is not an `Atom::SExpression`.
  pub(crate) fn elements(expression: &Atom) -> &[Atom] {
    &parts(expression)[1..]
  }

  /// Makes a copy of `function` with the same head and no (other) elements.
  /// Panics if you provide anything other than `Atom::SExpression`.
  pub(crate) fn duplicate_with_head(function: &Atom) -> Atom {
    from_parts(vec![parts(function)[0].clone()])
  }

  /// Return the expression at index `n` in the S-expression. Indices start at 0, and the 0th part
  /// is always the head of the expression. This function panics if expression isn't an
  /// S-expression. For the behavior of `Part[exp, n]`, use the built-in.
  pub(crate) fn part(expression: &Atom, n: usize) -> Atom {
    parts(expression)[n].clone()
  }

  /// Creates a new S-expression with the same elements as `expression` but with head `head`.
  /// Each element is cloned.
  pub(crate) fn new_swapped_head(head: Atom, expression: &Atom) -> Atom {
    let old_parts = parts(expression);
    let mut new_parts = Vec::with_capacity(old_parts.len());
    new_parts.push(head);
    new_parts.extend(old_parts[1..].iter().cloned());
    from_parts(new_parts)
  }

  /// If the head is a variable, returns the name of the variable.
  pub(crate) fn is_head_variable(expression: &Atom) -> Option<InternedString> {
    match expression {
      Atom::SExpression(cell) => cell.parts[0].is_variable(),
      _                       => None
    }
  }

}


#[cfg(test)]
mod tests {
  #![allow(non_snake_case)]
  use super::*;

  fn int(n: i64) -> Atom {
    Atom::Integer(BigInteger::from(n))
  }

  #[test]
  fn heads_and_lengths() {
    let f = SExpression::new(
      Symbol::from_static_str("f"),
      vec![int(1), Symbol::from_static_str("x")]
    );

    assert_eq!(f.head(), Symbol::from_static_str("f"));
    assert_eq!(f.len(), 2);
    assert_eq!(int(7).head(), Symbol::from_static_str("Integer"));
    assert_eq!(Symbol::from_static_str("x").head(), Symbol::from_static_str("Symbol"));
    assert_eq!(Atom::Real(BigFloat::with_val(53, 1.5)).head(), Symbol::from_static_str("Real"));
    assert_eq!(int(7).len(), 0);
  }

  #[test]
  fn lookup_name_follows_head_chain() {
    // f[x][y]
    let curried = SExpression::new(
      SExpression::new(Symbol::from_static_str("f"), vec![Symbol::from_static_str("x")]),
      vec![Symbol::from_static_str("y")]
    );
    assert_eq!(curried.lookup_name(), Some(interned_static("f")));
    assert_eq!(curried.name(), None);
  }

  #[test]
  fn sameQ_is_structural() {
    let a = SExpression::new(Symbol::from_static_str("f"), vec![int(1), int(2)]);
    let b = SExpression::new(Symbol::from_static_str("f"), vec![int(1), int(2)]);
    assert!(a.sameQ(&b));

    // Distinct numeric types are never the same.
    assert!(!int(1).sameQ(&Atom::Real(BigFloat::with_val(53, 1.0))));
    assert!(!int(1).sameQ(&Atom::Rational(BigRational::from((1, 1)))));

    // Reals are compared bit-exactly.
    let zero     = Atom::Real(BigFloat::with_val(53, 0.0));
    let neg_zero = Atom::Real(BigFloat::with_val(53, -0.0));
    assert!(!zero.sameQ(&neg_zero));
    let nan = Atom::Real(BigFloat::with_val(53, f64::NAN));
    assert!(nan.sameQ(&nan.copy()));
  }

  #[test]
  fn has_form_checks_head_and_arity() {
    let rule = SExpression::new(
      Symbol::from_static_str("Rule"),
      vec![Symbol::from_static_str("a"), int(1)]
    );
    assert!(rule.has_form("Rule", Some(2)));
    assert!(rule.has_form("Rule", None));
    assert!(!rule.has_form("Rule", Some(1)));
    assert!(!rule.has_form("RuleDelayed", Some(2)));
    assert!(!int(3).has_form("Integer", None));
  }

  #[test]
  fn variables_report_their_names() {
    let x = SExpression::variable("x");
    assert_eq!(x.is_variable(), Some(interned_static("x")));
    assert_eq!(x.is_sequence_variable(), None);

    let xs = SExpression::sequence_variable("xs");
    assert_eq!(xs.is_sequence_variable(), Some(interned_static("xs")));
    assert!(xs.is_any_variable_kind());
  }

  #[test]
  fn copy_is_deep() {
    let original = SExpression::new(
      Symbol::from_static_str("f"),
      vec![SExpression::list(vec![int(1)])]
    );
    let duplicate = original.copy();
    assert!(original.sameQ(&duplicate));
    if let (Atom::SExpression(a), Atom::SExpression(b)) = (&original, &duplicate) {
      assert!(!Rc::ptr_eq(a, b));
    } else {
      unreachable!();
    }
  }

  #[test]
  fn formatting() {
    let expression = SExpression::new(
      Symbol::from_static_str("f"),
      vec![
        SExpression::variable("x"),
        Atom::Rational(BigRational::from((1, 2))),
        Atom::String(interned_static("s"))
      ]
    );
    assert_eq!(expression.to_string(), "f[x_, 1/2, \"s\"]");
  }
}
