/*!

The per-expression evaluation cache.

Every S-expression node carries an `EvalCache` recording when the rewrite engine last brought the
expression to a fixed point (`time`, a logical clock value from the rule database), which symbols
occur anywhere inside the expression, and at which element positions a `Sequence` sits waiting to
be spliced. The engine consults the cache to skip re-evaluating subexpressions whose relevant
definitions have not changed since the recorded time.

All fields are lazy. A freshly built expression has an empty cache; the symbol set and sequence
positions are computed on first use, and `time` is only stamped by the engine.

*/

use fnv::FnvHashSet;
use smallvec::SmallVec;

use crate::{
  atom::Atom,
  context::Context,
  interner::{interned_static, InternedString},
};

pub(crate) type SequencePositions = SmallVec<[usize; 4]>;

#[derive(Clone, Debug, Default)]
pub struct EvalCache {
  /// Logical-clock time at which the expression was last evaluated to a fixed point.
  pub(crate) time: Option<u64>,
  /// Names of all symbols occurring in the expression, heads included.
  pub(crate) symbols: Option<FnvHashSet<InternedString>>,
  /// Element indices (0-based, head not counted) whose head is `Sequence`.
  pub(crate) sequences: Option<SequencePositions>,
}

impl EvalCache {
  pub fn new() -> EvalCache {
    EvalCache::default()
  }

  /// The cache of an expression whose elements were permuted: the symbol set survives, the
  /// fixed-point stamp does not. Sequence positions survive only when there are none to track.
  pub(crate) fn reordered(&self) -> EvalCache {
    let sequences = match &self.sequences {
      Some(positions) if positions.is_empty() => Some(SequencePositions::new()),
      _                                       => None,
    };
    EvalCache {
      time: None,
      symbols: self.symbols.clone(),
      sequences,
    }
  }

}


/// Stamps the expression's cache with the current logical time. A no-op for leaves, which are
/// always final.
pub(crate) fn timestamp(expression: &Atom, now: u64) {
  if let Atom::SExpression(cell) = expression {
    cell.cache.borrow_mut().time = Some(now);
  }
}

/// The set of symbol names occurring anywhere in `expression`, heads included. Computed once per
/// S-expression node and cached.
pub(crate) fn cached_symbols(expression: &Atom) -> FnvHashSet<InternedString> {
  match expression {
    Atom::Symbol(name) => {
      let mut symbols = FnvHashSet::default();
      symbols.insert(*name);
      symbols
    }

    Atom::SExpression(cell) => {
      if let Some(symbols) = &cell.cache.borrow().symbols {
        return symbols.clone();
      }
      let mut symbols = FnvHashSet::default();
      for part in cell.parts.iter() {
        symbols.extend(cached_symbols(part));
      }
      cell.cache.borrow_mut().symbols = Some(symbols.clone());
      symbols
    }

    _ => FnvHashSet::default()
  }
}

/// The element positions (0-based, head not counted) of `expression` whose head is `Sequence`.
/// Computed once per S-expression node and cached.
pub(crate) fn sequence_positions(expression: &Atom) -> SequencePositions {
  match expression {
    Atom::SExpression(cell) => {
      if let Some(positions) = &cell.cache.borrow().sequences {
        return positions.clone();
      }
      let sequence_symbol = Atom::Symbol(interned_static("Sequence"));
      let positions: SequencePositions =
          cell.parts[1..]
              .iter()
              .enumerate()
              .filter(|(_, element)| element.head() == sequence_symbol)
              .map(|(index, _)| index)
              .collect();
      cell.cache.borrow_mut().sequences = Some(positions.clone());
      positions
    }

    _ => SequencePositions::new()
  }
}

/// Could evaluating `expression` produce something new? Gives `false` only when the expression
/// was evaluated to a fixed point at some logical time and no symbol occurring in it has been
/// redefined since. Leaves other than symbols are always final.
pub(crate) fn is_uncertain_final(expression: &Atom, context: &Context) -> bool {
  match expression {
    Atom::SExpression(cell) => {
      let time = cell.cache.borrow().time;
      match time {
        None       => true,
        Some(time) => {
          let symbols = cached_symbols(expression);
          context.has_changed(time, &symbols)
        }
      }
    }

    Atom::Symbol(_) => true,

    _ => false
  }
}
