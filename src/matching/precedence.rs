/*!

The precedence key that orders rewrite rules from most to least specific.

When several rules could rewrite the same expression, the one with the most specific pattern
must win: a literal beats a `Blank`, a `Blank` with a head constraint beats a bare `Blank`, a
single-element `Blank` beats a `BlankSequence`, a conditional rule beats an unconditional one.
The key is a small lexicographic tuple mirroring this hierarchy; rule buckets are kept sorted
by it at insertion time, so rule application is a linear scan in precedence order.

*/

use std::cmp::Ordering;

use crate::atom::{Atom, SExpression};

// Ranks in the second key field. Literals rank 0; blanks rank above every literal, with
// head-constrained blanks below their unconstrained counterparts; `OptionsPattern` is the most
// general construct of all.
const RANK_EMPTY_ALTERNATIVES: u8 = 1;
const RANK_BLANK_WITH_HEAD: u8 = 11;
const RANK_BLANK_SEQUENCE_WITH_HEAD: u8 = 12;
const RANK_BLANK_NULL_SEQUENCE_WITH_HEAD: u8 = 13;
const RANK_BLANK: u8 = 21;
const RANK_BLANK_SEQUENCE: u8 = 22;
const RANK_BLANK_NULL_SEQUENCE: u8 = 23;
const RANK_OPTIONS_PATTERN: u8 = 40;

// Classes in the first key field.
const CLASS_ATOM: u8 = 0;
const CLASS_EXPRESSION: u8 = 2;
const CLASS_VERBATIM: u8 = 3;


#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PatternPrecedence {
  class: u8,
  rank: u8,
  /// 0 when wrapped in a `Condition`: conditional rules are more specific.
  unconditional: u8,
  /// 0 when wrapped in a `Pattern`: named patterns are more specific.
  unnamed: u8,
  /// 1 when wrapped in an `Optional`: optional patterns are less specific.
  optional: u8,
  /// 0 when wrapped in a `PatternTest`.
  untested: u8,
  head: Option<Box<PatternPrecedence>>,
  elements: Option<Vec<PatternPrecedence>>,
}

// Modifier flags accumulated while descending through pattern wrappers.
#[derive(Copy, Clone)]
struct Modifiers {
  unconditional: u8,
  unnamed: u8,
  optional: u8,
  untested: u8,
}

impl Default for Modifiers {
  fn default() -> Self {
    Modifiers {
      unconditional: 1,
      unnamed: 1,
      optional: 0,
      untested: 1,
    }
  }
}

impl PatternPrecedence {
  pub fn of(pattern: &Atom) -> PatternPrecedence {
    build(pattern, Modifiers::default())
  }
}

impl PartialOrd for PatternPrecedence {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(Ord::cmp(self, other))
  }
}

impl Ord for PatternPrecedence {
  fn cmp(&self, other: &Self) -> Ordering {
    self.class.cmp(&other.class)
        .then_with(|| self.rank.cmp(&other.rank))
        .then_with(|| self.unconditional.cmp(&other.unconditional))
        .then_with(|| self.unnamed.cmp(&other.unnamed))
        .then_with(|| self.optional.cmp(&other.optional))
        .then_with(|| self.untested.cmp(&other.untested))
        .then_with(|| compare_heads(&self.head, &other.head))
        .then_with(|| compare_elements(&self.elements, &other.elements))
  }
}

fn compare_heads(
  a: &Option<Box<PatternPrecedence>>,
  b: &Option<Box<PatternPrecedence>>,
) -> Ordering {
  match (a, b) {
    (None, None)       => Ordering::Equal,
    (None, Some(_))    => Ordering::Less,
    (Some(_), None)    => Ordering::Greater,
    (Some(x), Some(y)) => x.cmp(y),
  }
}

// Lexicographic on the element keys, except that on a shared prefix the longer list is the more
// specific one and therefore comes first.
fn compare_elements(
  a: &Option<Vec<PatternPrecedence>>,
  b: &Option<Vec<PatternPrecedence>>,
) -> Ordering {
  match (a, b) {
    (None, None)       => Ordering::Equal,
    (None, Some(_))    => Ordering::Less,
    (Some(_), None)    => Ordering::Greater,
    (Some(x), Some(y)) => {
      for (left, right) in x.iter().zip(y.iter()) {
        let ordering = left.cmp(right);
        if ordering != Ordering::Equal {
          return ordering;
        }
      }
      y.len().cmp(&x.len())
    }
  }
}


fn atom_key(modifiers: Modifiers) -> PatternPrecedence {
  PatternPrecedence {
    class: CLASS_ATOM,
    rank: 0,
    unconditional: modifiers.unconditional,
    unnamed: modifiers.unnamed,
    optional: modifiers.optional,
    untested: modifiers.untested,
    head: None,
    elements: None,
  }
}

fn blank_key(rank: u8, modifiers: Modifiers) -> PatternPrecedence {
  PatternPrecedence {
    class: CLASS_EXPRESSION,
    rank,
    unconditional: modifiers.unconditional,
    unnamed: modifiers.unnamed,
    optional: modifiers.optional,
    untested: modifiers.untested,
    head: None,
    elements: None,
  }
}

fn build(pattern: &Atom, modifiers: Modifiers) -> PatternPrecedence {
  if !matches!(pattern, Atom::SExpression(_)) {
    return atom_key(modifiers);
  }

  let length = pattern.len();

  if pattern.has_form("Blank", None) && length <= 1 {
    let rank = if length == 1 { RANK_BLANK_WITH_HEAD } else { RANK_BLANK };
    return blank_key(rank, modifiers);
  }
  if pattern.has_form("BlankSequence", None) && length <= 1 {
    let rank = if length == 1 { RANK_BLANK_SEQUENCE_WITH_HEAD } else { RANK_BLANK_SEQUENCE };
    return blank_key(rank, modifiers);
  }
  if pattern.has_form("BlankNullSequence", None) && length <= 1 {
    let rank = if length == 1 { RANK_BLANK_NULL_SEQUENCE_WITH_HEAD } else { RANK_BLANK_NULL_SEQUENCE };
    return blank_key(rank, modifiers);
  }

  if pattern.has_form("Pattern", Some(2)) {
    let mut modifiers = modifiers;
    modifiers.unnamed = 0;
    return build(&SExpression::parts(pattern)[2], modifiers);
  }
  if pattern.has_form("PatternTest", Some(2)) {
    let mut modifiers = modifiers;
    modifiers.untested = 0;
    return build(&SExpression::parts(pattern)[1], modifiers);
  }
  if pattern.has_form("Condition", Some(2)) {
    let mut modifiers = modifiers;
    modifiers.unconditional = 0;
    return build(&SExpression::parts(pattern)[1], modifiers);
  }
  if pattern.has_form("Optional", None) && (length == 1 || length == 2) {
    let mut modifiers = modifiers;
    modifiers.optional = 1;
    return build(&SExpression::parts(pattern)[1], modifiers);
  }
  if pattern.has_form("HoldPattern", Some(1)) {
    return build(&SExpression::parts(pattern)[1], modifiers);
  }

  if pattern.has_form("Alternatives", None) {
    if length == 0 {
      return PatternPrecedence {
        class: CLASS_EXPRESSION,
        rank: RANK_EMPTY_ALTERNATIVES,
        unconditional: 0,
        unnamed: 0,
        optional: 0,
        untested: 0,
        head: None,
        elements: None,
      };
    }
    // The precedence of an alternative is that of its most general branch.
    return SExpression::elements(pattern)
        .iter()
        .map(|branch| build(branch, modifiers))
        .max()
        .unwrap_or_else(|| atom_key(modifiers));
  }

  if pattern.has_form("OptionsPattern", None) {
    return blank_key(RANK_OPTIONS_PATTERN, modifiers);
  }

  if pattern.has_form("Verbatim", Some(1)) {
    let mut key = build_literal(&SExpression::parts(pattern)[1], modifiers);
    key.class = CLASS_VERBATIM;
    return key;
  }

  expression_key(pattern, modifiers)
}

// A generic expression: keyed by its head and element keys.
fn expression_key(pattern: &Atom, modifiers: Modifiers) -> PatternPrecedence {
  let parts = SExpression::parts(pattern);
  PatternPrecedence {
    class: CLASS_EXPRESSION,
    rank: 0,
    unconditional: modifiers.unconditional,
    unnamed: modifiers.unnamed,
    optional: modifiers.optional,
    untested: modifiers.untested,
    head: Some(Box::new(build(&parts[0], Modifiers::default()))),
    elements: Some(
      parts[1..].iter()
                .map(|element| build(element, Modifiers::default()))
                .collect()
    ),
  }
}

// Inside `Verbatim` every construct is literal text, so descend without interpreting anything.
fn build_literal(pattern: &Atom, modifiers: Modifiers) -> PatternPrecedence {
  if !matches!(pattern, Atom::SExpression(_)) {
    return atom_key(modifiers);
  }
  let parts = SExpression::parts(pattern);
  PatternPrecedence {
    class: CLASS_EXPRESSION,
    rank: 0,
    unconditional: modifiers.unconditional,
    unnamed: modifiers.unnamed,
    optional: modifiers.optional,
    untested: modifiers.untested,
    head: Some(Box::new(build_literal(&parts[0], Modifiers::default()))),
    elements: Some(
      parts[1..].iter()
                .map(|element| build_literal(element, Modifiers::default()))
                .collect()
    ),
  }
}
