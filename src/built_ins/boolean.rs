/*!

Predicates and logical connectives.

The predicates here are also consulted directly by the pattern matcher through
`quick_predicate`, so `x_?IntegerQ` does not pay for a full evaluation per candidate.

*/
#![allow(non_snake_case)]

use std::cmp::Ordering;

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::Attribute,
  context::Context,
  evaluate::evaluate_signal,
  evaluation::{Evaluation, Signal},
  interner::{interned_static, InternedString},
  logging::{log, Channel},
  matching::{display_solutions, SolutionSet},
};

use super::{
  binary_pattern, register_builtin, required, sequence_binding, unary_pattern, variadic_pattern,
};


fn boolean(value: bool) -> Atom {
  if value {
    Symbol::from_static_str("True")
  } else {
    Symbol::from_static_str("False")
  }
}

// Value comparison across the numeric types; `None` for non-numbers or a NaN.
fn numeric_compare(a: &Atom, b: &Atom) -> Option<Ordering> {
  match (a, b) {
    (Atom::Integer(v),  Atom::Integer(u))  => Some(v.cmp(u)),
    (Atom::Integer(v),  Atom::Rational(u)) => v.partial_cmp(u),
    (Atom::Integer(v),  Atom::Real(u))     => v.partial_cmp(u),
    (Atom::Rational(v), Atom::Integer(u))  => v.partial_cmp(u),
    (Atom::Rational(v), Atom::Rational(u)) => Some(v.cmp(u)),
    (Atom::Rational(v), Atom::Real(u))     => v.partial_cmp(u),
    (Atom::Real(v),     Atom::Integer(u))  => v.partial_cmp(u),
    (Atom::Real(v),     Atom::Rational(u)) => v.partial_cmp(u),
    (Atom::Real(v),     Atom::Real(u))     => v.partial_cmp(u),
    _                                      => None,
  }
}

fn sign(atom: &Atom) -> Option<Ordering> {
  match atom {
    Atom::Integer(n)  => Some(n.cmp0()),
    Atom::Rational(q) => Some(q.cmp0()),
    Atom::Real(r)     => r.cmp0(),
    _                 => None,
  }
}

/// Whether `expression` is a numeric quantity: a number, a symbolic constant, or a numeric
/// function of numeric arguments.
pub(crate) fn is_numeric(expression: &Atom, context: &Context) -> bool {
  match expression {
    Atom::Integer(_) | Atom::Rational(_) | Atom::Real(_) => true,

    Atom::Symbol(name) => context.get_attributes(*name).constant(),

    Atom::SExpression(_) => {
      match expression.head() {
        Atom::Symbol(name) if context.get_attributes(name).numeric_function() => {
          SExpression::elements(expression)
              .iter()
              .all(|element| is_numeric(element, context))
        }
        _ => false,
      }
    }

    Atom::String(_) => false,
  }
}

/// Fast path for `PatternTest` with a bare predicate symbol. Gives `None` for predicates that
/// need a full evaluation.
pub(crate) fn quick_predicate(
  name: InternedString,
  item: &Atom,
  context: &Context,
) -> Option<bool> {
  if name == interned_static("AtomQ") {
    return Some(!matches!(item, Atom::SExpression(_)));
  }
  if name == interned_static("IntegerQ") {
    return Some(matches!(item, Atom::Integer(_)));
  }
  if name == interned_static("NumberQ") {
    return Some(item.is_number());
  }
  if name == interned_static("NumericQ") {
    return Some(is_numeric(item, context));
  }
  if name == interned_static("TrueQ") {
    return Some(item.is_true());
  }
  if name == interned_static("Positive") {
    return Some(sign(item) == Some(Ordering::Greater));
  }
  if name == interned_static("Negative") {
    return Some(sign(item) == Some(Ordering::Less));
  }
  None
}


/// Implements calls matching `SameQ[args___]`.
pub(crate) fn SameQ(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let items = sequence_binding(arguments, "args");
  let same = items.windows(2).all(|pair| pair[0].sameQ(&pair[1]));
  Ok(Some(boolean(same)))
}

/// Implements calls matching `Greater[x_, y_]`.
pub(crate) fn Greater(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let x = required(arguments, "x");
  let y = required(arguments, "y");
  match numeric_compare(&x, &y) {
    Some(ordering) => Ok(Some(boolean(ordering == Ordering::Greater))),
    None           => Ok(None),
  }
}

/// Implements calls matching `Less[x_, y_]`.
pub(crate) fn Less(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let x = required(arguments, "x");
  let y = required(arguments, "y");
  match numeric_compare(&x, &y) {
    Some(ordering) => Ok(Some(boolean(ordering == Ordering::Less))),
    None           => Ok(None),
  }
}

/// Implements calls matching `AtomQ[x_]`.
pub(crate) fn AtomQ(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let x = required(arguments, "x");
  Ok(Some(boolean(!matches!(x, Atom::SExpression(_)))))
}

/// Implements calls matching `IntegerQ[x_]`.
pub(crate) fn IntegerQ(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  Ok(Some(boolean(matches!(required(arguments, "x"), Atom::Integer(_)))))
}

/// Implements calls matching `NumberQ[x_]`.
pub(crate) fn NumberQ(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  Ok(Some(boolean(required(arguments, "x").is_number())))
}

/// Implements calls matching `NumericQ[x_]`.
pub(crate) fn NumericQ(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let x = required(arguments, "x");
  Ok(Some(boolean(is_numeric(&x, &evaluation.context))))
}

/// Implements calls matching `TrueQ[x_]`.
pub(crate) fn TrueQ(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  Ok(Some(boolean(required(arguments, "x").is_true())))
}

/// Implements calls matching `Positive[x_]`. Stays unevaluated for non-numbers.
pub(crate) fn Positive(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  match sign(&required(arguments, "x")) {
    Some(ordering) => Ok(Some(boolean(ordering == Ordering::Greater))),
    None           => Ok(None),
  }
}

/// Implements calls matching `Negative[x_]`. Stays unevaluated for non-numbers.
pub(crate) fn Negative(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  match sign(&required(arguments, "x")) {
    Some(ordering) => Ok(Some(boolean(ordering == Ordering::Less))),
    None           => Ok(None),
  }
}

/// Because `And` is short-circuiting, it has attribute `HoldAll`.
/// Implements calls matching `And[args___]`.
pub(crate) fn And(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  log(
    Channel::Debug,
    4,
    format!("And called with arguments {}", display_solutions(arguments)).as_str()
  );

  let mut residual: Vec<Atom> = Vec::new();
  for item in sequence_binding(arguments, "args").into_iter() {
    let value = evaluate_signal(item, evaluation)?;
    if value.is_true() {
      continue;
    }
    if value.sameQ(&Symbol::from_static_str("False")) {
      return Ok(Some(boolean(false)));
    }
    residual.push(value);
  }

  match residual.len() {
    0 => Ok(Some(boolean(true))),
    1 => Ok(Some(residual.pop().unwrap_or_else(|| boolean(true)))),
    _ => Ok(Some(SExpression::new(Symbol::from_static_str("And"), residual))),
  }
}

/// Because `Or` is short-circuiting, it has attribute `HoldAll`.
/// Implements calls matching `Or[args___]`.
pub(crate) fn Or(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let mut residual: Vec<Atom> = Vec::new();
  for item in sequence_binding(arguments, "args").into_iter() {
    let value = evaluate_signal(item, evaluation)?;
    if value.is_true() {
      return Ok(Some(boolean(true)));
    }
    if value.sameQ(&Symbol::from_static_str("False")) {
      continue;
    }
    residual.push(value);
  }

  match residual.len() {
    0 => Ok(Some(boolean(false))),
    1 => Ok(Some(residual.pop().unwrap_or_else(|| boolean(false)))),
    _ => Ok(Some(SExpression::new(Symbol::from_static_str("Or"), residual))),
  }
}

/// Implements calls matching `Not[x_]`.
pub(crate) fn Not(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let x = required(arguments, "x");
  if x.is_true() {
    return Ok(Some(boolean(false)));
  }
  if x.sameQ(&Symbol::from_static_str("False")) {
    return Ok(Some(boolean(true)));
  }
  Ok(None)
}


pub(crate) fn register_builtins(context: &mut Context) {
  register_builtin!(SameQ, variadic_pattern("SameQ"), Attribute::Protected.into(), context);
  register_builtin!(Greater, binary_pattern("Greater"), Attribute::Protected.into(), context);
  register_builtin!(Less, binary_pattern("Less"), Attribute::Protected.into(), context);
  register_builtin!(AtomQ, unary_pattern("AtomQ"), Attribute::Protected.into(), context);
  register_builtin!(IntegerQ, unary_pattern("IntegerQ"), Attribute::Protected.into(), context);
  register_builtin!(NumberQ, unary_pattern("NumberQ"), Attribute::Protected.into(), context);
  register_builtin!(NumericQ, unary_pattern("NumericQ"), Attribute::Protected.into(), context);
  register_builtin!(TrueQ, unary_pattern("TrueQ"), Attribute::Protected.into(), context);
  register_builtin!(Positive, unary_pattern("Positive"), Attribute::Protected.into(), context);
  register_builtin!(Negative, unary_pattern("Negative"), Attribute::Protected.into(), context);
  register_builtin!(
    And,
    variadic_pattern("And"),
    Attribute::HoldAll + Attribute::Flat + Attribute::Protected,
    context
  );
  register_builtin!(
    Or,
    variadic_pattern("Or"),
    Attribute::HoldAll + Attribute::Flat + Attribute::Protected,
    context
  );
  register_builtin!(Not, unary_pattern("Not"), Attribute::Protected.into(), context);
}


#[cfg(test)]
mod tests {
  use rug::{Float as BigFloat, Integer as BigInteger};

  use crate::{built_ins::DEFAULT_REAL_PRECISION, evaluate::evaluate};
  use super::*;

  fn int(n: i64) -> Atom {
    Atom::Integer(BigInteger::from(n))
  }

  fn real(x: f64) -> Atom {
    Atom::Real(BigFloat::with_val(DEFAULT_REAL_PRECISION, x))
  }

  fn call(head: &'static str, elements: Vec<Atom>) -> Atom {
    SExpression::new(Symbol::from_static_str(head), elements)
  }

  #[test]
  fn sameQ_distinguishes_numeric_types() {
    let mut evaluation = Evaluation::new();
    let result = evaluate(call("SameQ", vec![int(2), real(2.0)]), &mut evaluation);
    assert!(result.sameQ(&Symbol::from_static_str("False")));

    let result = evaluate(call("SameQ", vec![int(2), int(2), int(2)]), &mut evaluation);
    assert!(result.sameQ(&Symbol::from_static_str("True")));
  }

  #[test]
  fn comparisons_work_across_numeric_types() {
    let mut evaluation = Evaluation::new();
    assert!(evaluate(call("Greater", vec![int(3), real(2.5)]), &mut evaluation).is_true());
    assert!(evaluate(call("Less", vec![int(3), real(2.5)], ), &mut evaluation)
        .sameQ(&Symbol::from_static_str("False")));

    // Symbolic comparisons stay unevaluated.
    let symbolic = call("Greater", vec![Symbol::from_static_str("a"), int(1)]);
    assert!(evaluate(symbolic.copy(), &mut evaluation).sameQ(&symbolic));
  }

  #[test]
  fn numericQ_sees_constants_and_numeric_functions() {
    let mut evaluation = Evaluation::new();
    assert!(evaluate(call("NumericQ", vec![Symbol::from_static_str("Pi")]), &mut evaluation).is_true());

    let expression = call("NumericQ", vec![call("Plus", vec![int(1), Symbol::from_static_str("Pi")])]);
    assert!(evaluate(expression, &mut evaluation).is_true());

    let symbolic = call("NumericQ", vec![Symbol::from_static_str("x")]);
    assert!(evaluate(symbolic, &mut evaluation).sameQ(&Symbol::from_static_str("False")));
  }

  #[test]
  fn and_short_circuits() {
    let mut evaluation = Evaluation::new();
    // And[False, anything] is False without evaluating the rest.
    let result = evaluate(
      call("And", vec![Symbol::from_static_str("False"), call("f", vec![int(1)])]),
      &mut evaluation
    );
    assert!(result.sameQ(&Symbol::from_static_str("False")));

    let residual = evaluate(
      call("And", vec![Symbol::from_static_str("True"), Symbol::from_static_str("b")]),
      &mut evaluation
    );
    assert!(residual.sameQ(&Symbol::from_static_str("b")));
  }

  #[test]
  fn quick_predicates_agree_with_the_builtins() {
    let context = Context::new_global_context();
    assert_eq!(quick_predicate(interned_static("IntegerQ"), &int(3), &context), Some(true));
    assert_eq!(quick_predicate(interned_static("Positive"), &int(-3), &context), Some(false));
    assert_eq!(
      quick_predicate(interned_static("AtomQ"), &call("f", vec![]), &context),
      Some(false)
    );
    assert_eq!(quick_predicate(interned_static("NoSuchQ"), &int(3), &context), None);
  }
}
