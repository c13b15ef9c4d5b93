/*!

Numeric computation: constant folding for `Plus`, `Times`, and `Power` over the exact and
floating numeric tower (`rug` integers, rationals, and 53-bit floats), plus the derived
arithmetic forms.

The folders only claim an application when they can actually simplify it; otherwise they
decline, leaving the expression symbolic for user rules to rewrite.

*/
#![allow(non_snake_case)]

use rug::{ops::Pow, Float as BigFloat, Integer as BigInteger, Rational as BigRational};

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::Attribute,
  context::{Context, ContextValueStore},
  evaluation::{Evaluation, Signal},
  logging::{log, Channel},
  matching::{display_solutions, SolutionSet},
};

use super::{
  binary_pattern, definition_value, register_builtin, required, sequence_binding, unary_pattern,
  variadic_pattern, DEFAULT_REAL_PRECISION,
};


// region The numeric tower

enum Number {
  Integer(BigInteger),
  Rational(BigRational),
  Real(BigFloat),
}

impl Number {
  fn of(atom: &Atom) -> Option<Number> {
    match atom {
      Atom::Integer(n)  => Some(Number::Integer(n.clone())),
      Atom::Rational(q) => Some(Number::Rational(q.clone())),
      Atom::Real(r)     => Some(Number::Real(r.clone())),
      _                 => None,
    }
  }

  // Exact types promote toward inexact: Integer < Rational < Real.
  fn add(self, other: Number) -> Number {
    use Number::*;
    match (self, other) {
      (Integer(a), Integer(b))                         => Integer(a + b),
      (Rational(a), Rational(b))                       => Rational(a + b),
      (Real(a), Real(b))                               => Real(a + b),
      (Integer(a), Rational(b)) | (Rational(b), Integer(a)) => Rational(b + a),
      (Integer(a), Real(b)) | (Real(b), Integer(a))    => Real(b + a),
      (Rational(a), Real(b)) | (Real(b), Rational(a))  => Real(b + a),
    }
  }

  fn mul(self, other: Number) -> Number {
    use Number::*;
    match (self, other) {
      (Integer(a), Integer(b))                         => Integer(a * b),
      (Rational(a), Rational(b))                       => Rational(a * b),
      (Real(a), Real(b))                               => Real(a * b),
      (Integer(a), Rational(b)) | (Rational(b), Integer(a)) => Rational(b * a),
      (Integer(a), Real(b)) | (Real(b), Integer(a))    => Real(b * a),
      (Rational(a), Real(b)) | (Real(b), Rational(a))  => Real(b * a),
    }
  }

  // A rational with unit denominator collapses to an integer.
  fn into_atom(self) -> Atom {
    match self {
      Number::Integer(n) => Atom::Integer(n),

      Number::Rational(q) => {
        if q.is_integer() {
          let (numerator, _) = q.into_numer_denom();
          Atom::Integer(numerator)
        } else {
          Atom::Rational(q)
        }
      }

      Number::Real(r) => Atom::Real(r),
    }
  }
}

fn is_exact_zero(atom: &Atom) -> bool {
  match atom {
    Atom::Integer(n)  => n.cmp0() == std::cmp::Ordering::Equal,
    Atom::Rational(q) => q.cmp0() == std::cmp::Ordering::Equal,
    _                 => false,
  }
}

fn is_exact_one(atom: &Atom) -> bool {
  matches!(atom, Atom::Integer(n) if *n == 1)
}

fn to_real(atom: &Atom) -> Option<BigFloat> {
  match atom {
    Atom::Integer(n)  => Some(BigFloat::with_val(DEFAULT_REAL_PRECISION, n)),
    Atom::Rational(q) => Some(BigFloat::with_val(DEFAULT_REAL_PRECISION, q)),
    Atom::Real(r)     => Some(r.clone()),
    _                 => None,
  }
}

// endregion


/// Implements calls matching `Plus[args___]`: folds the numeric terms into one, keeping symbolic
/// terms untouched. Declines when there is nothing to fold.
pub(crate) fn Plus(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  log(
    Channel::Debug,
    4,
    format!("Plus called with arguments {}", display_solutions(arguments)).as_str()
  );

  let items = sequence_binding(arguments, "args");
  if items.is_empty() {
    return Ok(Some(Atom::Integer(BigInteger::new())));
  }
  if items.len() == 1 {
    return Ok(Some(items.into_iter().next().unwrap_or_else(
      || Atom::Integer(BigInteger::new())
    )));
  }

  let mut numeric: Option<Number> = None;
  let mut numeric_count: usize = 0;
  let mut symbolic: Vec<Atom> = vec![];
  for item in items.into_iter() {
    match Number::of(&item) {
      Some(number) => {
        numeric_count += 1;
        numeric = Some(match numeric {
          None             => number,
          Some(accumulated) => accumulated.add(number),
        });
      }
      None => symbolic.push(item),
    }
  }

  let folded = numeric.map(Number::into_atom);
  let drop_identity = matches!(&folded, Some(value) if is_exact_zero(value))
      && !symbolic.is_empty();

  if numeric_count <= 1 && !drop_identity {
    return Ok(None);
  }

  let mut terms: Vec<Atom> = vec![];
  if let Some(value) = folded {
    if !drop_identity {
      terms.push(value);
    }
  }
  terms.extend(symbolic);

  match terms.len() {
    0 => Ok(Some(Atom::Integer(BigInteger::new()))),
    1 => Ok(Some(terms.into_iter().next().unwrap_or_else(
      || Atom::Integer(BigInteger::new())
    ))),
    _ => Ok(Some(SExpression::new(Symbol::from_static_str("Plus"), terms))),
  }
}


/// Implements calls matching `Times[args___]`: folds numeric factors, annihilates on an exact
/// zero, and drops a unit factor. Declines when there is nothing to fold.
pub(crate) fn Times(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let items = sequence_binding(arguments, "args");
  if items.is_empty() {
    return Ok(Some(Atom::Integer(BigInteger::from(1))));
  }
  if items.len() == 1 {
    return Ok(Some(items.into_iter().next().unwrap_or_else(
      || Atom::Integer(BigInteger::from(1))
    )));
  }

  let mut numeric: Option<Number> = None;
  let mut numeric_count: usize = 0;
  let mut symbolic: Vec<Atom> = vec![];
  for item in items.into_iter() {
    match Number::of(&item) {
      Some(number) => {
        numeric_count += 1;
        numeric = Some(match numeric {
          None             => number,
          Some(accumulated) => accumulated.mul(number),
        });
      }
      None => symbolic.push(item),
    }
  }

  let folded = numeric.map(Number::into_atom);

  // An exact zero factor annihilates the whole product.
  if matches!(&folded, Some(value) if is_exact_zero(value)) {
    return Ok(Some(Atom::Integer(BigInteger::new())));
  }

  let drop_identity = matches!(&folded, Some(value) if is_exact_one(value))
      && !symbolic.is_empty();

  if numeric_count <= 1 && !drop_identity {
    return Ok(None);
  }

  let mut factors: Vec<Atom> = vec![];
  if let Some(value) = folded {
    if !drop_identity {
      factors.push(value);
    }
  }
  factors.extend(symbolic);

  match factors.len() {
    0 => Ok(Some(Atom::Integer(BigInteger::from(1)))),
    1 => Ok(Some(factors.into_iter().next().unwrap_or_else(
      || Atom::Integer(BigInteger::from(1))
    ))),
    _ => Ok(Some(SExpression::new(Symbol::from_static_str("Times"), factors))),
  }
}


/// Implements calls matching `Power[x_, y_]`: exponent identities and numeric exponentiation.
pub(crate) fn Power(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let base = required(arguments, "x");
  let exponent = required(arguments, "y");

  // x^1 is x for any x; x^0 is 1 except for the indeterminate 0^0.
  if is_exact_one(&exponent) {
    return Ok(Some(base));
  }
  if matches!(&exponent, Atom::Integer(n) if n.cmp0() == std::cmp::Ordering::Equal) {
    if is_exact_zero(&base) {
      evaluation.message(
        "Power",
        "indet",
        "Indeterminate expression 0^0 encountered.".to_string(),
      );
      return Ok(Some(Symbol::from_static_str("Indeterminate")));
    }
    return Ok(Some(Atom::Integer(BigInteger::from(1))));
  }

  match (&base, &exponent) {
    (Atom::Integer(b), Atom::Integer(e)) => {
      if is_exact_zero(&base) && e.cmp0() == std::cmp::Ordering::Less {
        evaluation.message(
          "Power",
          "infy",
          "Infinite expression 1/0 encountered.".to_string(),
        );
        return Ok(Some(Symbol::from_static_str("ComplexInfinity")));
      }
      let magnitude = match e.clone().abs().to_u32() {
        Some(magnitude) => magnitude,
        None            => return Ok(None),
      };
      let raised = BigInteger::from(b.pow(magnitude));
      if e.cmp0() == std::cmp::Ordering::Less {
        Ok(Some(Number::Rational(BigRational::from((BigInteger::from(1), raised))).into_atom()))
      } else {
        Ok(Some(Atom::Integer(raised)))
      }
    }

    (Atom::Rational(b), Atom::Integer(e)) => {
      if b.cmp0() == std::cmp::Ordering::Equal && e.cmp0() == std::cmp::Ordering::Less {
        evaluation.message(
          "Power",
          "infy",
          "Infinite expression 1/0 encountered.".to_string(),
        );
        return Ok(Some(Symbol::from_static_str("ComplexInfinity")));
      }
      match e.to_i32() {
        Some(e) => Ok(Some(Number::Rational(BigRational::from(b.pow(e))).into_atom())),
        None    => Ok(None),
      }
    }

    (Atom::Real(b), Atom::Integer(e)) => {
      match e.to_i32() {
        Some(e) => Ok(Some(Atom::Real(BigFloat::with_val(DEFAULT_REAL_PRECISION, b.pow(e))))),
        None    => Ok(None),
      }
    }

    // Any other combination with a real in play is computed in floating point.
    (_, Atom::Real(_)) | (Atom::Real(_), Atom::Rational(_)) => {
      match (to_real(&base), to_real(&exponent)) {
        (Some(b), Some(e)) => {
          Ok(Some(Atom::Real(BigFloat::with_val(DEFAULT_REAL_PRECISION, (&b).pow(&e)))))
        }
        _ => Ok(None),
      }
    }

    _ => Ok(None),
  }
}


pub(crate) fn register_builtins(context: &mut Context) {
  register_builtin!(
    Plus,
    variadic_pattern("Plus"),
    Attribute::Flat
        + Attribute::Orderless
        + Attribute::Listable
        + Attribute::NumericFunction
        + Attribute::Protected,
    context
  );
  register_builtin!(
    Times,
    variadic_pattern("Times"),
    Attribute::Flat
        + Attribute::Orderless
        + Attribute::Listable
        + Attribute::NumericFunction
        + Attribute::Protected,
    context
  );
  register_builtin!(
    Power,
    binary_pattern("Power"),
    Attribute::Listable + Attribute::NumericFunction + Attribute::Protected,
    context
  );

  // The derived arithmetic forms are ordinary rewrite rules over the folders above.
  let derived: [(&'static str, Atom, Atom); 3] = [
    (
      "Minus",
      unary_pattern("Minus"),
      SExpression::new(
        Symbol::from_static_str("Times"),
        vec![Atom::Integer(BigInteger::from(-1)), Symbol::from_static_str("x")]
      ),
    ),
    (
      "Subtract",
      binary_pattern("Subtract"),
      SExpression::new(
        Symbol::from_static_str("Plus"),
        vec![
          Symbol::from_static_str("x"),
          SExpression::new(
            Symbol::from_static_str("Times"),
            vec![Atom::Integer(BigInteger::from(-1)), Symbol::from_static_str("y")]
          )
        ]
      ),
    ),
    (
      "Divide",
      binary_pattern("Divide"),
      SExpression::new(
        Symbol::from_static_str("Times"),
        vec![
          Symbol::from_static_str("x"),
          SExpression::new(
            Symbol::from_static_str("Power"),
            vec![Symbol::from_static_str("y"), Atom::Integer(BigInteger::from(-1))]
          )
        ]
      ),
    ),
  ];
  for (name, lhs, rhs) in derived.into_iter() {
    context.insert_rule(
      ContextValueStore::DownValues,
      crate::interner::interned_static(name),
      definition_value(lhs, rhs),
      false,
    );
    context.set_attribute(
      crate::interner::interned_static(name),
      Attribute::Protected,
    );
  }

  // Symbolic constants, recognized by NumericQ and the NumericFunction machinery.
  for name in ["Pi", "E"] {
    context.set_attributes(
      crate::interner::interned_static(name),
      Attribute::Constant + Attribute::Protected,
    );
  }
}


#[cfg(test)]
mod tests {
  use crate::evaluate::evaluate;
  use super::*;

  fn int(n: i64) -> Atom {
    Atom::Integer(BigInteger::from(n))
  }

  fn rational(n: i64, d: i64) -> Atom {
    Atom::Rational(BigRational::from((n, d)))
  }

  fn real(x: f64) -> Atom {
    Atom::Real(BigFloat::with_val(DEFAULT_REAL_PRECISION, x))
  }

  fn symbol(name: &'static str) -> Atom {
    Symbol::from_static_str(name)
  }

  fn call(head: &'static str, elements: Vec<Atom>) -> Atom {
    SExpression::new(symbol(head), elements)
  }

  #[test]
  fn plus_folds_numeric_terms() {
    let mut evaluation = Evaluation::new();
    assert!(evaluate(call("Plus", vec![int(1), int(2), int(3)]), &mut evaluation).sameQ(&int(6)));

    // Exact types stay exact: 1/2 + 1/2 gives the integer 1.
    let result = evaluate(call("Plus", vec![rational(1, 2), rational(1, 2)]), &mut evaluation);
    assert!(result.sameQ(&int(1)));

    // A real contaminates the sum.
    let result = evaluate(call("Plus", vec![int(1), real(0.5)]), &mut evaluation);
    assert!(result.sameQ(&real(1.5)));
  }

  #[test]
  fn plus_keeps_symbolic_terms() {
    let mut evaluation = Evaluation::new();
    // Orderless canonical order puts the folded constant first: 1 + x + 2 gives 3 + x.
    let result = evaluate(call("Plus", vec![int(1), symbol("x"), int(2)]), &mut evaluation);
    assert!(result.sameQ(&call("Plus", vec![int(3), symbol("x")])));

    // A vanishing numeric part drops out entirely.
    let result = evaluate(call("Plus", vec![int(5), symbol("x"), int(-5)]), &mut evaluation);
    assert!(result.sameQ(&symbol("x")));

    // Nothing to fold: the expression stays put.
    let inert = call("Plus", vec![symbol("x"), symbol("y")]);
    assert!(evaluate(inert.copy(), &mut evaluation).sameQ(&inert));
  }

  #[test]
  fn plus_is_flat_and_orderless() {
    let mut evaluation = Evaluation::new();
    // x + (1 + y) flattens and folds to 1 + x + y.
    let nested = call("Plus", vec![symbol("x"), call("Plus", vec![int(1), symbol("y")])]);
    let result = evaluate(nested, &mut evaluation);
    assert!(result.sameQ(&call("Plus", vec![int(1), symbol("x"), symbol("y")])));
  }

  #[test]
  fn times_annihilates_on_zero_and_drops_ones() {
    let mut evaluation = Evaluation::new();
    let result = evaluate(call("Times", vec![int(0), symbol("x")]), &mut evaluation);
    assert!(result.sameQ(&int(0)));

    let result = evaluate(call("Times", vec![int(1), symbol("x")]), &mut evaluation);
    assert!(result.sameQ(&symbol("x")));

    let result = evaluate(call("Times", vec![int(2), int(3), symbol("x")]), &mut evaluation);
    assert!(result.sameQ(&call("Times", vec![int(6), symbol("x")])));
  }

  #[test]
  fn power_identities_and_integer_powers() {
    let mut evaluation = Evaluation::new();
    assert!(evaluate(call("Power", vec![symbol("x"), int(1)]), &mut evaluation)
        .sameQ(&symbol("x")));
    assert!(evaluate(call("Power", vec![symbol("x"), int(0)]), &mut evaluation).sameQ(&int(1)));
    assert!(evaluate(call("Power", vec![int(2), int(10)]), &mut evaluation).sameQ(&int(1024)));

    // Negative exponents give exact rationals.
    assert!(evaluate(call("Power", vec![int(2), int(-2)]), &mut evaluation)
        .sameQ(&rational(1, 4)));

    // Symbolic powers stay put.
    let inert = call("Power", vec![symbol("x"), int(2)]);
    assert!(evaluate(inert.copy(), &mut evaluation).sameQ(&inert));
  }

  #[test]
  fn power_reports_indeterminate_and_infinite_forms() {
    let mut evaluation = Evaluation::new();
    let result = evaluate(call("Power", vec![int(0), int(0)]), &mut evaluation);
    assert!(result.sameQ(&symbol("Indeterminate")));
    assert!(evaluation.has_message("Power", "indet"));

    let result = evaluate(call("Power", vec![int(0), int(-1)]), &mut evaluation);
    assert!(result.sameQ(&symbol("ComplexInfinity")));
    assert!(evaluation.has_message("Power", "infy"));
  }

  #[test]
  fn derived_forms_rewrite_into_the_folders() {
    let mut evaluation = Evaluation::new();
    assert!(evaluate(call("Subtract", vec![int(7), int(3)]), &mut evaluation).sameQ(&int(4)));
    assert!(evaluate(call("Minus", vec![int(5)]), &mut evaluation).sameQ(&int(-5)));
    assert!(evaluate(call("Divide", vec![int(3), int(6)]), &mut evaluation)
        .sameQ(&rational(1, 2)));
    assert!(evaluate(call("Divide", vec![int(6), int(3)]), &mut evaluation).sameQ(&int(2)));
  }

  #[test]
  fn listable_arithmetic_threads_over_lists() {
    let mut evaluation = Evaluation::new();
    let result = evaluate(
      call("Plus", vec![SExpression::list(vec![int(1), int(2)]), int(10)]),
      &mut evaluation
    );
    assert!(result.sameQ(&SExpression::list(vec![int(11), int(12)])));
  }
}
