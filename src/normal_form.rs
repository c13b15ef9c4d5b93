/*!

# Canonical order

Orderless functions keep their elements sorted in a fixed total order, the same order `Sort[]`
uses. The ordering is arbitrary but fixed: numbers come first and are compared by value across
numeric types, then strings, then symbols and general expressions. Symbols and the arithmetic
expressions built from them (`Times`, `Power`) are compared as monomials so that polynomials
come out in a fixed degree-aware order, `x + x^2 + y + x y + y^2`. Everything else is compared
structurally, head first, then by length, then element by element.

The ordering is total but not semantic: `Plus[a, b]` and `Plus[b, a]` normalize to the same
term, while distributivity is of course not accounted for.

*/

use std::cmp::Ordering;

use fnv::FnvHashMap;

use crate::{
  atom::Atom,
  interner::resolve_str,
};

/// A total order on all functions, symbols, variables, and terms.
///
/// The total ordering of terms does not use Rust's in-built `Ord` trait, because
/// implementors may have a different ordering that is natural for the type, and
/// normalization does not require Rust's ordering machinery.
pub trait NormalFormOrder {
  fn cmp(&self, other: &Self) -> Ordering;

  fn is_equal(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }

  fn is_greater(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Greater
  }

  fn is_less(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Less
  }
}


impl NormalFormOrder for Atom {
  fn cmp(&self, other: &Self) -> Ordering {
    canonical_order(self, other)
  }
}

// Coarse comparison classes: numbers, then strings, then everything else.
fn order_class(atom: &Atom) -> u8 {
  match atom {
    Atom::Integer(_) | Atom::Rational(_) | Atom::Real(_) => 0,
    Atom::String(_)                                      => 1,
    Atom::Symbol(_) | Atom::SExpression(_)               => 2,
  }
}

// Tie-breaking rank among equal numeric values of distinct types.
fn numeric_type_rank(atom: &Atom) -> u8 {
  match atom {
    Atom::Integer(_)  => 0,
    Atom::Rational(_) => 1,
    Atom::Real(_)     => 2,
    _                 => 3,
  }
}

/// Compares two numeric atoms by value, across numeric types. Ties between equal values of
/// distinct types are broken by type so the order stays total.
fn numeric_order(a: &Atom, b: &Atom) -> Ordering {
  let by_value = match (a, b) {
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
  };

  match by_value {
    Some(Ordering::Equal) | None => {
      // `None` only happens with a NaN in play; fall back to a bit-exact order.
      match (a, b) {
        (Atom::Real(v), Atom::Real(u)) => v.as_ord().cmp(u.as_ord()),
        _ => numeric_type_rank(a).cmp(&numeric_type_rank(b)),
      }
    }
    Some(ordering) => ordering,
  }
}

pub(crate) fn canonical_order(a: &Atom, b: &Atom) -> Ordering {
  let class_ordering = order_class(a).cmp(&order_class(b));
  if class_ordering != Ordering::Equal {
    return class_ordering;
  }

  match (a, b) {
    (Atom::String(s), Atom::String(t)) => resolve_str(*s).cmp(&resolve_str(*t)),

    _ if a.is_number() => numeric_order(a, b),

    // Symbols and expressions, compared as monomials where possible.
    _ => {
      if let (Some(m), Some(n)) = (Monomial::of(a), Monomial::of(b)) {
        let monomial_ordering = m.cmp(&n);
        if monomial_ordering != Ordering::Equal {
          return monomial_ordering;
        }
      }
      structural_order(a, b)
    }
  }
}

fn structural_order(a: &Atom, b: &Atom) -> Ordering {
  match (a, b) {
    (Atom::Symbol(s), Atom::Symbol(t)) => resolve_str(*s).cmp(&resolve_str(*t)),
    (Atom::Symbol(_), Atom::SExpression(_)) => Ordering::Less,
    (Atom::SExpression(_), Atom::Symbol(_)) => Ordering::Greater,
    (Atom::SExpression(f), Atom::SExpression(g)) => {
      let head_ordering = canonical_order(&f.parts[0], &g.parts[0]);
      if head_ordering != Ordering::Equal {
        return head_ordering;
      }
      let length_ordering = f.parts.len().cmp(&g.parts.len());
      if length_ordering != Ordering::Equal {
        return length_ordering;
      }
      for (left, right) in f.parts[1..].iter().zip(g.parts[1..].iter()) {
        let ordering = canonical_order(left, right);
        if ordering != Ordering::Equal {
          return ordering;
        }
      }
      Ordering::Equal
    }
    // Numbers and strings never reach this function.
    _ => Ordering::Equal,
  }
}


/// The exponent map of a product of symbolic powers, e.g. `{x: 1, y: 2}` for `x y^2`.
/// Comparison cancels shared variables first, so `x` sorts before `x^2`, and `x^2`
/// before `x y`.
pub(crate) struct Monomial {
  exps: FnvHashMap<String, f64>,
}

impl Monomial {
  /// The monomial of a symbol, a `Power` of a symbol, or a `Times` of such factors. Numeric
  /// factors carry no variables and are ignored; anything else has no monomial form.
  pub(crate) fn of(expression: &Atom) -> Option<Monomial> {
    let mut exps = FnvHashMap::default();
    if collect_exponents(expression, 1.0, &mut exps) {
      Some(Monomial { exps })
    } else {
      None
    }
  }

  fn cmp(&self, other: &Monomial) -> Ordering {
    let mut self_exps  = self.exps.clone();
    let mut other_exps = other.exps.clone();

    // Cancel the exponents of shared variables.
    for (var, exp) in self.exps.iter() {
      if let Some(other_exp) = other.exps.get(var) {
        let dec = exp.min(*other_exp);
        decrement(&mut self_exps, var, dec);
        decrement(&mut other_exps, var, dec);
      }
    }

    let mut self_exps: Vec<(String, f64)>  = self_exps.into_iter().collect();
    let mut other_exps: Vec<(String, f64)> = other_exps.into_iter().collect();
    self_exps.sort_by(|x, y| x.0.cmp(&y.0));
    other_exps.sort_by(|x, y| x.0.cmp(&y.0));

    let self_length  = self_exps.len();
    let other_length = other_exps.len();
    let mut index = 0;
    loop {
      if index >= self_length && index >= other_length {
        return Ordering::Equal;
      }
      if index >= self_length {
        return Ordering::Less;
      }
      if index >= other_length {
        return Ordering::Greater;
      }

      let (self_var, self_exp)   = &self_exps[index];
      let (other_var, other_exp) = &other_exps[index];
      let var_ordering = self_var.cmp(other_var);
      if var_ordering != Ordering::Equal {
        return var_ordering;
      }
      if self_exp != other_exp {
        let exp_ordering = self_exp.partial_cmp(other_exp).unwrap_or(Ordering::Equal);
        return if index + 1 == self_length || index + 1 == other_length {
          // Smaller exponents first at the tail, so `x` sorts before `x^2`.
          exp_ordering
        } else {
          // Bigger exponents first in the interior.
          exp_ordering.reverse()
        };
      }
      index += 1;
    }
  }
}

fn decrement(exps: &mut FnvHashMap<String, f64>, var: &str, amount: f64) {
  if let Some(exp) = exps.get_mut(var) {
    *exp -= amount;
    if *exp == 0.0 {
      exps.remove(var);
    }
  }
}

// Accumulates `expression^exponent` into `exps`. Gives false if the expression has no
// monomial form.
fn collect_exponents(expression: &Atom, exponent: f64, exps: &mut FnvHashMap<String, f64>) -> bool {
  match expression {
    Atom::Symbol(name) => {
      *exps.entry(resolve_str(*name)).or_insert(0.0) += exponent;
      true
    }

    _ if expression.is_number() => true,

    Atom::SExpression(cell) if expression.has_form("Power", Some(2)) => {
      match exponent_value(&cell.parts[2]) {
        Some(power) => collect_exponents(&cell.parts[1], exponent * power, exps),
        None        => false
      }
    }

    Atom::SExpression(_) if expression.has_form("Times", None) => {
      crate::atom::SExpression::elements(expression)
          .iter()
          .all(|factor| collect_exponents(factor, exponent, exps))
    }

    _ => false
  }
}

fn exponent_value(exponent: &Atom) -> Option<f64> {
  match exponent {
    Atom::Integer(n)  => Some(n.to_f64()),
    Atom::Rational(q) => Some(q.to_f64()),
    Atom::Real(r)     => Some(r.to_f64()),
    _                 => None
  }
}
