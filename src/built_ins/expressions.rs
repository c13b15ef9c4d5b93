/*!

Structural expression manipulation: interrogation (`Head`, `Length`), pattern-driven selection
and replacement (`MatchQ`, `Cases`, `ReplaceAll`), and head surgery (`Operate`, `MapThread`).

*/
#![allow(non_snake_case)]

use rug::Integer as BigInteger;

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::Attribute,
  context::Context,
  evaluation::{Evaluation, Signal},
  format::{ExpressionFormatter, Formattable},
  interner::resolve_str,
  matching::{match_pattern, SolutionSet},
};

use super::{binary_pattern, register_builtin, required, unary_pattern};


/// Implements calls matching `Head[x_]`.
pub(crate) fn Head(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  Ok(Some(required(arguments, "x").head()))
}

/// Implements calls matching `Length[x_]`. Atoms have length 0.
pub(crate) fn Length(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let x = required(arguments, "x");
  let length = match &x {
    Atom::SExpression(_) => x.len(),
    _                    => 0,
  };
  Ok(Some(Atom::Integer(BigInteger::from(length))))
}

/// Implements calls matching `MatchQ[x_, y_]`.
pub(crate) fn MatchQ(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let expression = required(arguments, "x");
  let pattern = required(arguments, "y");
  let matched = match_pattern(&pattern, &expression, evaluation)?.is_some();
  Ok(Some(if matched {
    Symbol::from_static_str("True")
  } else {
    Symbol::from_static_str("False")
  }))
}


// A replacement rule, normalized from Rule/RuleDelayed.
struct Replacement {
  lhs: Atom,
  rhs: Atom,
}

// Rule/RuleDelayed, or a list of them, into replacement order. Gives `None` and a message when
// anything else appears.
fn parse_rules(expression: &Atom, evaluation: &mut Evaluation) -> Option<Vec<Replacement>> {
  let candidates: Vec<&Atom> = if expression.has_form("List", None) {
    SExpression::elements(expression).iter().collect()
  } else {
    vec![expression]
  };

  let mut rules = vec![];
  for candidate in candidates.into_iter() {
    if candidate.has_form("Rule", Some(2)) || candidate.has_form("RuleDelayed", Some(2)) {
      let parts = SExpression::parts(candidate);
      rules.push(Replacement { lhs: parts[1].clone(), rhs: parts[2].clone() });
    } else {
      evaluation.message(
        "ReplaceAll",
        "reps",
        format!(
          "{} is neither a replacement rule nor a list of replacement rules.",
          candidate.format(&ExpressionFormatter::default())
        ),
      );
      return None;
    }
  }
  Some(rules)
}

// Applies the first matching rule at this node, or recurses into the parts. A replaced subtree
// is not searched again.
fn replace_all_walk(
  expression: &Atom,
  rules: &[Replacement],
  evaluation: &mut Evaluation,
) -> Result<Atom, Signal> {
  for rule in rules.iter() {
    if let Some(solutions) = match_pattern(&rule.lhs, expression, evaluation)? {
      return Ok(crate::evaluate::replace_vars(&rule.rhs, &solutions));
    }
  }

  match expression {
    Atom::SExpression(cell) => {
      let mut new_parts: Vec<Atom> = Vec::with_capacity(cell.parts.len());
      for part in cell.parts.iter() {
        new_parts.push(replace_all_walk(part, rules, evaluation)?);
      }
      Ok(SExpression::from_parts(new_parts))
    }

    _ => Ok(expression.clone()),
  }
}

/// Implements calls matching `ReplaceAll[x_, y_]`.
pub(crate) fn ReplaceAll(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let expression = required(arguments, "x");
  let rules = match parse_rules(&required(arguments, "y"), evaluation) {
    Some(rules) => rules,
    None        => return Ok(None),
  };
  Ok(Some(replace_all_walk(&expression, &rules, evaluation)?))
}

/// Implements calls matching `Cases[x_, y_]`: the elements of `x` matching the pattern `y`. A
/// rule as the second argument selects and transforms in one pass.
pub(crate) fn Cases(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let expression = required(arguments, "x");
  if !matches!(expression, Atom::SExpression(_)) {
    return Ok(Some(SExpression::list(vec![])));
  }
  let selector = required(arguments, "y");

  let (pattern, template) =
      if selector.has_form("Rule", Some(2)) || selector.has_form("RuleDelayed", Some(2)) {
        let parts = SExpression::parts(&selector);
        (parts[1].clone(), Some(parts[2].clone()))
      } else {
        (selector, None)
      };

  let mut selected: Vec<Atom> = vec![];
  for element in SExpression::elements(&expression).iter() {
    if let Some(solutions) = match_pattern(&pattern, element, evaluation)? {
      match &template {
        Some(template) => selected.push(crate::evaluate::replace_vars(template, &solutions)),
        None           => selected.push(element.clone()),
      }
    }
  }
  Ok(Some(SExpression::list(selected)))
}

/// Implements calls matching `MapThread[x_, y_]`: `MapThread[f, {{a, b}, {c, d}}]` gives
/// `{f[a, c], f[b, d]}`.
pub(crate) fn MapThread(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let function = required(arguments, "x");
  let lists = required(arguments, "y");
  if !lists.has_form("List", None) {
    return Ok(None);
  }

  let rows = SExpression::elements(&lists);
  let mut length: Option<usize> = None;
  for row in rows.iter() {
    if !row.has_form("List", None) {
      return Ok(None);
    }
    match length {
      None => length = Some(row.len()),
      Some(expected) if expected != row.len() => {
        evaluation.message(
          "MapThread",
          "mptd",
          format!(
            "The lists in {} are not all the same length.",
            lists.format(&ExpressionFormatter::default())
          ),
        );
        return Ok(None);
      }
      _ => {}
    }
  }

  let length = length.unwrap_or(0);
  let mut threaded: Vec<Atom> = Vec::with_capacity(length);
  for column in 1..=length {
    let entries: Vec<Atom> = rows.iter().map(|row| SExpression::part(row, column)).collect();
    threaded.push(SExpression::new(function.clone(), entries));
  }
  Ok(Some(SExpression::list(threaded)))
}

/// Implements calls matching `Operate[x_, y_]`: applies `x` to the head of `y`, so
/// `Operate[p, f[a, b]]` gives `p[f][a, b]`.
pub(crate) fn Operate(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let operator = required(arguments, "x");
  let expression = required(arguments, "y");
  match &expression {
    Atom::SExpression(_) => {
      let wrapped = SExpression::new(operator, vec![expression.head()]);
      Ok(Some(SExpression::new_swapped_head(wrapped, &expression)))
    }
    _ => Ok(None),
  }
}

/// Implements calls matching `OptionValue[x_, y_]`: the value of option `y` of symbol `x`,
/// from `Options[x]`. The one-argument form inside a rule body is resolved during substitution.
pub(crate) fn OptionValue(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let function = match required(arguments, "x") {
    Atom::Symbol(name) => name,
    _                  => return Ok(None),
  };
  let option = match required(arguments, "y") {
    Atom::Symbol(name) | Atom::String(name) => name,
    _                                       => return Ok(None),
  };

  let options = evaluation.context.get_options(function);
  match options.into_iter().find(|(name, _)| *name == option) {
    Some((_, value)) => Ok(Some(value)),
    None => {
      evaluation.message(
        "OptionValue",
        "optnf",
        format!(
          "Option name {} not found in defaults for {}.",
          resolve_str(option),
          resolve_str(function)
        ),
      );
      Ok(None)
    }
  }
}


pub(crate) fn register_builtins(context: &mut Context) {
  register_builtin!(Head, unary_pattern("Head"), Attribute::Protected.into(), context);
  register_builtin!(Length, unary_pattern("Length"), Attribute::Protected.into(), context);
  register_builtin!(MatchQ, binary_pattern("MatchQ"), Attribute::Protected.into(), context);
  register_builtin!(
    ReplaceAll,
    binary_pattern("ReplaceAll"),
    Attribute::Protected.into(),
    context
  );
  register_builtin!(Cases, binary_pattern("Cases"), Attribute::Protected.into(), context);
  register_builtin!(MapThread, binary_pattern("MapThread"), Attribute::Protected.into(), context);
  register_builtin!(Operate, binary_pattern("Operate"), Attribute::Protected.into(), context);
  register_builtin!(
    OptionValue,
    binary_pattern("OptionValue"),
    Attribute::Protected.into(),
    context
  );
}


#[cfg(test)]
mod tests {
  use rug::Float as BigFloat;

  use crate::evaluate::evaluate;
  use crate::interner::interned_static;
  use super::*;

  fn int(n: i64) -> Atom {
    Atom::Integer(BigInteger::from(n))
  }

  fn real(x: f64) -> Atom {
    Atom::Real(BigFloat::with_val(53, x))
  }

  fn symbol(name: &'static str) -> Atom {
    Symbol::from_static_str(name)
  }

  fn call(head: &'static str, elements: Vec<Atom>) -> Atom {
    SExpression::new(symbol(head), elements)
  }

  #[test]
  fn head_and_length_interrogate_structure() {
    let mut evaluation = Evaluation::new();
    assert!(evaluate(call("Head", vec![call("f", vec![int(1)])]), &mut evaluation)
        .sameQ(&symbol("f")));
    assert!(evaluate(call("Head", vec![int(3)]), &mut evaluation).sameQ(&symbol("Integer")));

    assert!(evaluate(
      call("Length", vec![SExpression::list(vec![int(1), int(2), int(3)])]),
      &mut evaluation
    ).sameQ(&int(3)));
    assert!(evaluate(call("Length", vec![symbol("x")]), &mut evaluation).sameQ(&int(0)));
  }

  #[test]
  fn matchQ_answers_with_booleans() {
    let mut evaluation = Evaluation::new();
    let pattern = SExpression::new(
      symbol("Blank"),
      vec![symbol("Integer")]
    );
    assert!(evaluate(call("MatchQ", vec![int(1), pattern.copy()]), &mut evaluation).is_true());
    assert!(evaluate(call("MatchQ", vec![symbol("a"), pattern]), &mut evaluation)
        .sameQ(&symbol("False")));
  }

  #[test]
  fn replace_all_rewrites_every_level_once() {
    let mut evaluation = Evaluation::new();
    // f[g[x], x] /. x -> 1 gives f[g[1], 1]
    let expression = call("f", vec![call("g", vec![symbol("x")]), symbol("x")]);
    let rule = call("Rule", vec![symbol("x"), int(1)]);
    let result = evaluate(call("ReplaceAll", vec![expression, rule]), &mut evaluation);
    assert!(result.sameQ(&call("f", vec![call("g", vec![int(1)]), int(1)])));
  }

  #[test]
  fn replace_all_does_not_descend_into_replacements() {
    let mut evaluation = Evaluation::new();
    // g[a] /. {g[a] -> h[a], a -> b} replaces the whole g[a] first and stops there.
    let expression = call("g", vec![symbol("a")]);
    let rules = SExpression::list(vec![
      call("Rule", vec![call("g", vec![symbol("a")]), call("h", vec![symbol("a")])]),
      call("Rule", vec![symbol("a"), symbol("b")]),
    ]);
    let result = evaluate(call("ReplaceAll", vec![expression, rules]), &mut evaluation);
    assert!(result.sameQ(&call("h", vec![symbol("a")])));
  }

  #[test]
  fn replace_all_substitutes_pattern_variables() {
    let mut evaluation = Evaluation::new();
    // f[2] /. f[x_] :> g[x, x]
    let rule = call(
      "RuleDelayed",
      vec![
        call("f", vec![SExpression::variable("x")]),
        call("g", vec![symbol("x"), symbol("x")])
      ]
    );
    let result = evaluate(
      call("ReplaceAll", vec![call("f", vec![int(2)]), rule]),
      &mut evaluation
    );
    assert!(result.sameQ(&call("g", vec![int(2), int(2)])));
  }

  #[test]
  fn cases_select_and_transform() {
    let mut evaluation = Evaluation::new();
    let ground = SExpression::list(vec![int(1), symbol("a"), int(2), symbol("b")]);
    let blank_integer = SExpression::new(symbol("Blank"), vec![symbol("Integer")]);

    let selected = evaluate(
      call("Cases", vec![ground.copy(), blank_integer.copy()]),
      &mut evaluation
    );
    assert!(selected.sameQ(&SExpression::list(vec![int(1), int(2)])));

    // Cases[…, x_Integer :> g[x]]
    let rule = call(
      "RuleDelayed",
      vec![
        SExpression::from_parts(vec![symbol("Pattern"), symbol("x"), blank_integer]),
        call("g", vec![symbol("x")])
      ]
    );
    let transformed = evaluate(call("Cases", vec![ground, rule]), &mut evaluation);
    assert!(transformed.sameQ(&SExpression::list(vec![
      call("g", vec![int(1)]),
      call("g", vec![int(2)]),
    ])));
  }

  #[test]
  fn cases_selects_through_alternatives() {
    let mut evaluation = Evaluation::new();
    // Cases[{1, "a", 2.5, x}, _Integer | _Real] keeps the numbers of either kind.
    let ground = SExpression::list(vec![
      int(1),
      Atom::String(interned_static("a")),
      real(2.5),
      symbol("x"),
    ]);
    let pattern = call(
      "Alternatives",
      vec![
        SExpression::new(symbol("Blank"), vec![symbol("Integer")]),
        SExpression::new(symbol("Blank"), vec![symbol("Real")]),
      ]
    );
    let result = evaluate(call("Cases", vec![ground, pattern]), &mut evaluation);
    assert!(result.sameQ(&SExpression::list(vec![int(1), real(2.5)])));
  }

  #[test]
  fn map_thread_zips_lists() {
    let mut evaluation = Evaluation::new();
    let lists = SExpression::list(vec![
      SExpression::list(vec![int(1), int(2)]),
      SExpression::list(vec![int(3), int(4)]),
    ]);
    let result = evaluate(call("MapThread", vec![symbol("f"), lists]), &mut evaluation);
    assert!(result.sameQ(&SExpression::list(vec![
      call("f", vec![int(1), int(3)]),
      call("f", vec![int(2), int(4)]),
    ])));
  }

  #[test]
  fn map_thread_requires_equal_lengths() {
    let mut evaluation = Evaluation::new();
    let lists = SExpression::list(vec![
      SExpression::list(vec![int(1), int(2)]),
      SExpression::list(vec![int(3)]),
    ]);
    let expression = call("MapThread", vec![symbol("f"), lists]);
    let result = evaluate(expression.copy(), &mut evaluation);
    assert!(result.sameQ(&expression));
    assert!(evaluation.has_message("MapThread", "mptd"));
  }

  #[test]
  fn operate_applies_to_the_head() {
    let mut evaluation = Evaluation::new();
    let result = evaluate(
      call("Operate", vec![symbol("p"), call("f", vec![symbol("a"), symbol("b")])]),
      &mut evaluation
    );
    assert!(result.sameQ(&SExpression::new(
      call("p", vec![symbol("f")]),
      vec![symbol("a"), symbol("b")]
    )));
  }

  #[test]
  fn option_value_reads_registered_options() {
    let mut evaluation = Evaluation::new();
    evaluation.context.set_options(
      crate::interner::interned_static("f"),
      vec![(crate::interner::interned_static("opt"), int(3))]
    );

    let result = evaluate(
      call("OptionValue", vec![symbol("f"), symbol("opt")]),
      &mut evaluation
    );
    assert!(result.sameQ(&int(3)));

    let missing = call("OptionValue", vec![symbol("f"), symbol("missing")]);
    assert!(evaluate(missing.copy(), &mut evaluation).sameQ(&missing));
    assert!(evaluation.has_message("OptionValue", "optnf"));
  }

  #[test]
  fn options_pattern_bindings_reach_option_value() {
    let mut evaluation = Evaluation::new();
    // Options[plot] = {size -> 10}; plot[x_, OptionsPattern[]] := {x, OptionValue[size]}
    evaluation.context.set_options(
      crate::interner::interned_static("plot"),
      vec![(crate::interner::interned_static("size"), int(10))]
    );
    let lhs = call(
      "plot",
      vec![
        SExpression::variable("x"),
        SExpression::with_str_head("OptionsPattern")
      ]
    );
    let rhs = SExpression::list(vec![
      symbol("x"),
      call("OptionValue", vec![symbol("size")])
    ]);
    evaluate(call("SetDelayed", vec![lhs, rhs]), &mut evaluation);

    // Default applies.
    let result = evaluate(call("plot", vec![int(1)]), &mut evaluation);
    assert!(result.sameQ(&SExpression::list(vec![int(1), int(10)])));

    // A provided rule overrides it.
    let result = evaluate(
      call("plot", vec![int(1), call("Rule", vec![symbol("size"), int(99)])]),
      &mut evaluation
    );
    assert!(result.sameQ(&SExpression::list(vec![int(1), int(99)])));
  }
}
