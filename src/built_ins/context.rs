/*!

Definition management: the `Set` family, `Clear`, and attribute manipulation.

A definition's left-hand side decides where it is filed: own-values for a bare symbol,
down-values for `f[…]`, sub-values for `f[…][…]`, and for the `UpSet` forms the up-values of
every symbol appearing among the elements. `Options[f] = …` and `Default[f, …] = …` on the
left-hand side are routed to their dedicated stores instead.

*/
#![allow(non_snake_case)]

use std::str::FromStr;

use strum::IntoEnumIterator;

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::Attribute,
  context::{Context, ContextValueStore},
  evaluation::{Evaluation, Signal},
  format::{ExpressionFormatter, Formattable},
  interner::{resolve_str, InternedString},
  logging::{log, Channel},
  matching::{display_solutions, SolutionSet},
};

use super::{
  binary_pattern, definition_value, register_builtin, required, rule_destination, rule_key,
  sequence_binding, variadic_pattern,
};


fn format_expression(expression: &Atom) -> String {
  expression.format(&ExpressionFormatter::default())
}

// A Protected tag cannot take definitions; the message tag matches the one every `Set` form
// issues for this.
fn check_writable(tag: InternedString, evaluation: &mut Evaluation) -> bool {
  if evaluation.context.get_attributes(tag).protected() {
    evaluation.message(
      "Set",
      "wrsym",
      format!("Symbol {} is Protected.", resolve_str(tag)),
    );
    return false;
  }
  true
}

// Rule/RuleDelayed expressions (or a list of them) into option name-value pairs.
fn parse_option_rules(expression: &Atom, options: &mut Vec<(InternedString, Atom)>) -> bool {
  if expression.has_form("Rule", Some(2)) || expression.has_form("RuleDelayed", Some(2)) {
    let parts = SExpression::parts(expression);
    return match &parts[1] {
      Atom::Symbol(name) | Atom::String(name) => {
        options.push((*name, parts[2].clone()));
        true
      }
      _ => false,
    };
  }
  if expression.has_form("List", None) {
    return SExpression::elements(expression)
        .iter()
        .all(|element| parse_option_rules(element, options));
  }
  false
}

// The shared body of Set and SetDelayed. `rhs` arrives evaluated for Set and held for
// SetDelayed; the filing logic does not care.
fn assign(lhs: Atom, rhs: Atom, evaluation: &mut Evaluation) -> Option<Atom> {
  let key = rule_key(&lhs);

  // Options[f] = {…}
  if key.has_form("Options", Some(1)) {
    if let Atom::Symbol(function) = &SExpression::parts(&key)[1] {
      if !check_writable(*function, evaluation) {
        return Some(Symbol::from_static_str("$Failed"));
      }
      let mut options = vec![];
      if parse_option_rules(&rhs, &mut options) {
        evaluation.context.set_options(*function, options);
        return Some(rhs);
      }
    }
    evaluation.message(
      "Options",
      "optlist",
      format!("{} is not a list of option rules.", format_expression(&rhs)),
    );
    return Some(Symbol::from_static_str("$Failed"));
  }

  // Default[f], Default[f, k], Default[f, k, n]
  if key.has_form("Default", None) && (1..=3).contains(&key.len()) {
    if let Atom::Symbol(function) = &SExpression::parts(&key)[1] {
      if !check_writable(*function, evaluation) {
        return Some(Symbol::from_static_str("$Failed"));
      }
      evaluation.context.set_default_value(*function, key, rhs.clone());
      return Some(rhs);
    }
  }

  let (tag, store) = match rule_destination(&lhs) {
    Some(destination) => destination,
    None => {
      evaluation.message(
        "Set",
        "setraw",
        format!("Cannot assign to raw object {}.", format_expression(&lhs)),
      );
      return Some(Symbol::from_static_str("$Failed"));
    }
  };
  if !check_writable(tag, evaluation) {
    return Some(Symbol::from_static_str("$Failed"));
  }

  evaluation.context.insert_rule(store, tag, definition_value(lhs, rhs), true);
  None
}


/// Implements calls matching `Set[x_, y_]`. The left-hand side is held; the right-hand side
/// arrives evaluated.
pub(crate) fn Set(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  log(
    Channel::Debug,
    4,
    format!("Set called with arguments {}", display_solutions(arguments)).as_str()
  );

  let lhs = required(arguments, "x");
  let rhs = required(arguments, "y");
  match assign(lhs, rhs.clone(), evaluation) {
    Some(result) => Ok(Some(result)),
    None         => Ok(Some(rhs)),
  }
}

/// Implements calls matching `SetDelayed[x_, y_]`. Both sides are held.
pub(crate) fn SetDelayed(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let lhs = required(arguments, "x");
  let rhs = required(arguments, "y");
  match assign(lhs, rhs, evaluation) {
    Some(result) => Ok(Some(result)),
    None         => Ok(Some(Symbol::from_static_str("Null"))),
  }
}


// The shared body of UpSet and UpSetDelayed: file under the up-values of every distinct element
// tag.
fn assign_up(lhs: Atom, rhs: Atom, evaluation: &mut Evaluation) -> Option<Atom> {
  let key = rule_key(&lhs);
  if !matches!(key, Atom::SExpression(_)) {
    evaluation.message(
      "UpSet",
      "normal",
      format!("Nonatomic expression expected at position 1 of {}.", format_expression(&lhs)),
    );
    return Some(Symbol::from_static_str("$Failed"));
  }

  let mut tags: Vec<InternedString> = vec![];
  for element in SExpression::elements(&key).iter() {
    if let Some(tag) = element.lookup_name() {
      if !tags.contains(&tag) {
        tags.push(tag);
      }
    }
  }
  if tags.is_empty() {
    evaluation.message(
      "UpSet",
      "nosym",
      format!("{} does not contain a symbol to attach a rule to.", format_expression(&key)),
    );
    return Some(Symbol::from_static_str("$Failed"));
  }
  for tag in tags.iter() {
    if !check_writable(*tag, evaluation) {
      return Some(Symbol::from_static_str("$Failed"));
    }
  }

  for tag in tags.into_iter() {
    evaluation.context.insert_rule(
      ContextValueStore::UpValues,
      tag,
      definition_value(lhs.clone(), rhs.clone()),
      true,
    );
  }
  None
}

/// Implements calls matching `UpSet[x_, y_]`.
pub(crate) fn UpSet(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let lhs = required(arguments, "x");
  let rhs = required(arguments, "y");
  match assign_up(lhs, rhs.clone(), evaluation) {
    Some(result) => Ok(Some(result)),
    None         => Ok(Some(rhs)),
  }
}

/// Implements calls matching `UpSetDelayed[x_, y_]`.
pub(crate) fn UpSetDelayed(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let lhs = required(arguments, "x");
  let rhs = required(arguments, "y");
  match assign_up(lhs, rhs, evaluation) {
    Some(result) => Ok(Some(result)),
    None         => Ok(Some(Symbol::from_static_str("Null"))),
  }
}


fn clear(arguments: &SolutionSet, also_attributes: bool, evaluation: &mut Evaluation) -> Atom {
  for item in sequence_binding(arguments, "args").into_iter() {
    match item {
      Atom::Symbol(name) => {
        if check_writable(name, evaluation) {
          evaluation.context.clear_symbol(name, also_attributes);
        }
      }
      _ => {
        evaluation.message(
          "Clear",
          "ssym",
          format!("{} is not a symbol.", format_expression(&item)),
        );
      }
    }
  }
  Symbol::from_static_str("Null")
}

/// Implements calls matching `Clear[args___]`.
pub(crate) fn Clear(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  Ok(Some(clear(arguments, false, evaluation)))
}

/// Implements calls matching `ClearAll[args___]`.
pub(crate) fn ClearAll(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  Ok(Some(clear(arguments, true, evaluation)))
}


// Symbols named in the first argument of SetAttributes and friends: a symbol or a list of
// symbols.
fn attribute_targets(expression: &Atom, evaluation: &mut Evaluation) -> Option<Vec<InternedString>> {
  match expression {
    Atom::Symbol(name) => Some(vec![*name]),

    _ if expression.has_form("List", None) => {
      let mut targets = vec![];
      for element in SExpression::elements(expression).iter() {
        match element {
          Atom::Symbol(name) => targets.push(*name),
          _ => {
            evaluation.message(
              "SetAttributes",
              "ssym",
              format!("{} is not a symbol.", format_expression(element)),
            );
            return None;
          }
        }
      }
      Some(targets)
    }

    _ => {
      evaluation.message(
        "SetAttributes",
        "ssym",
        format!("{} is not a symbol.", format_expression(expression)),
      );
      None
    }
  }
}

// Attribute names in the second argument: a symbol or a list of symbols, resolved against the
// `Attribute` enum.
fn attribute_values(expression: &Atom, evaluation: &mut Evaluation) -> Option<Vec<Attribute>> {
  let items: Vec<&Atom> = if expression.has_form("List", None) {
    SExpression::elements(expression).iter().collect()
  } else {
    vec![expression]
  };

  let mut attributes = vec![];
  for item in items.into_iter() {
    let name = match item {
      Atom::Symbol(name) => resolve_str(*name),
      _ => {
        evaluation.message(
          "SetAttributes",
          "attnf",
          format!("{} is not a known attribute.", format_expression(item)),
        );
        return None;
      }
    };
    match Attribute::from_str(name.as_str()) {
      Ok(attribute) => attributes.push(attribute),
      Err(_) => {
        evaluation.message(
          "SetAttributes",
          "attnf",
          format!("{} is not a known attribute.", name),
        );
        return None;
      }
    }
  }
  Some(attributes)
}

/// Implements calls matching `SetAttributes[x_, y_]`.
pub(crate) fn SetAttributes(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let targets = match attribute_targets(&required(arguments, "x"), evaluation) {
    Some(targets) => targets,
    None          => return Ok(Some(Symbol::from_static_str("$Failed"))),
  };
  let attributes = match attribute_values(&required(arguments, "y"), evaluation) {
    Some(attributes) => attributes,
    None             => return Ok(Some(Symbol::from_static_str("$Failed"))),
  };

  for target in targets.into_iter() {
    if !check_writable(target, evaluation) {
      return Ok(Some(Symbol::from_static_str("$Failed")));
    }
    for attribute in attributes.iter() {
      evaluation.context.set_attribute(target, *attribute);
    }
  }
  Ok(Some(Symbol::from_static_str("Null")))
}

/// Implements calls matching `ClearAttributes[x_, y_]`.
pub(crate) fn ClearAttributes(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let targets = match attribute_targets(&required(arguments, "x"), evaluation) {
    Some(targets) => targets,
    None          => return Ok(Some(Symbol::from_static_str("$Failed"))),
  };
  let attributes = match attribute_values(&required(arguments, "y"), evaluation) {
    Some(attributes) => attributes,
    None             => return Ok(Some(Symbol::from_static_str("$Failed"))),
  };

  for target in targets.into_iter() {
    if !check_writable(target, evaluation) {
      return Ok(Some(Symbol::from_static_str("$Failed")));
    }
    for attribute in attributes.iter() {
      evaluation.context.reset_attribute(target, *attribute);
    }
  }
  Ok(Some(Symbol::from_static_str("Null")))
}

/// Implements calls matching `Attributes[x_]`: the attributes of a symbol as a sorted list.
pub(crate) fn Attributes(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let target = match required(arguments, "x") {
    Atom::Symbol(name) => name,
    other => {
      evaluation.message(
        "Attributes",
        "ssym",
        format!("{} is not a symbol.", format_expression(&other)),
      );
      return Ok(Some(Symbol::from_static_str("$Failed")));
    }
  };

  let attributes: crate::attributes::Attributes = evaluation.context.get_attributes(target);
  let names: Vec<Atom> =
      Attribute::iter()
               .filter(|attribute| attributes.get(*attribute))
               .map(|attribute| Symbol::from_str(attribute.into()))
               .collect();
  Ok(Some(SExpression::list(names)))
}

/// Implements calls matching `Protect[args___]`.
pub(crate) fn Protect(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let mut protected: Vec<Atom> = vec![];
  for item in sequence_binding(arguments, "args").into_iter() {
    if let Atom::Symbol(name) = item {
      if !evaluation.context.get_attributes(name).protected() {
        evaluation.context.set_attribute(name, Attribute::Protected);
        protected.push(Atom::Symbol(name));
      }
    }
  }
  Ok(Some(SExpression::list(protected)))
}

/// Implements calls matching `Unprotect[args___]`.
pub(crate) fn Unprotect(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let mut unprotected: Vec<Atom> = vec![];
  for item in sequence_binding(arguments, "args").into_iter() {
    if let Atom::Symbol(name) = item {
      if evaluation.context.get_attributes(name).locked() {
        evaluation.message(
          "Unprotect",
          "locked",
          format!("Symbol {} is locked.", resolve_str(name)),
        );
        continue;
      }
      if evaluation.context.get_attributes(name).protected() {
        evaluation.context.reset_attribute(name, Attribute::Protected);
        unprotected.push(Atom::Symbol(name));
      }
    }
  }
  Ok(Some(SExpression::list(unprotected)))
}


pub(crate) fn register_builtins(context: &mut Context) {
  register_builtin!(
    Set,
    binary_pattern("Set"),
    Attribute::HoldFirst + Attribute::SequenceHold + Attribute::Protected,
    context
  );
  register_builtin!(
    SetDelayed,
    binary_pattern("SetDelayed"),
    Attribute::HoldAll + Attribute::SequenceHold + Attribute::Protected,
    context
  );
  register_builtin!(
    UpSet,
    binary_pattern("UpSet"),
    Attribute::HoldFirst + Attribute::SequenceHold + Attribute::Protected,
    context
  );
  register_builtin!(
    UpSetDelayed,
    binary_pattern("UpSetDelayed"),
    Attribute::HoldAll + Attribute::SequenceHold + Attribute::Protected,
    context
  );
  register_builtin!(
    Clear,
    variadic_pattern("Clear"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
  register_builtin!(
    ClearAll,
    variadic_pattern("ClearAll"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
  register_builtin!(
    SetAttributes,
    binary_pattern("SetAttributes"),
    Attribute::HoldFirst + Attribute::Protected,
    context
  );
  register_builtin!(
    ClearAttributes,
    binary_pattern("ClearAttributes"),
    Attribute::HoldFirst + Attribute::Protected,
    context
  );
  register_builtin!(
    Attributes,
    super::unary_pattern("Attributes"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
  register_builtin!(
    Protect,
    variadic_pattern("Protect"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
  register_builtin!(
    Unprotect,
    variadic_pattern("Unprotect"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
}
