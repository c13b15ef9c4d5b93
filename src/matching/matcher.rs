/*!

The single-candidate matcher: one pattern construct against one candidate expression, in
continuation-passing style. The candidate may be a `Sequence[…]` wrapper (or a head-wrapped run
under a `Flat` head) produced by the sequence distributor in `sequence.rs`.

*/

use crate::{
  atom::{Atom, SExpression},
  evaluation::{Evaluation, Signal},
  format::{ExpressionFormatter, Formattable},
  interner::{interned, resolve_str, InternedString},
  logging::{log, Channel},
};

use super::{sequence, SolutionSet};

pub(crate) type MatchResult = Result<bool, Signal>;

/// A matching continuation: invoked once per solution with the bindings in scope. Returns
/// `Ok(true)` to accept and stop the search, `Ok(false)` to backtrack.
pub(crate) type Continuation<'c> =
    &'c mut dyn FnMut(&mut SolutionSet, &mut Evaluation) -> MatchResult;

/// Ambient information about the position being matched: the head of the enclosing ground
/// expression, which `OptionsPattern[]` and `Optional` defaults consult.
#[derive(Clone, Default)]
pub(crate) struct MatchInfo {
  pub(crate) head: Option<Atom>,
}


enum BlankKind {
  Single,
  Sequence,
  NullSequence,
}

/// Matches `pattern` against the single candidate `ground`, calling `then` for every solution.
pub(crate) fn match_single(
  pattern: &Atom,
  ground: &Atom,
  bindings: &mut SolutionSet,
  info: &MatchInfo,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let length = pattern.len();

  if pattern.has_form("Blank", None) && length <= 1 {
    return match_blank(BlankKind::Single, pattern, ground, bindings, evaluation, then);
  }
  if pattern.has_form("BlankSequence", None) && length <= 1 {
    return match_blank(BlankKind::Sequence, pattern, ground, bindings, evaluation, then);
  }
  if pattern.has_form("BlankNullSequence", None) && length <= 1 {
    return match_blank(BlankKind::NullSequence, pattern, ground, bindings, evaluation, then);
  }

  if pattern.has_form("Pattern", Some(2)) {
    return match_named(pattern, ground, bindings, info, evaluation, then);
  }

  if pattern.has_form("Alternatives", None) {
    for branch in SExpression::elements(pattern) {
      let stopped = match_single(
        branch,
        ground,
        bindings,
        info,
        evaluation,
        &mut |bindings, evaluation| then(bindings, evaluation),
      )?;
      if stopped {
        return Ok(true);
      }
    }
    return Ok(false);
  }

  if pattern.has_form("Except", None) && (length == 1 || length == 2) {
    let parts = SExpression::parts(pattern);
    // The exclusion is probed in isolation; its bindings never escape.
    let mut probe = bindings.clone();
    let excluded =
        match_single(&parts[1], ground, &mut probe, info, evaluation, &mut |_, _| Ok(true))?;
    if excluded {
      return Ok(false);
    }
    if length == 2 {
      return match_single(&parts[2], ground, bindings, info, evaluation, then);
    }
    return then(bindings, evaluation);
  }

  if pattern.has_form("Optional", None) && (length == 1 || length == 2) {
    // A present element matches against the inner pattern; absence is handled by the sequence
    // distributor, which substitutes the default.
    let parts = SExpression::parts(pattern);
    return match_single(&parts[1], ground, bindings, info, evaluation, then);
  }

  if pattern.has_form("Condition", Some(2)) {
    let parts = SExpression::parts(pattern);
    let test = parts[2].clone();
    return match_single(&parts[1], ground, bindings, info, evaluation, &mut |bindings, evaluation| {
      let substituted = crate::evaluate::replace_vars(&test, bindings);
      let result = crate::evaluate::evaluate_signal(substituted, evaluation)?;
      if result.is_true() {
        then(bindings, evaluation)
      } else {
        Ok(false)
      }
    });
  }

  if pattern.has_form("PatternTest", Some(2)) {
    let parts = SExpression::parts(pattern);
    let test = parts[2].clone();
    let candidate = ground.clone();
    return match_single(&parts[1], ground, bindings, info, evaluation, &mut |bindings, evaluation| {
      // The test applies to every element of a matched sequence individually.
      let items = match candidate.is_sequence() {
        Some(items) => items,
        None        => vec![candidate.clone()],
      };
      for item in items.iter() {
        if !passes_test(&test, item, evaluation)? {
          return Ok(false);
        }
      }
      then(bindings, evaluation)
    });
  }

  if pattern.has_form("HoldPattern", Some(1)) {
    return match_single(&SExpression::parts(pattern)[1], ground, bindings, info, evaluation, then);
  }

  if pattern.has_form("Verbatim", Some(1)) {
    return if SExpression::parts(pattern)[1].sameQ(ground) {
      then(bindings, evaluation)
    } else {
      Ok(false)
    };
  }

  if (pattern.has_form("Repeated", None) || pattern.has_form("RepeatedNull", None))
      && (length == 1 || length == 2)
  {
    return match_repeated(pattern, ground, bindings, info, evaluation, then);
  }

  if pattern.has_form("OptionsPattern", None) {
    return match_options(pattern, ground, bindings, info, evaluation, then);
  }

  // A malformed `Pattern` is reported, not silently treated as a literal.
  if pattern.has_form("Pattern", None) {
    evaluation.message(
      "Pattern",
      "patvar",
      format!(
        "{} is not a valid pattern.",
        pattern.format(&ExpressionFormatter::default())
      ),
    );
    return Ok(false);
  }

  // No pattern construct at the top: structural match.
  match (pattern, ground) {
    (Atom::SExpression(_), Atom::SExpression(_)) => {
      let pattern_parts = SExpression::parts(pattern);
      let pattern_head = pattern_parts[0].clone();
      let pattern_elements: Vec<Atom> = pattern_parts[1..].to_vec();
      let ground_head = ground.head();
      let ground_elements: Vec<Atom> = SExpression::elements(ground).to_vec();

      // Flat and Orderless of the candidate's head govern how its elements may be distributed.
      let attributes = match &ground_head {
        Atom::Symbol(name) => evaluation.context.get_attributes(*name),
        _                  => Default::default(),
      };
      let flat = attributes.flat();
      let orderless = attributes.orderless();

      match_single(&pattern_head, &ground_head, bindings, info, evaluation, &mut |bindings, evaluation| {
        sequence::match_sequence(
          &pattern_elements,
          &ground_elements,
          &ground_head,
          flat,
          orderless,
          1,
          pattern_elements.len(),
          bindings,
          evaluation,
          then,
        )
      })
    }

    _ => {
      if pattern.sameQ(ground) {
        then(bindings, evaluation)
      } else {
        Ok(false)
      }
    }
  }
}


fn match_blank(
  kind: BlankKind,
  pattern: &Atom,
  ground: &Atom,
  bindings: &mut SolutionSet,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let required_head: Option<&Atom> = if pattern.len() == 1 {
    Some(&SExpression::parts(pattern)[1])
  } else {
    None
  };

  match kind {
    BlankKind::Single => {
      if let Some(required) = required_head {
        if !ground.head().sameQ(required) {
          return Ok(false);
        }
      }
      then(bindings, evaluation)
    }

    BlankKind::Sequence | BlankKind::NullSequence => {
      let items = match ground.is_sequence() {
        Some(items) => items,
        None        => vec![ground.clone()],
      };
      if items.is_empty() && matches!(kind, BlankKind::Sequence) {
        return Ok(false);
      }
      if let Some(required) = required_head {
        if !items.iter().all(|item| item.head().sameQ(required)) {
          return Ok(false);
        }
      }
      then(bindings, evaluation)
    }
  }
}


fn match_named(
  pattern: &Atom,
  ground: &Atom,
  bindings: &mut SolutionSet,
  info: &MatchInfo,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let parts = SExpression::parts(pattern);
  let name: InternedString = match &parts[1] {
    Atom::Symbol(name) => *name,
    _ => {
      evaluation.message(
        "Pattern",
        "patvar",
        format!(
          "First element in {} is not a valid pattern name.",
          pattern.format(&ExpressionFormatter::default())
        ),
      );
      return Ok(false);
    }
  };

  let candidate = ground.clone();
  match_single(&parts[2], ground, bindings, info, evaluation, &mut |bindings, evaluation| {
    let consistent = bindings.get(&name).map(|existing| existing.sameQ(&candidate));
    match consistent {
      Some(true) => then(bindings, evaluation),

      Some(false) => {
        log(
          Channel::Debug,
          5,
          format!("Rejecting inconsistent rebinding of {}.", resolve_str(name)).as_str()
        );
        Ok(false)
      }

      None => {
        bindings.insert(name, candidate.clone());
        let result = then(bindings, evaluation);
        bindings.remove(&name);
        result
      }
    }
  })
}


fn match_repeated(
  pattern: &Atom,
  ground: &Atom,
  bindings: &mut SolutionSet,
  info: &MatchInfo,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let null = pattern.has_form("RepeatedNull", None);
  let parts = SExpression::parts(pattern);
  let items = match ground.is_sequence() {
    Some(items) => items,
    None        => vec![ground.clone()],
  };

  let (minimum, maximum) = sequence::repeated_bounds(pattern, null);
  if items.len() < minimum {
    return Ok(false);
  }
  if let Some(maximum) = maximum {
    if items.len() > maximum {
      return Ok(false);
    }
  }

  match_item_chain(&parts[1], &items, 0, bindings, info, evaluation, then)
}

// Matches `pattern` against each of `items` in turn. Bindings made for earlier items constrain
// later ones, so `Repeated[x_]` only matches a run of identical elements.
fn match_item_chain(
  pattern: &Atom,
  items: &[Atom],
  index: usize,
  bindings: &mut SolutionSet,
  info: &MatchInfo,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  if index == items.len() {
    return then(bindings, evaluation);
  }
  match_single(pattern, &items[index], bindings, info, evaluation, &mut |bindings, evaluation| {
    match_item_chain(pattern, items, index + 1, bindings, info, evaluation, then)
  })
}


fn match_options(
  pattern: &Atom,
  ground: &Atom,
  bindings: &mut SolutionSet,
  info: &MatchInfo,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let items = match ground.is_sequence() {
    Some(items) => items,
    None        => vec![ground.clone()],
  };

  // Every provided item must be a Rule, a RuleDelayed, or a (nested) list of them.
  let mut provided: Vec<(InternedString, Atom)> = vec![];
  for item in items.iter() {
    if !collect_option_rules(item, &mut provided) {
      return Ok(false);
    }
  }

  // Defaults come from the pattern's argument if given, otherwise from the Options of the
  // enclosing head.
  let defaults: Vec<(InternedString, Atom)> = if pattern.len() >= 1 {
    let argument = &SExpression::parts(pattern)[1];
    match argument {
      Atom::Symbol(function) => evaluation.context.get_options(*function),
      _ => {
        let mut rules = vec![];
        if !collect_option_rules(argument, &mut rules) {
          return Ok(false);
        }
        rules
      }
    }
  } else {
    info.head
        .as_ref()
        .and_then(|head| head.lookup_name())
        .map(|name| evaluation.context.get_options(name))
        .unwrap_or_default()
  };

  // Provided options overlay the defaults.
  let mut option_values = defaults;
  for (name, value) in provided.into_iter() {
    match option_values.iter_mut().find(|(existing, _)| *existing == name) {
      Some(entry) => entry.1 = value,
      None        => option_values.push((name, value)),
    }
  }

  let mut added: Vec<InternedString> = vec![];
  for (name, value) in option_values.into_iter() {
    let key = interned(format!("_option_{}", resolve_str(name)).as_str());
    if !bindings.contains_key(&key) {
      bindings.insert(key, value);
      added.push(key);
    }
  }
  let result = then(bindings, evaluation);
  for key in added.iter() {
    bindings.remove(key);
  }
  result
}

// Flattens `Rule`/`RuleDelayed` expressions, and lists of them, into name-value pairs. Gives
// false if anything else is encountered.
fn collect_option_rules(expression: &Atom, rules: &mut Vec<(InternedString, Atom)>) -> bool {
  if expression.has_form("Rule", Some(2)) || expression.has_form("RuleDelayed", Some(2)) {
    let parts = SExpression::parts(expression);
    return match &parts[1] {
      Atom::Symbol(name) => {
        rules.push((*name, parts[2].clone()));
        true
      }

      Atom::String(name) => {
        rules.push((*name, parts[2].clone()));
        true
      }

      _ => false
    };
  }
  if expression.has_form("List", None) {
    return SExpression::elements(expression)
        .iter()
        .all(|element| collect_option_rules(element, rules));
  }
  false
}


fn passes_test(test: &Atom, item: &Atom, evaluation: &mut Evaluation) -> Result<bool, Signal> {
  if let Atom::Symbol(name) = test {
    if let Some(result) = crate::built_ins::boolean::quick_predicate(*name, item, &evaluation.context) {
      return Ok(result);
    }
  }
  let applied = SExpression::new(test.clone(), vec![item.clone()]);
  Ok(crate::evaluate::evaluate_signal(applied, evaluation)?.is_true())
}


#[cfg(test)]
mod tests {
  #![allow(non_snake_case)]
  use rug::Integer as BigInteger;

  use crate::{
    atom::Symbol,
    context::Context,
    interner::interned_static,
    matching::match_pattern,
  };
  use super::*;

  fn int(n: i64) -> Atom {
    Atom::Integer(BigInteger::from(n))
  }

  fn f(elements: Vec<Atom>) -> Atom {
    SExpression::new(Symbol::from_static_str("f"), elements)
  }

  fn evaluation() -> Evaluation {
    Evaluation::with_context(Context::new("Test"))
  }

  fn matches(pattern: &Atom, ground: &Atom) -> Option<SolutionSet> {
    match_pattern(pattern, ground, &mut evaluation()).unwrap()
  }

  #[test]
  fn blank_matches_anything_once() {
    let blank = SExpression::with_str_head("Blank");
    assert!(matches(&blank, &int(3)).is_some());
    assert!(matches(&blank, &f(vec![int(1)])).is_some());

    let blank_integer = SExpression::new(
      Symbol::from_static_str("Blank"),
      vec![Symbol::from_static_str("Integer")]
    );
    assert!(matches(&blank_integer, &int(3)).is_some());
    assert!(matches(&blank_integer, &Symbol::from_static_str("x")).is_none());
  }

  #[test]
  fn variables_bind() {
    // f[x_] against f[7] binds x → 7.
    let pattern = f(vec![SExpression::variable("x")]);
    let solutions = matches(&pattern, &f(vec![int(7)])).unwrap();
    assert!(solutions[&interned_static("x")].sameQ(&int(7)));
  }

  #[test]
  fn repeated_variables_must_agree() {
    // f[x_, x_]
    let pattern = f(vec![SExpression::variable("x"), SExpression::variable("x")]);
    assert!(matches(&pattern, &f(vec![int(2), int(2)])).is_some());
    assert!(matches(&pattern, &f(vec![int(2), int(3)])).is_none());
  }

  #[test]
  fn sequence_variables_bind_runs() {
    // f[x__, y_] against f[1, 2, 3]: y_ needs exactly one element, so x__ absorbs the rest.
    let pattern = f(vec![SExpression::sequence_variable("x"), SExpression::variable("y")]);
    let solutions = matches(&pattern, &f(vec![int(1), int(2), int(3)])).unwrap();
    let x = &solutions[&interned_static("x")];
    let y = &solutions[&interned_static("y")];
    assert!(x.sameQ(&SExpression::sequence(vec![int(1), int(2)])));
    assert!(y.sameQ(&int(3)));
  }

  #[test]
  fn null_sequences_can_be_empty() {
    let pattern = f(vec![SExpression::null_sequence_variable("x")]);
    let solutions = matches(&pattern, &SExpression::with_str_head("f")).unwrap();
    assert!(solutions[&interned_static("x")].sameQ(&SExpression::empty_sequence()));

    let sequence_pattern = f(vec![SExpression::sequence_variable("x")]);
    assert!(matches(&sequence_pattern, &SExpression::with_str_head("f")).is_none());
  }

  #[test]
  fn alternatives_try_branches_in_order() {
    let alternatives = SExpression::new(
      Symbol::from_static_str("Alternatives"),
      vec![Symbol::from_static_str("a"), Symbol::from_static_str("b")]
    );
    assert!(matches(&alternatives, &Symbol::from_static_str("b")).is_some());
    assert!(matches(&alternatives, &Symbol::from_static_str("c")).is_none());
  }

  #[test]
  fn except_excludes() {
    let except = SExpression::new(Symbol::from_static_str("Except"), vec![int(0)]);
    assert!(matches(&except, &int(1)).is_some());
    assert!(matches(&except, &int(0)).is_none());

    // Except[0, x_Integer]
    let except_with = SExpression::new(
      Symbol::from_static_str("Except"),
      vec![
        int(0),
        SExpression::from_parts(vec![
          Symbol::from_static_str("Pattern"),
          Symbol::from_static_str("x"),
          SExpression::new(
            Symbol::from_static_str("Blank"),
            vec![Symbol::from_static_str("Integer")]
          )
        ])
      ]
    );
    assert!(matches(&except_with, &int(5)).is_some());
    assert!(matches(&except_with, &Symbol::from_static_str("s")).is_none());
  }

  #[test]
  fn verbatim_is_literal() {
    // Verbatim[x_] matches the expression `Pattern[x, Blank[]]` itself, not what x_ matches.
    let verbatim = SExpression::new(
      Symbol::from_static_str("Verbatim"),
      vec![SExpression::variable("x")]
    );
    assert!(matches(&verbatim, &SExpression::variable("x")).is_some());
    assert!(matches(&verbatim, &int(3)).is_none());
  }

  #[test]
  fn repeated_bounds_are_enforced() {
    let repeated = |spec: Option<Atom>| {
      let mut elements = vec![SExpression::with_str_head("Blank")];
      if let Some(spec) = spec {
        elements.push(spec);
      }
      f(vec![SExpression::new(Symbol::from_static_str("Repeated"), elements)])
    };

    assert!(matches(&repeated(None), &f(vec![int(1), int(2)])).is_some());
    assert!(matches(&repeated(None), &SExpression::with_str_head("f")).is_none());

    let bounded = repeated(Some(SExpression::list(vec![int(2), int(3)])));
    assert!(matches(&bounded, &f(vec![int(1)])).is_none());
    assert!(matches(&bounded, &f(vec![int(1), int(2)])).is_some());
    assert!(matches(&bounded, &f(vec![int(1), int(2), int(3), int(4)])).is_none());
  }

  #[test]
  fn repeated_named_pattern_requires_identical_items() {
    // f[Repeated[x_]]: every item must bind the same x.
    let repeated = f(vec![SExpression::new(
      Symbol::from_static_str("Repeated"),
      vec![SExpression::variable("x")]
    )]);
    assert!(matches(&repeated, &f(vec![int(4), int(4)])).is_some());
    assert!(matches(&repeated, &f(vec![int(4), int(5)])).is_none());
  }

  #[test]
  fn malformed_pattern_reports_and_declines() {
    // Pattern[1, Blank[]] has a non-symbol name.
    let malformed = SExpression::from_parts(vec![
      Symbol::from_static_str("Pattern"),
      int(1),
      SExpression::with_str_head("Blank")
    ]);
    let mut evaluation = evaluation();
    let result = match_pattern(&malformed, &int(1), &mut evaluation).unwrap();
    assert!(result.is_none());
    assert!(evaluation.has_message("Pattern", "patvar"));
  }

  #[test]
  fn heads_can_be_patterns() {
    // h_[x_] against g[5] binds h → g, x → 5.
    let pattern = SExpression::new(
      SExpression::from_parts(vec![
        Symbol::from_static_str("Pattern"),
        Symbol::from_static_str("h"),
        SExpression::with_str_head("Blank")
      ]),
      vec![SExpression::variable("x")]
    );
    let ground = SExpression::new(Symbol::from_static_str("g"), vec![int(5)]);
    let solutions = matches(&pattern, &ground).unwrap();
    assert!(solutions[&interned_static("h")].sameQ(&Symbol::from_static_str("g")));
    assert!(solutions[&interned_static("x")].sameQ(&int(5)));
  }
}
