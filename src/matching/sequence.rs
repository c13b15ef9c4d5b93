/*!

Sequence distribution: dividing the elements of a function among the patterns in its argument
list. Each pattern claims a run of consecutive elements (shortest runs first, so `x__` binds as
little as it can get away with), the run is wrapped according to its length and the head's
attributes, and the remaining patterns recurse on the remaining elements. Under an `Orderless`
head the runs are drawn from arbitrary arrangements of the elements rather than consecutive
slices; the arrangements are enumerated lazily, identity first, so the common case never pays
for the combinatorics.

*/

use crate::{
  atom::{Atom, SExpression},
  evaluation::Evaluation,
};

use super::{
  matcher::{match_single, Continuation, MatchInfo, MatchResult},
  SolutionSet,
};


/// Matches the pattern list `patterns` against the element list `elements` of an expression with
/// the given `head`. `position` is the 1-based argument position of `patterns[0]` and `total` the
/// full argument count, which `Default` lookups for `Optional` patterns need.
pub(crate) fn match_sequence(
  patterns: &[Atom],
  elements: &[Atom],
  head: &Atom,
  flat: bool,
  orderless: bool,
  position: usize,
  total: usize,
  bindings: &mut SolutionSet,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  evaluation.check_stopped()?;

  if patterns.is_empty() {
    return if elements.is_empty() {
      then(bindings, evaluation)
    } else {
      Ok(false)
    };
  }

  let pattern = &patterns[0];
  let rest_patterns = &patterns[1..];
  let (minimum, maximum) = arity(pattern, flat);

  // Budget: the remaining patterns constrain how few and how many elements this one may take.
  let rest_minimum: usize = rest_patterns.iter().map(|p| arity(p, flat).0).sum();
  let rest_maximum: Option<usize> =
      rest_patterns.iter()
                   .try_fold(0usize, |sum, p| arity(p, flat).1.map(|m| sum + m));

  if elements.len() < minimum + rest_minimum {
    return Ok(false);
  }
  let available = elements.len() - rest_minimum;
  let upper = maximum.map_or(available, |m| m.min(available));
  let lower = match rest_maximum {
    Some(m) if elements.len() > m => (elements.len() - m).max(minimum),
    _                             => minimum,
  };

  for n in lower..=upper {
    if n == 0 && pattern.has_form("Optional", None) && pattern.len() >= 1 {
      let stopped = try_optional_default(
        pattern, elements, rest_patterns, head, flat, orderless, position, total,
        bindings, evaluation, then,
      )?;
      if stopped {
        return Ok(true);
      }
      continue;
    }

    if orderless && n > 0 {
      let mut chosen: Vec<usize> = Vec::with_capacity(n);
      let mut used = vec![false; elements.len()];
      let stopped = select_arrangement(
        elements,
        &mut chosen,
        &mut used,
        n,
        bindings,
        evaluation,
        &mut |run, rest, bindings, evaluation| {
          try_run(
            pattern, run, rest, rest_patterns, head, flat, orderless, position, total,
            bindings, evaluation, then,
          )
        },
      )?;
      if stopped {
        return Ok(true);
      }
    } else {
      let stopped = try_run(
        pattern, &elements[..n], &elements[n..], rest_patterns, head, flat, orderless,
        position, total, bindings, evaluation, then,
      )?;
      if stopped {
        return Ok(true);
      }
    }
  }

  Ok(false)
}


// Wraps the run, matches the pattern against the wrapped candidate, and recurses on the rest.
fn try_run(
  pattern: &Atom,
  run: &[Atom],
  rest_elements: &[Atom],
  rest_patterns: &[Atom],
  head: &Atom,
  flat: bool,
  orderless: bool,
  position: usize,
  total: usize,
  bindings: &mut SolutionSet,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let info = MatchInfo { head: Some(head.clone()) };
  for candidate in wrappings(pattern, run, head, flat).into_iter() {
    let stopped = match_single(
      pattern,
      &candidate,
      bindings,
      &info,
      evaluation,
      &mut |bindings, evaluation| {
        match_sequence(
          rest_patterns, rest_elements, head, flat, orderless, position + 1, total,
          bindings, evaluation, then,
        )
      },
    )?;
    if stopped {
      return Ok(true);
    }
  }
  Ok(false)
}


// An absent `Optional` argument matches its default: the explicit one if the pattern carries it,
// otherwise the `Default` value registered for the head at this argument position.
fn try_optional_default(
  pattern: &Atom,
  elements: &[Atom],
  rest_patterns: &[Atom],
  head: &Atom,
  flat: bool,
  orderless: bool,
  position: usize,
  total: usize,
  bindings: &mut SolutionSet,
  evaluation: &mut Evaluation,
  then: Continuation,
) -> MatchResult {
  let parts = SExpression::parts(pattern);
  let inner = parts[1].clone();

  let default: Option<Atom> = if pattern.len() == 2 {
    Some(parts[2].clone())
  } else {
    head.lookup_name()
        .and_then(|name| evaluation.context.get_default_value(name, position, total))
  };
  let default = match default {
    Some(default) => default,
    None          => return Ok(false),
  };

  let info = MatchInfo { head: Some(head.clone()) };
  match_single(&inner, &default, bindings, &info, evaluation, &mut |bindings, evaluation| {
    match_sequence(
      rest_patterns, elements, head, flat, orderless, position + 1, total,
      bindings, evaluation, then,
    )
  })
}


// Enumerates ordered selections of `n` distinct elements, invoking `visit` with the selected run
// and the remaining elements. Selection indices ascend in the first solution, so the identity
// arrangement is tried before any permutation.
fn select_arrangement(
  elements: &[Atom],
  chosen: &mut Vec<usize>,
  used: &mut Vec<bool>,
  n: usize,
  bindings: &mut SolutionSet,
  evaluation: &mut Evaluation,
  visit: &mut dyn FnMut(&[Atom], &[Atom], &mut SolutionSet, &mut Evaluation) -> MatchResult,
) -> MatchResult {
  if chosen.len() == n {
    let run: Vec<Atom> = chosen.iter().map(|&index| elements[index].clone()).collect();
    let rest: Vec<Atom> = (0..elements.len())
        .filter(|&index| !used[index])
        .map(|index| elements[index].clone())
        .collect();
    return visit(&run, &rest, bindings, evaluation);
  }

  for index in 0..elements.len() {
    if used[index] {
      continue;
    }
    evaluation.check_stopped()?;
    used[index] = true;
    chosen.push(index);
    let result = select_arrangement(elements, chosen, used, n, bindings, evaluation, visit);
    chosen.pop();
    used[index] = false;
    if result? {
      return Ok(true);
    }
  }
  Ok(false)
}


/// How many elements the pattern can consume: a minimum and an optional maximum (`None` means
/// unbounded). Under a `Flat` head a plain blank can absorb any number of elements, which the
/// matcher then wraps back in the head.
pub(crate) fn arity(pattern: &Atom, flat: bool) -> (usize, Option<usize>) {
  let length = pattern.len();

  if pattern.has_form("Blank", None) && length <= 1 {
    return (1, if flat { None } else { Some(1) });
  }
  if pattern.has_form("BlankSequence", None) && length <= 1 {
    return (1, None);
  }
  if pattern.has_form("BlankNullSequence", None) && length <= 1 {
    return (0, None);
  }

  if pattern.has_form("Pattern", Some(2)) {
    return arity(&SExpression::parts(pattern)[2], flat);
  }
  if pattern.has_form("PatternTest", Some(2))
      || pattern.has_form("Condition", Some(2))
      || pattern.has_form("HoldPattern", Some(1))
  {
    return arity(&SExpression::parts(pattern)[1], flat);
  }

  if pattern.has_form("Optional", None) && (length == 1 || length == 2) {
    let (_, maximum) = arity(&SExpression::parts(pattern)[1], flat);
    return (0, maximum);
  }

  if pattern.has_form("Alternatives", None) {
    let branches = SExpression::elements(pattern);
    if branches.is_empty() {
      return (1, Some(1));
    }
    let mut minimum = usize::MAX;
    let mut maximum = Some(0usize);
    for branch in branches.iter() {
      let (branch_minimum, branch_maximum) = arity(branch, flat);
      minimum = minimum.min(branch_minimum);
      maximum = match (maximum, branch_maximum) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _                  => None,
      };
    }
    return (minimum, maximum);
  }

  if pattern.has_form("Repeated", None) && (length == 1 || length == 2) {
    return repeated_bounds(pattern, false);
  }
  if pattern.has_form("RepeatedNull", None) && (length == 1 || length == 2) {
    return repeated_bounds(pattern, true);
  }

  if pattern.has_form("OptionsPattern", None) {
    return (0, None);
  }

  (1, Some(1))
}


/// The repetition bounds of a `Repeated`/`RepeatedNull` pattern: the bare form, `{n}`, `{m, n}`,
/// or a plain maximum `n`.
pub(crate) fn repeated_bounds(pattern: &Atom, null: bool) -> (usize, Option<usize>) {
  let base_minimum = if null { 0 } else { 1 };
  if pattern.len() != 2 {
    return (base_minimum, None);
  }

  let specification = &SExpression::parts(pattern)[2];
  match specification {
    Atom::Integer(n) => (base_minimum, n.to_usize()),

    _ if specification.has_form("List", Some(1)) => {
      match &SExpression::parts(specification)[1] {
        Atom::Integer(n) => (n.to_usize().unwrap_or(base_minimum), n.to_usize()),
        _                => (base_minimum, None),
      }
    }

    _ if specification.has_form("List", Some(2)) => {
      let parts = SExpression::parts(specification);
      match (&parts[1], &parts[2]) {
        (Atom::Integer(low), Atom::Integer(high)) => {
          (low.to_usize().unwrap_or(base_minimum), high.to_usize())
        }
        _ => (base_minimum, None),
      }
    }

    _ => (base_minimum, None),
  }
}


// The candidate expressions a run of elements presents to the pattern. A single element stands
// for itself; a longer or empty run is wrapped in `Sequence`, except that under a `Flat` head a
// blank-like pattern receives the run wrapped in the head itself.
fn wrappings(pattern: &Atom, run: &[Atom], head: &Atom, flat: bool) -> Vec<Atom> {
  match run.len() {
    1 => vec![run[0].clone()],
    0 => vec![SExpression::empty_sequence()],
    _ => {
      if flat && flat_wrappable(pattern) {
        vec![SExpression::new(head.clone(), run.to_vec())]
      } else {
        vec![SExpression::sequence(run.to_vec())]
      }
    }
  }
}

// `Flat` head-wrapping applies to a plain `Blank` and to wrappers around one, since, e.g.,
// Plus[a, b, c] /. Plus[x_, y_] should be able to bind x → a, y → Plus[b, c].
fn flat_wrappable(pattern: &Atom) -> bool {
  let length = pattern.len();

  if pattern.has_form("Blank", None) && length <= 1 {
    return true;
  }
  if pattern.has_form("Pattern", Some(2)) {
    return flat_wrappable(&SExpression::parts(pattern)[2]);
  }
  if pattern.has_form("PatternTest", Some(2))
      || pattern.has_form("Condition", Some(2))
      || pattern.has_form("HoldPattern", Some(1))
  {
    return flat_wrappable(&SExpression::parts(pattern)[1]);
  }
  if pattern.has_form("Optional", None) && (length == 1 || length == 2) {
    return flat_wrappable(&SExpression::parts(pattern)[1]);
  }
  false
}
