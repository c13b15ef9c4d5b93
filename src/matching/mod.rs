/*!

# Pattern matching

The matcher is written in continuation-passing style. Matching a pattern construct against a
candidate does not return a result; instead it invokes a continuation once for every way the
construct can match, with the accumulated variable bindings in scope. A continuation returns
`Ok(true)` to accept the solution and stop the search, `Ok(false)` to reject it and ask for the
next alternative, and `Err(signal)` to abandon matching altogether (cooperative cancellation,
`Return`, a blown recursion budget). Backtracking falls out for free: when a continuation
declines, the construct undoes its bindings and tries its next alternative.

Sequence distribution lives in `sequence.rs`: how the elements of a function are divided among
`BlankSequence`, `Repeated`, `Optional`, and friends, including the subset and arrangement
enumeration demanded by `Orderless` heads and the head-wrapping demanded by `Flat` heads.
The precedence key that orders rules from most to least specific lives in `precedence.rs`.

*/

mod matcher;
mod precedence;
mod sequence;

use fnv::FnvHashMap;

use crate::{
  atom::Atom,
  evaluation::{Evaluation, Signal},
  format::{ExpressionFormatter, Formattable},
  interner::{resolve_str, InternedString},
};

pub use precedence::PatternPrecedence;
pub(crate) use matcher::{match_single, MatchInfo};

/// A map from pattern-variable names to the expressions they matched.
pub type SolutionSet = FnvHashMap<InternedString, Atom>;


/// Matches `pattern` against `ground`, giving the bindings of the first solution found, or
/// `None` if the pattern does not match.
pub fn match_pattern(
  pattern: &Atom,
  ground: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<SolutionSet>, Signal> {
  let mut bindings = SolutionSet::default();
  let mut solution: Option<SolutionSet> = None;

  match_single(
    pattern,
    ground,
    &mut bindings,
    &MatchInfo::default(),
    evaluation,
    &mut |bindings, _evaluation| {
      solution = Some(bindings.clone());
      Ok(true)
    },
  )?;

  Ok(solution)
}


/// Renders a solution set as, e.g., `{x → a, y → Sequence[b, c]}` for diagnostics.
pub fn display_solutions(solutions: &SolutionSet) -> String {
  let mut items: Vec<String> =
      solutions.iter()
               .map(|(name, value)| {
                 format!(
                   "{} → {}",
                   resolve_str(*name),
                   value.format(&ExpressionFormatter::default())
                 )
               })
               .collect();
  items.sort();
  format!("{{{}}}", items.join(", "))
}
