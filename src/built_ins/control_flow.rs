/*!

Program control flow: expression sequencing, branching, non-local exit, and deadlines.

`TimeConstrained` installs a scoped stop flag and a watchdog thread holding a clone of it. The
engine polls the flag at its loop heads, so an expired deadline unwinds the evaluation as a
`Stopped` signal without any mid-expression thread cancellation.

*/
#![allow(non_snake_case)]

use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    mpsc,
    Arc,
  },
  thread,
  time::Duration,
};

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::Attribute,
  context::Context,
  evaluate::evaluate_signal,
  evaluation::{Evaluation, Signal},
  format::{ExpressionFormatter, Formattable},
  logging::{log, Channel},
  matching::{display_solutions, SolutionSet},
};

use super::{
  binary_pattern, register_builtin, required, sequence_binding, ternary_pattern, variadic_pattern,
};


/// Implements calls matching `CompoundExpression[args___]`: evaluate each expression in turn and
/// give the value of the last one.
pub(crate) fn CompoundExpression(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  log(
    Channel::Debug,
    4,
    format!(
      "CompoundExpression called with arguments {}",
      display_solutions(arguments)
    ).as_str()
  );

  let mut result = Symbol::from_static_str("Null");
  for item in sequence_binding(arguments, "args").into_iter() {
    result = evaluate_signal(item, evaluation)?;
  }
  Ok(Some(result))
}


// The shared body of the If forms. The chosen branch is given back unevaluated; the engine's
// fixed-point loop evaluates it, so `If` itself never grows the recursion depth.
fn branch(condition: &Atom, then: Atom, otherwise: Option<Atom>, fallback: Option<Atom>) -> Option<Atom> {
  if condition.is_true() {
    return Some(then);
  }
  if condition.sameQ(&Symbol::from_static_str("False")) {
    return Some(otherwise.unwrap_or_else(|| Symbol::from_static_str("Null")));
  }
  fallback
}

/// Implements calls matching `If[x_, y_]`.
pub(crate) fn If2(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let condition = required(arguments, "x");
  Ok(branch(&condition, required(arguments, "y"), None, None))
}

/// Implements calls matching `If[x_, y_, z_]`.
pub(crate) fn If3(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let condition = required(arguments, "x");
  Ok(branch(
    &condition,
    required(arguments, "y"),
    Some(required(arguments, "z")),
    None,
  ))
}

/// Implements calls matching `If[x_, y_, z_, u_]`: the fourth argument is the value when the
/// condition is neither `True` nor `False`.
pub(crate) fn If4(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let condition = required(arguments, "x");
  Ok(branch(
    &condition,
    required(arguments, "y"),
    Some(required(arguments, "z")),
    Some(required(arguments, "u")),
  ))
}


/// Implements calls matching `Return[args___]`: raises the `Return` signal, which unwinds to the
/// nearest enclosing user-defined rule application.
pub(crate) fn Return(
  arguments: &SolutionSet,
  _original: &Atom,
  _evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let mut items = sequence_binding(arguments, "args");
  let value = if items.is_empty() {
    Symbol::from_static_str("Null")
  } else {
    items.swap_remove(0)
  };
  Err(Signal::Return(value))
}


fn deadline_seconds(limit: &Atom) -> Option<f64> {
  let seconds = match limit {
    Atom::Integer(n)  => n.to_f64(),
    Atom::Rational(q) => q.to_f64(),
    Atom::Real(r)     => r.to_f64(),
    _                 => return None,
  };
  if seconds.is_finite() && seconds > 0.0 {
    Some(seconds)
  } else {
    None
  }
}

// The shared body of the TimeConstrained forms.
fn time_constrained(
  expression: Atom,
  limit: Atom,
  failure: Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let seconds = match deadline_seconds(&limit) {
    Some(seconds) => seconds,
    None => {
      evaluation.message(
        "TimeConstrained",
        "timc",
        format!(
          "Number of seconds {} is not a positive number.",
          limit.format(&ExpressionFormatter::default())
        ),
      );
      return Ok(None);
    }
  };

  let flag = Arc::new(AtomicBool::new(false));
  let previous = evaluation.swap_stop_flag(flag.clone());

  // The watchdog raises the flag when the deadline passes; the channel lets a finished
  // evaluation release it early.
  let (sender, receiver) = mpsc::channel::<()>();
  let watchdog_flag = flag.clone();
  let watchdog = thread::spawn(move || {
    if receiver.recv_timeout(Duration::from_secs_f64(seconds)).is_err() {
      watchdog_flag.store(true, Ordering::Relaxed);
    }
  });

  let result = evaluate_signal(expression, evaluation);

  let _ = sender.send(());
  let _ = watchdog.join();
  evaluation.swap_stop_flag(previous);

  match result {
    Ok(value) => Ok(Some(value)),

    Err(Signal::Stopped) if flag.load(Ordering::Relaxed) => Ok(Some(failure)),

    Err(signal) => Err(signal),
  }
}

/// Implements calls matching `TimeConstrained[x_, y_]`.
pub(crate) fn TimeConstrained2(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  time_constrained(
    required(arguments, "x"),
    required(arguments, "y"),
    Symbol::from_static_str("$Aborted"),
    evaluation,
  )
}

/// Implements calls matching `TimeConstrained[x_, y_, z_]`: the third argument is the value when
/// the deadline expires.
pub(crate) fn TimeConstrained3(
  arguments: &SolutionSet,
  _original: &Atom,
  evaluation: &mut Evaluation,
) -> Result<Option<Atom>, Signal> {
  let failure = required(arguments, "z");
  time_constrained(
    required(arguments, "x"),
    required(arguments, "y"),
    failure,
    evaluation,
  )
}


pub(crate) fn register_builtins(context: &mut Context) {
  register_builtin!(
    CompoundExpression,
    variadic_pattern("CompoundExpression"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );

  // The If arities share one symbol; the pattern decides which body runs.
  register_builtin!(
    If2 => "If",
    binary_pattern("If"),
    Attribute::HoldRest + Attribute::Protected,
    context
  );
  register_builtin!(
    If3 => "If",
    ternary_pattern("If"),
    Attribute::HoldRest + Attribute::Protected,
    context
  );
  let if4_pattern = SExpression::new(
    Symbol::from_static_str("If"),
    vec![
      SExpression::variable("x"),
      SExpression::variable("y"),
      SExpression::variable("z"),
      SExpression::variable("u"),
    ]
  );
  register_builtin!(
    If4 => "If",
    if4_pattern,
    Attribute::HoldRest + Attribute::Protected,
    context
  );

  register_builtin!(Return, variadic_pattern("Return"), Attribute::Protected.into(), context);

  register_builtin!(
    TimeConstrained2 => "TimeConstrained",
    binary_pattern("TimeConstrained"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
  register_builtin!(
    TimeConstrained3 => "TimeConstrained",
    ternary_pattern("TimeConstrained"),
    Attribute::HoldAll + Attribute::Protected,
    context
  );
}
