/*!

Built-in constants and functions.

Each submodule registers its functions with `register_builtin!`: the Rust function name doubles
as the symbol name, the pattern determines which applications reach the function, and the
attributes are installed alongside the down-value. A built-in gives `Ok(None)` to decline, which
sends the engine on to the next rule, exactly as a failed pattern match would.

*/
#![allow(non_snake_case)]

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::{Attribute, Attributes},
  context::{Context, ContextValueStore, SymbolValue},
  evaluation::{Evaluation, Signal},
  interner::{interned_static, InternedString},
  matching::SolutionSet,
};

pub(crate) mod boolean;
pub(crate) mod context;
pub(crate) mod control_flow;
pub(crate) mod expressions;
pub(crate) mod numeric;


/// Working precision of machine reals produced by arithmetic, in bits.
pub const DEFAULT_REAL_PRECISION: u32 = 53;

//                       f(substitutions, original_expression, evaluation) -> rewritten expression
pub type BuiltinFn =
    fn(&SolutionSet, &Atom, &mut Evaluation) -> Result<Option<Atom>, Signal>;


macro_rules! register_builtin {
  ($name:ident, $pattern:expr, $attributes:expr, $context:ident) => {
    register_builtin!($name => stringify!($name), $pattern, $attributes, $context)
  };
  // Several Rust functions can serve one symbol (e.g. the If arities), named explicitly.
  ($name:ident => $symbol:expr, $pattern:expr, $attributes:expr, $context:ident) => {{
    let value = crate::context::SymbolValue::BuiltIn {
      pattern: $pattern,
      condition: None,
      built_in: $name,
    };
    $context.set_down_value_attribute(
      crate::interner::interned_static($symbol),
      value,
      $attributes,
    );
  }};
}
pub(crate) use register_builtin;


// region Pattern builders

/// `Name[x_]`
pub(crate) fn unary_pattern(name: &'static str) -> Atom {
  SExpression::new(Symbol::from_static_str(name), vec![SExpression::variable("x")])
}

/// `Name[x_, y_]`
pub(crate) fn binary_pattern(name: &'static str) -> Atom {
  SExpression::new(
    Symbol::from_static_str(name),
    vec![SExpression::variable("x"), SExpression::variable("y")]
  )
}

/// `Name[ternary arguments x_, y_, z_]`
pub(crate) fn ternary_pattern(name: &'static str) -> Atom {
  SExpression::new(
    Symbol::from_static_str(name),
    vec![
      SExpression::variable("x"),
      SExpression::variable("y"),
      SExpression::variable("z")
    ]
  )
}

/// `Name[args___]`
pub(crate) fn variadic_pattern(name: &'static str) -> Atom {
  SExpression::new(
    Symbol::from_static_str(name),
    vec![SExpression::null_sequence_variable("args")]
  )
}

// endregion

// region Binding accessors

/// The value bound to `name`. The names are fixed by the registered patterns, so the lookup
/// cannot fail for a correctly registered built-in.
pub(crate) fn required(bindings: &SolutionSet, name: &'static str) -> Atom {
  bindings[&interned_static(name)].clone()
}

/// The run of values bound to a sequence variable, unwrapped.
pub(crate) fn sequence_binding(bindings: &SolutionSet, name: &'static str) -> Vec<Atom> {
  let value = required(bindings, name);
  match value.is_sequence() {
    Some(items) => items,
    None        => vec![value],
  }
}

// endregion


/// Registers every built-in function, core attribute assignment, and configuration symbol.
pub fn register_builtins(context: &mut Context) {
  register_core_attributes(context);
  register_configuration(context);

  // Evaluate outside a held position is the identity; inside one it is handled by the engine.
  let lhs = SExpression::new(
    Symbol::from_static_str("Evaluate"),
    vec![SExpression::null_sequence_variable("x")]
  );
  let rhs = Symbol::from_static_str("x");
  let definition = SExpression::new(
    Symbol::from_static_str("RuleDelayed"),
    vec![
      SExpression::new(Symbol::from_static_str("HoldPattern"), vec![lhs.clone()]),
      rhs.clone()
    ]
  );
  context.insert_rule(
    ContextValueStore::DownValues,
    interned_static("Evaluate"),
    SymbolValue::Definitions { def: definition, lhs, rhs, condition: None },
    false,
  );

  self::boolean::register_builtins(context);
  self::context::register_builtins(context);
  self::control_flow::register_builtins(context);
  self::expressions::register_builtins(context);
  self::numeric::register_builtins(context);
}


fn register_core_attributes(context: &mut Context) {
  let protected = [
    "True", "False", "Null", "$Aborted", "$Failed", "Infinity", "ComplexInfinity",
    "Indeterminate", "List", "Sequence", "Rule", "RuleDelayed", "Blank", "BlankSequence",
    "BlankNullSequence", "Pattern", "Alternatives", "Repeated", "RepeatedNull", "Except",
    "Optional", "PatternTest", "OptionsPattern", "Condition",
  ];
  for name in protected.iter() {
    context.set_attribute(crate::interner::interned(name), Attribute::Protected);
  }

  context.set_attributes(
    interned_static("Hold"),
    Attribute::HoldAll + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("HoldComplete"),
    Attribute::HoldAllComplete + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("HoldPattern"),
    Attribute::HoldAll + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("Verbatim"),
    Attribute::HoldAll + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("Unevaluated"),
    Attribute::HoldAllComplete + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("RuleDelayed"),
    Attribute::HoldRest + Attribute::SequenceHold + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("Rule"),
    Attribute::SequenceHold + Attribute::Protected,
  );
  context.set_attributes(
    interned_static("Condition"),
    Attribute::HoldAll + Attribute::Protected,
  );
}


// `$RecursionLimit` and `$IterationLimit` live in the context as ordinary own-values so that
// object-language assignments to them take effect.
fn register_configuration(context: &mut Context) {
  for (name, default) in [
    ("$RecursionLimit", crate::context::DEFAULT_RECURSION_LIMIT),
    ("$IterationLimit", crate::context::DEFAULT_ITERATION_LIMIT),
  ] {
    let lhs = Symbol::from_static_str(name);
    let rhs = Atom::Integer(rug::Integer::from(default));
    let definition = SExpression::new(
      Symbol::from_static_str("RuleDelayed"),
      vec![
        SExpression::new(Symbol::from_static_str("HoldPattern"), vec![lhs.clone()]),
        rhs.clone()
      ]
    );
    context.insert_rule(
      ContextValueStore::OwnValues,
      interned_static(name),
      SymbolValue::Definitions { def: definition, lhs, rhs, condition: None },
      false,
    );
  }
}


/// Builds the `RuleDelayed[HoldPattern[lhs], rhs]` form in which every definition is stored, and
/// the matching `SymbolValue`.
pub(crate) fn definition_value(lhs: Atom, rhs: Atom) -> SymbolValue {
  let definition = SExpression::new(
    Symbol::from_static_str("RuleDelayed"),
    vec![
      SExpression::new(Symbol::from_static_str("HoldPattern"), vec![lhs.clone()]),
      rhs.clone()
    ]
  );
  SymbolValue::Definitions { def: definition, lhs, rhs, condition: None }
}


/// Strips `HoldPattern` wrappers and trailing `Condition`s off a definition's left-hand side,
/// giving the expression whose shape determines where the rule is filed.
pub(crate) fn rule_key(lhs: &Atom) -> Atom {
  let mut key = lhs.clone();
  loop {
    if key.has_form("HoldPattern", Some(1)) || key.has_form("Condition", Some(2)) {
      key = SExpression::part(&key, 1);
      continue;
    }
    break;
  }
  key
}

/// Where a definition with this left-hand side is filed: own-values for a bare symbol,
/// down-values for `f[…]`, sub-values for `f[…][…]`.
pub(crate) fn rule_destination(lhs: &Atom) -> Option<(InternedString, ContextValueStore)> {
  let key = rule_key(lhs);
  match &key {
    Atom::Symbol(name) => Some((*name, ContextValueStore::OwnValues)),

    Atom::SExpression(_) => {
      let store = match key.head() {
        Atom::Symbol(_)      => ContextValueStore::DownValues,
        Atom::SExpression(_) => ContextValueStore::SubValues,
        _                    => return None,
      };
      key.lookup_name().map(|name| (name, store))
    }

    _ => None,
  }
}
