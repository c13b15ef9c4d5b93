/*!

A context is a namespace. A `Context` struct is a symbol table that holds the values, definitions,
and attributes for symbols within a context, together with the logical clock that orders
definition events. It is the `Context` that owns expressions related to a symbol.

Rules live in four buckets per symbol. Own-values rewrite the bare symbol, down-values rewrite
expressions having the symbol as their head, sub-values rewrite expressions whose head's head
chain bottoms out at the symbol (`f[x][y]`), and up-values rewrite expressions having the symbol
among their elements. Within a bucket, rules are kept sorted by pattern precedence so that more
specific rules are tried first; among rules of equal precedence the newest wins.

*/

use fnv::{FnvHashMap, FnvHashSet};

use crate::{
  atom::{Atom, SExpression, Symbol},
  attributes::{Attribute, Attributes},
  built_ins::{register_builtins, BuiltinFn},
  format::{ExpressionFormatter, Formattable},
  interner::{interned_static, InternedString, resolve_str},
  logging::{log, Channel},
  matching::PatternPrecedence,
};

pub const DEFAULT_RECURSION_LIMIT: u64 = 256;
pub const DEFAULT_ITERATION_LIMIT: u64 = 4096;


#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ContextValueStore {
  OwnValues,
  UpValues,
  DownValues,
  SubValues,
  FormatValues,
}


/// A `SymbolValue` is a wrapper for `RuleDelayed` used for storing the rule in a symbol table as
/// an own/up/down/sub value. The left-hand side is treated as if wrapped in `HoldPattern`; the
/// condition, when present, is the outermost `Condition` stripped off the left-hand side at
/// definition time.
#[derive(Clone, Debug)]
pub enum SymbolValue {
  Definitions {
    def: Atom,              // The original (sub)expression used to create this value.
    lhs: Atom,
    rhs: Atom,
    condition: Option<Atom>,
  },
  BuiltIn {
    pattern: Atom,
    condition: Option<Atom>,
    built_in: BuiltinFn,
  },
}

impl SymbolValue {
  /// The pattern this rule matches against, whatever the rule's provenance.
  pub fn pattern(&self) -> &Atom {
    match self {
      SymbolValue::Definitions { lhs, .. }  => lhs,
      SymbolValue::BuiltIn { pattern, .. }  => pattern,
    }
  }
}


pub struct SymbolRecord {
  pub name: InternedString,
  pub attributes: Attributes,
  /// Logical time of the last change to any definition of this symbol.
  pub changed: u64,
  /// Whether any definition of this symbol was made through the object language rather than
  /// registered by the implementation. `Return` unwinds only through user-defined symbols.
  pub user_defined: bool,

  pub own_values: Vec<SymbolValue>,
  pub up_values: Vec<SymbolValue>,
  pub down_values: Vec<SymbolValue>,
  pub sub_values: Vec<SymbolValue>,
  pub format_values: Vec<SymbolValue>,

  /// `Default[f, …]` left-hand sides paired with their values, consulted by `Optional` patterns
  /// with no explicit default.
  pub default_values: Vec<(Atom, Atom)>,
  /// Option name → default value, from `Options[f] = {…}`, consulted by `OptionsPattern[]`.
  pub options: Vec<(InternedString, Atom)>,
}

impl SymbolRecord {
  pub fn new(name: InternedString) -> SymbolRecord {
    SymbolRecord {
      name,
      attributes: Attributes::default(),
      changed: 0,
      user_defined: false,
      own_values: vec![],
      up_values: vec![],
      down_values: vec![],
      sub_values: vec![],
      format_values: vec![],
      default_values: vec![],
      options: vec![],
    }
  }

  fn values_mut(&mut self, value_store: ContextValueStore) -> &mut Vec<SymbolValue> {
    match value_store {
      ContextValueStore::OwnValues    => &mut self.own_values,
      ContextValueStore::UpValues     => &mut self.up_values,
      ContextValueStore::DownValues   => &mut self.down_values,
      ContextValueStore::SubValues    => &mut self.sub_values,
      ContextValueStore::FormatValues => &mut self.format_values,
    }
  }

  fn values(&self, value_store: ContextValueStore) -> &Vec<SymbolValue> {
    match value_store {
      ContextValueStore::OwnValues    => &self.own_values,
      ContextValueStore::UpValues     => &self.up_values,
      ContextValueStore::DownValues   => &self.down_values,
      ContextValueStore::SubValues    => &self.sub_values,
      ContextValueStore::FormatValues => &self.format_values,
    }
  }
}


pub struct Context {
  name: String,
  symbols: FnvHashMap<InternedString, SymbolRecord>,
  /// The logical clock. Strictly increases with every definition event.
  now: u64,
}

impl Context {

  /// An empty context with no built-ins registered. Used in tests and as a building block for
  /// `new_global_context`.
  pub fn new(name: &str) -> Context {
    Context {
      name: name.to_string(),
      symbols: FnvHashMap::default(),
      now: 1,
    }
  }

  /// The standard context: every built-in function, attribute assignment, and configuration
  /// symbol registered.
  pub fn new_global_context() -> Context {
    let mut context = Context::new("Global");
    register_builtins(&mut context);
    context
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  // region Logical clock

  pub fn now(&self) -> u64 {
    self.now
  }

  /// Records a definition event for `symbol`, advancing the logical clock.
  pub fn mark_changed(&mut self, symbol: InternedString) {
    self.now += 1;
    let now = self.now;
    self.get_symbol_mut(symbol).changed = now;
  }

  /// Whether any of `symbols` has had a definition event after logical time `time`. Symbols with
  /// no record have never changed.
  pub fn has_changed(&self, time: u64, symbols: &FnvHashSet<InternedString>) -> bool {
    symbols.iter().any(|symbol| {
      match self.symbols.get(symbol) {
        Some(record) => record.changed > time,
        None         => false,
      }
    })
  }

  // endregion

  // region Symbol records and attributes

  pub fn get_symbol(&self, symbol: InternedString) -> Option<&SymbolRecord> {
    self.symbols.get(&symbol)
  }

  pub fn get_symbol_mut(&mut self, symbol: InternedString) -> &mut SymbolRecord {
    self.symbols.entry(symbol).or_insert_with(|| SymbolRecord::new(symbol))
  }

  pub fn get_attributes(&self, symbol: InternedString) -> Attributes {
    self.symbols
        .get(&symbol)
        .map(|record| record.attributes)
        .unwrap_or_default()
  }

  pub fn set_attribute(&mut self, symbol: InternedString, attribute: Attribute) {
    self.get_symbol_mut(symbol).attributes.set(attribute);
    self.mark_changed(symbol);
  }

  pub fn set_attributes(&mut self, symbol: InternedString, attributes: Attributes) {
    self.get_symbol_mut(symbol).attributes.update(attributes);
    self.mark_changed(symbol);
  }

  pub fn reset_attribute(&mut self, symbol: InternedString, attribute: Attribute) {
    self.get_symbol_mut(symbol).attributes.reset(attribute);
    self.mark_changed(symbol);
  }

  pub fn is_user_defined(&self, symbol: InternedString) -> bool {
    self.symbols
        .get(&symbol)
        .map(|record| record.user_defined)
        .unwrap_or(false)
  }

  // endregion

  // region Rule storage

  /// A snapshot of the rules in the given bucket. The clone is cheap in practice: expressions
  /// are reference counted, and rule lists are short.
  pub fn values(&self, symbol: InternedString, value_store: ContextValueStore) -> Vec<SymbolValue> {
    self.symbols
        .get(&symbol)
        .map(|record| record.values(value_store).clone())
        .unwrap_or_default()
  }

  /// Inserts `value` into the given bucket of `tag`, keeping the bucket sorted by pattern
  /// precedence. A rule whose pattern is `SameQ` to an existing rule's pattern replaces it;
  /// among rules of equal precedence the newer rule comes first.
  pub fn insert_rule(
    &mut self,
    value_store: ContextValueStore,
    tag: InternedString,
    value: SymbolValue,
    user_defined: bool,
  ) {
    log(
      Channel::Debug,
      4,
      format!(
        "Inserting {:?} for {}: {}",
        value_store,
        resolve_str(tag),
        value.pattern().format(&ExpressionFormatter::default())
      ).as_str()
    );

    let precedence = PatternPrecedence::of(value.pattern());
    let record = self.get_symbol_mut(tag);
    record.user_defined |= user_defined;

    let values = record.values_mut(value_store);
    values.retain(|existing| !existing.pattern().sameQ(value.pattern()));
    let position = values.iter()
                         .position(|existing| PatternPrecedence::of(existing.pattern()) >= precedence)
                         .unwrap_or(values.len());
    values.insert(position, value);

    self.mark_changed(tag);
  }

  /// Registration entry point used by the built-in modules: a down-value rule plus attributes,
  /// not marked user defined.
  pub fn set_down_value_attribute(
    &mut self,
    symbol: InternedString,
    value: SymbolValue,
    attributes: Attributes,
  ) {
    self.insert_rule(ContextValueStore::DownValues, symbol, value, false);
    self.get_symbol_mut(symbol).attributes.update(attributes);
  }

  /// Removes the definitions of `symbol`; with `also_attributes`, the attributes as well.
  pub fn clear_symbol(&mut self, symbol: InternedString, also_attributes: bool) {
    {
      let record = self.get_symbol_mut(symbol);
      record.own_values.clear();
      record.up_values.clear();
      record.down_values.clear();
      record.sub_values.clear();
      record.format_values.clear();
      record.default_values.clear();
      record.options.clear();
      if also_attributes {
        record.attributes = Attributes::default();
      }
    }
    self.mark_changed(symbol);
  }

  // endregion

  // region Default values and options

  /// Stores `Default[…] = value`, where `lhs` is the complete `Default[…]` expression.
  pub fn set_default_value(&mut self, symbol: InternedString, lhs: Atom, value: Atom) {
    {
      let record = self.get_symbol_mut(symbol);
      record.default_values.retain(|(existing, _)| !existing.sameQ(&lhs));
      record.default_values.push((lhs, value));
    }
    self.mark_changed(symbol);
  }

  /// The default value for element `position` (1-based) of `count` in a call to `symbol`,
  /// looked up most specific first: `Default[f, k, n]`, then `Default[f, k]`, then `Default[f]`.
  pub fn get_default_value(
    &self,
    symbol: InternedString,
    position: usize,
    count: usize,
  ) -> Option<Atom> {
    let record = self.symbols.get(&symbol)?;
    let head = Symbol::from_static_str("Default");
    let position_atom = Atom::Integer(rug::Integer::from(position));
    let count_atom = Atom::Integer(rug::Integer::from(count));

    let candidates = [
      SExpression::new(head.clone(), vec![Atom::Symbol(symbol), position_atom.clone(), count_atom]),
      SExpression::new(head.clone(), vec![Atom::Symbol(symbol), position_atom]),
      SExpression::new(head, vec![Atom::Symbol(symbol)]),
    ];

    for candidate in candidates.iter() {
      for (lhs, value) in record.default_values.iter() {
        if lhs.sameQ(candidate) {
          return Some(value.clone());
        }
      }
    }
    None
  }

  pub fn set_options(&mut self, symbol: InternedString, options: Vec<(InternedString, Atom)>) {
    self.get_symbol_mut(symbol).options = options;
    self.mark_changed(symbol);
  }

  pub fn get_options(&self, symbol: InternedString) -> Vec<(InternedString, Atom)> {
    self.symbols
        .get(&symbol)
        .map(|record| record.options.clone())
        .unwrap_or_default()
  }

  // endregion

  // region Configuration symbols

  /// `$RecursionLimit`: `None` means unlimited.
  pub fn recursion_limit(&self) -> Option<u64> {
    self.config_value(interned_static("$RecursionLimit"), DEFAULT_RECURSION_LIMIT)
  }

  /// `$IterationLimit`: `None` means unlimited.
  pub fn iteration_limit(&self) -> Option<u64> {
    self.config_value(interned_static("$IterationLimit"), DEFAULT_ITERATION_LIMIT)
  }

  /// Reads a configuration symbol from its own-values: an integer own-value is the limit, the
  /// symbol `Infinity` lifts the limit, and an absent definition falls back to `default`.
  fn config_value(&self, symbol: InternedString, default: u64) -> Option<u64> {
    if let Some(record) = self.symbols.get(&symbol) {
      for value in record.own_values.iter() {
        if let SymbolValue::Definitions { rhs, .. } = value {
          match rhs {
            Atom::Integer(n) => {
              return Some(n.to_u64().unwrap_or(default));
            }
            Atom::Symbol(name) if *name == interned_static("Infinity") => {
              return None;
            }
            _ => {}
          }
        }
      }
    }
    Some(default)
  }

  // endregion
}
