/*!

The attributes of a symbol, e.g. `Flat`, `Listable`, ….

Attributes are implemented as a bitfield.

*/
#![allow(dead_code)]

use std::{
  ops::{Add, Index}
};
use std::iter::Sum;


use strum_macros::{Display, IntoStaticStr, EnumString, EnumIter};

#[derive(Copy, Clone, PartialEq, Eq, Display, IntoStaticStr, Debug, EnumString, EnumIter)]
#[repr(u32)]
pub enum Attribute {
  /// Nested occurrences of the function are flattened out: `f[f[x], y] == f[x, y]`.
  Flat = 0,
  /// Elements are kept sorted in canonical order: `f[b, a] == f[a, b]`.
  Orderless,
  /// The function should automatically be threaded over lists: `f[{a, b, c}] == {f[a], f[b], f[c]}`.
  Listable,
  /// `Sequence` elements are not spliced into the function's element list.
  SequenceHold,
  /// The first element is not evaluated.
  HoldFirst,
  /// All elements but the first are not evaluated.
  HoldRest,
  /// No element is evaluated.
  HoldAll,
  /// Like `HoldAll`, and additionally `Sequence` splicing, `Evaluate`, and up-values are suppressed.
  HoldAllComplete,
  NHoldFirst,
  NHoldRest,
  NHoldAll,
  /// Definitions of the symbol cannot be changed.
  Protected,
  /// Definitions of the symbol cannot be read back.
  ReadProtected,
  /// Attributes of the symbol cannot be changed.
  Locked,
  /// The symbol stands for a constant value.
  Constant,
  /// The function takes numeric values to numeric values.
  NumericFunction,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Attributes(pub u32);

// These exist solely to be static references, which the `Index` trait insists on requiring.
static ATTRIBUTE_SET: bool = true;
static ATTRIBUTE_UNSET: bool = false;

impl Index<u32> for Attributes {
  type Output = bool;

  fn index(&self, index: u32) -> &Self::Output {
    if (self.0 & (1 << (index as u32))) != 0 {
      &ATTRIBUTE_SET
    } else {
      &ATTRIBUTE_UNSET
    }
  }
}

impl Index<Attribute> for Attributes {
  type Output = bool;

  fn index(&self, index: Attribute) -> &Self::Output {
    if (self.0 & (1 << (index as u32))) != 0 {
      &ATTRIBUTE_SET
    } else {
      &ATTRIBUTE_UNSET
    }
  }
}

impl Default for Attributes {
  fn default() -> Self {
    Attributes(0)
  }
}

impl From<Attribute> for Attributes {
  fn from(attribute: Attribute) -> Self {
    Attributes(1u32 << attribute as u32)
  }
}

impl Attributes {
  pub fn new() -> Self {
    Attributes::default()
  }

  pub fn update(&mut self, attributes: Attributes) {
    self.0 |= attributes.0;
  }

  pub fn is_empty(&self) -> bool {
    self.0 == 0
  }

  // region Convenience getters and setters

  pub fn get(&self, attribute: Attribute) -> bool {
    (self.0 & (1 << attribute as u32)) != 0
  }

  pub fn set(&mut self, attribute: Attribute) {
    self.0 = self.0 | (1 << attribute as u32)
  }

  pub fn reset(&mut self, attribute: Attribute) {
    self.0 = self.0 & !(1 << attribute as u32)
  }

  pub fn flat(&self) -> bool {
    self.get(Attribute::Flat)
  }

  pub fn orderless(&self) -> bool {
    self.get(Attribute::Orderless)
  }

  pub fn listable(&self) -> bool {
    self.get(Attribute::Listable)
  }

  pub fn sequence_hold(&self) -> bool {
    self.get(Attribute::SequenceHold)
  }

  pub fn hold_first(&self) -> bool {
    self.get(Attribute::HoldFirst)
  }

  pub fn hold_rest(&self) -> bool {
    self.get(Attribute::HoldRest)
  }

  pub fn hold_all(&self) -> bool {
    self.get(Attribute::HoldAll) || self.get(Attribute::HoldAllComplete)
  }

  pub fn hold_all_complete(&self) -> bool {
    self.get(Attribute::HoldAllComplete)
  }

  pub fn protected(&self) -> bool {
    self.get(Attribute::Protected)
  }

  pub fn read_protected(&self) -> bool {
    self.get(Attribute::ReadProtected)
  }

  pub fn locked(&self) -> bool {
    self.get(Attribute::Locked)
  }

  pub fn constant(&self) -> bool {
    self.get(Attribute::Constant)
  }

  pub fn numeric_function(&self) -> bool {
    self.get(Attribute::NumericFunction)
  }

  // endregion

}

// region Attribute addition implementations.

impl Sum<Attributes> for Attributes {
  fn sum<I: Iterator<Item=Attributes>>(iter: I) -> Self {
    let mut attributes: Attributes = Attributes::default();
    for a in iter{
      attributes.update(a);
    }
    attributes
  }
}

impl Add<Attribute> for Attributes {
  type Output = Self;

  fn add(mut self, other: Attribute) -> Self {
    self.set(other);
    self
  }
}


impl Add<Attributes> for Attribute {
  type Output = Attributes;

  fn add(self, mut other: Attributes) -> Self::Output {
    other.set(self);
    other
  }
}


impl Add<Attribute> for Attribute {
  type Output = Attributes;

  fn add(self, other: Attribute) -> Self::Output {
    let mut out: Attributes = self.into();
    out.set(other);
    out
  }
}

impl Add for Attributes {
  type Output = Self;

  fn add(mut self, other: Self) -> Self {
    self.update(other);
    self
  }
}

// endregion

#[cfg(test)]
mod tests {
  use std::str::FromStr;
  use super::*;

  #[test]
  fn attribute_index() {
    let mut attributes = Attributes::new();

    attributes.set(Attribute::Orderless);
    attributes.set(Attribute::Flat);
    attributes.set(Attribute::Listable);
    attributes.set(Attribute::Orderless);
    attributes.set(Attribute::Locked);

    assert!(attributes.orderless());
    assert!(attributes.flat());
    assert!(!attributes.hold_first());
    assert!(attributes.listable());
    assert!(!attributes.protected());
    assert!(attributes.locked());
    assert!(!attributes.sequence_hold());
  }

  #[test]
  fn unset_attribute() {
    let mut attributes = Attributes(255);

    attributes.reset(Attribute::Flat);
    attributes.reset(Attribute::Orderless);
    attributes.reset(Attribute::Listable);
    attributes.reset(Attribute::SequenceHold);
    attributes.reset(Attribute::HoldFirst);
    attributes.reset(Attribute::HoldRest);
    attributes.reset(Attribute::HoldAll);
    attributes.reset(Attribute::HoldAllComplete);

    assert!(!attributes.flat());
    assert!(!attributes.orderless());
    assert!(!attributes.listable());
    assert!(!attributes.sequence_hold());
    assert!(!attributes.hold_first());
    assert!(!attributes.hold_rest());
    assert!(!attributes.hold_all());
    assert!(!attributes.hold_all_complete());
  }

  #[test]
  fn hold_all_complete_implies_hold_all() {
    let attributes: Attributes = Attribute::HoldAllComplete.into();
    assert!(attributes.hold_all());
    assert!(!attributes.get(Attribute::HoldAll));
  }

  #[test]
  fn attribute_from_name() {
    assert_eq!(Attribute::from_str("Orderless"), Ok(Attribute::Orderless));
    assert_eq!(Attribute::from_str("HoldAllComplete"), Ok(Attribute::HoldAllComplete));
    assert!(Attribute::from_str("NotAnAttribute").is_err());
  }

  #[test]
  fn composition() {
    let attributes = Attribute::Flat + Attribute::Orderless + Attribute::Protected;
    assert!(attributes.flat());
    assert!(attributes.orderless());
    assert!(attributes.protected());
    assert!(!attributes.listable());
  }
}
