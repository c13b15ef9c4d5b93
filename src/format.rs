/*!

  An `ExpressionFormatter` holds information about how to express an expression as a string.
  Formatting needs to be distinct from Rust's standard `Display` trait, because expressions are
  (potentially) formatted differently depending on the context: an M-expression form for round
  tripping, a full form for diagnostics, and a matcher form that marks pattern variables so that
  match traces are legible.

*/
use std::borrow::Cow;

use strum::EnumString;


#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Hash)]
pub enum DisplayForm {
  #[strum(serialize = "InputForm")]
  Input,
  #[strum(serialize = "FullForm")]
  Full,
  #[strum(serialize = "MatcherForm")]
  Matcher,
}

impl Default for DisplayForm {
  fn default() -> DisplayForm {
    DisplayForm::Input
  }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
/// Parameters used in methods that transform expressions into strings.
pub struct ExpressionFormatter {
  pub form: DisplayForm,
}

static DEFAULT_FORMATTER: Cow<ExpressionFormatter> = Cow::Owned(ExpressionFormatter {
  form: DisplayForm::Input
});

impl ExpressionFormatter {
  pub fn default() -> Cow<'static, ExpressionFormatter> {
    DEFAULT_FORMATTER.clone()
  }
}

impl From<DisplayForm> for ExpressionFormatter {
  fn from(form: DisplayForm) -> Self {
    ExpressionFormatter {
      form
    }
  }
}

pub trait Formattable {
  fn format(&self, formatter: &ExpressionFormatter) -> String;
}


macro_rules! display_formattable_impl {
  ($type_name:ty) => {
    impl std::fmt::Display for $type_name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format(&ExpressionFormatter::default()))
      }
    }
  }
}
pub(crate) use display_formattable_impl;
