#![allow(dead_code)]

#[macro_use]
mod format;
mod atom;
mod attributes;
mod cache;
mod context;
mod evaluate;
mod evaluation;
mod interner;
mod matching;
mod normal_form;
pub mod logging;
mod built_ins;

pub use atom::Atom;
pub use attributes::{Attribute, Attributes};
pub use context::Context;
pub use evaluate::evaluate;
pub use evaluation::{Evaluation, Message, Signal};
pub use format::{DisplayForm, ExpressionFormatter, Formattable};
pub use interner::{interned, resolve_str, InternedString};
pub use matching::{display_solutions, match_pattern, SolutionSet};
