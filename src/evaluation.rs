/*!

The mutable state of an evaluation session: the rule database, the recursion budget, the
cooperative stop flag, and the diagnostic messages collected along the way.

Engine-internal non-local exits travel as `Signal` values through `Result`. A signal is not an
error in the host-language sense: `Return` unwinds to the nearest user-defined rule application,
the limit signals unwind to the public entry point where they resolve to `$Aborted`, and
`Stopped` unwinds to whoever installed the current stop flag.

*/

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc
};

use crate::{
  atom::Atom,
  context::Context,
  logging::{log, Channel},
};


#[derive(Clone, Debug)]
pub enum Signal {
  /// Non-local exit raised by `Return[…]`, carrying the return value.
  Return(Atom),
  /// The recursion-depth limit `$RecursionLimit` was exceeded.
  RecursionLimit,
  /// The cooperative stop flag was raised: a timeout expired or an external abort was requested.
  Stopped,
}


/// A diagnostic message in the `symbol::tag` style, e.g. `Thread::tdlen`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
  pub symbol: String,
  pub tag: &'static str,
  pub text: String,
}


pub struct Evaluation {
  pub context: Context,
  recursion_depth: u64,
  stopped: Arc<AtomicBool>,
  pub messages: Vec<Message>,
}

impl Evaluation {

  /// An evaluation session over the standard global context.
  pub fn new() -> Evaluation {
    Evaluation::with_context(Context::new_global_context())
  }

  pub fn with_context(context: Context) -> Evaluation {
    Evaluation {
      context,
      recursion_depth: 0,
      stopped: Arc::new(AtomicBool::new(false)),
      messages: vec![],
    }
  }

  // region Messages

  pub fn message(&mut self, symbol: &str, tag: &'static str, text: String) {
    log(
      Channel::Warning,
      1,
      format!("{}::{}: {}", symbol, tag, text).as_str()
    );
    self.messages.push(Message {
      symbol: symbol.to_string(),
      tag,
      text,
    });
  }

  pub fn has_message(&self, symbol: &str, tag: &str) -> bool {
    self.messages
        .iter()
        .any(|message| message.symbol == symbol && message.tag == tag)
  }

  pub fn clear_messages(&mut self) {
    self.messages.clear();
  }

  // endregion

  // region Cooperative cancellation

  /// The stop flag currently in force. A watchdog holding a clone of this flag can stop the
  /// evaluation from another thread; the engine polls it at loop heads.
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stopped.clone()
  }

  /// Installs a fresh stop flag, returning the one previously in force. `TimeConstrained` scopes
  /// its deadline this way so that an inner timeout cannot stop an outer computation.
  pub fn swap_stop_flag(&mut self, flag: Arc<AtomicBool>) -> Arc<AtomicBool> {
    std::mem::replace(&mut self.stopped, flag)
  }

  pub fn check_stopped(&self) -> Result<(), Signal> {
    if self.stopped.load(Ordering::Relaxed) {
      Err(Signal::Stopped)
    } else {
      Ok(())
    }
  }

  // endregion

  // region Recursion budget

  pub fn recursion_depth(&self) -> u64 {
    self.recursion_depth
  }

  pub fn inc_recursion_depth(&mut self) -> Result<(), Signal> {
    self.recursion_depth += 1;
    if let Some(limit) = self.context.recursion_limit() {
      if self.recursion_depth > limit {
        return Err(Signal::RecursionLimit);
      }
    }
    self.check_stopped()
  }

  pub fn dec_recursion_depth(&mut self) {
    self.recursion_depth = self.recursion_depth.saturating_sub(1);
  }

  /// Unwinding from a limit signal leaves the counted frames behind; the public entry point
  /// resets the budget before returning control.
  pub fn reset_recursion_depth(&mut self) {
    self.recursion_depth = 0;
  }

  // endregion
}

impl Default for Evaluation {
  fn default() -> Self {
    Evaluation::new()
  }
}
