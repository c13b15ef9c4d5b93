/*!

Leveled, channeled message logging. Every message belongs to a `Channel` and carries a verbosity
level. A message is only emitted if the global verbosity is at least the message's level, so level 0
messages are always emitted, level 1 messages are "normal," and level 5 messages trace the matcher.

*/

use std::{
  io::{stdout, Write},
  sync::{
    atomic::{AtomicI32, Ordering},
    Mutex
  }
};

use lazy_static::lazy_static;
use strum_macros::Display;
use yansi::Paint;


#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, Hash)]
pub enum Channel {
  Critical,
  Error,
  Warning,
  Notice,
  Debug,
}

static VERBOSITY: AtomicI32 = AtomicI32::new(0);

lazy_static! {
  static ref LOG_STREAM: Mutex<std::io::Stdout> = Mutex::new(stdout());
}

pub fn set_verbosity(new_value: i32) {
  VERBOSITY.store(new_value, Ordering::Relaxed);
}

fn verbosity_is_at_least(level: i32) -> bool {
  VERBOSITY.load(Ordering::Relaxed) >= level
}

/// Only emits the message if the global verbosity level is at least `level`.
pub fn log(channel: Channel, level: i32, message: &str) {
  if !verbosity_is_at_least(level) {
    return;
  }

  let decorated = match channel {
    Channel::Critical => format!("{} {}", Paint::red("[Critical]").bold(), message),
    Channel::Error    => format!("{} {}", Paint::red("[Error]"), message),
    Channel::Warning  => format!("{} {}", Paint::yellow("[Warning]"), message),
    Channel::Notice   => format!("{} {}", Paint::green("[Notice]"), message),
    Channel::Debug    => format!("{} {}", Paint::fixed(244, "[Debug]"), message),
  };

  let mut stream = LOG_STREAM.lock().unwrap();
  let _ = stream.write(decorated.as_bytes());
  let _ = stream.write("\n".as_bytes());
}
