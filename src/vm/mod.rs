//! Evolu VM - Byte-coded Rule Programs
//!
//! A language is an ordered table of user-defined commands and conditions.
//! Any byte array compiles against it into a set of rules; rules run when
//! all of their conditions hold.
//!
//! ## Genome
//!
//! ```text
//! 0xxxxxxx       opcode, selects commands[x % len]   (0 = separator, ends a rule)
//! 1ppppppp ...   base-128 parameter of the preceding opcode
//! ```
//!
//! ## Program text
//!
//! ```text
//! EVOLU:<language>:<genome bytes as characters 0-255>
//! ```
//!
//! ## Engine
//!
//! ```text
//! compile   → rules, condition index (via condition init hooks)
//! on / off  → readiness counters → staged activation changes
//! run       → apply staged changes → execute active rules (ascending id)
//! init      → execute rules without conditions, once
//! signal    → on, run, off for exactly one pass
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let mut registry = Registry::new();
//! registry.add("ODD-EVEN", |lang| {
//!     lang.add(extensions::input(["tick", "result"]))
//!         .add(extensions::output(["odd", "even"]))
//!         .add(extensions::variables);
//! });
//!
//! let mut code = registry.compile(program)?;
//! code.listen("receive_signal", |_, args| println!("{}", args[0]));
//! code.init();
//! code.signal("if_signal", &"tick".into());
//! ```

mod binary;
mod code;
mod command;
mod events;
pub mod extensions;
mod language;
mod registry;
mod rule;

pub use binary::{decode, encode_opcode, encode_param, load_from_file, save_to_file, Envelope};
pub use code::{Code, ConditionKey, LineSpec};
pub use command::{CommandDef, InitHook, InstallHook, Line, Param, RunHook};
pub use events::{Arg, EventBus, Listener};
pub use language::Language;
pub use registry::Registry;
pub use rule::{Rule, RuleId, Transition};

/// Mark at the start of every program envelope
pub const ENVELOPE_MAGIC: &str = "EVOLU";

/// Separates envelope fields
pub const ENVELOPE_SEPARATOR: char = ':';

/// Name of the built-in command in opcode slot 0
pub const SEPARATOR_NAME: &str = "separator";

/// High bit marks a parameter byte
pub const PARAM_FLAG: u8 = 0x80;
