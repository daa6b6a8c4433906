//! # Evolu - Byte-coded Rule Languages
//!
//! Tiny user-extensible languages for genetic programming. Candidate
//! programs are short byte arrays that get mutated and recompiled over and
//! over, so compilation never rejects input: every byte array decodes to
//! some rule set.
//!
//! ## Core Components
//!
//! - **Language**: ordered command/condition table, opcode = table index
//! - **Registry**: caller-owned table of languages, compiles program text
//! - **Code**: compiled program; reactive condition → action engine
//! - **Standard packs**: counters and input/output signals
//!
//! ## Design Principles
//!
//! - **Total decoding**: opcodes and parameters wrap, nothing is rejected
//! - **One step per call**: activation changes apply on the next `run()`
//! - **No globals**: languages live in a registry owned by the host
//!
//! ## Example
//!
//! ```ignore
//! use evolu::{CommandDef, Registry};
//!
//! let mut registry = Registry::new();
//! registry.add("LNG", |lang| {
//!     lang.define_condition("if_ready", CommandDef::new())
//!         .define_command("say", CommandDef::runnable(|code, _| code.fire("said", &[])));
//! });
//!
//! let mut code = registry.compile("EVOLU:LNG:\u{1}\u{2}")?;
//! code.on("if_ready", None);
//! code.run();
//! ```

// Evolu VM - languages, genome codec and rule engine
pub mod vm;
pub use vm::{
    // Definitions
    CommandDef, Language, Param, Registry,
    // Runtime
    Arg, Code, Line, LineSpec, Rule, RuleId,
    // Genome format
    decode, load_from_file, save_to_file, Envelope,
    // Standard packs
    extensions,
};

// Error types
mod error;
pub use error::{EvoluError, Result};
