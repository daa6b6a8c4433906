//! Standard Command Packs
//!
//! Packs are plain `FnOnce(&mut Language)` values applied with
//! [`Language::add`](crate::vm::Language::add). Each one only uses the public
//! command/condition registration interface.
//!
//! ## Standard Packs
//!
//! | Pack                | Commands                                   | Events           |
//! |---------------------|--------------------------------------------|------------------|
//! | `variables`         | `if_value_above_zero`, `var_up`, `var_down` | `value_changed`  |
//! | `input(signals)`    | `if_signal`                                | -                |
//! | `output(signals)`   | `send_signal`                              | `receive_signal` |
//!
//! Pack order matters: commands take opcode slots in the order they are added.

pub mod signals;
pub mod variables;

pub use signals::{input, output};
pub use variables::variables;
