//! Variables pack
//!
//! Per-program counters addressed by line parameter.
//!
//! | Command               | Kind      | Effect                                  |
//! |-----------------------|-----------|-----------------------------------------|
//! | `if_value_above_zero` | condition | met while the counter is positive       |
//! | `var_up`              | command   | counter += 1, fires `value_changed`     |
//! | `var_down`            | command   | counter -= 1, fires `value_changed`     |
//!
//! `value_changed` carries `(name, new_value, delta)`. The condition is
//! switched on when a counter steps 0 → 1 and off when it steps 1 → 0.

use crate::vm::{Arg, Code, CommandDef, Language, Param};
use std::collections::HashMap;

pub const IF_VALUE_ABOVE_ZERO: &str = "if_value_above_zero";
pub const VAR_UP: &str = "var_up";
pub const VAR_DOWN: &str = "var_down";

/// Event fired on every counter change.
pub const VALUE_CHANGED: &str = "value_changed";

/// Counter table stored in the program's pack state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<Param, i64>,
}

impl Variables {
    pub fn get(&self, name: &Param) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add `delta` and return the new value. Unknown counters start at 0.
    fn step(&mut self, name: &Param, delta: i64) -> i64 {
        let value = self.values.entry(name.clone()).or_insert(0);
        *value += delta;
        *value
    }
}

/// Current value of counter `name` in `code`.
pub fn value(code: &Code, name: &Param) -> Option<i64> {
    code.state::<Variables>()?.get(name)
}

/// Add the whole pack: condition first, then `var_up`, then `var_down`.
pub fn variables(lang: &mut Language) {
    lang.add(above_zero).add(increase).add(decrease);
}

/// `if_value_above_zero` condition.
pub fn above_zero(lang: &mut Language) {
    lang.define_condition(
        IF_VALUE_ABOVE_ZERO,
        CommandDef::new().on_install(|code| {
            code.listen(VALUE_CHANGED, |code, args| {
                let (Some(name), Some(value), Some(delta)) = (
                    args.first().and_then(Arg::as_param),
                    args.get(1).and_then(Arg::as_int),
                    args.get(2).and_then(Arg::as_int),
                ) else {
                    return;
                };
                match (value, delta) {
                    (0, -1) => {
                        code.off(IF_VALUE_ABOVE_ZERO, Some(name));
                    }
                    (1, 1) => {
                        code.on(IF_VALUE_ABOVE_ZERO, Some(name));
                    }
                    _ => {}
                }
            });
        }),
    );
}

/// `var_up` command.
pub fn increase(lang: &mut Language) {
    lang.define_command(VAR_UP, counter(1));
}

/// `var_down` command.
pub fn decrease(lang: &mut Language) {
    lang.define_command(VAR_DOWN, counter(-1));
}

fn counter(delta: i64) -> CommandDef {
    CommandDef::new()
        .on_install(install)
        .on_init(|code, _, name| {
            if let Some(name) = name {
                if let Some(vars) = code.state_mut::<Variables>() {
                    vars.values.insert(name.clone(), 0);
                }
            }
        })
        .on_run(move |code, name| {
            let Some(name) = name else {
                return;
            };
            let Some(vars) = code.state_mut::<Variables>() else {
                return;
            };
            let value = vars.step(name, delta);
            code.fire(
                VALUE_CHANGED,
                &[Arg::Param(name.clone()), Arg::Int(value), Arg::Int(delta)],
            );
        })
}

fn install(code: &mut Code) {
    if code.state::<Variables>().is_none() {
        code.insert_state(Variables::default());
    }
}
