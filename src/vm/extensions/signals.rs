//! Signals pack
//!
//! Input and output channels between a program and its host.
//!
//! ```text
//! host → code.signal(IF_SIGNAL, "tick")   satisfies `if_signal tick` for one run()
//! send_signal odd → fire("receive_signal", ["odd"]) → host listener
//! ```
//!
//! Both packs take the legal signal names; raw genome parameters wrap
//! around them.

use crate::vm::{Arg, Code, CommandDef, Language, Param};

pub const IF_SIGNAL: &str = "if_signal";
pub const SEND_SIGNAL: &str = "send_signal";

/// Event fired by `send_signal` with the signal label.
pub const RECEIVE_SIGNAL: &str = "receive_signal";

/// Input pack: condition `if_signal` over `signals`.
///
/// ```ignore
/// lang.add(signals::input(["tick", "result"]));
/// code.init();
/// code.signal(signals::IF_SIGNAL, &"tick".into());
/// ```
pub fn input<I, S>(signals: I) -> impl FnOnce(&mut Language)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let labels: Vec<String> = signals.into_iter().map(Into::into).collect();
    move |lang: &mut Language| {
        lang.define_condition(IF_SIGNAL, CommandDef::new().params(labels));
    }
}

/// Output pack: command `send_signal` over `signals`.
pub fn output<I, S>(signals: I) -> impl FnOnce(&mut Language)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let labels: Vec<String> = signals.into_iter().map(Into::into).collect();
    move |lang: &mut Language| {
        lang.define_command(
            SEND_SIGNAL,
            CommandDef::new().params(labels).on_run(|code, signal| {
                if let Some(signal) = signal {
                    code.fire(RECEIVE_SIGNAL, &[Arg::Param(signal.clone())]);
                }
            }),
        );
    }
}

/// Deliver input signal `name` to `code`.
pub fn send(code: &mut Code, name: &str) {
    code.signal(IF_SIGNAL, &Param::from(name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::LineSpec;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn program() -> (Code, Rc<RefCell<String>>) {
        let mut lang = Language::new("SIGNALS");
        lang.add(input(["a", "b"])).add(output(["0", "1", "2"]));

        let mut code = Code::new(Arc::new(lang));
        let out = Rc::new(RefCell::new(String::new()));
        let sink = out.clone();
        code.listen(RECEIVE_SIGNAL, move |_, args| {
            sink.borrow_mut().push_str(&args[0].to_string())
        });
        (code, out)
    }

    #[test]
    fn test_labels_wrap() {
        let mut lang = Language::new("SIGNALS");
        lang.add(input(["a", "b"]));
        let lang = Arc::new(lang);

        let code = lang.compile(&[1, 130]);
        assert_eq!(code.rules()[0].lines()[0].param, Some(Param::from("a")));
        assert_eq!(code.conditions(IF_SIGNAL, Some(&Param::from("a"))), &[code.rules()[0].id()]);
    }

    #[test]
    fn test_signal_runs_once() {
        let (mut code, out) = program();
        code.rule([(SEND_SIGNAL, "0")]).unwrap();
        code.rule([(IF_SIGNAL, "a"), (SEND_SIGNAL, "1")]).unwrap();

        code.init();
        send(&mut code, "a");
        assert_eq!(*out.borrow(), "01");

        // Signal is gone after its pass
        code.run();
        code.run();
        assert_eq!(*out.borrow(), "01");

        send(&mut code, "b");
        send(&mut code, "a");
        assert_eq!(*out.borrow(), "011");
    }

    #[test]
    fn test_any_signal_meets_all_signal_conditions() {
        let (mut code, out) = program();
        code.rule([(SEND_SIGNAL, "0")]).unwrap();
        code.rule([(IF_SIGNAL, "a"), (SEND_SIGNAL, "1")]).unwrap();
        let both = code
            .rule([(IF_SIGNAL, "a"), (IF_SIGNAL, "b"), (SEND_SIGNAL, "2")])
            .unwrap();
        assert_eq!(code.rule_at(both).unwrap().required(), 2);

        code.init();
        send(&mut code, "a");
        send(&mut code, "b");
        assert_eq!(*out.borrow(), "0122");
        assert_eq!(code.rule_at(both).unwrap().required(), 2);
    }

    #[test]
    fn test_signal_waits_for_other_conditions() {
        let mut lang = Language::new("SIGNALS");
        lang.add(input(["a"]))
            .add(output(["x"]))
            .define_condition("if_open", CommandDef::new());
        let mut code = Code::new(Arc::new(lang));
        let out = Rc::new(RefCell::new(0));
        let sink = out.clone();
        code.listen(RECEIVE_SIGNAL, move |_, _| *sink.borrow_mut() += 1);
        code.rule([LineSpec::from("if_open"), (IF_SIGNAL, "a").into(), (SEND_SIGNAL, "x").into()])
            .unwrap();

        send(&mut code, "a");
        assert_eq!(*out.borrow(), 0);

        code.on("if_open", None);
        send(&mut code, "a");
        send(&mut code, "a");
        assert_eq!(*out.borrow(), 2);
    }

    #[test]
    fn test_send_signal_without_param() {
        let (mut code, out) = program();
        code.rule([SEND_SIGNAL]).unwrap();
        code.init();
        assert_eq!(*out.borrow(), "");
    }
}
