#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::{Lox, LoxConfig, RunReport};

/// `Write` sink whose contents stay readable after it is handed away.
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn lox_with(config: LoxConfig) -> (Lox, Capture) {
    let out = Capture::default();
    let lox = Lox::with_output(config, Box::new(out.clone()));

    (lox, out)
}

/// Run `source` once in a fresh host and return what it printed.
pub fn run(source: &str) -> (String, RunReport) {
    let (mut lox, out) = lox_with(LoxConfig::default());
    let report = lox.run(source);

    (out.text(), report)
}

/// Run a program that must succeed and return its output.
pub fn output_of(source: &str) -> String {
    let (out, report) = run(source);

    assert!(report.errors.is_empty(), "static errors: {:?}", report.errors);
    assert!(report.fault.is_none(), "runtime fault: {:?}", report.fault);

    out
}
