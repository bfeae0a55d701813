//! CLI entry point.
//!
//! # Responsibility
//! - `modkit` prints the linked core version.
//! - `modkit demo` boots a runtime against a headless page and prints what
//!   the widgets did.

mod modules;
mod page;

use modkit_core::{core_version, default_log_level, init_logging, Core};
use page::{Element, Page};
use serde_json::json;
use std::process::ExitCode;
use std::rc::Rc;

fn main() -> ExitCode {
    let command = std::env::args().nth(1);
    match command.as_deref() {
        None | Some("version") => {
            println!("modkit_core version={}", core_version());
            ExitCode::SUCCESS
        }
        Some("demo") => run_demo(),
        Some(other) => {
            eprintln!("unknown command `{other}`; usage: modkit [version|demo]");
            ExitCode::from(2)
        }
    }
}

fn run_demo() -> ExitCode {
    if let Err(err) = init_logging(default_log_level(), None) {
        eprintln!("logging disabled: {err}");
    }

    let page = Rc::new(Page::new(vec![
        Element::new("masthead", &["greeting"]),
        Element::new("sidebar", &["menu"]),
        Element::new("footer", &["greeting", "muted"]),
    ]));
    let core = Core::new();
    if !modules::register_builtins(&core, &page) {
        eprintln!("failed to register built-in modules");
        return ExitCode::FAILURE;
    }

    core.boot();
    page.fire_ready();
    page.fire_loaded();
    core.publish("greet", &[json!("world")]);

    for line in page.transcript() {
        println!("{line}");
    }
    println!("running={}", core.instance_ids().join(","));
    ExitCode::SUCCESS
}
