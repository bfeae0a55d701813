//! Headless stand-in for a host document.
//!
//! Holds a fixed element table plus the ready/loaded hooks that modules
//! attach; the demo fires the hooks explicitly.

use std::cell::RefCell;

#[derive(Debug, Clone)]
pub struct Element {
    pub id: String,
    pub classes: Vec<String>,
}

impl Element {
    pub fn new(id: &str, classes: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            classes: classes.iter().map(|class| class.to_string()).collect(),
        }
    }
}

type Hook = Box<dyn Fn()>;

#[derive(Default)]
pub struct Page {
    elements: Vec<Element>,
    on_ready: RefCell<Vec<Hook>>,
    on_loaded: RefCell<Vec<Hook>>,
    transcript: RefCell<Vec<String>>,
}

impl Page {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }

    /// Elements carrying `class`, in document order.
    pub fn select_class(&self, class: &str) -> Vec<&Element> {
        self.elements
            .iter()
            .filter(|element| element.classes.iter().any(|c| c == class))
            .collect()
    }

    pub fn on_ready(&self, hook: impl Fn() + 'static) {
        self.on_ready.borrow_mut().push(Box::new(hook));
    }

    pub fn on_loaded(&self, hook: impl Fn() + 'static) {
        self.on_loaded.borrow_mut().push(Box::new(hook));
    }

    pub fn fire_ready(&self) {
        Self::fire(&self.on_ready);
    }

    pub fn fire_loaded(&self) {
        Self::fire(&self.on_loaded);
    }

    // Hooks may attach further hooks; those wait for the next fire.
    fn fire(hooks: &RefCell<Vec<Hook>>) {
        let pending = std::mem::take(&mut *hooks.borrow_mut());
        for hook in &pending {
            hook();
        }
        let mut slot = hooks.borrow_mut();
        let added = std::mem::replace(&mut *slot, pending);
        slot.extend(added);
    }

    pub fn write(&self, line: impl Into<String>) {
        self.transcript.borrow_mut().push(line.into());
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Element, Page};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn select_class_keeps_document_order() {
        let page = Page::new(vec![
            Element::new("a", &["clock"]),
            Element::new("b", &["feed"]),
            Element::new("c", &["feed", "wide"]),
        ]);
        let ids: Vec<&str> = page
            .select_class("feed")
            .iter()
            .map(|element| element.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn hooks_survive_repeated_fires() {
        let page = Page::new(vec![]);
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        page.on_ready(move || counter.set(counter.get() + 1));

        page.fire_ready();
        page.fire_ready();
        page.fire_loaded();
        assert_eq!(count.get(), 2);
    }
}
