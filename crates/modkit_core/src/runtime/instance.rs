//! Live-instance table.

use crate::error::{CoreError, CoreResult};
use crate::model::options::Options;
use crate::module::contract::ModuleInstance;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Lifecycle position of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Created but not started, or the last `init` failed.
    Idle,
    /// `init` is executing.
    Starting,
    Running,
}

/// Options cell shared by an instance's table entry and its sandbox.
pub(crate) type SharedOptions = Rc<RefCell<Options>>;

/// Module object plus the options it owns.
///
/// `module` is mutably borrowed while one of its hooks runs; `options` is
/// only borrowed briefly by the runtime and never across module code.
#[derive(Debug, Clone)]
pub(crate) struct InstanceSlot {
    pub(crate) module: Rc<RefCell<ModuleInstance>>,
    pub(crate) options: SharedOptions,
}

#[derive(Debug)]
struct InstanceEntry {
    module_id: String,
    slot: InstanceSlot,
    state: InstanceState,
}

/// Instance table keyed by instance id.
#[derive(Debug, Default)]
pub struct InstanceManager {
    entries: BTreeMap<String, InstanceEntry>,
    next_serial: u64,
}

impl InstanceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free `"{module_id}-{n}"` id from a monotonically increasing counter.
    pub(crate) fn synthesize_id(&mut self, module_id: &str) -> String {
        loop {
            self.next_serial += 1;
            let candidate = format!("{module_id}-{}", self.next_serial);
            if !self.entries.contains_key(candidate.as_str()) {
                return candidate;
            }
        }
    }

    /// Returns `(module_id, slot)` for an existing instance.
    pub(crate) fn lookup(&self, instance_id: &str) -> Option<(String, InstanceSlot)> {
        self.entries
            .get(instance_id)
            .map(|entry| (entry.module_id.clone(), entry.slot.clone()))
    }

    pub(crate) fn insert(
        &mut self,
        instance_id: &str,
        module_id: &str,
        module: ModuleInstance,
        options: SharedOptions,
    ) -> CoreResult<InstanceSlot> {
        if self.entries.contains_key(instance_id) {
            return Err(CoreError::AlreadyRunning(instance_id.to_string()));
        }
        let slot = InstanceSlot {
            module: Rc::new(RefCell::new(module)),
            options,
        };
        self.entries.insert(
            instance_id.to_string(),
            InstanceEntry {
                module_id: module_id.to_string(),
                slot: slot.clone(),
                state: InstanceState::Idle,
            },
        );
        Ok(slot)
    }

    /// Moves an idle instance to `Starting`.
    pub(crate) fn begin_start(&mut self, instance_id: &str) -> CoreResult<()> {
        let entry = self.entries.get_mut(instance_id).ok_or_else(|| {
            CoreError::InvalidArgument(format!("instance `{instance_id}` does not exist"))
        })?;
        if entry.state != InstanceState::Idle {
            return Err(CoreError::AlreadyRunning(instance_id.to_string()));
        }
        entry.state = InstanceState::Starting;
        Ok(())
    }

    pub(crate) fn finish_start(&mut self, instance_id: &str, succeeded: bool) {
        if let Some(entry) = self.entries.get_mut(instance_id) {
            entry.state = if succeeded {
                InstanceState::Running
            } else {
                InstanceState::Idle
            };
        }
    }

    pub(crate) fn remove(&mut self, instance_id: &str) -> bool {
        self.entries.remove(instance_id).is_some()
    }

    pub fn state(&self, instance_id: &str) -> Option<InstanceState> {
        self.entries.get(instance_id).map(|entry| entry.state)
    }

    pub fn is_running(&self, instance_id: &str) -> Option<bool> {
        self.state(instance_id)
            .map(|state| state == InstanceState::Running)
    }

    /// Copy of the instance's current options.
    pub fn options(&self, instance_id: &str) -> Option<Options> {
        self.entries
            .get(instance_id)
            .map(|entry| entry.slot.options.borrow().clone())
    }

    /// Sorted instance ids.
    pub fn instance_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{InstanceManager, InstanceState};
    use crate::error::{CoreError, ModuleError};
    use crate::model::options::Options;
    use crate::module::contract::{Module, ModuleInstance};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Idle;

    impl Module for Idle {
        fn init(&mut self, _options: &mut Options) -> Result<(), ModuleError> {
            Ok(())
        }

        fn destroy(&mut self) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    fn manager_with(instance_id: &str) -> InstanceManager {
        let mut manager = InstanceManager::new();
        manager
            .insert(instance_id, "idle", ModuleInstance::sync(Idle), shared(Options::new()))
            .expect("insert");
        manager
    }

    fn shared(options: Options) -> Rc<RefCell<Options>> {
        Rc::new(RefCell::new(options))
    }

    #[test]
    fn start_transitions_are_guarded() {
        let mut manager = manager_with("a");
        assert_eq!(manager.state("a"), Some(InstanceState::Idle));

        manager.begin_start("a").expect("idle instance can start");
        assert!(matches!(
            manager.begin_start("a"),
            Err(CoreError::AlreadyRunning(_))
        ));

        manager.finish_start("a", true);
        assert_eq!(manager.is_running("a"), Some(true));
        assert!(manager.begin_start("a").is_err());
    }

    #[test]
    fn failed_start_returns_to_idle() {
        let mut manager = manager_with("a");
        manager.begin_start("a").expect("begin");
        manager.finish_start("a", false);
        assert_eq!(manager.state("a"), Some(InstanceState::Idle));
        manager.begin_start("a").expect("retry allowed");
    }

    #[test]
    fn synthesized_ids_skip_existing_entries() {
        let mut manager = manager_with("clock-1");
        assert_eq!(manager.synthesize_id("clock"), "clock-2");
        assert_eq!(manager.synthesize_id("clock"), "clock-3");
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut manager = manager_with("a");
        let err = manager
            .insert("a", "idle", ModuleInstance::sync(Idle), shared(Options::new()))
            .expect_err("duplicate instance id");
        assert_eq!(err, CoreError::AlreadyRunning("a".to_string()));
    }

    #[test]
    fn options_are_returned_by_copy() {
        let mut manager = InstanceManager::new();
        let mut options = Options::new();
        options.insert("x".to_string(), json!(1));
        let cell = shared(options);
        manager
            .insert("a", "idle", ModuleInstance::sync(Idle), Rc::clone(&cell))
            .expect("insert");

        let mut copy = manager.options("a").expect("options");
        copy.insert("x".to_string(), json!(2));
        assert_eq!(manager.options("a").expect("options")["x"], json!(1));

        cell.borrow_mut().insert("x".to_string(), json!(3));
        assert_eq!(manager.options("a").expect("options")["x"], json!(3));

        assert!(manager.remove("a"));
        assert!(manager.options("a").is_none());
        assert!(manager.is_empty());
    }
}
