use parking_lot::Mutex;
use polsync_device_offline::OfflineDevice;
use polsync_execution::{RemoteResult, RuleBaseAdapter};
use polsync_model::{CompositeKey, Rule};

/// One remote call as seen by [`FaultyDevice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    List,
    Get { name: String },
    Create { name: String, after: Option<String> },
    Update { name: String },
    Delete { name: String },
    Move { name: String, after: Option<String> },
}

impl Call {
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::List | Call::Get { .. })
    }
}

type WriteHook = Box<dyn FnMut(&OfflineDevice, &Call) + Send>;

/// Offline device wrapper that records calls and injects failures.
///
/// - `fail_write_at(n)`: the n-th write from now (0-based) fails once,
///   without reaching the device.
/// - `fail_list_at(n)`: the n-th `list` from now fails once;
///   `fail_next_list()` is `fail_list_at(0)`.
/// - `on_write(hook)`: runs after every accepted write; lets a test play
///   a second writer interleaving with the pass under test.
#[derive(Default)]
pub struct FaultyDevice {
    inner: OfflineDevice,
    calls: Mutex<Vec<Call>>,
    fail_write_in: Mutex<Option<usize>>,
    fail_list_in: Mutex<Option<usize>>,
    hook: Mutex<Option<WriteHook>>,
}

impl FaultyDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(inner: OfflineDevice) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &OfflineDevice {
        &self.inner
    }

    pub fn fail_write_at(&self, n: usize) {
        *self.fail_write_in.lock() = Some(n);
    }

    pub fn fail_list_at(&self, n: usize) {
        *self.fail_list_in.lock() = Some(n);
    }

    pub fn fail_next_list(&self) {
        self.fail_list_at(0);
    }

    pub fn on_write(&self, hook: impl FnMut(&OfflineDevice, &Call) + Send + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    pub fn clear_hook(&self) {
        *self.hook.lock() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn read(&self, call: Call) -> RemoteResult<()> {
        let list = call == Call::List;
        self.calls.lock().push(call);
        if list && tick(&self.fail_list_in) {
            return Err("injected list failure".into());
        }
        Ok(())
    }

    /// Record `call`, fail it if armed, else apply `f` and run the hook.
    fn write(&self, call: Call, f: impl FnOnce(&OfflineDevice) -> RemoteResult<()>) -> RemoteResult<()> {
        self.calls.lock().push(call.clone());

        if tick(&self.fail_write_in) {
            return Err(format!("injected failure on {call:?}").into());
        }

        f(&self.inner)?;

        if let Some(hook) = self.hook.lock().as_mut() {
            hook(&self.inner, &call);
        }
        Ok(())
    }
}

/// Advance a one-shot countdown; `true` exactly when it fires.
fn tick(countdown: &Mutex<Option<usize>>) -> bool {
    let mut slot = countdown.lock();
    let current = *slot;
    match current {
        Some(0) => {
            *slot = None;
            true
        }
        Some(n) => {
            *slot = Some(n - 1);
            false
        }
        None => false,
    }
}

impl RuleBaseAdapter for FaultyDevice {
    fn list(&self, key: &CompositeKey) -> RemoteResult<Vec<String>> {
        self.read(Call::List)?;
        self.inner.list(key)
    }

    fn get(&self, key: &CompositeKey, name: &str) -> RemoteResult<Option<Rule>> {
        self.read(Call::Get {
            name: name.to_string(),
        })?;
        self.inner.get(key, name)
    }

    fn create(&self, key: &CompositeKey, rule: &Rule, after: Option<&str>) -> RemoteResult<()> {
        let call = Call::Create {
            name: rule.name.clone(),
            after: after.map(str::to_string),
        };
        self.write(call, |d| d.create(key, rule, after))
    }

    fn update(&self, key: &CompositeKey, name: &str, rule: &Rule) -> RemoteResult<()> {
        let call = Call::Update {
            name: name.to_string(),
        };
        self.write(call, |d| d.update(key, name, rule))
    }

    fn delete(&self, key: &CompositeKey, name: &str) -> RemoteResult<()> {
        let call = Call::Delete {
            name: name.to_string(),
        };
        self.write(call, |d| d.delete(key, name))
    }

    fn move_rule(&self, key: &CompositeKey, name: &str, after: Option<&str>) -> RemoteResult<()> {
        let call = Call::Move {
            name: name.to_string(),
            after: after.map(str::to_string),
        };
        self.write(call, |d| d.move_rule(key, name, after))
    }
}
