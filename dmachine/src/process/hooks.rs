//! Start/end hooks with guaranteed release.

/// Callbacks bracketing one process run.
///
/// `enter()` fires the start hook and returns a guard that fires the end
/// hook when dropped, so early returns and cancelled futures still run it.
#[derive(Default)]
pub struct ProcessHooks<'a> {
    on_start: Option<Box<dyn FnOnce() + Send + 'a>>,
    on_end: Option<Box<dyn FnOnce() + Send + 'a>>,
}

impl<'a> ProcessHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl FnOnce() + Send + 'a) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_end(mut self, hook: impl FnOnce() + Send + 'a) -> Self {
        self.on_end = Some(Box::new(hook));
        self
    }

    /// Run the start hook and arm the end hook.
    pub fn enter(mut self) -> HookGuard<'a> {
        if let Some(hook) = self.on_start.take() {
            hook();
        }
        HookGuard {
            on_end: self.on_end.take(),
        }
    }
}

impl std::fmt::Debug for ProcessHooks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// Fires the end hook exactly once, on drop.
#[must_use = "dropping the guard immediately runs the end hook"]
pub struct HookGuard<'a> {
    on_end: Option<Box<dyn FnOnce() + Send + 'a>>,
}

impl Drop for HookGuard<'_> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_end.take() {
            hook();
        }
    }
}
