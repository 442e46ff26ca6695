use super::HostRuntime;

/// Open execution scope on a host runtime, closed when the guard drops.
pub struct HandleScope<'r> {
    runtime: &'r dyn HostRuntime,
}

impl<'r> HandleScope<'r> {
    pub fn enter(runtime: &'r dyn HostRuntime) -> Self {
        runtime.open_scope();
        Self { runtime }
    }
}

impl Drop for HandleScope<'_> {
    fn drop(&mut self) {
        self.runtime.close_scope();
    }
}
