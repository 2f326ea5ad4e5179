//! Shutdown coordination port

/// Action run once when the owning registry shuts down
pub type ShutdownAction = Box<dyn FnOnce() + Send>;

/// Reports whether the owner of a registered action still exists
pub type OwnerCheck = Box<dyn Fn() -> bool + Send>;

/// Collects shutdown actions and signals process shutdown
pub trait ShutdownCoordinator: Send + Sync {
    /// Register an action to run on shutdown
    ///
    /// When shutdown was already signalled the action runs immediately.
    fn register_action(&self, name: &str, action: ShutdownAction);

    /// Register an action that is discarded, without running, once `owner`
    /// reports `false`
    ///
    /// Discarded entries are pruned on later registrations, so owners that
    /// are rebuilt many times do not accumulate actions.
    fn register_owned(&self, name: &str, owner: OwnerCheck, action: ShutdownAction);

    /// Run every registered action, most recent first
    fn signal_shutdown(&self);

    /// Whether shutdown was signalled
    fn is_shutting_down(&self) -> bool;
}
