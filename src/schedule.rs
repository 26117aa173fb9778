//! Minimal system schedule.
//!
//! An ordered list of callbacks over a host-defined world type, each
//! registered as immutable or mutable. No dependency graph, no
//! parallelism: systems run in insertion order.

/// One registered system.
enum System<W> {
    Immutable(Box<dyn FnMut(&W)>),
    Mutable(Box<dyn FnMut(&mut W)>),
}

/// Ordered list of systems over a host world type `W`.
pub struct Schedule<W> {
    systems: Vec<System<W>>,
}

impl<W> Schedule<W> {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Register a read-only system.
    pub fn add_system<F>(&mut self, system: F)
    where
        F: FnMut(&W) + 'static,
    {
        self.systems.push(System::Immutable(Box::new(system)));
    }

    /// Register a mutating system.
    pub fn add_system_mut<F>(&mut self, system: F)
    where
        F: FnMut(&mut W) + 'static,
    {
        self.systems.push(System::Mutable(Box::new(system)));
    }

    /// Run every system once, in insertion order.
    pub fn run(&mut self, world: &mut W) {
        for system in &mut self.systems {
            match system {
                System::Immutable(f) => f(world),
                System::Mutable(f) => f(world),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn clear(&mut self) {
        self.systems.clear();
    }
}

impl<W> Default for Schedule<W> {
    fn default() -> Self {
        Self::new()
    }
}
