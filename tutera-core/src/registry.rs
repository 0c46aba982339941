use std::collections::HashMap;
use std::sync::Arc;

use crate::TuteraService;

/// Maps service names to service instances so any transport can call
/// them by name.
pub struct TuteraServiceRegistry<R, P = ()> {
    services: HashMap<String, Arc<dyn TuteraService<R, P>>>,
}

impl<R, P> TuteraServiceRegistry<R, P> {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    pub fn register<S>(&mut self, name: S, service: Arc<dyn TuteraService<R, P>>)
    where
        S: Into<String>,
    {
        self.services.insert(name.into(), service);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TuteraService<R, P>>> {
        self.services.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

impl<R, P> Default for TuteraServiceRegistry<R, P> {
    fn default() -> Self {
        Self::new()
    }
}
