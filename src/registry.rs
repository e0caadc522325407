use std::collections::HashMap;

use crate::error::{SkqError, SkqResult};
use crate::Worker;

type WorkerFactory = Box<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

/// Maps a job's `class` to a factory producing a fresh handler per job.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, WorkerFactory>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn register<F>(&mut self, class: impl Into<String>, factory: F) -> SkqResult<()>
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        let class = class.into();
        if self
            .factories
            .insert(class.clone(), Box::new(factory))
            .is_some()
        {
            Err(SkqError::DupWorkerType(class))
        } else {
            Ok(())
        }
    }

    pub(crate) fn resolve(&self, class: &str) -> SkqResult<Box<dyn Worker>> {
        match self.factories.get(class) {
            Some(factory) => Ok(factory()),
            None => Err(SkqError::UnknownWorkerType(class.to_string())),
        }
    }
}
