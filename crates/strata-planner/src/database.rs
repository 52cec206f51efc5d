use strata_query::Request;
use strata_store::{Datastore, Multistore, Store, create_regions};

use crate::catalog::{Catalog, CollectionDescription};
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::executor::{ExecutionResult, execute_request};

/// A store with its regions created and a planner configuration.
pub struct Database<S: Store> {
    store: S,
    config: PlannerConfig,
}

impl<S: Store> Database<S> {
    pub fn open(store: S, config: PlannerConfig) -> Result<Self, PlannerError> {
        create_regions(&store)?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn begin(&self, read_only: bool) -> Result<DatabaseTransaction<'_, S>, PlannerError> {
        let txn = self.store.begin(read_only)?;
        Ok(DatabaseTransaction {
            ds: Multistore::new(txn)?,
            config: &self.config,
        })
    }
}

pub struct DatabaseTransaction<'db, S: Store + 'db> {
    ds: Multistore<S::Txn<'db>>,
    config: &'db PlannerConfig,
}

impl<'db, S: Store + 'db> DatabaseTransaction<'db, S> {
    pub fn datastore(&self) -> &dyn Datastore {
        &self.ds
    }

    pub fn create_collection(&self, name: &str, fields: &[&str]) -> Result<CollectionDescription, PlannerError> {
        Catalog::create_collection(&self.ds, name, fields)
    }

    pub fn collection(&self, name: &str) -> Result<CollectionDescription, PlannerError> {
        Catalog::load_collection(&self.ds, name)
    }

    pub fn list_collections(&self) -> Result<Vec<String>, PlannerError> {
        Catalog::list_collections(&self.ds)
    }

    pub fn execute(&self, request: &Request) -> Result<ExecutionResult, PlannerError> {
        execute_request(&self.ds, request, self.config)
    }

    pub fn commit(self) -> Result<(), PlannerError> {
        Ok(self.ds.commit()?)
    }

    pub fn rollback(self) -> Result<(), PlannerError> {
        Ok(self.ds.rollback()?)
    }
}
