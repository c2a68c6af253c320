//! Mutex-backed repositories with the same contracts as the SQL ones; used
//! where a test or caller wants repository semantics without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use campusflow_core::domain::action::{ActionKind, ApprovalAction};
use campusflow_core::domain::application::{Application, ApplicationId};

use super::{ActionRepository, ApplicationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryApplicationRepository {
    applications: Mutex<HashMap<ApplicationId, Application>>,
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn find_by_id(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let applications = self.applications.lock().expect("lock");
        Ok(applications.get(id).cloned())
    }

    async fn insert(&self, application: &Application) -> Result<(), RepositoryError> {
        let mut applications = self.applications.lock().expect("lock");
        applications.insert(application.id.clone(), application.clone());
        Ok(())
    }

    async fn update_versioned(
        &self,
        application: &Application,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut applications = self.applications.lock().expect("lock");
        match applications.get(&application.id) {
            Some(stored) if stored.state_version == expected_version => {
                applications.insert(application.id.clone(), application.clone());
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict(format!(
                "application `{}` no longer at version {expected_version}",
                application.id
            ))),
            None => Err(RepositoryError::Conflict(format!(
                "application `{}` does not exist",
                application.id
            ))),
        }
    }

    async fn list_for_applicant(
        &self,
        applicant: &str,
    ) -> Result<Vec<Application>, RepositoryError> {
        let applications = self.applications.lock().expect("lock");
        Ok(applications
            .values()
            .filter(|application| application.applicant.0 == applicant)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryActionRepository {
    actions: Mutex<Vec<ApprovalAction>>,
}

#[async_trait]
impl ActionRepository for InMemoryActionRepository {
    async fn append(&self, action: &ApprovalAction) -> Result<(), RepositoryError> {
        let mut actions = self.actions.lock().expect("lock");
        let duplicate = action.kind == ActionKind::Approved
            && actions.iter().any(|existing| {
                existing.kind == ActionKind::Approved
                    && existing.application_id == action.application_id
                    && existing.step_id == action.step_id
            });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "step already carries an approval for application `{}`",
                action.application_id
            )));
        }
        actions.push(action.clone());
        Ok(())
    }

    async fn list_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApprovalAction>, RepositoryError> {
        let actions = self.actions.lock().expect("lock");
        Ok(actions
            .iter()
            .filter(|action| &action.application_id == application_id)
            .cloned()
            .collect())
    }
}
