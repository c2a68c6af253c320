//! Loads a point-in-time snapshot of everything a decision needs: flows,
//! role assignments, academic relationships, the current year, and account
//! availability. The engine stays synchronous; this module is the only place
//! the two worlds meet.

use sqlx::Row;

use campusflow_core::authority::{
    AuthorityResolver, FixedPeriodProvider, InMemoryAcademicDirectory, InMemoryAvailabilityProbe,
};
use campusflow_core::config::InMemoryFlowConfigStore;
use campusflow_core::domain::academics::{
    AcademicYearId, BatchId, CourseId, DepartmentId, SectionId, StudentId,
};
use campusflow_core::domain::actor::{ActorId, RoleId};
use campusflow_core::domain::application::ApplicationTypeCode;
use campusflow_core::engine::ApprovalEngine;
use campusflow_core::notify::NotificationSink;
use campusflow_core::roles::{InMemoryRoleDirectory, RolePermission};

use crate::repositories::{FlowRepository, RepositoryError, SqlFlowRepository};
use crate::DbPool;

pub type DbEngine<N> = ApprovalEngine<
    InMemoryFlowConfigStore,
    InMemoryRoleDirectory,
    AuthorityResolver<InMemoryAcademicDirectory, FixedPeriodProvider, InMemoryAvailabilityProbe>,
    InMemoryAvailabilityProbe,
    N,
>;

pub struct DecisionContext {
    pub flows: InMemoryFlowConfigStore,
    pub roles: InMemoryRoleDirectory,
    pub directory: InMemoryAcademicDirectory,
    pub period: FixedPeriodProvider,
    pub probe: InMemoryAvailabilityProbe,
}

impl DecisionContext {
    /// Snapshot for decisions on applications of `application_type`.
    pub async fn load(
        pool: &DbPool,
        application_type: &ApplicationTypeCode,
    ) -> Result<Self, RepositoryError> {
        let flows = load_flows(pool, application_type).await?;
        let (roles, probe) = load_actors(pool, application_type).await?;
        let directory = load_directory(pool).await?;
        let period = load_period(pool).await?;
        Ok(Self { flows, roles, directory, period, probe })
    }

    pub fn engine<N: NotificationSink>(&self, sink: N) -> DbEngine<N> {
        ApprovalEngine::new(
            self.flows.clone(),
            self.roles.clone(),
            AuthorityResolver::new(
                self.directory.clone(),
                self.period.clone(),
                self.probe.clone(),
            ),
            self.probe.clone(),
            sink,
        )
    }
}

async fn load_flows(
    pool: &DbPool,
    application_type: &ApplicationTypeCode,
) -> Result<InMemoryFlowConfigStore, RepositoryError> {
    let repository = SqlFlowRepository::new(pool.clone());
    let mut store = InMemoryFlowConfigStore::default();
    for flow in repository.active_flows_for_type(application_type).await? {
        store = store.with_flow(flow);
    }
    Ok(store)
}

async fn load_actors(
    pool: &DbPool,
    application_type: &ApplicationTypeCode,
) -> Result<(InMemoryRoleDirectory, InMemoryAvailabilityProbe), RepositoryError> {
    let mut roles = InMemoryRoleDirectory::default();
    let mut probe = InMemoryAvailabilityProbe::default();

    let actor_rows = sqlx::query("SELECT id, is_active, is_superuser FROM actor")
        .fetch_all(pool)
        .await?;
    for row in &actor_rows {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let is_active: i64 =
            row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let is_superuser: i64 =
            row.try_get("is_superuser").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let actor = ActorId(id);
        if is_active == 0 {
            roles = roles.with_inactive(actor.clone());
            probe.mark_unavailable(actor.clone());
        }
        if is_superuser != 0 {
            roles = roles.with_superuser(actor);
        }
    }

    let role_rows = sqlx::query("SELECT actor_id, role FROM actor_role").fetch_all(pool).await?;
    for row in &role_rows {
        let actor: String =
            row.try_get("actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let role: String =
            row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        roles = roles.with_actor(ActorId(actor), vec![RoleId::new(role)]);
    }

    let permission_rows = sqlx::query(
        "SELECT role, can_override_flow, can_edit_all
         FROM role_type_permission WHERE application_type = ?",
    )
    .bind(&application_type.0)
    .fetch_all(pool)
    .await?;
    for row in &permission_rows {
        let role: String =
            row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let can_override_flow: i64 =
            row.try_get("can_override_flow").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let can_edit_all: i64 =
            row.try_get("can_edit_all").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        roles = roles.with_permission(
            RoleId::new(role),
            application_type.clone(),
            RolePermission {
                can_override_flow: can_override_flow != 0,
                can_edit_all: can_edit_all != 0,
            },
        );
    }

    Ok((roles, probe))
}

async fn load_directory(pool: &DbPool) -> Result<InMemoryAcademicDirectory, RepositoryError> {
    use std::collections::HashMap;

    let mut directory = InMemoryAcademicDirectory::default();

    let mut batches: HashMap<String, String> = HashMap::new();
    for row in &sqlx::query("SELECT id, batch_id FROM section").fetch_all(pool).await? {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let batch: String =
            row.try_get("batch_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        batches.insert(id, batch);
    }
    let mut courses: HashMap<String, String> = HashMap::new();
    for row in &sqlx::query("SELECT id, course_id FROM batch").fetch_all(pool).await? {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let course: String =
            row.try_get("course_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        courses.insert(id, course);
    }
    let mut departments: HashMap<String, String> = HashMap::new();
    for row in &sqlx::query("SELECT id, department_id FROM course").fetch_all(pool).await? {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let department: String =
            row.try_get("department_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        departments.insert(id, department);
    }

    let student_rows =
        sqlx::query("SELECT id, section_id FROM student WHERE section_id IS NOT NULL")
            .fetch_all(pool)
            .await?;
    for row in &student_rows {
        let student: String =
            row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let section: String =
            row.try_get("section_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        // A complete section -> batch -> course -> department chain becomes an
        // enrollment; anything less leaves the student without a department.
        let chain = batches.get(&section).and_then(|batch| {
            courses
                .get(batch)
                .and_then(|course| departments.get(course).map(|dept| (batch, course, dept)))
        });
        directory = match chain {
            Some((batch, course, dept)) => directory.with_enrollment(
                StudentId(student),
                SectionId(section.clone()),
                BatchId(batch.clone()),
                CourseId(course.clone()),
                DepartmentId(dept.clone()),
            ),
            None => directory.with_detached_section(StudentId(student), SectionId(section.clone())),
        };
    }

    let mentor_rows =
        sqlx::query("SELECT student_id, academic_year_id, mentor_actor_id FROM mentor_assignment")
            .fetch_all(pool)
            .await?;
    for row in &mentor_rows {
        let student: String =
            row.try_get("student_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let year: String =
            row.try_get("academic_year_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let mentor: String =
            row.try_get("mentor_actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        directory =
            directory.with_mentor(StudentId(student), AcademicYearId(year), ActorId(mentor));
    }

    let advisor_rows = sqlx::query(
        "SELECT section_id, academic_year_id, advisor_actor_id FROM advisor_assignment",
    )
    .fetch_all(pool)
    .await?;
    for row in &advisor_rows {
        let section: String =
            row.try_get("section_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let year: String =
            row.try_get("academic_year_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let advisor: String =
            row.try_get("advisor_actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        directory =
            directory.with_advisor(SectionId(section), AcademicYearId(year), ActorId(advisor));
    }

    let chair_rows =
        sqlx::query("SELECT id, department_id, actor_id, role FROM department_role")
            .fetch_all(pool)
            .await?;
    for row in &chair_rows {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let department: String =
            row.try_get("department_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let actor: String =
            row.try_get("actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let role: String =
            row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        directory = match role.as_str() {
            "HOD" => directory.with_hod(DepartmentId(department), ActorId(actor)),
            _ => directory.with_ahod(id, ActorId(actor)),
        };
    }

    let staff_rows =
        sqlx::query("SELECT id, department_id FROM actor WHERE department_id IS NOT NULL")
            .fetch_all(pool)
            .await?;
    for row in &staff_rows {
        let actor: String =
            row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let department: String =
            row.try_get("department_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        directory = directory.with_staff_department(ActorId(actor), DepartmentId(department));
    }

    Ok(directory)
}

async fn load_period(pool: &DbPool) -> Result<FixedPeriodProvider, RepositoryError> {
    let row = sqlx::query("SELECT id FROM academic_year WHERE is_current = 1 LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(match row {
        Some(row) => {
            let id: String =
                row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            FixedPeriodProvider(Some(AcademicYearId(id)))
        }
        None => FixedPeriodProvider(None),
    })
}
