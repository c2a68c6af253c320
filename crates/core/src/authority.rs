//! Maps a semantic role label plus an application's subject to a concrete,
//! available person. Resolution is read-only and never errors: absence is a
//! normal outcome, and collaborator failures degrade to "no match".

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::academics::{
    AcademicYearId, BatchId, CourseId, DepartmentId, SectionId, StudentId,
};
use crate::domain::actor::{ActorId, RoleId};
use crate::domain::application::Application;

/// The role labels with a semantic resolver behind them. Anything else has no
/// mapper and resolves to nobody; such roles act through flow override sets or
/// per-type permission grants instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleToken {
    Mentor,
    Advisor,
    Hod,
    Ahod,
}

impl RoleToken {
    pub fn parse(role: &RoleId) -> Option<Self> {
        match role.0.trim().to_ascii_uppercase().as_str() {
            "MENTOR" => Some(Self::Mentor),
            "ADVISOR" => Some(Self::Advisor),
            "HOD" => Some(Self::Hod),
            "AHOD" => Some(Self::Ahod),
            _ => None,
        }
    }
}

/// Explicit academic-period context, injected so callers (and tests) control
/// which year scoped mappings resolve against. No current year means every
/// year-scoped lookup fails closed.
pub trait CurrentPeriodProvider: Send + Sync {
    fn current_year(&self) -> Option<AcademicYearId>;
}

#[derive(Clone, Debug, Default)]
pub struct FixedPeriodProvider(pub Option<AcademicYearId>);

impl FixedPeriodProvider {
    pub fn year(id: impl Into<String>) -> Self {
        Self(Some(AcademicYearId(id.into())))
    }
}

impl CurrentPeriodProvider for FixedPeriodProvider {
    fn current_year(&self) -> Option<AcademicYearId> {
        self.0.clone()
    }
}

/// Capability check on a resolved person. Deliberately pluggable: the default
/// policy is "linked account is active", and a probe error counts as
/// unavailable rather than propagating.
pub trait AvailabilityProbe: Send + Sync {
    fn is_available(&self, actor: &ActorId) -> Result<bool, String>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryAvailabilityProbe {
    unavailable: HashSet<ActorId>,
}

impl InMemoryAvailabilityProbe {
    pub fn with_unavailable(unavailable: Vec<ActorId>) -> Self {
        Self { unavailable: unavailable.into_iter().collect() }
    }

    pub fn mark_unavailable(&mut self, actor: ActorId) {
        self.unavailable.insert(actor);
    }
}

impl AvailabilityProbe for InMemoryAvailabilityProbe {
    fn is_available(&self, actor: &ActorId) -> Result<bool, String> {
        Ok(!self.unavailable.contains(actor))
    }
}

/// Time-bounded relationship mappings: who mentors whom, who advises which
/// section, who holds which department chair.
pub trait AcademicDirectory: Send + Sync {
    fn mentor_of(&self, student: &StudentId, year: &AcademicYearId) -> Option<ActorId>;
    fn advisor_of(&self, section: &SectionId, year: &AcademicYearId) -> Option<ActorId>;
    fn section_of(&self, student: &StudentId) -> Option<SectionId>;
    /// Derived section -> batch -> course -> department; any missing link in
    /// the chain yields `None`.
    fn department_of_student(&self, student: &StudentId) -> Option<DepartmentId>;
    fn hod_of(&self, department: &DepartmentId) -> Option<ActorId>;
    /// All active AHOD chairs, ordered by mapping identity.
    fn ahod_candidates(&self) -> Vec<ActorId>;
    fn department_of_staff(&self, actor: &ActorId) -> Option<DepartmentId>;
    fn is_hod_of(&self, actor: &ActorId, department: &DepartmentId) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryAcademicDirectory {
    mentors: HashMap<(StudentId, AcademicYearId), ActorId>,
    advisors: HashMap<(SectionId, AcademicYearId), ActorId>,
    sections: HashMap<StudentId, SectionId>,
    batches: HashMap<SectionId, BatchId>,
    courses: HashMap<BatchId, CourseId>,
    departments: HashMap<CourseId, DepartmentId>,
    hods: HashMap<DepartmentId, ActorId>,
    ahods: BTreeMap<String, ActorId>,
    staff_departments: HashMap<ActorId, DepartmentId>,
}

impl InMemoryAcademicDirectory {
    pub fn with_mentor(mut self, student: StudentId, year: AcademicYearId, mentor: ActorId) -> Self {
        self.mentors.insert((student, year), mentor);
        self
    }

    pub fn with_advisor(
        mut self,
        section: SectionId,
        year: AcademicYearId,
        advisor: ActorId,
    ) -> Self {
        self.advisors.insert((section, year), advisor);
        self
    }

    pub fn with_enrollment(
        mut self,
        student: StudentId,
        section: SectionId,
        batch: BatchId,
        course: CourseId,
        department: DepartmentId,
    ) -> Self {
        self.sections.insert(student, section.clone());
        self.batches.insert(section, batch.clone());
        self.courses.insert(batch, course.clone());
        self.departments.insert(course, department);
        self
    }

    /// Student placed in a section whose batch/course/department chain is left
    /// dangling; useful for exercising fail-closed derivation.
    pub fn with_detached_section(mut self, student: StudentId, section: SectionId) -> Self {
        self.sections.insert(student, section);
        self
    }

    pub fn with_hod(mut self, department: DepartmentId, actor: ActorId) -> Self {
        self.hods.insert(department, actor);
        self
    }

    pub fn with_ahod(mut self, mapping_id: impl Into<String>, actor: ActorId) -> Self {
        self.ahods.insert(mapping_id.into(), actor);
        self
    }

    pub fn with_staff_department(mut self, actor: ActorId, department: DepartmentId) -> Self {
        self.staff_departments.insert(actor, department);
        self
    }
}

impl AcademicDirectory for InMemoryAcademicDirectory {
    fn mentor_of(&self, student: &StudentId, year: &AcademicYearId) -> Option<ActorId> {
        self.mentors.get(&(student.clone(), year.clone())).cloned()
    }

    fn advisor_of(&self, section: &SectionId, year: &AcademicYearId) -> Option<ActorId> {
        self.advisors.get(&(section.clone(), year.clone())).cloned()
    }

    fn section_of(&self, student: &StudentId) -> Option<SectionId> {
        self.sections.get(student).cloned()
    }

    fn department_of_student(&self, student: &StudentId) -> Option<DepartmentId> {
        let section = self.sections.get(student)?;
        let batch = self.batches.get(section)?;
        let course = self.courses.get(batch)?;
        self.departments.get(course).cloned()
    }

    fn hod_of(&self, department: &DepartmentId) -> Option<ActorId> {
        self.hods.get(department).cloned()
    }

    fn ahod_candidates(&self) -> Vec<ActorId> {
        self.ahods.values().cloned().collect()
    }

    fn department_of_staff(&self, actor: &ActorId) -> Option<DepartmentId> {
        self.staff_departments.get(actor).cloned()
    }

    fn is_hod_of(&self, actor: &ActorId, department: &DepartmentId) -> bool {
        self.hods.get(department) == Some(actor)
    }
}

/// The engine-facing face of authority resolution (spec'd as a collaborator so
/// alternative academic backends can stand in).
pub trait AuthorityLookup: Send + Sync {
    fn resolve_approver(&self, role: &RoleId, application: &Application) -> Option<ActorId>;
    fn department_of(&self, application: &Application) -> Option<DepartmentId>;
}

pub struct AuthorityResolver<D, P, V> {
    directory: D,
    period: P,
    probe: V,
}

impl<D, P, V> AuthorityResolver<D, P, V>
where
    D: AcademicDirectory,
    P: CurrentPeriodProvider,
    V: AvailabilityProbe,
{
    pub fn new(directory: D, period: P, probe: V) -> Self {
        Self { directory, period, probe }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    fn available(&self, actor: &ActorId) -> bool {
        self.probe.is_available(actor).unwrap_or(false)
    }

    fn resolve_token(&self, token: RoleToken, student: &StudentId) -> Option<ActorId> {
        match token {
            RoleToken::Mentor => {
                let year = self.period.current_year()?;
                if let Some(mentor) = self.directory.mentor_of(student, &year) {
                    if self.available(&mentor) {
                        return Some(mentor);
                    }
                }
                // Mentor missing or unavailable: advisors pick up the slack.
                self.resolve_token(RoleToken::Advisor, student)
            }
            RoleToken::Advisor => {
                let year = self.period.current_year()?;
                let section = self.directory.section_of(student)?;
                let advisor = self.directory.advisor_of(&section, &year)?;
                self.available(&advisor).then_some(advisor)
            }
            RoleToken::Hod => {
                let department = self.directory.department_of_student(student)?;
                if let Some(hod) = self.directory.hod_of(&department) {
                    if self.available(&hod) {
                        return Some(hod);
                    }
                }
                self.resolve_token(RoleToken::Ahod, student)
            }
            RoleToken::Ahod => {
                // Chairs are shared across departments, but a student with no
                // resolvable department gets nobody.
                self.directory.department_of_student(student)?;
                self.directory
                    .ahod_candidates()
                    .into_iter()
                    .find(|candidate| self.available(candidate))
            }
        }
    }
}

impl<D, P, V> AuthorityLookup for AuthorityResolver<D, P, V>
where
    D: AcademicDirectory + Send + Sync,
    P: CurrentPeriodProvider,
    V: AvailabilityProbe,
{
    fn resolve_approver(&self, role: &RoleId, application: &Application) -> Option<ActorId> {
        let token = RoleToken::parse(role)?;
        let student = application.student.as_ref()?;
        self.resolve_token(token, student)
    }

    fn department_of(&self, application: &Application) -> Option<DepartmentId> {
        if let Some(student) = &application.student {
            return self.directory.department_of_student(student);
        }
        self.directory.department_of_staff(&application.applicant)
    }
}
