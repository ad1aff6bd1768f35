use crate::error::PlanError;
use crate::model::Course;
use crate::store::PlannerStore;

/// The authenticated identity a request is made on behalf of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

pub trait AccessPolicy {
    fn authorize(&self, actor: &Actor, course: &Course) -> Result<(), PlanError>;
}

/// Grants access to a course only to the account that owns it.
pub struct OwnerPolicy;

impl AccessPolicy for OwnerPolicy {
    fn authorize(&self, actor: &Actor, course: &Course) -> Result<(), PlanError> {
        if course.owner_id == actor.id {
            Ok(())
        } else {
            Err(PlanError::Forbidden)
        }
    }
}

/// Loads a course and checks the actor may act on it.
pub fn load_owned_course(
    store: &dyn PlannerStore,
    access: &dyn AccessPolicy,
    actor: &Actor,
    course_id: &str,
) -> Result<Course, PlanError> {
    let course = store.course(course_id)?.ok_or(PlanError::NotFound("course"))?;
    access.authorize(actor, &course)?;
    Ok(course)
}
