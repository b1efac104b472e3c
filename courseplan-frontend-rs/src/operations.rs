//! Every GraphQL document the app sends, with typed variables and response data.
//! Course selections always include `termId` so cached courses keep their back-reference.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{Course, CourseId, CoursePlan, CoursePlanId, DeletedTerm, Me, Term, TermId};

pub trait Operation {
    const NAME: &'static str;
    const DOCUMENT: &'static str;
    type Variables: Serialize;
    type Data: DeserializeOwned;
}

#[derive(Serialize)]
pub struct NoVariables {}

pub struct GetUserTimeline;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineData {
    pub course_plan: CoursePlan,
}

impl Operation for GetUserTimeline {
    const NAME: &'static str = "GetUserTimeline";
    const DOCUMENT: &'static str = r#"
query GetUserTimeline {
  coursePlan(default: true) {
    id
    terms {
      id
      name
      courses {
        id
        termId
        name
      }
    }
  }
}
"#;
    type Variables = NoVariables;
    type Data = TimelineData;
}

pub struct GetUsername;

#[derive(Debug, Deserialize)]
pub struct UsernameData {
    pub me: Me,
}

impl Operation for GetUsername {
    const NAME: &'static str = "GetUsername";
    const DOCUMENT: &'static str = r#"
query GetUsername {
  me {
    name
  }
}
"#;
    type Variables = NoVariables;
    type Data = UsernameData;
}

pub struct AddTerm;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTermVariables {
    pub cp_id: CoursePlanId,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTermData {
    pub create_term: Term,
}

impl Operation for AddTerm {
    const NAME: &'static str = "addTerm";
    const DOCUMENT: &'static str = r#"
mutation addTerm($cpId: Int!, $newName: String!) {
  createTerm(coursePlanId: $cpId, name: $newName) {
    id
    name
    courses {
      id
      termId
      name
    }
  }
}
"#;
    type Variables = AddTermVariables;
    type Data = AddTermData;
}

pub struct RemoveTerm;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveTermVariables {
    pub term_id: TermId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveTermData {
    pub delete_term: DeletedTerm,
}

impl Operation for RemoveTerm {
    const NAME: &'static str = "removeTerm";
    const DOCUMENT: &'static str = r#"
mutation removeTerm($termId: Int!) {
  deleteTerm(termId: $termId) {
    id
    name
  }
}
"#;
    type Variables = RemoveTermVariables;
    type Data = RemoveTermData;
}

pub struct AddCourse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCourseVariables {
    pub term_id: TermId,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCourseData {
    pub create_term_course: Course,
}

impl Operation for AddCourse {
    const NAME: &'static str = "addCourse";
    const DOCUMENT: &'static str = r#"
mutation addCourse($termId: Int!, $newName: String!) {
  createTermCourse(termId: $termId, name: $newName) {
    id
    termId
    name
  }
}
"#;
    type Variables = AddCourseVariables;
    type Data = AddCourseData;
}

pub struct RemoveCourse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCourseVariables {
    pub course_id: CourseId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCourseData {
    pub delete_term_course: Course,
}

impl Operation for RemoveCourse {
    const NAME: &'static str = "removeCourse";
    const DOCUMENT: &'static str = r#"
mutation removeCourse($courseId: Int!) {
  deleteTermCourse(termCourseId: $courseId) {
    id
    termId
    name
  }
}
"#;
    type Variables = RemoveCourseVariables;
    type Data = RemoveCourseData;
}

pub struct AddCoursePlan;

/// No program means "start from an empty plan".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoursePlanInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCoursePlanVariables {
    pub cp_input: CreateCoursePlanInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCoursePlanData {
    pub create_course_plan: CoursePlan,
}

impl Operation for AddCoursePlan {
    const NAME: &'static str = "addCoursePlan";
    const DOCUMENT: &'static str = r#"
mutation addCoursePlan($cpInput: CreateCoursePlanInput!) {
  createCoursePlan(params: $cpInput) {
    id
    terms {
      id
      name
      courses {
        id
        termId
        name
      }
    }
  }
}
"#;
    type Variables = AddCoursePlanVariables;
    type Data = AddCoursePlanData;
}
