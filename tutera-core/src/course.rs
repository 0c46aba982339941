//! Course records as authored in the wizard.
//!
//! The wire format is camelCase JSON, the same shape the browser keeps in
//! local storage. Ids are generated client side (`new_id`), `order` is 1-based
//! and dense inside its parent collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A fresh client-side id for a course, module, lesson or quiz.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub question: String,
    /// Always four answer slots; blanks are allowed while authoring.
    #[serde(default)]
    pub options: [String; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_file: Option<String>,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub order: u32,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a lesson, giving it an id if it has none and the next order.
    pub fn push_lesson(&mut self, mut lesson: Lesson) {
        if lesson.id.is_empty() {
            lesson.id = new_id();
        }
        self.lessons.push(lesson);
        renumber_lessons(&mut self.lessons);
    }

    pub fn remove_lesson(&mut self, id: &str) -> Option<Lesson> {
        let pos = self.lessons.iter().position(|l| l.id == id)?;
        let removed = self.lessons.remove(pos);
        renumber_lessons(&mut self.lessons);
        Some(removed)
    }
}

/// Restore dense 1-based `order` following the current vector order.
pub fn renumber_modules(modules: &mut [Module]) {
    for (i, m) in modules.iter_mut().enumerate() {
        m.order = i as u32 + 1;
    }
}

pub fn renumber_lessons(lessons: &mut [Lesson]) {
    for (i, l) in lessons.iter_mut().enumerate() {
        l.order = i as u32 + 1;
    }
}

/// A finalized course, as kept in the course list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub certificate: Option<Value>,
    #[serde(default)]
    pub ratings: Option<Value>,
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// `None` only on input; the store fills in `draft`.
    #[serde(default)]
    pub status: Option<CourseStatus>,
    /// Extra client fields (`thumbnailMediaId`, ...) travel untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Course {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            thumbnail: None,
            price: 0.0,
            is_paid: false,
            modules: Vec::new(),
            certificate: None,
            ratings: None,
            quizzes: Vec::new(),
            created_at: Utc::now(),
            status: None,
            extra: Map::new(),
        }
    }
}

impl Course {
    pub fn status(&self) -> CourseStatus {
        self.status.unwrap_or_default()
    }
}

/// The in-progress course: every field optional.
///
/// `merge` is a shallow merge: a field present in the patch replaces the
/// whole field, nested collections included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<Module>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quizzes: Option<Vec<Quiz>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CourseStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! merge_fields {
    ($dst:ident, $src:ident, $($field:ident),+) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

impl CourseDraft {
    pub fn is_empty(&self) -> bool {
        *self == CourseDraft::default()
    }

    pub fn merge(&mut self, patch: CourseDraft) {
        merge_fields!(
            self,
            patch,
            id,
            title,
            description,
            thumbnail,
            price,
            is_paid,
            modules,
            certificate,
            ratings,
            quizzes,
            created_at,
            status
        );
        for (k, v) in patch.extra {
            self.extra.insert(k, v);
        }
    }

    /// Finalize into a list entry. Missing ids are generated.
    pub fn to_course(&self) -> Course {
        Course {
            id: self.id.clone().filter(|id| !id.is_empty()).unwrap_or_else(new_id),
            title: self.title.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            thumbnail: self.thumbnail.clone(),
            price: self.price.unwrap_or_default(),
            is_paid: self.is_paid.unwrap_or_default(),
            modules: self.modules.clone().unwrap_or_default(),
            certificate: self.certificate.clone(),
            ratings: self.ratings.clone(),
            quizzes: self.quizzes.clone().unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            status: self.status,
            extra: self.extra.clone(),
        }
    }
}

impl From<&Course> for CourseDraft {
    fn from(c: &Course) -> Self {
        Self {
            id: Some(c.id.clone()),
            title: Some(c.title.clone()),
            description: Some(c.description.clone()),
            thumbnail: c.thumbnail.clone(),
            price: Some(c.price),
            is_paid: Some(c.is_paid),
            modules: Some(c.modules.clone()),
            certificate: c.certificate.clone(),
            ratings: c.ratings.clone(),
            quizzes: Some(c.quizzes.clone()),
            created_at: Some(c.created_at),
            status: c.status,
            extra: c.extra.clone(),
        }
    }
}
