//! The course draft store.
//!
//! Holds the author's in-progress course (`current_course`), the finalized
//! course list (`courses`) and the wizard step, and writes all three through
//! to a [`DraftStorage`] after every change.
//!
//! A store only exists once hydrated: [`CourseDraftStore::hydrate`] reads
//! storage before anything can write to it, so a half-loaded state is never
//! persisted over real data.
//!
//! Persistence is best-effort. A failed write is logged and the in-memory
//! state keeps the change.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::course::{Course, CourseDraft, CourseStatus};
use crate::errors::TuteraError;
use crate::storage::{
    DraftStorage, Preferences, StorageError, COURSES_KEY, CURRENT_COURSE_KEY, CURRENT_STEP_KEY,
};
use crate::wizard::{transition, DraftEffect, WizardError, WizardEvent, WizardStep};

/// Everything a client needs to render the authoring screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub courses: Vec<Course>,
    pub current_course: Option<CourseDraft>,
    pub current_step: WizardStep,
    pub show_preview: bool,
    pub show_quiz: bool,
}

#[derive(Debug)]
pub struct CourseDraftStore<S: DraftStorage> {
    storage: S,
    courses: Vec<Course>,
    current_course: Option<CourseDraft>,
    current_step: WizardStep,
    show_preview: bool,
    show_quiz: bool,
}

fn read_json<T: DeserializeOwned, S: DraftStorage + ?Sized>(storage: &S, key: &str) -> Option<T> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read draft storage");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring corrupt draft storage entry");
            None
        }
    }
}

impl<S: DraftStorage> CourseDraftStore<S> {
    /// Load state from `storage`.
    ///
    /// A persisted step past the list with no stored draft yields an empty
    /// draft rather than none, so the wizard can resume.
    pub fn hydrate(storage: S) -> Self {
        let courses: Vec<Course> = read_json(&storage, COURSES_KEY).unwrap_or_default();
        let mut current_course: Option<CourseDraft> = read_json(&storage, CURRENT_COURSE_KEY);
        let current_step = read_json::<u8, S>(&storage, CURRENT_STEP_KEY)
            .and_then(|n| WizardStep::try_from(n).ok())
            .unwrap_or_default();

        if current_step.is_authoring() && current_course.is_none() {
            current_course = Some(CourseDraft::default());
        }

        tracing::debug!(
            courses = courses.len(),
            step = current_step.index(),
            has_draft = current_course.is_some(),
            "draft store hydrated"
        );

        Self {
            storage,
            courses,
            current_course,
            current_step,
            show_preview: false,
            show_quiz: false,
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn get_course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn current_course(&self) -> Option<&CourseDraft> {
        self.current_course.as_ref()
    }

    pub fn current_step(&self) -> WizardStep {
        self.current_step
    }

    pub fn show_preview(&self) -> bool {
        self.show_preview
    }

    pub fn set_show_preview(&mut self, show: bool) {
        self.show_preview = show;
    }

    pub fn show_quiz(&self) -> bool {
        self.show_quiz
    }

    pub fn set_show_quiz(&mut self, show: bool) {
        self.show_quiz = show;
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            courses: self.courses.clone(),
            current_course: self.current_course.clone(),
            current_step: self.current_step,
            show_preview: self.show_preview,
            show_quiz: self.show_quiz,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn preferences(&mut self) -> Preferences<'_, S> {
        Preferences::new(&mut self.storage)
    }

    /// Shallow-merge `patch` into the draft. No validation.
    pub fn update_current_course(&mut self, patch: CourseDraft) -> &CourseDraft {
        self.current_course
            .get_or_insert_with(CourseDraft::default)
            .merge(patch);
        self.persist_current_course();
        self.current_course.get_or_insert_with(CourseDraft::default)
    }

    /// Jump to a step directly. Entering the wizard without a draft starts
    /// an empty one.
    pub fn set_current_step(&mut self, step: u8) -> Result<WizardStep, WizardError> {
        let step = WizardStep::try_from(step)?;
        self.current_step = step;
        if step.is_authoring() && self.current_course.is_none() {
            self.current_course = Some(CourseDraft::default());
            self.persist_current_course();
        }
        self.persist_step();
        Ok(step)
    }

    /// Upsert by id. The status defaults to draft.
    ///
    /// `keep_step == false` closes the wizard (draft cleared, step 0);
    /// `true` leaves it open, e.g. while a publish confirmation is pending.
    pub fn add_course(&mut self, mut course: Course, keep_step: bool) -> Course {
        if course.status.is_none() {
            course.status = Some(CourseStatus::Draft);
        }

        match self.courses.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => *existing = course.clone(),
            None => self.courses.push(course.clone()),
        }
        self.persist_courses();

        if !keep_step {
            self.clear_wizard();
        }
        course
    }

    /// Flip the status of a listed course. The draft is left alone.
    pub fn update_course_status(&mut self, id: &str, status: CourseStatus) -> Result<Course, TuteraError> {
        let course = self
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| TuteraError::not_found(format!("Course not found: {id}")))?;
        course.status = Some(status);
        let updated = course.clone();
        self.persist_courses();
        Ok(updated)
    }

    /// Remove a listed course; deleting the course being edited also closes
    /// the wizard. Returns the removed course, if any.
    pub fn delete_course(&mut self, id: &str) -> Option<Course> {
        let pos = self.courses.iter().position(|c| c.id == id)?;
        let removed = self.courses.remove(pos);
        self.persist_courses();

        let editing = self
            .current_course
            .as_ref()
            .and_then(|d| d.id.as_deref())
            .is_some_and(|draft_id| draft_id == id);
        if editing {
            self.clear_wizard();
        }
        Some(removed)
    }

    /// Drop the draft and return to the list.
    pub fn reset_current_course(&mut self) {
        self.clear_wizard();
    }

    /// Apply a wizard event through the transition table.
    pub fn dispatch(&mut self, event: WizardEvent) -> Result<WizardStep, TuteraError> {
        let (next, effect) = transition(self.current_step, &event)?;

        match effect {
            DraftEffect::None => {}
            DraftEffect::Fresh => {
                self.current_course = Some(CourseDraft::default());
                self.reset_flags();
                self.persist_current_course();
            }
            DraftEffect::LoadCourse => {
                let WizardEvent::Edit(id) = &event else {
                    return Err(TuteraError::bad_request("edit requires a course id"));
                };
                let course = self
                    .get_course(id)
                    .ok_or_else(|| TuteraError::not_found(format!("Course not found: {id}")))?;
                self.current_course = Some(CourseDraft::from(course));
                self.reset_flags();
                self.persist_current_course();
            }
            DraftEffect::Publish => {
                let mut course = self
                    .current_course
                    .as_ref()
                    .map(CourseDraft::to_course)
                    .unwrap_or_default();
                course.status = Some(CourseStatus::Published);
                self.add_course(course, false);
                tracing::info!(step = next.index(), "course published from wizard");
                return Ok(next);
            }
        }

        self.current_step = next;
        self.persist_step();
        tracing::debug!(event = event.name(), step = next.index(), "wizard transition");
        Ok(next)
    }

    fn reset_flags(&mut self) {
        self.show_preview = false;
        self.show_quiz = false;
    }

    fn clear_wizard(&mut self) {
        self.current_course = None;
        self.current_step = WizardStep::List;
        self.reset_flags();
        self.persist_current_course();
        self.persist_step();
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        let res = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|raw| self.storage.set_item(key, &raw));
        if let Err(e) = res {
            tracing::warn!(key, error = %e, "failed to persist draft state");
        }
    }

    fn persist_courses(&mut self) {
        let courses = std::mem::take(&mut self.courses);
        self.write_json(COURSES_KEY, &courses);
        self.courses = courses;
    }

    fn persist_current_course(&mut self) {
        match self.current_course.take() {
            Some(draft) => {
                self.write_json(CURRENT_COURSE_KEY, &draft);
                self.current_course = Some(draft);
            }
            None => {
                if let Err(e) = self.storage.remove_item(CURRENT_COURSE_KEY) {
                    tracing::warn!(key = CURRENT_COURSE_KEY, error = %e, "failed to persist draft state");
                }
            }
        }
    }

    fn persist_step(&mut self) {
        let step = self.current_step.index();
        self.write_json(CURRENT_STEP_KEY, &step);
    }

    /// Hand the storage back, e.g. to simulate a reload in tests.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{Lesson, Module, Quiz};
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn store() -> CourseDraftStore<MemoryStorage> {
        CourseDraftStore::hydrate(MemoryStorage::new())
    }

    fn reload(store: CourseDraftStore<MemoryStorage>) -> CourseDraftStore<MemoryStorage> {
        CourseDraftStore::hydrate(store.into_storage())
    }

    fn course(id: &str, title: &str) -> Course {
        Course {
            id: id.into(),
            title: title.into(),
            ..Course::default()
        }
    }

    fn patch(v: serde_json::Value) -> CourseDraft {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn add_course_is_an_idempotent_upsert() {
        let mut s = store();
        s.add_course(course("c1", "first"), false);
        s.add_course(course("c1", "second"), false);

        assert_eq!(s.courses().len(), 1);
        assert_eq!(s.courses()[0].title, "second");
        assert_eq!(s.courses()[0].status(), CourseStatus::Draft);
    }

    #[test]
    fn add_course_keep_step_leaves_wizard_open() {
        let mut s = store();
        s.dispatch(WizardEvent::Create).unwrap();
        s.update_current_course(patch(json!({"id": "c1", "title": "T"})));
        s.set_current_step(3).unwrap();

        s.add_course(course("c1", "T"), true);
        assert_eq!(s.current_step(), WizardStep::Setup);
        assert!(s.current_course().is_some());

        s.add_course(course("c1", "T"), false);
        assert_eq!(s.current_step(), WizardStep::List);
        assert!(s.current_course().is_none());
    }

    #[test]
    fn deleting_the_edited_course_clears_the_draft() {
        let mut s = store();
        s.add_course(course("c1", "T"), false);
        s.dispatch(WizardEvent::Edit("c1".into())).unwrap();
        assert_eq!(s.current_course().unwrap().id.as_deref(), Some("c1"));

        assert!(s.delete_course("c1").is_some());
        assert!(s.courses().is_empty());
        assert!(s.current_course().is_none());
        assert_eq!(s.current_step(), WizardStep::List);
    }

    #[test]
    fn deleting_another_course_keeps_the_draft() {
        let mut s = store();
        s.add_course(course("c1", "one"), false);
        s.add_course(course("c2", "two"), false);
        s.dispatch(WizardEvent::Edit("c1".into())).unwrap();

        s.delete_course("c2");
        assert_eq!(s.current_course().unwrap().id.as_deref(), Some("c1"));
        assert_eq!(s.current_step(), WizardStep::BasicInfo);
        assert!(s.delete_course("missing").is_none());
    }

    #[test]
    fn status_update_leaves_draft_alone() {
        let mut s = store();
        s.add_course(course("c1", "T"), false);
        s.update_current_course(patch(json!({"title": "wip"})));

        let c = s.update_course_status("c1", CourseStatus::Published).unwrap();
        assert_eq!(c.status(), CourseStatus::Published);
        assert_eq!(s.current_course().unwrap().title.as_deref(), Some("wip"));
        assert_eq!(s.update_course_status("nope", CourseStatus::Draft).unwrap_err().code(), 404);
    }

    #[test]
    fn draft_round_trips_through_storage_in_order() {
        let mut s = store();
        let mut m1 = Module::new("One");
        m1.push_lesson(Lesson { name: "a".into(), video: Some("v.mp4".into()), ..Lesson::default() });
        m1.push_lesson(Lesson { name: "b".into(), ..Lesson::default() });
        m1.quizzes.push(Quiz {
            id: "q1".into(),
            question: "2+2?".into(),
            options: ["1".into(), "2".into(), "3".into(), "4".into()],
            correct_answer: Some("4".into()),
        });
        let mut m2 = Module::new("Two");
        m2.order = 2;
        m1.order = 1;

        s.update_current_course(CourseDraft {
            id: Some("c1".into()),
            title: Some("Rust".into()),
            price: Some(19.5),
            modules: Some(vec![m1, m2]),
            ..CourseDraft::default()
        });
        let before = s.current_course().cloned();

        let s = reload(s);
        assert_eq!(s.current_course().cloned(), before);
        let names: Vec<_> = s.current_course().unwrap().modules.as_ref().unwrap()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["One", "Two"]);
    }

    #[test]
    fn reset_then_update_survives_reload() {
        let mut s = store();
        s.set_current_step(2).unwrap();
        s.reset_current_course();
        s.update_current_course(patch(json!({"title": "X"})));
        let step_before = s.current_step();

        let s = reload(s);
        assert_eq!(s.current_course().unwrap().title.as_deref(), Some("X"));
        assert_eq!(s.current_step(), step_before);
    }

    #[test]
    fn persisted_step_without_draft_hydrates_empty_draft() {
        let mut s = store();
        s.set_current_step(2).unwrap();
        let mut storage = s.into_storage();
        storage.remove_item(CURRENT_COURSE_KEY).unwrap();

        let s = CourseDraftStore::hydrate(storage);
        assert_eq!(s.current_step(), WizardStep::Content);
        assert_eq!(s.current_course(), Some(&CourseDraft::default()));
    }

    #[test]
    fn nothing_persisted_means_no_draft() {
        let s = store();
        assert!(s.current_course().is_none());
        assert_eq!(s.current_step(), WizardStep::List);
    }

    #[test]
    fn corrupt_entries_are_ignored() {
        let mut storage = MemoryStorage::new();
        storage.set_item(COURSES_KEY, "not json").unwrap();
        storage.set_item(CURRENT_STEP_KEY, "9").unwrap();
        let s = CourseDraftStore::hydrate(storage);
        assert!(s.courses().is_empty());
        assert_eq!(s.current_step(), WizardStep::List);
    }

    #[test]
    fn invalid_step_is_rejected_without_change() {
        let mut s = store();
        s.set_current_step(1).unwrap();
        assert_eq!(s.set_current_step(4), Err(WizardError::InvalidStep(4)));
        assert_eq!(s.current_step(), WizardStep::BasicInfo);
    }

    #[test]
    fn publish_confirmation_lists_course_and_closes_wizard() {
        let mut s = store();
        s.dispatch(WizardEvent::Create).unwrap();
        s.update_current_course(patch(json!({"id": "c9", "title": "Done"})));
        s.dispatch(WizardEvent::Next).unwrap();
        s.dispatch(WizardEvent::Next).unwrap();
        let step = s.dispatch(WizardEvent::PublishConfirmed).unwrap();

        assert_eq!(step, WizardStep::List);
        assert!(s.current_course().is_none());
        assert_eq!(s.get_course("c9").unwrap().status(), CourseStatus::Published);
    }

    #[test]
    fn rejected_event_leaves_state_intact() {
        let mut s = store();
        s.dispatch(WizardEvent::Create).unwrap();
        s.update_current_course(patch(json!({"title": "keep"})));
        let err = s.dispatch(WizardEvent::PublishConfirmed).unwrap_err();
        assert_eq!(err.code(), 409);
        assert_eq!(s.current_step(), WizardStep::BasicInfo);
        assert_eq!(s.current_course().unwrap().title.as_deref(), Some("keep"));
    }

    #[test]
    fn create_starts_from_a_clean_draft() {
        let mut s = store();
        s.update_current_course(patch(json!({"thumbnailMediaId": "old-media"})));
        s.dispatch(WizardEvent::Create).unwrap();
        assert!(s.current_course().unwrap().is_empty());
    }

    #[test]
    fn create_and_edit_clear_preview_and_quiz_flags() {
        let mut s = store();
        s.set_show_preview(true);
        s.set_show_quiz(true);
        s.dispatch(WizardEvent::Create).unwrap();
        assert!(!s.show_preview());
        assert!(!s.show_quiz());

        s.add_course(course("c1", "One"), false);
        s.set_show_preview(true);
        s.set_show_quiz(true);
        s.dispatch(WizardEvent::Edit("c1".into())).unwrap();
        assert!(!s.show_preview());
        assert!(!s.show_quiz());
    }

    #[test]
    fn edit_of_unknown_course_is_not_found() {
        let mut s = store();
        assert_eq!(s.dispatch(WizardEvent::Edit("nope".into())).unwrap_err().code(), 404);
        assert_eq!(s.current_step(), WizardStep::List);
    }
}
