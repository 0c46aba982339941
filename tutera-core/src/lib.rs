//! tutera-core: framework-agnostic core for Tutera.
//!
//! Tenant resolution, the course model and its draft store, the authoring
//! wizard, and the service/hook pipeline the HTTP layer is built on.

pub mod app;
pub mod autosave;
pub mod config;
pub mod course;
pub mod drafts;
pub mod errors;
pub mod hooks;
pub mod registry;
pub mod service;
pub mod storage;
pub mod tenant;
pub mod wizard;

pub use app::{ServiceHandle, TuteraApp};
pub use autosave::{Autosave, DEFAULT_AUTOSAVE_DELAY};
pub use config::{TuteraConfig, TuteraConfigSnapshot};
pub use course::{new_id, Course, CourseDraft, CourseStatus, Lesson, Module, Quiz};
pub use drafts::{CourseDraftStore, DraftSnapshot};
pub use errors::{ErrorKind, TuteraError, TuteraResult};
pub use hooks::{
    HookContext, HookResult, ServiceHooks, TuteraAfterHook, TuteraBeforeHook, TuteraErrorHook,
};
pub use registry::TuteraServiceRegistry;
pub use service::{ServiceCapabilities, ServiceMethodKind, TuteraService};
pub use storage::{DraftStorage, FileStorage, MemoryStorage, Preferences, StorageError};
pub use tenant::{resolve_tenant, TenantContext, TenantId, DEFAULT_TENANT};
pub use wizard::{transition, DraftEffect, WizardError, WizardEvent, WizardStep};
