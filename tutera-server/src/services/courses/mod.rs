pub mod courses_hooks;
pub mod courses_service;
pub mod courses_shared;

pub use courses_service::CoursesService;
