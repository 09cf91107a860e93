// Declare submodules
pub mod channels;
pub mod dispatcher;
pub mod maintenance;
#[cfg(test)]
pub mod memory_store;
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;
pub mod notification_service;
pub mod notification_store;
pub mod retry_scheduler;
pub mod routes;

// Re-export public items
pub use dispatcher::Dispatcher;
pub use maintenance::start_maintenance_service;
pub use notification_repository::NotificationRepository;
pub use notification_service::NotificationService;
pub use notification_store::NotificationStore;
pub use retry_scheduler::RetryScheduler;
