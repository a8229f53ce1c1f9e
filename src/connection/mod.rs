//! Connection orchestration
//!
//! - state.rs: the connection state published to the UI
//! - messages.rs: service failures as user-facing text
//! - quick_settings.rs: quick-settings panel state
//! - orchestrator.rs: attempt sequencing, fallback and settings write-through

pub mod messages;
pub mod orchestrator;
pub mod quick_settings;
pub mod state;

pub use messages::UserMessage;
pub use orchestrator::{AttemptId, AttemptOutcome, ConnectionOrchestrator, Notice, SettingChange};
pub use quick_settings::{Indicator, QuickSettingsState};
pub use state::{ConnectedInfo, ConnectionState, TargetDescription};
