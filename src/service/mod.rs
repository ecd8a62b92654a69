//! Service layer
//!
//! Contains business logic separated from HTTP handlers.

mod settings;

pub use settings::{
    LinkedPlayerView, ModeOption, SettingsForm, SettingsOutcome, SettingsService, SettingsView,
    MSG_FORM_PARSE, MSG_INVALID_MODE, MSG_INVALID_USERNAME, MSG_LOOKUP_FAILED, MSG_SAVE_FAILED,
    MSG_UPDATED,
};
