//! The user-facing surface: status display plus the content surface that
//! recognized text is injected into.
//!
//! All surface state is owned by one thread. Other threads talk to it only
//! through a `SurfaceHandle`, which queues `SurfaceCommand`s.

mod content;
mod display;
mod document;
mod sink;

pub use content::{
    inject_text, ContentSurface, FieldEvent, FieldId, FieldMatcher, FormId, InjectOutcome,
    InputField, InputKind, SearchOrTextInput, SCROLLBAR_SUPPRESSION_CSS,
};
pub use display::{LogDisplay, SharedDisplay, StatusDisplay};
pub use document::{InMemoryDocument, SharedDocument};
pub use sink::{
    ExpiryTimer, SurfaceCommand, SurfaceHandle, SurfaceLoop, SurfaceStats, DEFAULT_CLEAR_AFTER,
};
