pub mod raw;
pub mod types;

pub use raw::{coerce, Coerced};
pub use types::{
    Action, ActionKind, ActionPayload, Clarification, DomAction, DomTarget, JsCode,
    SpreadsheetFilter,
};
