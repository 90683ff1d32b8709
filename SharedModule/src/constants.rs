//! # Shared Constants
//!
//! Constants used across both client and host modules.

/// Event names carried in the `event` field of an operation
pub mod events {
    /// Caller -> host: instantiate an object from a template
    pub const CREATE: &str = "Create";

    /// Caller -> host: destroy a live object
    pub const DESTROY: &str = "Destroy";

    /// Caller -> host: apply path -> value assignments
    pub const UPDATE: &str = "Update";

    /// Caller -> host: resolve paths and reply with a callback
    pub const QUERY: &str = "Query";

    /// Caller -> host: start tweens on an object
    pub const ANIMATE: &str = "Animate";

    /// Caller -> host: replace interest registrations
    pub const UPDATE_INTERESTS: &str = "UpdateInterests";

    /// Caller -> host: set named global values
    pub const SET_GLOBALS: &str = "SetGlobals";

    /// Caller -> host: write a line to the host log
    pub const LOG: &str = "Log";

    /// Host -> caller: reply to a pending callback
    pub const CALLBACK: &str = "Callback";

    /// Host -> caller: boot handshake completed
    pub const STARTED: &str = "StartedUnity";

    /// Host -> caller: lifecycle marker after a Create was applied
    pub const CREATED: &str = "Created";

    /// Host -> caller: lifecycle marker after a Destroy was applied
    pub const DESTROYED: &str = "Destroyed";

    /// Host -> caller: values written by updates flagged with `reportUpdate`
    pub const UPDATED: &str = "Updated";
}

/// Path grammar constants
pub mod path {
    /// Separator between steps
    pub const STEP_SEPARATOR: char = '/';

    /// Separator between a type tag and its value
    pub const TYPE_SEPARATOR: char = ':';

    /// Trailing modifier marking a step as conditional
    pub const CONDITIONAL_MODIFIER: char = '?';

    /// Trailing modifier marking a step as excited (evaluated)
    pub const EXCITED_MODIFIER: char = '!';
}

/// Expression sub-grammar keys
pub mod expr {
    /// Key wrapping an operation expression: `{"_expr_": {...}}`
    pub const EXPR_KEY: &str = "_expr_";

    /// Key wrapping a path reference: `{"_path_": "a/b"}`
    pub const PATH_KEY: &str = "_path_";
}

/// ID allocation constants
pub mod ids {
    /// Separator between the sanitized kind and the counter
    pub const ID_SEPARATOR: char = '_';

    /// Characters that may not appear in an ID because they carry path syntax
    pub const PATH_UNSAFE_CHARS: &[char] = &['/', ':', '?', '!'];

    /// Kind used when a Create template names neither a prefab nor a component
    pub const DEFAULT_OBJECT_KIND: &str = "Object";

    /// Kind used for callback IDs
    pub const CALLBACK_KIND: &str = "Callback";
}

/// Outbound queue constants
pub mod queue {
    /// Default pump tick for deferred flushes (in milliseconds)
    pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 16;

    /// Separator placed between encoded operations in one batch
    pub const BATCH_SEPARATOR: &str = ",";
}
