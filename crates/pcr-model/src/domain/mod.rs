mod check_spec;
pub use check_spec::CheckSpec;

mod check_state;
pub use check_state::CheckState;

mod status_code;
pub use status_code::StatusCode;

/// Unique name of a check within one cycle.
pub type CheckName = String;
