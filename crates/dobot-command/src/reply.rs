//! Reply-code formatting for the motion channel.

/// Code sent in place of an error id when the command could not be parsed.
pub const PARSE_FAILURE_CODE: &str = "-";

/// Format a resolved error id as the leading reply code.
///
/// `0` is the success marker; every other id, including the
/// [`NOT_QUEUED`][dobot_types::NOT_QUEUED] sentinel, is sent as its decimal
/// form.
pub fn format_return_code(error_id: i32) -> String {
    error_id.to_string()
}
