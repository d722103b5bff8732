use std::any::Any;

use tokio::task::JoinError;

/// Extracts the panic message from a failed join.
///
/// Returns `None` when the task was cancelled rather than panicking.
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	Some(panic_payload_message(payload.as_ref()))
}

/// Renders a panic payload as text.
pub fn panic_payload_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"non-string panic payload".to_string()
	}
}
