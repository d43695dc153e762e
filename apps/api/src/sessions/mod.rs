// Editing sessions over HTTP: each session is a driver actor registered in
// `AppState::sessions` under a v4 uuid.

pub mod handlers;
