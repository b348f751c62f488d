mod dispatcher;
mod handlers;
mod run_once;

pub use dispatcher::{run_worker, Dispatcher};
pub use handlers::{create_router, AppState, EVENT_HEADER, SIGNATURE_HEADER};
pub use run_once::{event_from_env, event_from_file};
