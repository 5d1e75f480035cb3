mod env;
mod logging;

pub use env::{load_dotenv, redact_url, require_url};
pub use logging::init_tracing;

pub fn get_current_timestamp() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
