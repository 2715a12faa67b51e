mod gemini;
mod local_auth;

pub use gemini::{DEFAULT_BASE_URL, GeminiClient};
pub use local_auth::LocalAuthProvider;
