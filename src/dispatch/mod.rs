//! Completion dispatch: per-call cookies, the payload they convert into
//! callback arguments, and the registry that correlates library completions
//! with cookies.

pub mod cookie;
pub mod payload;
pub mod registry;

pub use cookie::CompletionCookie;
pub use payload::{ErrorEncoding, ResultPayload, ResultShape};
pub use registry::CookieRegistry;
