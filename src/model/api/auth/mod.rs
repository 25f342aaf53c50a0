mod caller;
mod token;

pub use caller::{Caller, Role};
pub use token::AUTH_TOKEN_COOKIE;
