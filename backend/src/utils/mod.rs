pub mod email;
pub mod password;
pub mod security;
pub mod signed_url;
pub mod time;

pub use password::*;
pub use time::*;
