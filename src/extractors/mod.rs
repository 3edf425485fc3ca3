//! Request extractors for the acting user and label locale.

mod user;
pub use user::{Actor, Locale, DEFAULT_LOCALE, USER_HEADER};
