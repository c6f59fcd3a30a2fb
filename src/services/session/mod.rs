pub mod store;

pub use store::{SessionSnapshot, SessionStore};
