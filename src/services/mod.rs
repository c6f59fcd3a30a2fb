pub mod backend;
pub mod session;
pub mod validation;
