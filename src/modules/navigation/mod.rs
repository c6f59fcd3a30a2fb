pub mod routes;

pub use routes::{guard, landing_route, route_after_review, GuardDecision, Route};
