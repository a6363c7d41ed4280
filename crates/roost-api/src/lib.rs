pub mod auth;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod pagination;
pub mod posts;
pub mod users;
