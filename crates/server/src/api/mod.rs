pub mod handlers;
pub mod matching;
pub mod middleware;
pub mod routes;
pub mod scenes;

pub use routes::create_router;
