mod extract;
mod handlers;
mod routes;

pub use extract::ClientInfo;
pub use handlers::AppState;
pub use routes::create_api_router;
