pub mod coach;
pub mod context;
pub mod docs;
pub mod handlers;
pub mod health;
pub mod routes;
