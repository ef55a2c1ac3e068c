pub mod coach;
pub mod context;
pub mod handlers;
pub mod health;
pub mod history;
