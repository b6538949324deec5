pub mod health;
pub mod proxy;
pub mod route;
pub mod samples;
