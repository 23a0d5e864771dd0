pub mod context;
pub mod login;
pub mod middleware;
pub mod service;
pub mod session;
pub mod verify;

#[cfg(test)]
pub mod testing;
