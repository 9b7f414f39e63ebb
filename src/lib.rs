pub mod backend;
pub mod controller;
pub mod error;
pub mod session;
