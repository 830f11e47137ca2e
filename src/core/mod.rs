pub mod event;
pub mod parser;
pub mod session;
