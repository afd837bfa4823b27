pub mod catalog;
pub mod events;
pub mod predictions;
pub mod results;
pub mod session;
pub mod upload;
pub mod validation;
