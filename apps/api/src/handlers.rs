pub mod access;
pub mod audit;
pub mod emergency;
pub mod grants;
pub mod health;
pub mod resources;
