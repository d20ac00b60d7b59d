pub mod load;
pub mod models;
pub mod proj;
pub mod server;
