pub mod account;
pub mod debug;
pub mod game;
pub mod health;
pub mod market;
pub mod trade;
