pub mod alert;
pub mod apikey;
pub mod auth;
pub mod http;
pub mod identity;
pub mod wallet;
