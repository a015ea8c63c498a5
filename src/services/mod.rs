pub mod auth;
pub mod userinfo;
