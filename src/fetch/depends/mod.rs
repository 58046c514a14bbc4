pub mod cookies;
pub mod http;
pub mod soundcloud;
pub mod youtube;
