pub mod admin;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod mail;

#[cfg(test)]
mod test_support;
