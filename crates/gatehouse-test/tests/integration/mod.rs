mod admin;
mod current;
mod login;
mod observability;
