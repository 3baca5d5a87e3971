pub mod auth;
pub mod dashboard;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;
