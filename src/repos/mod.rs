pub mod error;
#[cfg(test)]
pub mod memory_profile_repo;
pub mod profile_repo;
