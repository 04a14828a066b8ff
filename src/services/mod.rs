pub mod events;
pub mod pki;
