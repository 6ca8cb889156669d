pub mod identity_worker;
pub use identity_worker::IdentityWorker;
