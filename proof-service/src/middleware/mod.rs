pub mod caller;

pub use caller::CallerToken;
