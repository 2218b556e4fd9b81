pub mod compute;
pub mod gce;
pub mod pubsub;
