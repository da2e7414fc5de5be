mod communicator;

pub use communicator::{CommsSettings, FailureCallback, HealthCommunicator, HealthFailure};
