mod wheel;

pub use wheel::{TimerId, TimerWheel};
