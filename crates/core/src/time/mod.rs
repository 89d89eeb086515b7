pub mod clock;
pub mod reference;
pub mod rollover;

pub use clock::{Clock, ManualClock, ManualTicker, SystemClock, Ticker, TokioTicker};
pub use reference::ReferenceTimezone;
pub use rollover::{
    RolloverConfig, RolloverDetector, RolloverEvent, RolloverLoop, RolloverSubscriber,
};
