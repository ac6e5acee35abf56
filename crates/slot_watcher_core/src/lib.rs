pub mod domain;
pub mod evaluator;
pub mod poll;
pub mod ports;

pub use domain::{
    AvailabilityResult, DateWindow, NotificationRecord, PageNode, PageSnapshot, WINDOW_DAYS,
};
pub use evaluator::{has_open_slot, MissingRegion, StructureMismatch};
pub use poll::{PollLoop, PollLoopError, MAX_CONSECUTIVE_RENDER_FAULTS};
pub use ports::{
    ConfigStore, NotificationSink, PageSampler, PortError, PortResult, MIN_REFRESH_INTERVAL,
};
