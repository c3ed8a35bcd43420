pub mod adder;
pub mod atomic_f64;
pub mod clock;
pub mod ewma;
pub mod scheduler;
pub mod time_unit;

pub use adder::StripedLongAdder;
pub use atomic_f64::AtomicF64;
pub use clock::{default_clock, AdvanceListener, Clock, StopwatchClock, SystemClock, TestClock};
pub use ewma::Ewma;
pub use scheduler::{ActionScheduler, ScheduledAction, Scheduler, TestScheduler};
pub use time_unit::TimeUnit;
