/// A presentation timestamp in microseconds.
///
/// This is relative to the start of the track, NOT a wall clock time.
pub type Timestamp = moq_transport::Timescale<1_000_000>;
