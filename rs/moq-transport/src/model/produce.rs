/// A producer and consumer pair, returned by the various `produce` methods.
#[derive(Clone)]
pub struct Produce<P, C> {
	pub producer: P,
	pub consumer: C,
}
