use moq_transport::coding::{DecodeError, EncodeError};

#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
	#[error("transport error: {0}")]
	Moq(#[from] moq_transport::Error),

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("encode error: {0}")]
	Encode(#[from] EncodeError),

	#[error("timestamp overflow")]
	TimestampOverflow(#[from] moq_transport::TimeOverflow),

	#[error("the first frame must be a keyframe")]
	MissingKeyframe,

	#[error("invalid audio config: {0}")]
	InvalidConfig(&'static str),

	#[error("already initialized")]
	AlreadyInitialized,

	#[error("not initialized")]
	NotInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;
