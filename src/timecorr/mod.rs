//! Time correlation: TC packet decoding, frame resolution and reporting.

pub mod decode;
pub mod format;
pub mod resolver;

pub use decode::{
    EncodingType, ReferenceTcDecoder, TcFields, TimeCorrelationDecoder, PRIMARY_HEADER_LEN,
    TC_FIELDS_LEN,
};
pub use format::{TcOutputFormat, TimeCorrelationReport, NO_REFERENCE_FRAME};
pub use resolver::{select_reference_frames, MatchedFrame, TimeCorrelationPair, TimeCorrelationResolver};
