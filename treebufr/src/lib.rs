pub mod bits;
pub mod config;
pub mod counters;
pub mod decoder;
pub mod embedded;
pub mod errors;
pub mod message;
pub mod parser;
pub mod reader;
pub mod structs;
pub mod tree;

pub use crate::config::DecoderConfig;
pub use crate::decoder::{DecodedMessage, Decoder, StreamEvent};
pub use crate::errors::{Error, Result, Warning};
pub use crate::message::Message;
pub use crate::parser::*;
pub use crate::reader::{Field, FieldData, Observation, ObservationIter, Record, Value};
pub use crate::tree::{DescriptorNode, DescriptorTree, TreeCache};
pub use bufrtables::table_path::{get_tables_base_path, set_tables_base_path};
