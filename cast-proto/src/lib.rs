//! Generated protobuf types for the cast channel.

pub mod cast_channel {
    include!(concat!(env!("OUT_DIR"), concat!("/", "homecast.cast_channel", ".rs")));
}

pub use cast_channel::CastMessage;
