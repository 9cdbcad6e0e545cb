//! MP3 decoding and speaker playback for narrated audio.

pub mod decode;
pub mod player;

pub use decode::{DecodedAudio, decode_mp3};
pub use player::AudioPlayer;
