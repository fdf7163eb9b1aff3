//! Provider adapters for external speech-to-text backends
//!
//! Each adapter wraps one backend behind the common `TranscriptionProvider`
//! contract: hosted Whisper services, a local whisper.cpp server, and a
//! placeholder for backends that cannot transcribe audio.
mod claude;
mod groq;
mod openai;
mod transcription;
mod whisper_cpp;

pub use claude::ClaudeSttProvider;
pub use groq::GroqWhisperProvider;
pub use openai::OpenAiWhisperProvider;
pub use transcription::{
    ChunkStream, ProviderDescriptor, TranscriptionChunk, TranscriptionProvider,
    single_chunk_stream,
};
pub use whisper_cpp::WhisperCppProvider;
