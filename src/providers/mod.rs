//! Concrete [`crate::stream::Provider`] implementations. The core turn loop
//! never reaches into this module directly — it only ever holds a
//! `Box<dyn Provider>` — so adding a second adapter here never touches
//! `client.rs`/`turn.rs`/`stream_processor.rs`.

mod openai_compatible;

pub use openai_compatible::OpenAiCompatible;
