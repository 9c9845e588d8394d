pub mod loader;
pub mod openai;
pub mod synthetic;
pub mod util;

pub use loader::DataLoader;
pub use openai::OpenAiInsightProvider;
