pub mod prompts;

pub use prompts::TerminalPrompt;
